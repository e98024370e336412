//! Email allow-list.

use std::collections::HashSet;

/// Static set of emails permitted to complete sign-in.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationList {
    emails: HashSet<String>,
}

impl AuthorizationList {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let emails = emails
            .into_iter()
            .map(|e| normalise(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        Self { emails }
    }

    /// Case-insensitive membership check.
    pub fn permits(&self, email: &str) -> bool {
        self.emails.contains(&normalise(email))
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

fn normalise(email: &str) -> String {
    email.trim().to_lowercase()
}
