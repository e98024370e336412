use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;
use crate::error::DocdeskError;

/// An HTTP client that only reaches approved hosts.
///
/// Docdesk talks to exactly two kinds of remote services: the document
/// service webhooks and the OAuth profile endpoint. Their hosts are registered
/// at startup from configuration; anything else is refused before a request
/// leaves the process.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Creates a client with an empty allowlist and the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self, DocdeskError> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| DocdeskError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, allowlist: HashSet::new() })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// Allows the host of `url`. Fails when the URL has no host.
    pub fn allow_url(&mut self, url: &str) -> Result<(), DocdeskError> {
        let parsed = Url::parse(url)
            .map_err(|e| DocdeskError::Config(format!("Invalid URL {}: {}", url, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| DocdeskError::Config(format!("URL has no host: {}", url)))?;
        self.allow_domain(host);
        Ok(())
    }

    /// Validates if a URL is permitted under the current sandbox policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        if let Ok(parsed) = Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                // Exact match or a subdomain of an allowed domain
                for allowed in &self.allowlist {
                    if host == allowed || host.ends_with(&format!(".{}", allowed)) {
                        return true;
                    }
                }
            }
        }
        false
    }

    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, DocdeskError> {
        self.check(url)?;
        Ok(self.client.get(url))
    }

    pub fn post(&self, url: &str) -> Result<reqwest::RequestBuilder, DocdeskError> {
        self.check(url)?;
        Ok(self.client.post(url))
    }

    fn check(&self, url: &str) -> Result<(), DocdeskError> {
        if self.is_allowed(url) {
            Ok(())
        } else {
            tracing::warn!(%url, "blocked outbound request to host outside allowlist");
            Err(DocdeskError::SecurityError(format!(
                "Network capabilities capped: domain not in allowlist for URL {}",
                url
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SandboxClient {
        SandboxClient::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn empty_allowlist_blocks_everything() {
        let c = client();
        assert!(!c.is_allowed("https://example.com/webhook"));
        assert!(c.post("https://example.com/webhook").is_err());
    }

    #[test]
    fn allow_url_registers_host_and_subdomains() {
        let mut c = client();
        c.allow_url("https://docs.example.com/webhook/abc").unwrap();
        assert!(c.is_allowed("https://docs.example.com/other"));
        assert!(c.is_allowed("https://eu.docs.example.com/x"));
        assert!(!c.is_allowed("https://example.com/"));
        assert!(!c.is_allowed("https://docs.example.com.evil.net/"));
    }

    #[test]
    fn allow_url_rejects_garbage() {
        let mut c = client();
        assert!(c.allow_url("not a url").is_err());
    }

    #[test]
    fn loopback_works_for_local_services() {
        let mut c = client();
        c.allow_url("http://127.0.0.1:5678/webhook").unwrap();
        assert!(c.get("http://127.0.0.1:9999/health").is_ok());
    }
}
