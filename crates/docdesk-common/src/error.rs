use thiserror::Error;

/// Every failure a Docdesk component can surface.
///
/// The first five variants are user-facing: their `Display` text is exactly
/// what ends up in a notification. The rest are operational and only reach
/// the user wrapped in a generic message.
#[derive(Debug, Error)]
pub enum DocdeskError {
    #[error("{0}")]
    AuthorizationDenied(String),

    #[error("{0}")]
    NetworkFailure(String),

    #[error("{0}")]
    MalformedResponse(String),

    #[error("{0}")]
    ValidationRejected(String),

    #[error("Popups are blocked. Please allow popups for this site and try again.")]
    PopupBlocked,

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Security error: {0}")]
    SecurityError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DocdeskError {
    /// Short machine-readable label, used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            DocdeskError::AuthorizationDenied(_) => "authorization_denied",
            DocdeskError::NetworkFailure(_) => "network_failure",
            DocdeskError::MalformedResponse(_) => "malformed_response",
            DocdeskError::ValidationRejected(_) => "validation_rejected",
            DocdeskError::PopupBlocked => "popup_blocked",
            DocdeskError::Storage(_) => "storage",
            DocdeskError::Config(_) => "config",
            DocdeskError::SecurityError(_) => "security",
            DocdeskError::Serialization(_) => "serialization",
        }
    }
}

impl From<reqwest::Error> for DocdeskError {
    fn from(err: reqwest::Error) -> Self {
        DocdeskError::NetworkFailure(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DocdeskError>;
