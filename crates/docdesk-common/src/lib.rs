//! docdesk-common: Shared types, errors, and the outbound HTTP client used across all Docdesk crates.

pub mod error;
pub mod entities;
pub mod sandbox;

// Re-export commonly used types
pub use entities::{Identity, IdentityProvider, Notification, Route, Severity};
pub use error::{DocdeskError, Result};
pub use sandbox::SandboxClient;
