//! Docdesk web layer: pages, fragments, the live notification stream and
//! the session guard in front of the dashboard.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod router;
pub mod sse;
pub mod state;
pub mod templates;
