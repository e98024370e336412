//! Shared testing utilities for Docdesk crates.
//!
//! - [`StubServer`]: a loopback HTTP server that answers canned responses and
//!   records every request, standing in for the document-service webhooks and
//!   the OAuth profile endpoint.
//! - [`fixtures`]: sample files and payloads.

pub mod fixtures;
pub mod stub_server;

pub use axum::http::Method;
pub use pretty_assertions;
pub use stub_server::{RecordedRequest, StubResponse, StubServer};
