//! docdesk-documents: the dashboard's conversation with the document service.
//!
//! Uploads and queries are forwarded to external webhooks; this crate
//! validates what goes out, interprets what comes back, keeps the per-file
//! and per-query records, and reports every outcome as a notification.

pub mod dashboard;
pub mod models;
pub mod policy;
pub mod response;
pub mod service;
pub mod webhook;

pub use dashboard::{Dashboard, StagedUpload};
pub use models::{FileStatus, FileUpload, QueryResult, ServiceStatus, UploadedFile};
pub use policy::UploadPolicy;
pub use service::DocumentService;
pub use webhook::WebhookClient;
