//! Document service interface.

use async_trait::async_trait;
use docdesk_common::Result;

use crate::models::FileUpload;

/// The external collaborator that ingests documents and answers queries.
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Send one file for ingestion. Ok only for a 2xx reply.
    async fn upload(&self, file: &FileUpload) -> Result<()>;

    /// Ask a question. Returns the raw body of a 2xx reply, which may be empty.
    async fn query(&self, message: &str) -> Result<String>;

    /// Whether the service reports itself healthy.
    async fn health(&self) -> Result<bool>;
}
