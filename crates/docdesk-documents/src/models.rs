//! Dashboard records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A file picked by the user, before validation.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    /// MIME type as reported by the client; empty when unknown.
    pub mime_type: String,
    /// Empty when the file was too big to hold; see [`FileUpload::unbuffered`].
    pub bytes: Vec<u8>,
    size: u64,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        let size = bytes.len() as u64;
        Self { name: name.into(), mime_type: mime_type.into(), bytes, size }
    }

    /// A file that was read to the end but not kept in memory. It can be
    /// judged by type and size, never sent.
    pub fn unbuffered(name: impl Into<String>, mime_type: impl Into<String>, size: u64) -> Self {
        Self { name: name.into(), mime_type: mime_type.into(), bytes: Vec::new(), size }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_buffered(&self) -> bool {
        self.bytes.len() as u64 == self.size
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Processing,
    Completed,
    Error,
}

/// One accepted upload and where it stands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadedFile {
    pub id: Uuid,
    pub name: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub status: FileStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// One answered query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub id: Uuid,
    /// The question as submitted (trimmed).
    pub title: String,
    pub excerpt: String,
    pub relevance: f64,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Checking,
    #[default]
    Online,
    Offline,
}

impl ServiceStatus {
    pub fn is_online(&self) -> bool {
        matches!(self, ServiceStatus::Online)
    }
}
