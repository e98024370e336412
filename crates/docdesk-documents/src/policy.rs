//! What the document service accepts.

use docdesk_common::{DocdeskError, Result};
use docdesk_config::DocumentServiceConfig;

use crate::models::FileUpload;

#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub allowed_mime_types: Vec<String>,
    pub max_bytes: u64,
    /// Accepted bytes one upload request may hold in memory.
    pub max_batch_bytes: u64,
}

impl UploadPolicy {
    pub fn from_config(config: &DocumentServiceConfig) -> Self {
        Self {
            allowed_mime_types: config.allowed_mime_types.clone(),
            max_bytes: config.max_upload_bytes,
            max_batch_bytes: config.max_batch_bytes,
        }
    }

    pub fn accepts_type(&self, mime: &str) -> bool {
        let mime = mime.trim();
        self.allowed_mime_types.iter().any(|allowed| allowed.eq_ignore_ascii_case(mime))
    }

    /// How many bytes of the next file may be held, given `buffered` bytes
    /// already kept for the same request.
    pub fn buffer_allowance(&self, buffered: u64) -> u64 {
        self.max_bytes.min(self.max_batch_bytes.saturating_sub(buffered))
    }

    /// Type first, then size, then whether the file could be held at all;
    /// the first failure is the one reported.
    pub fn check(&self, file: &FileUpload) -> Result<()> {
        if !self.accepts_type(&file.mime_type) {
            return Err(DocdeskError::ValidationRejected(format!(
                "File type not supported: {}",
                file.name
            )));
        }
        if file.size() > self.max_bytes {
            return Err(DocdeskError::ValidationRejected(format!(
                "File too large: {} (max {})",
                file.name,
                human_size(self.max_bytes)
            )));
        }
        if !file.is_buffered() {
            return Err(DocdeskError::ValidationRejected(format!(
                "Not uploaded: {} exceeds the {} limit for one upload",
                file.name,
                human_size(self.max_batch_bytes)
            )));
        }
        Ok(())
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::from_config(&DocumentServiceConfig::default())
    }
}

/// "10MB" style label for a byte limit.
fn human_size(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    const KIB: u64 = 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else if bytes >= KIB && bytes % KIB == 0 {
        format!("{}KB", bytes / KIB)
    } else {
        format!("{} bytes", bytes)
    }
}
