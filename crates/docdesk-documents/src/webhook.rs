//! Webhook-backed document service.

use async_trait::async_trait;
use docdesk_common::{DocdeskError, Result, SandboxClient};
use docdesk_config::DocumentServiceConfig;
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use tracing::instrument;

use crate::models::FileUpload;
use crate::service::DocumentService;

/// Multipart field the upload webhook reads the file from.
pub const UPLOAD_FIELD: &str = "data";

/// Talks to the upload, query and health endpoints of the document service.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    http: SandboxClient,
    upload_url: String,
    query_url: String,
    health_url: String,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    message: &'a str,
}

impl WebhookClient {
    pub fn new(http: SandboxClient, config: &DocumentServiceConfig) -> Self {
        Self {
            http,
            upload_url: config.upload_url(),
            query_url: config.query_url(),
            health_url: config.health_url(),
        }
    }
}

#[async_trait]
impl DocumentService for WebhookClient {
    #[instrument(skip(self, file), fields(name = %file.name, size = file.size()))]
    async fn upload(&self, file: &FileUpload) -> Result<()> {
        let mut part = Part::bytes(file.bytes.clone()).file_name(file.name.clone());
        if !file.mime_type.is_empty() {
            part = part.mime_str(&file.mime_type)?;
        }
        let form = Form::new().part(UPLOAD_FIELD, part);

        let resp = self
            .http
            .post(&self.upload_url)?
            .header(ACCEPT, "*/*")
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(%status, "upload rejected by document service");
            return Err(DocdeskError::NetworkFailure(format!(
                "Server responded with {}",
                status.as_u16()
            )));
        }
        tracing::debug!("upload accepted");
        Ok(())
    }

    #[instrument(skip(self, message))]
    async fn query(&self, message: &str) -> Result<String> {
        let resp = self
            .http
            .post(&self.query_url)?
            .json(&QueryRequest { message })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(%status, "query rejected by document service");
            return Err(DocdeskError::NetworkFailure("Query failed".to_string()));
        }
        Ok(resp.text().await?)
    }

    async fn health(&self) -> Result<bool> {
        let resp = self.http.get(&self.health_url)?.send().await?;
        Ok(resp.status().is_success())
    }
}
