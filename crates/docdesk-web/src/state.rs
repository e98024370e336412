//! Shared application state for the web server.

use std::sync::Arc;
use std::time::Duration;

use docdesk_common::SandboxClient;
use docdesk_config::{AuthConfig, Config};
use docdesk_documents::{Dashboard, UploadPolicy, WebhookClient};
use docdesk_notify::NotificationStore;
use docdesk_session::{
    AuthorizationList, HttpProfileFetcher, JsonFileStore, OAuthProvider, SessionSettings, SessionStore,
};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::info;

use crate::templates::Templates;

/// Dashboard changes pushed to connected clients via SSE.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// A batch of uploads settled; the file list should be refreshed.
    FilesSettled { completed: usize, failed: usize },
}

/// Shared state injected into every Axum handler.
pub struct AppState {
    pub config: Config,
    pub session: SessionStore,
    pub dashboard: Dashboard,
    pub notifications: NotificationStore,
    pub templates: Templates,
    /// Broadcast channel for SSE push events
    pub event_tx: broadcast::Sender<AppEvent>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        config: Config,
        session: SessionStore,
        dashboard: Dashboard,
        notifications: NotificationStore,
    ) -> anyhow::Result<Self> {
        let (event_tx, _) = broadcast::channel(256);
        Ok(Self {
            config,
            session,
            dashboard,
            notifications,
            templates: Templates::new()?,
            event_tx,
        })
    }

    /// Wire the production collaborators described by `config`.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let notifications = NotificationStore::new(Duration::from_secs(config.notifications.ttl_secs));

        let mut http = SandboxClient::new(Duration::from_secs(config.documents.timeout_secs))?;
        http.allow_url(&config.documents.base_url)?;
        if config.auth.google.enabled() {
            http.allow_url(&config.auth.google.userinfo_url)?;
        }

        let session = SessionStore::restore(
            session_settings(&config.auth),
            Arc::new(JsonFileStore::new(&config.storage.session_path)),
            Arc::new(HttpProfileFetcher::new(http.clone(), config.auth.google.userinfo_url.clone())),
            notifications.clone(),
        )
        .await?;
        info!(
            path = %config.storage.session_path.display(),
            signed_in = session.is_authenticated().await,
            "session restored"
        );

        let dashboard = Dashboard::new(
            Arc::new(WebhookClient::new(http, &config.documents)),
            notifications.clone(),
            UploadPolicy::from_config(&config.documents),
        );

        Self::new(config, session, dashboard, notifications)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.event_tx.subscribe()
    }
}

pub fn session_settings(auth: &AuthConfig) -> SessionSettings {
    let mut oauth_clients = std::collections::HashMap::new();
    if auth.google.enabled() {
        oauth_clients.insert(OAuthProvider::Google, auth.google.client_id.clone());
    }
    SessionSettings {
        allow_list: AuthorizationList::new(auth.allowed_emails.iter()),
        password_sign_in: auth.password_sign_in,
        oauth_clients,
    }
}
