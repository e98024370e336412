//! Configuration loading for Docdesk.
//! Reads docdesk.toml (or docdesk.yaml) from the current directory or the path
//! in the DOCDESK_CONFIG env var, then applies DOCDESK_* environment overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

pub const CONFIG_ENV: &str = "DOCDESK_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "docdesk.toml";

/// MIME types the document service can ingest.
pub const DEFAULT_ALLOWED_MIME_TYPES: [&str; 4] = [
    "application/pdf",
    "text/plain",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub documents: DocumentServiceConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory served under /static. Defaults to the web crate's bundled assets.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
    /// Upper bound for form and JSON request bodies. Uploads are bounded by
    /// `documents.max_upload_bytes` and `documents.max_batch_bytes` instead.
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
}

fn default_host()              -> String { "127.0.0.1".to_string() }
fn default_port()              -> u16    { 3000 }
fn default_max_request_bytes() -> usize  { 2 * 1024 * 1024 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
            max_request_bytes: default_max_request_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Emails permitted to sign in. Compared case-insensitively.
    #[serde(default)]
    pub allowed_emails: Vec<String>,
    /// Whether the allow-list-only email/password form is offered.
    #[serde(default = "bool_true")]
    pub password_sign_in: bool,
    #[serde(default)]
    pub google: GoogleOAuthConfig,
}

fn bool_true() -> bool { true }

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            allowed_emails: Vec::new(),
            password_sign_in: true,
            google: GoogleOAuthConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleOAuthConfig {
    /// OAuth client id handed to the browser token flow. Empty disables Google sign-in.
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_userinfo_url")]
    pub userinfo_url: String,
    #[serde(default = "default_scope")]
    pub scope: String,
}

fn default_userinfo_url() -> String { "https://www.googleapis.com/oauth2/v3/userinfo".to_string() }
fn default_scope()        -> String { "email profile openid".to_string() }

impl Default for GoogleOAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            userinfo_url: default_userinfo_url(),
            scope: default_scope(),
        }
    }
}

impl GoogleOAuthConfig {
    pub fn enabled(&self) -> bool {
        !self.client_id.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_upload_path")]
    pub upload_path: String,
    #[serde(default = "default_query_path")]
    pub query_path: String,
    #[serde(default = "default_health_path")]
    pub health_path: String,
    /// Probe the health endpoint at startup; when off the service is assumed online.
    #[serde(default)]
    pub health_check: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Accepted bytes held in memory for one upload request.
    #[serde(default = "default_max_batch_bytes")]
    pub max_batch_bytes: u64,
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
}

fn default_base_url()         -> String { "http://127.0.0.1:5678".to_string() }
fn default_upload_path()      -> String { "webhook/upload".to_string() }
fn default_query_path()       -> String { "webhook/query".to_string() }
fn default_health_path()      -> String { "health".to_string() }
fn default_timeout_secs()     -> u64    { 120 }
fn default_max_upload_bytes() -> u64    { 10 * 1024 * 1024 }
fn default_max_batch_bytes()  -> u64    { 64 * 1024 * 1024 }
fn default_allowed_mime_types() -> Vec<String> {
    DEFAULT_ALLOWED_MIME_TYPES.iter().map(|s| s.to_string()).collect()
}

impl Default for DocumentServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            upload_path: default_upload_path(),
            query_path: default_query_path(),
            health_path: default_health_path(),
            health_check: false,
            timeout_secs: default_timeout_secs(),
            max_upload_bytes: default_max_upload_bytes(),
            max_batch_bytes: default_max_batch_bytes(),
            allowed_mime_types: default_allowed_mime_types(),
        }
    }
}

impl DocumentServiceConfig {
    pub fn upload_url(&self) -> String { join_url(&self.base_url, &self.upload_path) }
    pub fn query_url(&self)  -> String { join_url(&self.base_url, &self.query_path) }
    pub fn health_url(&self) -> String { join_url(&self.base_url, &self.health_path) }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 { 5 }

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { ttl_secs: default_ttl_secs() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,
}

fn default_session_path() -> PathBuf { PathBuf::from(".docdesk/session.json") }

impl Default for StorageConfig {
    fn default() -> Self {
        Self { session_path: default_session_path() }
    }
}


impl Config {
    /// Load configuration from docdesk.toml.
    /// Checks DOCDESK_CONFIG env var first, then current directory. A missing
    /// file yields the defaults; environment overrides are applied either way.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_ENV)
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut config = if Path::new(&path).exists() {
            Self::from_file(Path::new(&path))?
        } else {
            tracing::info!(%path, "config file not found, using defaults");
            Config::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file, choosing YAML for .yaml/.yml and TOML otherwise.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|source| ConfigError::Yaml { path: path.to_path_buf(), source }),
            _ => toml::from_str(&content)
                .map_err(|source| ConfigError::Toml { path: path.to_path_buf(), source }),
        }
    }

    /// Apply DOCDESK_* overrides. `lookup` is the environment in production.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("DOCDESK_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("DOCDESK_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::Invalid {
                key: "DOCDESK_PORT".into(),
                reason: format!("not a port number: {}", port),
            })?;
        }
        if let Some(url) = lookup("DOCDESK_SERVICE_URL") {
            self.documents.base_url = url;
        }
        if let Some(emails) = lookup("DOCDESK_ALLOWED_EMAILS") {
            self.auth.allowed_emails = emails
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(client_id) = lookup("DOCDESK_GOOGLE_CLIENT_ID") {
            self.auth.google.client_id = client_id;
        }
        if let Some(path) = lookup("DOCDESK_SESSION_PATH") {
            self.storage.session_path = PathBuf::from(path);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notifications.ttl_secs == 0 {
            return Err(invalid("notifications.ttl_secs", "must be greater than zero"));
        }
        if self.documents.max_upload_bytes == 0 {
            return Err(invalid("documents.max_upload_bytes", "must be greater than zero"));
        }
        if self.documents.max_batch_bytes < self.documents.max_upload_bytes {
            return Err(invalid("documents.max_batch_bytes", "must be at least documents.max_upload_bytes"));
        }
        if self.documents.allowed_mime_types.is_empty() {
            return Err(invalid("documents.allowed_mime_types", "must list at least one type"));
        }
        Url::parse(&self.documents.base_url)
            .map_err(|e| invalid("documents.base_url", &e.to_string()))?;
        if self.auth.google.enabled() {
            Url::parse(&self.auth.google.userinfo_url)
                .map_err(|e| invalid("auth.google.userinfo_url", &e.to_string()))?;
        }
        if self.auth.allowed_emails.is_empty() {
            tracing::warn!("auth.allowed_emails is empty: every sign-in will be refused");
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { key: key.to_string(), reason: reason.to_string() }
}
