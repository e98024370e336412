//! OAuth collaborators: the consent/token flow and the profile lookup.
//!
//! The token flow runs wherever the consent window lives (the browser, for
//! the web surface). Docdesk only sees its outcome, modelled by [`OAuthFlow`].
//! The profile lookup is an HTTP call made by the server with the token.

use async_trait::async_trait;
use docdesk_common::{DocdeskError, Result, SandboxClient};
use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OAuthProvider {
    Google,
}

impl OAuthProvider {
    pub fn id(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "Google",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for OAuthProvider {
    type Err = DocdeskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(OAuthProvider::Google),
            other => Err(DocdeskError::ValidationRejected(format!(
                "Unsupported sign-in provider: {}",
                other
            ))),
        }
    }
}

/// Bearer token returned by a provider. Never logged.
pub struct AccessToken(SecretString);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// Profile fields the provider reports for the token's owner.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// The provider's consent flow.
#[async_trait]
pub trait OAuthFlow: Send + Sync {
    /// Whether the consent window can be opened at all. Checked before `authorize`.
    fn popup_available(&self) -> bool {
        true
    }

    async fn authorize(&self, provider: OAuthProvider, client_id: &str) -> Result<AccessToken>;
}

/// Fetches the profile that belongs to an access token.
#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    async fn fetch_profile(&self, token: &AccessToken) -> Result<Profile>;
}

/// Outcome of a token flow that already ran in the browser and was posted back.
pub enum BrowserGrant {
    Token(AccessToken),
    PopupBlocked,
    Failed(String),
}

#[async_trait]
impl OAuthFlow for BrowserGrant {
    fn popup_available(&self) -> bool {
        !matches!(self, BrowserGrant::PopupBlocked)
    }

    async fn authorize(&self, provider: OAuthProvider, _client_id: &str) -> Result<AccessToken> {
        match self {
            BrowserGrant::Token(token) => Ok(AccessToken::new(token.expose())),
            BrowserGrant::PopupBlocked => Err(DocdeskError::PopupBlocked),
            BrowserGrant::Failed(reason) => {
                debug!(%provider, %reason, "browser token flow failed");
                Err(DocdeskError::AuthorizationDenied(format!("{} login failed", provider.name())))
            }
        }
    }
}

/// Profile lookup over HTTP (`GET` with bearer token, JSON body).
pub struct HttpProfileFetcher {
    client: SandboxClient,
    userinfo_url: String,
}

impl HttpProfileFetcher {
    pub fn new(client: SandboxClient, userinfo_url: impl Into<String>) -> Self {
        Self { client, userinfo_url: userinfo_url.into() }
    }
}

#[async_trait]
impl ProfileFetcher for HttpProfileFetcher {
    #[instrument(skip_all, fields(url = %self.userinfo_url))]
    async fn fetch_profile(&self, token: &AccessToken) -> Result<Profile> {
        let resp = self.client
            .get(&self.userinfo_url)?
            .bearer_auth(token.expose())
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DocdeskError::NetworkFailure(format!(
                "Profile endpoint responded with {}",
                status.as_u16()
            )));
        }

        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            DocdeskError::MalformedResponse(format!("Invalid profile response: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_case_insensitively() {
        assert_eq!("google".parse::<OAuthProvider>().unwrap(), OAuthProvider::Google);
        assert_eq!("Google".parse::<OAuthProvider>().unwrap(), OAuthProvider::Google);
        assert!("github".parse::<OAuthProvider>().is_err());
    }

    #[test]
    fn access_token_debug_is_redacted() {
        let token = AccessToken::new("ya29.secret");
        assert_eq!(format!("{:?}", token), "AccessToken([REDACTED])");
        assert_eq!(token.expose(), "ya29.secret");
    }

    #[test]
    fn profile_tolerates_missing_optional_fields() {
        let profile: Profile = serde_json::from_str(r#"{"email":"a@example.com"}"#).unwrap();
        assert_eq!(profile.email, "a@example.com");
        assert!(profile.name.is_none());
        assert!(profile.picture.is_none());
    }

    #[tokio::test]
    async fn browser_grant_maps_outcomes() {
        let grant = BrowserGrant::Token(AccessToken::new("t"));
        assert!(grant.popup_available());
        let token = grant.authorize(OAuthProvider::Google, "cid").await.unwrap();
        assert_eq!(token.expose(), "t");

        let blocked = BrowserGrant::PopupBlocked;
        assert!(!blocked.popup_available());
        assert!(matches!(
            blocked.authorize(OAuthProvider::Google, "cid").await,
            Err(DocdeskError::PopupBlocked)
        ));

        let failed = BrowserGrant::Failed("access_denied".into());
        let err = failed.authorize(OAuthProvider::Google, "cid").await.unwrap_err();
        assert_eq!(err.to_string(), "Google login failed");
    }
}
