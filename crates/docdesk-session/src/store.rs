//! Session store: the single current identity and its persistence.
//!
//! States are `Anonymous` and `Authenticated`. Either sign-in variant moves
//! Anonymous → Authenticated; `sign_out` moves back. Persistence and the
//! in-memory swap happen under one write lock, so readers never observe a
//! half-applied transition.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use docdesk_common::{DocdeskError, Identity, IdentityProvider, Result, Route};
use docdesk_notify::NotificationStore;
use secrecy::SecretString;
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

use crate::allowlist::AuthorizationList;
use crate::oauth::{OAuthFlow, OAuthProvider, ProfileFetcher};
use crate::persistence::SessionPersistence;

const UNAUTHORIZED: &str = "Unauthorized email address";
const SIGN_OUT_INCOMPLETE: &str =
    "Signed out, but the saved session could not be removed. You may be signed in again after a restart.";
const CLEAR_ATTEMPTS: u32 = 3;
const CLEAR_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Authenticated(Identity),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            SessionState::Anonymous => None,
        }
    }
}

/// A sign-in attempt. Both variants go through [`SessionStore::sign_in`].
pub enum SignIn<'a> {
    /// Allow-list check only; the password is accepted but not verified.
    Password { email: String, password: SecretString },
    /// Provider consent flow, then profile lookup, then allow-list check.
    OAuth { provider: OAuthProvider, flow: &'a dyn OAuthFlow },
}

/// Static sign-in policy.
#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    pub allow_list: AuthorizationList,
    pub password_sign_in: bool,
    /// Client id per enabled provider.
    pub oauth_clients: HashMap<OAuthProvider, String>,
}

pub struct SessionStore {
    current: RwLock<Option<Identity>>,
    persistence: Arc<dyn SessionPersistence>,
    profiles: Arc<dyn ProfileFetcher>,
    notifications: NotificationStore,
    settings: SessionSettings,
}

impl SessionStore {
    /// Build the store, deriving the initial state from the persisted record.
    ///
    /// An unreadable record, or one whose email is no longer allow-listed, is
    /// cleared and the store starts Anonymous.
    pub async fn restore(
        settings: SessionSettings,
        persistence: Arc<dyn SessionPersistence>,
        profiles: Arc<dyn ProfileFetcher>,
        notifications: NotificationStore,
    ) -> Result<Self> {
        let current = match persistence.load().await {
            Ok(Some(identity)) if settings.allow_list.permits(&identity.email) => {
                info!(email = %identity.email, "restored persisted session");
                Some(identity)
            }
            Ok(Some(identity)) => {
                warn!(email = %identity.email, "persisted identity no longer allow-listed, clearing");
                persistence.clear().await?;
                None
            }
            Ok(None) => None,
            Err(DocdeskError::Serialization(e)) => {
                warn!(error = %e, "persisted session unreadable, clearing");
                persistence.clear().await?;
                None
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            current: RwLock::new(current),
            persistence,
            profiles,
            notifications,
            settings,
        })
    }

    pub async fn state(&self) -> SessionState {
        match self.current.read().await.as_ref() {
            Some(identity) => SessionState::Authenticated(identity.clone()),
            None => SessionState::Anonymous,
        }
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.current.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.current.read().await.is_some()
    }

    pub fn password_sign_in_enabled(&self) -> bool {
        self.settings.password_sign_in
    }

    pub fn oauth_client_id(&self, provider: OAuthProvider) -> Option<&str> {
        self.settings.oauth_clients.get(&provider).map(String::as_str)
    }

    /// Single sign-in entry point. On success returns the view to navigate to.
    ///
    /// Password failures are returned to the caller without side effects.
    /// OAuth failures additionally publish one error notification.
    pub async fn sign_in(&self, request: SignIn<'_>) -> Result<Route> {
        match request {
            SignIn::Password { email, password: _ } => {
                let identity = self.check_password_sign_in(email)?;
                self.establish(identity).await
            }
            SignIn::OAuth { provider, flow } => {
                let result = match self.resolve_oauth(provider, flow).await {
                    Ok(identity) => self.establish(identity).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = &result {
                    warn!(%provider, kind = e.kind(), error = %e, "oauth sign-in failed");
                    self.notifications.error(user_message(e));
                }
                result
            }
        }
    }

    /// Clear the identity and the persisted record.
    ///
    /// The in-memory state is Anonymous afterwards in every case. Clearing
    /// storage is retried; if the record still cannot be removed the user is
    /// told they may be signed back in on restart, and the error is returned.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<Route> {
        let mut current = self.current.write().await;
        let previous = current.take();
        if let Err(e) = self.clear_persisted().await {
            error!(error = %e, "persisted session left behind after sign-out");
            self.notifications.error(SIGN_OUT_INCOMPLETE);
            return Err(e);
        }
        if let Some(identity) = previous {
            info!(email = %identity.email, "signed out");
        }
        Ok(Route::Login)
    }

    async fn clear_persisted(&self) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.persistence.clear().await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < CLEAR_ATTEMPTS => {
                    warn!(attempt, error = %e, "clearing persisted session failed, retrying");
                    tokio::time::sleep(CLEAR_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn check_password_sign_in(&self, email: String) -> Result<Identity> {
        if !self.settings.password_sign_in {
            return Err(DocdeskError::ValidationRejected(
                "Email sign-in is disabled".to_string(),
            ));
        }
        let email = email.trim().to_string();
        if !self.settings.allow_list.permits(&email) {
            warn!(%email, "password sign-in refused: not allow-listed");
            return Err(DocdeskError::AuthorizationDenied(UNAUTHORIZED.to_string()));
        }
        Ok(Identity::password(email))
    }

    async fn resolve_oauth(&self, provider: OAuthProvider, flow: &dyn OAuthFlow) -> Result<Identity> {
        if !flow.popup_available() {
            return Err(DocdeskError::PopupBlocked);
        }
        let client_id = self.oauth_client_id(provider).ok_or_else(|| {
            DocdeskError::ValidationRejected(format!("{} sign-in is not configured", provider.name()))
        })?;

        let token = flow.authorize(provider, client_id).await?;
        let profile = self.profiles.fetch_profile(&token).await.map_err(|e| {
            warn!(%provider, error = %e, "profile lookup failed");
            DocdeskError::NetworkFailure("Failed to get user info".to_string())
        })?;
        // The token is only needed for the profile lookup.
        drop(token);

        if !self.settings.allow_list.permits(&profile.email) {
            warn!(email = %profile.email, %provider, "oauth sign-in refused: not allow-listed");
            return Err(DocdeskError::AuthorizationDenied(UNAUTHORIZED.to_string()));
        }

        Ok(Identity {
            email: profile.email,
            display_name: profile.name,
            avatar_url: profile.picture,
            provider: IdentityProvider::OAuth,
        })
    }

    async fn establish(&self, identity: Identity) -> Result<Route> {
        let mut current = self.current.write().await;
        self.persistence.save(&identity).await?;
        info!(email = %identity.email, provider = ?identity.provider, "signed in");
        *current = Some(identity);
        Ok(Route::Dashboard)
    }
}

/// Notification text for a failed sign-in.
pub fn user_message(err: &DocdeskError) -> String {
    match err {
        DocdeskError::Storage(_) | DocdeskError::Serialization(_) => {
            "Could not save your session. Please try again.".to_string()
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::{AccessToken, BrowserGrant, Profile};
    use crate::persistence::MemoryStore;
    use async_trait::async_trait;
    use docdesk_common::Severity;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubProfiles {
        profile: Option<Profile>,
        calls: AtomicUsize,
    }

    impl StubProfiles {
        fn returning(email: &str) -> Arc<Self> {
            Arc::new(Self {
                profile: Some(Profile {
                    email: email.to_string(),
                    name: Some("Analyst".into()),
                    picture: Some("https://example.com/a.png".into()),
                }),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { profile: None, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl ProfileFetcher for StubProfiles {
        async fn fetch_profile(&self, token: &AccessToken) -> Result<Profile> {
            assert_eq!(token.expose(), "token-1");
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.profile
                .clone()
                .ok_or_else(|| DocdeskError::NetworkFailure("503".into()))
        }
    }

    fn settings() -> SessionSettings {
        SessionSettings {
            allow_list: AuthorizationList::new(["analyst@example.com"]),
            password_sign_in: true,
            oauth_clients: HashMap::from([(OAuthProvider::Google, "client-1".to_string())]),
        }
    }

    async fn store_with(
        persistence: Arc<MemoryStore>,
        profiles: Arc<StubProfiles>,
    ) -> (SessionStore, NotificationStore) {
        let notifications = NotificationStore::default();
        let store = SessionStore::restore(settings(), persistence, profiles, notifications.clone())
            .await
            .unwrap();
        (store, notifications)
    }

    fn password(email: &str) -> SignIn<'static> {
        SignIn::Password { email: email.to_string(), password: SecretString::from("anything".to_string()) }
    }

    #[tokio::test]
    async fn password_sign_in_for_allow_listed_email() {
        let persistence = Arc::new(MemoryStore::new());
        let (store, notifications) = store_with(persistence.clone(), StubProfiles::failing()).await;

        let route = store.sign_in(password("Analyst@Example.com")).await.unwrap();

        assert_eq!(route, Route::Dashboard);
        assert!(store.is_authenticated().await);
        let persisted = persistence.peek().unwrap();
        assert_eq!(persisted.provider, IdentityProvider::Password);
        assert_eq!(persisted.email, "Analyst@Example.com");
        assert!(notifications.is_empty(), "password path leaves notifying to the caller");
    }

    #[tokio::test]
    async fn unknown_emails_never_authenticate() {
        let persistence = Arc::new(MemoryStore::new());
        let (store, _) = store_with(persistence.clone(), StubProfiles::failing()).await;

        for email in ["intruder@example.com", "ANALYST@example.org", "", "analyst@example.com.evil"] {
            let err = store.sign_in(password(email)).await.unwrap_err();
            assert!(matches!(err, DocdeskError::AuthorizationDenied(_)), "{}", email);
            assert_eq!(store.state().await, SessionState::Anonymous);
        }
        assert!(persistence.peek().is_none());
    }

    #[tokio::test]
    async fn password_sign_in_can_be_disabled() {
        let mut settings = settings();
        settings.password_sign_in = false;
        let store = SessionStore::restore(
            settings,
            Arc::new(MemoryStore::new()),
            StubProfiles::failing(),
            NotificationStore::default(),
        )
        .await
        .unwrap();

        let err = store.sign_in(password("analyst@example.com")).await.unwrap_err();
        assert!(matches!(err, DocdeskError::ValidationRejected(_)));
        assert!(!store.is_authenticated().await);
    }

    #[tokio::test]
    async fn oauth_sign_in_creates_oauth_identity() {
        let persistence = Arc::new(MemoryStore::new());
        let profiles = StubProfiles::returning("analyst@example.com");
        let (store, notifications) = store_with(persistence.clone(), profiles.clone()).await;

        let grant = BrowserGrant::Token(AccessToken::new("token-1"));
        let route = store
            .sign_in(SignIn::OAuth { provider: OAuthProvider::Google, flow: &grant })
            .await
            .unwrap();

        assert_eq!(route, Route::Dashboard);
        let identity = store.identity().await.unwrap();
        assert_eq!(identity.provider, IdentityProvider::OAuth);
        assert_eq!(identity.display_name.as_deref(), Some("Analyst"));
        assert_eq!(persistence.peek(), Some(identity));
        assert!(notifications.is_empty());
    }

    #[tokio::test]
    async fn oauth_unlisted_email_notifies_and_stays_anonymous() {
        let persistence = Arc::new(MemoryStore::new());
        let (store, notifications) =
            store_with(persistence.clone(), StubProfiles::returning("stranger@example.com")).await;

        let grant = BrowserGrant::Token(AccessToken::new("token-1"));
        let err = store
            .sign_in(SignIn::OAuth { provider: OAuthProvider::Google, flow: &grant })
            .await
            .unwrap_err();

        assert!(matches!(err, DocdeskError::AuthorizationDenied(_)));
        assert!(!store.is_authenticated().await);
        assert!(persistence.peek().is_none());
        let shown = notifications.snapshot();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].message, "Unauthorized email address");
        assert_eq!(shown[0].severity, Severity::Error);
    }

    #[tokio::test]
    async fn popup_blocked_is_reported_before_the_flow_runs() {
        let profiles = StubProfiles::returning("analyst@example.com");
        let (store, notifications) = store_with(Arc::new(MemoryStore::new()), profiles.clone()).await;

        let err = store
            .sign_in(SignIn::OAuth { provider: OAuthProvider::Google, flow: &BrowserGrant::PopupBlocked })
            .await
            .unwrap_err();

        assert!(matches!(err, DocdeskError::PopupBlocked));
        assert_eq!(profiles.calls.load(Ordering::SeqCst), 0);
        assert!(notifications.snapshot()[0].message.contains("Popups are blocked"));
    }

    #[tokio::test]
    async fn profile_failure_is_reported_as_user_info_error() {
        let (store, notifications) =
            store_with(Arc::new(MemoryStore::new()), StubProfiles::failing()).await;

        let grant = BrowserGrant::Token(AccessToken::new("token-1"));
        let err = store
            .sign_in(SignIn::OAuth { provider: OAuthProvider::Google, flow: &grant })
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Failed to get user info");
        assert_eq!(notifications.len(), 1);
    }

    #[tokio::test]
    async fn sign_out_clears_state_for_every_provider() {
        let persistence = Arc::new(MemoryStore::new());
        let (store, _) =
            store_with(persistence.clone(), StubProfiles::returning("analyst@example.com")).await;

        store.sign_in(password("analyst@example.com")).await.unwrap();
        assert_eq!(store.sign_out().await.unwrap(), Route::Login);
        assert_eq!(store.state().await, SessionState::Anonymous);
        assert!(persistence.peek().is_none());

        let grant = BrowserGrant::Token(AccessToken::new("token-1"));
        store
            .sign_in(SignIn::OAuth { provider: OAuthProvider::Google, flow: &grant })
            .await
            .unwrap();
        store.sign_out().await.unwrap();
        assert_eq!(store.state().await, SessionState::Anonymous);
        assert!(persistence.peek().is_none());

        // Signing out twice is harmless.
        assert_eq!(store.sign_out().await.unwrap(), Route::Login);
    }

    /// Memory-backed storage whose `clear` fails a set number of times.
    struct FlakyStore {
        inner: MemoryStore,
        failures_left: AtomicUsize,
        clear_calls: AtomicUsize,
    }

    impl FlakyStore {
        fn failing(times: usize) -> Arc<Self> {
            Arc::new(Self {
                inner: MemoryStore::new(),
                failures_left: AtomicUsize::new(times),
                clear_calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SessionPersistence for FlakyStore {
        async fn load(&self) -> Result<Option<Identity>> {
            self.inner.load().await
        }

        async fn save(&self, identity: &Identity) -> Result<()> {
            self.inner.save(identity).await
        }

        async fn clear(&self) -> Result<()> {
            self.clear_calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(DocdeskError::Storage("disk busy".into()));
            }
            self.inner.clear().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sign_out_retries_a_failed_clear() {
        let persistence = FlakyStore::failing(CLEAR_ATTEMPTS as usize - 1);
        let notifications = NotificationStore::default();
        let store = SessionStore::restore(settings(), persistence.clone(), StubProfiles::failing(), notifications.clone())
            .await
            .unwrap();

        store.sign_in(password("analyst@example.com")).await.unwrap();
        assert_eq!(store.sign_out().await.unwrap(), Route::Login);
        assert_eq!(persistence.clear_calls.load(Ordering::SeqCst), CLEAR_ATTEMPTS as usize);
        assert!(persistence.inner.peek().is_none());
        assert!(notifications.snapshot().iter().all(|n| n.message != SIGN_OUT_INCOMPLETE));
    }

    #[tokio::test(start_paused = true)]
    async fn sign_out_reports_a_record_left_on_disk() {
        let persistence = FlakyStore::failing(usize::MAX);
        let notifications = NotificationStore::default();
        let store = SessionStore::restore(settings(), persistence.clone(), StubProfiles::failing(), notifications.clone())
            .await
            .unwrap();

        store.sign_in(password("analyst@example.com")).await.unwrap();
        let err = store.sign_out().await.unwrap_err();
        assert!(matches!(err, DocdeskError::Storage(_)));
        assert_eq!(store.state().await, SessionState::Anonymous);
        assert_eq!(persistence.clear_calls.load(Ordering::SeqCst), CLEAR_ATTEMPTS as usize);

        let last = notifications.snapshot().pop().unwrap();
        assert_eq!(last.message, SIGN_OUT_INCOMPLETE);
        assert_eq!(last.severity, Severity::Error);
    }

    #[tokio::test]
    async fn restore_derives_initial_state_from_storage() {
        let persisted = Identity::password("analyst@example.com");
        let persistence = Arc::new(MemoryStore::with_identity(persisted.clone()));
        let (store, _) = store_with(persistence, StubProfiles::failing()).await;
        assert_eq!(store.state().await, SessionState::Authenticated(persisted));
    }

    #[tokio::test]
    async fn restore_drops_identities_no_longer_allow_listed() {
        let persistence = Arc::new(MemoryStore::with_identity(Identity::password("former@example.com")));
        let (store, _) = store_with(persistence.clone(), StubProfiles::failing()).await;
        assert_eq!(store.state().await, SessionState::Anonymous);
        assert!(persistence.peek().is_none());
    }
}
