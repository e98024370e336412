//! docdesk-session: who is signed in, and whether they may see a view.
//!
//!   - `allowlist`: static email allow-list consulted at sign-in
//!   - `persistence`: the single persisted session record
//!   - `oauth`: token flow and profile collaborators
//!   - `store`: the Anonymous/Authenticated state machine
//!   - `guard`: admission control for protected views

pub mod allowlist;
pub mod guard;
pub mod oauth;
pub mod persistence;
pub mod store;

pub use allowlist::AuthorizationList;
pub use guard::{guard, Admission};
pub use oauth::{AccessToken, BrowserGrant, HttpProfileFetcher, OAuthFlow, OAuthProvider, Profile, ProfileFetcher};
pub use persistence::{JsonFileStore, MemoryStore, SessionPersistence};
pub use store::{user_message, SessionSettings, SessionState, SessionStore, SignIn};
