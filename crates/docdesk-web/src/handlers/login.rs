//! Sign-in, OAuth hand-off and sign-out.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use docdesk_common::Route;
use docdesk_session::{user_message, AccessToken, BrowserGrant, OAuthProvider, SignIn};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::WebError;
use crate::state::SharedState;
use crate::templates::LoginView;

/// Value the browser sends in `error` when its test popup was blocked.
pub const POPUP_BLOCKED: &str = "popup_blocked";

// ── Form input ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// What the browser token client reports back.
#[derive(Deserialize, Default)]
pub struct OAuthForm {
    pub access_token: Option<String>,
    pub error: Option<String>,
}

impl OAuthForm {
    fn into_grant(self) -> BrowserGrant {
        match (self.access_token.filter(|t| !t.is_empty()), self.error) {
            (_, Some(error)) if error == POPUP_BLOCKED => BrowserGrant::PopupBlocked,
            (Some(token), None) => BrowserGrant::Token(AccessToken::new(token)),
            (_, Some(error)) => BrowserGrant::Failed(error),
            (None, None) => BrowserGrant::Failed("no access token returned".to_string()),
        }
    }
}

#[derive(Serialize)]
pub struct OAuthOutcome {
    pub ok: bool,
    pub redirect: &'static str,
}

// ── Handlers ──────────────────────────────────────────────────────────────────

pub async fn login_page(State(state): State<SharedState>) -> Result<Response, WebError> {
    render_login(&state, "", StatusCode::OK)
}

pub async fn login_submit(
    State(state): State<SharedState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, WebError> {
    if form.email.trim().is_empty() || form.password.is_empty() {
        state.notifications.error("Please enter both email and password");
        return render_login(&state, &form.email, StatusCode::BAD_REQUEST);
    }

    let request = SignIn::Password {
        email: form.email.clone(),
        password: SecretString::from(form.password),
    };
    match state.session.sign_in(request).await {
        Ok(route) => {
            state.notifications.success("Login successful!");
            Ok(Redirect::to(route.path()).into_response())
        }
        Err(e) => {
            info!(kind = e.kind(), "password sign-in refused");
            state.notifications.error(user_message(&e));
            render_login(&state, &form.email, StatusCode::UNAUTHORIZED)
        }
    }
}

/// Completes a browser-side OAuth flow. The session store publishes the
/// failure notification itself; the browser only needs to know where to go.
pub async fn oauth_submit(
    State(state): State<SharedState>,
    Path(provider): Path<String>,
    Form(form): Form<OAuthForm>,
) -> Response {
    let provider: OAuthProvider = match provider.parse() {
        Ok(p) => p,
        Err(e) => return (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    };

    let grant = form.into_grant();
    match state.session.sign_in(SignIn::OAuth { provider, flow: &grant }).await {
        Ok(route) => Json(OAuthOutcome { ok: true, redirect: route.path() }).into_response(),
        Err(_) => (
            StatusCode::UNAUTHORIZED,
            Json(OAuthOutcome { ok: false, redirect: Route::Login.path() }),
        )
            .into_response(),
    }
}

pub async fn auth_callback() -> Redirect {
    Redirect::to(Route::Dashboard.path())
}

pub async fn logout(State(state): State<SharedState>) -> Redirect {
    // A failed clear has already been reported to the user by the store.
    let route = match state.session.sign_out().await {
        Ok(route) => route,
        Err(e) => {
            warn!(error = %e, "could not clear persisted session");
            Route::Login
        }
    };
    state.dashboard.reset();
    Redirect::to(route.path())
}

fn render_login(state: &SharedState, email: &str, status: StatusCode) -> Result<Response, WebError> {
    let notifications = state.notifications.snapshot();
    let google = &state.config.auth.google;
    let page = state.templates.render(
        "login.html",
        LoginView {
            email,
            password_sign_in: state.session.password_sign_in_enabled(),
            google_client_id: state.session.oauth_client_id(OAuthProvider::Google),
            google_scope: &google.scope,
            notifications: &notifications,
        },
    )?;
    Ok((status, page).into_response())
}
