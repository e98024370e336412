//! Request guards: the session check for protected routes and the
//! same-origin check for anything that changes state.

use axum::{
    body::Body,
    extract::State,
    http::{header, Method, Request, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use docdesk_session::{guard, Admission};

use crate::state::SharedState;

/// Lets authenticated requests through. Anyone else is sent to the login
/// page, or gets a bare 401 when the caller is a script rather than a
/// browser navigation.
pub async fn require_session(State(state): State<SharedState>, req: Request<Body>, next: Next) -> Response {
    match guard(&state.session.state().await) {
        Admission::Render => next.run(req).await,
        Admission::Redirect(route) => {
            tracing::debug!(path = %req.uri().path(), "unauthenticated request refused");
            if wants_html(&req) {
                Redirect::to(route.path()).into_response()
            } else {
                StatusCode::UNAUTHORIZED.into_response()
            }
        }
    }
}

/// Browser navigations send `Accept: text/html`; `fetch` defaults to `*/*`.
fn wants_html(req: &Request<Body>) -> bool {
    match req.headers().get(header::ACCEPT).and_then(|v| v.to_str().ok()) {
        Some(accept) => accept.contains("text/html"),
        None => true,
    }
}

/// Refuses state-changing requests sent from another site.
///
/// The session is server-wide, so a foreign page posting to `/dashboard/*`
/// would act as the signed-in user. Browsers label such requests with an
/// `Origin` that does not match `Host`, or with `Sec-Fetch-Site: cross-site`.
/// Requests carrying neither header (curl, tests) pass.
pub async fn require_same_origin(req: Request<Body>, next: Next) -> Response {
    if is_safe(req.method()) || !is_cross_site(&req) {
        return next.run(req).await;
    }
    tracing::warn!(method = %req.method(), path = %req.uri().path(), "cross-site request refused");
    StatusCode::FORBIDDEN.into_response()
}

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn is_cross_site(req: &Request<Body>) -> bool {
    let headers = req.headers();
    if headers.get("sec-fetch-site").and_then(|v| v.to_str().ok()) == Some("cross-site") {
        return true;
    }
    let Some(origin) = headers.get(header::ORIGIN) else {
        return false;
    };
    let origin_host = origin
        .to_str()
        .ok()
        .and_then(|o| o.parse::<Uri>().ok())
        .and_then(|uri| uri.authority().map(|a| a.as_str().to_ascii_lowercase()));
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_ascii_lowercase);
    match (origin_host, host) {
        (Some(origin_host), Some(host)) => origin_host != host,
        // Unreadable Origin, or no Host to compare against.
        _ => true,
    }
}
