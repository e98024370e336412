//! Axum router: maps all URL paths to handlers.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use tower_http::{
    compression::CompressionLayer,
    services::ServeDir,
    trace::TraceLayer,
};

use crate::auth::{require_same_origin, require_session};
use crate::handlers::{
    api::{dismiss_notification, healthz, list_notifications},
    dashboard::{dashboard_page, files_fragment, query_submit, remove_file, upload},
    login::{auth_callback, login_page, login_submit, logout, oauth_submit},
};
use crate::sse::sse_handler;
use crate::state::SharedState;

/// Build and return the full Axum router.
pub fn build_router(state: impl Into<SharedState>) -> Router {
    let shared: SharedState = state.into();
    let static_dir = shared
        .config
        .server
        .static_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/static")));
    let body_limit = shared.config.server.max_request_bytes;

    let protected = Router::new()
        .route("/dashboard",                   get(dashboard_page))
        // Uploads are bounded per file while streaming, not by the body limit.
        .route("/dashboard/upload",            post(upload).layer(DefaultBodyLimit::disable()))
        .route("/dashboard/query",             post(query_submit))
        .route("/dashboard/files",             get(files_fragment))
        .route("/dashboard/files/{id}/remove", post(remove_file))
        .route_layer(middleware::from_fn_with_state(shared.clone(), require_session));

    Router::new()
        // Pages
        .route("/",                       get(login_page))
        .route("/login",                  post(login_submit))
        .route("/logout",                 post(logout))
        .route("/auth/oauth/{provider}",  post(oauth_submit))
        .route("/auth/callback",          get(auth_callback))
        .merge(protected)

        // SSE streaming
        .route("/api/events", get(sse_handler))

        // API endpoints
        .route("/api/notifications",              get(list_notifications))
        .route("/api/notifications/{id}/dismiss", post(dismiss_notification))
        .route("/healthz",                        get(healthz))

        // Static files
        .nest_service("/static", ServeDir::new(static_dir))

        // Middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(require_same_origin))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
