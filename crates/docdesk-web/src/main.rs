//! Docdesk Web Server
//!
//! Run with: cargo run -p docdesk-web

use std::net::SocketAddr;

use anyhow::Context;
use docdesk_config::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Docdesk...");

    let config = Config::load().context("loading configuration")?;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("server.host/server.port do not form a socket address")?;
    let health_check = config.documents.health_check;

    let state = docdesk_web::state::AppState::from_config(config).await?;
    if health_check {
        let status = state.dashboard.refresh_service_status().await;
        info!(?status, "document service probed");
    }

    let app = docdesk_web::router::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
