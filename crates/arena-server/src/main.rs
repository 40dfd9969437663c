//! arena-relay — headless browser worker exposing lmarena.ai chats over HTTP.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use arena_browser::SessionManager;
use arena_core::RelayConfig;
use arena_relay::{BrowserChatTarget, Relay};
use arena_server::routes;
use arena_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RelayConfig::from_env();

    // The session must be ready before any request is accepted. A startup
    // failure is fatal; the supervising process restarts and retries.
    let session = Arc::new(SessionManager::new(
        config.browser.clone(),
        config.upstream.base_url.clone(),
    ));
    if let Err(e) = session.initialize().await {
        error!(error = %e, "browser session failed to start");
        return Err(e.into());
    }

    let target = Arc::new(BrowserChatTarget::new(session, config.upstream.clone()));
    let relay = Relay::new(target, config.upstream.clone());
    let state = Arc::new(AppState {
        config: config.clone(),
        relay,
    });

    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("arena-relay listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
