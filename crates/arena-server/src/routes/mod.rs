//! HTTP route handlers.

pub mod chat;

use std::sync::Arc;

use axum::routing::post;
use axum::Router;
use tower_http::cors::CorsLayer;

use arena_relay::ChatTarget;

use crate::state::AppState;

/// Build the router over the given state.
pub fn build_router<T: ChatTarget + 'static>(state: Arc<AppState<T>>) -> Router {
    Router::new()
        .route("/chat", post(chat::chat::<T>))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
