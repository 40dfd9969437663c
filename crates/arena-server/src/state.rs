//! Shared application state.

use arena_core::RelayConfig;
use arena_relay::{ChatTarget, Relay};

/// State accessible from all route handlers, generic over the chat target
/// so tests can substitute scripted contexts.
pub struct AppState<T: ChatTarget> {
    pub config: RelayConfig,
    pub relay: Relay<T>,
}
