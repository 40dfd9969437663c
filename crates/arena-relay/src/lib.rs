//! Streaming relay — converts one chat request into an authenticated task
//! executed inside the browser context and streams its output back chunk by
//! chunk.

pub mod browser_target;
pub mod relay;
pub mod script;
pub mod types;

pub use browser_target::BrowserChatTarget;
pub use relay::{ChatTarget, ChunkStream, Relay};
pub use types::*;
