//! Production chat target backed by the browser session.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;

use arena_browser::{run_page_task, ChunkBridge, SessionManager};
use arena_core::{Result, UpstreamConfig};

use crate::relay::ChatTarget;
use crate::script::chat_task_script;
use crate::types::{TaskOutcome, UpstreamPayload};

/// Grace period after the task resolves, so binding events still in flight
/// on the CDP connection reach the forwarder before teardown.
const DRAIN_GRACE: Duration = Duration::from_millis(50);

/// Runs injected chat tasks in the single browser context.
pub struct BrowserChatTarget {
    session: Arc<SessionManager>,
    upstream: UpstreamConfig,
}

impl BrowserChatTarget {
    pub fn new(session: Arc<SessionManager>, upstream: UpstreamConfig) -> Self {
        Self { session, upstream }
    }
}

#[async_trait]
impl ChatTarget for BrowserChatTarget {
    fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    async fn run_chat(&self, payload: UpstreamPayload, chunks: mpsc::Sender<Bytes>) -> Result<()> {
        let page = self.session.page()?;

        let bridge = ChunkBridge::register(&page, chunks).await?;
        debug!(binding = bridge.binding_name(), "chat task bridge registered");

        let script = chat_task_script(bridge.binding_name(), &payload, &self.upstream)?;
        let resolved = run_page_task(&page, &script).await;

        tokio::time::sleep(DRAIN_GRACE).await;
        bridge.dispose(&page).await;

        TaskOutcome::from_value(resolved?)?.into_result()
    }
}
