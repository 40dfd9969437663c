//! Per-request chunk bridge.
//!
//! Each relay session registers its own CDP binding under a unique name and
//! carries that name into the injected task. Two concurrent sessions share
//! the single browser context but can never observe each other's chunks:
//! the forwarder filters binding events by name.

use bytes::Bytes;
use chromiumoxide::cdp::js_protocol::runtime::{
    AddBindingParams, EventBindingCalled, RemoveBindingParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use arena_core::{Error, Result};

/// Generate a unique, JS-identifier-safe binding name for one relay session.
pub fn fresh_binding_name() -> String {
    format!("__arenaRelay_{}", Uuid::new_v4().simple())
}

/// Chunk to forward for one binding event, or `None` when the event belongs
/// to another session's binding. All sessions share the page, so every
/// forwarder sees every binding call and must filter by its own name.
fn forwarded_chunk(event_name: &str, payload: &str, binding: &str) -> Option<Bytes> {
    (event_name == binding).then(|| Bytes::from(payload.to_string()))
}

/// A registered binding plus the task forwarding its calls into the
/// session's channel. Must be disposed on every exit path so the binding
/// does not outlive its HTTP response.
pub struct ChunkBridge {
    name: String,
    forwarder: JoinHandle<()>,
}

impl ChunkBridge {
    /// Register a request-scoped binding on the page. Calls to
    /// `window[name](chunk)` inside the page surface as `bindingCalled`
    /// events, which are forwarded as bytes into `chunks`.
    pub async fn register(page: &Page, chunks: mpsc::Sender<Bytes>) -> Result<Self> {
        let name = fresh_binding_name();

        let add = AddBindingParams::builder()
            .name(name.clone())
            .build()
            .map_err(Error::Browser)?;
        page.execute(add)
            .await
            .map_err(|e| Error::Browser(format!("binding registration failed: {e}")))?;

        let mut events = page
            .event_listener::<EventBindingCalled>()
            .await
            .map_err(|e| Error::Browser(format!("binding event subscription failed: {e}")))?;

        let binding = name.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let Some(chunk) = forwarded_chunk(&event.name, &event.payload, &binding) else {
                    continue;
                };
                // A failed send means the HTTP side hung up; stop forwarding
                // but let the in-page fetch run to completion.
                if chunks.send(chunk).await.is_err() {
                    debug!(%binding, "chunk receiver closed, dropping remaining chunks");
                    break;
                }
            }
        });

        Ok(Self { name, forwarder })
    }

    pub fn binding_name(&self) -> &str {
        &self.name
    }

    /// Remove the binding and stop the forwarder.
    pub async fn dispose(self, page: &Page) {
        match RemoveBindingParams::builder().name(self.name.clone()).build() {
            Ok(remove) => {
                if let Err(e) = page.execute(remove).await {
                    debug!(binding = %self.name, error = %e, "failed to remove binding");
                }
            }
            Err(e) => debug!(binding = %self.name, error = %e, "failed to build removeBinding"),
        }
        self.forwarder.abort();
    }
}
