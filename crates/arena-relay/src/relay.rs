//! The per-request relay: validation, task dispatch, chunk pipeline.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use arena_core::{Error, Result, UpstreamConfig};

use crate::types::{ChatRequest, UpstreamPayload};

/// Buffered chunks between the bridge and the HTTP response writer.
const CHUNK_BUFFER: usize = 32;

/// Boxed chunk stream handed to the HTTP layer.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// One injected chat task. The production implementation evaluates a script
/// in the browser context; tests substitute scripted targets.
#[async_trait]
pub trait ChatTarget: Send + Sync {
    /// Whether the backing context can accept tasks.
    fn is_ready(&self) -> bool;

    /// Run one task to completion, delivering each chunk through `chunks`.
    /// Dropping the receiver cancels delivery but not the task itself.
    async fn run_chat(&self, payload: UpstreamPayload, chunks: mpsc::Sender<Bytes>) -> Result<()>;
}

/// Streaming relay over a chat target.
pub struct Relay<T: ChatTarget> {
    target: Arc<T>,
    upstream: UpstreamConfig,
}

impl<T: ChatTarget + 'static> Relay<T> {
    pub fn new(target: Arc<T>, upstream: UpstreamConfig) -> Self {
        Self { target, upstream }
    }

    /// Handle one chat request.
    ///
    /// Rejections (`NotReady`, `InvalidRequest`) are returned before any
    /// streaming resource exists. Once a stream is returned, a task failure
    /// before the first chunk surfaces as the stream's single `Err` item so
    /// the HTTP layer can still send a structured status; after the first
    /// chunk it degrades to a logged, silent end of stream.
    pub fn handle(&self, request: ChatRequest) -> Result<ChunkStream> {
        if !self.target.is_ready() {
            return Err(Error::NotReady);
        }
        if request.messages.is_empty() {
            return Err(Error::InvalidRequest(
                "\"messages\" is required and must be a non-empty array".to_string(),
            ));
        }

        let payload = UpstreamPayload::from_request(&request, &self.upstream);
        debug!(
            model = %payload.model_a_id,
            messages = payload.messages.len(),
            "dispatching chat task"
        );

        let (tx, mut rx) = mpsc::channel::<Bytes>(CHUNK_BUFFER);
        let target = self.target.clone();
        let task = tokio::spawn(async move { target.run_chat(payload, tx).await });

        let stream = async_stream::stream! {
            let mut emitted = false;
            while let Some(chunk) = rx.recv().await {
                emitted = true;
                yield Ok(chunk);
            }
            // All senders are gone: the task is done (or about to be).
            match task.await {
                Ok(Ok(())) => debug!("chat stream completed"),
                Ok(Err(e)) => {
                    if emitted {
                        // The transport already committed to streaming; the
                        // client observes a bare end of stream.
                        warn!(error = %e, "chat stream aborted after streaming began");
                    } else {
                        yield Err(e);
                    }
                }
                Err(e) => {
                    let err = Error::Stream(format!("relay task failed: {e}"));
                    if emitted {
                        warn!(error = %err, "chat stream aborted after streaming began");
                    } else {
                        yield Err(err);
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;
    use futures::StreamExt;

    /// Target that replays a fixed chunk sequence, then optionally fails.
    struct ScriptedTarget {
        ready: bool,
        chunks: Vec<String>,
        failure: Option<fn() -> Error>,
    }

    impl ScriptedTarget {
        fn streaming(chunks: &[&str]) -> Self {
            Self {
                ready: true,
                chunks: chunks.iter().map(|c| c.to_string()).collect(),
                failure: None,
            }
        }
    }

    #[async_trait]
    impl ChatTarget for ScriptedTarget {
        fn is_ready(&self) -> bool {
            self.ready
        }

        async fn run_chat(
            &self,
            _payload: UpstreamPayload,
            chunks: mpsc::Sender<Bytes>,
        ) -> Result<()> {
            for chunk in &self.chunks {
                if chunks.send(Bytes::from(chunk.clone())).await.is_err() {
                    break;
                }
            }
            match self.failure {
                Some(make) => Err(make()),
                None => Ok(()),
            }
        }
    }

    /// Target that derives its output from the request, for checking that
    /// concurrent sessions never cross.
    struct EchoTarget;

    #[async_trait]
    impl ChatTarget for EchoTarget {
        fn is_ready(&self) -> bool {
            true
        }

        async fn run_chat(
            &self,
            payload: UpstreamPayload,
            chunks: mpsc::Sender<Bytes>,
        ) -> Result<()> {
            for msg in &payload.messages {
                // Yield between sends so concurrent tasks interleave.
                tokio::task::yield_now().await;
                if chunks
                    .send(Bytes::from(msg.content.clone()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Ok(())
        }
    }

    fn request(contents: &[&str]) -> ChatRequest {
        ChatRequest {
            model_id: None,
            messages: contents
                .iter()
                .map(|c| ChatMessage {
                    role: "user".into(),
                    content: c.to_string(),
                })
                .collect(),
        }
    }

    async fn collect(mut stream: ChunkStream) -> (String, Option<Error>) {
        let mut body = String::new();
        let mut error = None;
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => body.push_str(std::str::from_utf8(&chunk).unwrap()),
                Err(e) => {
                    error = Some(e);
                    break;
                }
            }
        }
        (body, error)
    }

    #[tokio::test]
    async fn rejects_when_target_not_ready() {
        let target = Arc::new(ScriptedTarget {
            ready: false,
            chunks: vec!["never".into()],
            failure: None,
        });
        let relay = Relay::new(target, UpstreamConfig::default());
        let Err(err) = relay.handle(request(&["hi"])) else {
            panic!("expected rejection");
        };
        assert!(matches!(err, Error::NotReady));
    }

    #[tokio::test]
    async fn rejects_empty_messages() {
        let relay = Relay::new(
            Arc::new(ScriptedTarget::streaming(&["never"])),
            UpstreamConfig::default(),
        );
        let Err(err) = relay.handle(request(&[])) else {
            panic!("expected rejection");
        };
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn forwards_chunks_in_order() {
        let relay = Relay::new(
            Arc::new(ScriptedTarget::streaming(&["c1", "c2", "c3"])),
            UpstreamConfig::default(),
        );
        let stream = relay.handle(request(&["hi"])).unwrap();
        let (body, error) = collect(stream).await;
        assert_eq!(body, "c1c2c3");
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn failure_before_first_chunk_surfaces_as_error() {
        let target = ScriptedTarget {
            ready: true,
            chunks: vec![],
            failure: Some(|| Error::Unauthenticated("no cookie".into())),
        };
        let relay = Relay::new(Arc::new(target), UpstreamConfig::default());
        let stream = relay.handle(request(&["hi"])).unwrap();
        let (body, error) = collect(stream).await;
        assert!(body.is_empty());
        assert!(matches!(error, Some(Error::Unauthenticated(_))));
    }

    #[tokio::test]
    async fn failure_after_first_chunk_ends_stream_silently() {
        let target = ScriptedTarget {
            ready: true,
            chunks: vec!["partial".into()],
            failure: Some(|| Error::Stream("connection reset".into())),
        };
        let relay = Relay::new(Arc::new(target), UpstreamConfig::default());
        let stream = relay.handle(request(&["hi"])).unwrap();
        let (body, error) = collect(stream).await;
        assert_eq!(body, "partial");
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn repeated_requests_yield_identical_output() {
        let relay = Relay::new(
            Arc::new(ScriptedTarget::streaming(&["a", "b"])),
            UpstreamConfig::default(),
        );
        let (first, _) = collect(relay.handle(request(&["hi"])).unwrap()).await;
        let (second, _) = collect(relay.handle(request(&["hi"])).unwrap()).await;
        assert_eq!(first, second);
        assert_eq!(first, "ab");
    }

    #[tokio::test]
    async fn concurrent_requests_do_not_cross_streams() {
        let relay = Relay::new(Arc::new(EchoTarget), UpstreamConfig::default());
        let left = relay.handle(request(&["l1", "l2", "l3"])).unwrap();
        let right = relay.handle(request(&["r1", "r2", "r3"])).unwrap();

        let (left_out, right_out) = tokio::join!(collect(left), collect(right));
        assert_eq!(left_out.0, "l1l2l3");
        assert_eq!(right_out.0, "r1r2r3");
    }
}
