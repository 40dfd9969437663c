//! Request and upstream payload types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use arena_core::{Error, Result, UpstreamConfig};

/// One message in the caller's conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Incoming chat request.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default, rename = "modelId")]
    pub model_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// Parse from a raw JSON body. Shape errors become `InvalidRequest` so
    /// the HTTP layer reports them as a structured 400 rather than a
    /// framework rejection.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::InvalidRequest(format!("malformed chat request: {e}")))
    }
}

/// One message as the upstream API expects it: a fresh unique id and a
/// pending status tag per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamMessage {
    pub id: Uuid,
    pub role: String,
    pub content: String,
    pub status: String,
}

/// Payload POSTed to the upstream streaming endpoint.
///
/// The exact shape is an external, versioned contract observed against the
/// live site; drift surfaces as an upstream error, never as a crash here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamPayload {
    #[serde(rename = "modelAId")]
    pub model_a_id: String,
    pub messages: Vec<UpstreamMessage>,
    pub mode: String,
}

impl UpstreamPayload {
    /// Build the payload for one request. Message ids are generated fresh
    /// on every call; the model falls back to the configured default.
    pub fn from_request(request: &ChatRequest, upstream: &UpstreamConfig) -> Self {
        Self {
            model_a_id: request
                .model_id
                .clone()
                .unwrap_or_else(|| upstream.default_model_id.clone()),
            messages: request
                .messages
                .iter()
                .map(|msg| UpstreamMessage {
                    id: Uuid::new_v4(),
                    role: msg.role.clone(),
                    content: msg.content.clone(),
                    status: "pending".to_string(),
                })
                .collect(),
            mode: "direct".to_string(),
        }
    }
}

/// Value the injected task resolves with. Failures are reported by value
/// rather than by throwing, so classification does not depend on CDP
/// exception plumbing.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskOutcome {
    pub ok: bool,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TaskOutcome {
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| {
            Error::Browser(format!("injected task resolved with an unexpected shape: {e}"))
        })
    }

    /// Map the outcome onto the error taxonomy.
    pub fn into_result(self) -> Result<()> {
        if self.ok {
            return Ok(());
        }
        let message = self
            .error
            .unwrap_or_else(|| "injected task failed".to_string());
        match self.kind.as_deref() {
            Some("unauthenticated") => Err(Error::Unauthenticated(message)),
            Some("upstream") => Err(Error::Upstream(message)),
            Some("stream") => Err(Error::Stream(message)),
            _ => Err(Error::Browser(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(messages: Vec<ChatMessage>) -> ChatRequest {
        ChatRequest {
            model_id: None,
            messages,
        }
    }

    #[test]
    fn payload_defaults_model_and_tags_messages_pending() {
        let upstream = UpstreamConfig::default();
        let req = request(vec![ChatMessage {
            role: "user".into(),
            content: "hello".into(),
        }]);

        let payload = UpstreamPayload::from_request(&req, &upstream);
        assert_eq!(payload.model_a_id, upstream.default_model_id);
        assert_eq!(payload.mode, "direct");
        assert_eq!(payload.messages.len(), 1);
        assert_eq!(payload.messages[0].status, "pending");
        assert_eq!(payload.messages[0].role, "user");
    }

    #[test]
    fn payload_keeps_caller_model_and_fresh_ids() {
        let upstream = UpstreamConfig::default();
        let req = ChatRequest {
            model_id: Some("custom-model".into()),
            messages: vec![
                ChatMessage {
                    role: "user".into(),
                    content: "a".into(),
                },
                ChatMessage {
                    role: "assistant".into(),
                    content: "b".into(),
                },
            ],
        };

        let first = UpstreamPayload::from_request(&req, &upstream);
        let second = UpstreamPayload::from_request(&req, &upstream);
        assert_eq!(first.model_a_id, "custom-model");
        assert_ne!(first.messages[0].id, first.messages[1].id);
        // Ids are re-derived fresh per request.
        assert_ne!(first.messages[0].id, second.messages[0].id);
    }

    #[test]
    fn request_parses_wire_field_names() {
        let value = serde_json::json!({
            "modelId": "m1",
            "messages": [{"role": "user", "content": "hi"}],
        });
        let req = ChatRequest::from_value(value).unwrap();
        assert_eq!(req.model_id.as_deref(), Some("m1"));
        assert_eq!(req.messages.len(), 1);
    }

    #[test]
    fn request_with_wrong_shape_is_invalid() {
        let value = serde_json::json!({"messages": "not-an-array"});
        let err = ChatRequest::from_value(value).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn missing_messages_parse_to_empty() {
        let req = ChatRequest::from_value(serde_json::json!({})).unwrap();
        assert!(req.messages.is_empty());
    }

    #[test]
    fn outcome_maps_onto_error_taxonomy() {
        let ok = TaskOutcome {
            ok: true,
            kind: None,
            error: None,
        };
        assert!(ok.into_result().is_ok());

        let unauthenticated = TaskOutcome {
            ok: false,
            kind: Some("unauthenticated".into()),
            error: Some("no cookie".into()),
        };
        assert!(matches!(
            unauthenticated.into_result(),
            Err(Error::Unauthenticated(_))
        ));

        let upstream = TaskOutcome {
            ok: false,
            kind: Some("upstream".into()),
            error: Some("status 500".into()),
        };
        assert!(matches!(upstream.into_result(), Err(Error::Upstream(_))));

        let stream = TaskOutcome {
            ok: false,
            kind: Some("stream".into()),
            error: None,
        };
        assert!(matches!(stream.into_result(), Err(Error::Stream(_))));

        let unknown = TaskOutcome {
            ok: false,
            kind: None,
            error: None,
        };
        assert!(matches!(unknown.into_result(), Err(Error::Browser(_))));
    }
}
