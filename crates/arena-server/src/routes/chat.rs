//! Chat route — one streaming relay request per call.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use tracing::warn;

use arena_core::Error;
use arena_relay::{ChatRequest, ChatTarget};

use crate::state::AppState;

/// `POST /chat` — relay one chat request as a chunked event stream.
///
/// Rejections and failures that occur before the first chunk produce a
/// structured `{error}` body with a matching status. Once streaming has
/// begun, a failure can only end the stream; the client observes a bare
/// close with no terminal marker and cannot distinguish it from a normal
/// upstream finish.
pub async fn chat<T: ChatTarget + 'static>(
    State(state): State<Arc<AppState<T>>>,
    body: String,
) -> Response {
    // Parse the body by hand so syntactically invalid JSON gets the same
    // structured `{error}` 400 as a well-formed body of the wrong shape.
    let value: serde_json::Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => {
            return error_response(&Error::InvalidRequest(format!("malformed JSON body: {e}")))
        }
    };
    let request = match ChatRequest::from_value(value) {
        Ok(request) => request,
        Err(e) => return error_response(&e),
    };

    let mut stream = match state.relay.handle(request) {
        Ok(stream) => stream,
        Err(e) => return error_response(&e),
    };

    // Hold back the response until the first item so a task failure with no
    // bytes sent can still be reported with a status code.
    match stream.next().await {
        Some(Err(e)) => error_response(&e),
        first => {
            let head = futures::stream::iter(first);
            stream_response(Body::from_stream(head.chain(stream)))
        }
    }
}

fn stream_response(body: Body) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        body,
    )
        .into_response()
}

fn error_response(error: &Error) -> Response {
    warn!(error = %error, "chat request rejected");
    let status = StatusCode::from_u16(error.status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(serde_json::json!({ "error": error.to_string() })),
    )
        .into_response()
}
