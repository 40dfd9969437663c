//! Error types for the relay.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Browser launch, navigation or readiness failure. Fatal at startup:
    /// the process must exit rather than serve against a half-initialized
    /// session.
    #[error("Startup failure: {0}")]
    Startup(String),

    /// The browser session has not completed initialization.
    #[error("Browser session is not ready")]
    NotReady,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The session cookie is absent or malformed inside the browser context.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Non-success status (or unreachable endpoint) from the upstream API.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Network or decoding failure while reading the upstream stream.
    #[error("Stream error: {0}")]
    Stream(String),

    /// CDP-level fault: evaluation, binding registration, lost connection.
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// HTTP status for errors reported before streaming begins. Once chunk
    /// emission has started no structured status can be sent; the stream is
    /// simply closed.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::NotReady => 503,
            Error::InvalidRequest(_) => 400,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
