//! Arena Relay core — configuration and shared error types.

pub mod config;
pub mod error;

pub use config::{BrowserSessionConfig, RelayConfig, UpstreamConfig};
pub use error::{Error, Result};
