//! Configuration for the relay process, the browser session and the
//! upstream contract constants.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CHROME_PATH: &str = "/usr/bin/google-chrome-stable";
pub const DEFAULT_PROFILE_DIR: &str = "/tmp/arena-relay-profile";

/// Realistic desktop UA so the target site's bot heuristics see an ordinary
/// browser.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Settings for the single long-lived browser session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSessionConfig {
    /// Chrome/Chromium executable path.
    pub chrome_path: PathBuf,
    /// Dedicated, reusable profile directory. Fixed so disk usage stays
    /// bounded on ephemeral storage.
    pub profile_dir: PathBuf,
    /// User agent applied to the page.
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// CSS selector whose presence signals that login, anti-bot and
    /// session-bootstrap flows have completed.
    pub ready_selector: String,
    /// Deadline for the readiness selector to appear.
    pub ready_timeout_secs: u64,
    /// CDP request timeout covering navigation.
    pub navigation_timeout_ms: u64,
}

impl Default for BrowserSessionConfig {
    fn default() -> Self {
        Self {
            chrome_path: PathBuf::from(DEFAULT_CHROME_PATH),
            profile_dir: PathBuf::from(DEFAULT_PROFILE_DIR),
            user_agent: USER_AGENT.to_string(),
            viewport_width: 1920,
            viewport_height: 1080,
            ready_selector: r#"textarea[placeholder="Ask me anything..."]"#.to_string(),
            ready_timeout_secs: 60,
            navigation_timeout_ms: 90_000,
        }
    }
}

/// Constants of the target site's private API. This is an opaque, versioned
/// contract: field names and endpoints were observed against the live site
/// and may drift, in which case requests surface as upstream errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Root URL the session navigates to at startup.
    pub base_url: String,
    /// Internal streaming chat endpoint.
    pub stream_endpoint: String,
    /// Session cookie holding a base64-encoded JSON blob with the access
    /// token.
    pub auth_cookie: String,
    /// Model used when the caller does not pick one.
    pub default_model_id: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://lmarena.ai/".to_string(),
            stream_endpoint: "https://lmarena.ai/nextjs-api/stream/create-evaluation".to_string(),
            auth_cookie: "arena-auth-prod-v1".to_string(),
            default_model_id: "cb0f1e24-e8e9-4745-aabc-b926ffde7475".to_string(),
        }
    }
}

/// Top-level relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// HTTP listen port.
    pub port: u16,
    pub browser: BrowserSessionConfig,
    pub upstream: UpstreamConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            browser: BrowserSessionConfig::default(),
            upstream: UpstreamConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Build configuration from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.port = parse_port(std::env::var("PORT").ok());
        if let Ok(path) = std::env::var("ARENA_CHROME_PATH") {
            config.browser.chrome_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("ARENA_PROFILE_DIR") {
            config.browser.profile_dir = PathBuf::from(dir);
        }
        config
    }
}

fn parse_port(value: Option<String>) -> u16 {
    value
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}
