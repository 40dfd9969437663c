//! Chrome session lifecycle — launch, readiness, page handle.

use std::time::{Duration, Instant};

use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use arena_core::{BrowserSessionConfig, Error, Result};

/// Lifecycle state of the single browser session.
///
/// The session is created once at startup and never recreated on failure;
/// a supervising process is expected to restart the whole binary.
pub enum SessionState {
    Uninitialized,
    Ready(SessionHandle),
    Failed(String),
}

/// The live browser context. The `Browser` handle is held for the process
/// lifetime so the Chrome child is not reaped while requests run.
pub struct SessionHandle {
    _browser: Browser,
    page: Page,
}

/// Owns exactly one authenticated browser context.
pub struct SessionManager {
    config: BrowserSessionConfig,
    start_url: String,
    state: RwLock<SessionState>,
}

impl SessionManager {
    pub fn new(config: BrowserSessionConfig, start_url: impl Into<String>) -> Self {
        Self {
            config,
            start_url: start_url.into(),
            state: RwLock::new(SessionState::Uninitialized),
        }
    }

    /// Bring up the browser context: launch Chrome, open one page, navigate
    /// to the target site and wait for the readiness marker. Any failure is
    /// recorded and returned as a startup error — the caller must treat it
    /// as fatal.
    pub async fn initialize(&self) -> Result<()> {
        info!(url = %self.start_url, "starting browser session");
        match self.bring_up().await {
            Ok(handle) => {
                *self.state.write() = SessionState::Ready(handle);
                info!("browser session ready");
                Ok(())
            }
            Err(e) => {
                *self.state.write() = SessionState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Clone of the ready page handle, or `NotReady`.
    pub fn page(&self) -> Result<Page> {
        match &*self.state.read() {
            SessionState::Ready(handle) => Ok(handle.page.clone()),
            _ => Err(Error::NotReady),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(&*self.state.read(), SessionState::Ready(_))
    }

    pub fn state_label(&self) -> &'static str {
        match &*self.state.read() {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Ready(_) => "ready",
            SessionState::Failed(_) => "failed",
        }
    }

    /// Drop the browser context. The Chrome child exits when the handle is
    /// dropped.
    pub fn shutdown(&self) {
        *self.state.write() = SessionState::Uninitialized;
        info!("browser session shut down");
    }

    async fn bring_up(&self) -> Result<SessionHandle> {
        let browser_config = BrowserConfig::builder()
            .chrome_executable(&self.config.chrome_path)
            .user_data_dir(&self.config.profile_dir)
            .viewport(Viewport {
                width: self.config.viewport_width,
                height: self.config.viewport_height,
                device_scale_factor: Some(1.0),
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            })
            .request_timeout(Duration::from_millis(self.config.navigation_timeout_ms))
            .arg(format!("--user-agent={}", self.config.user_agent))
            // Required in constrained container environments.
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .build()
            .map_err(Error::Startup)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| Error::Startup(format!("browser launch failed: {e}")))?;

        // Drain CDP events for the lifetime of the connection.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!(?event, "browser event");
            }
            debug!("browser event handler exited (connection closed)");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| Error::Startup(format!("failed to open page: {e}")))?;

        self.prepare_page(&page).await?;

        info!(url = %self.start_url, "navigating to target site");
        page.goto(self.start_url.as_str())
            .await
            .map_err(|e| Error::Startup(format!("navigation failed: {e}")))?;
        let _ = page.wait_for_navigation().await;

        self.await_readiness(&page).await?;

        Ok(SessionHandle {
            _browser: browser,
            page,
        })
    }

    /// Apply the user agent and viewport to the page so the target site's
    /// bot heuristics see an ordinary desktop browser.
    async fn prepare_page(&self, page: &Page) -> Result<()> {
        let ua_cmd = SetUserAgentOverrideParams::builder()
            .user_agent(&self.config.user_agent)
            .build()
            .map_err(Error::Startup)?;
        page.execute(ua_cmd)
            .await
            .map_err(|e| Error::Startup(format!("failed to set user agent: {e}")))?;

        let viewport_cmd = SetDeviceMetricsOverrideParams::builder()
            .width(self.config.viewport_width as i64)
            .height(self.config.viewport_height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(Error::Startup)?;
        if let Err(e) = page.execute(viewport_cmd).await {
            warn!(error = %e, "failed to set page viewport");
        }
        Ok(())
    }

    /// Poll for the readiness selector until the deadline. Its presence
    /// confirms that the page, including anti-bot challenges and the
    /// anonymous session bootstrap, has finished loading.
    async fn await_readiness(&self, page: &Page) -> Result<()> {
        let check_js = format!(
            "document.querySelector({}) !== null",
            serde_json::to_string(&self.config.ready_selector)?
        );

        let deadline = Instant::now() + Duration::from_secs(self.config.ready_timeout_secs);
        let interval = Duration::from_millis(100);

        loop {
            let found: bool = page
                .evaluate(check_js.as_str())
                .await
                .map_err(|e| Error::Startup(format!("readiness check failed: {e}")))?
                .into_value()
                .unwrap_or(false);

            if found {
                debug!(selector = %self.config.ready_selector, "readiness marker present");
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(Error::Startup(format!(
                    "readiness marker {:?} did not appear within {}s",
                    self.config.ready_selector, self.config.ready_timeout_secs
                )));
            }

            tokio::time::sleep(interval).await;
        }
    }
}

/// Evaluate an async task expression inside the page, awaiting its promise
/// and returning the resolved value.
pub async fn run_page_task(page: &Page, script: &str) -> Result<serde_json::Value> {
    let params = EvaluateParams::builder()
        .expression(script)
        .await_promise(true)
        .return_by_value(true)
        .build()
        .map_err(Error::Browser)?;

    let value: serde_json::Value = page
        .evaluate(params)
        .await
        .map_err(|e| Error::Browser(format!("task evaluation failed: {e}")))?
        .into_value()
        .map_err(|e| Error::Browser(format!("task resolved without a value: {e}")))?;

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_manager_is_not_ready() {
        let manager = SessionManager::new(BrowserSessionConfig::default(), "https://example.com/");
        assert!(!manager.is_ready());
        assert_eq!(manager.state_label(), "uninitialized");
        assert!(matches!(manager.page(), Err(Error::NotReady)));
    }

    #[test]
    fn shutdown_resets_state() {
        let manager = SessionManager::new(BrowserSessionConfig::default(), "https://example.com/");
        manager.shutdown();
        assert_eq!(manager.state_label(), "uninitialized");
    }
}
