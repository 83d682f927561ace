use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::layout::Point;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};

use super::driver::{PageDriver, SessionFactory};
use super::launcher::BrowserLauncher;
use super::stealth::{apply_stealth_to_page, resolve_user_agent};
use crate::config::BrowserConfig;
use crate::error::{Result, WatchError};
use crate::wait::await_condition;

/// Upper bound for the browser to acknowledge `Browser.close`
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// One live connection to a launched browser, driving a single tab.
pub struct BrowserSession {
    browser: Option<Browser>,
    page: Option<Page>,
    child: Option<Child>,
    handler_task: Option<JoinHandle<()>>,
    /// Cleared by the handler task once the CDP event stream ends
    transport_alive: Arc<AtomicBool>,
    initialized: bool,
    created_at: DateTime<Local>,
    session_id: String,
    page_load_timeout: Duration,
}

impl BrowserSession {
    /// Launch a browser, connect over CDP and prepare a stealth-patched tab.
    ///
    /// Any failure here is a launch error; the half-started browser is torn
    /// down before returning.
    pub async fn start(config: &BrowserConfig) -> Result<Self> {
        let launcher = BrowserLauncher::from_config(config)?;
        let user_agent = resolve_user_agent(config, launcher.browser_info());

        tracing::info!(
            "Starting {} (profile: {})",
            launcher.browser_info().browser_type.name(),
            config.profile_dir().display()
        );

        let (child, cdp_url) = launcher.launch_and_wait().await?;

        let mut session = Self {
            browser: None,
            page: None,
            child: Some(child),
            handler_task: None,
            transport_alive: Arc::new(AtomicBool::new(false)),
            initialized: false,
            created_at: Local::now(),
            session_id: String::new(),
            page_load_timeout: config.page_load_timeout(),
        };

        if let Err(e) = session
            .connect(&cdp_url, &user_agent, config.launch_timeout())
            .await
        {
            session.close().await;
            return Err(e);
        }

        tracing::info!("Browser session {} initialized", session.session_id);
        Ok(session)
    }

    async fn connect(&mut self, cdp_url: &str, user_agent: &str, deadline: Duration) -> Result<()> {
        let (browser, mut handler) = timeout(deadline, Browser::connect(cdp_url))
            .await
            .map_err(|_| {
                WatchError::CdpConnectionFailed(format!(
                    "No CDP handshake within {}s",
                    deadline.as_secs()
                ))
            })?
            .map_err(|e| {
                WatchError::CdpConnectionFailed(format!("Failed to connect to browser: {}", e))
            })?;

        self.transport_alive.store(true, Ordering::SeqCst);
        let alive = Arc::clone(&self.transport_alive);

        // Spawn handler in background; its end means the transport is gone
        self.handler_task = Some(tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler error: {}", e);
                }
            }
            alive.store(false, Ordering::SeqCst);
            tracing::debug!("CDP handler stream ended");
        }));

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| WatchError::CdpConnectionFailed(format!("Failed to open tab: {}", e)))?;

        if let Err(e) = apply_stealth_to_page(&page, user_agent).await {
            tracing::warn!("Stealth setup failed: {}", e);
        }

        self.session_id = page.target_id().inner().clone();
        self.browser = Some(browser);
        self.page = Some(page);
        self.initialized = true;
        Ok(())
    }

    fn page(&self) -> Result<&Page> {
        if !self.initialized {
            return Err(WatchError::SessionNotInitialized);
        }
        self.page.as_ref().ok_or(WatchError::SessionNotInitialized)
    }

    fn transport_alive(&self) -> bool {
        self.transport_alive.load(Ordering::SeqCst)
    }

    fn classify(&self, context: &str, err: CdpError) -> WatchError {
        match err {
            CdpError::Timeout if self.transport_alive() => {
                WatchError::Timeout(format!("{}: CDP request timed out", context))
            }
            CdpError::JavascriptException(details) if self.transport_alive() => {
                WatchError::JavaScriptError(format!("{}: {}", context, details.text))
            }
            other => classify_cdp_message(context, &other.to_string(), self.transport_alive()),
        }
    }
}

/// Map a CDP failure message onto the error taxonomy.
///
/// A dead handler always wins: whatever the message says, the session can no
/// longer be used.
pub(crate) fn classify_cdp_message(context: &str, message: &str, transport_alive: bool) -> WatchError {
    let lower = message.to_ascii_lowercase();
    let detail = format!("{}: {}", context, message);

    const TRANSPORT_MARKERS: [&str; 7] = [
        "channel closed",
        "send error",
        "websocket",
        "connection closed",
        "connection reset",
        "broken pipe",
        "target closed",
    ];
    const STALE_MARKERS: [&str; 4] = [
        "no node with given id",
        "could not find node",
        "node is detached",
        "cannot find context with specified id",
    ];

    if !transport_alive || TRANSPORT_MARKERS.iter().any(|m| lower.contains(m)) {
        WatchError::TransportLost(detail)
    } else if STALE_MARKERS.iter().any(|m| lower.contains(m)) {
        WatchError::StaleElement(detail)
    } else {
        WatchError::Other(detail)
    }
}

/// Fold a failed `readyState` probe into the navigation error pair
fn readiness_error(url: &str, err: WatchError) -> WatchError {
    match err {
        WatchError::Timeout(_) => WatchError::NavigationTimeout(url.to_string()),
        lost @ WatchError::TransportLost(_) => lost,
        other => WatchError::NavigationFailed(format!("{}: {}", url, other)),
    }
}

#[async_trait]
impl PageDriver for BrowserSession {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        let started = Instant::now();
        let page = self.page()?;

        match timeout(self.page_load_timeout, page.goto(url)).await {
            Err(_) => return Err(WatchError::NavigationTimeout(url.to_string())),
            Ok(Err(e)) => {
                return Err(match self.classify("navigate", e) {
                    lost @ WatchError::TransportLost(_) => lost,
                    other => WatchError::NavigationFailed(format!("{}: {}", url, other)),
                });
            }
            Ok(Ok(_)) => {}
        }

        let remaining = self.page_load_timeout.saturating_sub(started.elapsed());
        let this = &*self;
        await_condition(READY_POLL_INTERVAL, remaining, || async move {
            let state = this.execute_script("document.readyState").await?;
            Ok((state.as_str() == Some("complete")).then_some(()))
        })
        .await
        .map_err(|e| readiness_error(url, e))?;

        tracing::info!("Successfully navigated to: {}", url);
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let page = self.page()?;
        let url = page
            .url()
            .await
            .map_err(|e| self.classify("current_url", e))?;
        Ok(url.unwrap_or_default())
    }

    async fn page_source(&self) -> Result<String> {
        let page = self.page()?;
        page.content()
            .await
            .map_err(|e| self.classify("page_source", e))
    }

    async fn title(&self) -> Result<String> {
        let page = self.page()?;
        let title = page
            .get_title()
            .await
            .map_err(|e| self.classify("title", e))?;
        Ok(title.unwrap_or_default())
    }

    async fn execute_script(&self, script: &str) -> Result<Value> {
        let page = self.page()?;
        let result = page
            .evaluate_expression(EvaluateParams::new(script))
            .await
            .map_err(|e| self.classify("execute_script", e))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn click_at(&self, x: f64, y: f64) -> Result<()> {
        let page = self.page()?;
        page.click(Point::new(x, y))
            .await
            .map_err(|e| self.classify("click", e))?;
        Ok(())
    }

    async fn screenshot(&self, path: &Path, full_page: bool) -> Result<()> {
        let page = self.page()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(full_page)
            .build();

        page.save_screenshot(params, path)
            .await
            .map_err(|e| self.classify("screenshot", e))?;

        tracing::info!("Screenshot saved: {}", path.display());
        Ok(())
    }

    async fn close(&mut self) {
        self.initialized = false;
        self.page = None;

        if let Some(mut browser) = self.browser.take() {
            if self.transport_alive() {
                match timeout(CLOSE_TIMEOUT, browser.close()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::debug!("Browser.close failed: {}", e),
                    Err(_) => tracing::debug!("Browser.close timed out"),
                }
            }
        }

        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        self.transport_alive.store(false, Ordering::SeqCst);

        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
            tracing::info!("Browser session {} closed", self.session_id);
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
        }
    }
}

/// Launches a fresh local browser for every session
pub struct ChromeSessionFactory {
    config: BrowserConfig,
}

impl ChromeSessionFactory {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn create(&self) -> Result<Box<dyn PageDriver>> {
        let session = BrowserSession::start(&self.config).await?;
        Ok(Box::new(session))
    }
}
