use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::{sleep, Instant};

use super::discovery::{discover_browser, BrowserInfo};
use crate::config::BrowserConfig;
use crate::error::{Result, WatchError};

/// Browser launcher that starts a browser with CDP enabled
pub struct BrowserLauncher {
    browser_info: BrowserInfo,
    cdp_port: u16,
    headless: bool,
    window_size: (u32, u32),
    user_data_dir: PathBuf,
    proxy: Option<String>,
    disable_images: bool,
    extra_args: Vec<String>,
    launch_timeout: Duration,
}

impl BrowserLauncher {
    /// Create a launcher from the browser configuration
    pub fn from_config(config: &BrowserConfig) -> Result<Self> {
        let browser_info = discover_browser(config.executable.as_deref())?;
        Ok(Self::with_browser(browser_info, config))
    }

    /// Create a launcher for an already discovered browser
    pub fn with_browser(browser_info: BrowserInfo, config: &BrowserConfig) -> Self {
        Self {
            browser_info,
            cdp_port: config.cdp_port,
            headless: config.headless,
            window_size: (config.window_width, config.window_height),
            user_data_dir: config.profile_dir(),
            proxy: config
                .proxy
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            disable_images: config.disable_images,
            extra_args: config.extra_args.clone(),
            launch_timeout: config.launch_timeout(),
        }
    }

    /// Build the browser launch arguments
    fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={}", self.cdp_port),
            format!("--user-data-dir={}", self.user_data_dir.display()),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            format!("--window-size={},{}", self.window_size.0, self.window_size.1),
        ];

        // Always apply anti-detection flags
        args.push("--disable-blink-features=AutomationControlled".to_string());
        args.push("--disable-infobars".to_string());
        args.push("--disable-save-password-bubble".to_string());
        args.push("--disable-translate".to_string());

        // Stability inside containers and low-memory hosts
        args.push("--no-sandbox".to_string());
        args.push("--disable-dev-shm-usage".to_string());

        if self.headless {
            args.push("--headless=new".to_string());
            args.push("--disable-gpu".to_string());
        }

        if let Some(ref proxy) = self.proxy {
            args.push(format!("--proxy-server={}", proxy));
        }

        if self.disable_images {
            args.push("--blink-settings=imagesEnabled=false".to_string());
        }

        args.extend(self.extra_args.iter().cloned());

        args
    }

    /// Launch the browser and return the process handle
    pub fn launch(&self) -> Result<Child> {
        // Ensure the persistent profile directory exists
        std::fs::create_dir_all(&self.user_data_dir)?;

        let args = self.build_args();

        tracing::debug!(
            "Launching browser: {:?} with args: {:?}",
            self.browser_info.path,
            args
        );

        Command::new(&self.browser_info.path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                WatchError::LaunchFailed(format!(
                    "Failed to launch {}: {}",
                    self.browser_info.browser_type.name(),
                    e
                ))
            })
    }

    /// Launch the browser and wait for CDP to be ready.
    ///
    /// The child is killed again if the endpoint does not come up within the
    /// launch deadline.
    pub async fn launch_and_wait(&self) -> Result<(Child, String)> {
        let mut child = self.launch()?;

        match self.wait_for_cdp().await {
            Ok(cdp_url) => Ok((child, cdp_url)),
            Err(e) => {
                let _ = child.kill().await;
                Err(e)
            }
        }
    }

    /// Wait for the CDP endpoint to be ready
    async fn wait_for_cdp(&self) -> Result<String> {
        let url = format!("http://127.0.0.1:{}/json/version", self.cdp_port);

        // Build client with NO_PROXY for localhost
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(1))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let deadline = Instant::now() + self.launch_timeout;
        let mut attempt = 0u32;

        while Instant::now() < deadline {
            attempt += 1;
            sleep(Duration::from_millis(250)).await;

            match client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    let json: serde_json::Value = response.json().await.map_err(|e| {
                        WatchError::CdpConnectionFailed(format!(
                            "Failed to parse CDP response: {}",
                            e
                        ))
                    })?;

                    if let Some(ws_url) = json.get("webSocketDebuggerUrl").and_then(|v| v.as_str())
                    {
                        tracing::info!("CDP ready at: {}", ws_url);
                        return Ok(ws_url.to_string());
                    }
                }
                Ok(_) => {
                    tracing::debug!("CDP not ready yet (attempt {})", attempt);
                }
                Err(e) => {
                    tracing::debug!("CDP connection attempt {} failed: {}", attempt, e);
                }
            }
        }

        Err(WatchError::CdpConnectionFailed(format!(
            "Timeout waiting for CDP after {}s",
            self.launch_timeout.as_secs()
        )))
    }

    /// Get browser info
    pub fn browser_info(&self) -> &BrowserInfo {
        &self.browser_info
    }
}
