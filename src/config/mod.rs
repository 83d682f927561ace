mod selectors;

pub use selectors::SelectorConfig;

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WatchError};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Browser launch configuration
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Poll loop configuration
    #[serde(default)]
    pub watch: WatchConfig,

    /// Order page selectors
    #[serde(default)]
    pub selectors: SelectorConfig,

    /// Snapshot and log output
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Browser executable path (overrides auto-discovery)
    pub executable: Option<String>,

    /// Run without a visible window
    pub headless: bool,

    pub window_width: u32,

    pub window_height: u32,

    /// Remote debugging port the launched browser listens on
    pub cdp_port: u16,

    /// Persistent profile directory, so logins survive restarts
    pub user_data_dir: Option<String>,

    /// User agent override. Empty or "auto" derives it from the installed Chrome.
    pub user_agent: String,

    /// Proxy server, e.g. "http://127.0.0.1:8080"
    pub proxy: Option<String>,

    /// Block image loading
    pub disable_images: bool,

    /// Extra browser arguments
    pub extra_args: Vec<String>,

    /// Upper bound for a single navigation
    pub page_load_timeout_secs: u64,

    /// Upper bound for the browser to expose its CDP endpoint after spawn
    pub launch_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: false,
            window_width: 1066,
            window_height: 600,
            cdp_port: 9222,
            user_data_dir: None,
            user_agent: String::new(),
            proxy: None,
            disable_images: false,
            extra_args: Vec::new(),
            page_load_timeout_secs: 60,
            launch_timeout_secs: 5,
        }
    }
}

impl BrowserConfig {
    /// Resolved profile directory, with `~` expanded
    pub fn profile_dir(&self) -> PathBuf {
        match self.user_data_dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => PathBuf::from(shellexpand::tilde(dir).to_string()),
            _ => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("orderwatch")
                .join("profile"),
        }
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn launch_timeout(&self) -> Duration {
        Duration::from_secs(self.launch_timeout_secs)
    }

    /// Whether the user agent should be derived from the installed browser
    pub fn wants_auto_user_agent(&self) -> bool {
        let ua = self.user_agent.trim();
        ua.is_empty() || ua.eq_ignore_ascii_case("auto")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Order list page the loop watches
    pub target_url: String,

    /// Page visited once before the target (optional)
    pub warmup_url: Option<String>,

    /// URL fragment identifying the order list page
    pub list_url_keyword: String,

    /// URL fragment identifying a standalone order detail page
    pub detail_url_keyword: String,

    pub poll_interval_ms: u64,

    /// Detail panel polling interval while waiting for new content
    pub panel_poll_interval_ms: u64,

    /// Deadline for the detail panel to show new content after a click
    pub panel_deadline_ms: u64,

    /// Pause before the single re-read after the panel deadline elapsed
    pub panel_fallback_pause_ms: u64,

    /// Minimum panel markup length that counts as "content appeared"
    pub min_panel_len: usize,

    /// Number of characters of card text used for the fingerprint
    pub fingerprint_prefix_len: usize,

    /// Pause after each card click
    pub click_pause_ms: u64,

    /// Pause after a failed tick
    pub error_backoff_secs: u64,

    /// Pause between closing a dead session and starting a new one
    pub recovery_pause_secs: u64,

    /// Wall-clock aligned interval between periodic snapshots
    pub snapshot_interval_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            target_url: "https://partner.tgoyemek.com/meal/245018/order/list".to_string(),
            warmup_url: None,
            list_url_keyword: "order/list".to_string(),
            detail_url_keyword: "order/list/details".to_string(),
            poll_interval_ms: 2000,
            panel_poll_interval_ms: 120,
            panel_deadline_ms: 7000,
            panel_fallback_pause_ms: 800,
            min_panel_len: 50,
            fingerprint_prefix_len: 120,
            click_pause_ms: 300,
            error_backoff_secs: 5,
            recovery_pause_secs: 3,
            snapshot_interval_secs: 30,
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn panel_poll_interval(&self) -> Duration {
        Duration::from_millis(self.panel_poll_interval_ms)
    }

    pub fn panel_deadline(&self) -> Duration {
        Duration::from_millis(self.panel_deadline_ms)
    }

    pub fn panel_fallback_pause(&self) -> Duration {
        Duration::from_millis(self.panel_fallback_pause_ms)
    }

    pub fn click_pause(&self) -> Duration {
        Duration::from_millis(self.click_pause_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }

    pub fn recovery_pause(&self) -> Duration {
        Duration::from_secs(self.recovery_pause_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for snapshots, the order log and the run log
    pub dir: Option<String>,

    /// Append-only order log file name inside `dir`
    pub orders_log: String,

    /// File name prefix for periodic page snapshots
    pub snapshot_prefix: String,

    /// Also capture a full-page PNG with each periodic snapshot
    pub screenshots: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: None,
            orders_log: "orders.log".to_string(),
            snapshot_prefix: "page".to_string(),
            screenshots: false,
        }
    }
}

impl OutputConfig {
    /// Resolved output directory, defaulting to `~/Desktop/orderwatch`
    pub fn output_dir(&self) -> PathBuf {
        match self.dir.as_deref().map(str::trim) {
            Some(dir) if !dir.is_empty() => PathBuf::from(shellexpand::tilde(dir).to_string()),
            _ => dirs::desktop_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from("."))
                .join("orderwatch"),
        }
    }

    pub fn orders_log_path(&self) -> PathBuf {
        self.output_dir().join(&self.orders_log)
    }
}

impl Config {
    /// Load configuration, reading the TOML file from `path` when given
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::config_path);

        let config: Config = Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Config::default()))
            // Merge config file if exists
            .merge(Toml::file(&config_path))
            // Merge environment variables (ORDERWATCH_SECTION__KEY)
            .merge(Env::prefixed("ORDERWATCH_").split("__"))
            .extract()
            .map_err(|e| WatchError::ConfigError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("orderwatch")
            .join("config.toml")
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| WatchError::ConfigError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.watch.target_url.trim().is_empty() {
            return Err(WatchError::ConfigError(
                "watch.target_url must not be empty".to_string(),
            ));
        }
        if self.watch.snapshot_interval_secs == 0 {
            return Err(WatchError::ConfigError(
                "watch.snapshot_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.watch.fingerprint_prefix_len == 0 {
            return Err(WatchError::ConfigError(
                "watch.fingerprint_prefix_len must be at least 1".to_string(),
            ));
        }
        for (key, selector) in self.selectors.entries() {
            if selector.trim().is_empty() {
                return Err(WatchError::ConfigError(format!(
                    "selectors.{} must not be empty",
                    key
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_match_the_order_page() {
        let config = Config::default();

        assert_eq!(config.selectors.card, ".order-card");
        assert_eq!(config.watch.detail_url_keyword, "order/list/details");
        assert_eq!(config.watch.snapshot_interval_secs, 30);
        assert_eq!(config.browser.launch_timeout(), Duration::from_secs(5));
        assert!(config.browser.wants_auto_user_agent());
    }

    #[test]
    #[serial]
    fn load_merges_file_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[browser]
headless = true
user_agent = "TestAgent/1.0"

[watch]
poll_interval_ms = 500

[selectors]
card = ".card"
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(&path)).unwrap();

        assert!(config.browser.headless);
        assert!(!config.browser.wants_auto_user_agent());
        assert_eq!(config.watch.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.selectors.card, ".card");
        // untouched keys keep their defaults
        assert_eq!(config.selectors.item, ".order-item");
        assert_eq!(config.watch.panel_poll_interval_ms, 120);
    }

    #[test]
    #[serial]
    fn env_overrides_nested_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        std::env::set_var("ORDERWATCH_WATCH__TARGET_URL", "https://example.test/order/list");
        std::env::set_var("ORDERWATCH_OUTPUT__SCREENSHOTS", "true");
        let result = Config::load_from(Some(&path));
        std::env::remove_var("ORDERWATCH_WATCH__TARGET_URL");
        std::env::remove_var("ORDERWATCH_OUTPUT__SCREENSHOTS");

        let config = result.unwrap();
        assert_eq!(config.watch.target_url, "https://example.test/order/list");
        assert!(config.output.screenshots);
    }

    #[test]
    #[serial]
    fn empty_selector_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[selectors]\nnote = \"  \"\n").unwrap();

        let result = Config::load_from(Some(&path));
        assert!(matches!(
            result,
            Err(WatchError::ConfigError(msg)) if msg.contains("selectors.note")
        ));
    }

    #[test]
    fn save_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.output.dir = Some("/tmp/orders".to_string());
        config.save_to(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[watch]"));
        assert!(content.contains("/tmp/orders"));
    }

    #[test]
    fn output_dir_expands_tilde() {
        let output = OutputConfig {
            dir: Some("~/orders".to_string()),
            ..Default::default()
        };
        assert!(!output.output_dir().to_string_lossy().starts_with('~'));
        assert!(output.orders_log_path().ends_with("orders/orders.log"));
    }
}
