use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Browser not found. Please install Chrome, Chromium, Brave, or Edge.")]
    BrowserNotFound,

    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("CDP connection failed: {0}")]
    CdpConnectionFailed(String),

    #[error("Navigation timed out: {0}")]
    NavigationTimeout(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Browser session is not initialized")]
    SessionNotInitialized,

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Stale element: {0}")]
    StaleElement(String),

    #[error("Browser transport lost: {0}")]
    TransportLost(String),

    #[error("Session recovery failed: {0}")]
    RecoveryFailed(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScriptError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl WatchError {
    /// True when the browser session itself is unusable and must be recreated.
    pub fn is_transport_lost(&self) -> bool {
        matches!(self, WatchError::TransportLost(_))
    }
}

pub type Result<T> = std::result::Result<T, WatchError>;
