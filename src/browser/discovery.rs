use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, WatchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserType {
    Chrome,
    Chromium,
    Brave,
    Edge,
}

impl BrowserType {
    pub fn name(&self) -> &'static str {
        match self {
            BrowserType::Chrome => "Google Chrome",
            BrowserType::Chromium => "Chromium",
            BrowserType::Brave => "Brave",
            BrowserType::Edge => "Microsoft Edge",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrowserInfo {
    pub browser_type: BrowserType,
    pub path: PathBuf,
    pub version: Option<String>,
}

impl BrowserInfo {
    pub fn new(browser_type: BrowserType, path: PathBuf) -> Self {
        Self {
            browser_type,
            path,
            version: None,
        }
    }

    pub fn with_version(mut self) -> Self {
        self.version = detect_version(&self.path);
        self
    }
}

/// Discover the best available browser, honouring an explicit executable path
pub fn discover_browser(executable: Option<&str>) -> Result<BrowserInfo> {
    if let Some(path) = executable.map(str::trim).filter(|p| !p.is_empty()) {
        let path = PathBuf::from(shellexpand::tilde(path).to_string());
        if !path.exists() {
            return Err(WatchError::LaunchFailed(format!(
                "Browser not found at: {}",
                path.display()
            )));
        }
        // Assume Chrome-compatible
        return Ok(BrowserInfo::new(BrowserType::Chrome, path).with_version());
    }

    discover_all_browsers()
        .into_iter()
        .next()
        .ok_or(WatchError::BrowserNotFound)
}

/// Discover all available browsers on the system, highest priority first
pub fn discover_all_browsers() -> Vec<BrowserInfo> {
    let mut found = Vec::new();

    for (browser_type, paths, names) in browser_candidates() {
        let hit = paths
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .or_else(|| names.iter().find_map(|name| which::which(name).ok()));

        if let Some(path) = hit {
            found.push(BrowserInfo::new(browser_type, path).with_version());
        }
    }

    found
}

type Candidate = (BrowserType, Vec<&'static str>, Vec<&'static str>);

/// Known install locations and PATH names per platform
fn browser_candidates() -> Vec<Candidate> {
    #[cfg(target_os = "macos")]
    {
        vec![
            (
                BrowserType::Chrome,
                vec!["/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"],
                vec![],
            ),
            (
                BrowserType::Chromium,
                vec!["/Applications/Chromium.app/Contents/MacOS/Chromium"],
                vec![],
            ),
            (
                BrowserType::Brave,
                vec!["/Applications/Brave Browser.app/Contents/MacOS/Brave Browser"],
                vec![],
            ),
            (
                BrowserType::Edge,
                vec!["/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge"],
                vec![],
            ),
        ]
    }

    #[cfg(target_os = "linux")]
    {
        vec![
            (
                BrowserType::Chrome,
                vec!["/usr/bin/google-chrome", "/usr/bin/google-chrome-stable"],
                vec!["google-chrome", "chrome"],
            ),
            (
                BrowserType::Chromium,
                vec!["/usr/bin/chromium", "/usr/bin/chromium-browser", "/snap/bin/chromium"],
                vec!["chromium", "chromium-browser"],
            ),
            (
                BrowserType::Brave,
                vec!["/usr/bin/brave-browser"],
                vec!["brave-browser", "brave"],
            ),
            (
                BrowserType::Edge,
                vec!["/usr/bin/microsoft-edge", "/usr/bin/microsoft-edge-stable"],
                vec!["microsoft-edge"],
            ),
        ]
    }

    #[cfg(target_os = "windows")]
    {
        vec![
            (
                BrowserType::Chrome,
                vec![
                    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
                    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
                ],
                vec!["chrome"],
            ),
            (
                BrowserType::Brave,
                vec![r"C:\Program Files\BraveSoftware\Brave-Browser\Application\brave.exe"],
                vec![],
            ),
            (
                BrowserType::Edge,
                vec![
                    r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
                    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
                ],
                vec![],
            ),
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        vec![]
    }
}

/// Detect browser version by running `<browser> --version`
fn detect_version(path: &Path) -> Option<String> {
    let output = Command::new(path).arg("--version").output().ok()?;

    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    parse_version(&stdout).or_else(|| parse_version(&stderr))
}

/// Extract a dotted four-part version from output like "Google Chrome 124.0.6367.207"
pub fn parse_version(text: &str) -> Option<String> {
    static VERSION: OnceLock<Option<Regex>> = OnceLock::new();
    let re = VERSION
        .get_or_init(|| Regex::new(r"(\d+\.\d+\.\d+\.\d+)").ok())
        .as_ref()?;
    re.captures(text)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}
