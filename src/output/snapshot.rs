use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use chrono::Local;
use regex::Regex;

use crate::browser::PageDriver;
use crate::error::Result;

/// Elements whose content is never written to a snapshot
const STRIPPED_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

fn stripped_tag_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        STRIPPED_TAGS
            .iter()
            .filter_map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).ok())
            .collect()
    })
}

/// Remove script, style, noscript and template elements with their content
pub fn strip_active_content(html: &str) -> String {
    stripped_tag_patterns()
        .iter()
        .fold(html.to_string(), |acc, re| re.replace_all(&acc, "").into_owned())
}

/// Current document markup, falling back to the CDP page source
pub async fn capture_page_html(driver: &dyn PageDriver) -> Result<String> {
    match driver.execute_script("document.documentElement.outerHTML").await {
        Ok(value) if value.is_string() => Ok(value.as_str().unwrap_or_default().to_string()),
        Err(e) if e.is_transport_lost() => Err(e),
        _ => driver.page_source().await,
    }
}

/// Writes timestamped HTML captures into one directory
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    prefix: String,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn save(&self, html: &str) -> Result<PathBuf> {
        self.save_with_prefix(&self.prefix, html)
    }

    /// Write `html` (active content stripped) as `<prefix>_<timestamp>.html`
    pub fn save_with_prefix(&self, prefix: &str, html: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.next_path(prefix, "html");
        fs::write(&path, strip_active_content(html))?;
        tracing::info!("Snapshot saved: {}", path.display());
        Ok(path)
    }

    /// Timestamped path for a new capture; microseconds keep names unique
    pub fn next_path(&self, prefix: &str, extension: &str) -> PathBuf {
        let ts = Local::now().format("%Y%m%d_%H%M%S_%6f");
        self.dir.join(format!("{}_{}.{}", prefix, ts, extension))
    }
}
