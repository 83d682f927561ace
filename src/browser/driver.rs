use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde_json::Value;

use crate::error::Result;

/// DOM-level operations on one live browser session.
///
/// Every call is a blocking step from the caller's point of view; the
/// underlying transport serves one operation at a time, so callers hold the
/// driver by `&mut`/`&` and never run two operations concurrently.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Identifier of the controlled page target
    fn session_id(&self) -> &str;

    fn created_at(&self) -> DateTime<Local>;

    /// Load `url` and wait until `document.readyState == "complete"`
    async fn navigate(&mut self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    async fn page_source(&self) -> Result<String>;

    async fn title(&self) -> Result<String>;

    /// Evaluate a script in page context and return its JSON value
    async fn execute_script(&self, script: &str) -> Result<Value>;

    /// Native mouse click at viewport coordinates
    async fn click_at(&self, x: f64, y: f64) -> Result<()>;

    async fn screenshot(&self, path: &Path, full_page: bool) -> Result<()>;

    /// Release the browser. Safe to call more than once; every other
    /// operation fails with `SessionNotInitialized` afterwards.
    async fn close(&mut self);
}

/// Creates ready-to-use sessions, at startup and after a transport failure.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn PageDriver>>;
}
