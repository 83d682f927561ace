//! Automation-detection countermeasures.
//!
//! The launcher already drops the `AutomationControlled` blink feature; the
//! script here patches the navigator properties sites commonly probe, and is
//! registered with `Page.addScriptToEvaluateOnNewDocument` so it runs before
//! any page script on every navigation.

use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::Page;

use super::discovery::BrowserInfo;
use crate::config::BrowserConfig;
use crate::error::{Result, WatchError};

/// User agent used when the browser version cannot be detected
pub const FALLBACK_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const STEALTH_JS: &str = r#"
    // Remove webdriver flag
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });

    // Fix chrome runtime
    window.chrome = window.chrome || { runtime: {} };

    // Override permissions query
    const originalQuery = window.navigator.permissions && window.navigator.permissions.query;
    if (originalQuery) {
        window.navigator.permissions.query = (parameters) => (
            parameters.name === 'notifications'
                ? Promise.resolve({ state: Notification.permission })
                : originalQuery.call(window.navigator.permissions, parameters)
        );
    }

    // Add realistic plugins
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai' },
            { name: 'Native Client', filename: 'internal-nacl-plugin' }
        ]
    });

    // Fix languages
    Object.defineProperty(navigator, 'languages', { get: () => ['tr-TR', 'tr', 'en-US', 'en'] });
"#;

/// Build a desktop Chrome user agent for the given browser version
pub fn build_user_agent(version: &str) -> String {
    format!(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{} Safari/537.36",
        version
    )
}

/// The user agent to present: configured value, or derived from the browser version
pub fn resolve_user_agent(config: &BrowserConfig, browser: &BrowserInfo) -> String {
    if !config.wants_auto_user_agent() {
        return config.user_agent.trim().to_string();
    }

    match browser.version.as_deref() {
        Some(version) => {
            tracing::debug!("Derived user agent from {} {}", browser.browser_type.name(), version);
            build_user_agent(version)
        }
        None => {
            tracing::warn!("Could not detect browser version, using fallback user agent");
            FALLBACK_USER_AGENT.to_string()
        }
    }
}

/// Register the stealth script and user agent override on a page
pub async fn apply_stealth_to_page(page: &Page, user_agent: &str) -> Result<()> {
    page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_JS))
        .await
        .map_err(|e| WatchError::Other(format!("Failed to register stealth script: {}", e)))?;

    page.execute(SetUserAgentOverrideParams::new(user_agent))
        .await
        .map_err(|e| WatchError::Other(format!("Failed to override user agent: {}", e)))?;

    tracing::debug!("Stealth overrides applied");
    Ok(())
}
