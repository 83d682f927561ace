//! The one place that knows the order page's markup.
//!
//! Everything site specific (selectors, URL patterns, the scripts that find
//! and click cards) sits behind [`PageAdapter`], so the poll loop never
//! touches a selector directly.

use async_trait::async_trait;
use serde_json::Value;

use super::parser::{parse_detail_markup, PanelSelectors};
use crate::browser::PageDriver;
use crate::config::{SelectorConfig, WatchConfig};
use crate::error::{Result, WatchError};
use crate::order::ParseOutcome;

/// A card as seen by one scan: its position in DOM order and its visible text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardCandidate {
    pub index: usize,
    pub text: String,
}

/// Viewport coordinates of a card, scrolled into view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardTarget {
    pub x: f64,
    pub y: f64,
}

#[async_trait]
pub trait PageAdapter: Send + Sync {
    fn is_list_page(&self, url: &str) -> bool;

    fn is_detail_page(&self, url: &str) -> bool;

    /// All cards currently in the DOM, in document order
    async fn find_cards(&self, driver: &dyn PageDriver) -> Result<Vec<CardCandidate>>;

    /// Re-query `card`, scroll it into view and return its centre.
    ///
    /// Fails with `StaleElement` if no card with the same text is attached anymore.
    async fn locate_card(&self, driver: &dyn PageDriver, card: &CardCandidate) -> Result<CardTarget>;

    /// Re-query `card` and invoke `click()` on it from page script
    async fn script_click(&self, driver: &dyn PageDriver, card: &CardCandidate) -> Result<()>;

    /// Current detail panel markup, empty when the panel is absent
    async fn detail_panel_markup(&self, driver: &dyn PageDriver) -> Result<String>;

    fn parse_detail_markup(&self, html: &str) -> ParseOutcome;
}

/// Selector-driven adapter for the order list page
pub struct CssPageAdapter {
    card_selector: String,
    panel_selector: String,
    list_url_keyword: String,
    detail_url_keyword: String,
    panel: PanelSelectors,
}

impl CssPageAdapter {
    pub fn new(selectors: &SelectorConfig, watch: &WatchConfig) -> Result<Self> {
        // Compiling here rejects a bad card selector before any browser work
        scraper::Selector::parse(&selectors.card).map_err(|e| {
            WatchError::ConfigError(format!("selectors.card {:?}: {}", selectors.card, e))
        })?;

        Ok(Self {
            card_selector: selectors.card.clone(),
            panel_selector: selectors.detail_panel.clone(),
            list_url_keyword: watch.list_url_keyword.clone(),
            detail_url_keyword: watch.detail_url_keyword.clone(),
            panel: PanelSelectors::compile(selectors)?,
        })
    }

    /// Script prelude that resolves `card` to a live element named `el` (or null)
    fn find_card_js(&self, card: &CardCandidate) -> Result<String> {
        let selector_json = serde_json::to_string(&self.card_selector)?;
        let text_json = serde_json::to_string(&card.text)?;
        let index = card.index;
        Ok(format!(
            "const els = Array.from(document.querySelectorAll({selector_json}));\n\
             const norm = (e) => (e.innerText || e.textContent || '').trim();\n\
             let el = els[{index}];\n\
             if (!el || norm(el) !== {text_json}) el = els.find((e) => norm(e) === {text_json});"
        ))
    }
}

#[async_trait]
impl PageAdapter for CssPageAdapter {
    fn is_list_page(&self, url: &str) -> bool {
        url.contains(&self.list_url_keyword) && !self.is_detail_page(url)
    }

    fn is_detail_page(&self, url: &str) -> bool {
        url.contains(&self.detail_url_keyword)
    }

    async fn find_cards(&self, driver: &dyn PageDriver) -> Result<Vec<CardCandidate>> {
        let selector_json = serde_json::to_string(&self.card_selector)?;
        let js = format!(
            "(() => Array.from(document.querySelectorAll({selector_json}))\
             .map((e) => (e.innerText || e.textContent || '').trim()))()"
        );

        let texts = match driver.execute_script(&js).await? {
            Value::Array(values) => values,
            Value::Null => Vec::new(),
            other => {
                return Err(WatchError::JavaScriptError(format!(
                    "card scan returned {}",
                    other
                )))
            }
        };

        Ok(texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| CardCandidate {
                index,
                text: text.as_str().unwrap_or_default().to_string(),
            })
            .collect())
    }

    async fn locate_card(&self, driver: &dyn PageDriver, card: &CardCandidate) -> Result<CardTarget> {
        let js = format!(
            "(() => {{\n{}\n\
             if (!el || !el.isConnected) return null;\n\
             el.scrollIntoView({{ behavior: 'instant', block: 'center', inline: 'center' }});\n\
             const rect = el.getBoundingClientRect();\n\
             if (rect.width === 0 && rect.height === 0) return {{ hidden: true }};\n\
             return {{ x: rect.left + rect.width / 2, y: rect.top + rect.height / 2 }};\n\
             }})()",
            self.find_card_js(card)?
        );

        let coords = driver.execute_script(&js).await?;

        if coords.is_null() {
            return Err(WatchError::StaleElement(format!("card {} detached", card.index)));
        }
        if coords.get("hidden").is_some() {
            return Err(WatchError::ElementNotFound(format!(
                "card {} has no visible box",
                card.index
            )));
        }

        let x = coords.get("x").and_then(Value::as_f64);
        let y = coords.get("y").and_then(Value::as_f64);
        match (x, y) {
            (Some(x), Some(y)) => Ok(CardTarget { x, y }),
            _ => Err(WatchError::JavaScriptError(format!(
                "invalid card coordinates: {}",
                coords
            ))),
        }
    }

    async fn script_click(&self, driver: &dyn PageDriver, card: &CardCandidate) -> Result<()> {
        let js = format!(
            "(() => {{\n{}\nif (!el || !el.isConnected) return false;\nel.click();\nreturn true;\n}})()",
            self.find_card_js(card)?
        );

        if driver.execute_script(&js).await?.as_bool().unwrap_or(false) {
            Ok(())
        } else {
            Err(WatchError::StaleElement(format!("card {} detached", card.index)))
        }
    }

    async fn detail_panel_markup(&self, driver: &dyn PageDriver) -> Result<String> {
        let selector_json = serde_json::to_string(&self.panel_selector)?;
        let js = format!(
            "(() => {{ const el = document.querySelector({selector_json}); return el ? el.outerHTML : ''; }})()"
        );
        let markup = driver.execute_script(&js).await?;
        Ok(markup.as_str().unwrap_or_default().to_string())
    }

    fn parse_detail_markup(&self, html: &str) -> ParseOutcome {
        parse_detail_markup(html, &self.panel)
    }
}
