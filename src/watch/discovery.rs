use super::adapter::{CardCandidate, PageAdapter};
use super::fingerprint::{DedupTracker, Fingerprint};
use crate::browser::PageDriver;
use crate::error::Result;

/// A card not clicked before, with the key it will be recorded under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCard {
    pub card: CardCandidate,
    pub fingerprint: Fingerprint,
}

/// Scan the page and return the cards the tracker has not seen, in DOM order.
///
/// Nothing is marked here: a card only counts as seen once it was actually
/// clicked, which the caller records.
pub async fn discover_new_cards(
    driver: &dyn PageDriver,
    adapter: &dyn PageAdapter,
    tracker: &DedupTracker,
    prefix_len: usize,
) -> Result<Vec<NewCard>> {
    let url = driver.current_url().await?;
    let cards = adapter.find_cards(driver).await?;
    let total = cards.len();

    let mut fresh: Vec<NewCard> = Vec::new();
    for card in cards {
        let Some(fingerprint) = Fingerprint::of(&url, &card.text, prefix_len) else {
            tracing::debug!("Skipping card {} without visible text", card.index);
            continue;
        };
        // Identical cards within one scan collapse to the first
        if tracker.is_clicked(&fingerprint) || fresh.iter().any(|c| c.fingerprint == fingerprint) {
            continue;
        }
        fresh.push(NewCard { card, fingerprint });
    }

    tracing::debug!("Card scan: {} total, {} new", total, fresh.len());
    Ok(fresh)
}

/// Click a card natively, retrying once with a script click.
///
/// A lost transport is never retried; it has to reach the poll loop.
pub async fn click_card(driver: &dyn PageDriver, adapter: &dyn PageAdapter, card: &CardCandidate) -> Result<()> {
    let native = async {
        let target = adapter.locate_card(driver, card).await?;
        driver.click_at(target.x, target.y).await
    };

    match native.await {
        Ok(()) => Ok(()),
        Err(e) if e.is_transport_lost() => Err(e),
        Err(e) => {
            tracing::debug!("Native click on card {} failed ({}), trying script click", card.index, e);
            adapter.script_click(driver, card).await
        }
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    //! In-memory page used by the watch tests

    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, Local};
    use serde_json::Value;

    use crate::browser::PageDriver;
    use crate::error::{Result, WatchError};
    use crate::order::{LineItem, ParseOutcome, ParsedOrder};
    use crate::watch::adapter::{CardCandidate, CardTarget, PageAdapter};

    /// Shared, inspectable state behind `FakeDriver` and `FakeAdapter`
    #[derive(Default)]
    pub struct FakePage {
        pub url: Mutex<String>,
        pub cards: Mutex<Vec<String>>,
        /// Successive panel reads; the last one repeats
        pub panel_reads: Mutex<VecDeque<String>>,
        pub native_click_fails: AtomicBool,
        pub script_click_fails: AtomicBool,
        /// Makes the next `current_url` call fail with `TransportLost`
        pub lose_transport: AtomicBool,
        /// Number of upcoming `navigate` calls that time out
        pub navigation_failures: AtomicUsize,
        /// Makes the next panel read fail with an unclassified CDP error
        pub panel_read_fails: AtomicBool,
        pub native_clicks: AtomicUsize,
        pub script_clicks: AtomicUsize,
        pub navigations: Mutex<Vec<String>>,
        pub closes: AtomicUsize,
    }

    impl FakePage {
        pub fn on(url: &str) -> Arc<Self> {
            let page = Self::default();
            *page.url.lock().unwrap() = url.to_string();
            Arc::new(page)
        }

        pub fn set_cards(&self, cards: &[&str]) {
            *self.cards.lock().unwrap() = cards.iter().map(|c| c.to_string()).collect();
        }

        pub fn set_panel_reads(&self, reads: &[&str]) {
            *self.panel_reads.lock().unwrap() = reads.iter().map(|r| r.to_string()).collect();
        }
    }

    pub struct FakeDriver {
        pub page: Arc<FakePage>,
        pub initialized: bool,
    }

    impl FakeDriver {
        pub fn new(page: Arc<FakePage>) -> Self {
            Self { page, initialized: true }
        }

        fn live(&self) -> Result<()> {
            if self.initialized {
                Ok(())
            } else {
                Err(WatchError::SessionNotInitialized)
            }
        }
    }

    #[async_trait]
    impl PageDriver for FakeDriver {
        fn session_id(&self) -> &str {
            "fake-session"
        }

        fn created_at(&self) -> DateTime<Local> {
            Local::now()
        }

        async fn navigate(&mut self, url: &str) -> Result<()> {
            self.live()?;
            if self
                .page
                .navigation_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(WatchError::NavigationTimeout(url.to_string()));
            }
            self.page.navigations.lock().unwrap().push(url.to_string());
            *self.page.url.lock().unwrap() = url.to_string();
            Ok(())
        }

        async fn current_url(&self) -> Result<String> {
            self.live()?;
            if self.page.lose_transport.swap(false, Ordering::SeqCst) {
                return Err(WatchError::TransportLost("websocket closed".to_string()));
            }
            Ok(self.page.url.lock().unwrap().clone())
        }

        async fn page_source(&self) -> Result<String> {
            self.live()?;
            Ok("<html><body><script>x()</script><p>list</p></body></html>".to_string())
        }

        async fn title(&self) -> Result<String> {
            self.live()?;
            Ok("Orders".to_string())
        }

        async fn execute_script(&self, _script: &str) -> Result<Value> {
            self.live()?;
            Ok(Value::Null)
        }

        async fn click_at(&self, _x: f64, _y: f64) -> Result<()> {
            self.live()?;
            self.page.native_clicks.fetch_add(1, Ordering::SeqCst);
            if self.page.native_click_fails.load(Ordering::SeqCst) {
                return Err(WatchError::ElementNotFound("card".to_string()));
            }
            Ok(())
        }

        async fn screenshot(&self, _path: &Path, _full_page: bool) -> Result<()> {
            self.live()?;
            Ok(())
        }

        async fn close(&mut self) {
            if self.initialized {
                self.initialized = false;
                self.page.closes.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// Adapter that reads cards and panel markup straight from `FakePage`.
    ///
    /// Any non-empty panel markup parses into a one-item order named after it.
    pub struct FakeAdapter {
        pub page: Arc<FakePage>,
    }

    #[async_trait]
    impl PageAdapter for FakeAdapter {
        fn is_list_page(&self, url: &str) -> bool {
            url.contains("order/list") && !self.is_detail_page(url)
        }

        fn is_detail_page(&self, url: &str) -> bool {
            url.contains("order/list/details")
        }

        async fn find_cards(&self, _driver: &dyn PageDriver) -> Result<Vec<CardCandidate>> {
            Ok(self
                .page
                .cards
                .lock()
                .unwrap()
                .iter()
                .enumerate()
                .map(|(index, text)| CardCandidate { index, text: text.clone() })
                .collect())
        }

        async fn locate_card(&self, _driver: &dyn PageDriver, card: &CardCandidate) -> Result<CardTarget> {
            if card.text.contains("detached") {
                return Err(WatchError::StaleElement(format!("card {}", card.index)));
            }
            Ok(CardTarget { x: 10.0, y: 20.0 * card.index as f64 })
        }

        async fn script_click(&self, _driver: &dyn PageDriver, card: &CardCandidate) -> Result<()> {
            self.page.script_clicks.fetch_add(1, Ordering::SeqCst);
            if self.page.script_click_fails.load(Ordering::SeqCst) {
                return Err(WatchError::StaleElement(format!("card {}", card.index)));
            }
            Ok(())
        }

        async fn detail_panel_markup(&self, _driver: &dyn PageDriver) -> Result<String> {
            if self.page.panel_read_fails.swap(false, Ordering::SeqCst) {
                return Err(WatchError::Other("execute_script: Internal error".to_string()));
            }
            let mut reads = self.page.panel_reads.lock().unwrap();
            let markup = if reads.len() > 1 {
                reads.pop_front().unwrap_or_default()
            } else {
                reads.front().cloned().unwrap_or_default()
            };
            Ok(markup)
        }

        fn parse_detail_markup(&self, html: &str) -> ParseOutcome {
            let mut outcome = ParseOutcome::default();
            if !html.is_empty() {
                outcome.order = ParsedOrder {
                    items: vec![LineItem {
                        name: Some(html.chars().take(20).collect()),
                        ..Default::default()
                    }],
                    ..Default::default()
                };
            }
            outcome
        }
    }
}
