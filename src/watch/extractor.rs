//! Per-card extraction: click a card, wait for its detail panel, parse it.
//!
//! The page emits no "loaded" event for the panel, so completion is inferred
//! from the panel markup changing relative to what it was before the click.

use std::fmt;

use tokio::time::sleep;

use super::adapter::PageAdapter;
use super::discovery::{click_card, NewCard};
use super::fingerprint::DedupTracker;
use crate::browser::PageDriver;
use crate::config::WatchConfig;
use crate::error::{Result, WatchError};
use crate::order::ParseOutcome;
use crate::wait::await_condition;

/// Steps of one card's extraction, reported in debug logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractState {
    PreClick,
    Clicked,
    AwaitingChange,
    Parsed,
    Stale,
}

impl fmt::Display for ExtractState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PreClick => "pre-click",
            Self::Clicked => "clicked",
            Self::AwaitingChange => "awaiting-change",
            Self::Parsed => "parsed",
            Self::Stale => "stale",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub enum Extraction {
    /// The panel loaded new content and was parsed
    Parsed { outcome: ParseOutcome, markup: String },
    /// The panel never changed, even after the fallback re-read
    Stale,
}

/// Whether the panel shows content that was not there before the click.
///
/// With an empty baseline, any markup longer than `min_len` counts as having
/// appeared; otherwise any difference from the baseline counts.
pub fn panel_changed(baseline: &str, current: &str, min_len: usize) -> bool {
    if baseline.is_empty() {
        current.len() > min_len
    } else {
        current != baseline
    }
}

/// Drive one new card through PreClick -> Clicked -> AwaitingChange -> Parsed/Stale.
///
/// The card is marked in `tracker` as soon as the click went through, so a
/// panel that never loads is not clicked again on the next tick. Errors are
/// returned as-is; the caller decides whether they are card-local.
pub async fn extract_card(
    driver: &dyn PageDriver,
    adapter: &dyn PageAdapter,
    tracker: &mut DedupTracker,
    card: NewCard,
    config: &WatchConfig,
) -> Result<Extraction> {
    let id = card.fingerprint.short().to_string();
    let trace = |state: ExtractState| tracing::debug!("Card {} [{}]", id, state);

    trace(ExtractState::PreClick);
    let baseline = adapter.detail_panel_markup(driver).await?;

    click_card(driver, adapter, &card.card).await?;
    tracker.mark_clicked(card.fingerprint);
    trace(ExtractState::Clicked);

    trace(ExtractState::AwaitingChange);
    let min_len = config.min_panel_len;
    let baseline_ref = baseline.as_str();
    let awaited = await_condition(config.panel_poll_interval(), config.panel_deadline(), || async move {
        let current = adapter.detail_panel_markup(driver).await?;
        Ok(panel_changed(baseline_ref, &current, min_len).then_some(current))
    })
    .await;

    let markup = match awaited {
        Ok(markup) => markup,
        Err(WatchError::Timeout(_)) => {
            sleep(config.panel_fallback_pause()).await;
            let current = adapter.detail_panel_markup(driver).await?;
            if !panel_changed(&baseline, &current, min_len) {
                trace(ExtractState::Stale);
                tracing::warn!(
                    "Detail panel did not change within {}ms after clicking card {}",
                    config.panel_deadline_ms,
                    id
                );
                return Ok(Extraction::Stale);
            }
            tracing::debug!("Card {} panel appeared on fallback re-read", id);
            current
        }
        Err(e) => return Err(e),
    };

    let outcome = adapter.parse_detail_markup(&markup);
    trace(ExtractState::Parsed);
    for anomaly in &outcome.anomalies {
        tracing::warn!("Card {}: {}", id, anomaly);
    }

    Ok(Extraction::Parsed { outcome, markup })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::super::discovery::fakes::{FakeAdapter, FakeDriver, FakePage};
    use super::super::discovery::discover_new_cards;
    use super::*;

    const LIST: &str = "https://partner.example/meal/1/order/list";
    const PANEL: &str = "<div class=\"order-detail\">Lahmacun x2, Ayran x1, Toplam 145,00 TL</div>";

    #[test]
    fn empty_baseline_needs_meaningful_content() {
        assert!(!panel_changed("", "", 50));
        assert!(!panel_changed("", &"x".repeat(50), 50));
        assert!(panel_changed("", &"x".repeat(51), 50));
    }

    #[test]
    fn equal_content_is_not_a_change() {
        assert!(!panel_changed(PANEL, PANEL, 50));
    }

    #[test]
    fn differing_content_is_a_change() {
        assert!(panel_changed(PANEL, "<div>Pide</div>", 50));
    }

    async fn first_card(page: &std::sync::Arc<FakePage>) -> NewCard {
        let driver = FakeDriver::new(page.clone());
        let adapter = FakeAdapter { page: page.clone() };
        discover_new_cards(&driver, &adapter, &DedupTracker::new(), 120)
            .await
            .unwrap()
            .remove(0)
    }

    #[tokio::test(start_paused = true)]
    async fn parses_panel_once_it_appears() {
        let page = FakePage::on(LIST);
        page.set_cards(&["Order #1"]);
        page.set_panel_reads(&["", "", "", PANEL]);
        let driver = FakeDriver::new(page.clone());
        let adapter = FakeAdapter { page: page.clone() };
        let mut tracker = DedupTracker::new();
        let card = first_card(&page).await;
        let fingerprint = card.fingerprint.clone();

        let result = extract_card(&driver, &adapter, &mut tracker, card, &WatchConfig::default())
            .await
            .unwrap();

        match result {
            Extraction::Parsed { outcome, markup } => {
                assert_eq!(markup, PANEL);
                assert_eq!(outcome.order.items.len(), 1);
            }
            Extraction::Stale => panic!("expected a parsed panel"),
        }
        assert!(tracker.is_clicked(&fingerprint));
        assert_eq!(page.native_clicks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_panel_is_stale_but_marked() {
        let page = FakePage::on(LIST);
        page.set_cards(&["Order #1"]);
        page.set_panel_reads(&[PANEL]);
        let driver = FakeDriver::new(page.clone());
        let adapter = FakeAdapter { page: page.clone() };
        let mut tracker = DedupTracker::new();
        let card = first_card(&page).await;
        let fingerprint = card.fingerprint.clone();

        let result = extract_card(&driver, &adapter, &mut tracker, card, &WatchConfig::default())
            .await
            .unwrap();

        assert!(matches!(result, Extraction::Stale));
        assert!(tracker.is_clicked(&fingerprint));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_click_leaves_card_unmarked() {
        let page = FakePage::on(LIST);
        page.set_cards(&["Order detached"]);
        page.script_click_fails.store(true, Ordering::SeqCst);
        let driver = FakeDriver::new(page.clone());
        let adapter = FakeAdapter { page: page.clone() };
        let mut tracker = DedupTracker::new();
        let card = first_card(&page).await;
        let fingerprint = card.fingerprint.clone();

        let err = extract_card(&driver, &adapter, &mut tracker, card, &WatchConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, WatchError::StaleElement(_)));
        assert!(!tracker.is_clicked(&fingerprint));
    }
}
