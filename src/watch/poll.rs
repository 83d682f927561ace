//! The top-level watch loop and its session recovery.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::adapter::PageAdapter;
use super::discovery::discover_new_cards;
use super::extractor::{extract_card, Extraction};
use super::fingerprint::DedupTracker;
use crate::browser::{PageDriver, SessionFactory};
use crate::config::WatchConfig;
use crate::error::{Result, WatchError};
use crate::order::ParseOutcome;
use crate::output::{capture_page_html, print_summary, OrderEntry, OrderLog, SnapshotStore};

/// Fires once per wall-clock slot of `interval_secs` seconds.
///
/// Slots are aligned to the Unix epoch, so with 30s every snapshot lands on
/// :00 or :30 no matter when the loop started.
#[derive(Debug, Clone)]
pub struct SnapshotSchedule {
    interval_secs: i64,
    last_slot: Option<i64>,
}

impl SnapshotSchedule {
    pub fn new(interval_secs: u64) -> Self {
        Self {
            interval_secs: i64::try_from(interval_secs.max(1)).unwrap_or(i64::MAX),
            last_slot: None,
        }
    }

    pub fn due(&mut self, now: DateTime<Local>) -> bool {
        self.due_at(now.timestamp())
    }

    /// Whether a snapshot is due at `unix_secs`; marks the slot as taken
    pub fn due_at(&mut self, unix_secs: i64) -> bool {
        let slot = unix_secs.div_euclid(self.interval_secs);
        if self.last_slot == Some(slot) {
            return false;
        }
        self.last_slot = Some(slot);
        true
    }
}

/// Counters reported when the loop stops
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollStats {
    pub ticks: u64,
    pub cards_clicked: u64,
    pub orders_parsed: u64,
    pub detail_pages: u64,
    pub stale_panels: u64,
    pub card_failures: u64,
    pub tick_errors: u64,
    pub recoveries: u64,
    pub snapshots: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Recovering,
    Stopped,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Running => "running",
            Self::Recovering => "recovering",
            Self::Stopped => "stopped",
        })
    }
}

/// Owns the session, the dedup tracker and the outputs for one watch run.
pub struct PollLoop {
    config: WatchConfig,
    adapter: Arc<dyn PageAdapter>,
    factory: Box<dyn SessionFactory>,
    snapshots: SnapshotStore,
    order_log: OrderLog,
    screenshots: bool,
    tracker: DedupTracker,
    schedule: SnapshotSchedule,
    stats: PollStats,
    state: LoopState,
}

impl PollLoop {
    pub fn new(
        config: WatchConfig,
        adapter: Arc<dyn PageAdapter>,
        factory: Box<dyn SessionFactory>,
        snapshots: SnapshotStore,
        order_log: OrderLog,
    ) -> Self {
        let schedule = SnapshotSchedule::new(config.snapshot_interval_secs);
        Self {
            config,
            adapter,
            factory,
            snapshots,
            order_log,
            screenshots: false,
            tracker: DedupTracker::new(),
            schedule,
            stats: PollStats::default(),
            state: LoopState::Stopped,
        }
    }

    /// Also save a full-page PNG with every periodic snapshot
    pub fn with_screenshots(mut self, enabled: bool) -> Self {
        self.screenshots = enabled;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> &PollStats {
        &self.stats
    }

    pub fn tracker(&self) -> &DedupTracker {
        &self.tracker
    }

    fn set_state(&mut self, state: LoopState) {
        if self.state != state {
            tracing::debug!("Poll loop: {} -> {}", self.state, state);
            self.state = state;
        }
    }

    /// Run until `cancel` fires or the session cannot be recovered.
    ///
    /// A launch failure is returned before any tick; a failed recovery is
    /// returned as `RecoveryFailed`. The session is closed on every path.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<PollStats> {
        let mut driver = self.factory.create().await?;
        self.set_state(LoopState::Running);

        let result = self.drive(&mut driver, &cancel).await;

        self.set_state(LoopState::Stopped);
        let uptime = Local::now() - driver.created_at();
        tracing::info!(
            "Session {} (started {}, up {}s): {} tick(s), {} card(s) clicked, {} order(s) parsed",
            driver.session_id(),
            driver.created_at().format("%Y-%m-%d %H:%M:%S"),
            uptime.num_seconds(),
            self.stats.ticks,
            self.stats.cards_clicked,
            self.stats.orders_parsed
        );
        driver.close().await;

        result.map(|()| self.stats.clone())
    }

    async fn drive(&mut self, driver: &mut Box<dyn PageDriver>, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let mut on_target = false;

        loop {
            let pause = match self.step(driver.as_mut(), &mut on_target, cancel).await {
                Ok(()) => self.config.poll_interval(),
                Err(e) if e.is_transport_lost() => {
                    tracing::warn!("Browser session lost: {}", e);
                    if !self.recover(driver, cancel).await? {
                        return Ok(());
                    }
                    on_target = true;
                    self.config.poll_interval()
                }
                Err(e) => {
                    self.stats.tick_errors += 1;
                    tracing::warn!(
                        "Tick failed: {} (retrying in {}s)",
                        e,
                        self.config.error_backoff_secs
                    );
                    self.config.error_backoff()
                }
            };

            if pause_or_cancel(pause, cancel).await {
                tracing::info!("Stop requested");
                return Ok(());
            }
        }
    }

    /// Open the target page until that succeeds once, then tick
    async fn step(&mut self, driver: &mut dyn PageDriver, on_target: &mut bool, cancel: &CancellationToken) -> Result<()> {
        if !*on_target {
            self.open_target(driver).await?;
            *on_target = true;
        }
        self.tick(driver, cancel).await
    }

    /// Optional warm-up visit, then the order list page
    async fn open_target(&mut self, driver: &mut dyn PageDriver) -> Result<()> {
        if let Some(warmup) = self.config.warmup_url.clone() {
            match driver.navigate(&warmup).await {
                Ok(()) => {
                    let url = driver.current_url().await.unwrap_or_default();
                    let title = driver.title().await.unwrap_or_default();
                    tracing::info!("Warm-up page loaded: {} ({})", url, title);
                }
                Err(e) if e.is_transport_lost() => return Err(e),
                Err(e) => tracing::warn!("Warm-up navigation failed: {}", e),
            }
        }

        driver.navigate(&self.config.target_url).await
    }

    /// Close the dead session and start over on the target page.
    ///
    /// Returns `Ok(false)` if a stop was requested while waiting.
    async fn recover(&mut self, driver: &mut Box<dyn PageDriver>, cancel: &CancellationToken) -> Result<bool> {
        self.set_state(LoopState::Recovering);
        self.stats.recoveries += 1;
        driver.close().await;

        if pause_or_cancel(self.config.recovery_pause(), cancel).await {
            return Ok(false);
        }

        let mut fresh = self
            .factory
            .create()
            .await
            .map_err(|e| WatchError::RecoveryFailed(format!("relaunch failed: {}", e)))?;

        if let Err(e) = fresh.navigate(&self.config.target_url).await {
            fresh.close().await;
            return Err(WatchError::RecoveryFailed(format!(
                "navigation after relaunch failed: {}",
                e
            )));
        }

        *driver = fresh;
        self.set_state(LoopState::Running);
        tracing::info!("Browser session recovered ({})", driver.session_id());
        Ok(true)
    }

    async fn tick(&mut self, driver: &mut dyn PageDriver, cancel: &CancellationToken) -> Result<()> {
        self.stats.ticks += 1;
        let adapter = Arc::clone(&self.adapter);
        let url = driver.current_url().await?;

        if self.schedule.due(Local::now()) {
            self.write_snapshot(driver).await?;
        }

        if adapter.is_detail_page(&url) {
            return self.handle_detail_page(driver, adapter.as_ref(), &url).await;
        }

        if !adapter.is_list_page(&url) {
            tracing::debug!("Not on the order list ({}), waiting", url);
            return Ok(());
        }

        let cards = discover_new_cards(
            &*driver,
            adapter.as_ref(),
            &self.tracker,
            self.config.fingerprint_prefix_len,
        )
        .await?;

        for (i, card) in cards.into_iter().enumerate() {
            if i > 0 && pause_or_cancel(self.config.click_pause(), cancel).await {
                tracing::info!("Stop requested, leaving remaining cards for later");
                break;
            }
            let source = card.fingerprint.short().to_string();

            match extract_card(&*driver, adapter.as_ref(), &mut self.tracker, card, &self.config).await {
                Ok(Extraction::Parsed { outcome, .. }) => {
                    self.stats.cards_clicked += 1;
                    self.record_order(&url, &source, outcome);
                }
                Ok(Extraction::Stale) => {
                    self.stats.cards_clicked += 1;
                    self.stats.stale_panels += 1;
                }
                Err(e) if e.is_transport_lost() => return Err(e),
                Err(e) => {
                    self.stats.card_failures += 1;
                    tracing::warn!("Card {} skipped: {}", source, e);
                }
            }
        }

        Ok(())
    }

    /// Parse a detail page once per URL, then go back to the list
    async fn handle_detail_page(&mut self, driver: &mut dyn PageDriver, adapter: &dyn PageAdapter, url: &str) -> Result<()> {
        if self.tracker.mark_detail_processed(url) {
            let html = capture_page_html(&*driver).await?;
            if let Err(e) = self.snapshots.save_with_prefix("detail", &html) {
                tracing::warn!("Failed to save detail snapshot: {}", e);
            }
            self.stats.detail_pages += 1;
            self.record_order(url, "detail page", adapter.parse_detail_markup(&html));
            tracing::info!(
                "Detail page processed ({} total)",
                self.tracker.processed_detail_count()
            );
        }

        driver.navigate(&self.config.target_url).await
    }

    fn record_order(&mut self, url: &str, source: &str, outcome: ParseOutcome) {
        self.stats.orders_parsed += 1;
        let entry = OrderEntry::new(url, source, outcome);
        if let Err(e) = self.order_log.append(&entry) {
            tracing::error!("Failed to append order to {}: {}", self.order_log.path().display(), e);
        }
        print_summary(&entry);
    }

    /// Periodic capture; only a lost transport is an error here
    async fn write_snapshot(&mut self, driver: &dyn PageDriver) -> Result<()> {
        let html = capture_page_html(driver).await?;
        match self.snapshots.save(&html) {
            Ok(_) => self.stats.snapshots += 1,
            Err(e) => tracing::warn!("Failed to save snapshot: {}", e),
        }

        if self.screenshots {
            let path = self.snapshots.next_path("screenshot", "png");
            match driver.screenshot(&path, true).await {
                Ok(()) => {}
                Err(e) if e.is_transport_lost() => return Err(e),
                Err(e) => tracing::warn!("Failed to save screenshot: {}", e),
            }
        }
        Ok(())
    }
}

/// Sleep for `pause`, returning true early if `cancel` fires first
async fn pause_or_cancel(pause: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = sleep(pause) => false,
    }
}
