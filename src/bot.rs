//! Bot runner: the polling loop that drives the position tracker.
//!
//! Handles:
//! - Seeding the tracker so pre-existing positions are not announced
//! - Polling the live snapshot and notifying on transitions
//! - Periodic reconciliation against the history feed
//! - Backing off after failed polls

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::{Backoff, Constant};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::api::{Notifier, PositionFeed};
use crate::error::{MonitorError, MonitorResult};
use crate::models::{PositionEvent, PositionRecord};
use crate::tracking::{format_event, format_startup, PositionTracker, TrackerConfig, TrackerStats};

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Tracking configuration (trader id, history window, pruning)
    pub tracker: TrackerConfig,

    /// Delay between polls in normal operation
    pub poll_interval: Duration,

    /// Delay after a failed poll
    pub backoff_interval: Duration,

    /// How often the history feed is reconciled
    pub reconcile_interval: Duration,

    /// Upper bound for every fetch and delivery
    pub request_timeout: Duration,

    /// Seed state from the first snapshot instead of announcing it
    pub seed_on_start: bool,

    /// Send a message when monitoring starts
    pub announce_start: bool,
}

impl BotConfig {
    pub fn validate(&self) -> MonitorResult<()> {
        self.tracker.validate()?;
        for (name, value) in [
            ("poll interval", self.poll_interval),
            ("backoff interval", self.backoff_interval),
            ("reconcile interval", self.reconcile_interval),
            ("request timeout", self.request_timeout),
        ] {
            if value.is_zero() {
                return Err(MonitorError::Config(format!("{name} must be positive")));
            }
        }
        Ok(())
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            poll_interval: Duration::from_secs(10),
            backoff_interval: Duration::from_secs(60),
            reconcile_interval: Duration::from_secs(300),
            request_timeout: Duration::from_secs(30),
            seed_on_start: true,
            announce_start: false,
        }
    }
}

/// Driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BotState {
    /// Normal cadence
    Polling,
    /// Waiting out a failure before polling again
    Backoff,
}

/// Timed cadence for reconciliation, measured from the last run.
#[derive(Debug, Clone)]
pub struct ReconcileSchedule {
    every: Duration,
    last: Instant,
}

impl ReconcileSchedule {
    pub fn new(every: Duration, start: Instant) -> Self {
        Self { every, last: start }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last) >= self.every
    }

    pub fn mark(&mut self, now: Instant) {
        self.last = now;
    }
}

/// Main bot runner.
pub struct Bot<F, N> {
    config: BotConfig,
    feed: F,
    notifier: N,
    tracker: PositionTracker,
    state: BotState,
    seeded: bool,
    schedule: ReconcileSchedule,
    backoff: Constant,

    // Snapshot-copied after every step for the health endpoint
    stats: Arc<RwLock<BotStats>>,
}

impl<F: PositionFeed, N: Notifier> Bot<F, N> {
    pub fn new(config: BotConfig, feed: F, notifier: N) -> Self {
        let tracker = PositionTracker::new(config.tracker.clone());
        let schedule = ReconcileSchedule::new(config.reconcile_interval, Instant::now());
        let backoff = Constant::new(config.backoff_interval);

        Self {
            seeded: !config.seed_on_start,
            config,
            feed,
            notifier,
            tracker,
            state: BotState::Polling,
            schedule,
            backoff,
            stats: Arc::new(RwLock::new(BotStats::default())),
        }
    }

    /// Shared stats handle for external readers.
    pub fn stats_handle(&self) -> Arc<RwLock<BotStats>> {
        self.stats.clone()
    }

    pub fn state(&self) -> BotState {
        self.state
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Seed the tracker and optionally announce startup.
    ///
    /// A failed seed is not fatal: the first successful poll seeds instead.
    pub async fn initialize(&mut self) {
        info!(
            trader = %self.config.tracker.trader_id,
            seed = self.config.seed_on_start,
            "Initializing bot..."
        );

        if !self.seeded {
            let fetched = with_timeout(
                "fetch_open_positions",
                self.config.request_timeout,
                self.feed.fetch_open_positions(),
            )
            .await;

            match fetched {
                Ok(snapshot) => self.seed(&snapshot, Instant::now()).await,
                Err(e) => warn!(error = %e, "Initial fetch failed, will seed on first successful poll"),
            }
        }

        if self.config.announce_start {
            let text = format_startup(&self.config.tracker.trader_id);
            self.deliver(&text).await;
        }

        self.refresh_stats().await;
    }

    /// Main run loop. Stops only on Ctrl+C.
    pub async fn run(&mut self) {
        self.run_until(tokio::signal::ctrl_c()).await;
    }

    /// Run until `shutdown` resolves, whether mid-step or while sleeping.
    pub async fn run_until<S: Future>(&mut self, shutdown: S) {
        info!(
            poll_interval = ?self.config.poll_interval,
            backoff_interval = ?self.config.backoff_interval,
            reconcile_interval = ?self.config.reconcile_interval,
            "Starting bot run loop"
        );

        tokio::pin!(shutdown);

        loop {
            let delay = tokio::select! {
                _ = &mut shutdown => break,
                delay = self.step(Instant::now()) => delay,
            };

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Shutdown signal received");
    }

    /// Run one iteration and return how long to sleep before the next.
    pub async fn step(&mut self, now: Instant) -> Duration {
        let result = self.poll(now).await;

        let delay = match &result {
            Ok(()) => {
                if self.state == BotState::Backoff {
                    info!("Poll succeeded, leaving backoff");
                    self.backoff.reset();
                }
                self.state = BotState::Polling;
                self.config.poll_interval
            }
            Err(e) if e.triggers_backoff() => {
                error!(error = %e, "Error in bot tick");
                self.state = BotState::Backoff;
                self.backoff
                    .next_backoff()
                    .unwrap_or(self.config.backoff_interval)
            }
            Err(e) => {
                warn!(error = %e, "Poll failed, keeping normal cadence");
                self.state = BotState::Polling;
                self.config.poll_interval
            }
        };

        {
            let mut stats = self.stats.write().await;
            stats.polls += 1;
            stats.last_poll_at = Some(Utc::now());
            if let Err(e) = result {
                stats.failed_polls += 1;
                stats.last_error = Some(e.to_string());
            }
        }
        self.refresh_stats().await;
        delay
    }

    /// Single poll: snapshot, classify, notify, maybe reconcile.
    async fn poll(&mut self, now: Instant) -> MonitorResult<()> {
        debug!("Bot tick");

        let snapshot = with_timeout(
            "fetch_open_positions",
            self.config.request_timeout,
            self.feed.fetch_open_positions(),
        )
        .await?;

        if !self.seeded {
            self.seed(&snapshot, now).await;
            return Ok(());
        }

        let events = self.tracker.observe(&snapshot);
        debug!(positions = snapshot.len(), events = events.len(), "Snapshot classified");
        self.dispatch(events).await;

        if self.schedule.is_due(now) {
            self.reconcile(now).await;
        }

        Ok(())
    }

    async fn seed(&mut self, snapshot: &[PositionRecord], now: Instant) {
        let history = match with_timeout(
            "fetch_history",
            self.config.request_timeout,
            self.feed.fetch_history(self.config.tracker.history_window),
        )
        .await
        {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "History unavailable while seeding");
                Vec::new()
            }
        };

        self.tracker.seed(snapshot, &history);
        self.seeded = true;
        self.schedule.mark(now);
    }

    /// Failures are logged and retried on the next cadence tick.
    async fn reconcile(&mut self, now: Instant) {
        self.schedule.mark(now);
        self.stats.write().await.reconciliations += 1;

        let history = with_timeout(
            "fetch_history",
            self.config.request_timeout,
            self.feed.fetch_history(self.config.tracker.history_window),
        )
        .await;

        match history {
            Ok(history) => {
                let events = self.tracker.reconcile(&history);
                debug!(records = history.len(), missed = events.len(), "History reconciled");
                self.dispatch(events).await;
            }
            Err(e) => warn!(error = %e, "Reconciliation skipped"),
        }
    }

    async fn dispatch(&mut self, events: Vec<PositionEvent>) {
        for event in events {
            let record = event.record();
            info!(
                kind = event.kind(),
                id = %record.id,
                symbol = record.symbol.as_deref().unwrap_or("Unknown"),
                side = record.side.as_deref().unwrap_or("Unknown"),
                "Position event"
            );
            self.stats.write().await.events_emitted += 1;

            let text = format_event(&event);
            self.deliver(&text).await;
        }
    }

    /// Delivery failures are logged and dropped.
    async fn deliver(&self, text: &str) {
        let result = with_timeout(
            "deliver",
            self.config.request_timeout,
            self.notifier.deliver(text),
        )
        .await;

        let mut stats = self.stats.write().await;
        match result {
            Ok(()) => stats.notifications_sent += 1,
            Err(e) => {
                warn!(error = %e, "Notification not delivered");
                stats.deliveries_failed += 1;
            }
        }
    }

    async fn refresh_stats(&self) {
        let mut stats = self.stats.write().await;
        stats.state = self.state;
        stats.seeded = self.seeded;
        stats.tracker = self.tracker.stats();
    }
}

/// Bound a fetch or delivery; an elapsed timeout is an ordinary failure.
async fn with_timeout<T, Fut>(operation: &'static str, after: Duration, fut: Fut) -> MonitorResult<T>
where
    Fut: Future<Output = MonitorResult<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(MonitorError::Timeout { operation, after }),
    }
}

/// Bot statistics.
#[derive(Debug, Clone, Serialize)]
pub struct BotStats {
    pub state: BotState,
    pub seeded: bool,
    pub polls: u64,
    pub failed_polls: u64,
    pub reconciliations: u64,
    pub events_emitted: u64,
    pub notifications_sent: u64,
    pub deliveries_failed: u64,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub tracker: TrackerStats,
}

impl Default for BotStats {
    fn default() -> Self {
        Self {
            state: BotState::Polling,
            seeded: false,
            polls: 0,
            failed_polls: 0,
            reconciliations: 0,
            events_emitted: 0,
            notifications_sent: 0,
            deliveries_failed: 0,
            last_poll_at: None,
            last_error: None,
            tracker: TrackerStats::default(),
        }
    }
}

impl fmt::Display for BotStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Bot Statistics ===")?;
        writeln!(f, "State:           {:?}", self.state)?;
        writeln!(f, "Polls:           {} (Failed: {})", self.polls, self.failed_polls)?;
        writeln!(f, "Reconciliations: {}", self.reconciliations)?;
        writeln!(f, "Events:          {}", self.events_emitted)?;
        writeln!(
            f,
            "Notifications:   {} (Failed: {})",
            self.notifications_sent, self.deliveries_failed
        )?;
        writeln!(
            f,
            "Positions:       {} open, {} known, {} closed ids",
            self.tracker.open, self.tracker.known, self.tracker.closed
        )?;
        writeln!(
            f,
            "Last Poll:       {}",
            self.last_poll_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "Never".to_string())
        )?;
        Ok(())
    }
}
