//! Tracker configuration.

use crate::error::{MonitorError, MonitorResult};

/// Configuration for position tracking and notification dedup.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Trader whose positions produce notifications
    pub trader_id: String,

    /// Number of most recent history records considered per reconciliation
    pub history_window: usize,

    /// Prune the closed set once it grows past this size
    pub closed_ceiling: usize,

    /// How many of the most recently closed ids survive a prune
    pub closed_retain: usize,
}

impl TrackerConfig {
    pub fn new(trader_id: impl Into<String>) -> Self {
        Self {
            trader_id: trader_id.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> MonitorResult<()> {
        if self.trader_id.trim().is_empty() {
            return Err(MonitorError::Config("trader id is empty".into()));
        }
        if self.history_window == 0 {
            return Err(MonitorError::Config("history window must be positive".into()));
        }
        if self.closed_retain == 0 || self.closed_retain >= self.closed_ceiling {
            return Err(MonitorError::Config(format!(
                "closed retain ({}) must be between 1 and the ceiling ({})",
                self.closed_retain, self.closed_ceiling
            )));
        }
        Ok(())
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            trader_id: String::new(),
            history_window: 20,
            closed_ceiling: 100,
            closed_retain: 50,
        }
    }
}
