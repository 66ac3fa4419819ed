//! Lifecycle events produced by the tracker.

use super::PositionRecord;

/// A position lifecycle transition worth notifying about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionEvent {
    /// First time the position was seen open
    Opened(PositionRecord),
    /// Previously open position disappeared from the snapshot
    Closed(PositionRecord),
    /// Closed position found in history that was never seen open
    Missed(PositionRecord),
}

impl PositionEvent {
    pub fn record(&self) -> &PositionRecord {
        match self {
            PositionEvent::Opened(r) | PositionEvent::Closed(r) | PositionEvent::Missed(r) => r,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PositionEvent::Opened(_) => "opened",
            PositionEvent::Closed(_) => "closed",
            PositionEvent::Missed(_) => "missed",
        }
    }
}
