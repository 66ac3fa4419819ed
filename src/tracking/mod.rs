//! Position tracking: snapshot diffing, reconciliation, message formatting.

mod config;
mod format;
mod tracker;

pub use config::TrackerConfig;
pub use format::{format_event, format_startup, format_test_message};
pub use tracker::{PositionTracker, TrackerStats};
