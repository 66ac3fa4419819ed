//! Error taxonomy for the monitor loop.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the feed, the notifier, or record parsing.
///
/// The driver asks [`MonitorError::triggers_backoff`] after a failed poll:
/// fetch, exchange, timeout and config errors move it into backoff, the rest
/// are logged and polling continues at the normal cadence.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("exchange rejected request: code {code}: {msg}")]
    Exchange { code: String, msg: String },

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("malformed position record: {0}")]
    MalformedRecord(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MonitorError {
    /// Whether the driver should back off after this error.
    pub fn triggers_backoff(&self) -> bool {
        !matches!(self, MonitorError::Delivery(_) | MonitorError::MalformedRecord(_))
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        MonitorError::Fetch(err.to_string())
    }
}

pub type MonitorResult<T> = std::result::Result<T, MonitorError>;
