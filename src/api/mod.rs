//! Exchange and notification clients, and the traits the bot drives them through.

mod bitget_client;
mod signer;
mod telegram;
mod types;

use async_trait::async_trait;

use crate::error::MonitorResult;
use crate::models::PositionRecord;

pub use bitget_client::{mask, BitgetClient, BitgetCredentials, HISTORY_ORDERS_PATH};
pub use signer::RequestSigner;
pub use telegram::TelegramNotifier;

/// Source of live and historical positions.
#[async_trait]
pub trait PositionFeed: Send + Sync {
    /// Current open positions.
    async fn fetch_open_positions(&self) -> MonitorResult<Vec<PositionRecord>>;

    /// Most recent closed positions, newest first, at most `limit` of them.
    async fn fetch_history(&self, limit: usize) -> MonitorResult<Vec<PositionRecord>>;
}

/// Delivers a formatted message to a fixed destination.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, text: &str) -> MonitorResult<()>;
}
