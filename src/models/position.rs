//! Position record as observed on the exchange.

/// Snapshot of one copy-trading position at a point in time.
///
/// Only `id` and `trader_id` carry meaning for tracking. The rest is display
/// data kept as the exchange rendered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionRecord {
    /// Order / tracking number, stable across polls
    pub id: String,

    /// Trader that owns the position, if the exchange reported one
    pub trader_id: Option<String>,

    /// Contract symbol (e.g. "BTCUSDT_UMCBL")
    pub symbol: Option<String>,

    /// Direction as reported (e.g. "open_long", "short")
    pub side: Option<String>,

    pub size: Option<String>,

    /// Entry price
    pub price: Option<String>,

    pub leverage: Option<String>,

    /// Realized profit, only present on history records
    pub profit: Option<String>,
}

impl PositionRecord {
    /// Create a record with only an id and owner; display fields are empty.
    pub fn new(id: impl Into<String>, trader_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            trader_id: Some(trader_id.into()),
            symbol: None,
            side: None,
            size: None,
            price: None,
            leverage: None,
            profit: None,
        }
    }

    /// Whether this position belongs to the given trader.
    pub fn belongs_to(&self, trader_id: &str) -> bool {
        self.trader_id.as_deref() == Some(trader_id)
    }
}

// Fixture builders.
#[cfg(test)]
impl PositionRecord {
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_side(mut self, side: impl Into<String>) -> Self {
        self.side = Some(side.into());
        self
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = Some(price.into());
        self
    }

    pub fn with_leverage(mut self, leverage: impl Into<String>) -> Self {
        self.leverage = Some(leverage.into());
        self
    }

    pub fn with_profit(mut self, profit: impl Into<String>) -> Self {
        self.profit = Some(profit.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_belongs_to() {
        let pos = PositionRecord::new("1", "T");
        assert!(pos.belongs_to("T"));
        assert!(!pos.belongs_to("U"));

        let orphan = PositionRecord {
            trader_id: None,
            ..pos
        };
        assert!(!orphan.belongs_to("T"));
    }

    #[test]
    fn test_builder_fills_display_fields() {
        let pos = PositionRecord::new("42", "T")
            .with_symbol("BTCUSDT_UMCBL")
            .with_side("open_long")
            .with_size("0.01")
            .with_price("64000.5")
            .with_leverage("20");

        assert_eq!(pos.symbol.as_deref(), Some("BTCUSDT_UMCBL"));
        assert_eq!(pos.side.as_deref(), Some("open_long"));
        assert_eq!(pos.size.as_deref(), Some("0.01"));
        assert_eq!(pos.price.as_deref(), Some("64000.5"));
        assert_eq!(pos.leverage.as_deref(), Some("20"));
        assert!(pos.profit.is_none());
    }
}
