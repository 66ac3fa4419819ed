//! Telegram message templates for position events.

use crate::models::{PositionEvent, PositionRecord};

const UNKNOWN: &str = "Unknown";

/// Render an event as a Telegram Markdown message.
pub fn format_event(event: &PositionEvent) -> String {
    match event {
        PositionEvent::Opened(r) => format!(
            "🟢 *New Position Opened!* 🟢\n\n\
             {header}\
             Price: {price}\n\
             Leverage: {leverage}\n\n\
             Trade ID: `{id}`",
            header = header(r),
            price = field(&r.price),
            leverage = leverage(&r.leverage),
            id = code(&r.id),
        ),
        PositionEvent::Closed(r) => format!(
            "🔴 *Position Closed* 🔴\n\n\
             {header}\n\
             Trade ID: `{id}`",
            header = header(r),
            id = code(&r.id),
        ),
        PositionEvent::Missed(r) => format!(
            "🟠 *Missed Position Closed* 🟠\n\
             _Opened and closed between checks_\n\n\
             {header}\
             Profit: {profit}\n\n\
             Trade ID: `{id}`",
            header = header(r),
            profit = field(&r.profit),
            id = code(&r.id),
        ),
    }
}

/// Sent once when monitoring starts.
pub fn format_startup(trader_id: &str) -> String {
    format!(
        "👀 *Monitoring started* 👀\n\nTrader: {}",
        escape_markdown(trader_id)
    )
}

/// Sent by the connectivity check.
pub fn format_test_message() -> String {
    "🧪 *Test Message* 🧪\nThis is a test from your Bitget notification bot.".to_string()
}

fn header(r: &PositionRecord) -> String {
    format!(
        "Trader: {}\nSymbol: {}\nAction: {}\nSize: {}\n",
        field(&r.trader_id),
        field(&r.symbol),
        field(&r.side),
        field(&r.size),
    )
}

fn field(value: &Option<String>) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => escape_markdown(v),
        _ => UNKNOWN.to_string(),
    }
}

fn leverage(value: &Option<String>) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => format!("{}x", escape_markdown(v)),
        _ => UNKNOWN.to_string(),
    }
}

/// Code spans cannot contain backticks.
fn code(value: &str) -> String {
    if value.is_empty() {
        UNKNOWN.to_string()
    } else {
        value.replace('`', "'")
    }
}

/// Escape the characters legacy Telegram Markdown treats as entity markers.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> PositionRecord {
        PositionRecord::new("1001", "T")
            .with_symbol("BTCUSDT")
            .with_side("open_long")
            .with_size("0.5")
            .with_price("64000")
            .with_leverage("10")
    }

    #[test]
    fn test_opened_template() {
        let msg = format_event(&PositionEvent::Opened(full()));
        assert_eq!(
            msg,
            "🟢 *New Position Opened!* 🟢\n\n\
             Trader: T\n\
             Symbol: BTCUSDT\n\
             Action: open\\_long\n\
             Size: 0.5\n\
             Price: 64000\n\
             Leverage: 10x\n\n\
             Trade ID: `1001`"
        );
    }

    #[test]
    fn test_closed_template() {
        let msg = format_event(&PositionEvent::Closed(full()));
        assert!(msg.starts_with("🔴 *Position Closed* 🔴"));
        assert!(msg.contains("Symbol: BTCUSDT\n"));
        assert!(msg.ends_with("Trade ID: `1001`"));
        assert!(!msg.contains("Leverage"));
    }

    #[test]
    fn test_missed_carries_profit() {
        let msg = format_event(&PositionEvent::Missed(
            PositionRecord::new("5", "T").with_profit("12.3"),
        ));
        assert!(msg.contains("Profit: 12.3\n"));
        assert!(msg.contains("Trade ID: `5`"));
    }

    #[test]
    fn test_missing_fields_render_unknown() {
        let bare = PositionRecord {
            trader_id: None,
            ..PositionRecord::new("9", "T")
        };
        let msg = format_event(&PositionEvent::Opened(bare));

        assert!(msg.contains("Trader: Unknown\n"));
        assert!(msg.contains("Symbol: Unknown\n"));
        assert!(msg.contains("Price: Unknown\n"));
        assert!(msg.contains("Leverage: Unknown\n"));

        let msg = format_event(&PositionEvent::Missed(PositionRecord::new("9", "T")));
        assert!(msg.contains("Profit: Unknown\n"));
    }

    #[test]
    fn test_markdown_is_escaped() {
        assert_eq!(escape_markdown("BTCUSDT_UMCBL"), "BTCUSDT\\_UMCBL");
        assert_eq!(escape_markdown("*[x]`"), "\\*\\[x]\\`");

        let record = PositionRecord::new("a`b", "T").with_symbol("ETHUSDT_UMCBL");
        let msg = format_event(&PositionEvent::Closed(record));
        assert!(msg.contains("Symbol: ETHUSDT\\_UMCBL"));
        assert!(msg.contains("Trade ID: `a'b`"));
    }
}
