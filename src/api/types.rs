//! Wire types for the Bitget and Telegram APIs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{MonitorError, MonitorResult};
use crate::models::PositionRecord;

/// Bitget's success code.
pub const SUCCESS_CODE: &str = "00000";

/// Keys under which paged endpoints nest their record list.
const LIST_KEYS: [&str; 4] = ["list", "orderList", "trackingList", "data"];

/// Standard Bitget response envelope: `{ code, msg, data }`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ApiEnvelope {
    /// Check the response code and return the raw record list.
    ///
    /// A missing or null `data` is an empty list. Paged endpoints nest the
    /// list inside an object, so a few well-known keys are looked up; an
    /// object without any of them is a fetch error.
    pub fn into_records(self) -> MonitorResult<Vec<Value>> {
        if let Some(code) = self.code.as_ref().and_then(text) {
            if code != SUCCESS_CODE {
                return Err(MonitorError::Exchange {
                    code,
                    msg: self.msg.unwrap_or_default(),
                });
            }
        }

        match self.data {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Object(mut obj)) => {
                for key in LIST_KEYS {
                    match obj.remove(key) {
                        Some(Value::Array(items)) => return Ok(items),
                        Some(Value::Null) => return Ok(Vec::new()),
                        _ => {}
                    }
                }
                // An unknown shape must not read as "no open positions".
                let keys: Vec<_> = obj.keys().map(String::as_str).collect();
                Err(MonitorError::Fetch(format!(
                    "unrecognised data payload, keys: [{}]",
                    keys.join(", ")
                )))
            }
            Some(other) => Err(MonitorError::Fetch(format!(
                "unexpected data payload: {other}"
            ))),
        }
    }
}

const ID_KEYS: &[&str] = &["orderId", "trackingNo", "id"];
const TRADER_KEYS: &[&str] = &["traderId", "traderUserId"];
const SYMBOL_KEYS: &[&str] = &["symbol"];
const SIDE_KEYS: &[&str] = &["side", "holdSide", "posSide"];
const SIZE_KEYS: &[&str] = &["size", "openDealCount", "openAmount"];
const PRICE_KEYS: &[&str] = &["price", "openPrice", "openAvgPrice", "averageOpenPrice"];
const LEVERAGE_KEYS: &[&str] = &["leverage", "openLeverage"];
const PROFIT_KEYS: &[&str] = &["profit", "achievedProfits", "netProfit"];

/// Convert one raw exchange record into a `PositionRecord`.
///
/// Display fields are kept as text, whether they arrived as strings or
/// numbers. A record without an id is malformed.
pub fn parse_position(raw: &Value) -> MonitorResult<PositionRecord> {
    let obj = raw
        .as_object()
        .ok_or_else(|| MonitorError::MalformedRecord(format!("not an object: {raw}")))?;

    let id = lookup(obj, ID_KEYS)
        .ok_or_else(|| MonitorError::MalformedRecord("missing orderId".to_string()))?;

    Ok(PositionRecord {
        id,
        trader_id: lookup(obj, TRADER_KEYS),
        symbol: lookup(obj, SYMBOL_KEYS),
        side: lookup(obj, SIDE_KEYS),
        size: lookup(obj, SIZE_KEYS),
        price: lookup(obj, PRICE_KEYS),
        leverage: lookup(obj, LEVERAGE_KEYS),
        profit: lookup(obj, PROFIT_KEYS),
    })
}

fn lookup(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| obj.get(*k).and_then(text))
}

/// Textual rendering of a scalar JSON value; empty strings count as absent.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Body of Telegram's `sendMessage`.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageRequest<'a> {
    pub chat_id: &'a str,
    pub text: &'a str,
    pub parse_mode: &'a str,
}

/// Telegram Bot API response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramResponse {
    pub ok: bool,
    #[serde(default)]
    pub description: Option<String>,
}
