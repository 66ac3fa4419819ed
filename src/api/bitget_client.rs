//! Bitget REST client for copy-trading positions.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::{MonitorError, MonitorResult};
use crate::models::PositionRecord;

use super::signer::{HmacSigner, RequestSigner};
use super::types::{parse_position, ApiEnvelope};
use super::PositionFeed;

pub const BITGET_API_BASE: &str = "https://api.bitget.com";
pub const CURRENT_ORDERS_PATH: &str = "/api/mix/v1/copy/currentOrders";
/// Default history endpoint. Assumed from Bitget's v1 copy-trading naming and
/// not confirmed against live responses; override with `with_history_path`.
pub const HISTORY_ORDERS_PATH: &str = "/api/mix/v1/copy/historyOrders";

/// API key, secret and passphrase for Bitget.
#[derive(Clone)]
pub struct BitgetCredentials {
    pub api_key: String,
    pub secret_key: String,
    pub passphrase: String,
}

impl fmt::Debug for BitgetCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitgetCredentials")
            .field("api_key", &mask(&self.api_key))
            .field("secret_key", &"***")
            .field("passphrase", &"***")
            .finish()
    }
}

/// Show only the edges of a secret, e.g. `bg_1...9f2c`.
pub fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Authenticated client for the copy-trading endpoints.
pub struct BitgetClient {
    client: Client,
    base_url: String,
    history_path: String,
    api_key: String,
    passphrase: String,
    signer: Box<dyn RequestSigner>,
}

impl BitgetClient {
    /// Create a client signing with Bitget's HMAC scheme.
    pub fn new(credentials: BitgetCredentials, timeout: Duration) -> Result<Self> {
        Self::with_base_url(credentials, BITGET_API_BASE.to_string(), timeout)
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(
        credentials: BitgetCredentials,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            history_path: HISTORY_ORDERS_PATH.to_string(),
            api_key: credentials.api_key,
            passphrase: credentials.passphrase,
            signer: Box::new(HmacSigner::new(credentials.secret_key)),
        })
    }

    /// Use a different history endpoint.
    pub fn with_history_path(mut self, path: impl Into<String>) -> Self {
        self.history_path = path.into();
        self
    }

    /// Replace the signing strategy.
    pub fn with_signer(mut self, signer: Box<dyn RequestSigner>) -> Self {
        self.signer = signer;
        self
    }

    /// Signed GET returning the records of the response envelope.
    async fn signed_get(&self, path: &str, query: &str) -> MonitorResult<Vec<PositionRecord>> {
        let request_path = request_path(path, query);
        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = self.signer.sign(&timestamp, "GET", &request_path, "")?;
        let url = format!("{}{}", self.base_url, request_path);

        debug!(url = %url, "Fetching Bitget records");

        let response = self
            .client
            .get(&url)
            .header("ACCESS-KEY", &self.api_key)
            .header("ACCESS-SIGN", signature)
            .header("ACCESS-TIMESTAMP", timestamp)
            .header("ACCESS-PASSPHRASE", &self.passphrase)
            .header("Content-Type", "application/json")
            .header("locale", "en-US")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MonitorError::Fetch(format!(
                "{} request failed: {} - {}",
                path, status, body
            )));
        }

        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|e| MonitorError::Fetch(format!("failed to parse {path} response: {e}")))?;

        Ok(parse_records(envelope.into_records()?))
    }
}

fn request_path(path: &str, query: &str) -> String {
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    }
}

fn history_query(limit: usize) -> String {
    format!("pageNo=1&pageSize={}", limit.max(1))
}

/// Keep well-formed records; malformed ones are skipped.
fn parse_records(raw: Vec<Value>) -> Vec<PositionRecord> {
    raw.iter()
        .filter_map(|item| match parse_position(item) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(error = %e, "Skipping malformed record");
                None
            }
        })
        .collect()
}

#[async_trait]
impl PositionFeed for BitgetClient {
    async fn fetch_open_positions(&self) -> MonitorResult<Vec<PositionRecord>> {
        self.signed_get(CURRENT_ORDERS_PATH, "").await
    }

    async fn fetch_history(&self, limit: usize) -> MonitorResult<Vec<PositionRecord>> {
        let mut records = self
            .signed_get(&self.history_path, &history_query(limit))
            .await?;
        records.truncate(limit);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_path() {
        assert_eq!(request_path(CURRENT_ORDERS_PATH, ""), CURRENT_ORDERS_PATH);
        assert_eq!(
            request_path(HISTORY_ORDERS_PATH, &history_query(20)),
            "/api/mix/v1/copy/historyOrders?pageNo=1&pageSize=20"
        );
        assert_eq!(history_query(0), "pageNo=1&pageSize=1");
    }

    #[test]
    fn test_parse_records_skips_malformed() {
        let records = parse_records(vec![
            json!({"orderId": "1", "traderId": "T"}),
            json!({"symbol": "BTCUSDT"}),
            json!(null),
            json!({"orderId": "2"}),
        ]);

        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask("bg_1234567890abcd"), "bg_1...abcd");
        assert_eq!(mask("short"), "***");

        let creds = BitgetCredentials {
            api_key: "bg_1234567890abcd".into(),
            secret_key: "top-secret-value".into(),
            passphrase: "pass-phrase".into(),
        };
        let debug = format!("{creds:?}");
        assert!(!debug.contains("top-secret-value"));
        assert!(!debug.contains("pass-phrase"));
    }

    struct RejectingSigner;

    impl RequestSigner for RejectingSigner {
        fn sign(&self, _: &str, _: &str, _: &str, _: &str) -> MonitorResult<String> {
            Err(MonitorError::Config("no key loaded".into()))
        }
    }

    #[tokio::test]
    async fn test_signer_failure_stops_request() {
        let creds = BitgetCredentials {
            api_key: "k".into(),
            secret_key: "s".into(),
            passphrase: "p".into(),
        };
        let client = BitgetClient::with_base_url(
            creds,
            "http://127.0.0.1:9".to_string(),
            Duration::from_secs(2),
        )
        .unwrap()
        .with_signer(Box::new(RejectingSigner));

        let err = client.fetch_history(20).await.unwrap_err();
        assert!(matches!(err, MonitorError::Config(_)));
    }

    /// Records the signed path, then refuses to sign.
    #[derive(Default)]
    struct CapturingSigner {
        paths: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl RequestSigner for CapturingSigner {
        fn sign(&self, _: &str, _: &str, request_path: &str, _: &str) -> MonitorResult<String> {
            self.paths.lock().unwrap().push(request_path.to_string());
            Err(MonitorError::Config("stop".into()))
        }
    }

    #[tokio::test]
    async fn test_history_path_override() {
        let creds = BitgetCredentials {
            api_key: "k".into(),
            secret_key: "s".into(),
            passphrase: "p".into(),
        };
        let signer = CapturingSigner::default();
        let paths = signer.paths.clone();
        let client = BitgetClient::with_base_url(
            creds,
            "http://127.0.0.1:9".to_string(),
            Duration::from_secs(2),
        )
        .unwrap()
        .with_signer(Box::new(signer));

        let _ = client.fetch_history(5).await;
        let client = client.with_history_path("/api/mix/v1/trace/historyTrack");
        let _ = client.fetch_history(5).await;

        assert_eq!(
            *paths.lock().unwrap(),
            vec![
                "/api/mix/v1/copy/historyOrders?pageNo=1&pageSize=5".to_string(),
                "/api/mix/v1/trace/historyTrack?pageNo=1&pageSize=5".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_error() {
        let creds = BitgetCredentials {
            api_key: "k".into(),
            secret_key: "s".into(),
            passphrase: "p".into(),
        };
        let client = BitgetClient::with_base_url(
            creds,
            "http://127.0.0.1:9".to_string(),
            Duration::from_secs(2),
        )
        .unwrap();

        let err = client.fetch_open_positions().await.unwrap_err();
        assert!(matches!(err, MonitorError::Fetch(_)));
        assert!(err.triggers_backoff());
    }
}
