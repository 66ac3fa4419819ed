//! Request signing for authenticated Bitget endpoints.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{MonitorError, MonitorResult};

/// Signing strategy for exchange requests.
pub trait RequestSigner: Send + Sync {
    /// Produce the `ACCESS-SIGN` header value.
    ///
    /// `request_path` includes the query string (`/path?a=1`) when present.
    fn sign(
        &self,
        timestamp: &str,
        method: &str,
        request_path: &str,
        body: &str,
    ) -> MonitorResult<String>;
}

/// Bitget's scheme: `base64(HMAC-SHA256(secret, timestamp + METHOD + path + body))`.
pub struct HmacSigner {
    secret: String,
}

impl HmacSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacSigner").field("secret", &"***").finish()
    }
}

impl RequestSigner for HmacSigner {
    fn sign(
        &self,
        timestamp: &str,
        method: &str,
        request_path: &str,
        body: &str,
    ) -> MonitorResult<String> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.as_bytes())
            .map_err(|e| MonitorError::Config(format!("invalid signing secret: {e}")))?;

        mac.update(timestamp.as_bytes());
        mac.update(method.to_uppercase().as_bytes());
        mac.update(request_path.as_bytes());
        mac.update(body.as_bytes());

        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}
