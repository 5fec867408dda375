//! PayPal OAuth token cache.
//!
//! An explicit, injectable cache holding the current client-credentials
//! token with its expiry. `get_valid_token` refreshes when the token is
//! within the early-expiry margin, so concurrent calls reuse one token
//! instead of re-authenticating per request.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::ports::GatewayError;

/// Early-expiry margin: refresh this long before the provider's expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// A cached bearer token with its provider-reported expiry.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// True while the token is still comfortably inside its lifetime.
    fn is_fresh(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

/// Process-lifetime token cache.
#[derive(Default)]
pub struct TokenCache {
    slot: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a valid token, invoking `refresh` when the cached one is
    /// missing or inside the expiry margin.
    pub async fn get_valid_token<F, Fut>(&self, refresh: F) -> Result<String, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedToken, GatewayError>>,
    {
        {
            let slot = self.slot.read().await;
            if let Some(token) = slot.as_ref() {
                if token.is_fresh() {
                    return Ok(token.value.clone());
                }
            }
        }

        let mut slot = self.slot.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = slot.as_ref() {
            if token.is_fresh() {
                return Ok(token.value.clone());
            }
        }

        let token = refresh().await?;
        let value = token.value.clone();
        *slot = Some(token);
        Ok(value)
    }
}
