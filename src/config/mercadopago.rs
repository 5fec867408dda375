//! MercadoPago configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

/// MercadoPago configuration (REST API + webhook HMAC secret)
#[derive(Debug, Clone, Deserialize)]
pub struct MercadoPagoConfig {
    /// Long-lived access token (no refresh flow)
    pub access_token: SecretString,

    /// Shared secret for webhook signature recomputation. When absent the
    /// verifier logs a warning and skips verification — a deliberate
    /// operational escape hatch, not a default to rely on.
    #[serde(default)]
    pub webhook_secret: Option<SecretString>,
}

impl MercadoPagoConfig {
    /// REST API base URL.
    pub fn api_base_url(&self) -> &'static str {
        "https://api.mercadopago.com"
    }

    /// Validate MercadoPago configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.access_token.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("MERCADOPAGO_ACCESS_TOKEN"));
        }
        Ok(())
    }
}

impl Default for MercadoPagoConfig {
    fn default() -> Self {
        Self {
            access_token: SecretString::new(String::new()),
            webhook_secret: None,
        }
    }
}
