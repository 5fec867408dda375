//! PayPal configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

/// PayPal API mode.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PayPalMode {
    #[default]
    Sandbox,
    Live,
}

/// PayPal configuration (REST API + webhook verification)
#[derive(Debug, Clone, Deserialize)]
pub struct PayPalConfig {
    /// OAuth2 client id
    pub client_id: String,

    /// OAuth2 client secret
    pub client_secret: SecretString,

    /// Webhook id from the PayPal dashboard, required by the provider's
    /// verify-webhook-signature endpoint
    pub webhook_id: String,

    /// Sandbox or live
    #[serde(default)]
    pub mode: PayPalMode,

    /// PayPal billing-plan id for the basic plan
    #[serde(default)]
    pub basic_plan_id: Option<String>,

    /// PayPal billing-plan id for the standard plan
    #[serde(default)]
    pub standard_plan_id: Option<String>,

    /// PayPal billing-plan id for the premium plan
    #[serde(default)]
    pub premium_plan_id: Option<String>,
}

impl PayPalConfig {
    /// REST API base URL for the configured mode.
    pub fn api_base_url(&self) -> &'static str {
        match self.mode {
            PayPalMode::Live => "https://api-m.paypal.com",
            PayPalMode::Sandbox => "https://api-m.sandbox.paypal.com",
        }
    }

    /// Validate PayPal configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.client_id.is_empty() {
            return Err(ValidationError::MissingRequired("PAYPAL_CLIENT_ID"));
        }
        if self.client_secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("PAYPAL_CLIENT_SECRET"));
        }
        if self.webhook_id.is_empty() {
            return Err(ValidationError::MissingRequired("PAYPAL_WEBHOOK_ID"));
        }
        Ok(())
    }
}

impl Default for PayPalConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: SecretString::new(String::new()),
            webhook_id: String::new(),
            mode: PayPalMode::Sandbox,
            basic_plan_id: None,
            standard_plan_id: None,
            premium_plan_id: None,
        }
    }
}
