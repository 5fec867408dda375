//! CRON configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use subtle::ConstantTimeEq;

use super::error::ValidationError;

/// Configuration for the scheduled reconciliation endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct CronConfig {
    /// Bearer secret the scheduler presents on `/cron-check-subscriptions`
    pub secret: SecretString,
}

impl CronConfig {
    /// Constant-time check of a presented bearer token.
    pub fn matches(&self, presented: &str) -> bool {
        let expected = self.secret.expose_secret().as_bytes();
        let presented = presented.as_bytes();
        expected.len() == presented.len() && bool::from(expected.ct_eq(presented))
    }

    /// Validate CRON configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("CRON_SECRET"));
        }
        if self.secret.expose_secret().len() < 16 {
            return Err(ValidationError::CronSecretTooShort);
        }
        Ok(())
    }
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            secret: SecretString::new(String::new()),
        }
    }
}
