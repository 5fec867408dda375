//! Webhook processing error types.
//!
//! Defines the error conditions of webhook ingress with their HTTP mapping.
//! Providers retry on non-2xx, so only signature failures are allowed to
//! surface as errors; every processing failure is acknowledged with 200 and
//! preserved in the event ledger for manual reconciliation.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Webhook signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// A required signature header is missing.
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    /// Failed to parse the webhook payload or a signature header.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Referenced subscription could not be found locally.
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    /// A provider API call made while processing the event failed.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Event was intentionally ignored (not an error condition).
    #[error("Event ignored: {0}")]
    Ignored(String),
}

impl WebhookError {
    /// Maps the error to the HTTP status the webhook endpoint replies with.
    ///
    /// Signature failures reject with 401 before any side effect. Everything
    /// else acknowledges with 200: returning 5xx would trigger blind provider
    /// retries on payloads the system cannot process, while the ledger keeps
    /// the evidence (`processed=false` plus the error message).
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature | WebhookError::MissingHeader(_) => {
                StatusCode::UNAUTHORIZED
            }
            WebhookError::ParseError(_)
            | WebhookError::SubscriptionNotFound(_)
            | WebhookError::Gateway(_)
            | WebhookError::Database(_)
            | WebhookError::Ignored(_) => StatusCode::OK,
        }
    }

    /// True when the error should be recorded on the ledger entry as a
    /// processing failure (as opposed to a clean skip).
    pub fn is_processing_failure(&self) -> bool {
        !matches!(
            self,
            WebhookError::Ignored(_) | WebhookError::InvalidSignature | WebhookError::MissingHeader(_)
        )
    }
}

impl From<crate::domain::foundation::DomainError> for WebhookError {
    fn from(err: crate::domain::foundation::DomainError) -> Self {
        WebhookError::Database(err.to_string())
    }
}
