//! Payment transactions.
//!
//! One record per individual charge/payment event, keyed by the provider's
//! transaction id. Duplicate webhook deliveries are absorbed by
//! upsert-on-conflict on that key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{CompanyId, PaymentTransactionId, SubscriptionId};

use super::subscription::Provider;

/// Status of an individual payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// PayPal sale completed.
    Completed,
    /// MercadoPago payment approved.
    Approved,
    /// Charge attempt rejected by the provider.
    Rejected,
    /// Previously captured payment was refunded.
    Refunded,
    /// Anything else the provider reports (kept verbatim).
    Other(String),
}

impl PaymentStatus {
    /// Maps a provider-reported status string.
    pub fn from_provider(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "completed" => PaymentStatus::Completed,
            "approved" => PaymentStatus::Approved,
            "rejected" => PaymentStatus::Rejected,
            "refunded" => PaymentStatus::Refunded,
            other => PaymentStatus::Other(other.to_string()),
        }
    }

    /// Storage representation.
    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Completed => "completed",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Other(s) => s.as_str(),
        }
    }

    /// True for statuses that represent money actually captured.
    pub fn is_successful(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Approved)
    }
}

/// A recorded charge/payment event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: PaymentTransactionId,
    pub subscription_id: SubscriptionId,
    pub company_id: CompanyId,
    pub provider: Provider,

    /// Provider transaction id; unique, the idempotency key for upserts.
    pub provider_transaction_id: String,

    pub amount: f64,
    pub currency: String,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,

    /// Raw provider payload, kept for audit/debugging.
    pub raw_payload: serde_json::Value,
}

impl PaymentTransaction {
    pub fn new(
        subscription_id: SubscriptionId,
        company_id: CompanyId,
        provider: Provider,
        provider_transaction_id: impl Into<String>,
        amount: f64,
        currency: impl Into<String>,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
        raw_payload: serde_json::Value,
    ) -> Self {
        Self {
            id: PaymentTransactionId::new(),
            subscription_id,
            company_id,
            provider,
            provider_transaction_id: provider_transaction_id.into(),
            amount,
            currency: currency.into(),
            status,
            paid_at,
            raw_payload,
        }
    }
}
