//! MercadoPago REST response types.
//!
//! The inbound notification body type lives in the billing domain
//! (`domain::billing::events::MpNotification`); here are the full
//! preapproval/payment objects fetched from the API, decoded into the
//! domain's normalized snapshots. Required fields fail the decode closed.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::billing::{MpPaymentSnapshot, PreapprovalSnapshot};

/// Preapproval object (`GET /preapproval/{id}`).
#[derive(Debug, Deserialize)]
pub struct PreapprovalResponse {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub payer_email: Option<String>,
    #[serde(default)]
    pub next_payment_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auto_recurring: Option<AutoRecurring>,
    #[serde(default)]
    pub card: Option<MpCard>,
    #[serde(default)]
    pub init_point: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AutoRecurring {
    #[serde(default)]
    pub transaction_amount: Option<f64>,
    #[serde(default)]
    pub currency_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MpCard {
    #[serde(default)]
    pub last_four_digits: Option<String>,
}

impl PreapprovalResponse {
    /// Converts into the domain's normalized snapshot.
    pub fn into_snapshot(self) -> PreapprovalSnapshot {
        let (amount, currency) = match &self.auto_recurring {
            Some(recurring) => (recurring.transaction_amount, recurring.currency_id.clone()),
            None => (None, None),
        };
        PreapprovalSnapshot {
            id: self.id,
            status: self.status,
            payer_email: self.payer_email,
            next_payment_date: self.next_payment_date,
            amount,
            currency,
            card_last_four: self.card.and_then(|c| c.last_four_digits),
            init_point: self.init_point,
        }
    }
}

/// Payment object (`GET /v1/payments/{id}`).
#[derive(Debug, Deserialize)]
pub struct PaymentResponse {
    pub id: serde_json::Value,
    pub status: String,
    pub transaction_amount: f64,
    #[serde(default)]
    pub currency_id: Option<String>,
    #[serde(default)]
    pub date_approved: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payer: Option<MpPayer>,
    /// Preapproval the payment bills, when the provider links it.
    #[serde(default)]
    pub preapproval_id: Option<String>,
    #[serde(default)]
    pub external_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MpPayer {
    #[serde(default)]
    pub email: Option<String>,
}

impl PaymentResponse {
    /// Converts into the domain's normalized snapshot, keeping the raw
    /// payload for audit.
    pub fn into_snapshot(self, raw: serde_json::Value) -> MpPaymentSnapshot {
        let id = match &self.id {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            other => other.to_string(),
        };
        MpPaymentSnapshot {
            id,
            status: self.status,
            amount: self.transaction_amount,
            currency: self.currency_id.unwrap_or_else(|| "ARS".to_string()),
            paid_at: self.date_approved,
            payer_email: self.payer.and_then(|p| p.email),
            preapproval_id: self.preapproval_id.or(self.external_reference),
            raw,
        }
    }
}

/// Error body MercadoPago returns on failures.
#[derive(Debug, Default, Deserialize)]
pub struct MpErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
