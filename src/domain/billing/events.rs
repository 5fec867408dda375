//! Provider event types.
//!
//! Inbound webhook envelopes and the normalized per-provider data the
//! transition tables consume. Payloads are decoded into explicit,
//! partial/optional-field structures; required fields fail the decode closed
//! rather than proceeding with missing data, while unknown extra fields are
//! ignored for forward compatibility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::WebhookError;

// ════════════════════════════════════════════════════════════════════════════════
// PayPal
// ════════════════════════════════════════════════════════════════════════════════

/// PayPal webhook event types this system reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayPalEventKind {
    SubscriptionActivated,
    SubscriptionCancelled,
    SubscriptionSuspended,
    SubscriptionExpired,
    SubscriptionPaymentFailed,
    SaleCompleted,
    SaleRefunded,
    Unknown(String),
}

impl PayPalEventKind {
    /// Maps the `event_type` field of a PayPal webhook envelope.
    pub fn from_event_type(event_type: &str) -> Self {
        match event_type {
            "BILLING.SUBSCRIPTION.ACTIVATED" => PayPalEventKind::SubscriptionActivated,
            "BILLING.SUBSCRIPTION.CANCELLED" => PayPalEventKind::SubscriptionCancelled,
            "BILLING.SUBSCRIPTION.SUSPENDED" => PayPalEventKind::SubscriptionSuspended,
            "BILLING.SUBSCRIPTION.EXPIRED" => PayPalEventKind::SubscriptionExpired,
            "BILLING.SUBSCRIPTION.PAYMENT.FAILED" => PayPalEventKind::SubscriptionPaymentFailed,
            "PAYMENT.SALE.COMPLETED" => PayPalEventKind::SaleCompleted,
            "PAYMENT.SALE.REFUNDED" => PayPalEventKind::SaleRefunded,
            other => PayPalEventKind::Unknown(other.to_string()),
        }
    }

    /// True for `BILLING.SUBSCRIPTION.*` events whose resource is a
    /// subscription object.
    pub fn carries_subscription_resource(&self) -> bool {
        matches!(
            self,
            PayPalEventKind::SubscriptionActivated
                | PayPalEventKind::SubscriptionCancelled
                | PayPalEventKind::SubscriptionSuspended
                | PayPalEventKind::SubscriptionExpired
                | PayPalEventKind::SubscriptionPaymentFailed
        )
    }

    /// True for `PAYMENT.SALE.*` events whose resource is a sale object.
    pub fn carries_sale_resource(&self) -> bool {
        matches!(
            self,
            PayPalEventKind::SaleCompleted | PayPalEventKind::SaleRefunded
        )
    }
}

/// PayPal webhook event envelope as delivered to `/webhook-paypal`.
#[derive(Debug, Clone, Deserialize)]
pub struct PayPalWebhookEnvelope {
    pub id: String,
    pub event_type: String,
    #[serde(default)]
    pub resource_type: Option<String>,
    pub resource: serde_json::Value,
}

impl PayPalWebhookEnvelope {
    /// Strict parse of the raw webhook body.
    pub fn parse(body: &serde_json::Value) -> Result<Self, WebhookError> {
        serde_json::from_value(body.clone())
            .map_err(|e| WebhookError::ParseError(format!("invalid PayPal envelope: {}", e)))
    }

    pub fn kind(&self) -> PayPalEventKind {
        PayPalEventKind::from_event_type(&self.event_type)
    }
}

/// Subscription fields extracted from a PayPal webhook resource or a direct
/// subscription fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayPalSubscriptionDetails {
    /// PayPal subscription id (`I-...`).
    pub provider_subscription_id: String,
    /// Literal status string as PayPal reports it (e.g. `ACTIVE`).
    pub status: Option<String>,
    pub payer_email: Option<String>,
    pub next_billing_time: Option<DateTime<Utc>>,
}

/// Sale fields extracted from a `PAYMENT.SALE.*` webhook resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayPalSaleDetails {
    /// PayPal transaction id for this sale.
    pub transaction_id: String,
    /// The subscription this sale bills (PayPal's `billing_agreement_id`).
    pub billing_agreement_id: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SubscriptionResource {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    subscriber: Option<SubscriberResource>,
    #[serde(default)]
    billing_info: Option<BillingInfoResource>,
}

#[derive(Debug, Deserialize)]
struct SubscriberResource {
    #[serde(default)]
    email_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BillingInfoResource {
    #[serde(default)]
    next_billing_time: Option<DateTime<Utc>>,
}

impl PayPalSubscriptionDetails {
    /// Extracts normalized subscription details from a webhook resource.
    pub fn from_resource(resource: &serde_json::Value) -> Result<Self, WebhookError> {
        let resource: SubscriptionResource =
            serde_json::from_value(resource.clone()).map_err(|e| {
                WebhookError::ParseError(format!("invalid subscription resource: {}", e))
            })?;

        Ok(PayPalSubscriptionDetails {
            provider_subscription_id: resource.id,
            status: resource.status,
            payer_email: resource.subscriber.and_then(|s| s.email_address),
            next_billing_time: resource.billing_info.and_then(|b| b.next_billing_time),
        })
    }
}

/// Sale resource as PayPal ships it; amounts arrive as decimal strings.
#[derive(Debug, Deserialize)]
struct SaleResource {
    id: String,
    #[serde(default)]
    billing_agreement_id: Option<String>,
    amount: SaleAmount,
    #[serde(default)]
    create_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct SaleAmount {
    total: String,
    currency: String,
}

impl PayPalSaleDetails {
    /// Extracts normalized sale details from a webhook resource.
    pub fn from_resource(resource: &serde_json::Value) -> Result<Self, WebhookError> {
        let sale: SaleResource = serde_json::from_value(resource.clone())
            .map_err(|e| WebhookError::ParseError(format!("invalid sale resource: {}", e)))?;

        let amount = sale
            .amount
            .total
            .parse::<f64>()
            .map_err(|e| WebhookError::ParseError(format!("invalid sale amount: {}", e)))?;

        Ok(PayPalSaleDetails {
            transaction_id: sale.id,
            billing_agreement_id: sale.billing_agreement_id,
            amount,
            currency: sale.amount.currency,
            paid_at: sale.create_time,
            raw: resource.clone(),
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// MercadoPago
// ════════════════════════════════════════════════════════════════════════════════

/// Inbound MercadoPago webhook notification: a thin pointer to a resource
/// that must be fetched from the API.
#[derive(Debug, Clone, Deserialize)]
pub struct MpNotification {
    #[serde(rename = "type", alias = "topic")]
    pub notification_type: String,
    data: MpNotificationData,
}

#[derive(Debug, Clone, Deserialize)]
struct MpNotificationData {
    id: serde_json::Value,
}

impl MpNotification {
    /// Strict parse of the raw notification body.
    pub fn parse(body: &serde_json::Value) -> Result<Self, WebhookError> {
        let notification: MpNotification = serde_json::from_value(body.clone())
            .map_err(|e| WebhookError::ParseError(format!("invalid notification: {}", e)))?;
        if notification.data_id().is_empty() {
            return Err(WebhookError::ParseError("empty data.id".into()));
        }
        Ok(notification)
    }

    /// The referenced resource id as a string (the API sends numbers for
    /// payments and strings for preapprovals).
    pub fn data_id(&self) -> String {
        match &self.data.id {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => String::new(),
        }
    }
}

/// A MercadoPago preapproval as fetched from the provider after a
/// `subscription_preapproval` notification (or during reconciliation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreapprovalSnapshot {
    /// Preapproval id.
    pub id: String,
    /// Literal status string: `authorized`, `paused`, `cancelled`, `pending`...
    pub status: String,
    pub payer_email: Option<String>,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    /// Last four digits of the card on file, when the provider exposes them.
    pub card_last_four: Option<String>,
    /// Checkout URL the payer visits to approve a pending preapproval.
    pub init_point: Option<String>,
}

/// A MercadoPago payment as fetched after a `payment` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MpPaymentSnapshot {
    /// Payment id (numeric in the API, carried as string).
    pub id: String,
    /// Literal status string: `approved`, `rejected`, `in_process`...
    pub status: String,
    pub amount: f64,
    pub currency: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub payer_email: Option<String>,
    /// Preapproval this payment belongs to, when the provider links it.
    pub preapproval_id: Option<String>,
    pub raw: serde_json::Value,
}
