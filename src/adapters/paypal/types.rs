//! PayPal REST response types.
//!
//! Serde structs for the slices of PayPal's API responses this client
//! consumes. Webhook envelope/resource types live in the billing domain
//! (`domain::billing::events`), since the ingress pipeline is
//! provider-event-driven.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::billing::PayPalSubscriptionDetails;

/// OAuth2 client-credentials token response.
#[derive(Debug, Deserialize)]
pub struct OAuthTokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

/// Error body PayPal returns on 4xx responses.
#[derive(Debug, Default, Deserialize)]
pub struct PayPalErrorBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub debug_id: Option<String>,
}

/// `POST /v1/notifications/verify-webhook-signature` response.
#[derive(Debug, Deserialize)]
pub struct VerifySignatureResponse {
    pub verification_status: String,
}

/// A HATEOAS link on PayPal responses.
#[derive(Debug, Deserialize)]
pub struct PayPalLink {
    pub href: String,
    pub rel: String,
}

/// Subscription object (`/v1/billing/subscriptions/...`).
#[derive(Debug, Deserialize)]
pub struct SubscriptionResponse {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub subscriber: Option<Subscriber>,
    #[serde(default)]
    pub billing_info: Option<BillingInfo>,
    #[serde(default)]
    pub links: Vec<PayPalLink>,
}

#[derive(Debug, Deserialize)]
pub struct Subscriber {
    #[serde(default)]
    pub email_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BillingInfo {
    #[serde(default)]
    pub next_billing_time: Option<DateTime<Utc>>,
}

impl SubscriptionResponse {
    /// The `approve` link the buyer must visit.
    pub fn approval_url(&self) -> Option<String> {
        self.links
            .iter()
            .find(|l| l.rel == "approve")
            .map(|l| l.href.clone())
    }

    /// Converts into the domain's normalized subscription details.
    pub fn into_details(self) -> PayPalSubscriptionDetails {
        PayPalSubscriptionDetails {
            provider_subscription_id: self.id,
            status: Some(self.status),
            payer_email: self.subscriber.and_then(|s| s.email_address),
            next_billing_time: self.billing_info.and_then(|b| b.next_billing_time),
        }
    }
}
