//! PayPal gateway port.
//!
//! Thin contract over the PayPal REST API: subscription lifecycle calls and
//! the remote webhook signature verification PayPal requires. The adapter
//! owns OAuth token caching and the retry policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::billing::{PayPalSubscriptionDetails, PlanKey};

use super::gateway::GatewayError;

/// Request to create a PayPal subscription for a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePayPalSubscriptionRequest {
    pub plan_key: PlanKey,
    /// Our company id, carried as PayPal's `custom_id` for webhook joins.
    pub external_reference: String,
    /// Where PayPal redirects the buyer after approving.
    pub return_url: String,
    /// Where PayPal redirects the buyer after aborting.
    pub cancel_url: String,
    /// Fresh idempotency key for this create operation.
    pub idempotency_key: String,
}

/// A newly created PayPal subscription, pending buyer approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedPayPalSubscription {
    /// PayPal subscription id (`I-...`).
    pub id: String,
    /// Literal status (`APPROVAL_PENDING` on creation).
    pub status: String,
    /// URL the buyer must visit to approve the subscription.
    pub approval_url: Option<String>,
}

/// The five PayPal transmission headers plus the raw event body, as required
/// by the provider's verify-webhook-signature endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayPalWebhookVerification {
    pub auth_algo: String,
    pub cert_url: String,
    pub transmission_id: String,
    pub transmission_sig: String,
    pub transmission_time: String,
    /// The full webhook event envelope, byte-for-byte as received.
    pub webhook_event: serde_json::Value,
}

/// Port for the PayPal REST API.
#[async_trait]
pub trait PayPalGateway: Send + Sync {
    /// Creates a subscription; the buyer must then complete the approval
    /// step at the returned URL before activation arrives via webhook.
    async fn create_subscription(
        &self,
        request: CreatePayPalSubscriptionRequest,
    ) -> Result<CreatedPayPalSubscription, GatewayError>;

    /// Fetches current subscription state from the provider.
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<PayPalSubscriptionDetails, GatewayError>;

    /// Cancels a subscription. `reason` is forwarded to PayPal.
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<(), GatewayError>;

    /// Delegates signature verification to PayPal's verify endpoint.
    ///
    /// Returns `true` only when the provider answers
    /// `verification_status == "SUCCESS"`; any other value or transport
    /// failure must reject the webhook.
    async fn verify_webhook_signature(
        &self,
        verification: PayPalWebhookVerification,
    ) -> Result<bool, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paypal_gateway_is_object_safe() {
        fn _accepts_dyn(_gateway: &dyn PayPalGateway) {}
    }
}
