//! MercadoPago gateway port.
//!
//! Contract over the MercadoPago preapproval (recurring billing) and
//! payments APIs. Unlike PayPal, MercadoPago supports true in-place plan
//! mutation: a `PUT` on a still-addressable preapproval can change the
//! recurring amount or swap the card token without re-authorization.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::billing::{MpPaymentSnapshot, PreapprovalSnapshot};

use super::gateway::GatewayError;

/// Request to create a preapproval (optionally charging a card token
/// immediately).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePreapprovalRequest {
    /// Human-readable reason shown on the payer's statement.
    pub reason: String,
    pub amount: f64,
    pub currency: String,
    pub payer_email: String,
    /// Card token from the browser SDK; when present the provider attempts
    /// the first charge synchronously.
    pub card_token_id: Option<String>,
    /// Our company id, for joining webhook notifications back to a tenant.
    pub external_reference: String,
    /// Where the payer lands after checkout.
    pub back_url: String,
    /// Fresh idempotency key for this create operation.
    pub idempotency_key: String,
}

/// Partial update applied to an existing preapproval via `PUT`.
///
/// Only the populated fields are sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreapprovalUpdate {
    /// Target literal status: `cancelled`, `paused`, or `authorized`.
    pub status: Option<String>,
    /// New recurring amount (in-place plan change).
    pub transaction_amount: Option<f64>,
    /// Replacement card token.
    pub card_token_id: Option<String>,
}

impl PreapprovalUpdate {
    pub fn status(value: impl Into<String>) -> Self {
        Self {
            status: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn amount(value: f64) -> Self {
        Self {
            transaction_amount: Some(value),
            ..Default::default()
        }
    }

    pub fn card(token: impl Into<String>) -> Self {
        Self {
            card_token_id: Some(token.into()),
            ..Default::default()
        }
    }
}

/// Port for the MercadoPago REST API.
#[async_trait]
pub trait MercadoPagoGateway: Send + Sync {
    /// Creates a preapproval; with a card token the first charge is
    /// attempted synchronously and the returned status reflects it.
    async fn create_preapproval(
        &self,
        request: CreatePreapprovalRequest,
    ) -> Result<PreapprovalSnapshot, GatewayError>;

    /// Fetches current preapproval state from the provider.
    async fn get_preapproval(&self, preapproval_id: &str)
        -> Result<PreapprovalSnapshot, GatewayError>;

    /// Mutates a preapproval in place.
    async fn update_preapproval(
        &self,
        preapproval_id: &str,
        update: PreapprovalUpdate,
        idempotency_key: &str,
    ) -> Result<PreapprovalSnapshot, GatewayError>;

    /// Fetches the full payment object referenced by a webhook notification.
    async fn get_payment(&self, payment_id: &str) -> Result<MpPaymentSnapshot, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mercadopago_gateway_is_object_safe() {
        fn _accepts_dyn(_gateway: &dyn MercadoPagoGateway) {}
    }

    #[test]
    fn update_builders_populate_single_fields() {
        let cancel = PreapprovalUpdate::status("cancelled");
        assert_eq!(cancel.status.as_deref(), Some("cancelled"));
        assert!(cancel.transaction_amount.is_none());
        assert!(cancel.card_token_id.is_none());

        let amount = PreapprovalUpdate::amount(49_999.0);
        assert_eq!(amount.transaction_amount, Some(49_999.0));
        assert!(amount.status.is_none());

        let card = PreapprovalUpdate::card("tok_9");
        assert_eq!(card.card_token_id.as_deref(), Some("tok_9"));
    }
}
