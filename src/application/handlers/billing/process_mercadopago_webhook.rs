//! MercadoPago webhook ingress.
//!
//! Notifications are thin pointers: after local HMAC verification the full
//! resource is fetched from the provider API and mapped through the
//! transition tables. This path keeps no per-event ledger row; idempotency
//! rests on the payment-transaction upsert keyed by the provider payment id
//! (re-delivery refreshes the same row and never double-applies).

use std::sync::Arc;

use crate::domain::billing::{
    map_mp_payment, map_mp_preapproval, MpNotification, MpSignatureVerifier, Provider,
    Subscription, WebhookError,
};
use crate::ports::{MercadoPagoGateway, SubscriptionRepository};

use super::apply_transition::SubscriptionStateMachine;
use super::process_paypal_webhook::WebhookAck;

/// Command for one inbound MercadoPago notification.
#[derive(Debug, Clone)]
pub struct ProcessMpWebhookCommand {
    pub x_signature: Option<String>,
    pub x_request_id: Option<String>,
    /// The `data.id` query parameter, part of the signed manifest.
    pub data_id_query: Option<String>,
    pub body: serde_json::Value,
}

/// Handler for `POST /webhook-mercadopago`.
pub struct ProcessMpWebhookHandler {
    verifier: Arc<MpSignatureVerifier>,
    gateway: Arc<dyn MercadoPagoGateway>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    machine: Arc<SubscriptionStateMachine>,
}

impl ProcessMpWebhookHandler {
    pub fn new(
        verifier: Arc<MpSignatureVerifier>,
        gateway: Arc<dyn MercadoPagoGateway>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        machine: Arc<SubscriptionStateMachine>,
    ) -> Self {
        Self {
            verifier,
            gateway,
            subscriptions,
            machine,
        }
    }

    pub async fn handle(&self, cmd: ProcessMpWebhookCommand) -> Result<WebhookAck, WebhookError> {
        // 1. Local signature verification, before anything else.
        self.verifier.verify(
            cmd.x_signature.as_deref(),
            cmd.x_request_id.as_deref(),
            cmd.data_id_query.as_deref(),
        )?;

        // 2. Notification parse.
        let notification = MpNotification::parse(&cmd.body)?;
        let data_id = notification.data_id();

        tracing::info!(
            notification_type = %notification.notification_type,
            data_id = %data_id,
            "MercadoPago webhook verified"
        );

        // 3. Fetch-and-apply per notification type.
        match notification.notification_type.as_str() {
            "payment" => self.handle_payment(&data_id).await?,
            "subscription_preapproval" => self.handle_preapproval(&data_id).await?,
            other => {
                tracing::info!(notification_type = other, "Notification type ignored");
            }
        }

        Ok(WebhookAck::Processed)
    }

    async fn handle_payment(&self, payment_id: &str) -> Result<(), WebhookError> {
        let snapshot = self
            .gateway
            .get_payment(payment_id)
            .await
            .map_err(|e| WebhookError::Gateway(e.to_string()))?;

        let preapproval_id = snapshot
            .preapproval_id
            .clone()
            .ok_or_else(|| WebhookError::SubscriptionNotFound(payment_id.to_string()))?;
        let mut subscription = self.find_subscription(&preapproval_id).await?;

        self.machine
            .apply(&mut subscription, map_mp_payment(&snapshot))
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?;
        Ok(())
    }

    async fn handle_preapproval(&self, preapproval_id: &str) -> Result<(), WebhookError> {
        let snapshot = self
            .gateway
            .get_preapproval(preapproval_id)
            .await
            .map_err(|e| WebhookError::Gateway(e.to_string()))?;

        let mut subscription = self.find_subscription(&snapshot.id).await?;

        self.machine
            .apply(&mut subscription, map_mp_preapproval(&snapshot))
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?;
        Ok(())
    }

    async fn find_subscription(&self, preapproval_id: &str) -> Result<Subscription, WebhookError> {
        self.subscriptions
            .find_by_provider_id(Provider::MercadoPago, preapproval_id)
            .await?
            .ok_or_else(|| WebhookError::SubscriptionNotFound(preapproval_id.to_string()))
    }
}
