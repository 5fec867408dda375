//! PayPal webhook ingress.
//!
//! Pipeline: remote signature verification → event ledger (idempotency) →
//! transition mapping → state machine → mark processed. Verification runs
//! before the ledger lookup; an unverified event is never logged. A
//! processing failure leaves the ledger entry `processed=false` with the
//! error persisted, and the endpoint still acknowledges with 200 so the
//! provider does not blind-retry a payload we cannot handle — the daily
//! reconciliation job is the corrective path.

use std::sync::Arc;

use crate::domain::billing::{
    map_paypal_event, PayPalEventKind, PayPalSaleDetails, PayPalSubscriptionDetails,
    PayPalWebhookEnvelope, Provider, Subscription, Transition, WebhookError,
};
use crate::ports::{
    LedgerDecision, PayPalGateway, PayPalWebhookVerification, SubscriptionRepository,
    WebhookEventLedger, WebhookEventRecord,
};

use super::apply_transition::SubscriptionStateMachine;

/// The five PayPal transmission headers, all required.
#[derive(Debug, Clone)]
pub struct PayPalWebhookHeaders {
    pub auth_algo: String,
    pub cert_url: String,
    pub transmission_id: String,
    pub transmission_sig: String,
    pub transmission_time: String,
}

/// Command for one inbound PayPal webhook delivery.
#[derive(Debug, Clone)]
pub struct ProcessPayPalWebhookCommand {
    pub headers: PayPalWebhookHeaders,
    pub body: serde_json::Value,
}

/// Acknowledgment the endpoint replies with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAck {
    Processed,
    AlreadyProcessed,
}

/// Handler for `POST /webhook-paypal`.
pub struct ProcessPayPalWebhookHandler {
    gateway: Arc<dyn PayPalGateway>,
    ledger: Arc<dyn WebhookEventLedger>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    machine: Arc<SubscriptionStateMachine>,
}

impl ProcessPayPalWebhookHandler {
    pub fn new(
        gateway: Arc<dyn PayPalGateway>,
        ledger: Arc<dyn WebhookEventLedger>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        machine: Arc<SubscriptionStateMachine>,
    ) -> Self {
        Self {
            gateway,
            ledger,
            subscriptions,
            machine,
        }
    }

    pub async fn handle(
        &self,
        cmd: ProcessPayPalWebhookCommand,
    ) -> Result<WebhookAck, WebhookError> {
        // 1. Signature verification, delegated to the provider. Transport
        //    failure or any verification_status other than SUCCESS rejects.
        let verification = PayPalWebhookVerification {
            auth_algo: cmd.headers.auth_algo.clone(),
            cert_url: cmd.headers.cert_url.clone(),
            transmission_id: cmd.headers.transmission_id.clone(),
            transmission_sig: cmd.headers.transmission_sig.clone(),
            transmission_time: cmd.headers.transmission_time.clone(),
            webhook_event: cmd.body.clone(),
        };
        let verified = self
            .gateway
            .verify_webhook_signature(verification)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "PayPal verify-webhook-signature call failed");
                WebhookError::InvalidSignature
            })?;
        if !verified {
            return Err(WebhookError::InvalidSignature);
        }

        // 2. Envelope parse.
        let envelope = PayPalWebhookEnvelope::parse(&cmd.body)?;
        let kind = envelope.kind();

        tracing::info!(
            event_id = %envelope.id,
            event_type = %envelope.event_type,
            "PayPal webhook verified"
        );

        // 3. Event ledger: the unique key on the provider event id is the
        //    idempotency mechanism for redelivery.
        let record = WebhookEventRecord::received(
            envelope.id.clone(),
            Provider::PayPal,
            envelope.event_type.clone(),
            envelope.resource_type.clone(),
            envelope.resource.get("id").and_then(|v| v.as_str()).map(String::from),
            cmd.body.clone(),
        );
        if self.ledger.record_if_new(record).await? == LedgerDecision::AlreadyProcessed {
            tracing::info!(event_id = %envelope.id, "Duplicate webhook delivery skipped");
            return Ok(WebhookAck::AlreadyProcessed);
        }

        // 4. Drive the state machine; failures are persisted on the ledger
        //    entry and still acknowledged.
        match self.process(&envelope, &kind).await {
            Ok(()) => {
                self.ledger.mark_processed(&envelope.id).await?;
                Ok(WebhookAck::Processed)
            }
            Err(err) => {
                if err.is_processing_failure() {
                    self.ledger
                        .record_error(&envelope.id, &err.to_string())
                        .await?;
                }
                Err(err)
            }
        }
    }

    async fn process(
        &self,
        envelope: &PayPalWebhookEnvelope,
        kind: &PayPalEventKind,
    ) -> Result<(), WebhookError> {
        let subscription_details = if kind.carries_subscription_resource() {
            Some(PayPalSubscriptionDetails::from_resource(&envelope.resource)?)
        } else {
            None
        };
        let sale_details = if kind.carries_sale_resource() {
            Some(PayPalSaleDetails::from_resource(&envelope.resource)?)
        } else {
            None
        };

        let transition = map_paypal_event(
            kind,
            subscription_details.as_ref(),
            sale_details.as_ref(),
        );

        // Unknown event types are acknowledged without a subscription lookup.
        if let Transition::Ignore { reason } = &transition {
            tracing::info!(event_id = %envelope.id, reason, "PayPal event ignored");
            return Ok(());
        }

        let mut subscription = self
            .find_subscription(subscription_details.as_ref(), sale_details.as_ref())
            .await?;

        self.machine
            .apply(&mut subscription, transition)
            .await
            .map_err(|e| WebhookError::Database(e.to_string()))?;

        Ok(())
    }

    async fn find_subscription(
        &self,
        subscription_details: Option<&PayPalSubscriptionDetails>,
        sale_details: Option<&PayPalSaleDetails>,
    ) -> Result<Subscription, WebhookError> {
        let provider_id = subscription_details
            .map(|d| d.provider_subscription_id.clone())
            .or_else(|| sale_details.and_then(|s| s.billing_agreement_id.clone()))
            .ok_or_else(|| {
                WebhookError::ParseError("event does not reference a subscription".into())
            })?;

        self.subscriptions
            .find_by_provider_id(Provider::PayPal, &provider_id)
            .await?
            .ok_or(WebhookError::SubscriptionNotFound(provider_id))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::adapters::paypal::MockPayPalGateway;
    use crate::domain::billing::{EntitlementStatus, PlanKey, SubscriptionStatus};
    use crate::ports::{GatewayError, InMemoryWebhookEventLedger};
    use serde_json::json;

    fn headers() -> PayPalWebhookHeaders {
        PayPalWebhookHeaders {
            auth_algo: "SHA256withRSA".to_string(),
            cert_url: "https://api.paypal.com/cert".to_string(),
            transmission_id: "t-1".to_string(),
            transmission_sig: "sig".to_string(),
            transmission_time: "2026-01-10T12:00:00Z".to_string(),
        }
    }

    fn activated_body(event_id: &str, subscription_id: &str) -> serde_json::Value {
        json!({
            "id": event_id,
            "event_type": "BILLING.SUBSCRIPTION.ACTIVATED",
            "resource_type": "subscription",
            "resource": {
                "id": subscription_id,
                "status": "ACTIVE",
                "subscriber": {"email_address": "pagador@escuela.edu.ar"},
                "billing_info": {"next_billing_time": "2026-02-10T12:00:00Z"}
            }
        })
    }

    struct Setup {
        harness: Harness,
        gateway: Arc<MockPayPalGateway>,
        ledger: Arc<InMemoryWebhookEventLedger>,
        handler: ProcessPayPalWebhookHandler,
    }

    fn setup() -> Setup {
        let harness = Harness::new();
        let gateway = Arc::new(MockPayPalGateway::new());
        gateway.set_verify(Ok(true));
        let ledger = Arc::new(InMemoryWebhookEventLedger::new());
        let handler = ProcessPayPalWebhookHandler::new(
            gateway.clone(),
            ledger.clone(),
            harness.subscriptions.clone(),
            harness.machine.clone(),
        );
        Setup {
            harness,
            gateway,
            ledger,
            handler,
        }
    }

    #[tokio::test]
    async fn verified_activation_event_activates_subscription() {
        let setup = setup();
        setup
            .harness
            .seed_subscription(Provider::PayPal, "I-ABC", PlanKey::Standard)
            .await;

        let ack = setup
            .handler
            .handle(ProcessPayPalWebhookCommand {
                headers: headers(),
                body: activated_body("evt_1", "I-ABC"),
            })
            .await
            .unwrap();

        assert_eq!(ack, WebhookAck::Processed);
        let sub = setup.harness.subscription("I-ABC").await;
        assert_eq!(sub.status, SubscriptionStatus::Active);
        setup
            .harness
            .assert_entitlement(EntitlementStatus::Active, true)
            .await;

        let entry = setup
            .ledger
            .find_by_event_id("evt_1")
            .await
            .unwrap()
            .unwrap();
        assert!(entry.processed);
    }

    #[tokio::test]
    async fn duplicate_delivery_short_circuits_with_stable_activated_at() {
        let setup = setup();
        setup
            .harness
            .seed_subscription(Provider::PayPal, "I-ABC", PlanKey::Standard)
            .await;

        let cmd = ProcessPayPalWebhookCommand {
            headers: headers(),
            body: activated_body("evt_1", "I-ABC"),
        };
        let first = setup.handler.handle(cmd.clone()).await.unwrap();
        assert_eq!(first, WebhookAck::Processed);
        let activated_at = setup.harness.subscription("I-ABC").await.activated_at;
        assert!(activated_at.is_some());

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = setup.handler.handle(cmd).await.unwrap();
        assert_eq!(second, WebhookAck::AlreadyProcessed);

        // Exactly one activated_at, unchanged between deliveries.
        assert_eq!(
            setup.harness.subscription("I-ABC").await.activated_at,
            activated_at
        );
    }

    #[tokio::test]
    async fn failed_verification_rejects_without_side_effects() {
        let setup = setup();
        setup.gateway.set_verify(Ok(false));
        setup
            .harness
            .seed_subscription(Provider::PayPal, "I-ABC", PlanKey::Standard)
            .await;

        let result = setup
            .handler
            .handle(ProcessPayPalWebhookCommand {
                headers: headers(),
                body: activated_body("evt_1", "I-ABC"),
            })
            .await;

        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
        // No ledger entry, no state transition.
        assert_eq!(setup.ledger.len().await, 0);
        assert_eq!(
            setup.harness.subscription("I-ABC").await.status,
            SubscriptionStatus::Pending
        );
    }

    #[tokio::test]
    async fn verify_transport_failure_rejects_like_bad_signature() {
        let setup = setup();
        setup
            .gateway
            .set_verify(Err(GatewayError::Transport("timeout".to_string())));

        let result = setup
            .handler
            .handle(ProcessPayPalWebhookCommand {
                headers: headers(),
                body: activated_body("evt_1", "I-ABC"),
            })
            .await;

        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
        assert_eq!(setup.ledger.len().await, 0);
    }

    #[tokio::test]
    async fn unknown_subscription_records_error_and_leaves_unprocessed() {
        let setup = setup();

        let result = setup
            .handler
            .handle(ProcessPayPalWebhookCommand {
                headers: headers(),
                body: activated_body("evt_1", "I-MISSING"),
            })
            .await;

        assert!(matches!(result, Err(WebhookError::SubscriptionNotFound(_))));
        let entry = setup
            .ledger
            .find_by_event_id("evt_1")
            .await
            .unwrap()
            .unwrap();
        assert!(!entry.processed);
        assert!(entry.processing_error.is_some());
    }

    #[tokio::test]
    async fn unknown_event_type_is_acknowledged_and_marked_processed() {
        let setup = setup();

        let ack = setup
            .handler
            .handle(ProcessPayPalWebhookCommand {
                headers: headers(),
                body: json!({
                    "id": "evt_x",
                    "event_type": "CHECKOUT.ORDER.APPROVED",
                    "resource_type": "checkout-order",
                    "resource": {"id": "5O190127TN364715T"}
                }),
            })
            .await
            .unwrap();

        assert_eq!(ack, WebhookAck::Processed);
        let entry = setup
            .ledger
            .find_by_event_id("evt_x")
            .await
            .unwrap()
            .unwrap();
        assert!(entry.processed);
    }

    #[tokio::test]
    async fn payment_failed_event_increments_counter_only() {
        let setup = setup();
        setup
            .harness
            .seed_active_subscription(Provider::PayPal, "I-ABC", PlanKey::Standard)
            .await;

        let body = json!({
            "id": "evt_pf",
            "event_type": "BILLING.SUBSCRIPTION.PAYMENT.FAILED",
            "resource_type": "subscription",
            "resource": {"id": "I-ABC", "status": "ACTIVE"}
        });
        setup
            .handler
            .handle(ProcessPayPalWebhookCommand {
                headers: headers(),
                body,
            })
            .await
            .unwrap();

        let sub = setup.harness.subscription("I-ABC").await;
        assert_eq!(sub.failed_payments, 1);
        assert_eq!(sub.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn sale_completed_creates_single_transaction_across_deliveries() {
        let setup = setup();
        setup
            .harness
            .seed_active_subscription(Provider::PayPal, "I-ABC", PlanKey::Standard)
            .await;

        let body = |event_id: &str| {
            json!({
                "id": event_id,
                "event_type": "PAYMENT.SALE.COMPLETED",
                "resource_type": "sale",
                "resource": {
                    "id": "TXN-1",
                    "billing_agreement_id": "I-ABC",
                    "state": "completed",
                    "amount": {"total": "29999.00", "currency": "ARS"},
                    "create_time": "2026-01-10T12:00:00Z"
                }
            })
        };

        setup
            .handler
            .handle(ProcessPayPalWebhookCommand {
                headers: headers(),
                body: body("evt_s1"),
            })
            .await
            .unwrap();
        // Same sale redelivered under a different event id: the transaction
        // upsert is the second line of defense.
        setup
            .handler
            .handle(ProcessPayPalWebhookCommand {
                headers: headers(),
                body: body("evt_s2"),
            })
            .await
            .unwrap();

        assert_eq!(setup.harness.payment_count().await, 1);
    }
}
