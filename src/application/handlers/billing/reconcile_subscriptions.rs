//! Daily subscription reconciliation.
//!
//! Webhook delivery is at-least-once but not guaranteed; this job is the
//! self-healing backstop. It iterates every non-terminal MercadoPago
//! subscription that carries a provider id, re-fetches the preapproval, and
//! applies the same transition rules the webhook path uses whenever the
//! provider's status has diverged from the local one.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::billing::{map_mp_preapproval, Provider, Transition};
use crate::domain::foundation::DomainError;
use crate::ports::{MercadoPagoGateway, SubscriptionRepository};

use super::apply_transition::SubscriptionStateMachine;

/// One corrective action taken (or attempted) during a run.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileAction {
    /// Provider-assigned subscription id.
    pub id: String,
    #[serde(rename = "companyId")]
    pub company_id: String,
    pub action: String,
    #[serde(rename = "mpStatus")]
    pub mp_status: String,
}

/// Summary returned to the CRON caller.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub checked: usize,
    pub actions: Vec<ReconcileAction>,
}

/// Handler for `POST /cron-check-subscriptions`.
pub struct ReconcileSubscriptionsHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    gateway: Arc<dyn MercadoPagoGateway>,
    machine: Arc<SubscriptionStateMachine>,
}

impl ReconcileSubscriptionsHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        gateway: Arc<dyn MercadoPagoGateway>,
        machine: Arc<SubscriptionStateMachine>,
    ) -> Self {
        Self {
            subscriptions,
            gateway,
            machine,
        }
    }

    pub async fn handle(&self) -> Result<ReconcileReport, DomainError> {
        let candidates = self
            .subscriptions
            .find_needing_reconciliation(Provider::MercadoPago)
            .await?;

        let mut report = ReconcileReport {
            checked: 0,
            actions: Vec::new(),
        };

        for mut subscription in candidates {
            report.checked += 1;
            let provider_id = subscription.provider_subscription_id.clone();

            let snapshot = match self.gateway.get_preapproval(&provider_id).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    // Left for the next run; a single flaky fetch must not
                    // abort the whole sweep.
                    tracing::warn!(
                        preapproval_id = %provider_id,
                        error = %e,
                        "Reconciliation fetch failed"
                    );
                    report.actions.push(ReconcileAction {
                        id: provider_id,
                        company_id: subscription.company_id.to_string(),
                        action: "fetch_failed".to_string(),
                        mp_status: String::new(),
                    });
                    continue;
                }
            };

            let transition = map_mp_preapproval(&snapshot);
            let diverged = match &transition {
                Transition::Status { new_status, .. } => *new_status != subscription.status,
                _ => false,
            };

            if !diverged {
                continue;
            }

            tracing::info!(
                preapproval_id = %provider_id,
                local_status = subscription.status.as_str(),
                provider_status = %snapshot.status,
                "Status drift detected; applying provider state"
            );

            match self.machine.apply(&mut subscription, transition).await {
                Ok(outcome) => report.actions.push(ReconcileAction {
                    id: provider_id,
                    company_id: subscription.company_id.to_string(),
                    action: outcome.action.to_string(),
                    mp_status: snapshot.status.clone(),
                }),
                Err(e) => {
                    tracing::error!(
                        preapproval_id = %provider_id,
                        error = %e,
                        "Failed to apply reconciliation transition"
                    );
                    report.actions.push(ReconcileAction {
                        id: provider_id,
                        company_id: subscription.company_id.to_string(),
                        action: "apply_failed".to_string(),
                        mp_status: snapshot.status.clone(),
                    });
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::adapters::mercadopago::MockMercadoPagoGateway;
    use crate::domain::billing::{
        EntitlementStatus, PlanKey, PreapprovalSnapshot, SubscriptionStatus,
    };
    use crate::ports::GatewayError;

    fn snapshot(id: &str, status: &str) -> PreapprovalSnapshot {
        PreapprovalSnapshot {
            id: id.to_string(),
            status: status.to_string(),
            payer_email: None,
            next_payment_date: Some(chrono::Utc::now()),
            amount: Some(29_999.0),
            currency: Some("ARS".to_string()),
            card_last_four: None,
            init_point: None,
        }
    }

    fn handler(
        harness: &Harness,
        gateway: Arc<MockMercadoPagoGateway>,
    ) -> ReconcileSubscriptionsHandler {
        ReconcileSubscriptionsHandler::new(
            harness.subscriptions.clone(),
            gateway,
            harness.machine.clone(),
        )
    }

    #[tokio::test]
    async fn drift_is_corrected_to_provider_state() {
        let harness = Harness::new();
        // Local says active; the provider cancelled it while webhooks were
        // lost.
        harness
            .seed_active_subscription(Provider::MercadoPago, "pre_1", PlanKey::Standard)
            .await;
        let gateway = Arc::new(MockMercadoPagoGateway::new());
        gateway.set_get(Ok(snapshot("pre_1", "cancelled")));

        let report = handler(&harness, gateway).handle().await.unwrap();

        assert_eq!(report.checked, 1);
        assert_eq!(report.actions.len(), 1);
        assert_eq!(report.actions[0].mp_status, "cancelled");

        let sub = harness.subscription("pre_1").await;
        assert_eq!(sub.status, SubscriptionStatus::Cancelled);
        harness
            .assert_entitlement(EntitlementStatus::Canceled, false)
            .await;
    }

    #[tokio::test]
    async fn matching_status_produces_no_action() {
        let harness = Harness::new();
        harness
            .seed_active_subscription(Provider::MercadoPago, "pre_1", PlanKey::Standard)
            .await;
        let gateway = Arc::new(MockMercadoPagoGateway::new());
        gateway.set_get(Ok(snapshot("pre_1", "authorized")));

        let report = handler(&harness, gateway).handle().await.unwrap();

        assert_eq!(report.checked, 1);
        assert!(report.actions.is_empty());
    }

    #[tokio::test]
    async fn terminal_subscriptions_are_not_checked() {
        let harness = Harness::new();
        let mut sub = harness
            .seed_subscription(Provider::MercadoPago, "pre_1", PlanKey::Standard)
            .await;
        sub.status = SubscriptionStatus::Cancelled;
        harness.subscriptions.update(&sub).await.unwrap();
        let gateway = Arc::new(MockMercadoPagoGateway::new());

        let report = handler(&harness, gateway.clone()).handle().await.unwrap();

        assert_eq!(report.checked, 0);
        assert_eq!(
            gateway.get_calls.load(std::sync::atomic::Ordering::SeqCst),
            0
        );
    }

    #[tokio::test]
    async fn fetch_failure_is_reported_and_does_not_abort_sweep() {
        let harness = Harness::new();
        harness
            .seed_active_subscription(Provider::MercadoPago, "pre_1", PlanKey::Standard)
            .await;
        let gateway = Arc::new(MockMercadoPagoGateway::new());
        gateway.set_get(Err(GatewayError::provider(503, "down")));

        let report = handler(&harness, gateway).handle().await.unwrap();

        assert_eq!(report.checked, 1);
        assert_eq!(report.actions.len(), 1);
        assert_eq!(report.actions[0].action, "fetch_failed");
    }

    #[tokio::test]
    async fn pending_subscription_activated_behind_our_back_is_synced() {
        let harness = Harness::new();
        harness
            .seed_subscription(Provider::MercadoPago, "pre_1", PlanKey::Standard)
            .await;
        let gateway = Arc::new(MockMercadoPagoGateway::new());
        gateway.set_get(Ok(snapshot("pre_1", "authorized")));

        let report = handler(&harness, gateway).handle().await.unwrap();

        assert_eq!(report.actions.len(), 1);
        let sub = harness.subscription("pre_1").await;
        assert_eq!(sub.status, SubscriptionStatus::Active);
        harness
            .assert_entitlement(EntitlementStatus::Active, true)
            .await;
    }
}
