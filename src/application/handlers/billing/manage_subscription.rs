//! MercadoPago subscription management.
//!
//! MercadoPago supports true in-place mutation: plan changes are a `PUT`
//! on the same still-addressable preapproval changing
//! `auto_recurring.transaction_amount` (optionally swapping the card
//! token), with no re-authorization step. Pause/reactivate/cancel are
//! status `PUT`s mapped back through the same transition tables.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::adapters::email::templates;
use crate::adapters::gateway::idempotency_key;
use crate::domain::billing::{
    map_mp_preapproval, Plan, PlanKey, Provider, SubscriptionStatus,
};
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::{
    CompanyRepository, MercadoPagoGateway, PreapprovalUpdate, SubscriptionRepository,
};

use super::apply_transition::SubscriptionStateMachine;
use super::notifications::NotificationDispatcher;

/// Management actions the endpoint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManageAction {
    ChangePlan,
    ChangeCard,
    Cancel,
    Pause,
    Reactivate,
}

/// Command for `POST /mp-manage-subscription`.
#[derive(Debug, Clone)]
pub struct ManageMpSubscriptionCommand {
    pub user_id: UserId,
    pub action: ManageAction,
    pub mp_preapproval_id: String,
    pub new_plan_key: Option<PlanKey>,
    pub card_token_id: Option<String>,
    pub reason: Option<String>,
}

/// Result of a management action.
#[derive(Debug, Clone)]
pub struct ManageMpSubscriptionResult {
    pub action: ManageAction,
    /// Provider's literal status after the mutation.
    pub status: String,
}

/// Handler for `POST /mp-manage-subscription`.
pub struct ManageMpSubscriptionHandler {
    companies: Arc<dyn CompanyRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    gateway: Arc<dyn MercadoPagoGateway>,
    machine: Arc<SubscriptionStateMachine>,
    notifier: NotificationDispatcher,
}

impl ManageMpSubscriptionHandler {
    pub fn new(
        companies: Arc<dyn CompanyRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        gateway: Arc<dyn MercadoPagoGateway>,
        machine: Arc<SubscriptionStateMachine>,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            companies,
            subscriptions,
            gateway,
            machine,
            notifier,
        }
    }

    pub async fn handle(
        &self,
        cmd: ManageMpSubscriptionCommand,
    ) -> Result<ManageMpSubscriptionResult, DomainError> {
        let mut subscription = self
            .subscriptions
            .find_by_provider_id(Provider::MercadoPago, &cmd.mp_preapproval_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::SubscriptionNotFound,
                    "No encontramos esa suscripción",
                )
            })?;

        let company = self
            .companies
            .find_owned(&subscription.company_id, &cmd.user_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::Forbidden,
                    "No tenés permisos sobre esta institución",
                )
            })?;

        let preapproval_id = cmd.mp_preapproval_id.clone();
        let snapshot = match cmd.action {
            ManageAction::ChangePlan => {
                let new_plan_key = cmd.new_plan_key.ok_or_else(|| {
                    DomainError::validation("newPlanKey", "Falta el plan de destino")
                })?;
                let plan = Plan::for_key(new_plan_key);

                // Best-effort cancel of the live recurrence first; a failure
                // here must not block the new charge.
                if subscription.status == SubscriptionStatus::Active {
                    let cancel_key = idempotency_key("cancel-preapproval", &preapproval_id);
                    if let Err(e) = self
                        .gateway
                        .update_preapproval(
                            &preapproval_id,
                            PreapprovalUpdate::status("cancelled"),
                            &cancel_key,
                        )
                        .await
                    {
                        tracing::warn!(
                            preapproval_id = %preapproval_id,
                            error = %e,
                            "Best-effort preapproval cancel failed; continuing with amount change"
                        );
                    }
                }

                let mut update = PreapprovalUpdate::amount(plan.monthly_amount);
                update.card_token_id = cmd.card_token_id.clone();

                let snapshot = self
                    .gateway
                    .update_preapproval(
                        &preapproval_id,
                        update,
                        &idempotency_key("change-plan", &preapproval_id),
                    )
                    .await?;

                // The local row mirrors the new plan immediately; status
                // follows whatever the provider reports.
                subscription.plan_key = new_plan_key;
                subscription.plan_name = plan.name.to_string();
                subscription.monthly_amount = plan.monthly_amount;
                subscription.currency = plan.currency.to_string();
                self.subscriptions.update(&subscription).await?;

                if let Some(to) = subscription
                    .payer_email
                    .clone()
                    .or(company.contact_email.clone())
                {
                    self.notifier.send_safe(templates::plan_changed(
                        &to,
                        plan.name,
                        plan.monthly_amount,
                        plan.currency,
                    ));
                }

                snapshot
            }

            ManageAction::ChangeCard => {
                let token = cmd.card_token_id.clone().ok_or_else(|| {
                    DomainError::validation("cardTokenId", "Falta el token de la tarjeta")
                })?;
                self.gateway
                    .update_preapproval(
                        &preapproval_id,
                        PreapprovalUpdate::card(token),
                        &idempotency_key("change-card", &preapproval_id),
                    )
                    .await?
            }

            ManageAction::Cancel => {
                self.gateway
                    .update_preapproval(
                        &preapproval_id,
                        PreapprovalUpdate::status("cancelled"),
                        &idempotency_key("cancel-preapproval", &preapproval_id),
                    )
                    .await?
            }

            ManageAction::Pause => {
                self.gateway
                    .update_preapproval(
                        &preapproval_id,
                        PreapprovalUpdate::status("paused"),
                        &idempotency_key("pause-preapproval", &preapproval_id),
                    )
                    .await?
            }

            ManageAction::Reactivate => {
                self.gateway
                    .update_preapproval(
                        &preapproval_id,
                        PreapprovalUpdate::status("authorized"),
                        &idempotency_key("reactivate-preapproval", &preapproval_id),
                    )
                    .await?
            }
        };

        // Apply the provider's reported state through the shared engine so
        // subscription and entitlement move in the same logical unit.
        self.machine
            .apply(&mut subscription, map_mp_preapproval(&snapshot))
            .await?;

        Ok(ManageMpSubscriptionResult {
            action: cmd.action,
            status: snapshot.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::adapters::mercadopago::MockMercadoPagoGateway;
    use crate::domain::billing::{EntitlementStatus, PreapprovalSnapshot};
    use crate::ports::GatewayError;

    fn snapshot(status: &str) -> PreapprovalSnapshot {
        PreapprovalSnapshot {
            id: "pre_1".to_string(),
            status: status.to_string(),
            payer_email: Some("pagador@escuela.edu.ar".to_string()),
            next_payment_date: Some(chrono::Utc::now()),
            amount: Some(49_999.0),
            currency: Some("ARS".to_string()),
            card_last_four: None,
            init_point: None,
        }
    }

    fn handler(harness: &Harness, gateway: Arc<MockMercadoPagoGateway>) -> ManageMpSubscriptionHandler {
        ManageMpSubscriptionHandler::new(
            harness.companies.clone(),
            harness.subscriptions.clone(),
            gateway,
            harness.machine.clone(),
            NotificationDispatcher::new(harness.mailer.clone()),
        )
    }

    fn cmd(action: ManageAction) -> ManageMpSubscriptionCommand {
        ManageMpSubscriptionCommand {
            user_id: UserId::new("user-1").unwrap(),
            action,
            mp_preapproval_id: "pre_1".to_string(),
            new_plan_key: None,
            card_token_id: None,
            reason: None,
        }
    }

    #[tokio::test]
    async fn change_plan_cancels_then_mutates_amount_in_place() {
        let harness = Harness::new();
        harness
            .seed_active_subscription(Provider::MercadoPago, "pre_1", PlanKey::Standard)
            .await;
        let gateway = Arc::new(MockMercadoPagoGateway::new());
        gateway.set_update(Ok(snapshot("authorized")));
        let handler = handler(&harness, gateway.clone());

        let result = handler
            .handle(ManageMpSubscriptionCommand {
                new_plan_key: Some(PlanKey::Premium),
                ..cmd(ManageAction::ChangePlan)
            })
            .await
            .unwrap();

        assert_eq!(result.status, "authorized");

        // Two PUTs: best-effort cancel, then the amount mutation.
        let updates = gateway.recorded_updates.lock().unwrap().clone();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].status.as_deref(), Some("cancelled"));
        assert_eq!(
            updates[1].transaction_amount,
            Some(Plan::for_key(PlanKey::Premium).monthly_amount)
        );

        let sub = harness.subscription("pre_1").await;
        assert_eq!(sub.plan_key, PlanKey::Premium);
        let entitlement = harness.entitlement().await;
        assert_eq!(entitlement.selected_plan, Some(PlanKey::Premium));
    }

    #[tokio::test]
    async fn change_plan_continues_when_best_effort_cancel_fails() {
        let harness = Harness::new();
        harness
            .seed_active_subscription(Provider::MercadoPago, "pre_1", PlanKey::Standard)
            .await;
        let gateway = Arc::new(MockMercadoPagoGateway::new());
        // First PUT (cancel) fails; second (amount) succeeds.
        gateway.push_update(Err(GatewayError::provider(500, "boom")));
        gateway.push_update(Ok(snapshot("authorized")));
        let handler = handler(&harness, gateway.clone());

        let result = handler
            .handle(ManageMpSubscriptionCommand {
                new_plan_key: Some(PlanKey::Premium),
                ..cmd(ManageAction::ChangePlan)
            })
            .await;

        assert!(result.is_ok(), "cancel failure must not block the change");
        assert_eq!(
            gateway.update_calls.load(std::sync::atomic::Ordering::SeqCst),
            2
        );
    }

    #[tokio::test]
    async fn cancel_revokes_entitlement() {
        let harness = Harness::new();
        harness
            .seed_active_subscription(Provider::MercadoPago, "pre_1", PlanKey::Standard)
            .await;
        let gateway = Arc::new(MockMercadoPagoGateway::new());
        gateway.set_update(Ok(snapshot("cancelled")));
        let handler = handler(&harness, gateway);

        let result = handler.handle(cmd(ManageAction::Cancel)).await.unwrap();

        assert_eq!(result.status, "cancelled");
        harness
            .assert_entitlement(EntitlementStatus::Canceled, false)
            .await;
    }

    #[tokio::test]
    async fn pause_keeps_access_flag() {
        let harness = Harness::new();
        harness
            .seed_active_subscription(Provider::MercadoPago, "pre_1", PlanKey::Standard)
            .await;
        let gateway = Arc::new(MockMercadoPagoGateway::new());
        gateway.set_update(Ok(snapshot("paused")));
        let handler = handler(&harness, gateway);

        handler.handle(cmd(ManageAction::Pause)).await.unwrap();

        harness
            .assert_entitlement(EntitlementStatus::Paused, true)
            .await;
    }

    #[tokio::test]
    async fn reactivate_restores_entitlement() {
        let harness = Harness::new();
        let mut sub = harness
            .seed_active_subscription(Provider::MercadoPago, "pre_1", PlanKey::Standard)
            .await;
        sub.status = SubscriptionStatus::Paused;
        harness.subscriptions.update(&sub).await.unwrap();

        let gateway = Arc::new(MockMercadoPagoGateway::new());
        gateway.set_update(Ok(snapshot("authorized")));
        let handler = handler(&harness, gateway);

        let result = handler.handle(cmd(ManageAction::Reactivate)).await.unwrap();

        assert_eq!(result.status, "authorized");
        harness
            .assert_entitlement(EntitlementStatus::Active, true)
            .await;
    }

    #[tokio::test]
    async fn change_card_requires_token() {
        let harness = Harness::new();
        harness
            .seed_active_subscription(Provider::MercadoPago, "pre_1", PlanKey::Standard)
            .await;
        let handler = handler(&harness, Arc::new(MockMercadoPagoGateway::new()));

        let result = handler.handle(cmd(ManageAction::ChangeCard)).await;
        assert_eq!(result.unwrap_err().code, ErrorCode::ValidationFailed);
    }

    #[tokio::test]
    async fn non_owner_is_rejected() {
        let harness = Harness::new();
        harness
            .seed_active_subscription(Provider::MercadoPago, "pre_1", PlanKey::Standard)
            .await;
        let gateway = Arc::new(MockMercadoPagoGateway::new());
        let handler = handler(&harness, gateway.clone());

        let result = handler
            .handle(ManageMpSubscriptionCommand {
                user_id: UserId::new("intruso").unwrap(),
                ..cmd(ManageAction::Cancel)
            })
            .await;

        assert_eq!(result.unwrap_err().code, ErrorCode::Forbidden);
        assert_eq!(
            gateway.update_calls.load(std::sync::atomic::Ordering::SeqCst),
            0
        );
    }

    #[tokio::test]
    async fn unknown_preapproval_is_not_found() {
        let harness = Harness::new();
        let handler = handler(&harness, Arc::new(MockMercadoPagoGateway::new()));

        let result = handler.handle(cmd(ManageAction::Cancel)).await;
        assert_eq!(result.unwrap_err().code, ErrorCode::SubscriptionNotFound);
    }
}
