//! Company-level subscription management (`POST /manage-subscription`).
//!
//! The caller addresses the company rather than a provider object; the
//! handler resolves the company's current subscription and dispatches to
//! the provider's strategy: PayPal plan changes go through
//! cancel-and-recreate, MercadoPago ones mutate the preapproval in place.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::adapters::gateway::idempotency_key;
use crate::domain::billing::{
    EntitlementChange, PlanKey, Provider, SubscriptionStatus, Transition,
};
use crate::domain::foundation::{CompanyId, DomainError, ErrorCode, UserId};
use crate::ports::{CompanyRepository, PayPalGateway, SubscriptionRepository};

use super::apply_transition::SubscriptionStateMachine;
use super::change_paypal_plan::{ChangePayPalPlanCommand, ChangePayPalPlanHandler};
use super::manage_subscription::{
    ManageAction, ManageMpSubscriptionCommand, ManageMpSubscriptionHandler,
};

/// Actions on the company-level endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyAction {
    ChangePlan,
    Cancel,
}

/// Command for `POST /manage-subscription`.
#[derive(Debug, Clone)]
pub struct ManageSubscriptionCommand {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub action: CompanyAction,
    pub new_plan_key: Option<PlanKey>,
}

/// Result of a company-level management action.
#[derive(Debug, Clone)]
pub struct ManageSubscriptionResult {
    pub action: CompanyAction,
    pub status: String,
    /// Present for PayPal plan changes: the buyer must approve again.
    pub approval_url: Option<String>,
}

/// Handler for `POST /manage-subscription`.
pub struct ManageSubscriptionHandler {
    companies: Arc<dyn CompanyRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    paypal: Arc<dyn PayPalGateway>,
    machine: Arc<SubscriptionStateMachine>,
    paypal_plan_change: Arc<ChangePayPalPlanHandler>,
    mp_manage: Arc<ManageMpSubscriptionHandler>,
}

impl ManageSubscriptionHandler {
    pub fn new(
        companies: Arc<dyn CompanyRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        paypal: Arc<dyn PayPalGateway>,
        machine: Arc<SubscriptionStateMachine>,
        paypal_plan_change: Arc<ChangePayPalPlanHandler>,
        mp_manage: Arc<ManageMpSubscriptionHandler>,
    ) -> Self {
        Self {
            companies,
            subscriptions,
            paypal,
            machine,
            paypal_plan_change,
            mp_manage,
        }
    }

    pub async fn handle(
        &self,
        cmd: ManageSubscriptionCommand,
    ) -> Result<ManageSubscriptionResult, DomainError> {
        let company = self
            .companies
            .find_owned(&cmd.company_id, &cmd.user_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::Forbidden,
                    "No tenés permisos sobre esta institución",
                )
            })?;

        let mut subscription = self
            .subscriptions
            .find_latest_for_company(&company.id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::SubscriptionNotFound,
                    "La institución no tiene una suscripción",
                )
            })?;

        match (subscription.provider, cmd.action) {
            (Provider::PayPal, CompanyAction::ChangePlan) => {
                let new_plan_key = cmd.new_plan_key.ok_or_else(|| {
                    DomainError::validation("newPlanKey", "Falta el plan de destino")
                })?;
                let result = self
                    .paypal_plan_change
                    .handle(ChangePayPalPlanCommand {
                        user_id: cmd.user_id,
                        company_id: cmd.company_id,
                        new_plan_key,
                    })
                    .await?;
                Ok(ManageSubscriptionResult {
                    action: cmd.action,
                    status: "pending".to_string(),
                    approval_url: result.approval_url,
                })
            }

            (Provider::MercadoPago, CompanyAction::ChangePlan) => {
                let result = self
                    .mp_manage
                    .handle(ManageMpSubscriptionCommand {
                        user_id: cmd.user_id,
                        action: ManageAction::ChangePlan,
                        mp_preapproval_id: subscription.provider_subscription_id.clone(),
                        new_plan_key: cmd.new_plan_key,
                        card_token_id: None,
                        reason: None,
                    })
                    .await?;
                Ok(ManageSubscriptionResult {
                    action: cmd.action,
                    status: result.status,
                    approval_url: None,
                })
            }

            (Provider::PayPal, CompanyAction::Cancel) => {
                self.paypal
                    .cancel_subscription(
                        &subscription.provider_subscription_id,
                        "Cancelación solicitada por el usuario",
                        &idempotency_key(
                            "cancel-subscription",
                            &subscription.provider_subscription_id,
                        ),
                    )
                    .await?;
                self.machine
                    .apply(
                        &mut subscription,
                        Transition::Status {
                            new_status: SubscriptionStatus::Cancelled,
                            provider_status: "CANCELLED".to_string(),
                            entitlement: EntitlementChange::cancel(),
                            next_billing_time: None,
                            payer_email: None,
                        },
                    )
                    .await?;
                Ok(ManageSubscriptionResult {
                    action: cmd.action,
                    status: "cancelled".to_string(),
                    approval_url: None,
                })
            }

            (Provider::MercadoPago, CompanyAction::Cancel) => {
                let result = self
                    .mp_manage
                    .handle(ManageMpSubscriptionCommand {
                        user_id: cmd.user_id,
                        action: ManageAction::Cancel,
                        mp_preapproval_id: subscription.provider_subscription_id.clone(),
                        new_plan_key: None,
                        card_token_id: None,
                        reason: None,
                    })
                    .await?;
                Ok(ManageSubscriptionResult {
                    action: cmd.action,
                    status: result.status,
                    approval_url: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::change_paypal_plan::PayPalCheckoutUrls;
    use super::super::notifications::NotificationDispatcher;
    use super::super::test_support::*;
    use super::*;
    use crate::adapters::mercadopago::MockMercadoPagoGateway;
    use crate::adapters::paypal::MockPayPalGateway;
    use crate::domain::billing::{EntitlementStatus, PreapprovalSnapshot};
    use crate::ports::CreatedPayPalSubscription;

    struct Setup {
        harness: Harness,
        paypal: Arc<MockPayPalGateway>,
        mercadopago: Arc<MockMercadoPagoGateway>,
        handler: ManageSubscriptionHandler,
    }

    fn setup() -> Setup {
        let harness = Harness::new();
        let paypal = Arc::new(MockPayPalGateway::new());
        let mercadopago = Arc::new(MockMercadoPagoGateway::new());

        let paypal_plan_change = Arc::new(ChangePayPalPlanHandler::new(
            harness.companies.clone(),
            harness.subscriptions.clone(),
            paypal.clone(),
            harness.machine.clone(),
            PayPalCheckoutUrls {
                return_url: "https://app.test/confirmada".to_string(),
                cancel_url: "https://app.test/cancelada".to_string(),
            },
        ));
        let mp_manage = Arc::new(ManageMpSubscriptionHandler::new(
            harness.companies.clone(),
            harness.subscriptions.clone(),
            mercadopago.clone(),
            harness.machine.clone(),
            NotificationDispatcher::new(harness.mailer.clone()),
        ));
        let handler = ManageSubscriptionHandler::new(
            harness.companies.clone(),
            harness.subscriptions.clone(),
            paypal.clone(),
            harness.machine.clone(),
            paypal_plan_change,
            mp_manage,
        );

        Setup {
            harness,
            paypal,
            mercadopago,
            handler,
        }
    }

    fn cmd(harness: &Harness, action: CompanyAction) -> ManageSubscriptionCommand {
        ManageSubscriptionCommand {
            user_id: harness.owner.clone(),
            company_id: harness.company_id,
            action,
            new_plan_key: Some(PlanKey::Premium),
        }
    }

    #[tokio::test]
    async fn paypal_plan_change_goes_through_cancel_and_recreate() {
        let setup = setup();
        setup
            .harness
            .seed_active_subscription(Provider::PayPal, "I-OLD", PlanKey::Basic)
            .await;
        setup.paypal.set_cancel(Ok(()));
        setup.paypal.set_create(Ok(CreatedPayPalSubscription {
            id: "I-NEW".to_string(),
            status: "APPROVAL_PENDING".to_string(),
            approval_url: Some("https://www.paypal.com/approve".to_string()),
        }));

        let result = setup
            .handler
            .handle(cmd(&setup.harness, CompanyAction::ChangePlan))
            .await
            .unwrap();

        assert_eq!(result.status, "pending");
        assert!(result.approval_url.is_some());
    }

    #[tokio::test]
    async fn mercadopago_plan_change_mutates_in_place() {
        let setup = setup();
        setup
            .harness
            .seed_active_subscription(Provider::MercadoPago, "pre_1", PlanKey::Basic)
            .await;
        setup.mercadopago.set_update(Ok(PreapprovalSnapshot {
            id: "pre_1".to_string(),
            status: "authorized".to_string(),
            payer_email: None,
            next_payment_date: None,
            amount: Some(49_999.0),
            currency: Some("ARS".to_string()),
            card_last_four: None,
            init_point: None,
        }));

        let result = setup
            .handler
            .handle(cmd(&setup.harness, CompanyAction::ChangePlan))
            .await
            .unwrap();

        assert_eq!(result.status, "authorized");
        assert!(result.approval_url.is_none());
        assert_eq!(
            setup.harness.subscription("pre_1").await.plan_key,
            PlanKey::Premium
        );
    }

    #[tokio::test]
    async fn paypal_cancel_applies_cancelled_transition() {
        let setup = setup();
        setup
            .harness
            .seed_active_subscription(Provider::PayPal, "I-OLD", PlanKey::Basic)
            .await;
        setup.paypal.set_cancel(Ok(()));

        let result = setup
            .handler
            .handle(cmd(&setup.harness, CompanyAction::Cancel))
            .await
            .unwrap();

        assert_eq!(result.status, "cancelled");
        setup
            .harness
            .assert_entitlement(EntitlementStatus::Canceled, false)
            .await;
    }

    #[tokio::test]
    async fn company_without_subscription_is_rejected() {
        let setup = setup();

        let result = setup
            .handler
            .handle(cmd(&setup.harness, CompanyAction::Cancel))
            .await;

        assert_eq!(result.unwrap_err().code, ErrorCode::SubscriptionNotFound);
    }
}
