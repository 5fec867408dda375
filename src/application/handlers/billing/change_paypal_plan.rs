//! PayPal plan change: cancel-and-recreate.
//!
//! PayPal has no in-place plan mutation, so a plan change is a two-phase
//! workflow: cancel the old subscription, then create a fresh one the buyer
//! must approve again. A failure before the cancel aborts cleanly (the
//! company keeps its old plan). A failure after the cancel but before the
//! new creation leaves the company with no active subscription; there is no
//! automatic compensation, the condition is logged with enough detail for
//! manual reconciliation.

use std::sync::Arc;

use crate::adapters::gateway::idempotency_key;
use crate::domain::billing::{
    EntitlementChange, PlanKey, Provider, Subscription, SubscriptionStatus, Transition,
};
use crate::domain::foundation::{CompanyId, DomainError, ErrorCode, UserId};
use crate::ports::{
    CompanyRepository, CreatePayPalSubscriptionRequest, PayPalGateway, SubscriptionRepository,
};

use super::apply_transition::SubscriptionStateMachine;

/// Command for a PayPal plan change.
#[derive(Debug, Clone)]
pub struct ChangePayPalPlanCommand {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub new_plan_key: PlanKey,
}

/// Result: the buyer must visit `approval_url` before the new subscription
/// activates via webhook.
#[derive(Debug, Clone)]
pub struct ChangePayPalPlanResult {
    pub new_subscription_id: String,
    pub approval_url: Option<String>,
}

/// Redirect URLs handed to PayPal on subscription creation.
#[derive(Debug, Clone)]
pub struct PayPalCheckoutUrls {
    pub return_url: String,
    pub cancel_url: String,
}

/// Handler for the PayPal-style plan change.
pub struct ChangePayPalPlanHandler {
    companies: Arc<dyn CompanyRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    gateway: Arc<dyn PayPalGateway>,
    machine: Arc<SubscriptionStateMachine>,
    urls: PayPalCheckoutUrls,
}

impl ChangePayPalPlanHandler {
    pub fn new(
        companies: Arc<dyn CompanyRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        gateway: Arc<dyn PayPalGateway>,
        machine: Arc<SubscriptionStateMachine>,
        urls: PayPalCheckoutUrls,
    ) -> Self {
        Self {
            companies,
            subscriptions,
            gateway,
            machine,
            urls,
        }
    }

    pub async fn handle(
        &self,
        cmd: ChangePayPalPlanCommand,
    ) -> Result<ChangePayPalPlanResult, DomainError> {
        // (1) Owner-match.
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

        let mut old_subscription = self
            .subscriptions
            .find_latest_for_company(&company.id)
            .await?
            .filter(|s| s.provider == Provider::PayPal && !s.provider_subscription_id.is_empty())
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::SubscriptionNotFound,
                    "La institución no tiene una suscripción de PayPal",
                )
            })?;

        // (2) Cancel the existing subscription at the provider. Failure here
        // aborts the whole operation; the company keeps its old plan.
        self.gateway
            .cancel_subscription(
                &old_subscription.provider_subscription_id,
                "Cambio de plan",
                &idempotency_key(
                    "cancel-subscription",
                    &old_subscription.provider_subscription_id,
                ),
            )
            .await?;

        // (3) Mark the old row cancelled. Entitlement follows in the same
        // unit; it is re-pointed at the new plan in step (6), but if step
        // (4) fails the company is left cancelled and unentitled, which is
        // the documented gap.
        self.machine
            .apply_with_options(
                &mut old_subscription,
                Transition::Status {
                    new_status: SubscriptionStatus::Cancelled,
                    provider_status: "CANCELLED".to_string(),
                    entitlement: EntitlementChange::cancel(),
                    next_billing_time: None,
                    payer_email: None,
                },
                false,
            )
            .await?;

        // (4) Create the replacement subscription for the new plan.
        let created = match self
            .gateway
            .create_subscription(CreatePayPalSubscriptionRequest {
                plan_key: cmd.new_plan_key,
                external_reference: company.id.to_string(),
                return_url: self.urls.return_url.clone(),
                cancel_url: self.urls.cancel_url.clone(),
                idempotency_key: idempotency_key("create-subscription", &company.id.to_string()),
            })
            .await
        {
            Ok(created) => created,
            Err(e) => {
                // Old subscription already cancelled, new one failed: the
                // company has no active subscription until an operator
                // intervenes. No automatic compensation.
                tracing::error!(
                    company_id = %company.id,
                    old_subscription_id = %old_subscription.provider_subscription_id,
                    new_plan = %cmd.new_plan_key,
                    error = %e,
                    "Plan change failed after old subscription was cancelled; manual reconciliation required"
                );
                return Err(e.into());
            }
        };

        // (5) Provisional row for the new subscription.
        let mut new_subscription = Subscription::new_pending(
            company.id,
            Provider::PayPal,
            created.id.clone(),
            cmd.new_plan_key,
            old_subscription.payer_email.clone(),
        );
        new_subscription.provider_status = Some(created.status.clone());
        self.subscriptions.save(&new_subscription).await?;

        // (6) Entitlement points at the new plan, pending approval.
        self.machine
            .apply_with_options(
                &mut new_subscription,
                Transition::Status {
                    new_status: SubscriptionStatus::Pending,
                    provider_status: created.status.clone(),
                    entitlement: EntitlementChange::pending(Some(cmd.new_plan_key)),
                    next_billing_time: None,
                    payer_email: None,
                },
                false,
            )
            .await?;

        // (7) The caller redirects the buyer to the approval URL; activation
        // arrives later via webhook.
        Ok(ChangePayPalPlanResult {
            new_subscription_id: created.id,
            approval_url: created.approval_url,
        })
    }
}
