//! PayPal subscription activation.
//!
//! After the buyer completes PayPal's approval step the browser lands back
//! on our return URL and calls this endpoint. The provider-side state is
//! re-fetched and, when PayPal reports ACTIVE, the same activation
//! transition the webhook path uses is applied — whichever of the two
//! arrives first wins, and the other becomes a no-op overwrite.

use std::sync::Arc;

use crate::domain::billing::{map_paypal_event, PayPalEventKind, Provider};
use crate::domain::foundation::{CompanyId, DomainError, ErrorCode, UserId};
use crate::ports::{CompanyRepository, PayPalGateway, SubscriptionRepository};

use super::apply_transition::SubscriptionStateMachine;

/// Command for `POST /activate-subscription`.
#[derive(Debug, Clone)]
pub struct ActivateSubscriptionCommand {
    pub user_id: UserId,
    pub company_id: CompanyId,
    /// PayPal subscription id (`I-...`).
    pub subscription_id: String,
    /// Present when the activation concludes a plan change.
    pub old_plan_name: Option<String>,
}

/// Result of an activation attempt.
#[derive(Debug, Clone)]
pub struct ActivateSubscriptionResult {
    /// True when PayPal reported ACTIVE and the transition was applied.
    pub activated: bool,
    /// Provider's literal status.
    pub status: String,
}

/// Handler for `POST /activate-subscription`.
pub struct ActivateSubscriptionHandler {
    companies: Arc<dyn CompanyRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    gateway: Arc<dyn PayPalGateway>,
    machine: Arc<SubscriptionStateMachine>,
}

impl ActivateSubscriptionHandler {
    pub fn new(
        companies: Arc<dyn CompanyRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        gateway: Arc<dyn PayPalGateway>,
        machine: Arc<SubscriptionStateMachine>,
    ) -> Self {
        Self {
            companies,
            subscriptions,
            gateway,
            machine,
        }
    }

    pub async fn handle(
        &self,
        cmd: ActivateSubscriptionCommand,
    ) -> Result<ActivateSubscriptionResult, DomainError> {
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
            .find_by_provider_id(Provider::PayPal, &cmd.subscription_id)
            .await?
            .filter(|s| s.company_id == company.id)
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::SubscriptionNotFound,
                    "No encontramos esa suscripción",
                )
            })?;

        // Re-fetch from the provider; the approval redirect alone proves
        // nothing.
        let details = self.gateway.get_subscription(&cmd.subscription_id).await?;
        let provider_status = details
            .status
            .clone()
            .unwrap_or_else(|| "UNKNOWN".to_string());

        if provider_status != "ACTIVE" {
            tracing::info!(
                subscription_id = %cmd.subscription_id,
                status = %provider_status,
                "Activation requested but provider does not report ACTIVE yet"
            );
            return Ok(ActivateSubscriptionResult {
                activated: false,
                status: provider_status,
            });
        }

        let transition = map_paypal_event(
            &PayPalEventKind::SubscriptionActivated,
            Some(&details),
            None,
        );
        self.machine.apply(&mut subscription, transition).await?;

        if let Some(old_plan) = &cmd.old_plan_name {
            tracing::info!(
                company_id = %company.id,
                old_plan = %old_plan,
                new_plan = %subscription.plan_name,
                "Plan change completed via approval redirect"
            );
        }

        Ok(ActivateSubscriptionResult {
            activated: true,
            status: provider_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::adapters::paypal::MockPayPalGateway;
    use crate::domain::billing::{
        EntitlementStatus, PayPalSubscriptionDetails, PlanKey, SubscriptionStatus,
    };

    fn handler(harness: &Harness, gateway: Arc<MockPayPalGateway>) -> ActivateSubscriptionHandler {
        ActivateSubscriptionHandler::new(
            harness.companies.clone(),
            harness.subscriptions.clone(),
            gateway,
            harness.machine.clone(),
        )
    }

    fn cmd(harness: &Harness, subscription_id: &str) -> ActivateSubscriptionCommand {
        ActivateSubscriptionCommand {
            user_id: harness.owner.clone(),
            company_id: harness.company_id,
            subscription_id: subscription_id.to_string(),
            old_plan_name: None,
        }
    }

    #[tokio::test]
    async fn active_provider_state_activates_and_syncs() {
        let harness = Harness::new();
        harness
            .seed_subscription(Provider::PayPal, "I-ABC", PlanKey::Standard)
            .await;
        let gateway = Arc::new(MockPayPalGateway::happy("I-ABC"));
        let handler = handler(&harness, gateway);

        let result = handler.handle(cmd(&harness, "I-ABC")).await.unwrap();

        assert!(result.activated);
        assert_eq!(result.status, "ACTIVE");
        let sub = harness.subscription("I-ABC").await;
        assert_eq!(sub.status, SubscriptionStatus::Active);
        harness
            .assert_entitlement(EntitlementStatus::Active, true)
            .await;
    }

    #[tokio::test]
    async fn non_active_provider_state_is_reported_without_transition() {
        let harness = Harness::new();
        harness
            .seed_subscription(Provider::PayPal, "I-ABC", PlanKey::Standard)
            .await;
        let gateway = Arc::new(MockPayPalGateway::new());
        gateway.set_get(Ok(PayPalSubscriptionDetails {
            provider_subscription_id: "I-ABC".to_string(),
            status: Some("APPROVAL_PENDING".to_string()),
            payer_email: None,
            next_billing_time: None,
        }));
        let handler = handler(&harness, gateway);

        let result = handler.handle(cmd(&harness, "I-ABC")).await.unwrap();

        assert!(!result.activated);
        assert_eq!(result.status, "APPROVAL_PENDING");
        assert_eq!(
            harness.subscription("I-ABC").await.status,
            SubscriptionStatus::Pending
        );
    }

    #[tokio::test]
    async fn subscription_of_other_company_is_not_found() {
        let harness = Harness::new();
        // Seed under a different company by pointing the row elsewhere.
        let mut sub = harness
            .seed_subscription(Provider::PayPal, "I-ABC", PlanKey::Standard)
            .await;
        sub.company_id = crate::domain::foundation::CompanyId::new();
        harness.subscriptions.update(&sub).await.unwrap();

        let handler = handler(&harness, Arc::new(MockPayPalGateway::happy("I-ABC")));
        let result = handler.handle(cmd(&harness, "I-ABC")).await;

        assert_eq!(result.unwrap_err().code, ErrorCode::SubscriptionNotFound);
    }
}
