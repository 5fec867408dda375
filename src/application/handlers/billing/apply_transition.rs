//! Subscription state machine engine.
//!
//! The single place where provider transitions touch storage. Every status
//! change writes the subscription row and re-derives the company
//! entitlement in the same logical unit; nothing else in the application is
//! allowed to mutate the entitlement. Status writes are last-writer-wins:
//! out-of-order webhook delivery is tolerated by overwriting, with the
//! daily reconciliation job as the corrective backstop.

use std::sync::Arc;

use chrono::Utc;

use crate::adapters::email::templates;
use crate::domain::billing::{
    Company, EntitlementChange, EntitlementStatus, PaymentTransaction, Subscription,
    SubscriptionStatus, Transition,
};
use crate::domain::foundation::{DomainError, ErrorCode, StateMachine};
use crate::ports::{
    CompanyRepository, PaymentTransactionRepository, SubscriptionRepository, UpsertOutcome,
};

use super::notifications::NotificationDispatcher;

/// What the engine did with a transition, for logging and the CRON report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionReport {
    pub action: &'static str,
    pub status: Option<SubscriptionStatus>,
}

/// Applies provider transitions to local records.
pub struct SubscriptionStateMachine {
    subscriptions: Arc<dyn SubscriptionRepository>,
    companies: Arc<dyn CompanyRepository>,
    payments: Arc<dyn PaymentTransactionRepository>,
    notifier: NotificationDispatcher,
}

impl SubscriptionStateMachine {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        companies: Arc<dyn CompanyRepository>,
        payments: Arc<dyn PaymentTransactionRepository>,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            subscriptions,
            companies,
            payments,
            notifier,
        }
    }

    /// Applies a transition, dispatching notifications for user-visible
    /// changes.
    pub async fn apply(
        &self,
        subscription: &mut Subscription,
        transition: Transition,
    ) -> Result<TransitionReport, DomainError> {
        self.apply_with_options(subscription, transition, true).await
    }

    /// Applies a transition; `notify=false` suppresses emails (used by the
    /// plan-change orchestrator for its intermediate cancel step).
    pub async fn apply_with_options(
        &self,
        subscription: &mut Subscription,
        transition: Transition,
        notify: bool,
    ) -> Result<TransitionReport, DomainError> {
        match transition {
            Transition::Status {
                new_status,
                provider_status,
                entitlement,
                next_billing_time,
                payer_email,
            } => {
                self.apply_status(
                    subscription,
                    new_status,
                    provider_status,
                    entitlement,
                    next_billing_time,
                    payer_email,
                    notify,
                )
                .await?;
                Ok(TransitionReport {
                    action: "status_updated",
                    status: Some(new_status),
                })
            }

            Transition::PaymentFailedTick => {
                subscription.failed_payments += 1;
                self.subscriptions.update(subscription).await?;
                tracing::info!(
                    subscription_id = %subscription.id,
                    failed_payments = subscription.failed_payments,
                    "Payment failure notice recorded"
                );
                Ok(TransitionReport {
                    action: "payment_failed_tick",
                    status: None,
                })
            }

            Transition::RecordPayment {
                payment,
                sync_renewal,
                force_pause,
                send_receipt,
            } => {
                let transaction = PaymentTransaction::new(
                    subscription.id,
                    subscription.company_id,
                    subscription.provider,
                    payment.provider_transaction_id,
                    payment.amount,
                    payment.currency,
                    payment.status.clone(),
                    payment.paid_at,
                    payment.raw,
                );
                let outcome = self.payments.upsert(&transaction).await?;
                let first_delivery = outcome == UpsertOutcome::Inserted;

                if let Some(renewal) = sync_renewal {
                    subscription.next_billing_time = Some(renewal);
                    self.subscriptions.update(subscription).await?;
                    self.companies
                        .sync_renewal_date(&subscription.company_id, Some(renewal))
                        .await?;
                }

                if force_pause {
                    // Rejected charge: pause the subscription and project
                    // the entitlement, retaining temporary access.
                    self.apply_status(
                        subscription,
                        SubscriptionStatus::Paused,
                        "paused".to_string(),
                        EntitlementChange::pause_retaining_access(),
                        None,
                        None,
                        false,
                    )
                    .await?;

                    if notify && first_delivery {
                        if let Some(to) = self.recipient(subscription).await? {
                            self.notifier.send_safe(templates::payment_rejected(
                                &to,
                                &subscription.plan_name,
                            ));
                        }
                    }
                } else if notify
                    && first_delivery
                    && send_receipt
                    && transaction.status.is_successful()
                {
                    if let Some(to) = self.recipient(subscription).await? {
                        self.notifier.send_safe(templates::payment_receipt(
                            &to,
                            &subscription.plan_name,
                            transaction.amount,
                            &transaction.currency,
                        ));
                    }
                }

                Ok(TransitionReport {
                    action: if first_delivery {
                        "payment_recorded"
                    } else {
                        "payment_refreshed"
                    },
                    status: Some(subscription.status),
                })
            }

            Transition::MarkRefunded {
                provider_transaction_id,
            } => {
                let matched = self
                    .payments
                    .mark_refunded(subscription.provider, &provider_transaction_id)
                    .await?;
                if !matched {
                    tracing::warn!(
                        provider_transaction_id,
                        "Refund notice for unknown payment transaction"
                    );
                }
                Ok(TransitionReport {
                    action: "refund_marked",
                    status: None,
                })
            }

            Transition::Ignore { reason } => {
                tracing::info!(reason, subscription_id = %subscription.id, "Event ignored");
                Ok(TransitionReport {
                    action: "ignored",
                    status: None,
                })
            }
        }
    }

    /// Writes a status overwrite plus the derived entitlement projection.
    #[allow(clippy::too_many_arguments)]
    async fn apply_status(
        &self,
        subscription: &mut Subscription,
        new_status: SubscriptionStatus,
        provider_status: String,
        mut entitlement: EntitlementChange,
        next_billing_time: Option<chrono::DateTime<Utc>>,
        payer_email: Option<String>,
        notify: bool,
    ) -> Result<(), DomainError> {
        let previous = subscription.status;
        let entering = previous != new_status;

        if entering && !previous.can_transition_to(&new_status) {
            tracing::warn!(
                subscription_id = %subscription.id,
                from = previous.as_str(),
                to = new_status.as_str(),
                "Out-of-band status transition; applying last-writer-wins"
            );
        }

        subscription.status = new_status;
        subscription.provider_status = Some(provider_status);
        if payer_email.is_some() {
            subscription.payer_email = payer_email;
        }

        let now = Utc::now();
        match new_status {
            SubscriptionStatus::Active => {
                // Set exactly once; duplicate activations must not move it.
                if subscription.activated_at.is_none() {
                    subscription.activated_at = Some(now);
                    subscription.current_period_start = Some(now);
                }
                if next_billing_time.is_some() {
                    subscription.next_billing_time = next_billing_time;
                }
            }
            SubscriptionStatus::Paused if entering => {
                subscription.suspended_at = Some(now);
            }
            SubscriptionStatus::Cancelled if entering => {
                subscription.cancelled_at = Some(now);
            }
            _ => {}
        }

        self.subscriptions.update(subscription).await?;

        let company = self.load_company(subscription).await?;

        // Activation syncs the selected plan from the subscription row.
        if entitlement.status == EntitlementStatus::Active && entitlement.selected_plan.is_none() {
            entitlement.selected_plan = Some(subscription.plan_key);
        }
        let projected = entitlement.apply_to(&company.entitlement);
        self.companies
            .update_entitlement(&company.id, &projected)
            .await?;

        if notify && entering {
            if let Some(to) = subscription
                .payer_email
                .clone()
                .or(company.contact_email.clone())
            {
                match new_status {
                    SubscriptionStatus::Active => {
                        self.notifier.send_safe(templates::subscription_activated(
                            &to,
                            &subscription.plan_name,
                            subscription.monthly_amount,
                            &subscription.currency,
                            subscription.next_billing_time.as_ref(),
                        ));
                    }
                    SubscriptionStatus::Paused => {
                        self.notifier
                            .send_safe(templates::subscription_paused(&to, &subscription.plan_name));
                    }
                    SubscriptionStatus::Cancelled => {
                        self.notifier.send_safe(templates::subscription_cancelled(
                            &to,
                            &subscription.plan_name,
                        ));
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }

    async fn load_company(&self, subscription: &Subscription) -> Result<Company, DomainError> {
        self.companies
            .find_by_id(&subscription.company_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::CompanyNotFound,
                    format!("Company {} not found", subscription.company_id),
                )
            })
    }

    async fn recipient(&self, subscription: &Subscription) -> Result<Option<String>, DomainError> {
        if let Some(email) = &subscription.payer_email {
            return Ok(Some(email.clone()));
        }
        Ok(self.load_company(subscription).await?.contact_email)
    }
}
