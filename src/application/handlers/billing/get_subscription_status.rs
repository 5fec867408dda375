//! Read-only MercadoPago status refresh.
//!
//! Fetches next-payment-date and card-last-4 from the provider for display.
//! Deliberately mutates nothing: entitlement only ever moves through the
//! state machine.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::billing::Provider;
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::{CompanyRepository, MercadoPagoGateway, SubscriptionRepository};

/// Command for `POST /mp-get-subscription-status`.
#[derive(Debug, Clone)]
pub struct GetMpSubscriptionStatusCommand {
    pub user_id: UserId,
    pub mp_preapproval_id: String,
}

/// Fresh provider-side display data.
#[derive(Debug, Clone)]
pub struct MpSubscriptionStatus {
    pub status: String,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub card_last_four: Option<String>,
}

/// Handler for `POST /mp-get-subscription-status`.
pub struct GetMpSubscriptionStatusHandler {
    companies: Arc<dyn CompanyRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    gateway: Arc<dyn MercadoPagoGateway>,
}

impl GetMpSubscriptionStatusHandler {
    pub fn new(
        companies: Arc<dyn CompanyRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        gateway: Arc<dyn MercadoPagoGateway>,
    ) -> Self {
        Self {
            companies,
            subscriptions,
            gateway,
        }
    }

    pub async fn handle(
        &self,
        cmd: GetMpSubscriptionStatusCommand,
    ) -> Result<MpSubscriptionStatus, DomainError> {
        let subscription = self
            .subscriptions
            .find_by_provider_id(Provider::MercadoPago, &cmd.mp_preapproval_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::SubscriptionNotFound,
                    "No encontramos esa suscripción",
                )
            })?;

        self.companies
            .find_owned(&subscription.company_id, &cmd.user_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::Forbidden,
                    "No tenés permisos sobre esta institución",
                )
            })?;

        let snapshot = self
            .gateway
            .get_preapproval(&cmd.mp_preapproval_id)
            .await?;

        Ok(MpSubscriptionStatus {
            status: snapshot.status,
            next_payment_date: snapshot.next_payment_date,
            card_last_four: snapshot.card_last_four,
        })
    }
}
