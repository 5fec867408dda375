//! Subscription creation handlers (MercadoPago).
//!
//! Two flows exist, both with server-trusted pricing:
//! - the card-token flow (`/mp-create-subscription`): the browser tokenizes
//!   a card and the first charge is attempted synchronously, so the caller
//!   may get `active` straight back;
//! - the preapproval-plan flow (`/create-subscription`): no card token, the
//!   payer approves at the returned checkout URL, and activation arrives
//!   later via webhook. This flow is conflict-checked: a company with a
//!   pending or active subscription gets a 409.

use std::sync::Arc;

use crate::adapters::gateway::idempotency_key;
use crate::domain::billing::{map_mp_preapproval, Plan, PlanKey, Provider, Subscription};
use crate::domain::foundation::{CompanyId, DomainError, ErrorCode, UserId};
use crate::ports::{
    CompanyRepository, CreatePreapprovalRequest, MercadoPagoGateway, SubscriptionRepository,
};

use super::apply_transition::SubscriptionStateMachine;

/// Command for the card-token creation flow.
#[derive(Debug, Clone)]
pub struct CreateMpSubscriptionCommand {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub plan_key: PlanKey,
    pub card_token_id: String,
    pub payer_email: String,
}

/// Result of the card-token creation flow.
#[derive(Debug, Clone)]
pub struct CreateMpSubscriptionResult {
    /// Provider-assigned preapproval id.
    pub subscription_id: String,
    /// `active`, `pending`, or the provider's literal status.
    pub status: String,
}

/// Handler for `POST /mp-create-subscription`.
pub struct CreateMpSubscriptionHandler {
    companies: Arc<dyn CompanyRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    gateway: Arc<dyn MercadoPagoGateway>,
    machine: Arc<SubscriptionStateMachine>,
    /// Where the payer lands after checkout.
    back_url: String,
}

impl CreateMpSubscriptionHandler {
    pub fn new(
        companies: Arc<dyn CompanyRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        gateway: Arc<dyn MercadoPagoGateway>,
        machine: Arc<SubscriptionStateMachine>,
        back_url: String,
    ) -> Self {
        Self {
            companies,
            subscriptions,
            gateway,
            machine,
            back_url,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateMpSubscriptionCommand,
    ) -> Result<CreateMpSubscriptionResult, DomainError> {
        // Owner-match before any mutation.
        let company = self
            .companies
            .find_owned(&cmd.company_id, &cmd.user_id)
            .await?
            .ok_or_else(forbidden)?;

        let plan = Plan::for_key(cmd.plan_key);

        let snapshot = self
            .gateway
            .create_preapproval(CreatePreapprovalRequest {
                reason: format!("Aula Segura - {}", plan.name),
                amount: plan.monthly_amount,
                currency: plan.currency.to_string(),
                payer_email: cmd.payer_email.clone(),
                card_token_id: Some(cmd.card_token_id.clone()),
                external_reference: company.id.to_string(),
                back_url: self.back_url.clone(),
                idempotency_key: idempotency_key("create-preapproval", &company.id.to_string()),
            })
            .await?;

        let mut subscription = Subscription::new_pending(
            company.id,
            Provider::MercadoPago,
            snapshot.id.clone(),
            cmd.plan_key,
            Some(cmd.payer_email),
        );
        self.subscriptions.save(&subscription).await?;

        // The synchronous charge outcome drives the same transition table
        // the webhook path uses.
        self.machine
            .apply(&mut subscription, map_mp_preapproval(&snapshot))
            .await?;

        let status = match snapshot.status.as_str() {
            "authorized" => "active".to_string(),
            other => other.to_string(),
        };

        Ok(CreateMpSubscriptionResult {
            subscription_id: snapshot.id,
            status,
        })
    }
}

/// Command for the preapproval-plan creation flow.
#[derive(Debug, Clone)]
pub struct CreateSubscriptionCommand {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub plan_key: PlanKey,
    pub payer_email: String,
    /// Client-submitted amount; logged on mismatch, never trusted.
    pub client_amount: Option<f64>,
}

/// Result of the preapproval-plan creation flow.
#[derive(Debug, Clone)]
pub struct CreateSubscriptionResult {
    pub subscription_id: String,
    pub status: String,
    /// Checkout URL the payer must visit to approve.
    pub approval_url: Option<String>,
}

/// Handler for `POST /create-subscription`.
pub struct CreateSubscriptionHandler {
    companies: Arc<dyn CompanyRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    gateway: Arc<dyn MercadoPagoGateway>,
    machine: Arc<SubscriptionStateMachine>,
    back_url: String,
}

impl CreateSubscriptionHandler {
    pub fn new(
        companies: Arc<dyn CompanyRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        gateway: Arc<dyn MercadoPagoGateway>,
        machine: Arc<SubscriptionStateMachine>,
        back_url: String,
    ) -> Self {
        Self {
            companies,
            subscriptions,
            gateway,
            machine,
            back_url,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateSubscriptionCommand,
    ) -> Result<CreateSubscriptionResult, DomainError> {
        let company = self
            .companies
            .find_owned(&cmd.company_id, &cmd.user_id)
            .await?
            .ok_or_else(forbidden)?;

        // Conflict-checked idempotent creation.
        if self.subscriptions.has_open_subscription(&company.id).await? {
            return Err(DomainError::new(
                ErrorCode::SubscriptionExists,
                "La institución ya tiene una suscripción pendiente o activa",
            ));
        }

        let plan = Plan::for_key(cmd.plan_key);

        // Server-trusted pricing: the client amount is diagnostic only.
        if let Some(client_amount) = cmd.client_amount {
            if (client_amount - plan.monthly_amount).abs() > f64::EPSILON {
                tracing::warn!(
                    company_id = %company.id,
                    plan = %cmd.plan_key,
                    client_amount,
                    server_amount = plan.monthly_amount,
                    "Client-submitted amount mismatch; using server price table"
                );
            }
        }

        let snapshot = self
            .gateway
            .create_preapproval(CreatePreapprovalRequest {
                reason: format!("Aula Segura - {}", plan.name),
                amount: plan.monthly_amount,
                currency: plan.currency.to_string(),
                payer_email: cmd.payer_email.clone(),
                card_token_id: None,
                external_reference: company.id.to_string(),
                back_url: self.back_url.clone(),
                idempotency_key: idempotency_key("create-preapproval", &company.id.to_string()),
            })
            .await?;

        let mut subscription = Subscription::new_pending(
            company.id,
            Provider::MercadoPago,
            snapshot.id.clone(),
            cmd.plan_key,
            Some(cmd.payer_email),
        );
        self.subscriptions.save(&subscription).await?;

        self.machine
            .apply(&mut subscription, map_mp_preapproval(&snapshot))
            .await?;

        Ok(CreateSubscriptionResult {
            subscription_id: snapshot.id,
            status: snapshot.status,
            approval_url: snapshot.init_point,
        })
    }
}

fn forbidden() -> DomainError {
    DomainError::new(
        ErrorCode::Forbidden,
        "No tenés permisos sobre esta institución",
    )
}
