//! Subscription aggregate.
//!
//! One record per (company, provider) pairing actually created. Records are
//! never deleted; lifecycle is appended by status transitions driven by
//! verified webhook events, synchronous provider responses, or the daily
//! reconciliation job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{CompanyId, SubscriptionId};

use super::plan::{Plan, PlanKey};
use super::status::SubscriptionStatus;

/// Payment provider a subscription belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    PayPal,
    MercadoPago,
}

impl Provider {
    /// Wire/storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::PayPal => "paypal",
            Provider::MercadoPago => "mercadopago",
        }
    }

    /// Parses the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "paypal" => Some(Provider::PayPal),
            "mercadopago" => Some(Provider::MercadoPago),
            _ => None,
        }
    }
}

/// A subscription as persisted, combining provider identity, plan, lifecycle
/// status, and billing timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub company_id: CompanyId,
    pub provider: Provider,

    /// Provider-assigned id: PayPal subscription id or MercadoPago
    /// preapproval id. Unique per provider.
    pub provider_subscription_id: String,

    pub plan_key: PlanKey,
    pub plan_name: String,
    pub monthly_amount: f64,
    pub currency: String,

    pub status: SubscriptionStatus,
    /// The provider's literal status string as last reported, kept alongside
    /// the normalized status for reconciliation and operator inspection.
    pub provider_status: Option<String>,

    /// Email the provider reports for the payer; not necessarily the
    /// account owner's email.
    pub payer_email: Option<String>,

    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub next_billing_time: Option<DateTime<Utc>>,
    pub suspended_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,

    /// PayPal path only: consecutive failed payment notifications.
    pub failed_payments: i32,
}

impl Subscription {
    /// Creates a provisional record at checkout time.
    pub fn new_pending(
        company_id: CompanyId,
        provider: Provider,
        provider_subscription_id: impl Into<String>,
        plan_key: PlanKey,
        payer_email: Option<String>,
    ) -> Self {
        let plan = Plan::for_key(plan_key);
        Self {
            id: SubscriptionId::new(),
            company_id,
            provider,
            provider_subscription_id: provider_subscription_id.into(),
            plan_key,
            plan_name: plan.name.to_string(),
            monthly_amount: plan.monthly_amount,
            currency: plan.currency.to_string(),
            status: SubscriptionStatus::Pending,
            provider_status: None,
            payer_email,
            created_at: Utc::now(),
            activated_at: None,
            current_period_start: None,
            next_billing_time: None,
            suspended_at: None,
            cancelled_at: None,
            failed_payments: 0,
        }
    }

    /// True when the subscription is in a state the daily reconciliation
    /// job should re-check against the provider.
    pub fn needs_reconciliation(&self) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Pending
                | SubscriptionStatus::ApprovalPending
                | SubscriptionStatus::Active
                | SubscriptionStatus::Paused
        )
    }
}
