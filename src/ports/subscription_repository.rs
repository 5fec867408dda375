//! SubscriptionRepository port.
//!
//! Persistence seam for the subscription aggregate. All mutations are
//! whole-row writes keyed by id or by the provider's unique subscription id,
//! so concurrent webhook handlers racing on the same row converge without
//! explicit locks (last writer wins, per the reconciliation design).

use async_trait::async_trait;

use crate::domain::billing::{Provider, Subscription};
use crate::domain::foundation::{CompanyId, DomainError, SubscriptionId};

/// Port for storing and retrieving subscriptions.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Inserts a new subscription row.
    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Overwrites an existing subscription row by id.
    async fn update(&self, subscription: &Subscription) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError>;

    /// Looks up by the provider-assigned subscription/preapproval id.
    async fn find_by_provider_id(
        &self,
        provider: Provider,
        provider_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Most recent subscription for a company, if any.
    async fn find_latest_for_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Option<Subscription>, DomainError>;

    /// True when the company already has a pending or active subscription;
    /// used for conflict-checked idempotent creation.
    async fn has_open_subscription(&self, company_id: &CompanyId) -> Result<bool, DomainError>;

    /// Non-terminal subscriptions of a provider that carry a provider id;
    /// the daily reconciliation job iterates these.
    async fn find_needing_reconciliation(
        &self,
        provider: Provider,
    ) -> Result<Vec<Subscription>, DomainError>;
}
