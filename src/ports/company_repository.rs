//! CompanyRepository port.
//!
//! Billing's view of the tenant table: ownership lookups for authorization
//! and entitlement projection writes. The entitlement must only ever be
//! written through the reconciliation engine; no other code path mutates it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::billing::{Company, CompanyEntitlement};
use crate::domain::foundation::{CompanyId, DomainError, UserId};

/// Port for reading companies and writing their entitlement projection.
#[async_trait]
pub trait CompanyRepository: Send + Sync {
    async fn find_by_id(&self, id: &CompanyId) -> Result<Option<Company>, DomainError>;

    /// Owner-match query: returns the company only when `owner` owns it.
    ///
    /// Every user-initiated billing mutation authorizes through this single
    /// query before touching provider state.
    async fn find_owned(
        &self,
        id: &CompanyId,
        owner: &UserId,
    ) -> Result<Option<Company>, DomainError>;

    /// Overwrites the entitlement projection fields on the company row.
    async fn update_entitlement(
        &self,
        id: &CompanyId,
        entitlement: &CompanyEntitlement,
    ) -> Result<(), DomainError>;

    /// Updates only the renewal date (MercadoPago approved-payment sync).
    async fn sync_renewal_date(
        &self,
        id: &CompanyId,
        renewal_date: Option<DateTime<Utc>>,
    ) -> Result<(), DomainError>;
}
