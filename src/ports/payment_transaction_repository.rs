//! PaymentTransactionRepository port.
//!
//! Payment rows are keyed by the provider's transaction id; duplicate
//! webhook deliveries for the same charge collapse into a single row via
//! upsert-on-conflict. This is MercadoPago's sole idempotency mechanism and
//! a second line of defense on the PayPal path behind the event ledger.

use async_trait::async_trait;

use crate::domain::billing::{PaymentTransaction, Provider};
use crate::domain::foundation::DomainError;

/// Result of an upsert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First time this provider transaction id was seen.
    Inserted,
    /// Row already existed; fields were refreshed in place.
    Updated,
}

/// Port for storing payment transactions.
#[async_trait]
pub trait PaymentTransactionRepository: Send + Sync {
    /// Inserts or refreshes the row for this provider transaction id.
    async fn upsert(&self, transaction: &PaymentTransaction)
        -> Result<UpsertOutcome, DomainError>;

    async fn find_by_provider_id(
        &self,
        provider: Provider,
        provider_transaction_id: &str,
    ) -> Result<Option<PaymentTransaction>, DomainError>;

    /// Marks the matching transaction refunded. Returns `false` when no row
    /// matched (refund webhook arrived before the sale was recorded).
    async fn mark_refunded(
        &self,
        provider: Provider,
        provider_transaction_id: &str,
    ) -> Result<bool, DomainError>;
}
