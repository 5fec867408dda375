//! WebhookEventLedger port - append-only log of inbound webhook deliveries.
//!
//! The unique key on the provider event id is the sole idempotency mechanism
//! for re-delivered webhooks. Providers redeliver on timeouts, 5xx replies,
//! and lost acknowledgments; an entry already marked `processed` must
//! short-circuit all side effects on redelivery.
//!
//! ## Race condition handling
//!
//! When the same event id arrives concurrently, the first insert wins (the
//! database unique constraint); later arrivals observe the existing row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::billing::Provider;
use crate::domain::foundation::DomainError;

/// A ledger entry for one inbound webhook delivery.
#[derive(Debug, Clone)]
pub struct WebhookEventRecord {
    /// Provider event id (PayPal `WH-...` / MercadoPago notification id).
    pub event_id: String,
    pub provider: Provider,
    pub event_type: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    /// Original event payload for debugging.
    pub payload: serde_json::Value,
    /// True once the state machine completed successfully.
    pub processed: bool,
    /// Failure detail when processing threw; kept for manual reconciliation.
    pub processing_error: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl WebhookEventRecord {
    /// Creates a fresh, not-yet-processed entry.
    pub fn received(
        event_id: impl Into<String>,
        provider: Provider,
        event_type: impl Into<String>,
        resource_type: Option<String>,
        resource_id: Option<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            provider,
            event_type: event_type.into(),
            resource_type,
            resource_id,
            payload,
            processed: false,
            processing_error: None,
            received_at: Utc::now(),
        }
    }
}

/// Outcome of attempting to record an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerDecision {
    /// First delivery: a row was inserted with `processed=false`; proceed.
    New,
    /// A prior delivery exists but never completed; proceed (retry).
    Retry,
    /// A prior delivery completed; skip all side effects and acknowledge.
    AlreadyProcessed,
}

/// Port for the webhook event ledger.
#[async_trait]
pub trait WebhookEventLedger: Send + Sync {
    /// Records the delivery if its event id is new, returning what the
    /// caller should do. Only `AlreadyProcessed` short-circuits.
    async fn record_if_new(
        &self,
        record: WebhookEventRecord,
    ) -> Result<LedgerDecision, DomainError>;

    /// Marks the entry processed after the state machine completes.
    async fn mark_processed(&self, event_id: &str) -> Result<(), DomainError>;

    /// Persists a processing failure, leaving `processed=false`.
    async fn record_error(&self, event_id: &str, error: &str) -> Result<(), DomainError>;

    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError>;

    /// Deletes entries older than the timestamp (retention policy).
    /// Returns the number of entries deleted.
    async fn delete_before(&self, timestamp: DateTime<Utc>) -> Result<u64, DomainError>;
}

#[cfg(test)]
pub mod testing {
    //! In-memory ledger shared by unit and integration tests.

    use super::*;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    /// In-memory implementation mirroring the unique-key semantics of the
    /// PostgreSQL adapter.
    #[derive(Default)]
    pub struct InMemoryWebhookEventLedger {
        records: RwLock<HashMap<String, WebhookEventRecord>>,
    }

    impl InMemoryWebhookEventLedger {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn len(&self) -> usize {
            self.records.read().await.len()
        }
    }

    #[async_trait]
    impl WebhookEventLedger for InMemoryWebhookEventLedger {
        async fn record_if_new(
            &self,
            record: WebhookEventRecord,
        ) -> Result<LedgerDecision, DomainError> {
            let mut records = self.records.write().await;
            match records.get(&record.event_id) {
                Some(existing) if existing.processed => Ok(LedgerDecision::AlreadyProcessed),
                Some(_) => Ok(LedgerDecision::Retry),
                None => {
                    records.insert(record.event_id.clone(), record);
                    Ok(LedgerDecision::New)
                }
            }
        }

        async fn mark_processed(&self, event_id: &str) -> Result<(), DomainError> {
            let mut records = self.records.write().await;
            if let Some(record) = records.get_mut(event_id) {
                record.processed = true;
                record.processing_error = None;
            }
            Ok(())
        }

        async fn record_error(&self, event_id: &str, error: &str) -> Result<(), DomainError> {
            let mut records = self.records.write().await;
            if let Some(record) = records.get_mut(event_id) {
                record.processed = false;
                record.processing_error = Some(error.to_string());
            }
            Ok(())
        }

        async fn find_by_event_id(
            &self,
            event_id: &str,
        ) -> Result<Option<WebhookEventRecord>, DomainError> {
            Ok(self.records.read().await.get(event_id).cloned())
        }

        async fn delete_before(&self, timestamp: DateTime<Utc>) -> Result<u64, DomainError> {
            let mut records = self.records.write().await;
            let before = records.len();
            records.retain(|_, r| r.received_at >= timestamp);
            Ok((before - records.len()) as u64)
        }
    }
}
