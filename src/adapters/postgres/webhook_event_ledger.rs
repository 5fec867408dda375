//! PostgreSQL implementation of the webhook event ledger.
//!
//! `ON CONFLICT DO NOTHING` on the event id primary key makes concurrent
//! deliveries of the same event race safely: exactly one insert wins, and
//! the losers read the existing row to decide whether to proceed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::billing::Provider;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{LedgerDecision, WebhookEventLedger, WebhookEventRecord};

/// PostgreSQL implementation of the WebhookEventLedger port.
pub struct PostgresWebhookEventLedger {
    pool: PgPool,
}

impl PostgresWebhookEventLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LedgerRow {
    event_id: String,
    provider: String,
    event_type: String,
    resource_type: Option<String>,
    resource_id: Option<String>,
    payload: serde_json::Value,
    processed: bool,
    processing_error: Option<String>,
    received_at: DateTime<Utc>,
}

impl TryFrom<LedgerRow> for WebhookEventRecord {
    type Error = DomainError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        let provider = Provider::parse(&row.provider).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid provider value: {}", row.provider),
            )
        })?;
        Ok(WebhookEventRecord {
            event_id: row.event_id,
            provider,
            event_type: row.event_type,
            resource_type: row.resource_type,
            resource_id: row.resource_id,
            payload: row.payload,
            processed: row.processed,
            processing_error: row.processing_error,
            received_at: row.received_at,
        })
    }
}

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

#[async_trait]
impl WebhookEventLedger for PostgresWebhookEventLedger {
    async fn record_if_new(
        &self,
        record: WebhookEventRecord,
    ) -> Result<LedgerDecision, DomainError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO webhook_events (
                event_id, provider, event_type, resource_type, resource_id,
                payload, processed, processing_error, received_at
            ) VALUES ($1, $2, $3, $4, $5, $6, false, NULL, $7)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(&record.event_id)
        .bind(record.provider.as_str())
        .bind(&record.event_type)
        .bind(&record.resource_type)
        .bind(&record.resource_id)
        .bind(&record.payload)
        .bind(record.received_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to record webhook event", e))?
        .rows_affected()
            > 0;

        if inserted {
            return Ok(LedgerDecision::New);
        }

        // Lost the insert race or redelivery: consult the existing row.
        let (processed,): (bool,) =
            sqlx::query_as("SELECT processed FROM webhook_events WHERE event_id = $1")
                .bind(&record.event_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| db_error("Failed to read webhook event", e))?;

        Ok(if processed {
            LedgerDecision::AlreadyProcessed
        } else {
            LedgerDecision::Retry
        })
    }

    async fn mark_processed(&self, event_id: &str) -> Result<(), DomainError> {
        sqlx::query(
            "UPDATE webhook_events SET processed = true, processing_error = NULL WHERE event_id = $1",
        )
        .bind(event_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to mark webhook event processed", e))?;
        Ok(())
    }

    async fn record_error(&self, event_id: &str, error: &str) -> Result<(), DomainError> {
        sqlx::query(
            "UPDATE webhook_events SET processed = false, processing_error = $2 WHERE event_id = $1",
        )
        .bind(event_id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to record webhook processing error", e))?;
        Ok(())
    }

    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        let row: Option<LedgerRow> = sqlx::query_as(
            r#"
            SELECT event_id, provider, event_type, resource_type, resource_id,
                   payload, processed, processing_error, received_at
            FROM webhook_events
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find webhook event", e))?;

        row.map(WebhookEventRecord::try_from).transpose()
    }

    async fn delete_before(&self, timestamp: DateTime<Utc>) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM webhook_events WHERE received_at < $1")
            .bind(timestamp)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete old webhook events", e))?;

        Ok(result.rows_affected())
    }
}
