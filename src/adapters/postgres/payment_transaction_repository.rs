//! PostgreSQL implementation of PaymentTransactionRepository.
//!
//! Upsert-on-conflict on (provider, provider_transaction_id) absorbs
//! duplicate webhook deliveries: the second delivery refreshes the row
//! instead of double-counting the payment.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::billing::{PaymentStatus, PaymentTransaction, Provider};
use crate::domain::foundation::{
    CompanyId, DomainError, ErrorCode, PaymentTransactionId, SubscriptionId,
};
use crate::ports::{PaymentTransactionRepository, UpsertOutcome};

/// PostgreSQL implementation of the PaymentTransactionRepository port.
pub struct PostgresPaymentTransactionRepository {
    pool: PgPool,
}

impl PostgresPaymentTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: uuid::Uuid,
    subscription_id: uuid::Uuid,
    company_id: uuid::Uuid,
    provider: String,
    provider_transaction_id: String,
    amount: f64,
    currency: String,
    status: String,
    paid_at: Option<chrono::DateTime<chrono::Utc>>,
    raw_payload: serde_json::Value,
}

impl TryFrom<PaymentRow> for PaymentTransaction {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let provider = Provider::parse(&row.provider).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid provider value: {}", row.provider),
            )
        })?;

        Ok(PaymentTransaction {
            id: PaymentTransactionId::from_uuid(row.id),
            subscription_id: SubscriptionId::from_uuid(row.subscription_id),
            company_id: CompanyId::from_uuid(row.company_id),
            provider,
            provider_transaction_id: row.provider_transaction_id,
            amount: row.amount,
            currency: row.currency,
            status: PaymentStatus::from_provider(&row.status),
            paid_at: row.paid_at,
            raw_payload: row.raw_payload,
        })
    }
}

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

#[async_trait]
impl PaymentTransactionRepository for PostgresPaymentTransactionRepository {
    async fn upsert(
        &self,
        transaction: &PaymentTransaction,
    ) -> Result<UpsertOutcome, DomainError> {
        // `xmax = 0` distinguishes a fresh insert from a conflict update.
        let (inserted,): (bool,) = sqlx::query_as(
            r#"
            INSERT INTO payment_transactions (
                id, subscription_id, company_id, provider, provider_transaction_id,
                amount, currency, status, paid_at, raw_payload
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (provider, provider_transaction_id) DO UPDATE SET
                status = EXCLUDED.status,
                paid_at = EXCLUDED.paid_at,
                raw_payload = EXCLUDED.raw_payload
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(transaction.id.as_uuid())
        .bind(transaction.subscription_id.as_uuid())
        .bind(transaction.company_id.as_uuid())
        .bind(transaction.provider.as_str())
        .bind(&transaction.provider_transaction_id)
        .bind(transaction.amount)
        .bind(&transaction.currency)
        .bind(transaction.status.as_str())
        .bind(transaction.paid_at)
        .bind(&transaction.raw_payload)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to upsert payment transaction", e))?;

        Ok(if inserted {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Updated
        })
    }

    async fn find_by_provider_id(
        &self,
        provider: Provider,
        provider_transaction_id: &str,
    ) -> Result<Option<PaymentTransaction>, DomainError> {
        let row: Option<PaymentRow> = sqlx::query_as(
            r#"
            SELECT id, subscription_id, company_id, provider, provider_transaction_id,
                   amount, currency, status, paid_at, raw_payload
            FROM payment_transactions
            WHERE provider = $1 AND provider_transaction_id = $2
            "#,
        )
        .bind(provider.as_str())
        .bind(provider_transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("Failed to find payment transaction", e))?;

        row.map(PaymentTransaction::try_from).transpose()
    }

    async fn mark_refunded(
        &self,
        provider: Provider,
        provider_transaction_id: &str,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE payment_transactions SET status = 'refunded'
            WHERE provider = $1 AND provider_transaction_id = $2
            "#,
        )
        .bind(provider.as_str())
        .bind(provider_transaction_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to mark transaction refunded", e))?;

        Ok(result.rows_affected() > 0)
    }
}
