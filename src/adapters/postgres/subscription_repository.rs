//! PostgreSQL implementation of SubscriptionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{PlanKey, Provider, Subscription, SubscriptionStatus};
use crate::domain::foundation::{CompanyId, DomainError, ErrorCode, SubscriptionId};
use crate::ports::SubscriptionRepository;

/// PostgreSQL implementation of the SubscriptionRepository port.
pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a subscription.
#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    company_id: Uuid,
    provider: String,
    provider_subscription_id: String,
    plan_key: String,
    plan_name: String,
    monthly_amount: f64,
    currency: String,
    status: String,
    provider_status: Option<String>,
    payer_email: Option<String>,
    created_at: DateTime<Utc>,
    activated_at: Option<DateTime<Utc>>,
    current_period_start: Option<DateTime<Utc>>,
    next_billing_time: Option<DateTime<Utc>>,
    suspended_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    failed_payments: i32,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let provider = Provider::parse(&row.provider).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid provider value: {}", row.provider),
            )
        })?;
        let plan_key = PlanKey::parse(&row.plan_key)
            .map_err(|e| DomainError::new(ErrorCode::DatabaseError, e.to_string()))?;
        let status = SubscriptionStatus::parse(&row.status).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid status value: {}", row.status),
            )
        })?;

        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            company_id: CompanyId::from_uuid(row.company_id),
            provider,
            provider_subscription_id: row.provider_subscription_id,
            plan_key,
            plan_name: row.plan_name,
            monthly_amount: row.monthly_amount,
            currency: row.currency,
            status,
            provider_status: row.provider_status,
            payer_email: row.payer_email,
            created_at: row.created_at,
            activated_at: row.activated_at,
            current_period_start: row.current_period_start,
            next_billing_time: row.next_billing_time,
            suspended_at: row.suspended_at,
            cancelled_at: row.cancelled_at,
            failed_payments: row.failed_payments,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, company_id, provider, provider_subscription_id, plan_key, plan_name,
           monthly_amount, currency, status, provider_status, payer_email,
           created_at, activated_at, current_period_start, next_billing_time,
           suspended_at, cancelled_at, failed_payments
    FROM subscriptions
"#;

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, company_id, provider, provider_subscription_id, plan_key, plan_name,
                monthly_amount, currency, status, provider_status, payer_email,
                created_at, activated_at, current_period_start, next_billing_time,
                suspended_at, cancelled_at, failed_payments
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.company_id.as_uuid())
        .bind(subscription.provider.as_str())
        .bind(&subscription.provider_subscription_id)
        .bind(subscription.plan_key.as_str())
        .bind(&subscription.plan_name)
        .bind(subscription.monthly_amount)
        .bind(&subscription.currency)
        .bind(subscription.status.as_str())
        .bind(&subscription.provider_status)
        .bind(&subscription.payer_email)
        .bind(subscription.created_at)
        .bind(subscription.activated_at)
        .bind(subscription.current_period_start)
        .bind(subscription.next_billing_time)
        .bind(subscription.suspended_at)
        .bind(subscription.cancelled_at)
        .bind(subscription.failed_payments)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("subscriptions_provider_subscription_id_key") {
                    return DomainError::new(
                        ErrorCode::SubscriptionExists,
                        "Subscription already exists for this provider id",
                    );
                }
            }
            db_error("Failed to save subscription", e)
        })?;

        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                plan_key = $2,
                plan_name = $3,
                monthly_amount = $4,
                currency = $5,
                status = $6,
                provider_status = $7,
                payer_email = $8,
                activated_at = $9,
                current_period_start = $10,
                next_billing_time = $11,
                suspended_at = $12,
                cancelled_at = $13,
                failed_payments = $14
            WHERE id = $1
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.plan_key.as_str())
        .bind(&subscription.plan_name)
        .bind(subscription.monthly_amount)
        .bind(&subscription.currency)
        .bind(subscription.status.as_str())
        .bind(&subscription.provider_status)
        .bind(&subscription.payer_email)
        .bind(subscription.activated_at)
        .bind(subscription.current_period_start)
        .bind(subscription.next_billing_time)
        .bind(subscription.suspended_at)
        .bind(subscription.cancelled_at)
        .bind(subscription.failed_payments)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update subscription", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                "Subscription not found",
            ));
        }

        Ok(())
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        let query = format!("{} WHERE id = $1", SELECT_COLUMNS);
        let row: Option<SubscriptionRow> = sqlx::query_as(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_by_provider_id(
        &self,
        provider: Provider,
        provider_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let query = format!(
            "{} WHERE provider = $1 AND provider_subscription_id = $2",
            SELECT_COLUMNS
        );
        let row: Option<SubscriptionRow> = sqlx::query_as(&query)
            .bind(provider.as_str())
            .bind(provider_subscription_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_latest_for_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Option<Subscription>, DomainError> {
        let query = format!(
            "{} WHERE company_id = $1 ORDER BY created_at DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let row: Option<SubscriptionRow> = sqlx::query_as(&query)
            .bind(company_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn has_open_subscription(&self, company_id: &CompanyId) -> Result<bool, DomainError> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM subscriptions
                WHERE company_id = $1
                  AND status IN ('pending', 'approval_pending', 'active')
            )
            "#,
        )
        .bind(company_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("Failed to check open subscriptions", e))?;

        Ok(exists)
    }

    async fn find_needing_reconciliation(
        &self,
        provider: Provider,
    ) -> Result<Vec<Subscription>, DomainError> {
        let query = format!(
            r#"{}
            WHERE provider = $1
              AND status IN ('pending', 'approval_pending', 'active', 'paused')
              AND provider_subscription_id <> ''
            ORDER BY created_at ASC
            "#,
            SELECT_COLUMNS
        );
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&query)
            .bind(provider.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list subscriptions for reconciliation", e))?;

        rows.into_iter().map(Subscription::try_from).collect()
    }
}
