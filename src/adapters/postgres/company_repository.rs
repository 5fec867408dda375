//! PostgreSQL implementation of CompanyRepository.
//!
//! The entitlement projection lives as denormalized columns on the
//! `companies` row; writes here are only ever issued by the reconciliation
//! engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{Company, CompanyEntitlement, EntitlementStatus, PlanKey};
use crate::domain::foundation::{CompanyId, DomainError, ErrorCode, UserId};
use crate::ports::CompanyRepository;

/// PostgreSQL implementation of the CompanyRepository port.
pub struct PostgresCompanyRepository {
    pool: PgPool,
}

impl PostgresCompanyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of the billing slice of a company.
#[derive(Debug, sqlx::FromRow)]
struct CompanyRow {
    id: Uuid,
    name: String,
    owner_user_id: String,
    contact_email: Option<String>,
    is_subscribed: bool,
    subscription_status: String,
    selected_plan: Option<String>,
    subscription_renewal_date: Option<DateTime<Utc>>,
}

impl TryFrom<CompanyRow> for Company {
    type Error = DomainError;

    fn try_from(row: CompanyRow) -> Result<Self, Self::Error> {
        let status = EntitlementStatus::parse(&row.subscription_status).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid entitlement status: {}", row.subscription_status),
            )
        })?;
        let selected_plan = row
            .selected_plan
            .as_deref()
            .map(PlanKey::parse)
            .transpose()
            .map_err(|e| DomainError::new(ErrorCode::DatabaseError, e.to_string()))?;

        Ok(Company {
            id: CompanyId::from_uuid(row.id),
            name: row.name,
            owner_user_id: UserId::new(row.owner_user_id).map_err(|e| {
                DomainError::new(ErrorCode::DatabaseError, format!("Invalid owner: {}", e))
            })?,
            contact_email: row.contact_email,
            entitlement: CompanyEntitlement {
                is_subscribed: row.is_subscribed,
                status,
                selected_plan,
                renewal_date: row.subscription_renewal_date,
            },
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, name, owner_user_id, contact_email, is_subscribed,
           subscription_status, selected_plan, subscription_renewal_date
    FROM companies
"#;

fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("{}: {}", context, e))
}

#[async_trait]
impl CompanyRepository for PostgresCompanyRepository {
    async fn find_by_id(&self, id: &CompanyId) -> Result<Option<Company>, DomainError> {
        let query = format!("{} WHERE id = $1", SELECT_COLUMNS);
        let row: Option<CompanyRow> = sqlx::query_as(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find company", e))?;

        row.map(Company::try_from).transpose()
    }

    async fn find_owned(
        &self,
        id: &CompanyId,
        owner: &UserId,
    ) -> Result<Option<Company>, DomainError> {
        let query = format!("{} WHERE id = $1 AND owner_user_id = $2", SELECT_COLUMNS);
        let row: Option<CompanyRow> = sqlx::query_as(&query)
            .bind(id.as_uuid())
            .bind(owner.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to find owned company", e))?;

        row.map(Company::try_from).transpose()
    }

    async fn update_entitlement(
        &self,
        id: &CompanyId,
        entitlement: &CompanyEntitlement,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE companies SET
                is_subscribed = $2,
                subscription_status = $3,
                selected_plan = $4,
                subscription_renewal_date = $5
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(entitlement.is_subscribed)
        .bind(entitlement.status.as_str())
        .bind(entitlement.selected_plan.map(|p| p.as_str()))
        .bind(entitlement.renewal_date)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to update entitlement", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::CompanyNotFound,
                "Company not found",
            ));
        }

        Ok(())
    }

    async fn sync_renewal_date(
        &self,
        id: &CompanyId,
        renewal_date: Option<DateTime<Utc>>,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE companies SET subscription_renewal_date = $2 WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(renewal_date)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to sync renewal date", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::CompanyNotFound,
                "Company not found",
            ));
        }

        Ok(())
    }
}
