//! In-memory port implementations shared across billing handler tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::billing::{
    Company, CompanyEntitlement, EntitlementChange, EntitlementStatus, PaymentTransaction,
    PlanKey, Provider, Subscription, SubscriptionStatus,
};
use crate::domain::foundation::{CompanyId, DomainError, ErrorCode, SubscriptionId, UserId};
use crate::ports::{
    CompanyRepository, EmailMessage, MailError, Mailer, PaymentTransactionRepository,
    SubscriptionRepository, UpsertOutcome,
};

use super::notifications::NotificationDispatcher;
use super::SubscriptionStateMachine;

// ════════════════════════════════════════════════════════════════════════════════
// In-memory repositories
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct InMemorySubscriptionRepository {
    pub rows: Mutex<Vec<Subscription>>,
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn save(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|s| {
            s.provider == subscription.provider
                && s.provider_subscription_id == subscription.provider_subscription_id
        }) {
            return Err(DomainError::new(
                ErrorCode::SubscriptionExists,
                "Subscription already exists for this provider id",
            ));
        }
        rows.push(subscription.clone());
        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|s| s.id == subscription.id) {
            Some(row) => {
                *row = subscription.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                "Subscription not found",
            )),
        }
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|s| &s.id == id)
            .cloned())
    }

    async fn find_by_provider_id(
        &self,
        provider: Provider,
        provider_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|s| {
                s.provider == provider && s.provider_subscription_id == provider_subscription_id
            })
            .cloned())
    }

    async fn find_latest_for_company(
        &self,
        company_id: &CompanyId,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|s| &s.company_id == company_id)
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn has_open_subscription(&self, company_id: &CompanyId) -> Result<bool, DomainError> {
        Ok(self.rows.lock().unwrap().iter().any(|s| {
            &s.company_id == company_id
                && matches!(
                    s.status,
                    SubscriptionStatus::Pending
                        | SubscriptionStatus::ApprovalPending
                        | SubscriptionStatus::Active
                )
        }))
    }

    async fn find_needing_reconciliation(
        &self,
        provider: Provider,
    ) -> Result<Vec<Subscription>, DomainError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|s| {
                s.provider == provider
                    && s.needs_reconciliation()
                    && !s.provider_subscription_id.is_empty()
            })
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryCompanyRepository {
    pub rows: Mutex<Vec<Company>>,
}

#[async_trait]
impl CompanyRepository for InMemoryCompanyRepository {
    async fn find_by_id(&self, id: &CompanyId) -> Result<Option<Company>, DomainError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|c| &c.id == id)
            .cloned())
    }

    async fn find_owned(
        &self,
        id: &CompanyId,
        owner: &UserId,
    ) -> Result<Option<Company>, DomainError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|c| &c.id == id && &c.owner_user_id == owner)
            .cloned())
    }

    async fn update_entitlement(
        &self,
        id: &CompanyId,
        entitlement: &CompanyEntitlement,
    ) -> Result<(), DomainError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|c| &c.id == id) {
            Some(company) => {
                company.entitlement = entitlement.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::CompanyNotFound,
                "Company not found",
            )),
        }
    }

    async fn sync_renewal_date(
        &self,
        id: &CompanyId,
        renewal_date: Option<DateTime<Utc>>,
    ) -> Result<(), DomainError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|c| &c.id == id) {
            Some(company) => {
                company.entitlement.renewal_date = renewal_date;
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::CompanyNotFound,
                "Company not found",
            )),
        }
    }
}

#[derive(Default)]
pub struct InMemoryPaymentRepository {
    pub rows: Mutex<HashMap<(Provider, String), PaymentTransaction>>,
}

#[async_trait]
impl PaymentTransactionRepository for InMemoryPaymentRepository {
    async fn upsert(
        &self,
        transaction: &PaymentTransaction,
    ) -> Result<UpsertOutcome, DomainError> {
        let key = (
            transaction.provider,
            transaction.provider_transaction_id.clone(),
        );
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = rows.get_mut(&key) {
            existing.status = transaction.status.clone();
            existing.paid_at = transaction.paid_at;
            existing.raw_payload = transaction.raw_payload.clone();
            Ok(UpsertOutcome::Updated)
        } else {
            rows.insert(key, transaction.clone());
            Ok(UpsertOutcome::Inserted)
        }
    }

    async fn find_by_provider_id(
        &self,
        provider: Provider,
        provider_transaction_id: &str,
    ) -> Result<Option<PaymentTransaction>, DomainError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(&(provider, provider_transaction_id.to_string()))
            .cloned())
    }

    async fn mark_refunded(
        &self,
        provider: Provider,
        provider_transaction_id: &str,
    ) -> Result<bool, DomainError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&(provider, provider_transaction_id.to_string())) {
            Some(transaction) => {
                transaction.status = crate::domain::billing::PaymentStatus::Refunded;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

pub struct RecordingMailer {
    pub sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Harness
// ════════════════════════════════════════════════════════════════════════════════

/// One company, wired repositories, and the state machine under test.
pub struct Harness {
    pub subscriptions: Arc<InMemorySubscriptionRepository>,
    pub companies: Arc<InMemoryCompanyRepository>,
    pub payments: Arc<InMemoryPaymentRepository>,
    pub mailer: Arc<RecordingMailer>,
    pub machine: Arc<SubscriptionStateMachine>,
    pub company_id: CompanyId,
    pub owner: UserId,
}

impl Harness {
    pub fn new() -> Self {
        let subscriptions = Arc::new(InMemorySubscriptionRepository::default());
        let companies = Arc::new(InMemoryCompanyRepository::default());
        let payments = Arc::new(InMemoryPaymentRepository::default());
        let mailer = Arc::new(RecordingMailer::new());

        let company_id = CompanyId::new();
        let owner = UserId::new("user-1").unwrap();
        companies.rows.lock().unwrap().push(Company {
            id: company_id,
            name: "Escuela San Martín".to_string(),
            owner_user_id: owner.clone(),
            contact_email: Some("admin@sanmartin.edu.ar".to_string()),
            entitlement: CompanyEntitlement::none(),
        });

        let machine = Arc::new(SubscriptionStateMachine::new(
            subscriptions.clone(),
            companies.clone(),
            payments.clone(),
            NotificationDispatcher::new(mailer.clone()),
        ));

        Self {
            subscriptions,
            companies,
            payments,
            mailer,
            machine,
            company_id,
            owner,
        }
    }

    pub async fn seed_subscription(
        &self,
        provider: Provider,
        provider_id: &str,
        plan: PlanKey,
    ) -> Subscription {
        let subscription = Subscription::new_pending(
            self.company_id,
            provider,
            provider_id,
            plan,
            Some("pagador@escuela.edu.ar".to_string()),
        );
        self.subscriptions.save(&subscription).await.unwrap();
        subscription
    }

    pub async fn seed_active_subscription(
        &self,
        provider: Provider,
        provider_id: &str,
        plan: PlanKey,
    ) -> Subscription {
        let mut subscription = self.seed_subscription(provider, provider_id, plan).await;
        subscription.status = SubscriptionStatus::Active;
        subscription.activated_at = Some(Utc::now());
        self.subscriptions.update(&subscription).await.unwrap();

        let entitlement = EntitlementChange::activate(plan, None)
            .apply_to(&CompanyEntitlement::none());
        self.companies
            .update_entitlement(&self.company_id, &entitlement)
            .await
            .unwrap();
        subscription
    }

    pub async fn subscription(&self, provider_id: &str) -> Subscription {
        self.subscriptions
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.provider_subscription_id == provider_id)
            .cloned()
            .expect("subscription exists")
    }

    pub async fn entitlement(&self) -> CompanyEntitlement {
        self.companies
            .find_by_id(&self.company_id)
            .await
            .unwrap()
            .expect("company exists")
            .entitlement
    }

    pub async fn payment_count(&self) -> usize {
        self.payments.rows.lock().unwrap().len()
    }

    pub async fn payment(
        &self,
        provider: Provider,
        provider_transaction_id: &str,
    ) -> Option<PaymentTransaction> {
        self.payments
            .find_by_provider_id(provider, provider_transaction_id)
            .await
            .unwrap()
    }

    pub fn sent_emails(&self) -> Vec<EmailMessage> {
        self.mailer.sent.lock().unwrap().clone()
    }

    /// Polls for fire-and-forget email deliveries.
    pub async fn wait_for_emails(&self, expected: usize) {
        for _ in 0..200 {
            if self.mailer.sent.lock().unwrap().len() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    /// Asserts the entitlement status matches, for readable failures.
    pub async fn assert_entitlement(&self, status: EntitlementStatus, subscribed: bool) {
        let entitlement = self.entitlement().await;
        assert_eq!(entitlement.status, status);
        assert_eq!(entitlement.is_subscribed, subscribed);
    }
}
