//! PostgreSQL adapters implementing the repository ports with sqlx.

mod company_repository;
mod payment_transaction_repository;
mod subscription_repository;
mod webhook_event_ledger;

pub use company_repository::PostgresCompanyRepository;
pub use payment_transaction_repository::PostgresPaymentTransactionRepository;
pub use subscription_repository::PostgresSubscriptionRepository;
pub use webhook_event_ledger::PostgresWebhookEventLedger;
