//! Ports: async trait seams between the application core and the outside
//! world (database, payment providers, email). Adapters implement these;
//! tests swap in in-memory fakes.

mod company_repository;
mod gateway;
mod mailer;
mod mercadopago_gateway;
mod payment_transaction_repository;
mod paypal_gateway;
mod subscription_repository;
mod webhook_event_ledger;

pub use company_repository::CompanyRepository;
pub use gateway::GatewayError;
pub use mailer::{EmailMessage, MailError, Mailer};
pub use mercadopago_gateway::{CreatePreapprovalRequest, MercadoPagoGateway, PreapprovalUpdate};
pub use payment_transaction_repository::{PaymentTransactionRepository, UpsertOutcome};
pub use paypal_gateway::{
    CreatePayPalSubscriptionRequest, CreatedPayPalSubscription, PayPalGateway,
    PayPalWebhookVerification,
};
pub use subscription_repository::SubscriptionRepository;
pub use webhook_event_ledger::{LedgerDecision, WebhookEventLedger, WebhookEventRecord};

#[cfg(test)]
pub use webhook_event_ledger::testing::InMemoryWebhookEventLedger;
