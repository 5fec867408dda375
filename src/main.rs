//! Application entry point: configuration, tracing, wiring, serve.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;

use aula_segura::adapters::email::ResendMailer;
use aula_segura::adapters::http::{billing_router, BillingAppState, CheckoutUrls};
use aula_segura::adapters::http::middleware::JwtVerifier;
use aula_segura::adapters::mercadopago::MercadoPagoClient;
use aula_segura::adapters::paypal::PayPalClient;
use aula_segura::adapters::postgres::{
    PostgresCompanyRepository, PostgresPaymentTransactionRepository,
    PostgresSubscriptionRepository, PostgresWebhookEventLedger,
};
use aula_segura::application::handlers::billing::{
    NotificationDispatcher, SubscriptionStateMachine,
};
use aula_segura::config::AppConfig;
use aula_segura::domain::billing::MpSignatureVerifier;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(&config);

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;

    let subscriptions = Arc::new(PostgresSubscriptionRepository::new(pool.clone()));
    let companies = Arc::new(PostgresCompanyRepository::new(pool.clone()));
    let payments = Arc::new(PostgresPaymentTransactionRepository::new(pool.clone()));
    let ledger = Arc::new(PostgresWebhookEventLedger::new(pool));

    let paypal = Arc::new(PayPalClient::new(config.paypal.clone()));
    let mercadopago = Arc::new(MercadoPagoClient::new(config.mercadopago.clone()));
    let mp_verifier = Arc::new(MpSignatureVerifier::new(
        config.mercadopago.webhook_secret.clone(),
    ));

    let notifier = NotificationDispatcher::new(Arc::new(ResendMailer::new(config.email.clone())));
    let machine = Arc::new(SubscriptionStateMachine::new(
        subscriptions.clone(),
        companies.clone(),
        payments.clone(),
        notifier.clone(),
    ));

    let state = BillingAppState {
        subscriptions,
        companies,
        payments,
        ledger,
        paypal,
        mercadopago,
        mp_verifier,
        machine,
        notifier,
        jwt: Arc::new(JwtVerifier::new(&config.auth)),
        cron: config.cron.clone(),
        urls: CheckoutUrls {
            mp_back_url: config.server.public_url("/facturacion/confirmacion"),
            paypal_return_url: config.server.public_url("/facturacion/paypal/confirmada"),
            paypal_cancel_url: config.server.public_url("/facturacion/paypal/cancelada"),
        },
    };

    let app = billing_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.server.socket_addr();
    tracing::info!(%addr, "Aula Segura billing backend listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone()));

    let registry = tracing_subscriber::registry().with(filter);
    if config.is_production() {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
