//! Axum router for billing endpoints.
//!
//! Webhook and CRON endpoints carry their own authentication (payload
//! signature / bearer secret); user endpoints require a JWT and verify
//! company ownership in their handlers.

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{
    activate_subscription, create_subscription, cron_check_subscriptions, health,
    manage_subscription, mp_create_subscription, mp_get_subscription_status,
    mp_manage_subscription, webhook_mercadopago, webhook_paypal, BillingAppState,
};

/// Create the complete billing router.
///
/// # Routes
///
/// ## Webhooks (signature-verified, no JWT)
/// - `POST /webhook-paypal`
/// - `POST /webhook-mercadopago`
///
/// ## User endpoints (JWT + ownership)
/// - `POST /mp-create-subscription`
/// - `POST /mp-manage-subscription`
/// - `POST /mp-get-subscription-status`
/// - `POST /activate-subscription`
/// - `POST /create-subscription`
/// - `POST /manage-subscription`
///
/// ## Operational
/// - `POST /cron-check-subscriptions` (CRON bearer secret)
/// - `GET /health`
pub fn billing_router() -> Router<BillingAppState> {
    Router::new()
        // Webhooks
        .route("/webhook-paypal", post(webhook_paypal))
        .route("/webhook-mercadopago", post(webhook_mercadopago))
        // User endpoints
        .route("/mp-create-subscription", post(mp_create_subscription))
        .route("/mp-manage-subscription", post(mp_manage_subscription))
        .route(
            "/mp-get-subscription-status",
            post(mp_get_subscription_status),
        )
        .route("/activate-subscription", post(activate_subscription))
        .route("/create-subscription", post(create_subscription))
        .route("/manage-subscription", post(manage_subscription))
        // Operational
        .route("/cron-check-subscriptions", post(cron_check_subscriptions))
        .route("/health", get(health))
}
