//! HTTP handlers for billing endpoints.
//!
//! Thin axum glue: extract/validate the request, build the application
//! handler from shared state, and map results/errors onto each endpoint's
//! wire shape. Webhook endpoints always acknowledge with 200 except on
//! signature failure (401), so providers never blind-retry payloads we
//! cannot process.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Json, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::application::handlers::billing::{
    ActivateSubscriptionCommand, ActivateSubscriptionHandler, ChangePayPalPlanHandler,
    CreateMpSubscriptionCommand, CreateMpSubscriptionHandler, CreateSubscriptionCommand,
    CreateSubscriptionHandler, GetMpSubscriptionStatusCommand, GetMpSubscriptionStatusHandler,
    ManageMpSubscriptionCommand, ManageMpSubscriptionHandler, ManageSubscriptionCommand,
    ManageSubscriptionHandler, NotificationDispatcher, PayPalCheckoutUrls, PayPalWebhookHeaders,
    ProcessMpWebhookCommand, ProcessMpWebhookHandler, ProcessPayPalWebhookCommand,
    ProcessPayPalWebhookHandler, ReconcileSubscriptionsHandler, SubscriptionStateMachine,
    WebhookAck,
};
use crate::config::CronConfig;
use crate::domain::billing::{MpSignatureVerifier, PlanKey};
use crate::domain::foundation::{CompanyId, DomainError, ErrorCode};
use crate::ports::{
    CompanyRepository, MercadoPagoGateway, PayPalGateway, PaymentTransactionRepository,
    SubscriptionRepository, WebhookEventLedger,
};

use super::super::middleware::{AuthenticatedUser, HasJwtVerifier, JwtVerifier};
use super::dto::{
    ActivateSubscriptionRequest, ActivateSubscriptionResponse, CreateSubscriptionRequest,
    CreateSubscriptionResponse, ErrorResponse, ManageSubscriptionRequest,
    ManageSubscriptionResponse, MpCreateSubscriptionRequest, MpCreateSubscriptionResponse,
    MpGetSubscriptionStatusRequest, MpGetSubscriptionStatusResponse, MpManageSubscriptionRequest,
    MpManageSubscriptionResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// URLs the checkout flows hand to the providers.
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    /// MercadoPago back_url.
    pub mp_back_url: String,
    /// PayPal approval return/cancel.
    pub paypal_return_url: String,
    pub paypal_cancel_url: String,
}

/// Shared application state containing all billing dependencies.
#[derive(Clone)]
pub struct BillingAppState {
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub companies: Arc<dyn CompanyRepository>,
    pub payments: Arc<dyn PaymentTransactionRepository>,
    pub ledger: Arc<dyn WebhookEventLedger>,
    pub paypal: Arc<dyn PayPalGateway>,
    pub mercadopago: Arc<dyn MercadoPagoGateway>,
    pub mp_verifier: Arc<MpSignatureVerifier>,
    pub machine: Arc<SubscriptionStateMachine>,
    pub notifier: NotificationDispatcher,
    pub jwt: Arc<JwtVerifier>,
    pub cron: CronConfig,
    pub urls: CheckoutUrls,
}

impl HasJwtVerifier for BillingAppState {
    fn jwt_verifier(&self) -> &Arc<JwtVerifier> {
        &self.jwt
    }
}

impl BillingAppState {
    fn paypal_webhook_handler(&self) -> ProcessPayPalWebhookHandler {
        ProcessPayPalWebhookHandler::new(
            self.paypal.clone(),
            self.ledger.clone(),
            self.subscriptions.clone(),
            self.machine.clone(),
        )
    }

    fn mp_webhook_handler(&self) -> ProcessMpWebhookHandler {
        ProcessMpWebhookHandler::new(
            self.mp_verifier.clone(),
            self.mercadopago.clone(),
            self.subscriptions.clone(),
            self.machine.clone(),
        )
    }

    fn mp_create_handler(&self) -> CreateMpSubscriptionHandler {
        CreateMpSubscriptionHandler::new(
            self.companies.clone(),
            self.subscriptions.clone(),
            self.mercadopago.clone(),
            self.machine.clone(),
            self.urls.mp_back_url.clone(),
        )
    }

    fn create_handler(&self) -> CreateSubscriptionHandler {
        CreateSubscriptionHandler::new(
            self.companies.clone(),
            self.subscriptions.clone(),
            self.mercadopago.clone(),
            self.machine.clone(),
            self.urls.mp_back_url.clone(),
        )
    }

    fn mp_manage_handler(&self) -> Arc<ManageMpSubscriptionHandler> {
        Arc::new(ManageMpSubscriptionHandler::new(
            self.companies.clone(),
            self.subscriptions.clone(),
            self.mercadopago.clone(),
            self.machine.clone(),
            self.notifier.clone(),
        ))
    }

    fn paypal_plan_change_handler(&self) -> Arc<ChangePayPalPlanHandler> {
        Arc::new(ChangePayPalPlanHandler::new(
            self.companies.clone(),
            self.subscriptions.clone(),
            self.paypal.clone(),
            self.machine.clone(),
            PayPalCheckoutUrls {
                return_url: self.urls.paypal_return_url.clone(),
                cancel_url: self.urls.paypal_cancel_url.clone(),
            },
        ))
    }

    fn manage_handler(&self) -> ManageSubscriptionHandler {
        ManageSubscriptionHandler::new(
            self.companies.clone(),
            self.subscriptions.clone(),
            self.paypal.clone(),
            self.machine.clone(),
            self.paypal_plan_change_handler(),
            self.mp_manage_handler(),
        )
    }

    fn activate_handler(&self) -> ActivateSubscriptionHandler {
        ActivateSubscriptionHandler::new(
            self.companies.clone(),
            self.subscriptions.clone(),
            self.paypal.clone(),
            self.machine.clone(),
        )
    }

    fn status_handler(&self) -> GetMpSubscriptionStatusHandler {
        GetMpSubscriptionStatusHandler::new(
            self.companies.clone(),
            self.subscriptions.clone(),
            self.mercadopago.clone(),
        )
    }

    fn reconcile_handler(&self) -> ReconcileSubscriptionsHandler {
        ReconcileSubscriptionsHandler::new(
            self.subscriptions.clone(),
            self.mercadopago.clone(),
            self.machine.clone(),
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Error mapping
// ════════════════════════════════════════════════════════════════════════════════

/// DomainError wrapper that knows its HTTP representation.
pub struct BillingApiError(pub DomainError);

impl From<DomainError> for BillingApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for BillingApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = match err.code {
            ErrorCode::ValidationFailed
            | ErrorCode::EmptyField
            | ErrorCode::InvalidFormat
            | ErrorCode::InvalidPlan
            | ErrorCode::PaymentRequired => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::SubscriptionNotFound
            | ErrorCode::CompanyNotFound
            | ErrorCode::TransactionNotFound => StatusCode::NOT_FOUND,
            ErrorCode::SubscriptionExists => StatusCode::CONFLICT,
            ErrorCode::RateLimited
            | ErrorCode::ExternalServiceError
            | ErrorCode::InvalidStateTransition
            | ErrorCode::DatabaseError
            | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %err, "Billing endpoint failed");
        }

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Transient provider/storage detail stays in the logs.
            "No pudimos procesar la solicitud, volvé a intentar en unos minutos".to_string()
        } else {
            err.message.clone()
        };

        let body = ErrorResponse::new(err.code.to_string(), message)
            .with_details(err.details.clone().into_iter().collect());
        (status, Json(body)).into_response()
    }
}

fn parse_company_id(value: &str) -> Result<CompanyId, BillingApiError> {
    CompanyId::from_str(value).map_err(|_| {
        BillingApiError(DomainError::validation(
            "companyId",
            "El identificador de la institución no es válido",
        ))
    })
}

fn parse_plan_key(value: &str) -> Result<PlanKey, BillingApiError> {
    PlanKey::parse(value).map_err(BillingApiError)
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook endpoints
// ════════════════════════════════════════════════════════════════════════════════

fn invalid_signature() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"error": "INVALID_SIGNATURE"})),
    )
        .into_response()
}

/// POST /webhook-paypal
pub async fn webhook_paypal(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };

    // All five transmission headers are required for verification.
    let (auth_algo, cert_url, transmission_id, transmission_sig, transmission_time) = match (
        header("paypal-auth-algo"),
        header("paypal-cert-url"),
        header("paypal-transmission-id"),
        header("paypal-transmission-sig"),
        header("paypal-transmission-time"),
    ) {
        (Some(a), Some(c), Some(i), Some(s), Some(t)) => (a, c, i, s, t),
        _ => {
            tracing::warn!("PayPal webhook missing transmission headers");
            return invalid_signature();
        }
    };

    let result = state
        .paypal_webhook_handler()
        .handle(ProcessPayPalWebhookCommand {
            headers: PayPalWebhookHeaders {
                auth_algo,
                cert_url,
                transmission_id,
                transmission_sig,
                transmission_time,
            },
            body,
        })
        .await;

    match result {
        Ok(WebhookAck::Processed) => {
            (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
        }
        Ok(WebhookAck::AlreadyProcessed) => (
            StatusCode::OK,
            Json(serde_json::json!({"status": "already_processed"})),
        )
            .into_response(),
        Err(err) => {
            if err.status_code() == StatusCode::UNAUTHORIZED {
                return invalid_signature();
            }
            // Acknowledged despite the failure; evidence lives in the ledger.
            tracing::warn!(error = %err, "PayPal webhook processing failed; acknowledging");
            (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
        }
    }
}

/// POST /webhook-mercadopago
pub async fn webhook_mercadopago(
    State(state): State<BillingAppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let result = state
        .mp_webhook_handler()
        .handle(ProcessMpWebhookCommand {
            x_signature: headers
                .get("x-signature")
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            x_request_id: headers
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            data_id_query: query.get("data.id").cloned(),
            body,
        })
        .await;

    match result {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({"received": true}))).into_response(),
        Err(err) => {
            if err.status_code() == StatusCode::UNAUTHORIZED {
                return invalid_signature();
            }
            // Always 200 on internal errors to prevent provider retry storms.
            tracing::warn!(error = %err, "MercadoPago webhook processing failed; acknowledging");
            (StatusCode::OK, Json(serde_json::json!({"received": true}))).into_response()
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// User-initiated endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// POST /mp-create-subscription
pub async fn mp_create_subscription(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<MpCreateSubscriptionRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let result = state
        .mp_create_handler()
        .handle(CreateMpSubscriptionCommand {
            user_id: user.user_id,
            company_id: parse_company_id(&request.company_id)?,
            plan_key: parse_plan_key(&request.plan_key)?,
            card_token_id: request.card_token_id,
            payer_email: request.payer_email,
        })
        .await?;

    Ok(Json(MpCreateSubscriptionResponse {
        success: true,
        subscription_id: result.subscription_id,
        status: result.status,
    }))
}

/// POST /mp-manage-subscription
pub async fn mp_manage_subscription(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<MpManageSubscriptionRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let new_plan_key = request
        .new_plan_key
        .as_deref()
        .map(parse_plan_key)
        .transpose()?;

    let result = state
        .mp_manage_handler()
        .handle(ManageMpSubscriptionCommand {
            user_id: user.user_id,
            action: request.action,
            mp_preapproval_id: request.mp_preapproval_id,
            new_plan_key,
            card_token_id: request.card_token_id,
            reason: request.reason,
        })
        .await?;

    Ok(Json(MpManageSubscriptionResponse {
        success: true,
        action: result.action,
        status: result.status,
    }))
}

/// POST /mp-get-subscription-status
pub async fn mp_get_subscription_status(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<MpGetSubscriptionStatusRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let status = state
        .status_handler()
        .handle(GetMpSubscriptionStatusCommand {
            user_id: user.user_id,
            mp_preapproval_id: request.mp_preapproval_id,
        })
        .await?;

    Ok(Json(MpGetSubscriptionStatusResponse {
        success: true,
        status: status.status,
        next_payment_date: status.next_payment_date.map(|d| d.to_rfc3339()),
        card_last_four: status.card_last_four,
    }))
}

/// POST /activate-subscription
pub async fn activate_subscription(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<ActivateSubscriptionRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let result = state
        .activate_handler()
        .handle(ActivateSubscriptionCommand {
            user_id: user.user_id,
            company_id: parse_company_id(&request.company_id)?,
            subscription_id: request.subscription_id,
            old_plan_name: request.old_plan_name,
        })
        .await?;

    Ok(Json(ActivateSubscriptionResponse {
        success: result.activated,
        status: result.status,
    }))
}

/// POST /create-subscription
pub async fn create_subscription(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let result = state
        .create_handler()
        .handle(CreateSubscriptionCommand {
            user_id: user.user_id,
            company_id: parse_company_id(&request.company_id)?,
            plan_key: parse_plan_key(&request.plan_key)?,
            payer_email: request.payer_email,
            client_amount: request.amount,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSubscriptionResponse {
            success: true,
            subscription_id: result.subscription_id,
            status: result.status,
            approval_url: result.approval_url,
        }),
    ))
}

/// POST /manage-subscription
pub async fn manage_subscription(
    State(state): State<BillingAppState>,
    user: AuthenticatedUser,
    Json(request): Json<ManageSubscriptionRequest>,
) -> Result<impl IntoResponse, BillingApiError> {
    let new_plan_key = request
        .new_plan_key
        .as_deref()
        .map(parse_plan_key)
        .transpose()?;

    let result = state
        .manage_handler()
        .handle(ManageSubscriptionCommand {
            user_id: user.user_id,
            company_id: parse_company_id(&request.company_id)?,
            action: request.action,
            new_plan_key,
        })
        .await?;

    Ok(Json(ManageSubscriptionResponse {
        success: true,
        action: result.action,
        status: result.status,
        approval_url: result.approval_url,
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// CRON endpoint
// ════════════════════════════════════════════════════════════════════════════════

/// POST /cron-check-subscriptions
pub async fn cron_check_subscriptions(
    State(state): State<BillingAppState>,
    headers: HeaderMap,
) -> Response {
    let presented = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match presented {
        Some(secret) if state.cron.matches(secret) => {}
        _ => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("UNAUTHORIZED", "Invalid CRON secret")),
            )
                .into_response();
        }
    }

    match state.reconcile_handler().handle().await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => BillingApiError(err).into_response(),
    }
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}
