//! HTTP DTOs for billing endpoints.
//!
//! These types define the JSON request/response structure of the billing
//! API. Field names follow the providers' camelCase convention on the wire.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::application::handlers::billing::{CompanyAction, ManageAction};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// `POST /mp-create-subscription`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MpCreateSubscriptionRequest {
    pub plan_key: String,
    pub company_id: String,
    pub card_token_id: String,
    pub payer_email: String,
}

/// `POST /mp-manage-subscription`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MpManageSubscriptionRequest {
    pub action: ManageAction,
    pub mp_preapproval_id: String,
    #[serde(default)]
    pub new_plan_key: Option<String>,
    #[serde(default)]
    pub card_token_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// `POST /mp-get-subscription-status`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MpGetSubscriptionStatusRequest {
    pub mp_preapproval_id: String,
}

/// `POST /activate-subscription` (PayPal)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateSubscriptionRequest {
    pub subscription_id: String,
    pub company_id: String,
    #[serde(default)]
    pub old_plan_name: Option<String>,
}

/// `POST /create-subscription` (preapproval-plan variant)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    pub plan_key: String,
    pub company_id: String,
    pub payer_email: String,
    /// Client-submitted amount; logged on mismatch, never trusted over the
    /// server price table.
    #[serde(default)]
    pub amount: Option<f64>,
}

/// `POST /manage-subscription` (company-level variant)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageSubscriptionRequest {
    pub action: CompanyAction,
    pub company_id: String,
    #[serde(default)]
    pub new_plan_key: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// `POST /mp-create-subscription` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MpCreateSubscriptionResponse {
    pub success: bool,
    pub subscription_id: String,
    pub status: String,
}

/// `POST /mp-manage-subscription` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MpManageSubscriptionResponse {
    pub success: bool,
    pub action: ManageAction,
    pub status: String,
}

/// `POST /mp-get-subscription-status` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MpGetSubscriptionStatusResponse {
    pub success: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_payment_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_last_four: Option<String>,
}

/// `POST /activate-subscription` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateSubscriptionResponse {
    pub success: bool,
    pub status: String,
}

/// `POST /create-subscription` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionResponse {
    pub success: bool,
    pub subscription_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_url: Option<String>,
}

/// `POST /manage-subscription` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageSubscriptionResponse {
    pub success: bool,
    pub action: CompanyAction,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_url: Option<String>,
}

/// Structured error payload.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, String>>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: HashMap<String, String>) -> Self {
        if !details.is_empty() {
            self.details = Some(details);
        }
        self
    }
}
