//! Shared error type for payment gateway ports.

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Errors from provider gateway operations.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The provider rejected the request (HTTP status < 500, ≠ 429).
    ///
    /// Carries the provider's error code, message, and debug id verbatim so
    /// user-facing flows can surface them unchanged.
    #[error("Provider error {status}: {message}")]
    Provider {
        status: u16,
        code: Option<String>,
        message: String,
        debug_id: Option<String>,
    },

    /// Network-level failure before an HTTP status was obtained.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The provider replied with a shape we could not decode.
    #[error("Unexpected response shape: {0}")]
    Decode(String),

    /// Could not obtain/refresh provider credentials.
    #[error("Authentication with provider failed: {0}")]
    Auth(String),
}

impl GatewayError {
    /// Builds a provider error from status and body fields.
    pub fn provider(status: u16, message: impl Into<String>) -> Self {
        GatewayError::Provider {
            status,
            code: None,
            message: message.into(),
            debug_id: None,
        }
    }

    /// Attaches the provider's error code.
    pub fn with_code(mut self, value: impl Into<String>) -> Self {
        if let GatewayError::Provider { code, .. } = &mut self {
            *code = Some(value.into());
        }
        self
    }

    /// Attaches the provider's debug id.
    pub fn with_debug_id(mut self, value: impl Into<String>) -> Self {
        if let GatewayError::Provider { debug_id, .. } = &mut self {
            *debug_id = Some(value.into());
        }
        self
    }

    /// True when the gateway retry policy should attempt the call again:
    /// HTTP 5xx, HTTP 429, or transport failures. Other 4xx are permanent
    /// client errors and surface immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Provider { status, .. } => *status >= 500 || *status == 429,
            GatewayError::Transport(_) => true,
            GatewayError::Decode(_) | GatewayError::Auth(_) => false,
        }
    }
}

impl From<GatewayError> for DomainError {
    fn from(err: GatewayError) -> Self {
        let code = match &err {
            GatewayError::Provider { status: 429, .. } => ErrorCode::RateLimited,
            GatewayError::Provider { status, .. } if *status < 500 => ErrorCode::PaymentRequired,
            _ => ErrorCode::ExternalServiceError,
        };
        let mut domain = DomainError::new(code, err.to_string());
        if let GatewayError::Provider {
            code: Some(provider_code),
            debug_id,
            ..
        } = &err
        {
            domain = domain.with_detail("providerCode", provider_code.clone());
            if let Some(id) = debug_id {
                domain = domain.with_detail("debugId", id.clone());
            }
        }
        domain
    }
}
