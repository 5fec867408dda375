//! MercadoPago gateway client.
//!
//! Implements [`MercadoPagoGateway`] against the MercadoPago REST API with
//! a static long-lived access token (no refresh flow) and the shared retry
//! policy. Mutating calls carry an `X-Idempotency-Key` header.

use async_trait::async_trait;
use reqwest::Method;
use secrecy::ExposeSecret;
use serde_json::json;

use crate::adapters::gateway::RetryPolicy;
use crate::config::MercadoPagoConfig;
use crate::domain::billing::{MpPaymentSnapshot, PreapprovalSnapshot};
use crate::ports::{
    CreatePreapprovalRequest, GatewayError, MercadoPagoGateway, PreapprovalUpdate,
};

use super::types::{MpErrorBody, PaymentResponse, PreapprovalResponse};

/// MercadoPago REST API client.
pub struct MercadoPagoClient {
    config: MercadoPagoConfig,
    base_url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl MercadoPagoClient {
    pub fn new(config: MercadoPagoConfig) -> Self {
        let base_url = config.api_base_url().to_string();
        Self {
            config,
            base_url,
            http: reqwest::Client::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides the API base URL (for tests against a local stub).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Authenticated JSON call under the retry policy.
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        idempotency_key: Option<&str>,
    ) -> Result<serde_json::Value, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        let operation = format!("mercadopago {} {}", method, path);

        self.retry
            .execute(&operation, |_attempt| {
                let url = url.clone();
                let method = method.clone();
                let body = body.clone();
                async move {
                    let mut request = self
                        .http
                        .request(method, &url)
                        .bearer_auth(self.config.access_token.expose_secret());
                    if let Some(key) = idempotency_key {
                        request = request.header("X-Idempotency-Key", key);
                    }
                    if let Some(body) = &body {
                        request = request.json(body);
                    }

                    let response = request
                        .send()
                        .await
                        .map_err(|e| GatewayError::Transport(e.to_string()))?;

                    let status = response.status();
                    let text = response
                        .text()
                        .await
                        .map_err(|e| GatewayError::Transport(e.to_string()))?;

                    if status.is_success() {
                        if text.is_empty() {
                            return Ok(serde_json::Value::Null);
                        }
                        return serde_json::from_str(&text)
                            .map_err(|e| GatewayError::Decode(e.to_string()));
                    }

                    let parsed: MpErrorBody = serde_json::from_str(&text).unwrap_or_default();
                    let mut err = GatewayError::provider(
                        status.as_u16(),
                        parsed.message.unwrap_or(text),
                    );
                    if let Some(code) = parsed.error {
                        err = err.with_code(code);
                    }
                    Err(err)
                }
            })
            .await
    }

    fn decode_preapproval(
        value: serde_json::Value,
    ) -> Result<PreapprovalSnapshot, GatewayError> {
        let response: PreapprovalResponse = serde_json::from_value(value)
            .map_err(|e| GatewayError::Decode(format!("invalid preapproval response: {}", e)))?;
        Ok(response.into_snapshot())
    }
}

#[async_trait]
impl MercadoPagoGateway for MercadoPagoClient {
    async fn create_preapproval(
        &self,
        request: CreatePreapprovalRequest,
    ) -> Result<PreapprovalSnapshot, GatewayError> {
        let mut body = json!({
            "reason": request.reason,
            "external_reference": request.external_reference,
            "payer_email": request.payer_email,
            "back_url": request.back_url,
            "auto_recurring": {
                "frequency": 1,
                "frequency_type": "months",
                "transaction_amount": request.amount,
                "currency_id": request.currency,
            },
        });

        // With a card token the first charge is attempted synchronously and
        // the preapproval is requested already authorized.
        if let Some(token) = &request.card_token_id {
            body["card_token_id"] = json!(token);
            body["status"] = json!("authorized");
        }

        let value = self
            .call(
                Method::POST,
                "/preapproval",
                Some(body),
                Some(&request.idempotency_key),
            )
            .await?;

        Self::decode_preapproval(value)
    }

    async fn get_preapproval(
        &self,
        preapproval_id: &str,
    ) -> Result<PreapprovalSnapshot, GatewayError> {
        let path = format!("/preapproval/{}", preapproval_id);
        let value = self.call(Method::GET, &path, None, None).await?;
        Self::decode_preapproval(value)
    }

    async fn update_preapproval(
        &self,
        preapproval_id: &str,
        update: PreapprovalUpdate,
        idempotency_key: &str,
    ) -> Result<PreapprovalSnapshot, GatewayError> {
        let mut body = json!({});
        if let Some(status) = &update.status {
            body["status"] = json!(status);
        }
        if let Some(amount) = update.transaction_amount {
            body["auto_recurring"] = json!({ "transaction_amount": amount });
        }
        if let Some(token) = &update.card_token_id {
            body["card_token_id"] = json!(token);
        }

        let path = format!("/preapproval/{}", preapproval_id);
        let value = self
            .call(Method::PUT, &path, Some(body), Some(idempotency_key))
            .await?;
        Self::decode_preapproval(value)
    }

    async fn get_payment(&self, payment_id: &str) -> Result<MpPaymentSnapshot, GatewayError> {
        let path = format!("/v1/payments/{}", payment_id);
        let value = self.call(Method::GET, &path, None, None).await?;

        let response: PaymentResponse = serde_json::from_value(value.clone())
            .map_err(|e| GatewayError::Decode(format!("invalid payment response: {}", e)))?;
        Ok(response.into_snapshot(value))
    }
}
