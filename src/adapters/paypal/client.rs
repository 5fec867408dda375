//! PayPal gateway client.
//!
//! Implements [`PayPalGateway`] against the PayPal REST API. Every call
//! attaches a bearer token from the OAuth client-credentials flow (cached
//! in [`TokenCache`]) and runs under the shared retry policy. 4xx responses
//! other than 429 surface the provider's error name/message/debug id
//! verbatim.

use async_trait::async_trait;
use reqwest::Method;
use secrecy::ExposeSecret;
use serde_json::json;

use crate::adapters::gateway::RetryPolicy;
use crate::config::PayPalConfig;
use crate::domain::billing::{PayPalSubscriptionDetails, PlanKey};
use crate::ports::{
    CreatePayPalSubscriptionRequest, CreatedPayPalSubscription, GatewayError, PayPalGateway,
    PayPalWebhookVerification,
};

use super::token_cache::{CachedToken, TokenCache};
use super::types::{
    OAuthTokenResponse, PayPalErrorBody, SubscriptionResponse, VerifySignatureResponse,
};

/// PayPal REST API client.
pub struct PayPalClient {
    config: PayPalConfig,
    base_url: String,
    http: reqwest::Client,
    token_cache: TokenCache,
    retry: RetryPolicy,
}

impl PayPalClient {
    pub fn new(config: PayPalConfig) -> Self {
        let base_url = config.api_base_url().to_string();
        Self {
            config,
            base_url,
            http: reqwest::Client::new(),
            token_cache: TokenCache::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides the API base URL (for tests against a local stub).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// PayPal billing-plan id for one of our plan keys.
    fn plan_id_for(&self, key: PlanKey) -> Result<&str, GatewayError> {
        let configured = match key {
            PlanKey::Basic => self.config.basic_plan_id.as_deref(),
            PlanKey::Standard => self.config.standard_plan_id.as_deref(),
            PlanKey::Premium => self.config.premium_plan_id.as_deref(),
        };
        configured.ok_or_else(|| {
            GatewayError::Decode(format!("no PayPal billing plan configured for {}", key))
        })
    }

    /// Runs the client-credentials flow once.
    async fn fetch_token(&self) -> Result<CachedToken, GatewayError> {
        let url = format!("{}/v1/oauth2/token", self.base_url);
        let response = self
            .http
            .post(&url)
            .basic_auth(
                &self.config.client_id,
                Some(self.config.client_secret.expose_secret()),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Auth(format!(
                "token request failed with {}: {}",
                status, body
            )));
        }

        let token: OAuthTokenResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(format!("invalid token response: {}", e)))?;

        Ok(CachedToken {
            value: token.access_token,
            expires_at: chrono::Utc::now() + chrono::Duration::seconds(token.expires_in),
        })
    }

    /// Authenticated JSON call under the retry policy.
    ///
    /// Returns the parsed response body, or `Null` for empty 2xx replies.
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        idempotency_key: Option<&str>,
    ) -> Result<serde_json::Value, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        let operation = format!("paypal {} {}", method, path);

        self.retry
            .execute(&operation, |_attempt| {
                let url = url.clone();
                let method = method.clone();
                let body = body.clone();
                async move {
                    let token = self
                        .token_cache
                        .get_valid_token(|| self.fetch_token())
                        .await?;

                    let mut request = self.http.request(method, &url).bearer_auth(token);
                    if let Some(key) = idempotency_key {
                        request = request.header("PayPal-Request-Id", key);
                    }
                    if let Some(body) = &body {
                        request = request.json(body);
                    }

                    let response = request
                        .send()
                        .await
                        .map_err(|e| GatewayError::Transport(e.to_string()))?;

                    let status = response.status();
                    if status.is_success() {
                        if status == reqwest::StatusCode::NO_CONTENT {
                            return Ok(serde_json::Value::Null);
                        }
                        let text = response
                            .text()
                            .await
                            .map_err(|e| GatewayError::Transport(e.to_string()))?;
                        if text.is_empty() {
                            return Ok(serde_json::Value::Null);
                        }
                        return serde_json::from_str(&text)
                            .map_err(|e| GatewayError::Decode(e.to_string()));
                    }

                    let status_code = status.as_u16();
                    let text = response.text().await.unwrap_or_default();
                    let parsed: PayPalErrorBody =
                        serde_json::from_str(&text).unwrap_or_default();

                    let mut err = GatewayError::provider(
                        status_code,
                        parsed.message.unwrap_or(text),
                    );
                    if let Some(name) = parsed.name {
                        err = err.with_code(name);
                    }
                    if let Some(debug_id) = parsed.debug_id {
                        err = err.with_debug_id(debug_id);
                    }
                    Err(err)
                }
            })
            .await
    }
}

#[async_trait]
impl PayPalGateway for PayPalClient {
    async fn create_subscription(
        &self,
        request: CreatePayPalSubscriptionRequest,
    ) -> Result<CreatedPayPalSubscription, GatewayError> {
        let plan_id = self.plan_id_for(request.plan_key)?.to_string();
        let body = json!({
            "plan_id": plan_id,
            "custom_id": request.external_reference,
            "application_context": {
                "return_url": request.return_url,
                "cancel_url": request.cancel_url,
                "user_action": "SUBSCRIBE_NOW",
            },
        });

        let value = self
            .call(
                Method::POST,
                "/v1/billing/subscriptions",
                Some(body),
                Some(&request.idempotency_key),
            )
            .await?;

        let response: SubscriptionResponse = serde_json::from_value(value)
            .map_err(|e| GatewayError::Decode(format!("invalid subscription response: {}", e)))?;

        let approval_url = response.approval_url();
        Ok(CreatedPayPalSubscription {
            id: response.id,
            status: response.status,
            approval_url,
        })
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<PayPalSubscriptionDetails, GatewayError> {
        let path = format!("/v1/billing/subscriptions/{}", subscription_id);
        let value = self.call(Method::GET, &path, None, None).await?;

        let response: SubscriptionResponse = serde_json::from_value(value)
            .map_err(|e| GatewayError::Decode(format!("invalid subscription response: {}", e)))?;

        Ok(response.into_details())
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
        reason: &str,
        idempotency_key: &str,
    ) -> Result<(), GatewayError> {
        let path = format!("/v1/billing/subscriptions/{}/cancel", subscription_id);
        self.call(
            Method::POST,
            &path,
            Some(json!({ "reason": reason })),
            Some(idempotency_key),
        )
        .await?;
        Ok(())
    }

    async fn verify_webhook_signature(
        &self,
        verification: PayPalWebhookVerification,
    ) -> Result<bool, GatewayError> {
        let body = json!({
            "auth_algo": verification.auth_algo,
            "cert_url": verification.cert_url,
            "transmission_id": verification.transmission_id,
            "transmission_sig": verification.transmission_sig,
            "transmission_time": verification.transmission_time,
            "webhook_id": self.config.webhook_id,
            "webhook_event": verification.webhook_event,
        });

        let value = self
            .call(
                Method::POST,
                "/v1/notifications/verify-webhook-signature",
                Some(body),
                None,
            )
            .await?;

        let response: VerifySignatureResponse = serde_json::from_value(value)
            .map_err(|e| GatewayError::Decode(format!("invalid verify response: {}", e)))?;

        // Trust this field exclusively; anything but SUCCESS rejects.
        Ok(response.verification_status == "SUCCESS")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn test_config() -> PayPalConfig {
        PayPalConfig {
            client_id: "client".to_string(),
            client_secret: SecretString::new("secret".to_string()),
            webhook_id: "WH-ID".to_string(),
            standard_plan_id: Some("P-STD".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn plan_id_resolves_configured_plans() {
        let client = PayPalClient::new(test_config());
        assert_eq!(client.plan_id_for(PlanKey::Standard).unwrap(), "P-STD");
    }

    #[test]
    fn plan_id_fails_for_unconfigured_plans() {
        let client = PayPalClient::new(test_config());
        assert!(client.plan_id_for(PlanKey::Premium).is_err());
    }

    #[test]
    fn base_url_override_applies() {
        let client = PayPalClient::new(test_config()).with_base_url("http://localhost:9999");
        assert_eq!(client.base_url, "http://localhost:9999");
    }
}
