//! Mock PayPal gateway for tests and local development.
//!
//! Scriptable responses with call counters, so tests can assert how the
//! orchestrators drive the provider (e.g. cancel succeeded but create blew
//! up mid-plan-change).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::billing::PayPalSubscriptionDetails;
use crate::ports::{
    CreatePayPalSubscriptionRequest, CreatedPayPalSubscription, GatewayError, PayPalGateway,
    PayPalWebhookVerification,
};

/// Configurable mock implementation of [`PayPalGateway`].
#[derive(Default)]
pub struct MockPayPalGateway {
    pub create_result: Mutex<Option<Result<CreatedPayPalSubscription, GatewayError>>>,
    pub get_result: Mutex<Option<Result<PayPalSubscriptionDetails, GatewayError>>>,
    pub cancel_result: Mutex<Option<Result<(), GatewayError>>>,
    pub verify_result: Mutex<Option<Result<bool, GatewayError>>>,

    pub create_calls: AtomicU32,
    pub get_calls: AtomicU32,
    pub cancel_calls: AtomicU32,
    pub verify_calls: AtomicU32,
}

impl MockPayPalGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock that verifies every webhook and activates every subscription.
    pub fn happy(subscription_id: &str) -> Self {
        let mock = Self::new();
        *mock.create_result.lock().unwrap() = Some(Ok(CreatedPayPalSubscription {
            id: subscription_id.to_string(),
            status: "APPROVAL_PENDING".to_string(),
            approval_url: Some(format!(
                "https://www.sandbox.paypal.com/webapps/billing/subscriptions?ba_token={}",
                subscription_id
            )),
        }));
        *mock.get_result.lock().unwrap() = Some(Ok(PayPalSubscriptionDetails {
            provider_subscription_id: subscription_id.to_string(),
            status: Some("ACTIVE".to_string()),
            payer_email: Some("pagador@escuela.edu.ar".to_string()),
            next_billing_time: Some(chrono::Utc::now() + chrono::Duration::days(30)),
        }));
        *mock.cancel_result.lock().unwrap() = Some(Ok(()));
        *mock.verify_result.lock().unwrap() = Some(Ok(true));
        mock
    }

    pub fn set_create(&self, result: Result<CreatedPayPalSubscription, GatewayError>) {
        *self.create_result.lock().unwrap() = Some(result);
    }

    pub fn set_get(&self, result: Result<PayPalSubscriptionDetails, GatewayError>) {
        *self.get_result.lock().unwrap() = Some(result);
    }

    pub fn set_cancel(&self, result: Result<(), GatewayError>) {
        *self.cancel_result.lock().unwrap() = Some(result);
    }

    pub fn set_verify(&self, result: Result<bool, GatewayError>) {
        *self.verify_result.lock().unwrap() = Some(result);
    }

    fn take_or_default<T: Clone>(
        slot: &Mutex<Option<Result<T, GatewayError>>>,
        missing: &str,
    ) -> Result<T, GatewayError> {
        slot.lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(GatewayError::Transport(format!("mock {} unset", missing))))
    }
}

#[async_trait]
impl PayPalGateway for MockPayPalGateway {
    async fn create_subscription(
        &self,
        _request: CreatePayPalSubscriptionRequest,
    ) -> Result<CreatedPayPalSubscription, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Self::take_or_default(&self.create_result, "create_subscription")
    }

    async fn get_subscription(
        &self,
        _subscription_id: &str,
    ) -> Result<PayPalSubscriptionDetails, GatewayError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Self::take_or_default(&self.get_result, "get_subscription")
    }

    async fn cancel_subscription(
        &self,
        _subscription_id: &str,
        _reason: &str,
        _idempotency_key: &str,
    ) -> Result<(), GatewayError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Self::take_or_default(&self.cancel_result, "cancel_subscription")
    }

    async fn verify_webhook_signature(
        &self,
        _verification: PayPalWebhookVerification,
    ) -> Result<bool, GatewayError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        Self::take_or_default(&self.verify_result, "verify_webhook_signature")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn happy_mock_verifies_and_activates() {
        let mock = MockPayPalGateway::happy("I-ABC");

        let verified = mock
            .verify_webhook_signature(PayPalWebhookVerification {
                auth_algo: "SHA256withRSA".to_string(),
                cert_url: "https://api.paypal.com/cert".to_string(),
                transmission_id: "t-1".to_string(),
                transmission_sig: "sig".to_string(),
                transmission_time: "2026-01-10T12:00:00Z".to_string(),
                webhook_event: serde_json::json!({}),
            })
            .await
            .unwrap();
        assert!(verified);

        let details = mock.get_subscription("I-ABC").await.unwrap();
        assert_eq!(details.status.as_deref(), Some("ACTIVE"));
        assert_eq!(mock.get_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unset_slots_error_instead_of_panicking() {
        let mock = MockPayPalGateway::new();
        assert!(mock.get_subscription("I-ABC").await.is_err());
    }
}
