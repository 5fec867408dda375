//! Mock MercadoPago gateway for tests and local development.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::billing::{MpPaymentSnapshot, PreapprovalSnapshot};
use crate::ports::{
    CreatePreapprovalRequest, GatewayError, MercadoPagoGateway, PreapprovalUpdate,
};

/// Configurable mock implementation of [`MercadoPagoGateway`].
#[derive(Default)]
pub struct MockMercadoPagoGateway {
    pub create_result: Mutex<Option<Result<PreapprovalSnapshot, GatewayError>>>,
    pub get_result: Mutex<Option<Result<PreapprovalSnapshot, GatewayError>>>,
    pub update_result: Mutex<Option<Result<PreapprovalSnapshot, GatewayError>>>,
    /// Per-call results consumed before falling back to `update_result`.
    pub update_queue: Mutex<VecDeque<Result<PreapprovalSnapshot, GatewayError>>>,
    pub payment_result: Mutex<Option<Result<MpPaymentSnapshot, GatewayError>>>,

    pub create_calls: AtomicU32,
    pub get_calls: AtomicU32,
    pub update_calls: AtomicU32,
    pub payment_calls: AtomicU32,

    /// Updates received, for asserting what was sent to the provider.
    pub recorded_updates: Mutex<Vec<PreapprovalUpdate>>,
}

impl MockMercadoPagoGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock whose preapproval is authorized with the given id.
    pub fn authorized(preapproval_id: &str) -> Self {
        let snapshot = PreapprovalSnapshot {
            id: preapproval_id.to_string(),
            status: "authorized".to_string(),
            payer_email: Some("pagador@escuela.edu.ar".to_string()),
            next_payment_date: Some(chrono::Utc::now() + chrono::Duration::days(30)),
            amount: Some(29_999.0),
            currency: Some("ARS".to_string()),
            card_last_four: Some("4242".to_string()),
            init_point: None,
        };
        let mock = Self::new();
        *mock.create_result.lock().unwrap() = Some(Ok(snapshot.clone()));
        *mock.get_result.lock().unwrap() = Some(Ok(snapshot.clone()));
        *mock.update_result.lock().unwrap() = Some(Ok(snapshot));
        mock
    }

    pub fn set_create(&self, result: Result<PreapprovalSnapshot, GatewayError>) {
        *self.create_result.lock().unwrap() = Some(result);
    }

    pub fn set_get(&self, result: Result<PreapprovalSnapshot, GatewayError>) {
        *self.get_result.lock().unwrap() = Some(result);
    }

    pub fn set_update(&self, result: Result<PreapprovalSnapshot, GatewayError>) {
        *self.update_result.lock().unwrap() = Some(result);
    }

    /// Queues a one-shot result for the next `update_preapproval` call.
    pub fn push_update(&self, result: Result<PreapprovalSnapshot, GatewayError>) {
        self.update_queue.lock().unwrap().push_back(result);
    }

    pub fn set_payment(&self, result: Result<MpPaymentSnapshot, GatewayError>) {
        *self.payment_result.lock().unwrap() = Some(result);
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
impl MercadoPagoGateway for MockMercadoPagoGateway {
    async fn create_preapproval(
        &self,
        _request: CreatePreapprovalRequest,
    ) -> Result<PreapprovalSnapshot, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        Self::take_or_default(&self.create_result, "create_preapproval")
    }

    async fn get_preapproval(
        &self,
        _preapproval_id: &str,
    ) -> Result<PreapprovalSnapshot, GatewayError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Self::take_or_default(&self.get_result, "get_preapproval")
    }

    async fn update_preapproval(
        &self,
        _preapproval_id: &str,
        update: PreapprovalUpdate,
        _idempotency_key: &str,
    ) -> Result<PreapprovalSnapshot, GatewayError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.recorded_updates.lock().unwrap().push(update);
        if let Some(queued) = self.update_queue.lock().unwrap().pop_front() {
            return queued;
        }
        Self::take_or_default(&self.update_result, "update_preapproval")
    }

    async fn get_payment(&self, _payment_id: &str) -> Result<MpPaymentSnapshot, GatewayError> {
        self.payment_calls.fetch_add(1, Ordering::SeqCst);
        Self::take_or_default(&self.payment_result, "get_payment")
    }
}
