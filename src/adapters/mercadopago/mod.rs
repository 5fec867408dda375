//! MercadoPago adapter: REST client with static token auth and a
//! scriptable mock. Webhook signature verification is pure crypto and lives
//! in the billing domain (`domain::billing::MpSignatureVerifier`).

mod client;
mod mock;
pub mod types;

pub use client::MercadoPagoClient;
pub use mock::MockMercadoPagoGateway;
