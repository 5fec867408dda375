//! Aula Segura - Subscription billing and payment reconciliation backend
//!
//! Multi-tenant SaaS for tracking regulatory safety compliance in Argentine
//! schools. This crate implements the subscription lifecycle engine: two
//! payment providers (PayPal, MercadoPago), webhook signature verification,
//! an idempotent event ledger, the subscription/entitlement state machine,
//! plan-change orchestration, and the daily reconciliation job.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
