//! HTTP adapters: axum routers, handlers, and middleware.

pub mod billing;
pub mod middleware;

pub use billing::{billing_router, BillingAppState, CheckoutUrls};
