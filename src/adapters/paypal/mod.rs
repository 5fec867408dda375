//! PayPal adapter: REST client with OAuth token cache, webhook envelope
//! decoding, and a scriptable mock.
//!
//! Signature verification is delegated to the provider: the client posts the
//! five transmission headers plus the raw event back to PayPal's
//! verify-webhook-signature endpoint and trusts only
//! `verification_status == "SUCCESS"`.

mod client;
mod mock;
mod token_cache;
pub mod types;

pub use client::PayPalClient;
pub use mock::MockPayPalGateway;
pub use token_cache::{CachedToken, TokenCache};
