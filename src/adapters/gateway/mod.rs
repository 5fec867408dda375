//! Shared gateway plumbing: retry policy and idempotency key derivation.

mod idempotency;
mod retry;

pub use idempotency::idempotency_key;
pub use retry::RetryPolicy;
