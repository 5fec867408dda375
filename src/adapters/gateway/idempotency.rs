//! Idempotency key derivation for mutating gateway calls.
//!
//! Providers deduplicate requests carrying the same key. Each distinct
//! operation must therefore carry a fresh key: two plan changes issued in
//! quick succession are different operations and must not collapse into one.
//! Keys combine the operation, the target id, and a high-resolution
//! timestamp.

use chrono::Utc;

/// Derives a fresh idempotency key for one mutating call.
pub fn idempotency_key(operation: &str, target_id: &str) -> String {
    let nanos = Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| Utc::now().timestamp_micros());
    format!("{}-{}-{}", operation, target_id, nanos)
}
