//! MercadoPago webhook signature verification.
//!
//! Unlike PayPal, verification is computed locally: the `x-signature` header
//! carries `ts=<unix-ms>,v1=<hex-hmac>`, and the HMAC-SHA256 is recomputed
//! over a canonical manifest built from the `data.id` query parameter, the
//! `x-request-id` header, and the timestamp. Comparison is constant-time.
//!
//! When no webhook secret is configured the verifier logs a warning and
//! skips verification — a deliberate operational escape hatch for
//! environments where the secret has not been provisioned yet.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::errors::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Parsed components of the `x-signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Unix-milliseconds timestamp, kept verbatim for the manifest.
    pub ts: String,
    /// v1 signature (HMAC-SHA256).
    pub v1: Vec<u8>,
}

impl SignatureHeader {
    /// Parses an `x-signature` header string.
    ///
    /// Format: `ts=<unix-ms>,v1=<hex-hmac>`. Unknown fields are ignored for
    /// forward compatibility.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut ts: Option<String> = None;
        let mut v1: Option<Vec<u8>> = None;

        for part in header.split(',') {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| WebhookError::ParseError("invalid x-signature format".into()))?;

            match key.trim() {
                "ts" => ts = Some(value.trim().to_string()),
                "v1" => {
                    v1 = Some(hex::decode(value.trim()).map_err(|_| {
                        WebhookError::ParseError("invalid v1 signature hex".into())
                    })?);
                }
                _ => {}
            }
        }

        let ts = ts.ok_or_else(|| WebhookError::ParseError("missing ts in x-signature".into()))?;
        let v1 = v1.ok_or_else(|| WebhookError::ParseError("missing v1 in x-signature".into()))?;

        Ok(SignatureHeader { ts, v1 })
    }
}

/// Builds the canonical manifest string the HMAC is computed over.
///
/// `id:<data.id>;request-id:<x-request-id>;ts:<ts>;` — the `id:` segment is
/// omitted entirely when no `data.id` query parameter is present.
pub fn build_manifest(data_id: Option<&str>, request_id: &str, ts: &str) -> String {
    match data_id {
        Some(id) => format!("id:{};request-id:{};ts:{};", id, request_id, ts),
        None => format!("request-id:{};ts:{};", request_id, ts),
    }
}

/// Verifier for MercadoPago webhook signatures.
pub struct MpSignatureVerifier {
    secret: Option<SecretString>,
}

impl MpSignatureVerifier {
    pub fn new(secret: Option<SecretString>) -> Self {
        Self { secret }
    }

    /// Verifies an inbound notification.
    ///
    /// # Errors
    ///
    /// - `MissingHeader` when `x-signature` or `x-request-id` is absent
    /// - `ParseError` when the signature header is malformed
    /// - `InvalidSignature` when the recomputed HMAC does not match `v1`
    pub fn verify(
        &self,
        x_signature: Option<&str>,
        x_request_id: Option<&str>,
        data_id: Option<&str>,
    ) -> Result<(), WebhookError> {
        let Some(secret) = &self.secret else {
            tracing::warn!(
                "MERCADOPAGO_WEBHOOK_SECRET not configured; skipping signature verification"
            );
            return Ok(());
        };

        let signature = x_signature.ok_or(WebhookError::MissingHeader("x-signature"))?;
        let request_id = x_request_id.ok_or(WebhookError::MissingHeader("x-request-id"))?;
        let header = SignatureHeader::parse(signature)?;

        let manifest = build_manifest(data_id, request_id, &header.ts);

        let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(manifest.as_bytes());
        let expected = mac.finalize().into_bytes();

        if !constant_time_compare(expected.as_slice(), &header.v1) {
            tracing::warn!(request_id, "MercadoPago webhook signature mismatch");
            return Err(WebhookError::InvalidSignature);
        }

        Ok(())
    }
}

/// Constant-time comparison of two byte slices.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Computes a valid `x-signature` value for test fixtures.
#[cfg(test)]
pub fn compute_test_signature(secret: &str, data_id: Option<&str>, request_id: &str, ts: &str) -> String {
    let manifest = build_manifest(data_id, request_id, ts);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key");
    mac.update(manifest.as_bytes());
    format!("ts={},v1={}", ts, hex::encode(mac.finalize().into_bytes()))
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use secrecy::SecretString;

    fn verifier(secret: &str) -> MpSignatureVerifier {
        MpSignatureVerifier::new(Some(SecretString::new(secret.to_string())))
    }

    proptest! {
        #[test]
        fn computed_signature_always_verifies(
            data_id in proptest::option::of("[a-z0-9]{1,24}"),
            request_id in "[a-zA-Z0-9-]{1,32}",
            ts in "[0-9]{10,13}",
        ) {
            let signature =
                compute_test_signature("mp_secret", data_id.as_deref(), &request_id, &ts);
            prop_assert!(verifier("mp_secret")
                .verify(Some(&signature), Some(&request_id), data_id.as_deref())
                .is_ok());
        }

        #[test]
        fn tampered_data_id_never_verifies(
            data_id in "[a-z0-9]{1,24}",
            request_id in "[a-zA-Z0-9-]{1,32}",
            ts in "[0-9]{10,13}",
        ) {
            let signature =
                compute_test_signature("mp_secret", Some(&data_id), &request_id, &ts);
            let tampered = format!("{}x", data_id);
            prop_assert!(verifier("mp_secret")
                .verify(Some(&signature), Some(&request_id), Some(&tampered))
                .is_err());
        }

        #[test]
        fn wrong_secret_never_verifies(
            data_id in "[a-z0-9]{1,24}",
            request_id in "[a-zA-Z0-9-]{1,32}",
            ts in "[0-9]{10,13}",
        ) {
            let signature =
                compute_test_signature("mp_secret", Some(&data_id), &request_id, &ts);
            prop_assert!(verifier("other_secret")
                .verify(Some(&signature), Some(&request_id), Some(&data_id))
                .is_err());
        }
    }
}
