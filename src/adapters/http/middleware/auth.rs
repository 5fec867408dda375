//! JWT authentication for axum.
//!
//! The identity provider is an opaque issuer of HS256-signed bearer tokens;
//! the verifier validates signature and expiry with the shared secret and
//! exposes the `sub` claim as the authenticated user id. Ownership of the
//! target company is enforced separately by each handler via an owner-match
//! query.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::config::AuthConfig;
use crate::domain::foundation::UserId;

/// Claims this application reads from access tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: String,
    /// Expiry (validated by jsonwebtoken).
    #[allow(dead_code)]
    pub exp: usize,
}

/// Validates bearer tokens against the shared secret.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        Self {
            decoding_key: DecodingKey::from_secret(config.secret_bytes()),
            validation,
        }
    }

    /// Decodes and validates a token, returning its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding_key, &self.validation).map(|data| data.claims)
    }
}

/// Authenticated caller, extracted from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Rejection for missing/invalid credentials.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "UNAUTHORIZED",
                "message": "Necesitás iniciar sesión para continuar"
            })),
        )
            .into_response()
    }
}

/// States that can supply a [`JwtVerifier`].
pub trait HasJwtVerifier {
    fn jwt_verifier(&self) -> &Arc<JwtVerifier>;
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: HasJwtVerifier + Send + Sync,
{
    type Rejection = AuthenticationRequired;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or(AuthenticationRequired)?;

        let claims = state.jwt_verifier().verify(token).map_err(|e| {
            tracing::debug!(error = %e, "Bearer token rejected");
            AuthenticationRequired
        })?;

        let user_id = UserId::new(claims.sub).map_err(|_| AuthenticationRequired)?;
        Ok(AuthenticatedUser { user_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use secrecy::SecretString;
    use serde::Serialize;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        exp: usize,
    }

    fn verifier() -> JwtVerifier {
        JwtVerifier::new(&AuthConfig {
            jwt_secret: SecretString::new(SECRET.to_string()),
            issuer: None,
        })
    }

    fn token(sub: &str, exp_offset_secs: i64) -> String {
        let exp = (chrono::Utc::now().timestamp() + exp_offset_secs) as usize;
        encode(
            &Header::default(),
            &TestClaims {
                sub: sub.to_string(),
                exp,
            },
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_yields_claims() {
        let claims = verifier().verify(&token("user-1", 3600)).unwrap();
        assert_eq!(claims.sub, "user-1");
    }

    #[test]
    fn expired_token_is_rejected() {
        assert!(verifier().verify(&token("user-1", -3600)).is_err());
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let forged = encode(
            &Header::default(),
            &TestClaims {
                sub: "user-1".to_string(),
                exp: (chrono::Utc::now().timestamp() + 3600) as usize,
            },
            &EncodingKey::from_secret(b"another-secret-entirely-here!!!!"),
        )
        .unwrap();

        assert!(verifier().verify(&forged).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(verifier().verify("not.a.jwt").is_err());
    }
}
