//! Authentication configuration
//!
//! The identity provider is opaque to this system: it issues HS256-signed
//! bearer tokens that the middleware validates with a shared secret.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;

/// Authentication configuration (JWT bearer tokens)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared HMAC secret the identity provider signs tokens with
    pub jwt_secret: SecretString,

    /// Expected `iss` claim, when the issuer sets one
    #[serde(default)]
    pub issuer: Option<String>,
}

impl AuthConfig {
    /// Exposes the secret bytes for the jsonwebtoken decoding key.
    pub fn secret_bytes(&self) -> &[u8] {
        self.jwt_secret.expose_secret().as_bytes()
    }

    /// Validate authentication configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.jwt_secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("AUTH_JWT_SECRET"));
        }
        if self.jwt_secret.expose_secret().len() < 32 {
            return Err(ValidationError::JwtSecretTooShort);
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: SecretString::new(String::new()),
            issuer: None,
        }
    }
}
