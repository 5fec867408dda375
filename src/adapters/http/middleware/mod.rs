//! HTTP middleware and extractors.

mod auth;

pub use auth::{AuthenticatedUser, AuthenticationRequired, Claims, HasJwtVerifier, JwtVerifier};
