//! Mailer port for transactional email.
//!
//! The dispatcher in the application layer wraps this with fire-and-forget
//! semantics; implementations only need a single best-effort send.

use async_trait::async_trait;
use thiserror::Error;

/// A transactional email ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Errors from the email provider.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Email provider error: {0}")]
    Provider(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Port for sending transactional email.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Attempts a single send. Callers must not let a failure here abort a
    /// payment-driven state transition.
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mailer_is_object_safe() {
        fn _accepts_dyn(_mailer: &dyn Mailer) {}
    }

    #[test]
    fn mail_error_displays_detail() {
        let err = MailError::Provider("quota exceeded".to_string());
        assert_eq!(format!("{}", err), "Email provider error: quota exceeded");
    }
}
