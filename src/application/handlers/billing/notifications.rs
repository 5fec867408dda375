//! Notification dispatcher.
//!
//! Fire-and-forget transactional email. `send_safe` spawns the send and
//! returns immediately; failures are logged, never raised, so a transient
//! email-provider outage cannot abort or roll back a payment-driven state
//! transition.

use std::sync::Arc;

use crate::ports::{EmailMessage, Mailer};

/// Dispatches transactional email as a best-effort side effect.
#[derive(Clone)]
pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
}

impl NotificationDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    /// Dispatches a message without blocking the caller. Never fails.
    pub fn send_safe(&self, message: EmailMessage) {
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send(&message).await {
                tracing::warn!(
                    to = %message.to,
                    subject = %message.subject,
                    error = %e,
                    "Transactional email failed (non-fatal)"
                );
            }
        });
    }
}
