//! Resend transactional email adapter.

use async_trait::async_trait;

use crate::config::EmailConfig;
use crate::ports::{EmailMessage, MailError, Mailer};

/// Mailer backed by the Resend HTTP API.
pub struct ResendMailer {
    config: EmailConfig,
    base_url: String,
    http: reqwest::Client,
}

impl ResendMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config,
            base_url: "https://api.resend.com".to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Overrides the API base URL (for tests against a local stub).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let url = format!("{}/emails", self.base_url);
        let body = serde_json::json!({
            "from": self.config.from_header(),
            "to": [message.to],
            "subject": message.subject,
            "html": message.html,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.resend_api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(MailError::Provider(format!("{}: {}", status, text)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mailer_uses_resend_api_by_default() {
        let mailer = ResendMailer::new(EmailConfig::default());
        assert_eq!(mailer.base_url, "https://api.resend.com");
    }

    #[test]
    fn base_url_override_applies() {
        let mailer = ResendMailer::new(EmailConfig::default()).with_base_url("http://localhost:1");
        assert_eq!(mailer.base_url, "http://localhost:1");
    }
}
