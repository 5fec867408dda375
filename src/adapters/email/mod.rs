//! Email adapter: Resend API client and pure message templates.

mod resend_mailer;
pub mod templates;

pub use resend_mailer::ResendMailer;
