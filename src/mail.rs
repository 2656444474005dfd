//! Outgoing mail for signup email verification.
//!
//! Delivery goes through the `MailSender` trait. The bundled `LogMailSender`
//! writes messages to the log, which is enough for development and for
//! deployments that relay the log to a mail gateway.

use std::sync::Arc;

use tracing::{info, warn};
use url::Url;

/// Path appended to the base URL for the verification link.
const VERIFY_PATH: &str = "verify-email";

#[derive(Debug, thiserror::Error)]
#[error("mail delivery failed: {0}")]
pub struct MailError(pub String);

/// Delivers a plain-text message to a single recipient.
pub trait MailSender: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Writes every message to the log instead of delivering it.
pub struct LogMailSender;

impl MailSender for LogMailSender {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        info!(to = %to, subject = %subject, body = %body, "Outgoing mail");
        Ok(())
    }
}

/// Composes and sends the verification mail for new members.
#[derive(Clone)]
pub struct VerificationMailer {
    sender: Arc<dyn MailSender>,
    base_url: Url,
}

impl VerificationMailer {
    pub fn new(sender: Arc<dyn MailSender>, base_url: Url) -> Self {
        Self { sender, base_url }
    }

    /// Link the member follows to confirm their address.
    pub fn link(&self, email: &str, token: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(VERIFY_PATH);
        }
        url.query_pairs_mut()
            .append_pair("email", email)
            .append_pair("token", token);
        url
    }

    /// Send the verification mail. Failures are logged; the member can still
    /// be verified with the stored token.
    pub fn send_verification(&self, email: &str, token: &str) {
        let body = format!(
            "Confirm your email address by opening this link:\n{}",
            self.link(email, token)
        );
        if let Err(e) = self.sender.send(email, "Confirm your email address", &body) {
            warn!(error = %e, "Failed to send verification mail");
        }
    }
}
