//! Outgoing mail transport.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One message handed to the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<String>,
}

impl OutgoingMail {
    /// HTML-only message with no copies.
    pub fn html(to: impl Into<String>, subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html: Some(html.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), MailError> {
        if !self.to.contains('@') {
            return Err(MailError::InvalidRecipient(self.to.clone()));
        }
        if self.text.is_none() && self.html.is_none() {
            return Err(MailError::EmptyBody);
        }
        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MailError {
    #[error("invalid recipient '{0}'")]
    InvalidRecipient(String),

    #[error("mail has neither text nor html body")]
    EmptyBody,

    #[error("mail transport failed: {0}")]
    Transport(String),
}

/// Delivery seam. Implementations must be usable from worker threads.
pub trait MailTransport: Send + Sync {
    /// Returns a transport-assigned message id.
    fn send(&self, mail: &OutgoingMail) -> Result<String, MailError>;
}

/// Logs messages instead of delivering them; the default when no mail server
/// is configured.
#[derive(Debug, Clone, Default)]
pub struct LoggingTransport {
    from: String,
}

impl LoggingTransport {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

impl MailTransport for LoggingTransport {
    fn send(&self, mail: &OutgoingMail) -> Result<String, MailError> {
        mail.validate()?;
        let message_id = format!("<{}@logging>", uuid::Uuid::now_v7());
        tracing::info!(
            from = %self.from,
            to = %mail.to,
            subject = %mail.subject,
            message_id = %message_id,
            "mail logged (no transport configured)"
        );
        Ok(message_id)
    }
}

/// Keeps every sent message in memory; optionally fails every send.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutgoingMail>>,
    fail_with: Option<String>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_with: Some(reason.into()),
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl MailTransport for RecordingTransport {
    fn send(&self, mail: &OutgoingMail) -> Result<String, MailError> {
        mail.validate()?;
        if let Some(reason) = &self.fail_with {
            return Err(MailError::Transport(reason.clone()));
        }
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| MailError::Transport("recording transport lock poisoned".into()))?;
        sent.push(mail.clone());
        Ok(format!("<recorded-{}>", sent.len()))
    }
}
