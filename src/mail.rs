//! Outbound notifications.
//!
//! The account workflows decide that a mail goes out and to whom; delivery is
//! behind the [`Mailer`] trait.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::info;

/// Template names used by the account workflows.
pub mod templates {
    pub const APPROVAL_REQUEST: &str = "approval_request";
    pub const CONFIRM_ACCOUNT: &str = "confirm_account";
    pub const RESET_PASSWORD: &str = "reset_password";
    pub const CHANGE_EMAIL: &str = "change_email";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub template: &'static str,
    pub substitutions: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, template: &'static str) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            template,
            substitutions: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.substitutions.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug)]
pub struct MailError(pub String);

impl std::fmt::Display for MailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to send mail: {}", self.0)
    }
}

impl std::error::Error for MailError {}

pub trait Mailer: Send + Sync {
    fn send(&self, notification: Notification) -> Result<(), MailError>;
}

/// Writes every notification to the log instead of delivering it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, notification: Notification) -> Result<(), MailError> {
        info!(
            to = %notification.to,
            subject = %notification.subject,
            template = notification.template,
            substitutions = ?notification.substitutions,
            "Outgoing mail"
        );
        Ok(())
    }
}

/// Keeps notifications in memory so they can be inspected.
#[derive(Debug, Default, Clone)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// The most recent notification addressed to `to`.
    pub fn last_to(&self, to: &str) -> Option<Notification> {
        self.sent().into_iter().rev().find(|n| n.to == to)
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, notification: Notification) -> Result<(), MailError> {
        self.sent
            .lock()
            .map_err(|_| MailError("mailbox lock poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}
