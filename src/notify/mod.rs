//! Outbound notification: the acknowledgement email and its transport.

pub mod smtp;
pub mod template;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::NotifyError;

pub use smtp::SmtpNotifier;
pub use template::{AcknowledgementTemplate, EmailDraft};

/// A fully composed message ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<PathBuf>,
}

/// Delivery transport.
///
/// Returns `Ok(())` only when the message was handed off; any connection,
/// auth, timeout, or attachment problem is an error.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), NotifyError>;
}

/// What the lifecycle engine sees of a send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Success,
    Failure(String),
}

impl SendOutcome {
    pub fn from_result(result: Result<(), NotifyError>) -> Self {
        match result {
            Ok(()) => SendOutcome::Success,
            Err(e) => SendOutcome::Failure(e.to_string()),
        }
    }
}
