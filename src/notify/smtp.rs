//! SMTP transport via lettre.
//!
//! lettre's transport is blocking; each send runs on the blocking pool and
//! is bounded by the configured timeout.

use std::path::Path;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;
use tracing::info;

use crate::config::SmtpConfig;
use crate::error::{ConfigError, NotifyError};
use crate::notify::{Notifier, OutgoingEmail};
use crate::pipeline::timestamps::mask_email;

/// Port that expects TLS from the first byte instead of STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

/// Notifier backed by an authenticated SMTP relay.
pub struct SmtpNotifier {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpNotifier {
    /// Build the transport. Fails only on unusable settings; no connection
    /// is attempted until the first send.
    pub fn new(config: &SmtpConfig) -> Result<Self, ConfigError> {
        let builder = if config.port == IMPLICIT_TLS_PORT {
            SmtpTransport::relay(&config.host)
        } else {
            SmtpTransport::starttls_relay(&config.host)
        }
        .map_err(|e| ConfigError::InvalidValue {
            key: "SMTP_HOST".into(),
            message: format!("SMTP relay error: {e}"),
        })?;

        let creds = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );
        let transport = builder
            .port(config.port)
            .credentials(creds)
            .timeout(Some(config.timeout))
            .build();

        let address: Address = config
            .from_email
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                key: "SMTP_FROM_EMAIL".into(),
                message: format!("{e}"),
            })?;
        let from = Mailbox::new(config.from_name.clone(), address);

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), NotifyError> {
        let transport = self.transport.clone();
        let from = self.from.clone();
        let email = email.clone();

        tokio::task::spawn_blocking(move || {
            let message = build_message(from, &email)?;
            transport
                .send(&message)
                .map_err(|e| NotifyError::Send(e.to_string()))?;
            info!(to = %mask_email(&email.to), "Acknowledgement sent");
            Ok(())
        })
        .await
        .map_err(|e| NotifyError::Task(e.to_string()))?
    }
}

// ── Helpers (public for testing) ────────────────────────────────────

/// Compose the MIME message: plain-text body plus one part per attachment.
pub fn build_message(from: Mailbox, email: &OutgoingEmail) -> Result<Message, NotifyError> {
    let to: Mailbox = email.to.parse().map_err(|e| NotifyError::InvalidAddress {
        address: email.to.clone(),
        reason: format!("{e}"),
    })?;

    let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(email.body.clone()));
    for path in &email.attachments {
        parts = parts.singlepart(attachment_part(path)?);
    }

    Message::builder()
        .from(from)
        .to(to)
        .subject(email.subject.clone())
        .multipart(parts)
        .map_err(|e| NotifyError::Build(e.to_string()))
}

fn attachment_part(path: &Path) -> Result<SinglePart, NotifyError> {
    if !path.is_file() {
        return Err(NotifyError::AttachmentMissing(path.to_path_buf()));
    }
    let content = std::fs::read(path).map_err(|e| NotifyError::AttachmentRead {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());
    let content_type =
        ContentType::parse(content_type_for(path)).map_err(|e| NotifyError::Build(e.to_string()))?;

    Ok(Attachment::new(filename).body(content, content_type))
}

/// MIME type by file extension; the offers are PDFs.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
