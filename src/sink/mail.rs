//! Notification sink: composes transcript emails and hands them to an
//! external SMTP relay.
//!
//! The transport sits behind a trait so the dispatch engine can be exercised
//! without a reachable mail server. Delivery is fire-and-forget: the relay
//! accepting the message is the only confirmation, and nothing is retried.

use std::path::Path;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::warn;

use super::SinkError;
use crate::config::SmtpSettings;
use crate::dispatch::TranscriptionJob;
use crate::rules::RuleRecord;

/// Subject used whenever the transcript is placed in the body.
pub const FALLBACK_SUBJECT: &str = "Whisper AI transcript";

/// A fully-composed outgoing message, independent of the transport.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<AudioAttachment>,
}

/// Audio file carried as a MIME attachment.
#[derive(Debug, Clone)]
pub struct AudioAttachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Handoff point to the external mail relay.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: OutgoingMessage) -> Result<(), SinkError>;
}

/// Compose and send the notification for an email rule.
///
/// Precondition (guaranteed by the dispatcher): the SMTP settings are
/// complete and `recipient` came from the rule's `email` field.
pub async fn notify(
    text: &str,
    record: &RuleRecord,
    recipient: &str,
    job: &TranscriptionJob,
    settings: &SmtpSettings,
    transport: &dyn MailTransport,
) -> Result<(), SinkError> {
    let (subject, body) = match record.transcript.as_str() {
        "subject" => (text.to_string(), ".".to_string()),
        "body" => (FALLBACK_SUBJECT.to_string(), text.to_string()),
        other => {
            warn!(
                "rule transcript value {:?} is neither \"body\" nor \"subject\"; \
                 sending transcript as body",
                other
            );
            (FALLBACK_SUBJECT.to_string(), text.to_string())
        }
    };

    let attachment = if record.keep_audio_dir().is_some() {
        let path = job.source_path();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| SinkError::Attachment {
                path: path.clone(),
                source,
            })?;
        Some(AudioAttachment {
            file_name: job.file_name.clone(),
            bytes,
        })
    } else {
        None
    };

    transport
        .send(OutgoingMessage {
            to: recipient.to_string(),
            from: settings.sender.clone(),
            subject,
            body,
            attachment,
        })
        .await
}

/// Production transport: asynchronous SMTP over lettre.
///
/// The relay configuration carries no credentials, so this speaks plain
/// SMTP to the configured host and port, matching the relay contract.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Self {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.server)
            .port(settings.port)
            .build();
        Self { transport }
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, message: OutgoingMessage) -> Result<(), SinkError> {
        let from: Mailbox = message
            .from
            .parse()
            .map_err(|e| SinkError::Message(format!("sender address: {}", e)))?;
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| SinkError::Message(format!("recipient address: {}", e)))?;

        let builder = Message::builder().from(from).to(to).subject(message.subject);

        let email = match message.attachment {
            Some(audio) => {
                let content_type = ContentType::parse(audio_mime(&audio.file_name))
                    .map_err(|e| SinkError::Message(e.to_string()))?;
                builder.multipart(
                    MultiPart::mixed()
                        .singlepart(SinglePart::plain(message.body))
                        .singlepart(
                            Attachment::new(audio.file_name).body(audio.bytes, content_type),
                        ),
                )
            }
            None => builder.body(message.body),
        }
        .map_err(|e| SinkError::Message(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        Ok(())
    }
}

fn audio_mime(file_name: &str) -> &'static str {
    match Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        _ => "application/octet-stream",
    }
}
