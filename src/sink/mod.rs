//! Terminal output sinks.
//!
//! A sink performs the irreversible action a routing rule resolves to:
//! appending to a note file or handing a message to the mail relay. Neither
//! action is retried or rolled back.

use std::path::PathBuf;

use thiserror::Error;

pub mod file;
pub mod mail;

pub use mail::{AudioAttachment, MailTransport, OutgoingMessage, SmtpMailer};

/// Errors raised by the terminal sinks. These fail the current job only;
/// the poll loop keeps running.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to append to note {path}: {source}")]
    Append {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read audio attachment {path}: {source}")]
    Attachment {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to compose mail message: {0}")]
    Message(String),

    #[error("mail transport error: {0}")]
    Transport(String),
}
