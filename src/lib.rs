//! voxroute - folder-watching speech-to-text relay
//!
//! Watches a directory for dropped audio files, transcribes them with an
//! external whisper backend, and routes the text by the "magic word" at the
//! start of the transcript: append to a markdown note, archive the audio
//! alongside it, or send it by email.
//!
//! # Architecture
//!
//! - `rules`: keyword → routing-rule store with a mandatory default
//! - `classify`: keyword extraction and stripping
//! - `dispatch`: per-job routing state machine with email → file fallback
//! - `sink`: terminal actions (note append, mail relay handoff)
//! - `ingest`: polling watcher and the whisper backend
//! - `config`: the JSON configuration documents
//! - `cli`: startup flags
//!
//! # Usage
//!
//! ```bash
//! voxroute --watch-dir ~/voice-inbox --rules rules.json --email-config email.json
//! ```

pub mod classify;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod ingest;
pub mod rules;
pub mod sink;

// Re-export main types at crate root for convenience
pub use classify::ClassifyError;
pub use config::{ConfigError, MailConfig, SmtpSettings};
pub use dispatch::{DispatchError, Dispatcher, MailerHandle, Outcome, TranscriptionJob};
pub use ingest::{CycleOutcome, RelayWatcher, Transcriber, WatcherConfig, WhisperTranscriber};
pub use rules::{Resolved, RuleRecord, RuleStore};
pub use sink::{AudioAttachment, MailTransport, OutgoingMessage, SinkError, SmtpMailer};
