//! Action dispatcher: one terminal action per transcription job.
//!
//! For each job the dispatcher classifies the leading keyword, resolves a
//! rule, and drives exactly one sink. An email rule with an incomplete mail
//! configuration is re-resolved against the default rule (one level only —
//! load-time validation guarantees the default is a file rule) and handled
//! as a file append.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::classify::{self, ClassifyError};
use crate::config::SmtpSettings;
use crate::rules::RuleStore;
use crate::sink::{file as file_sink, mail as mail_sink, MailTransport, SinkError};

/// One polling cycle's unit of work: a source audio file and its transcript.
/// Never outlives the cycle that created it.
#[derive(Debug, Clone)]
pub struct TranscriptionJob {
    pub source_dir: PathBuf,
    pub file_name: String,
    pub text: String,
}

impl TranscriptionJob {
    pub fn source_path(&self) -> PathBuf {
        self.source_dir.join(&self.file_name)
    }
}

/// The terminal action taken for a job.
#[derive(Debug)]
pub enum Outcome {
    Appended { note_path: PathBuf },
    Emailed { recipient: String },
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Usable mail subsystem: complete settings plus a transport.
pub struct MailerHandle {
    pub settings: SmtpSettings,
    pub transport: Arc<dyn MailTransport>,
}

/// Long-lived routing engine. The rule store and mail handle are loaded once
/// at startup and shared read-only across cycles.
pub struct Dispatcher {
    rules: RuleStore,
    mailer: Option<MailerHandle>,
}

impl Dispatcher {
    pub fn new(rules: RuleStore, mailer: Option<MailerHandle>) -> Self {
        Self { rules, mailer }
    }

    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }

    /// Route one job to its terminal action.
    pub async fn dispatch(&self, job: &TranscriptionJob) -> Result<Outcome, DispatchError> {
        let keyword = classify::extract_keyword(&job.text)?;
        let resolved = self.rules.resolve(&keyword);
        let text = classify::strip_keyword(&job.text, resolved.matched.then_some(keyword.as_str()));

        debug!(
            "keyword {:?} resolved ({}match) for {}",
            keyword,
            if resolved.matched { "" } else { "no " },
            job.file_name
        );

        let mut record = resolved.record;

        if let Some(recipient) = record.email() {
            match &self.mailer {
                Some(mailer) => {
                    mail_sink::notify(
                        text,
                        record,
                        recipient,
                        job,
                        &mailer.settings,
                        mailer.transport.as_ref(),
                    )
                    .await?;

                    // The sink consumed the audio (attached it when asked),
                    // so the source is always removed after a send.
                    let source = job.source_path();
                    if let Err(e) = tokio::fs::remove_file(&source).await {
                        warn!("failed to delete {} after send: {}", source.display(), e);
                    }

                    return Ok(Outcome::Emailed {
                        recipient: recipient.to_string(),
                    });
                }
                None => {
                    warn!(
                        "rule {:?} routes to email but the mail configuration is \
                         absent or incomplete; falling back to the default rule",
                        keyword
                    );
                    record = self.rules.default_rule();
                }
            }
        }

        let note_path = file_sink::append(text, record, job).await?;
        Ok(Outcome::Appended { note_path })
    }
}
