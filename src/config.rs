//! Configuration documents for the relay.
//!
//! Two JSON documents are read once at startup and shared read-only across
//! polling cycles:
//!
//! - the rule document (see [`crate::rules`]), which is mandatory;
//! - the mail relay configuration (`email.json`), which is optional — when
//!   absent or incomplete, email rules fall back to the default rule at
//!   dispatch time rather than failing at load.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Fatal configuration errors. Any of these surfaces before the poll loop
/// starts and terminates the process with a non-zero status.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("rule document has no \"default\" entry")]
    MissingDefault,

    #[error("the \"default\" rule must not route to email")]
    DefaultWithEmail,

    #[error("rule \"{keyword}\": transcript \"{transcript}\" is only valid for email rules")]
    UnroutableTranscript { keyword: String, transcript: String },

    #[error("duplicate rule keyword after normalization: \"{0}\"")]
    DuplicateKeyword(String),
}

/// Raw mail relay configuration, as found in `email.json`.
///
/// All fields are optional on disk; completeness is checked lazily via
/// [`MailConfig::smtp`] so that a half-filled document degrades email rules
/// instead of refusing to start.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub smtp_server: Option<String>,
    #[serde(default)]
    pub smtp_port: Option<u16>,
    #[serde(default)]
    pub sender_email: Option<String>,
}

/// Complete, validated SMTP relay settings.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub sender: String,
}

impl MailConfig {
    /// Load the mail configuration from `path`.
    ///
    /// A missing file is not an error (`Ok(None)`); malformed JSON is fatal.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Some(config))
    }

    /// Resolve complete SMTP settings, or `None` if any field is missing or
    /// blank.
    pub fn smtp(&self) -> Option<SmtpSettings> {
        let server = self.smtp_server.as_deref()?.trim();
        let sender = self.sender_email.as_deref()?.trim();
        let port = self.smtp_port?;

        if server.is_empty() || sender.is_empty() {
            return None;
        }

        Some(SmtpSettings {
            server: server.to_string(),
            port,
            sender: sender.to_string(),
        })
    }
}
