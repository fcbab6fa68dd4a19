//! Routing rule store.
//!
//! Loads the JSON rule document (keyword → [`RuleRecord`]) once at startup
//! and answers keyword lookups for the rest of the process lifetime. A
//! reserved `"default"` entry is mandatory; lookups for unknown keywords
//! always fall back to it, so resolution never fails.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::config::ConfigError;

/// Reserved keyword for the mandatory fallback rule.
pub const DEFAULT_KEYWORD: &str = "default";

/// One routing rule.
///
/// `transcript` names the destination note folder for file rules, or the
/// subject/body placement (`"subject"` / `"body"`) for email rules.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleRecord {
    pub transcript: String,

    /// Override for the destination note file; derived from the audio file
    /// name (final extension replaced by `.md`) when absent.
    #[serde(default)]
    pub filename: Option<String>,

    /// Prefix every appended line with a `YYYY-MM-DD HH:MM:SS` timestamp.
    #[serde(default)]
    pub timestamp: bool,

    /// Destination address; presence routes through the notification sink.
    #[serde(default)]
    pub email: Option<String>,

    /// Folder the source audio is archived to (file rules) or a truthy
    /// marker that it should be attached (email rules). Deleted otherwise.
    #[serde(default)]
    pub keepaudiofile: Option<String>,
}

impl RuleRecord {
    /// Email destination, with blank values treated as absent.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Audio archive folder, with blank values treated as absent.
    pub fn keep_audio_dir(&self) -> Option<&str> {
        self.keepaudiofile
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// A lookup result: the applicable record, plus whether the keyword matched
/// an explicitly configured (non-default) rule. Only explicit matches strip
/// the keyword from the payload.
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    pub record: &'a RuleRecord,
    pub matched: bool,
}

/// Immutable keyword → rule mapping, validated at load time.
#[derive(Debug)]
pub struct RuleStore {
    rules: HashMap<String, RuleRecord>,
}

impl RuleStore {
    /// Read and validate the rule document at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let raw: HashMap<String, RuleRecord> =
            serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        Self::from_records(raw)
    }

    /// Build a store from already-parsed records, normalizing and validating.
    pub fn from_records(raw: HashMap<String, RuleRecord>) -> Result<Self, ConfigError> {
        let mut rules = HashMap::with_capacity(raw.len());

        for (keyword, record) in raw {
            let normalized = keyword.to_lowercase();
            if rules.insert(normalized.clone(), record).is_some() {
                return Err(ConfigError::DuplicateKeyword(normalized));
            }
        }

        let default = rules.get(DEFAULT_KEYWORD).ok_or(ConfigError::MissingDefault)?;

        // A default rule routing to email would loop forever when the mail
        // configuration is incomplete, so it is rejected outright.
        if default.email().is_some() {
            return Err(ConfigError::DefaultWithEmail);
        }

        // File rules need a real folder in `transcript`; the subject/body
        // placement values only make sense with an email destination.
        for (keyword, record) in &rules {
            if record.email().is_none()
                && matches!(record.transcript.as_str(), "subject" | "body")
            {
                return Err(ConfigError::UnroutableTranscript {
                    keyword: keyword.clone(),
                    transcript: record.transcript.clone(),
                });
            }
        }

        Ok(Self { rules })
    }

    /// Resolve a normalized keyword to its rule, falling back to `default`.
    ///
    /// The literal keyword `"default"` resolves to the default record but is
    /// never treated as an explicit match.
    pub fn resolve(&self, keyword: &str) -> Resolved<'_> {
        if keyword != DEFAULT_KEYWORD {
            if let Some(record) = self.rules.get(keyword) {
                return Resolved {
                    record,
                    matched: true,
                };
            }
        }

        Resolved {
            record: self.default_rule(),
            matched: false,
        }
    }

    /// The mandatory fallback rule. Guaranteed present by `load`.
    pub fn default_rule(&self) -> &RuleRecord {
        &self.rules[DEFAULT_KEYWORD]
    }

    /// Number of configured rules, the default included.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
