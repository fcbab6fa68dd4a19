//! Watched-directory polling loop.
//!
//! Enumerates the watch directory at a fixed interval and relays at most one
//! eligible audio file per cycle through the dispatcher. The one-file-per-
//! cycle limit is a deliberate throttle; everything is strictly sequential,
//! and all state is re-derived from the filesystem each cycle.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::dispatch::{Dispatcher, Outcome, TranscriptionJob};
use crate::ingest::transcriber::Transcriber;
use crate::sink::file::disambiguate;

/// Subdirectory of the watch folder where unroutable files are parked.
pub const DEAD_LETTER_DIR: &str = "unrouted";

#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("watch directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for the polling watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Directory to poll for dropped audio files.
    pub watch_path: PathBuf,

    /// File extensions that count as audio; anything else is ignored.
    pub extensions: Vec<String>,

    /// Seconds to sleep between polling cycles.
    pub poll_interval_secs: u64,
}

impl WatcherConfig {
    pub fn new(watch_path: impl Into<PathBuf>) -> Self {
        Self {
            watch_path: watch_path.into(),
            extensions: vec!["mp3".to_string(), "wav".to_string(), "m4a".to_string()],
            poll_interval_secs: 10,
        }
    }

    pub fn validate(&self) -> Result<(), WatcherError> {
        if !self.watch_path.is_dir() {
            return Err(WatcherError::DirectoryNotFound(self.watch_path.clone()));
        }
        Ok(())
    }

    fn is_audio_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}

/// What happened during one polling cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// No eligible file this cycle.
    Idle,

    /// One file was transcribed and routed.
    Dispatched(Outcome),

    /// One file could not be routed and was parked in the dead-letter
    /// directory with its audio intact.
    DeadLettered { file_name: String, reason: String },
}

/// Sequential polling watcher over a single directory.
pub struct RelayWatcher {
    config: WatcherConfig,
}

impl RelayWatcher {
    pub fn with_config(config: WatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Run a single polling cycle: pick the first eligible file (by name),
    /// transcribe it, and dispatch the transcript.
    pub async fn run_once(
        &self,
        transcriber: &dyn Transcriber,
        dispatcher: &Dispatcher,
    ) -> Result<CycleOutcome, WatcherError> {
        self.config.validate()?;

        let Some(path) = self.first_eligible().await? else {
            return Ok(CycleOutcome::Idle);
        };
        // first_eligible only yields paths with valid UTF-8 names
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        info!("transcribing {}", path.display());
        let text = match transcriber.transcribe(&path).await {
            Ok(text) => text,
            Err(e) => {
                error!("transcription failed for {}: {:#}", path.display(), e);
                self.dead_letter(&path).await?;
                return Ok(CycleOutcome::DeadLettered {
                    file_name,
                    reason: format!("transcription failed: {:#}", e),
                });
            }
        };

        if text.trim().is_empty() {
            // No keyword to classify; the audio is preserved rather than
            // silently dropped.
            warn!(
                "empty transcript for {}; moving to {}/",
                path.display(),
                DEAD_LETTER_DIR
            );
            self.dead_letter(&path).await?;
            return Ok(CycleOutcome::DeadLettered {
                file_name,
                reason: "empty transcript".to_string(),
            });
        }

        let job = TranscriptionJob {
            source_dir: self.config.watch_path.clone(),
            file_name: file_name.clone(),
            text,
        };

        match dispatcher.dispatch(&job).await {
            Ok(outcome) => {
                match &outcome {
                    Outcome::Appended { note_path } => {
                        info!("{} appended to {}", file_name, note_path.display())
                    }
                    Outcome::Emailed { recipient } => {
                        info!("{} emailed to {}", file_name, recipient)
                    }
                }
                Ok(CycleOutcome::Dispatched(outcome))
            }
            Err(e) => {
                // A failed send or append must not lose the recording.
                error!("dispatch failed for {}: {}", file_name, e);
                self.dead_letter(&path).await?;
                Ok(CycleOutcome::DeadLettered {
                    file_name,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Poll forever, one eligible file per cycle, sleeping in between.
    pub async fn run(
        &self,
        transcriber: &dyn Transcriber,
        dispatcher: &Dispatcher,
    ) -> Result<()> {
        self.config.validate()?;

        info!(
            "watching {} for audio files ({}s interval)",
            self.config.watch_path.display(),
            self.config.poll_interval_secs
        );

        let interval = Duration::from_secs(self.config.poll_interval_secs);

        loop {
            match self.run_once(transcriber, dispatcher).await {
                Ok(CycleOutcome::Idle) => debug!("no eligible files"),
                Ok(CycleOutcome::Dispatched(_)) => {}
                Ok(CycleOutcome::DeadLettered { file_name, reason }) => {
                    warn!("dead-lettered {}: {}", file_name, reason)
                }
                Err(e) => error!("poll cycle failed: {}", e),
            }

            tokio::time::sleep(interval).await;
        }
    }

    /// First eligible audio file in the watch directory, sorted by name so
    /// "first" is deterministic. Subdirectories (the dead-letter area
    /// included) and foreign extensions are skipped untouched.
    async fn first_eligible(&self) -> Result<Option<PathBuf>, WatcherError> {
        let mut candidates = Vec::new();

        let mut entries = tokio::fs::read_dir(&self.config.watch_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            if !self.config.is_audio_file(&path) {
                continue;
            }
            if path.file_name().and_then(|n| n.to_str()).is_none() {
                continue;
            }

            let metadata = match tokio::fs::metadata(&path).await {
                Ok(m) => m,
                Err(_) => continue,
            };
            if !metadata.is_file() {
                continue;
            }

            candidates.push(path);
        }

        candidates.sort();
        Ok(candidates.into_iter().next())
    }

    /// Park a file in the dead-letter subdirectory, creating it on demand.
    async fn dead_letter(&self, path: &Path) -> Result<(), WatcherError> {
        let dir = self.config.watch_path.join(DEAD_LETTER_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let target = disambiguate(&dir, file_name);

        tokio::fs::rename(path, &target).await?;
        Ok(())
    }
}
