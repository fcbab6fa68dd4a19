//! Whisper transcription backend.
//!
//! The speech-to-text model is an opaque collaborator: one operation, audio
//! file in, text out. The production backend shells out to a local whisper
//! binary; the trait seam lets tests substitute a stub.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

/// Black-box speech-to-text backend.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the audio file at `path`, returning the trimmed text.
    async fn transcribe(&self, path: &Path) -> Result<String>;
}

/// Local whisper CLI backend.
pub struct WhisperTranscriber {
    model: String,
}

#[derive(Debug, Deserialize)]
struct WhisperOutput {
    text: String,
}

impl WhisperTranscriber {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<String> {
        let whisper_path =
            std::env::var("WHISPER_PATH").unwrap_or_else(|_| "whisper".to_string());

        // Whisper writes one JSON file per input into the output dir.
        let temp_dir = tempfile::tempdir().context("failed to create temp dir")?;

        let output = Command::new(&whisper_path)
            .arg(audio_path)
            .arg("--model")
            .arg(&self.model)
            .arg("--output_dir")
            .arg(temp_dir.path())
            .arg("--output_format")
            .arg("json")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("failed to run whisper")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("whisper failed: {}", stderr);
        }

        let stem = audio_path.file_stem().unwrap_or_default().to_string_lossy();
        let json_path = temp_dir.path().join(format!("{}.json", stem));

        let json_content = tokio::fs::read_to_string(&json_path)
            .await
            .context("failed to read whisper output")?;

        let whisper: WhisperOutput =
            serde_json::from_str(&json_content).context("failed to parse whisper JSON")?;

        Ok(whisper.text.trim().to_string())
    }
}
