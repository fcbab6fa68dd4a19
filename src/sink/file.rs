//! File sink: appends transcripts to markdown notes and archives or deletes
//! the source audio.
//!
//! The append is the durable part of the job. Everything after it (archiving
//! or deleting the audio file) is best-effort cleanup: a failure there is
//! logged but never rolls back the already-written note line.

use std::path::{Path, PathBuf};

use chrono::{Local, Utc};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;

use super::SinkError;
use crate::dispatch::TranscriptionJob;
use crate::rules::RuleRecord;

/// Append `text` to the note selected by `record` and dispose of the source
/// audio file. Returns the note path.
pub async fn append(
    text: &str,
    record: &RuleRecord,
    job: &TranscriptionJob,
) -> Result<PathBuf, SinkError> {
    let note_name = match &record.filename {
        Some(name) => name.clone(),
        None => format!("{}.md", note_stem(&job.file_name)),
    };
    let note_path = Path::new(&record.transcript).join(note_name);

    let mut entry = String::new();
    if record.timestamp {
        entry.push_str(&Local::now().format("%Y-%m-%d %H:%M:%S ").to_string());
    }
    entry.push_str(text);
    entry.push('\n');

    let source = job.source_path();

    if let Some(archive) = record.keep_audio_dir() {
        // The embed reference must match wherever the audio actually lands,
        // so the collision-safe target is resolved before the append.
        let target = disambiguate(Path::new(archive), &job.file_name);
        let moved_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| job.file_name.clone());

        entry.push_str(&format!("![[{}]]\n", moved_name));
        append_entry(&note_path, &entry).await?;

        if let Err(e) = move_file(&source, &target).await {
            warn!(
                "failed to archive {} to {}: {}",
                source.display(),
                target.display(),
                e
            );
        }
    } else {
        append_entry(&note_path, &entry).await?;

        if let Err(e) = fs::remove_file(&source).await {
            warn!("failed to delete {}: {}", source.display(), e);
        }
    }

    Ok(note_path)
}

/// Note file stem: the audio file name with only its final extension
/// stripped (`voice.memo.1.wav` → `voice.memo.1`).
fn note_stem(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name)
}

/// Pick a target path in `dir` for `file_name`, inserting `_<unix epoch>`
/// before the final extension if the plain name is already taken.
pub(crate) fn disambiguate(dir: &Path, file_name: &str) -> PathBuf {
    let plain = dir.join(file_name);
    if !plain.exists() {
        return plain;
    }

    let epoch = Utc::now().timestamp();
    let renamed = match Path::new(file_name).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}_{}.{}", note_stem(file_name), epoch, ext),
        None => format!("{}_{}", file_name, epoch),
    };
    dir.join(renamed)
}

async fn append_entry(note_path: &Path, entry: &str) -> Result<(), SinkError> {
    let io = async {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(note_path)
            .await?;
        file.write_all(entry.as_bytes()).await?;
        file.flush().await
    };

    io.await.map_err(|source| SinkError::Append {
        path: note_path.to_path_buf(),
        source,
    })
}

/// Move a file, surviving filesystem boundaries: rename first, then fall
/// back to copy + delete.
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::rename(from, to).await.is_ok() {
        return Ok(());
    }

    fs::copy(from, to).await?;
    fs::remove_file(from).await
}
