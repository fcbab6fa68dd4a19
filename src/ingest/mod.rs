//! Watched-folder ingestion.
//!
//! 1. **Watcher**: polls a directory and picks at most one audio file per
//!    cycle
//! 2. **Transcriber**: black-box whisper backend turning audio into text
//!
//! The resulting (text, folder, file name) triple feeds the dispatcher.

pub mod transcriber;
pub mod watcher;

pub use transcriber::{Transcriber, WhisperTranscriber};
pub use watcher::{CycleOutcome, RelayWatcher, WatcherConfig, WatcherError, DEAD_LETTER_DIR};
