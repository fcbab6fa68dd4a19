//! End-to-end routing tests.
//!
//! Exercise the full watcher → transcriber → dispatcher → sink path with a
//! stub transcription backend and a recording mail transport, so no whisper
//! binary or SMTP server is needed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use voxroute::dispatch::{Dispatcher, MailerHandle, Outcome, TranscriptionJob};
use voxroute::ingest::{CycleOutcome, RelayWatcher, Transcriber, WatcherConfig, DEAD_LETTER_DIR};
use voxroute::rules::{RuleRecord, RuleStore};
use voxroute::sink::{MailTransport, OutgoingMessage, SinkError};
use voxroute::SmtpSettings;

/// Transcription stub: file name → canned transcript.
struct StubTranscriber {
    texts: HashMap<String, String>,
}

impl StubTranscriber {
    fn new(texts: &[(&str, &str)]) -> Self {
        Self {
            texts: texts
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, path: &Path) -> anyhow::Result<String> {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        Ok(self.texts.get(&name).cloned().unwrap_or_default())
    }
}

/// Mail transport that records instead of sending.
#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMessage>>,
}

#[async_trait]
impl MailTransport for RecordingMailer {
    async fn send(&self, message: OutgoingMessage) -> Result<(), SinkError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// Mail transport that always fails.
struct FailingMailer;

#[async_trait]
impl MailTransport for FailingMailer {
    async fn send(&self, _message: OutgoingMessage) -> Result<(), SinkError> {
        Err(SinkError::Transport("relay unreachable".to_string()))
    }
}

fn file_rule(folder: &Path) -> RuleRecord {
    RuleRecord {
        transcript: folder.to_string_lossy().into_owned(),
        filename: None,
        timestamp: false,
        email: None,
        keepaudiofile: None,
    }
}

fn store(records: Vec<(&str, RuleRecord)>) -> RuleStore {
    let map: HashMap<String, RuleRecord> = records
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    RuleStore::from_records(map).unwrap()
}

fn smtp_settings() -> SmtpSettings {
    SmtpSettings {
        server: "smtp.example.com".to_string(),
        port: 587,
        sender: "bot@example.com".to_string(),
    }
}

async fn seed(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    tokio::fs::write(&path, b"fake audio").await.unwrap();
    path
}

fn watcher_for(dir: &Path) -> RelayWatcher {
    RelayWatcher::with_config(WatcherConfig::new(dir))
}

#[tokio::test]
async fn keyword_rule_strips_timestamps_and_deletes() {
    let temp = TempDir::new().unwrap();
    let watch = temp.path().join("watch");
    let inbox = temp.path().join("inbox");
    let daily = temp.path().join("daily");
    for dir in [&watch, &inbox, &daily] {
        tokio::fs::create_dir(dir).await.unwrap();
    }
    seed(&watch, "note1.wav").await;

    let mut log_rule = file_rule(&daily);
    log_rule.timestamp = true;
    let dispatcher = Dispatcher::new(
        store(vec![("default", file_rule(&inbox)), ("log", log_rule)]),
        None,
    );
    let transcriber = StubTranscriber::new(&[("note1.wav", "Log: finished the report")]);

    let outcome = watcher_for(&watch)
        .run_once(&transcriber, &dispatcher)
        .await
        .unwrap();

    let note = daily.join("note1.md");
    match outcome {
        CycleOutcome::Dispatched(Outcome::Appended { note_path }) => {
            assert_eq!(note_path, note)
        }
        other => panic!("expected appended outcome, got {:?}", other),
    }

    let content = tokio::fs::read_to_string(&note).await.unwrap();
    chrono::NaiveDateTime::parse_from_str(&content[..19], "%Y-%m-%d %H:%M:%S").unwrap();
    assert_eq!(&content[19..], " finished the report\n");
    assert!(!watch.join("note1.wav").exists());
}

#[tokio::test]
async fn email_rule_without_mail_config_falls_back_to_default() {
    let temp = TempDir::new().unwrap();
    let watch = temp.path().join("watch");
    let inbox = temp.path().join("inbox");
    for dir in [&watch, &inbox] {
        tokio::fs::create_dir(dir).await.unwrap();
    }
    seed(&watch, "memo.wav").await;

    let reminder = RuleRecord {
        transcript: "subject".to_string(),
        filename: None,
        timestamp: false,
        email: Some("a@b.com".to_string()),
        keepaudiofile: Some("archive".to_string()),
    };
    let dispatcher = Dispatcher::new(
        store(vec![("default", file_rule(&inbox)), ("reminder", reminder)]),
        None,
    );
    let transcriber = StubTranscriber::new(&[("memo.wav", "Reminder pay the rent")]);

    let outcome = watcher_for(&watch)
        .run_once(&transcriber, &dispatcher)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        CycleOutcome::Dispatched(Outcome::Appended { .. })
    ));

    let content = tokio::fs::read_to_string(inbox.join("memo.md"))
        .await
        .unwrap();
    assert_eq!(content, "pay the rent\n");
    assert!(!watch.join("memo.wav").exists());
}

#[tokio::test]
async fn email_rule_sends_subject_with_attachment_and_deletes() {
    let temp = TempDir::new().unwrap();
    let watch = temp.path().join("watch");
    let inbox = temp.path().join("inbox");
    for dir in [&watch, &inbox] {
        tokio::fs::create_dir(dir).await.unwrap();
    }
    seed(&watch, "memo.m4a").await;

    let reminder = RuleRecord {
        transcript: "subject".to_string(),
        filename: None,
        timestamp: false,
        email: Some("me@example.com".to_string()),
        keepaudiofile: Some("archive".to_string()),
    };
    let mailer = Arc::new(RecordingMailer::default());
    let dispatcher = Dispatcher::new(
        store(vec![("default", file_rule(&inbox)), ("reminder", reminder)]),
        Some(MailerHandle {
            settings: smtp_settings(),
            transport: mailer.clone(),
        }),
    );
    let transcriber = StubTranscriber::new(&[("memo.m4a", "Reminder: call the dentist")]);

    let outcome = watcher_for(&watch)
        .run_once(&transcriber, &dispatcher)
        .await
        .unwrap();
    match outcome {
        CycleOutcome::Dispatched(Outcome::Emailed { recipient }) => {
            assert_eq!(recipient, "me@example.com")
        }
        other => panic!("expected emailed outcome, got {:?}", other),
    }

    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let message = &sent[0];
    assert_eq!(message.to, "me@example.com");
    assert_eq!(message.from, "bot@example.com");
    assert_eq!(message.subject, "call the dentist");
    assert_eq!(message.body, ".");
    let attachment = message.attachment.as_ref().expect("audio attached");
    assert_eq!(attachment.file_name, "memo.m4a");
    assert_eq!(attachment.bytes, b"fake audio");

    // Sent and attached, so the source is gone even with keepaudiofile set.
    assert!(!watch.join("memo.m4a").exists());
}

#[tokio::test]
async fn body_rule_uses_fixed_subject_and_no_attachment() {
    let temp = TempDir::new().unwrap();
    let watch = temp.path().join("watch");
    let inbox = temp.path().join("inbox");
    for dir in [&watch, &inbox] {
        tokio::fs::create_dir(dir).await.unwrap();
    }
    seed(&watch, "memo.mp3").await;

    let note = RuleRecord {
        transcript: "body".to_string(),
        filename: None,
        timestamp: false,
        email: Some("me@example.com".to_string()),
        keepaudiofile: None,
    };
    let mailer = Arc::new(RecordingMailer::default());
    let dispatcher = Dispatcher::new(
        store(vec![("default", file_rule(&inbox)), ("note", note)]),
        Some(MailerHandle {
            settings: smtp_settings(),
            transport: mailer.clone(),
        }),
    );
    let transcriber = StubTranscriber::new(&[("memo.mp3", "Note remember the milk")]);

    watcher_for(&watch)
        .run_once(&transcriber, &dispatcher)
        .await
        .unwrap();

    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Whisper AI transcript");
    assert_eq!(sent[0].body, "remember the milk");
    assert!(sent[0].attachment.is_none());
}

#[tokio::test]
async fn transport_failure_preserves_the_audio() {
    let temp = TempDir::new().unwrap();
    let watch = temp.path().join("watch");
    let inbox = temp.path().join("inbox");
    for dir in [&watch, &inbox] {
        tokio::fs::create_dir(dir).await.unwrap();
    }
    seed(&watch, "memo.wav").await;

    let note = RuleRecord {
        transcript: "body".to_string(),
        filename: None,
        timestamp: false,
        email: Some("me@example.com".to_string()),
        keepaudiofile: None,
    };
    let dispatcher = Dispatcher::new(
        store(vec![("default", file_rule(&inbox)), ("note", note)]),
        Some(MailerHandle {
            settings: smtp_settings(),
            transport: Arc::new(FailingMailer),
        }),
    );
    let transcriber = StubTranscriber::new(&[("memo.wav", "Note hello")]);

    let outcome = watcher_for(&watch)
        .run_once(&transcriber, &dispatcher)
        .await
        .unwrap();

    // The job dead-letters; the recording is parked, not deleted.
    match outcome {
        CycleOutcome::DeadLettered { file_name, .. } => assert_eq!(file_name, "memo.wav"),
        other => panic!("expected dead-letter, got {:?}", other),
    }
    assert!(watch.join(DEAD_LETTER_DIR).join("memo.wav").exists());
}

#[tokio::test]
async fn collision_rename_matches_embed_reference() {
    let temp = TempDir::new().unwrap();
    let watch = temp.path().join("watch");
    let inbox = temp.path().join("inbox");
    let archive = temp.path().join("archive");
    for dir in [&watch, &inbox, &archive] {
        tokio::fs::create_dir(dir).await.unwrap();
    }
    seed(&watch, "rec.wav").await;
    tokio::fs::write(archive.join("rec.wav"), b"previous take")
        .await
        .unwrap();

    let mut save = file_rule(&inbox);
    save.keepaudiofile = Some(archive.to_string_lossy().into_owned());
    let dispatcher = Dispatcher::new(
        store(vec![("default", file_rule(&inbox)), ("save", save)]),
        None,
    );
    let transcriber = StubTranscriber::new(&[("rec.wav", "Save second take")]);

    watcher_for(&watch)
        .run_once(&transcriber, &dispatcher)
        .await
        .unwrap();

    let content = tokio::fs::read_to_string(inbox.join("rec.md")).await.unwrap();
    let embed = content
        .lines()
        .find(|l| l.starts_with("![["))
        .expect("embed line");
    let moved = embed.trim_start_matches("![[").trim_end_matches("]]");

    // Disambiguated name, and no dangling reference: the file exists.
    assert_ne!(moved, "rec.wav");
    assert!(moved.starts_with("rec_") && moved.ends_with(".wav"));
    assert!(archive.join(moved).exists());
    assert_eq!(
        tokio::fs::read(archive.join("rec.wav")).await.unwrap(),
        b"previous take"
    );
    assert!(!watch.join("rec.wav").exists());
}

#[tokio::test]
async fn empty_transcript_dead_letters_without_routing() {
    let temp = TempDir::new().unwrap();
    let watch = temp.path().join("watch");
    let inbox = temp.path().join("inbox");
    for dir in [&watch, &inbox] {
        tokio::fs::create_dir(dir).await.unwrap();
    }
    seed(&watch, "silence.wav").await;

    let dispatcher = Dispatcher::new(store(vec![("default", file_rule(&inbox))]), None);
    let transcriber = StubTranscriber::new(&[("silence.wav", "   ")]);

    let outcome = watcher_for(&watch)
        .run_once(&transcriber, &dispatcher)
        .await
        .unwrap();

    match outcome {
        CycleOutcome::DeadLettered { reason, .. } => assert_eq!(reason, "empty transcript"),
        other => panic!("expected dead-letter, got {:?}", other),
    }
    assert!(watch.join(DEAD_LETTER_DIR).join("silence.wav").exists());
    assert!(!inbox.join("silence.md").exists());
}

#[tokio::test]
async fn foreign_extensions_are_ignored() {
    let temp = TempDir::new().unwrap();
    let watch = temp.path().join("watch");
    let inbox = temp.path().join("inbox");
    for dir in [&watch, &inbox] {
        tokio::fs::create_dir(dir).await.unwrap();
    }
    tokio::fs::write(watch.join("readme.txt"), b"not audio")
        .await
        .unwrap();

    let dispatcher = Dispatcher::new(store(vec![("default", file_rule(&inbox))]), None);
    let transcriber = StubTranscriber::new(&[]);

    let outcome = watcher_for(&watch)
        .run_once(&transcriber, &dispatcher)
        .await
        .unwrap();

    assert!(matches!(outcome, CycleOutcome::Idle));
    assert!(watch.join("readme.txt").exists());
}

#[tokio::test]
async fn one_file_per_cycle_in_name_order() {
    let temp = TempDir::new().unwrap();
    let watch = temp.path().join("watch");
    let inbox = temp.path().join("inbox");
    for dir in [&watch, &inbox] {
        tokio::fs::create_dir(dir).await.unwrap();
    }
    seed(&watch, "b.wav").await;
    seed(&watch, "a.wav").await;

    let dispatcher = Dispatcher::new(store(vec![("default", file_rule(&inbox))]), None);
    let transcriber = StubTranscriber::new(&[("a.wav", "first memo"), ("b.wav", "second memo")]);
    let watcher = watcher_for(&watch);

    watcher.run_once(&transcriber, &dispatcher).await.unwrap();

    // Only the alphabetically-first file was consumed this cycle.
    assert!(!watch.join("a.wav").exists());
    assert!(watch.join("b.wav").exists());
    assert!(inbox.join("a.md").exists());
    assert!(!inbox.join("b.md").exists());

    watcher.run_once(&transcriber, &dispatcher).await.unwrap();
    assert!(!watch.join("b.wav").exists());
    assert!(inbox.join("b.md").exists());
}
