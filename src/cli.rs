//! Command-line interface: startup flags and the relay run loop.
//!
//! There is deliberately no subcommand surface — the relay is configured by
//! its two JSON documents; the flags only say where to find them, which
//! whisper model to use, and where to watch.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::config::MailConfig;
use crate::dispatch::{Dispatcher, MailerHandle};
use crate::ingest::{RelayWatcher, WatcherConfig, WhisperTranscriber};
use crate::rules::RuleStore;
use crate::sink::{MailTransport, SmtpMailer};

/// voxroute - folder-watching speech-to-text relay
#[derive(Parser, Debug)]
#[command(name = "voxroute")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory to watch for dropped audio files
    #[arg(short, long, env = "VOXROUTE_WATCH_DIR")]
    pub watch_dir: PathBuf,

    /// Path to the routing rule document
    #[arg(long, default_value = "rules.json")]
    pub rules: PathBuf,

    /// Path to the mail relay configuration (optional; email rules fall
    /// back to the default rule without it)
    #[arg(long, default_value = "email.json")]
    pub email_config: PathBuf,

    /// Whisper model to transcribe with
    #[arg(short, long, env = "MODEL", default_value = "medium")]
    pub model: String,

    /// Seconds to sleep between polling cycles
    #[arg(long, default_value = "10")]
    pub interval: u64,

    /// Run a single polling cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        // Configuration errors are fatal before the poll loop starts.
        let rules = RuleStore::load(&self.rules)
            .with_context(|| format!("invalid rule document {}", self.rules.display()))?;
        info!("loaded {} routing rule(s) from {}", rules.len(), self.rules.display());

        let mail = MailConfig::load(&self.email_config)
            .with_context(|| format!("invalid mail configuration {}", self.email_config.display()))?;

        let mailer = match mail.as_ref().and_then(MailConfig::smtp) {
            Some(settings) => {
                info!("mail relay {}:{} as {}", settings.server, settings.port, settings.sender);
                let transport: Arc<dyn MailTransport> = Arc::new(SmtpMailer::new(&settings));
                Some(MailerHandle {
                    settings,
                    transport,
                })
            }
            None => {
                info!("mail configuration absent or incomplete; email rules will fall back to the default rule");
                None
            }
        };

        let dispatcher = Dispatcher::new(rules, mailer);
        let transcriber = WhisperTranscriber::new(&self.model);

        let mut watcher_config = WatcherConfig::new(&self.watch_dir);
        watcher_config.poll_interval_secs = self.interval;
        let watcher = RelayWatcher::with_config(watcher_config);

        if self.once {
            watcher.run_once(&transcriber, &dispatcher).await?;
            Ok(())
        } else {
            watcher.run(&transcriber, &dispatcher).await
        }
    }
}
