//! Flow Uploader CLI
//!
//! Stands in for the host workflow: configures an uploader against a local
//! filesystem store, runs one command and prints the host events it
//! receives as JSON lines on stdout.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fu_core::{AttachmentId, RecordId, UploaderConfig};

mod host;

#[derive(Debug, Parser)]
#[command(name = "flow-uploader", version, about = "Attach files to a record")]
pub struct Cli {
    /// Config file (JSON, TOML or YAML)
    #[arg(long, short, env = "FLOW_UPLOADER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory of the local attachment store
    #[arg(long, env = "FLOW_UPLOADER_STORE", default_value = ".flow-uploader")]
    pub store: PathBuf,

    /// Parent record the files are attached to
    #[arg(long)]
    pub parent: Option<String>,

    /// Request navigation after a successful upload
    #[arg(long)]
    pub advance: bool,

    /// Attachment ids the host already holds
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload files, one gesture per file
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List attachments of the parent record
    List,
    /// Remove an attachment
    Remove { id: String },
}

impl Cli {
    /// Apply command line overrides on top of the loaded configuration
    pub fn apply(&self, config: &mut UploaderConfig) {
        if let Some(parent) = &self.parent {
            config.parent_record_id = RecordId::new(parent.clone());
        }
        if self.advance {
            config.advance_on_upload = true;
        }
        if !self.ids.is_empty() {
            config.initial_attachment_ids =
                self.ids.iter().map(|id| AttachmentId::new(id.clone())).collect();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let mut config = UploaderConfig::read(cli.config.as_deref()).context("loading configuration")?;
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        parent = %config.parent_record_id,
        store = %cli.store.display(),
        button = %config.button_label,
        "Starting flow uploader"
    );

    let outcome = host::execute(&cli, config).await?;

    for event in &outcome.events {
        println!("{}", serde_json::to_string(event)?);
    }
    if matches!(cli.command, Command::List) {
        println!("{}", serde_json::to_string(&outcome.attachments)?);
    }

    if outcome.failures > 0 {
        warn!(failures = outcome.failures, "Some operations failed");
        anyhow::bail!("{} operation(s) failed", outcome.failures);
    }
    Ok(())
}

/// Initialize tracing/logging on stderr
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fu_attachments=debug,fu_cli=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .init();
}
