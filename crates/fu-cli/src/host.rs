//! Host workflow stand-in
//!
//! Builds an uploader over the local store, runs the requested command and
//! collects everything the uploader emitted.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};

use fu_attachments::{
    AttachmentRef, ChannelSink, FileSelection, FileUploader, HostEvent, LocalAttachmentStore,
    LocalByteSource, OutputNotifier, SelectedFile,
};
use fu_core::{AttachmentId, UploaderConfig};

use crate::{Cli, Command};

/// What a command run produced
#[derive(Debug)]
pub struct Outcome {
    pub events: Vec<HostEvent>,
    pub attachments: Vec<AttachmentRef>,
    pub failures: usize,
}

pub async fn execute(cli: &Cli, mut config: UploaderConfig) -> anyhow::Result<Outcome> {
    let store = Arc::new(LocalAttachmentStore::new(&cli.store));

    // Without ids from the host, start from what the store holds for the parent
    if config.initial_attachment_ids.is_empty() {
        config.initial_attachment_ids = store
            .records_for_parent(&config.parent_record_id)
            .await
            .with_context(|| format!("reading store at {}", cli.store.display()))?
            .into_iter()
            .map(|r| r.id)
            .collect();
    }

    let (sink, mut rx) = ChannelSink::new();
    let uploader = FileUploader::new(
        config,
        Arc::new(LocalByteSource::new()),
        store,
        OutputNotifier::with_sink(Arc::new(sink)),
    );
    if let Err(e) = uploader.initialize().await {
        warn!(error = %e, "Starting without the host's attachments");
    }

    let mut failures = 0;
    match &cli.command {
        Command::Upload { files } => {
            for path in files {
                let selection = FileSelection::single(SelectedFile::from_path(path));
                match uploader.upload(selection).await {
                    Ok(attachment) => {
                        info!(id = %attachment.id(), file = %path.display(), "Uploaded")
                    }
                    Err(e) => {
                        error!(file = %path.display(), error = %e, "Upload failed");
                        failures += 1;
                    }
                }
            }
        }
        Command::List => {}
        Command::Remove { id } => {
            let id = AttachmentId::new(id.clone());
            match uploader.remove_attachment(&id).await {
                Some(removal) => {
                    if let Err(e) = removal.confirmed {
                        error!(id = %id, error = %e, "Delete not confirmed");
                        failures += 1;
                    }
                }
                None => {
                    error!(id = %id, "Attachment not attached to this record");
                    failures += 1;
                }
            }
        }
    }

    let attachments = uploader.attachments();
    drop(uploader);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    Ok(Outcome {
        events,
        attachments,
        failures,
    })
}
