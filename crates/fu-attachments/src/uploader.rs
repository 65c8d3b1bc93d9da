//! File Uploader
//!
//! The component embedded in a host workflow. It owns the attachment list
//! and wires the upload pipeline, the store and the output notifier
//! together:
//!
//! - `initialize` hydrates the list from the host's starting ids
//! - `upload` runs one file-picker gesture through the pipeline
//! - `remove_attachment` drops an entry and deletes it from the store
//!
//! Every list mutation and its host notification happen under one lock, so
//! notifications are delivered in mutation order.

use std::collections::HashSet;
use std::sync::Arc;

use fu_core::{AttachmentId, UploaderConfig};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{AttachmentError, AttachmentResult};
use crate::list::AttachmentList;
use crate::model::{AttachmentRef, Badge, FileSelection};
use crate::notifier::OutputNotifier;
use crate::pipeline::{UploadPhase, UploadPipeline};
use crate::source::ByteSource;
use crate::store::{AttachmentStore, StoreError};

/// Result of removing an attachment
///
/// The list entry is gone as soon as this is returned; `confirmed` reports
/// whether the store also deleted it.
#[derive(Debug)]
pub struct Removal {
    pub attachment: AttachmentRef,
    pub confirmed: AttachmentResult<()>,
}

/// File upload component for a host workflow
pub struct FileUploader<B: ByteSource, St: AttachmentStore> {
    config: UploaderConfig,
    pipeline: UploadPipeline<B, St>,
    store: Arc<St>,
    list: Mutex<AttachmentList>,
    notifier: OutputNotifier,
}

impl<B: ByteSource, St: AttachmentStore> FileUploader<B, St> {
    pub fn new(
        config: UploaderConfig,
        source: Arc<B>,
        store: Arc<St>,
        notifier: OutputNotifier,
    ) -> Self {
        let pipeline = UploadPipeline::new(
            source,
            store.clone(),
            config.parent_record_id.clone(),
            config.file_filter(),
        );

        Self {
            config,
            pipeline,
            store,
            list: Mutex::new(AttachmentList::new()),
            notifier,
        }
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    pub fn button_label(&self) -> &str {
        &self.config.button_label
    }

    pub fn upload_phase(&self) -> UploadPhase {
        self.pipeline.phase()
    }

    /// Attached files in upload order
    pub fn attachments(&self) -> Vec<AttachmentRef> {
        self.list.lock().snapshot()
    }

    pub fn attachment_ids(&self) -> Vec<AttachmentId> {
        self.list.lock().ids()
    }

    /// Badges to display, empty when badges are disabled
    pub fn badges(&self) -> Vec<Badge> {
        if !self.config.show_attachment_badges {
            return Vec::new();
        }
        self.list.lock().badges()
    }

    /// Load the host's starting attachments
    ///
    /// A failed or partial fetch leaves the list empty and is only logged.
    /// Fails with `HydrationClosed` if the list already changed.
    #[instrument(skip(self), fields(parent = %self.config.parent_record_id))]
    pub async fn initialize(&self) -> AttachmentResult<()> {
        if self.config.initial_attachment_ids.is_empty() {
            debug!("No initial attachments");
            return Ok(());
        }

        if !self.list.lock().is_hydration_open() {
            return Err(AttachmentError::HydrationClosed);
        }

        let attachments = match self.fetch_initial().await {
            Ok(attachments) => attachments,
            Err(e) => {
                warn!(error = %e, "Hydration failed, starting with no attachments");
                Vec::new()
            }
        };

        let count = attachments.len();
        self.list.lock().hydrate(attachments).map_err(|e| {
            warn!(error = %e, "Hydration discarded");
            e
        })?;

        info!(count = count, "Attachment list hydrated");
        Ok(())
    }

    /// Fetch the starting attachments, all or nothing
    async fn fetch_initial(&self) -> AttachmentResult<Vec<AttachmentRef>> {
        let mut seen = HashSet::new();
        let ids: Vec<AttachmentId> = self
            .config
            .initial_attachment_ids
            .iter()
            .filter(|id| !id.is_empty() && seen.insert((*id).clone()))
            .cloned()
            .collect();

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let records = self
            .store
            .fetch_many(&ids)
            .await
            .map_err(AttachmentError::FetchFailure)?;

        ids.iter()
            .map(|id| {
                records
                    .iter()
                    .find(|r| &r.id == id)
                    .cloned()
                    .map(AttachmentRef::from)
                    .ok_or_else(|| AttachmentError::FetchFailure(StoreError::NotFound(id.clone())))
            })
            .collect()
    }

    /// Upload the selected file and attach it
    ///
    /// On success the host receives the full id list, the user a success
    /// toast and, with `advance_on_upload`, a navigation request. Failures
    /// leave the list untouched and show an error toast.
    #[instrument(skip(self, selection), fields(parent = %self.config.parent_record_id))]
    pub async fn upload(&self, selection: FileSelection) -> AttachmentResult<AttachmentRef> {
        let filename = selection
            .files
            .first()
            .map(|f| f.name.clone())
            .unwrap_or_else(|| "File".to_string());

        let result = self.pipeline.submit(selection).await.and_then(|attachment| {
            let mut list = self.list.lock();
            list.append(attachment.clone())?;
            let _ = self.notifier.notify(&list.ids());
            Ok(attachment)
        });

        match result {
            Ok(attachment) => {
                self.notifier.upload_succeeded(attachment.display_name());
                if self.config.advance_on_upload {
                    let _ = self.notifier.signal_advance();
                }
                Ok(attachment)
            }
            Err(e) => {
                warn!(filename = %filename, error = %e, retryable = e.is_retryable(), "Upload failed");
                self.notifier.upload_failed(&filename, &e);
                Err(e)
            }
        }
    }

    /// Remove an attachment from the list and delete it from the store
    ///
    /// The entry is removed before the store confirms; a failed delete is
    /// logged and shown to the user but not rolled back. Blank or unknown
    /// ids are a no-op and emit nothing.
    #[instrument(skip(self))]
    pub async fn remove_attachment(&self, id: &AttachmentId) -> Option<Removal> {
        if id.is_empty() {
            return None;
        }

        let attachment = {
            let mut list = self.list.lock();
            let removed = list.remove(id)?;
            let _ = self.notifier.notify(&list.ids());
            removed
        };

        let confirmed = match self.store.delete(id).await {
            Ok(()) => {
                info!(id = %id, "Attachment removed");
                Ok(())
            }
            Err(e) => {
                warn!(id = %id, error = %e, "Store delete failed, keeping local removal");
                self.notifier
                    .remove_failed(attachment.display_name(), &e);
                Err(AttachmentError::DeleteFailure(e))
            }
        };

        Some(Removal {
            attachment,
            confirmed,
        })
    }
}
