//! Upload Pipeline
//!
//! Turns a file-picker gesture into a stored attachment: read the file,
//! build the pending upload, hand it to the store. One upload may be in
//! flight per pipeline; a second gesture is rejected until the first
//! resolves.

use std::sync::Arc;

use fu_core::{FileTypeFilter, RecordId};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{AttachmentError, AttachmentResult};
use crate::model::{AttachmentRef, FileSelection, PendingUpload};
use crate::source::ByteSource;
use crate::store::AttachmentStore;

/// Where the in-flight upload currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPhase {
    Idle,
    Reading { filename: String },
    Storing { filename: String },
}

impl UploadPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Resets the phase to `Idle` however the upload ends
struct PhaseGuard<'a> {
    phase: &'a Mutex<UploadPhase>,
}

impl PhaseGuard<'_> {
    fn advance(&self, next: UploadPhase) {
        *self.phase.lock() = next;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        *self.phase.lock() = UploadPhase::Idle;
    }
}

/// Reads selected files and stores them under the parent record
pub struct UploadPipeline<B: ByteSource, St: AttachmentStore> {
    source: Arc<B>,
    store: Arc<St>,
    parent_id: RecordId,
    filter: FileTypeFilter,
    phase: Mutex<UploadPhase>,
}

impl<B: ByteSource, St: AttachmentStore> UploadPipeline<B, St> {
    pub fn new(source: Arc<B>, store: Arc<St>, parent_id: RecordId, filter: FileTypeFilter) -> Self {
        Self {
            source,
            store,
            parent_id,
            filter,
            phase: Mutex::new(UploadPhase::Idle),
        }
    }

    pub fn phase(&self) -> UploadPhase {
        self.phase.lock().clone()
    }

    /// Claim the in-flight slot, or fail if another upload holds it
    fn begin(&self, filename: &str) -> AttachmentResult<PhaseGuard<'_>> {
        let mut phase = self.phase.lock();
        if !phase.is_idle() {
            return Err(AttachmentError::UploadInProgress);
        }
        *phase = UploadPhase::Reading {
            filename: filename.to_string(),
        };
        Ok(PhaseGuard { phase: &self.phase })
    }

    /// Upload the single selected file and return its new attachment
    #[instrument(skip(self, selection), fields(parent = %self.parent_id, store = self.store.name()))]
    pub async fn submit(&self, selection: FileSelection) -> AttachmentResult<AttachmentRef> {
        let file = selection.into_single()?;

        if !self.filter.accepts(&file.name) {
            return Err(AttachmentError::UnsupportedFileType {
                filename: file.name,
                allowed: self.filter.to_string(),
            });
        }

        let guard = self.begin(&file.name)?;

        let read = self.source.read(&file).await.map_err(|e| {
            warn!(filename = %file.name, error = %e, "File read failed");
            AttachmentError::ReadFailure(e)
        })?;
        debug!(filename = %read.filename, encoded_len = read.payload.as_str().len(), "File read");

        let pending = PendingUpload::new(read, self.parent_id.clone());
        guard.advance(UploadPhase::Storing {
            filename: pending.filename.clone(),
        });

        let result = self
            .store
            .create(&pending.payload, &pending.filename, &pending.parent_id)
            .await;
        let PendingUpload { filename, .. } = pending;

        match result {
            Ok(record) => {
                info!(id = %record.id, filename = %filename, title = %record.title, "Attachment uploaded");
                Ok(AttachmentRef::from(record))
            }
            Err(e) => {
                warn!(filename = %filename, error = %e, "Attachment store failed");
                Err(AttachmentError::StoreFailure(e))
            }
        }
    }
}
