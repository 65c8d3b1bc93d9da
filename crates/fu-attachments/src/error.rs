//! Upload lifecycle errors

use fu_core::AttachmentId;
use thiserror::Error;

use crate::source::SourceError;
use crate::store::StoreError;

/// Errors raised by the upload, hydration and removal flows
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("No file selected")]
    NoFileSelected,
    #[error("Expected exactly one file, got {0}")]
    MultipleFilesSelected(usize),
    #[error("File type not allowed: {filename} (allowed: {allowed})")]
    UnsupportedFileType { filename: String, allowed: String },
    #[error("An upload is already in progress")]
    UploadInProgress,
    #[error("Failed to read file: {0}")]
    ReadFailure(#[source] SourceError),
    #[error("Failed to store attachment: {0}")]
    StoreFailure(#[source] StoreError),
    #[error("Failed to fetch attachments: {0}")]
    FetchFailure(#[source] StoreError),
    #[error("Failed to delete attachment: {0}")]
    DeleteFailure(#[source] StoreError),
    #[error("Attachment already in list: {0}")]
    DuplicateId(AttachmentId),
    #[error("Attachment list can only be hydrated once, before any change")]
    HydrationClosed,
}

pub type AttachmentResult<T> = Result<T, AttachmentError>;

impl AttachmentError {
    /// Whether the user can sensibly retry the same gesture
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ReadFailure(_) | Self::StoreFailure(_) | Self::UploadInProgress
        )
    }
}
