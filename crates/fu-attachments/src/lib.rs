//! # fu-attachments
//!
//! Upload and attachment lifecycle for Flow Uploader.
//!
//! ## Features
//!
//! - Byte source abstraction (local files, in-memory selections)
//! - Attachment store abstraction (local filesystem, in-memory)
//! - Ordered, duplicate-free attachment list with host/display projections
//! - Host notifications (attribute change, navigate next) and user toasts
//!
//! ## Example
//!
//! ```rust,ignore
//! use fu_attachments::{FileUploader, FileSelection, LocalByteSource, MemoryAttachmentStore};
//! use fu_attachments::{OutputNotifier, RecordingSink, SelectedFile};
//! use fu_core::UploaderConfig;
//! use std::sync::Arc;
//!
//! let sink = Arc::new(RecordingSink::new());
//! let uploader = FileUploader::new(
//!     UploaderConfig::for_record("001xx000003DGb2"),
//!     Arc::new(LocalByteSource::new()),
//!     Arc::new(MemoryAttachmentStore::new()),
//!     OutputNotifier::with_sink(sink.clone()),
//! );
//!
//! uploader.initialize().await?;
//! let attachment = uploader
//!     .upload(FileSelection::single(SelectedFile::from_path("report.pdf")))
//!     .await?;
//! ```

pub mod error;
pub mod list;
pub mod model;
pub mod notifier;
pub mod pipeline;
pub mod source;
pub mod store;
pub mod uploader;

pub use error::{AttachmentError, AttachmentResult};
pub use list::AttachmentList;
pub use model::{
    AttachmentRecord, AttachmentRef, Badge, EncodedPayload, FileHandle, FileSelection,
    PendingUpload, ReadPayload, SelectedFile,
};
pub use notifier::{
    ChannelSink, HostEvent, HostSink, OutputNotifier, RecordingSink, SinkError, SinkResult,
    Toast, ToastVariant, UiSink, ATTACHMENT_IDS_ATTRIBUTE,
};
pub use pipeline::{UploadPhase, UploadPipeline};
pub use source::{ByteSource, LocalByteSource, SourceError, SourceResult};
pub use store::{
    AttachmentStore, StoreGate, LocalAttachmentStore, MemoryAttachmentStore, StoreError,
    StoreResult, StoredRecord,
};
pub use uploader::{FileUploader, Removal};
