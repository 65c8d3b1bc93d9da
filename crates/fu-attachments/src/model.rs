//! Attachment model
//!
//! Types that flow through an upload: the typed file-picker gesture, the
//! encoded payload, the transient pending upload and the attachment
//! references kept by the list.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use fu_core::{AttachmentId, RecordId};
use serde::{Deserialize, Serialize};

use crate::error::{AttachmentError, AttachmentResult};

/// Where the bytes of a selected file live
#[derive(Debug, Clone)]
pub enum FileHandle {
    /// A file on the local filesystem
    Path(PathBuf),
    /// Bytes already held in memory (drag and drop, tests)
    Inline(Bytes),
}

/// A single file chosen by the user
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub handle: FileHandle,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, handle: FileHandle) -> Self {
        Self {
            name: name.into(),
            handle,
        }
    }

    /// Select a file on disk, named after its last path component
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(name, FileHandle::Path(path.to_path_buf()))
    }

    pub fn inline(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::new(name, FileHandle::Inline(data.into()))
    }
}

/// The file-picker gesture
#[derive(Debug, Clone, Default)]
pub struct FileSelection {
    pub files: Vec<SelectedFile>,
}

impl FileSelection {
    pub fn new(files: Vec<SelectedFile>) -> Self {
        Self { files }
    }

    pub fn single(file: SelectedFile) -> Self {
        Self { files: vec![file] }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Extract the one selected file
    ///
    /// Fails with `NoFileSelected` when the selection is empty or the file has
    /// no name, and with `MultipleFilesSelected` when more than one file is
    /// present.
    pub fn into_single(self) -> AttachmentResult<SelectedFile> {
        let mut files = self.files;
        match files.len() {
            0 => Err(AttachmentError::NoFileSelected),
            1 => {
                let file = files.remove(0);
                if file.name.trim().is_empty() {
                    return Err(AttachmentError::NoFileSelected);
                }
                Ok(file)
            }
            n => Err(AttachmentError::MultipleFilesSelected(n)),
        }
    }
}

/// Base64 encoded file contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedPayload(String);

impl EncodedPayload {
    /// Encode raw bytes
    pub fn encode(data: &[u8]) -> Self {
        Self(STANDARD.encode(data))
    }

    /// Wrap an already encoded string
    pub fn from_base64(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn decode(&self) -> Result<Bytes, base64::DecodeError> {
        STANDARD.decode(&self.0).map(Bytes::from)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Output of a byte source read
#[derive(Debug, Clone)]
pub struct ReadPayload {
    pub filename: String,
    pub payload: EncodedPayload,
}

/// An upload that has been read but not yet stored
///
/// Lives only between the file read and the store call resolving.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub filename: String,
    pub payload: EncodedPayload,
    pub parent_id: RecordId,
}

impl PendingUpload {
    pub fn new(read: ReadPayload, parent_id: RecordId) -> Self {
        Self {
            filename: read.filename,
            payload: read.payload,
            parent_id,
        }
    }
}

/// Attachment metadata as returned by a bulk store query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub id: AttachmentId,
    pub title: String,
}

impl AttachmentRecord {
    pub fn new(id: impl Into<AttachmentId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// An attached file as shown to the user
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentRef {
    id: AttachmentId,
    display_name: String,
}

impl AttachmentRef {
    pub fn new(id: impl Into<AttachmentId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }

    pub fn id(&self) -> &AttachmentId {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

impl From<AttachmentRecord> for AttachmentRef {
    fn from(record: AttachmentRecord) -> Self {
        Self::new(record.id, record.title)
    }
}

/// A pill shown for an attached file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub id: AttachmentId,
    pub label: String,
}

impl From<&AttachmentRef> for Badge {
    fn from(attachment: &AttachmentRef) -> Self {
        Self {
            id: attachment.id().clone(),
            label: attachment.display_name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_selection() {
        let result = FileSelection::empty().into_single();
        assert!(matches!(result, Err(AttachmentError::NoFileSelected)));
    }

    #[test]
    fn test_unnamed_file_is_rejected() {
        let result = FileSelection::single(SelectedFile::inline("  ", "data")).into_single();
        assert!(matches!(result, Err(AttachmentError::NoFileSelected)));
    }

    #[test]
    fn test_multiple_files_rejected() {
        let selection = FileSelection::new(vec![
            SelectedFile::inline("a.txt", "a"),
            SelectedFile::inline("b.txt", "b"),
        ]);
        assert!(matches!(
            selection.into_single(),
            Err(AttachmentError::MultipleFilesSelected(2))
        ));
    }

    #[test]
    fn test_from_path_uses_file_name() {
        let file = SelectedFile::from_path("/tmp/reports/report.pdf");
        assert_eq!(file.name, "report.pdf");
        assert!(matches!(file.handle, FileHandle::Path(_)));
    }

    #[test]
    fn test_payload_encoding() {
        let payload = EncodedPayload::encode(b"Hello, World!");
        assert_eq!(payload.as_str(), "SGVsbG8sIFdvcmxkIQ==");
        assert_eq!(payload.decode().unwrap(), Bytes::from("Hello, World!"));
    }

    #[test]
    fn test_record_to_ref() {
        let attachment: AttachmentRef = AttachmentRecord::new("068xx001", "report.pdf").into();
        assert_eq!(attachment.id().as_str(), "068xx001");
        assert_eq!(attachment.display_name(), "report.pdf");

        let badge = Badge::from(&attachment);
        assert_eq!(badge.label, "report.pdf");
    }
}
