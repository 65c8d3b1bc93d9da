//! Byte Sources
//!
//! Turn a selected file into a base64 payload ready for the store.

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, instrument};

use crate::model::{EncodedPayload, FileHandle, ReadPayload, SelectedFile};

/// Byte source errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Unreadable file: {0}")]
    Unreadable(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Reads the contents of a selected file
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Read the whole file and encode it
    async fn read(&self, file: &SelectedFile) -> SourceResult<ReadPayload>;
}

/// Byte source backed by the local filesystem
#[derive(Debug, Clone, Default)]
pub struct LocalByteSource;

impl LocalByteSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ByteSource for LocalByteSource {
    #[instrument(skip(self, file), fields(filename = %file.name))]
    async fn read(&self, file: &SelectedFile) -> SourceResult<ReadPayload> {
        let payload = match &file.handle {
            FileHandle::Path(path) => {
                let metadata = fs::metadata(path).await?;
                if !metadata.is_file() {
                    return Err(SourceError::Unreadable(path.display().to_string()));
                }
                let data = fs::read(path).await?;
                debug!(path = ?path, size = data.len(), "File read");
                EncodedPayload::encode(&data)
            }
            FileHandle::Inline(data) => EncodedPayload::encode(data),
        };

        Ok(ReadPayload {
            filename: file.name.clone(),
            payload,
        })
    }
}
