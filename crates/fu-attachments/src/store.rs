//! Attachment Stores
//!
//! Durable storage for uploaded files, keyed by store-assigned attachment id.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use fu_core::{AttachmentId, RecordId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::model::{AttachmentRecord, EncodedPayload};

const RECORD_FILE: &str = "record.json";

/// Permits handed out when a paused memory store is released
const RELEASED_PERMITS: usize = 1024;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Attachment not found: {0}")]
    NotFound(AttachmentId),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),
    #[error("Invalid attachment id: {0}")]
    InvalidId(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Store backend error: {0}")]
    BackendError(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Attachment store trait
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Store a new attachment version under the parent record
    ///
    /// Returns the record as the store will report it from `fetch_many`,
    /// which may carry a normalized title.
    async fn create(
        &self,
        payload: &EncodedPayload,
        filename: &str,
        parent_id: &RecordId,
    ) -> StoreResult<AttachmentRecord>;

    /// Fetch metadata for the given ids; unknown ids are omitted
    async fn fetch_many(&self, ids: &[AttachmentId]) -> StoreResult<Vec<AttachmentRecord>>;

    /// Delete an attachment
    async fn delete(&self, id: &AttachmentId) -> StoreResult<()>;

    /// Store name for logging
    fn name(&self) -> &str;
}

/// Content type guessed from a filename
fn guess_content_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .to_string()
}

fn decode_payload(payload: &EncodedPayload) -> StoreResult<Bytes> {
    payload
        .decode()
        .map_err(|e| StoreError::InvalidPayload(e.to_string()))
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    record: AttachmentRecord,
    parent_id: RecordId,
    data: Bytes,
}

/// Handle that releases paused calls on a memory store
#[derive(Debug, Clone)]
pub struct StoreGate {
    semaphore: Arc<Semaphore>,
}

impl StoreGate {
    fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(0)),
        }
    }

    /// Let paused and future calls proceed
    pub fn release(&self) {
        self.semaphore.add_permits(RELEASED_PERMITS);
    }

    async fn pass(&self) -> StoreResult<()> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| StoreError::BackendError(e.to_string()))?;
        Ok(())
    }
}

/// In-memory attachment store for testing
pub struct MemoryAttachmentStore {
    entries: RwLock<Vec<MemoryEntry>>,
    next_id: AtomicU64,
    id_prefix: String,
    fail_create: AtomicBool,
    fail_fetch: AtomicBool,
    fail_delete: AtomicBool,
    create_gate: parking_lot::Mutex<Option<StoreGate>>,
    fetch_gate: parking_lot::Mutex<Option<StoreGate>>,
}

impl Default for MemoryAttachmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAttachmentStore {
    pub fn new() -> Self {
        Self::with_id_prefix("att")
    }

    /// Ids are generated as `<prefix><nnn>`, starting at 1
    pub fn with_id_prefix(prefix: impl Into<String>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            id_prefix: prefix.into(),
            fail_create: AtomicBool::new(false),
            fail_fetch: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            create_gate: parking_lot::Mutex::new(None),
            fetch_gate: parking_lot::Mutex::new(None),
        }
    }

    /// Insert an existing attachment
    pub async fn seed(
        &self,
        id: impl Into<AttachmentId>,
        title: impl Into<String>,
        parent_id: impl Into<RecordId>,
    ) {
        let mut entries = self.entries.write().await;
        entries.push(MemoryEntry {
            record: AttachmentRecord::new(id, title),
            parent_id: parent_id.into(),
            data: Bytes::new(),
        });
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Hold every `create` call until the returned gate is released
    pub fn pause_creates(&self) -> StoreGate {
        let gate = StoreGate::new();
        *self.create_gate.lock() = Some(gate.clone());
        gate
    }

    /// Hold every `fetch_many` call until the returned gate is released
    pub fn pause_fetches(&self) -> StoreGate {
        let gate = StoreGate::new();
        *self.fetch_gate.lock() = Some(gate.clone());
        gate
    }

    pub async fn contains(&self, id: &AttachmentId) -> bool {
        let entries = self.entries.read().await;
        entries.iter().any(|e| &e.record.id == id)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stored bytes and parent of an attachment
    pub async fn get(&self, id: &AttachmentId) -> Option<(Bytes, RecordId)> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .find(|e| &e.record.id == id)
            .map(|e| (e.data.clone(), e.parent_id.clone()))
    }
}

#[async_trait]
impl AttachmentStore for MemoryAttachmentStore {
    async fn create(
        &self,
        payload: &EncodedPayload,
        filename: &str,
        parent_id: &RecordId,
    ) -> StoreResult<AttachmentRecord> {
        let gate = self.create_gate.lock().clone();
        if let Some(gate) = gate {
            gate.pass().await?;
        }

        if self.fail_create.load(Ordering::SeqCst) {
            return Err(StoreError::BackendError("create rejected".to_string()));
        }

        let data = decode_payload(payload)?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = AttachmentId::new(format!("{}{:03}", self.id_prefix, n));

        let record = AttachmentRecord::new(id, filename);

        let mut entries = self.entries.write().await;
        entries.push(MemoryEntry {
            record: record.clone(),
            parent_id: parent_id.clone(),
            data,
        });

        Ok(record)
    }

    async fn fetch_many(&self, ids: &[AttachmentId]) -> StoreResult<Vec<AttachmentRecord>> {
        let gate = self.fetch_gate.lock().clone();
        if let Some(gate) = gate {
            gate.pass().await?;
        }

        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(StoreError::BackendError("fetch rejected".to_string()));
        }

        let entries = self.entries.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| entries.iter().find(|e| &e.record.id == id))
            .map(|e| e.record.clone())
            .collect())
    }

    async fn delete(&self, id: &AttachmentId) -> StoreResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StoreError::BackendError("delete rejected".to_string()));
        }

        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| &e.record.id != id);
        if entries.len() == before {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Metadata persisted next to each stored file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: AttachmentId,
    pub title: String,
    pub parent_id: RecordId,
    /// File size in bytes
    pub size: u64,
    /// MIME content type
    pub content_type: String,
    /// SHA256 digest
    pub digest: String,
    pub created_at: DateTime<Utc>,
}

impl From<StoredRecord> for AttachmentRecord {
    fn from(record: StoredRecord) -> Self {
        AttachmentRecord::new(record.id, record.title)
    }
}

/// Local filesystem attachment store
///
/// Layout: `<root>/<id>/<filename>` plus `<root>/<id>/record.json`.
pub struct LocalAttachmentStore {
    root: PathBuf,
}

impl LocalAttachmentStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an attachment id to its directory
    fn resolve_dir(&self, id: &AttachmentId) -> StoreResult<PathBuf> {
        let raw = id.as_str();
        if raw.is_empty()
            || raw.contains("..")
            || raw.contains('/')
            || raw.contains('\\')
        {
            return Err(StoreError::InvalidId(raw.to_string()));
        }
        Ok(self.root.join(raw))
    }

    /// Keep only the final path component of a user supplied filename
    fn sanitize_filename(filename: &str) -> StoreResult<String> {
        let name = filename
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or("")
            .trim();
        if name.is_empty() || name == "." || name == ".." || name == RECORD_FILE {
            return Err(StoreError::InvalidFilename(filename.to_string()));
        }
        Ok(name.to_string())
    }

    fn calculate_digest(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    /// Write the blob and its metadata into a fresh attachment directory
    ///
    /// Nothing is left behind on failure: a directory without a readable
    /// `record.json` could never be listed or deleted.
    async fn write_entry(
        &self,
        id: AttachmentId,
        payload: &EncodedPayload,
        filename: &str,
        parent_id: &RecordId,
    ) -> StoreResult<StoredRecord> {
        let name = Self::sanitize_filename(filename)?;
        let data = decode_payload(payload)?;

        let dir = self.resolve_dir(&id)?;
        fs::create_dir_all(&dir).await?;

        let record = StoredRecord {
            id,
            content_type: guess_content_type(&name),
            title: name,
            parent_id: parent_id.clone(),
            size: data.len() as u64,
            digest: Self::calculate_digest(&data),
            created_at: Utc::now(),
        };

        if let Err(e) = Self::write_files(&dir, &record, &data).await {
            if let Err(cleanup) = fs::remove_dir_all(&dir).await {
                warn!(dir = %dir.display(), error = %cleanup, "Failed to clean up attachment directory");
            }
            return Err(e);
        }
        Ok(record)
    }

    async fn write_files(dir: &Path, record: &StoredRecord, data: &[u8]) -> StoreResult<()> {
        let mut file = fs::File::create(dir.join(&record.title)).await?;
        file.write_all(data).await?;
        file.sync_all().await?;

        fs::write(dir.join(RECORD_FILE), serde_json::to_vec_pretty(record)?).await?;
        Ok(())
    }

    async fn read_record(&self, id: &AttachmentId) -> StoreResult<Option<StoredRecord>> {
        let path = self.resolve_dir(id)?.join(RECORD_FILE);
        match fs::read(&path).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All stored records belonging to a parent, oldest first
    pub async fn records_for_parent(&self, parent_id: &RecordId) -> StoreResult<Vec<StoredRecord>> {
        let mut records = Vec::new();

        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(records),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let id = AttachmentId::new(entry.file_name().to_string_lossy().into_owned());
            if let Some(record) = self.read_record(&id).await? {
                if &record.parent_id == parent_id {
                    records.push(record);
                }
            }
        }

        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }
}

#[async_trait]
impl AttachmentStore for LocalAttachmentStore {
    #[instrument(skip(self, payload), fields(store = "local"))]
    async fn create(
        &self,
        payload: &EncodedPayload,
        filename: &str,
        parent_id: &RecordId,
    ) -> StoreResult<AttachmentRecord> {
        let id = AttachmentId::new(Uuid::new_v4().simple().to_string());
        let record = self.write_entry(id, payload, filename, parent_id).await?;

        info!(id = %record.id, filename = %record.title, size = record.size, "Attachment stored");
        Ok(record.into())
    }

    #[instrument(skip(self), fields(store = "local", count = ids.len()))]
    async fn fetch_many(&self, ids: &[AttachmentId]) -> StoreResult<Vec<AttachmentRecord>> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.read_record(id).await? {
                Some(record) => records.push(record.into()),
                None => debug!(id = %id, "Attachment record missing"),
            }
        }
        Ok(records)
    }

    #[instrument(skip(self), fields(store = "local"))]
    async fn delete(&self, id: &AttachmentId) -> StoreResult<()> {
        let dir = self.resolve_dir(id)?;
        if !fs::try_exists(&dir).await? {
            return Err(StoreError::NotFound(id.clone()));
        }

        fs::remove_dir_all(&dir).await?;
        info!(id = %id, "Attachment deleted");
        Ok(())
    }

    fn name(&self) -> &str {
        "local"
    }
}
