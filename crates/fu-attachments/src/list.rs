//! Attachment List
//!
//! The ordered set of files attached by one uploader. Both projections
//! (bare ids for the host, id + name for display) are read from the same
//! backing vector, so they cannot drift apart.

use fu_core::AttachmentId;
use tracing::debug;

use crate::error::{AttachmentError, AttachmentResult};
use crate::model::{AttachmentRef, Badge};

/// Ordered, duplicate-free list of attachments
#[derive(Debug, Clone)]
pub struct AttachmentList {
    entries: Vec<AttachmentRef>,
    hydration_open: bool,
}

impl Default for AttachmentList {
    fn default() -> Self {
        Self::new()
    }
}

impl AttachmentList {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            hydration_open: true,
        }
    }

    pub fn contains(&self, id: &AttachmentId) -> bool {
        self.entries.iter().any(|e| e.id() == id)
    }

    /// Add an attachment at the tail
    pub fn append(&mut self, attachment: AttachmentRef) -> AttachmentResult<()> {
        if self.contains(attachment.id()) {
            return Err(AttachmentError::DuplicateId(attachment.id().clone()));
        }

        debug!(id = %attachment.id(), name = %attachment.display_name(), "Attachment appended");
        self.entries.push(attachment);
        self.hydration_open = false;
        Ok(())
    }

    /// Remove an attachment; absent ids are ignored
    pub fn remove(&mut self, id: &AttachmentId) -> Option<AttachmentRef> {
        let pos = self.entries.iter().position(|e| e.id() == id)?;
        self.hydration_open = false;
        debug!(id = %id, "Attachment removed");
        Some(self.entries.remove(pos))
    }

    /// Replace the whole list
    ///
    /// Allowed once, and only before any append or remove. A list with
    /// duplicate ids is rejected and the current state kept.
    pub fn hydrate(&mut self, attachments: Vec<AttachmentRef>) -> AttachmentResult<()> {
        if !self.hydration_open {
            return Err(AttachmentError::HydrationClosed);
        }

        for (i, attachment) in attachments.iter().enumerate() {
            if attachments[..i].iter().any(|a| a.id() == attachment.id()) {
                return Err(AttachmentError::DuplicateId(attachment.id().clone()));
            }
        }

        self.entries = attachments;
        self.hydration_open = false;
        Ok(())
    }

    /// Whether `hydrate` would still be accepted
    pub fn is_hydration_open(&self) -> bool {
        self.hydration_open
    }

    /// Copy of the attachments in insertion order
    pub fn snapshot(&self) -> Vec<AttachmentRef> {
        self.entries.clone()
    }

    /// Id-only projection reported to the host
    pub fn ids(&self) -> Vec<AttachmentId> {
        self.entries.iter().map(|e| e.id().clone()).collect()
    }

    /// Display projection: `(id, name)` pairs
    pub fn display(&self) -> Vec<(AttachmentId, String)> {
        self.entries
            .iter()
            .map(|e| (e.id().clone(), e.display_name().to_string()))
            .collect()
    }

    pub fn badges(&self) -> Vec<Badge> {
        self.entries.iter().map(Badge::from).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
