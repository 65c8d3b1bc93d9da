//! # fu-core
//!
//! Core types and configuration for Flow Uploader.
//!
//! This crate provides the building blocks shared by the other crates:
//! - Opaque identifiers for attachments and parent records
//! - The host configuration read once when an uploader is constructed
//! - File-type filtering for the upload gesture

pub mod config;
pub mod types;

pub use crate::config::{ConfigError, FileTypeFilter, UploaderConfig, DEFAULT_BUTTON_LABEL};
pub use crate::types::{AttachmentId, RecordId};
