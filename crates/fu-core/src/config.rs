//! Host configuration and loading
//!
//! The host workflow configures an uploader once, at construction. Values
//! come from an optional config file layered under `FLOW_UPLOADER_*`
//! environment variables.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{AttachmentId, RecordId};

/// Label used for the upload button when the host does not supply one
pub const DEFAULT_BUTTON_LABEL: &str = "Upload";

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "FLOW_UPLOADER";

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config source error: {0}")]
    Source(#[from] ::config::ConfigError),
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Uploader configuration supplied by the host workflow
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UploaderConfig {
    /// Record the uploaded files are attached to
    pub parent_record_id: RecordId,
    /// Accepted file types (extensions, MIME types or `type/*` wildcards)
    pub allowed_file_types: Vec<String>,
    /// Label of the upload button
    pub button_label: String,
    /// Request navigation to the next step after a successful upload
    pub advance_on_upload: bool,
    /// Show attached files as badges
    pub show_attachment_badges: bool,
    /// Attachments that already exist when the uploader starts
    pub initial_attachment_ids: Vec<AttachmentId>,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            parent_record_id: RecordId::default(),
            allowed_file_types: Vec::new(),
            button_label: DEFAULT_BUTTON_LABEL.to_string(),
            advance_on_upload: false,
            show_attachment_badges: true,
            initial_attachment_ids: Vec::new(),
        }
    }
}

impl UploaderConfig {
    /// Create a configuration for the given parent record
    pub fn for_record(parent_record_id: impl Into<RecordId>) -> Self {
        Self {
            parent_record_id: parent_record_id.into(),
            ..Self::default()
        }
    }

    pub fn with_allowed_file_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_file_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_advance_on_upload(mut self, advance: bool) -> Self {
        self.advance_on_upload = advance;
        self
    }

    pub fn with_initial_attachment_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<AttachmentId>,
    {
        self.initial_attachment_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_button_label(mut self, label: impl Into<String>) -> Self {
        self.button_label = label.into();
        self
    }

    pub fn with_badges(mut self, show: bool) -> Self {
        self.show_attachment_badges = show;
        self
    }

    /// Load and validate configuration from an optional file, then
    /// environment variables
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration without validating it, so callers can apply
    /// overrides first
    pub fn read(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading uploader config file");
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .list_separator(",")
                .with_list_parse_key("allowed_file_types")
                .with_list_parse_key("initial_attachment_ids"),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parent_record_id.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "parent_record_id".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        if let Some(blank) = self.allowed_file_types.iter().find(|t| t.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                key: "allowed_file_types".to_string(),
                message: format!("blank entry {:?}", blank),
            });
        }

        Ok(())
    }

    /// File-type filter built from `allowed_file_types`
    pub fn file_filter(&self) -> FileTypeFilter {
        FileTypeFilter::new(&self.allowed_file_types)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FileTypeRule {
    /// Lowercase extension without the leading dot
    Extension(String),
    /// Exact MIME essence, e.g. `application/pdf`
    Mime(String),
    /// Top-level MIME type from a `type/*` wildcard
    MimeWildcard(String),
}

impl FileTypeRule {
    fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim().to_ascii_lowercase();
        if entry.is_empty() {
            return None;
        }

        if let Some((top, sub)) = entry.split_once('/') {
            if sub == "*" {
                return Some(Self::MimeWildcard(top.to_string()));
            }
            return Some(Self::Mime(entry));
        }

        Some(Self::Extension(entry.trim_start_matches('.').to_string()))
    }
}

/// Accepted file types for the upload gesture
///
/// An empty filter accepts every file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTypeFilter {
    rules: Vec<FileTypeRule>,
}

impl FileTypeFilter {
    pub fn new<S: AsRef<str>>(entries: &[S]) -> Self {
        Self {
            rules: entries
                .iter()
                .filter_map(|e| FileTypeRule::parse(e.as_ref()))
                .collect(),
        }
    }

    /// Parse a comma separated list such as `".pdf,.png,image/*"`
    pub fn parse(list: &str) -> Self {
        let entries: Vec<&str> = list.split(',').collect();
        Self::new(&entries)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check whether a file with this name may be uploaded
    pub fn accepts(&self, filename: &str) -> bool {
        if self.rules.is_empty() {
            return true;
        }

        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let mime = mime_guess::from_path(filename).first();

        self.rules.iter().any(|rule| match rule {
            FileTypeRule::Extension(ext) => extension.as_deref() == Some(ext.as_str()),
            FileTypeRule::Mime(essence) => mime
                .as_ref()
                .map(|m| m.essence_str() == essence)
                .unwrap_or(false),
            FileTypeRule::MimeWildcard(top) => mime
                .as_ref()
                .map(|m| m.type_().as_str() == top)
                .unwrap_or(false),
        })
    }
}

impl std::fmt::Display for FileTypeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .rules
            .iter()
            .map(|rule| match rule {
                FileTypeRule::Extension(ext) => format!(".{}", ext),
                FileTypeRule::Mime(essence) => essence.clone(),
                FileTypeRule::MimeWildcard(top) => format!("{}/*", top),
            })
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = UploaderConfig::default();
        assert_eq!(config.button_label, "Upload");
        assert!(!config.advance_on_upload);
        assert!(config.show_attachment_badges);
        assert!(config.initial_attachment_ids.is_empty());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_helpers() {
        let config = UploaderConfig::for_record("001xx")
            .with_allowed_file_types([".pdf"])
            .with_advance_on_upload(true)
            .with_initial_attachment_ids(["a", "b"]);

        assert!(config.validate().is_ok());
        assert!(config.advance_on_upload);
        assert_eq!(config.initial_attachment_ids.len(), 2);
        assert!(config.file_filter().accepts("report.pdf"));
    }

    #[test]
    fn test_empty_filter_accepts_everything() {
        let filter = FileTypeFilter::default();
        assert!(filter.accepts("anything.bin"));
        assert!(filter.accepts("noextension"));
    }

    #[test]
    fn test_extension_rules() {
        let filter = FileTypeFilter::parse(".pdf, PNG");
        assert!(filter.accepts("report.pdf"));
        assert!(filter.accepts("REPORT.PDF"));
        assert!(filter.accepts("scan.png"));
        assert!(!filter.accepts("notes.txt"));
        assert!(!filter.accepts("pdf"));
    }

    #[test]
    fn test_mime_rules() {
        let filter = FileTypeFilter::new(&["application/pdf", "image/*"]);
        assert!(filter.accepts("report.pdf"));
        assert!(filter.accepts("photo.jpeg"));
        assert!(filter.accepts("diagram.png"));
        assert!(!filter.accepts("archive.zip"));
    }

    #[test]
    fn test_filter_display() {
        let filter = FileTypeFilter::parse(".pdf,image/*,text/plain");
        assert_eq!(filter.to_string(), ".pdf,image/*,text/plain");
    }

    #[test]
    fn test_validate_rejects_blank_type() {
        let config = UploaderConfig::for_record("001xx").with_allowed_file_types([" "]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "allowed_file_types"
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{
                "parent_record_id": "001xx000003DGb2",
                "allowed_file_types": [".pdf", ".docx"],
                "button_label": "Attach",
                "advance_on_upload": true,
                "initial_attachment_ids": ["068xx001"]
            }}"#
        )
        .unwrap();

        let config = UploaderConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.parent_record_id.as_str(), "001xx000003DGb2");
        assert_eq!(config.allowed_file_types, vec![".pdf", ".docx"]);
        assert_eq!(config.button_label, "Attach");
        assert!(config.advance_on_upload);
        assert!(config.show_attachment_badges);
        assert_eq!(config.initial_attachment_ids, vec![AttachmentId::from("068xx001")]);
    }

    #[test]
    fn test_load_rejects_missing_parent() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{ "button_label": "Attach" }}"#).unwrap();

        let result = UploaderConfig::load(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
