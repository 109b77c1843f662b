//! Host library collaborator.
//!
//! The pipeline reads documents, attachments and full-text caches through
//! [`DocumentStore`], and persists analysis notes through the same trait.
//! [`JsonLibrary`] is the bundled implementation backed by a JSON file.

pub mod json_library;

pub use json_library::{JsonLibrary, LibraryAttachment, LibraryEntry, LibraryFile};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bibliographic record for one library item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub creators: Vec<Creator>,
    /// Free-text date as entered by the user ("2021", "March 2019", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_note: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    /// Title for progress output; falls back to the id.
    pub fn label(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl Creator {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }
}

/// How the host stores an attachment's file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentLinkMode {
    ImportedFile,
    ImportedUrl,
    LinkedFile,
    LinkedUrl,
    EmbeddedImage,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    #[serde(default)]
    pub content_type: String,
    pub link_mode: AttachmentLinkMode,
}

impl Attachment {
    pub const PDF_CONTENT_TYPE: &'static str = "application/pdf";

    pub fn pdf(id: impl Into<String>, link_mode: AttachmentLinkMode) -> Self {
        Self {
            id: id.into(),
            content_type: Self::PDF_CONTENT_TYPE.to_string(),
            link_mode,
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.content_type.eq_ignore_ascii_case(Self::PDF_CONTENT_TYPE)
    }
}

/// Full-text index state of an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    Indexed,
    Partial,
    Unindexed,
    Unavailable,
}

/// Persisted annotation attached to a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub date_modified: DateTime<Utc>,
}

impl Note {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    pub content: String,
    pub tags: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("No full-text indexer available: {0}")]
    IndexerUnavailable(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Map an I/O error at `path` to the closest store error.
    pub fn from_io(error: std::io::Error, path: &Path) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(path.display().to_string()),
            std::io::ErrorKind::PermissionDenied => {
                StoreError::PermissionDenied(path.display().to_string())
            }
            std::io::ErrorKind::TimedOut => StoreError::Network(error.to_string()),
            _ => StoreError::Io(error),
        }
    }
}

/// Library access consumed by the extractor and the analysis engine
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn document(&self, document_id: &str) -> Result<Option<Document>, StoreError>;

    async fn documents(&self) -> Result<Vec<Document>, StoreError>;

    async fn attachments(&self, document_id: &str) -> Result<Vec<Attachment>, StoreError>;

    /// Resolved local path of the attachment's file, if it has one.
    async fn attachment_path(&self, attachment: &Attachment) -> Result<Option<PathBuf>, StoreError>;

    async fn read_binary(&self, path: &Path) -> Result<Vec<u8>, StoreError> {
        tokio::fs::read(path)
            .await
            .map_err(|e| StoreError::from_io(e, path))
    }

    async fn index_state(&self, attachment: &Attachment) -> Result<IndexState, StoreError>;

    async fn index_attachment(&self, attachment: &Attachment) -> Result<(), StoreError>;

    async fn indexed_text(&self, attachment: &Attachment) -> Result<Option<String>, StoreError>;

    async fn notes(&self, document_id: &str) -> Result<Vec<Note>, StoreError>;

    async fn save_note(&self, document_id: &str, note: NewNote) -> Result<String, StoreError>;

    async fn update_note(&self, note_id: &str, note: NewNote) -> Result<(), StoreError>;

    async fn delete_note(&self, note_id: &str) -> Result<(), StoreError>;
}
