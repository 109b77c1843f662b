use super::{
    Attachment, Document, DocumentStore, IndexState, NewNote, Note, StoreError,
};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// On-disk layout of a library file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryFile {
    #[serde(default)]
    pub documents: Vec<LibraryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    #[serde(flatten)]
    pub document: Document,
    #[serde(default)]
    pub attachments: Vec<LibraryAttachment>,
    #[serde(default)]
    pub notes: Vec<Note>,
}

impl LibraryEntry {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            attachments: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment, path: Option<PathBuf>) -> Self {
        self.attachments.push(LibraryAttachment { attachment, path });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryAttachment {
    #[serde(flatten)]
    pub attachment: Attachment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// [`DocumentStore`] backed by a JSON library file.
///
/// Relative attachment paths resolve against the library file's directory.
/// With a full-text directory configured, `<dir>/<attachment id>.txt` acts as
/// the index cache and indexing shells out to `pdftotext`.
pub struct JsonLibrary {
    path: Option<PathBuf>,
    fulltext_dir: Option<PathBuf>,
    state: RwLock<LibraryFile>,
}

impl JsonLibrary {
    /// In-memory library; note changes are kept but never written anywhere.
    pub fn in_memory(entries: Vec<LibraryEntry>) -> Self {
        Self {
            path: None,
            fulltext_dir: None,
            state: RwLock::new(LibraryFile { documents: entries }),
        }
    }

    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let content = async_fs::read_to_string(&path)
            .await
            .map_err(|e| StoreError::from_io(e, &path))?;
        let library: LibraryFile = serde_json::from_str(&content)?;
        info!(
            "Loaded library {:?} with {} documents",
            path,
            library.documents.len()
        );

        Ok(Self {
            path: Some(path),
            fulltext_dir: None,
            state: RwLock::new(library),
        })
    }

    pub fn with_fulltext_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fulltext_dir = Some(dir.into());
        self
    }

    pub async fn snapshot(&self) -> LibraryFile {
        self.state.read().await.clone()
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match self.path.as_ref().and_then(|p| p.parent()) {
            Some(base) => base.join(path),
            None => path.to_path_buf(),
        }
    }

    fn cache_path(&self, attachment: &Attachment) -> Option<PathBuf> {
        self.fulltext_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.txt", attachment.id)))
    }

    async fn locate_attachment(&self, attachment_id: &str) -> Option<LibraryAttachment> {
        let state = self.state.read().await;
        state
            .documents
            .iter()
            .flat_map(|entry| entry.attachments.iter())
            .find(|a| a.attachment.id == attachment_id)
            .cloned()
    }

    /// Apply `change` to a copy of the library, persist the copy, and only
    /// then make it the live state. A failed write leaves memory untouched.
    async fn commit<T, F>(&self, change: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut LibraryFile) -> Result<T, StoreError>,
    {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let value = change(&mut next)?;
        self.persist(&next).await?;
        *state = next;
        Ok(value)
    }

    /// Write the library back atomically (temp file, then rename).
    async fn persist(&self, library: &LibraryFile) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let content = serde_json::to_string_pretty(library)?;
        let temp_file = path.with_extension("json.tmp");
        async_fs::write(&temp_file, content)
            .await
            .map_err(|e| StoreError::from_io(e, &temp_file))?;
        async_fs::rename(&temp_file, path)
            .await
            .map_err(|e| StoreError::from_io(e, path))?;
        debug!("Persisted library to {:?}", path);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for JsonLibrary {
    async fn document(&self, document_id: &str) -> Result<Option<Document>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .iter()
            .find(|e| e.document.id == document_id)
            .map(|e| e.document.clone()))
    }

    async fn documents(&self) -> Result<Vec<Document>, StoreError> {
        let state = self.state.read().await;
        Ok(state.documents.iter().map(|e| e.document.clone()).collect())
    }

    async fn attachments(&self, document_id: &str) -> Result<Vec<Attachment>, StoreError> {
        let state = self.state.read().await;
        let entry = state
            .documents
            .iter()
            .find(|e| e.document.id == document_id)
            .ok_or_else(|| StoreError::NotFound(format!("document {}", document_id)))?;
        Ok(entry
            .attachments
            .iter()
            .map(|a| a.attachment.clone())
            .collect())
    }

    async fn attachment_path(&self, attachment: &Attachment) -> Result<Option<PathBuf>, StoreError> {
        Ok(self
            .locate_attachment(&attachment.id)
            .await
            .and_then(|a| a.path)
            .map(|p| self.resolve_path(&p)))
    }

    async fn index_state(&self, attachment: &Attachment) -> Result<IndexState, StoreError> {
        let Some(cache) = self.cache_path(attachment) else {
            return Ok(IndexState::Unavailable);
        };
        Ok(if async_fs::try_exists(&cache).await.unwrap_or(false) {
            IndexState::Indexed
        } else {
            IndexState::Unindexed
        })
    }

    async fn index_attachment(&self, attachment: &Attachment) -> Result<(), StoreError> {
        let cache = self
            .cache_path(attachment)
            .ok_or_else(|| StoreError::IndexerUnavailable("no full-text directory configured".into()))?;
        let source = self
            .attachment_path(attachment)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("file for attachment {}", attachment.id)))?;
        let pdftotext = which::which("pdftotext")
            .map_err(|e| StoreError::IndexerUnavailable(format!("pdftotext not found: {}", e)))?;

        if let Some(parent) = cache.parent() {
            async_fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::from_io(e, parent))?;
        }

        debug!("Indexing {:?} with {:?}", source, pdftotext);
        let output = tokio::process::Command::new(&pdftotext)
            .arg("-enc")
            .arg("UTF-8")
            .arg(&source)
            .arg(&cache)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("pdftotext failed for {:?}: {}", source, stderr.trim());
            return Err(StoreError::Other(format!(
                "pdftotext exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    async fn indexed_text(&self, attachment: &Attachment) -> Result<Option<String>, StoreError> {
        let Some(cache) = self.cache_path(attachment) else {
            return Ok(None);
        };
        match async_fs::read_to_string(&cache).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::from_io(e, &cache)),
        }
    }

    async fn notes(&self, document_id: &str) -> Result<Vec<Note>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .iter()
            .find(|e| e.document.id == document_id)
            .map(|e| e.notes.clone())
            .unwrap_or_default())
    }

    async fn save_note(&self, document_id: &str, note: NewNote) -> Result<String, StoreError> {
        self.commit(|library| {
            let entry = library
                .documents
                .iter_mut()
                .find(|e| e.document.id == document_id)
                .ok_or_else(|| StoreError::NotFound(format!("document {}", document_id)))?;

            let id = Uuid::new_v4().to_string();
            entry.notes.push(Note {
                id: id.clone(),
                content: note.content,
                tags: note.tags,
                date_modified: Utc::now(),
            });
            Ok(id)
        })
        .await
    }

    async fn update_note(&self, note_id: &str, note: NewNote) -> Result<(), StoreError> {
        self.commit(|library| {
            let existing = library
                .documents
                .iter_mut()
                .flat_map(|e| e.notes.iter_mut())
                .find(|n| n.id == note_id)
                .ok_or_else(|| StoreError::NotFound(format!("note {}", note_id)))?;

            existing.content = note.content;
            existing.tags = note.tags;
            existing.date_modified = Utc::now();
            Ok(())
        })
        .await
    }

    async fn delete_note(&self, note_id: &str) -> Result<(), StoreError> {
        self.commit(|library| {
            let mut removed = false;
            for entry in library.documents.iter_mut() {
                let before = entry.notes.len();
                entry.notes.retain(|n| n.id != note_id);
                removed |= entry.notes.len() != before;
            }
            if removed {
                Ok(())
            } else {
                Err(StoreError::NotFound(format!("note {}", note_id)))
            }
        })
        .await
    }
}
