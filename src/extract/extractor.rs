use crate::extract::cloud::is_cloud_placeholder;
use crate::extract::text::{clean_text, extract_year, format_authors};
use crate::extract::types::{
    AttachmentInfo, DOCUMENT_LEVEL_ATTACHMENT_ID, ExtractedText, ExtractionError, ExtractionErrorKind,
    ExtractionStatus, LinkMode,
};
use crate::store::{Attachment, Document, DocumentStore, IndexState, StoreError};
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const NO_ATTACHMENTS_WARNING: &str = "No attachments found";

/// Turns a document and its attachments into analyzable text plus a
/// diagnostic report. Never fails: every problem lands in the
/// [`ExtractionStatus`].
#[derive(Clone)]
pub struct TextExtractor {
    store: Arc<dyn DocumentStore>,
}

impl TextExtractor {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn extract(&self, document: &Document) -> ExtractedText {
        let mut extracted = Self::metadata(document);
        let mut status = ExtractionStatus::default();

        let attachments = match self.store.attachments(&document.id).await {
            Ok(attachments) => attachments,
            Err(e) => {
                warn!("Could not list attachments of {}: {}", document.id, e);
                status.errors.push(ExtractionError {
                    attachment_id: DOCUMENT_LEVEL_ATTACHMENT_ID.to_string(),
                    kind: ExtractionErrorKind::ExtractionFailed,
                    message: format!("Attachments processing failed: {}", e),
                    file_path: None,
                });
                extracted.extraction_status = status;
                return extracted;
            }
        };

        if attachments.is_empty() {
            status.warnings.push(NO_ATTACHMENTS_WARNING.to_string());
        }

        let mut parts = Vec::new();
        for attachment in attachments.iter().filter(|a| a.is_pdf()) {
            if let Some(text) = self.extract_attachment(attachment, &mut status).await {
                parts.push(text);
            }
        }

        if !parts.is_empty() {
            extracted.full_text = Some(parts.join("\n\n"));
        }

        info!(
            document = %document.id,
            attachments = status.attachments.len(),
            errors = status.errors.len(),
            warnings = status.warnings.len(),
            "Extraction finished with{} full text",
            if parts.is_empty() { "out" } else { "" }
        );

        extracted.extraction_status = status;
        extracted
    }

    /// Bibliographic fields only; independent of attachment access.
    pub fn metadata(document: &Document) -> ExtractedText {
        ExtractedText {
            title: document.title.clone(),
            authors: format_authors(&document.creators),
            year: document
                .date
                .as_deref()
                .and_then(extract_year)
                .unwrap_or_default(),
            abstract_text: document.abstract_note.clone().unwrap_or_default(),
            keywords: document.tags.clone(),
            full_text: None,
            publication: document.publication.clone().filter(|p| !p.is_empty()),
            doi: document.doi.clone().filter(|d| !d.is_empty()),
            extraction_status: ExtractionStatus::default(),
        }
    }

    async fn extract_attachment(
        &self,
        attachment: &Attachment,
        status: &mut ExtractionStatus,
    ) -> Option<String> {
        let mut info = AttachmentInfo {
            id: attachment.id.clone(),
            link_mode: LinkMode::from(attachment.link_mode),
            path: None,
            accessible: false,
            is_cloud_placeholder: false,
        };

        let text = self.run_chain(attachment, &mut info, status).await;
        status.attachments.push(info);
        text
    }

    async fn run_chain(
        &self,
        attachment: &Attachment,
        info: &mut AttachmentInfo,
        status: &mut ExtractionStatus,
    ) -> Option<String> {
        let is_linked = info.link_mode == LinkMode::Linked;

        let path = match self.store.attachment_path(attachment).await {
            Ok(Some(path)) => path,
            Ok(None) => {
                status.errors.push(ExtractionError {
                    attachment_id: attachment.id.clone(),
                    kind: ExtractionErrorKind::FileNotFound,
                    message: "No file path available for attachment".to_string(),
                    file_path: None,
                });
                return None;
            }
            Err(e) => {
                status.errors.push(Self::store_error(attachment, &e, None, is_linked));
                return None;
            }
        };
        let path_str = path.display().to_string();
        info.path = Some(path_str.clone());

        let size = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == IoErrorKind::PermissionDenied => {
                status.errors.push(ExtractionError {
                    attachment_id: attachment.id.clone(),
                    kind: ExtractionErrorKind::PermissionDenied,
                    message: format!("Permission denied: {}", path_str),
                    file_path: Some(path_str),
                });
                return None;
            }
            Err(_) => {
                let kind = if is_linked {
                    ExtractionErrorKind::LinkedFileUnavailable
                } else {
                    ExtractionErrorKind::FileNotFound
                };
                status.errors.push(ExtractionError {
                    attachment_id: attachment.id.clone(),
                    kind,
                    message: format!("File not found: {}", path_str),
                    file_path: Some(path_str),
                });
                return None;
            }
        };
        if is_cloud_placeholder(&path_str, size) {
            warn!("Skipping cloud placeholder {} ({} bytes)", path_str, size);
            info.is_cloud_placeholder = true;
            status.errors.push(ExtractionError {
                attachment_id: attachment.id.clone(),
                kind: ExtractionErrorKind::CloudPlaceholder,
                message: format!(
                    "File appears to be a cloud storage placeholder ({} bytes); download it locally first",
                    size
                ),
                file_path: Some(path_str),
            });
            return None;
        }
        info.accessible = true;

        if let Some(text) = self.read_index(attachment).await {
            return Some(text);
        }

        match self.read_direct(&path).await {
            Ok(Some(text)) => Some(text),
            Ok(None) => {
                status.warnings.push(format!(
                    "PDF content extraction failed for {}, but file is accessible",
                    path_str
                ));
                None
            }
            Err(e) => {
                status
                    .errors
                    .push(Self::store_error(attachment, &e, Some(path_str), is_linked));
                None
            }
        }
    }

    /// Text from the host's full-text cache, indexing once if needed.
    async fn read_index(&self, attachment: &Attachment) -> Option<String> {
        let state = match self.store.index_state(attachment).await {
            Ok(state) => state,
            Err(e) => {
                debug!("Index state unavailable for {}: {}", attachment.id, e);
                return None;
            }
        };

        match state {
            IndexState::Indexed | IndexState::Partial => {}
            IndexState::Unindexed => {
                debug!("Attachment {} is not indexed, indexing now", attachment.id);
                if let Err(e) = self.store.index_attachment(attachment).await {
                    debug!("Indexing {} failed: {}", attachment.id, e);
                    return None;
                }
            }
            IndexState::Unavailable => return None,
        }

        match self.store.indexed_text(attachment).await {
            Ok(Some(text)) => {
                let text = clean_text(&text);
                (!text.is_empty()).then_some(text)
            }
            Ok(None) => None,
            Err(e) => {
                debug!("Reading index cache for {} failed: {}", attachment.id, e);
                None
            }
        }
    }

    async fn read_direct(&self, path: &Path) -> Result<Option<String>, StoreError> {
        let bytes = self.store.read_binary(path).await?;
        let text = clean_text(&String::from_utf8_lossy(&bytes));
        Ok((!text.is_empty()).then_some(text))
    }

    fn store_error(
        attachment: &Attachment,
        error: &StoreError,
        file_path: Option<String>,
        is_linked: bool,
    ) -> ExtractionError {
        ExtractionError {
            attachment_id: attachment.id.clone(),
            kind: classify_store_error(error, is_linked),
            message: error.to_string(),
            file_path,
        }
    }
}

/// Map a store failure onto the extraction error taxonomy.
pub fn classify_store_error(error: &StoreError, is_linked: bool) -> ExtractionErrorKind {
    match error {
        StoreError::PermissionDenied(_) => ExtractionErrorKind::PermissionDenied,
        StoreError::Network(_) => ExtractionErrorKind::NetworkError,
        StoreError::NotFound(_) if is_linked => ExtractionErrorKind::LinkedFileUnavailable,
        StoreError::NotFound(_) => ExtractionErrorKind::FileNotFound,
        StoreError::Io(e) => match e.kind() {
            IoErrorKind::PermissionDenied => ExtractionErrorKind::PermissionDenied,
            IoErrorKind::TimedOut | IoErrorKind::ConnectionReset | IoErrorKind::ConnectionRefused => {
                ExtractionErrorKind::NetworkError
            }
            _ => ExtractionErrorKind::ExtractionFailed,
        },
        other => {
            let message = other.to_string().to_lowercase();
            if message.contains("permission") || message.contains("eacces") {
                ExtractionErrorKind::PermissionDenied
            } else if message.contains("network")
                || message.contains("etimedout")
                || message.contains("enotfound")
            {
                ExtractionErrorKind::NetworkError
            } else {
                ExtractionErrorKind::ExtractionFailed
            }
        }
    }
}
