use crate::store::AttachmentLinkMode;
use serde::{Deserialize, Serialize};

/// Link mode as reported in extraction diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMode {
    Stored,
    Linked,
    LinkedUrl,
    Embedded,
    Unknown,
}

impl From<AttachmentLinkMode> for LinkMode {
    fn from(mode: AttachmentLinkMode) -> Self {
        match mode {
            AttachmentLinkMode::ImportedFile | AttachmentLinkMode::ImportedUrl => LinkMode::Stored,
            AttachmentLinkMode::LinkedFile => LinkMode::Linked,
            AttachmentLinkMode::LinkedUrl => LinkMode::LinkedUrl,
            AttachmentLinkMode::EmbeddedImage => LinkMode::Embedded,
            AttachmentLinkMode::Unknown => LinkMode::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionErrorKind {
    FileNotFound,
    CloudPlaceholder,
    PermissionDenied,
    NetworkError,
    ExtractionFailed,
    LinkedFileUnavailable,
}

impl ExtractionErrorKind {
    /// One-line remediation hint shown next to an analysis result.
    pub fn advisory(&self) -> &'static str {
        match self {
            ExtractionErrorKind::FileNotFound => {
                "Some attachment files are missing locally; sync the library or re-download them"
            }
            ExtractionErrorKind::CloudPlaceholder => {
                "Some files are cloud placeholders; download them from your sync client first"
            }
            ExtractionErrorKind::PermissionDenied => {
                "Some files could not be read due to missing permissions"
            }
            ExtractionErrorKind::NetworkError => {
                "A network error interrupted reading some files"
            }
            ExtractionErrorKind::ExtractionFailed => {
                "Text extraction failed for some attachments"
            }
            ExtractionErrorKind::LinkedFileUnavailable => {
                "Some linked files are unavailable; check the external file paths"
            }
        }
    }
}

/// Stands in for an attachment id when a failure concerns the document's
/// attachments as a whole.
pub const DOCUMENT_LEVEL_ATTACHMENT_ID: &str = "-1";

/// Advisory attached whenever no full text could be extracted.
pub const METADATA_ONLY_ADVISORY: &str = "Analysis used metadata and abstract only";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionError {
    pub attachment_id: String,
    pub kind: ExtractionErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentInfo {
    pub id: String,
    pub link_mode: LinkMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub accessible: bool,
    pub is_cloud_placeholder: bool,
}

/// Diagnostic report for one extraction call.
///
/// There is no stored success flag; see [`ExtractedText::success`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStatus {
    pub errors: Vec<ExtractionError>,
    pub warnings: Vec<String>,
    pub attachments: Vec<AttachmentInfo>,
}

impl ExtractionStatus {
    pub fn has_error(&self, kind: ExtractionErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub title: String,
    pub authors: String,
    pub year: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    pub extraction_status: ExtractionStatus,
}

impl ExtractedText {
    /// True iff some attachment produced non-empty text.
    pub fn success(&self) -> bool {
        self.full_text.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Human-readable diagnostics: one line per distinct error kind, then
    /// every warning.
    pub fn advisories(&self) -> Vec<String> {
        let status = &self.extraction_status;
        let mut lines = Vec::new();
        let mut seen = Vec::new();

        for error in &status.errors {
            if !seen.contains(&error.kind) {
                seen.push(error.kind);
                lines.push(error.kind.advisory().to_string());
            }
        }
        lines.extend(status.warnings.iter().cloned());

        if !self.success() {
            lines.push(METADATA_ONLY_ADVISORY.to_string());
        }
        lines
    }
}
