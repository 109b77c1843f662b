use crate::extract::ExtractedText;
use crate::llm::{GatewayError, ProviderKind, TokenUsage};
use crate::store::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4000;

/// Request settings applied to every analysis call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Persist each successful batch result as a note on its document.
    #[serde(default = "default_auto_create_note")]
    pub auto_create_note: bool,
}

fn default_temperature() -> f32 {
    crate::llm::DEFAULT_TEMPERATURE
}

fn default_max_output_tokens() -> u32 {
    DEFAULT_MAX_OUTPUT_TOKENS
}

fn default_auto_create_note() -> bool {
    true
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            auto_create_note: default_auto_create_note(),
        }
    }
}

/// Counts from the extraction report, kept with a result and its note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionSummary {
    pub success: bool,
    pub error_count: usize,
    pub warning_count: usize,
}

impl From<&ExtractedText> for ExtractionSummary {
    fn from(extracted: &ExtractedText) -> Self {
        Self {
            success: extracted.success(),
            error_count: extracted.extraction_status.errors.len(),
            warning_count: extracted.extraction_status.warnings.len(),
        }
    }
}

/// Outcome of analyzing one document with one template.
///
/// Failures are data: `error` is set and `content` is empty. Extraction
/// problems that did not stop the analysis are listed in `advisories`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub document_id: String,
    pub template_id: String,
    pub template_name: String,
    pub content: String,
    pub model: String,
    pub provider: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advisories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction: Option<ExtractionSummary>,
}

impl AnalysisResult {
    pub fn failure(
        document_id: impl Into<String>,
        template_id: impl Into<String>,
        template_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            template_id: template_id.into(),
            template_name: template_name.into(),
            content: String::new(),
            model: String::new(),
            provider: String::new(),
            timestamp: Utc::now(),
            usage: None,
            error: Some(error.into()),
            advisories: Vec::new(),
            extraction: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-item batch state. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    /// 1-based position of the current item
    pub current: usize,
    pub total: usize,
    pub current_label: String,
    pub status: BatchStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub total_tokens: u64,
    pub document_count: usize,
    pub average_tokens: u64,
}

/// Why an analysis cannot start
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotReady {
    #[error("No LLM provider is active; configure an API key and select a provider")]
    NoActiveProvider,
    #[error("Provider {0} has no API key")]
    MissingApiKey(ProviderKind),
    #[error("Provider {0} has no default model")]
    NoDefaultModel(ProviderKind),
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),
    #[error(transparent)]
    NotReady(#[from] NotReady),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("Library error: {0}")]
    Store(#[from] StoreError),
    #[error("Failed to encode note metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings: AnalysisSettings = toml::from_str("").unwrap();
        assert_eq!(settings, AnalysisSettings::default());
        assert_eq!(settings.max_output_tokens, 4000);
        assert!(settings.auto_create_note);
        assert!((settings.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_failure_result() {
        let result = AnalysisResult::failure("doc-1", "summary", "Paper summary", "boom");
        assert!(!result.is_success());
        assert!(result.content.is_empty());
        assert_eq!(result.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_extraction_summary_from_text() {
        let mut extracted = ExtractedText::default();
        extracted.extraction_status.warnings.push("No attachments found".to_string());
        let summary = ExtractionSummary::from(&extracted);
        assert!(!summary.success);
        assert_eq!(summary.warning_count, 1);
        assert_eq!(summary.error_count, 0);
    }
}
