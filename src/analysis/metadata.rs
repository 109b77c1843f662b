//! Structured metadata embedded in analysis notes.
//!
//! A note ends with one HTML comment carrying a JSON object:
//!
//! ```text
//! <!-- aipa-metadata:{"v":1,"analyzedAt":"2024-05-01T10:00:00Z","model":"gpt-4",...} -->
//! ```
//!
//! Version 1 fields: `v`, `analyzedAt` (RFC 3339), `model`, `provider`,
//! `templateId`, `templateName`, optional `tokenUsage` (`prompt`,
//! `completion`, `total`) and optional `extraction` (`success`,
//! `errorCount`, `warningCount`). Older notes use the `AIPaperAnalysis:`
//! marker without `v` and name the template `promptName`; notes without any
//! comment are read from their labeled lines.

use crate::analysis::types::{AnalysisResult, ExtractionSummary};
use crate::llm::TokenUsage;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

pub const METADATA_VERSION: u32 = 1;
pub const METADATA_MARKER: &str = "aipa-metadata:";

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--\s*(?:aipa-metadata|AIPaperAnalysis):(.+?)-->").expect("valid regex")
});
static MODEL_RE: LazyLock<Regex> = LazyLock::new(|| labeled_line("Model|使用模型"));
static PROVIDER_RE: LazyLock<Regex> = LazyLock::new(|| labeled_line("Provider|提供商"));
static TEMPLATE_RE: LazyLock<Regex> = LazyLock::new(|| labeled_line("Template|提示词"));

/// `**Label**: value` anywhere on a line, with or without emphasis. The value
/// runs to the end of that line.
fn labeled_line(labels: &str) -> Regex {
    Regex::new(&format!(
        r"(?m)\b(?:{})\**\s*[:：]\s*\**\s*(.+?)\s*$",
        labels
    ))
    .expect("valid regex")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub prompt: u64,
    pub completion: u64,
    pub total: u64,
}

impl From<TokenUsage> for UsageSummary {
    fn from(usage: TokenUsage) -> Self {
        Self {
            prompt: usage.prompt_tokens,
            completion: usage.completion_tokens,
            total: usage.total_tokens,
        }
    }
}

impl From<UsageSummary> for TokenUsage {
    fn from(usage: UsageSummary) -> Self {
        Self {
            prompt_tokens: usage.prompt,
            completion_tokens: usage.completion,
            total_tokens: usage.total,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteMetadata {
    /// 0 for legacy blobs and line-parsed notes
    #[serde(default)]
    pub v: u32,
    #[serde(default)]
    pub analyzed_at: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default, alias = "promptName")]
    pub template_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<UsageSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction: Option<ExtractionSummary>,
}

impl NoteMetadata {
    pub fn from_result(result: &AnalysisResult) -> Self {
        Self {
            v: METADATA_VERSION,
            analyzed_at: result.timestamp.to_rfc3339(),
            model: result.model.clone(),
            provider: result.provider.clone(),
            template_id: Some(result.template_id.clone()),
            template_name: result.template_name.clone(),
            token_usage: result.usage.map(UsageSummary::from),
            extraction: result.extraction,
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.analyzed_at)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

pub fn format_metadata(metadata: &NoteMetadata) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(metadata)?;
    // a literal "-->" can only occur inside a JSON string
    Ok(format!(
        "<!-- {}{} -->",
        METADATA_MARKER,
        json.replace("-->", "--\\u003e")
    ))
}

/// Read the metadata of a note body. Returns `None` when the note has
/// neither a readable comment nor any labeled line.
pub fn parse_metadata(content: &str) -> Option<NoteMetadata> {
    if let Some(captures) = COMMENT_RE.captures(content) {
        match serde_json::from_str::<NoteMetadata>(captures[1].trim()) {
            Ok(metadata) => return Some(metadata),
            Err(e) => debug!("Malformed metadata comment, reading labeled lines: {}", e),
        }
    }

    let field = |re: &Regex| {
        re.captures(content)
            .map(|c| c[1].to_string())
            .unwrap_or_default()
    };
    let metadata = NoteMetadata {
        model: field(&MODEL_RE),
        provider: field(&PROVIDER_RE),
        template_name: field(&TEMPLATE_RE),
        ..Default::default()
    };

    if metadata.model.is_empty() && metadata.provider.is_empty() && metadata.template_name.is_empty() {
        None
    } else {
        Some(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> NoteMetadata {
        NoteMetadata {
            v: METADATA_VERSION,
            analyzed_at: "2024-05-01T10:00:00+00:00".to_string(),
            model: "gpt-4".to_string(),
            provider: "openai".to_string(),
            template_id: Some("summary".to_string()),
            template_name: "Paper summary".to_string(),
            token_usage: Some(UsageSummary {
                prompt: 100,
                completion: 50,
                total: 150,
            }),
            extraction: Some(ExtractionSummary {
                success: true,
                error_count: 0,
                warning_count: 1,
            }),
        }
    }

    #[test]
    fn test_metadata_comment_is_parsed_back() {
        let comment = format_metadata(&sample()).unwrap();
        assert!(comment.starts_with("<!-- aipa-metadata:{\"v\":1"));

        let note = format!("# Summary\n\nSome analysis text.\n\n{}\n", comment);
        let parsed = parse_metadata(&note).unwrap();
        assert_eq!(parsed, sample());
        assert_eq!(
            parsed.timestamp(),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_comment_terminator_inside_value() {
        let mut metadata = sample();
        metadata.template_name = "A --> B".to_string();
        let note = format!("body {}", format_metadata(&metadata).unwrap());
        assert_eq!(parse_metadata(&note).unwrap().template_name, "A --> B");
    }

    #[test]
    fn test_legacy_marker() {
        let note = r#"<h1>Summary</h1><!-- AIPaperAnalysis:{"analyzedAt":"2023-01-02T03:04:05.000Z","model":"qwen-max","provider":"aliyun","promptName":"Paper summary","tokenUsage":{"prompt":1,"completion":2,"total":3}} -->"#;
        let parsed = parse_metadata(note).unwrap();
        assert_eq!(parsed.v, 0);
        assert_eq!(parsed.model, "qwen-max");
        assert_eq!(parsed.template_name, "Paper summary");
        assert_eq!(parsed.token_usage.unwrap().total, 3);
        assert!(parsed.timestamp().is_some());
        assert!(parsed.template_id.is_none());
    }

    #[test]
    fn test_labeled_line_fallback() {
        let note = "# Summary\n\n- **Model**: deepseek-chat\n- **Provider**: deepseek\n- **Template**: Paper summary\n\ntext";
        let parsed = parse_metadata(note).unwrap();
        assert_eq!(parsed.model, "deepseek-chat");
        assert_eq!(parsed.provider, "deepseek");
        assert_eq!(parsed.template_name, "Paper summary");
        assert!(parsed.timestamp().is_none());

        let legacy = "- **使用模型**: gpt-4\n- **提供商**：openai\n- **提示词**: 论文总结";
        let parsed = parse_metadata(legacy).unwrap();
        assert_eq!(parsed.model, "gpt-4");
        assert_eq!(parsed.provider, "openai");
        assert_eq!(parsed.template_name, "论文总结");
    }

    #[test]
    fn test_malformed_comment_falls_back() {
        let note = "<!-- aipa-metadata:{not json -->\nModel: gpt-4";
        assert_eq!(parse_metadata(note).unwrap().model, "gpt-4");
        assert!(parse_metadata("plain note without labels").is_none());
    }

    #[test]
    fn test_labels_inside_quotes_and_prose() {
        let note = "> **Model**: gpt-4o\n>   - **Provider**: openai\nRun with **Template**: Paper summary";
        let parsed = parse_metadata(note).unwrap();
        assert_eq!(parsed.model, "gpt-4o");
        assert_eq!(parsed.provider, "openai");
        assert_eq!(parsed.template_name, "Paper summary");

        assert!(parse_metadata("Remodel: kitchen").is_none());
    }
}
