//! Analysis results persisted as document notes.

use crate::analysis::metadata::{NoteMetadata, format_metadata};
use crate::analysis::types::{AnalysisError, AnalysisResult};
use crate::store::{DocumentStore, NewNote, Note, StoreError};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Tag carried by every note this crate writes
pub const ANALYSIS_TAG: &str = "ai-analysis";
pub const TEMPLATE_TAG_PREFIX: &str = "template:";
pub const PROVIDER_TAG_PREFIX: &str = "provider:";
const LEGACY_TEMPLATE_TAG_PREFIX: &str = "prompt:";

pub fn note_tags(result: &AnalysisResult) -> Vec<String> {
    let mut tags = vec![
        ANALYSIS_TAG.to_string(),
        format!("{}{}", TEMPLATE_TAG_PREFIX, result.template_id),
    ];
    if !result.provider.is_empty() {
        tags.push(format!("{}{}", PROVIDER_TAG_PREFIX, result.provider));
    }
    tags
}

pub fn is_analysis_note(note: &Note) -> bool {
    note.has_tag(ANALYSIS_TAG)
}

/// Template id from the note's tags, accepting the legacy `prompt:` form.
pub fn note_template_id(note: &Note) -> Option<&str> {
    note.tags.iter().find_map(|tag| {
        tag.strip_prefix(TEMPLATE_TAG_PREFIX)
            .or_else(|| tag.strip_prefix(LEGACY_TEMPLATE_TAG_PREFIX))
    })
}

/// Markdown body of an analysis note, ending in the metadata comment.
pub fn render_note(result: &AnalysisResult) -> Result<String, serde_json::Error> {
    let mut body = format!("# {}\n\n", result.template_name);
    body.push_str(&format!("- **Model**: {}\n", result.model));
    body.push_str(&format!("- **Provider**: {}\n", result.provider));
    body.push_str(&format!("- **Template**: {}\n", result.template_name));
    body.push_str(&format!(
        "- **Analyzed**: {}\n",
        result.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(usage) = result.usage {
        body.push_str(&format!(
            "- **Tokens**: {} (input {}, output {})\n",
            usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
        ));
    }

    body.push_str(&format!("\n---\n\n{}\n\n", result.content.trim_end()));

    if !result.advisories.is_empty() {
        for advisory in &result.advisories {
            body.push_str(&format!("> {}\n", advisory));
        }
        body.push('\n');
    }

    body.push_str(&format_metadata(&NoteMetadata::from_result(result))?);
    body.push('\n');
    Ok(body)
}

/// Earlier analysis note for the same document and template.
pub async fn find_existing_note(
    store: &dyn DocumentStore,
    document_id: &str,
    template_id: &str,
) -> Result<Option<Note>, StoreError> {
    let notes = store.notes(document_id).await?;
    Ok(notes
        .into_iter()
        .find(|note| is_analysis_note(note) && note_template_id(note) == Some(template_id)))
}

/// Write `result` as a note, replacing an earlier note for the same
/// template. Returns the note id.
pub async fn create_or_update_note(
    store: &dyn DocumentStore,
    result: &AnalysisResult,
) -> Result<String, AnalysisError> {
    let note = NewNote {
        content: render_note(result)?,
        tags: note_tags(result),
    };

    match find_existing_note(store, &result.document_id, &result.template_id).await? {
        Some(existing) => {
            store.update_note(&existing.id, note).await?;
            info!("Updated note {} for {}", existing.id, result.document_id);
            Ok(existing.id)
        }
        None => {
            let id = store.save_note(&result.document_id, note).await?;
            info!("Created note {} for {}", id, result.document_id);
            Ok(id)
        }
    }
}

/// Remove every analysis note of a document; returns how many were removed.
pub async fn delete_analysis_notes(store: &dyn DocumentStore, document_id: &str) -> Result<usize, StoreError> {
    let mut removed = 0;
    for note in store.notes(document_id).await? {
        if is_analysis_note(&note) {
            store.delete_note(&note.id).await?;
            debug!("Deleted analysis note {}", note.id);
            removed += 1;
        }
    }
    Ok(removed)
}

/// Note counts for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteStats {
    pub total: usize,
    pub ai_generated: usize,
    /// Analysis notes per template id
    pub by_template: BTreeMap<String, usize>,
}

pub async fn notes_stats(store: &dyn DocumentStore, document_id: &str) -> Result<NoteStats, StoreError> {
    let notes = store.notes(document_id).await?;
    let mut stats = NoteStats {
        total: notes.len(),
        ..Default::default()
    };
    for note in notes.iter().filter(|n| is_analysis_note(n)) {
        stats.ai_generated += 1;
        if let Some(template_id) = note_template_id(note) {
            *stats.by_template.entry(template_id.to_string()).or_default() += 1;
        }
    }
    Ok(stats)
}

/// Markdown of a single note. Notes are stored as markdown already, so this
/// is the note body as written.
pub async fn export_note_markdown(
    store: &dyn DocumentStore,
    document_id: &str,
    note_id: &str,
) -> Result<String, StoreError> {
    store
        .notes(document_id)
        .await?
        .into_iter()
        .find(|n| n.id == note_id)
        .map(|n| n.content)
        .ok_or_else(|| StoreError::NotFound(format!("note {} of {}", note_id, document_id)))
}
