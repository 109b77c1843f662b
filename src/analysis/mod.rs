//! Analysis orchestration.
//!
//! [`AnalysisEngine`] resolves a template, extracts a document's text, asks
//! the active provider for an analysis and reports the outcome as an
//! [`AnalysisResult`]. Batches run strictly one document at a time with a
//! fixed pause between calls. Results can be persisted as notes and later
//! rebuilt from them.

pub mod engine;
pub mod metadata;
pub mod notes;
pub mod types;

pub use engine::{AnalysisEngine, BATCH_PACING, COST_OVERHEAD_TOKENS, SYSTEM_PROMPT};
pub use metadata::{NoteMetadata, format_metadata, parse_metadata};
pub use notes::{
    ANALYSIS_TAG, NoteStats, create_or_update_note, delete_analysis_notes, export_note_markdown,
    find_existing_note, notes_stats,
};
pub use types::*;
