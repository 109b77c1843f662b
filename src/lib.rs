//! # AI Paper Analysis
//!
//! Analyze research papers with large language models. A document's
//! metadata and PDF text are extracted, combined with a prompt template and
//! sent to one of several LLM backends; results can be stored back as notes
//! on the document and rebuilt from them later.
//!
//! ## Architecture Overview
//!
//! - **[`llm`]**: One client per backend behind a single trait, a shared retry
//!   policy and error normalization, plus the [`ProviderGateway`] that owns
//!   provider configs and clients
//! - **[`extract`]**: Text extraction with a fallback chain and cloud
//!   placeholder detection
//! - **[`analysis`]**: The [`AnalysisEngine`]: single and batch analysis,
//!   cost estimates, readiness checks and history
//! - **[`store`]**: The document store the pipeline reads from and writes
//!   notes to, with a JSON-file implementation
//! - **[`templates`]**: Built-in and user prompt templates
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aipa::{AnalysisEngine, AnalysisSettings, JsonLibrary, ProviderConfig, ProviderGateway, ProviderKind, TemplateLibrary};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut gateway = ProviderGateway::new();
//!     gateway.add_or_update_provider(
//!         ProviderConfig::new(ProviderKind::OpenAI, "sk-...").with_default_model("gpt-4"),
//!     );
//!     gateway.set_active(ProviderKind::OpenAI)?;
//!
//!     let library = Arc::new(JsonLibrary::open("library.json").await?);
//!     let mut engine = AnalysisEngine::new(
//!         gateway,
//!         library.clone(),
//!         Arc::new(TemplateLibrary::new()),
//!         AnalysisSettings::default(),
//!     );
//!
//!     engine.can_start_analysis()?;
//!     let documents = aipa::store::DocumentStore::documents(library.as_ref()).await?;
//!     let results = engine
//!         .analyze_batch(&documents, "summary", |p| println!("{}/{} {}", p.current, p.total, p.current_label))
//!         .await?;
//!     println!("{} results", results.len());
//!
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```

/// Provider-agnostic LLM interface.
///
/// Six backends behind [`LLMProvider`], a shared retry policy, and the
/// gateway that routes calls to the active backend.
pub mod llm;

/// Document text extraction.
///
/// Collects metadata and PDF text for a document and reports every
/// extraction problem as data rather than as an error.
pub mod extract;

/// Analysis orchestration, note persistence and history.
pub mod analysis;

/// Document store collaborator and its JSON-file implementation.
pub mod store;

/// Prompt templates.
pub mod templates;

/// Environment constants and path utilities.
///
/// Centralizes the paths, file names and variable names used throughout
/// the application.
pub mod env;

// CLI module for command-line interface
pub mod cli;

// Re-export LLM abstraction types
pub use llm::{
    ChatMessage, ChatRequest, ChatResponse, LLMError, LLMProvider, ModelInfo, ProviderConfig,
    ProviderGateway, ProviderKind, TokenUsage,
};

// Re-export analysis types
pub use analysis::{
    AnalysisEngine, AnalysisError, AnalysisResult, AnalysisSettings, BatchProgress, BatchStatus,
    CostEstimate, NotReady,
};

// Re-export extraction types
pub use extract::{ExtractedText, ExtractionStatus, TextExtractor};

// Re-export collaborators
pub use store::{Document, DocumentStore, JsonLibrary};
pub use templates::{PromptTemplate, TemplateLibrary, TemplateStore};
