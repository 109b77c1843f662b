//! Command line argument parsing
//!
//! This module handles CLI argument parsing with subcommands:
//! - `analyze`: Analyze documents with a template
//! - `estimate`: Estimate token usage for an analysis
//! - `history`: Show earlier analyses of a document
//! - `models`: List models of a provider
//! - `test-connection`: Check that a provider accepts its API key
//! - `check`: Report whether an analysis can start
//! - `notes`: Count the notes of a document
//! - `export-note`: Print one note as markdown
//! - `delete-notes`: Remove the analysis notes of a document
//! - `templates`: List prompt templates, by category or as counts
//! - `reset-templates`: Drop user templates and restore the built-ins
//! - `show-config`: Show configuration discovery information

use crate::llm::ProviderKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Template used when `--template` is not given
pub const DEFAULT_TEMPLATE_ID: &str = "summary";

#[derive(Debug)]
pub enum ExecutionMode {
    Analyze(AnalyzeConfig),
    Estimate(DocumentSelection),
    History { document_id: String },
    Models { provider: Option<ProviderKind> },
    TestConnection { provider: Option<ProviderKind> },
    Check,
    NoteStats { document_id: String },
    ExportNote {
        document_id: String,
        note_id: String,
        output: Option<PathBuf>,
    },
    DeleteNotes { document_id: String },
    Templates { category: Option<String>, stats: bool },
    ResetTemplates,
    ShowConfig,
}

/// Documents and template an analysis applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSelection {
    pub document_ids: Vec<String>,
    /// Every document in the library; `document_ids` is empty then
    pub all: bool,
    pub template_id: String,
}

#[derive(Debug)]
pub struct AnalyzeConfig {
    pub selection: DocumentSelection,
    pub save_notes: Option<bool>,
    pub verbose: bool,
}

#[derive(Debug, Parser)]
#[command(name = "aipa")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Analyze research papers with large language models")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// JSON library file
    #[arg(short = 'l', long = "library", global = true)]
    pub library: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Analyze documents one after another
    Analyze {
        /// Document ids
        documents: Vec<String>,
        /// Template id
        #[arg(short = 't', long = "template", default_value = DEFAULT_TEMPLATE_ID)]
        template: String,
        /// Analyze every document in the library
        #[arg(long = "all", conflicts_with = "documents")]
        all: bool,
        /// Save results as notes (overrides the config)
        #[arg(long = "notes", conflicts_with = "no_notes")]
        notes: bool,
        /// Do not save results as notes (overrides the config)
        #[arg(long = "no-notes")]
        no_notes: bool,
        /// Print full analysis text
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },
    /// Estimate token usage without calling a provider
    Estimate {
        /// Document ids
        documents: Vec<String>,
        /// Template id
        #[arg(short = 't', long = "template", default_value = DEFAULT_TEMPLATE_ID)]
        template: String,
        /// Estimate for every document in the library
        #[arg(long = "all", conflicts_with = "documents")]
        all: bool,
    },
    /// Show earlier analyses of a document, newest first
    History {
        /// Document id
        document: String,
    },
    /// List models of a provider (defaults to the active one)
    Models {
        #[arg(short = 'p', long = "provider")]
        provider: Option<ProviderKind>,
    },
    /// Validate the API key and list models
    TestConnection {
        #[arg(short = 'p', long = "provider")]
        provider: Option<ProviderKind>,
    },
    /// Check whether an analysis can start
    Check,
    /// Count the notes of a document, per template
    Notes {
        /// Document id
        document: String,
    },
    /// Print a note as markdown
    ExportNote {
        /// Document id
        document: String,
        /// Note id
        note: String,
        /// Write to a file instead of stdout
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
    /// Remove every analysis note of a document
    DeleteNotes {
        /// Document id
        document: String,
    },
    /// List prompt templates
    Templates {
        /// Only templates in this category
        #[arg(long = "category", conflicts_with = "stats")]
        category: Option<String>,
        /// Show counts instead of the list
        #[arg(long = "stats")]
        stats: bool,
    },
    /// Drop user templates and restore the built-ins
    ResetTemplates,
    /// Show configuration discovery information
    ShowConfig,
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Analyze {
                documents,
                template,
                all,
                notes,
                no_notes,
                verbose,
            }) => {
                let save_notes = match (notes, no_notes) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                };
                Ok(ExecutionMode::Analyze(AnalyzeConfig {
                    selection: Self::selection(documents, *all, template)?,
                    save_notes,
                    verbose: *verbose,
                }))
            }
            Some(Commands::Estimate {
                documents,
                template,
                all,
            }) => Ok(ExecutionMode::Estimate(Self::selection(documents, *all, template)?)),
            Some(Commands::History { document }) => Ok(ExecutionMode::History {
                document_id: document.clone(),
            }),
            Some(Commands::Models { provider }) => Ok(ExecutionMode::Models { provider: *provider }),
            Some(Commands::TestConnection { provider }) => {
                Ok(ExecutionMode::TestConnection { provider: *provider })
            }
            Some(Commands::Check) => Ok(ExecutionMode::Check),
            Some(Commands::Notes { document }) => Ok(ExecutionMode::NoteStats {
                document_id: document.clone(),
            }),
            Some(Commands::ExportNote {
                document,
                note,
                output,
            }) => Ok(ExecutionMode::ExportNote {
                document_id: document.clone(),
                note_id: note.clone(),
                output: output.clone(),
            }),
            Some(Commands::DeleteNotes { document }) => Ok(ExecutionMode::DeleteNotes {
                document_id: document.clone(),
            }),
            Some(Commands::Templates { category, stats }) => Ok(ExecutionMode::Templates {
                category: category.clone(),
                stats: *stats,
            }),
            Some(Commands::ResetTemplates) => Ok(ExecutionMode::ResetTemplates),
            Some(Commands::ShowConfig) => Ok(ExecutionMode::ShowConfig),
            None => {
                Err("No command specified. Use 'aipa --help' to see available commands.".to_string())
            }
        }
    }

    fn selection(documents: &[String], all: bool, template: &str) -> Result<DocumentSelection, String> {
        if documents.is_empty() && !all {
            return Err("No documents given. Pass document ids or --all.".to_string());
        }
        if template.trim().is_empty() {
            return Err("Template id must not be empty".to_string());
        }
        Ok(DocumentSelection {
            document_ids: documents.to_vec(),
            all,
            template_id: template.to_string(),
        })
    }
}
