//! Prompt templates.
//!
//! A template is a reusable instruction applied to a document's extracted
//! text. Built-in templates can be renamed or re-described but their
//! content can never change and they cannot be deleted.

pub mod defaults;
pub mod library;

pub use library::{TemplateLibrary, TemplateStats, TemplateUpdate, UNCATEGORIZED};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: String,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),
    #[error("Template {0} is built in and cannot be modified or deleted")]
    DefaultImmutable(String),
    #[error("Invalid template data: {0}")]
    InvalidFormat(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Read access to templates, as needed by the analysis engine
pub trait TemplateStore: Send + Sync {
    fn get(&self, id: &str) -> Option<PromptTemplate>;

    fn list(&self) -> Vec<PromptTemplate>;
}
