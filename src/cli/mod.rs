//! CLI-specific functionality for the paper analysis tool
//!
//! This module contains all CLI-related code including argument parsing
//! and configuration discovery.

pub mod args;
pub mod config;

pub use args::{AnalyzeConfig, Args, Commands, DocumentSelection, ExecutionMode};
pub use config::{AppConfig, ConfigDiscovery, ConfigError};
