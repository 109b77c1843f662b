//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./aipa.toml or ./.aipa/config.toml
//! 2. User config: ~/.aipa/config.toml
//! 3. System config: /etc/aipa/config.toml
//! 4. Built-in defaults
//!
//! API keys left empty in the file are filled from `AIPA_<PROVIDER>_API_KEY`.

use crate::analysis::AnalysisSettings;
use crate::env;
use crate::llm::{ProviderConfig, ProviderGateway, ProviderKind};
use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Application configuration as stored in TOML.
///
/// ```toml
/// active_provider = "openai"
///
/// [analysis]
/// temperature = 0.7
/// max_output_tokens = 4000
/// auto_create_note = true
///
/// [[providers]]
/// kind = "openai"
/// api_key = ""
/// default_model = "gpt-4"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_provider: Option<ProviderKind>,
    /// JSON library file; defaults to ~/.aipa/library.json
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<PathBuf>,
    /// Full-text cache directory; PDFs are indexed into it with `pdftotext`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulltext_dir: Option<PathBuf>,
    /// User template file; defaults to ~/.aipa/templates.json
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates: Option<PathBuf>,
    #[serde(default)]
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl AppConfig {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: AppConfig = toml::from_str(&content)?;
        config.apply_env_keys();
        Ok(config)
    }

    /// Save to TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Fill empty API keys from the process environment.
    pub fn apply_env_keys(&mut self) {
        self.apply_env_keys_from(|name| std_env::var(name).ok());
    }

    pub fn apply_env_keys_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for provider in self.providers.iter_mut().filter(|p| !p.has_api_key()) {
            let var = env::api_key_var(provider.kind);
            if let Some(key) = lookup(&var).filter(|k| !k.trim().is_empty()) {
                debug!("Using {} for the {} API key", var, provider.kind);
                provider.api_key = key;
            }
        }
    }

    pub fn library_path(&self) -> Option<PathBuf> {
        self.library
            .clone()
            .or_else(|| env::home_dir().map(|home| env::user_library_file_path(&home)))
    }

    pub fn templates_path(&self) -> Option<PathBuf> {
        self.templates
            .clone()
            .or_else(|| env::home_dir().map(|home| env::user_templates_file_path(&home)))
    }

    /// Build a gateway holding every configured provider. An active provider
    /// that has no `[[providers]]` entry is ignored with a warning.
    pub fn to_gateway(&self) -> ProviderGateway {
        let mut gateway = ProviderGateway::new();
        for provider in &self.providers {
            gateway.add_or_update_provider(provider.clone());
        }
        if let Some(kind) = self.active_provider
            && let Err(e) = gateway.set_active(kind)
        {
            warn!("Ignoring active provider: {}", e);
        }
        gateway
    }
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<AppConfig, ConfigError> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return AppConfig::from_toml_file(config_path);
        }

        info!("No configuration file found, using defaults");
        let mut config = AppConfig::default();
        config.apply_env_keys();
        Ok(config)
    }

    /// Explicit path if given, otherwise discovery.
    pub fn load(config_override: Option<&Path>) -> Result<AppConfig, ConfigError> {
        match config_override {
            Some(path) => {
                info!("Loading configuration override from: {:?}", path);
                AppConfig::from_toml_file(path)
            }
            None => Self::discover_config(),
        }
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        Self::get_config_candidates().into_iter().find(|candidate| {
            debug!("Checking for config file: {:?}", candidate);
            candidate.is_file()
        })
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = std_env::current_dir() {
            candidates.push(current_dir.join(env::LOCAL_CONFIG_FILE_NAME));
            candidates.push(env::local_config_file_path(&current_dir));
        }

        if let Some(home_dir) = env::home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        #[cfg(unix)]
        candidates.push(PathBuf::from(env::SYSTEM_CONFIG_PATH));

        candidates
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info() {
        println!("Configuration Discovery Hierarchy:");
        println!();

        for (i, candidate) in Self::get_config_candidates().iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "✓ EXISTS"
                } else {
                    "✗ NOT A FILE"
                }
            } else {
                "✗ NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        match Self::find_config_file() {
            Some(found) => println!("Active configuration: {:?}", found),
            None => println!("Active configuration: Built-in defaults"),
        }

        println!();
        println!("API key variables:");
        for kind in ProviderKind::ALL {
            let var = env::api_key_var(kind);
            let state = if std_env::var(&var).is_ok() { "set" } else { "unset" };
            println!("  {} - {}", var, state);
        }
    }
}
