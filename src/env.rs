//! Environment constants and path utilities.
//!
//! Centralizes the directory names, file names and environment variables
//! used by configuration discovery and the CLI.

use crate::llm::ProviderKind;
use std::path::{Path, PathBuf};

/// Main application directory name (hidden directory like .git, .vscode)
pub const AIPA_DIR_NAME: &str = ".aipa";

/// Configuration file name inside an `.aipa` directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name at a project root
pub const LOCAL_CONFIG_FILE_NAME: &str = "aipa.toml";

/// System-wide configuration file
pub const SYSTEM_CONFIG_PATH: &str = "/etc/aipa/config.toml";

/// Default JSON library file name inside an `.aipa` directory
pub const LIBRARY_FILE_NAME: &str = "library.json";

/// Default user template file name inside an `.aipa` directory
pub const TEMPLATES_FILE_NAME: &str = "templates.json";

/// Environment variables
pub mod vars {
    /// Prefix of per-provider API key variables, e.g. `AIPA_OPENAI_API_KEY`
    pub const API_KEY_PREFIX: &str = "AIPA_";

    pub const API_KEY_SUFFIX: &str = "_API_KEY";

    /// Enables tests that call real provider APIs
    pub const LIVE_TESTS: &str = "AIPA_LIVE_TESTS";

    /// Default tracing filter when `RUST_LOG` is unset
    pub const DEFAULT_LOG_FILTER: &str = "aipa=info";
}

/// Environment variable holding the API key for `kind`.
pub fn api_key_var(kind: ProviderKind) -> String {
    format!(
        "{}{}{}",
        vars::API_KEY_PREFIX,
        kind.as_str().to_uppercase(),
        vars::API_KEY_SUFFIX
    )
}

/// Build the main .aipa directory path from a base directory
pub fn aipa_dir_path(base: &Path) -> PathBuf {
    base.join(AIPA_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    aipa_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build local config file path in current directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    aipa_dir_path(current_dir).join(CONFIG_FILE_NAME)
}

/// Build the default library path in user's home directory
pub fn user_library_file_path(home_dir: &Path) -> PathBuf {
    aipa_dir_path(home_dir).join(LIBRARY_FILE_NAME)
}

/// Build the default user template path in user's home directory
pub fn user_templates_file_path(home_dir: &Path) -> PathBuf {
    aipa_dir_path(home_dir).join(TEMPLATES_FILE_NAME)
}

/// Home directory from `HOME` or `USERPROFILE`
pub fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .or_else(|| std::env::var("USERPROFILE").ok())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_paths() {
        let home_dir = Path::new("/home/user");
        let current_dir = Path::new("/current/project");

        assert_eq!(
            user_config_file_path(home_dir),
            Path::new("/home/user/.aipa/config.toml")
        );
        assert_eq!(
            local_config_file_path(current_dir),
            Path::new("/current/project/.aipa/config.toml")
        );
        assert_eq!(
            user_library_file_path(home_dir),
            Path::new("/home/user/.aipa/library.json")
        );
        assert_eq!(
            user_templates_file_path(home_dir),
            Path::new("/home/user/.aipa/templates.json")
        );
    }

    #[test]
    fn test_api_key_var() {
        assert_eq!(api_key_var(ProviderKind::OpenAI), "AIPA_OPENAI_API_KEY");
        assert_eq!(api_key_var(ProviderKind::DeepSeek), "AIPA_DEEPSEEK_API_KEY");
        assert_eq!(api_key_var(ProviderKind::Custom), "AIPA_CUSTOM_API_KEY");
    }
}
