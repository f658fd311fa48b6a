use crate::analyzer::CommitTypes;
use crate::error::{MonorelError, Result};
use crate::logging::LoggingConfig;
use crate::registry::Access;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up in the working directory and the user config directory
pub const CONFIG_FILE_NAME: &str = "monorel.toml";

/// Represents the complete configuration for monorel.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub release: ReleaseConfig,

    #[serde(default)]
    pub commits: CommitsConfig,

    #[serde(default)]
    pub scripts: ScriptsConfig,

    #[serde(default)]
    pub publish: PublishConfig,

    #[serde(default)]
    pub hosting: HostingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_true() -> bool {
    true
}

fn default_remote() -> String {
    "origin".to_string()
}

/// Release behavior of the package.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ReleaseConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Branches a release may originate from; absent allows any branch
    #[serde(default)]
    pub branches: Option<Vec<String>>,

    /// Maintain bare `vN` tags
    #[serde(default)]
    pub major_tag_enabled: bool,

    #[serde(default = "default_remote")]
    pub remote: String,

    /// Sub-package directories relative to the package root
    #[serde(default)]
    pub sub_packages: Vec<PathBuf>,

    #[serde(default)]
    pub editor: Option<String>,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        ReleaseConfig {
            enabled: true,
            branches: None,
            major_tag_enabled: false,
            remote: default_remote(),
            sub_packages: Vec::new(),
            editor: None,
        }
    }
}

impl ReleaseConfig {
    /// Whether a release may start from `branch`
    pub fn allows_branch(&self, branch: &str) -> bool {
        match &self.branches {
            Some(branches) => branches.iter().any(|b| b == branch),
            None => true,
        }
    }

    /// Configured editor, then `$VISUAL`, then `$EDITOR`
    pub fn resolve_editor(&self) -> Option<String> {
        self.editor
            .clone()
            .or_else(|| std::env::var("VISUAL").ok())
            .or_else(|| std::env::var("EDITOR").ok())
            .filter(|editor| !editor.trim().is_empty())
    }
}

/// Commit classification table.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct CommitsConfig {
    /// Replaces the default `feat`/`fix` table when present
    #[serde(default)]
    pub types: Option<CommitTypes>,
}

impl CommitsConfig {
    pub fn commit_types(&self) -> CommitTypes {
        self.types.clone().unwrap_or_default()
    }
}

/// Package script commands, as argv arrays.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct ScriptsConfig {
    #[serde(default)]
    pub test: Option<Vec<String>>,

    #[serde(default)]
    pub docs: Option<Vec<String>>,
}

fn default_npm() -> String {
    "npm".to_string()
}

/// Registry publishing.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct PublishConfig {
    /// Access level enforced on scoped packages
    #[serde(default)]
    pub access: Option<Access>,

    #[serde(default = "default_npm")]
    pub npm: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        PublishConfig {
            access: None,
            npm: default_npm(),
        }
    }
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

/// Hosted release creation.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct HostingConfig {
    /// Environment variable holding the API token
    #[serde(default = "default_token_env")]
    pub token_env: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,
}

impl Default for HostingConfig {
    fn default() -> Self {
        HostingConfig {
            token_env: default_token_env(),
            api_url: default_api_url(),
        }
    }
}

impl HostingConfig {
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|token| !token.is_empty())
    }
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `monorel.toml` in the package root
/// 3. `monorel.toml` in the user config directory
/// 4. Default configuration if no file found
///
/// # Returns
/// * `Ok(Config)` - Loaded or default configuration
/// * `Err` - If file exists but cannot be read or parsed
pub fn load_config(config_path: Option<&Path>, root: &Path) -> Result<Config> {
    let path = if let Some(path) = config_path {
        path.to_path_buf()
    } else if root.join(CONFIG_FILE_NAME).exists() {
        root.join(CONFIG_FILE_NAME)
    } else if let Some(config_dir) = dirs::config_dir() {
        let path = config_dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            path
        } else {
            return Ok(Config::default());
        }
    } else {
        return Ok(Config::default());
    };

    let content = fs::read_to_string(&path).map_err(|e| {
        MonorelError::config(format!("Cannot read {}: {}", path.display(), e))
    })?;
    parse_config(&content)
        .map_err(|e| MonorelError::config(format!("{}: {}", path.display(), e)))
}

/// Parse a configuration document
pub fn parse_config(content: &str) -> std::result::Result<Config, toml::de::Error> {
    toml::from_str(content)
}
