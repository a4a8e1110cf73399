//! Configuration management for codemap.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `codemap.toml` file
//! 3. User config `~/.config/codemap/config.toml`
//! 4. Built-in defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod defaults;

pub use defaults::*;

use crate::analysis::registry::{normalize_extension, LanguageRegistry};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory traversal configuration.
    pub walk: WalkConfig,

    /// Parsing and worker pool configuration.
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Searches for config in order:
    /// 1. `./codemap.toml` (project local)
    /// 2. `~/.config/codemap/config.toml` (user config)
    /// 3. Falls back to defaults
    ///
    /// Environment overrides are applied on top of whichever source was used.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = if Path::new(PROJECT_CONFIG_FILE).exists() {
            Self::read(PROJECT_CONFIG_FILE)?
        } else {
            match dirs::config_dir()
                .map(|dir| dir.join(USER_CONFIG_DIR).join("config.toml"))
                .filter(|path| path.exists())
            {
                Some(user_config) => Self::read(user_config)?,
                None => Self::default(),
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::read(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn read(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a variable lookup. Unparseable values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(n) = lookup("CODEMAP_WORKERS").and_then(|v| v.trim().parse().ok()) {
            self.analysis.workers = n;
        }
        if let Some(n) = lookup("CODEMAP_PARSE_TIMEOUT_MS").and_then(|v| v.trim().parse().ok()) {
            self.analysis.parse_timeout_ms = n;
        }
        if let Some(n) = lookup("CODEMAP_MAX_FILE_SIZE").and_then(|v| v.trim().parse().ok()) {
            self.walk.max_file_size = n;
        }
        if let Some(dirs) = lookup("CODEMAP_IGNORE_DIRS") {
            self.walk.ignore_dirs = split_list(&dirs);
        }
        if let Some(exts) = lookup("CODEMAP_IGNORE_EXTENSIONS") {
            self.walk.ignore_extensions = split_list(&exts);
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "analysis.queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.walk.max_file_size == 0 {
            return Err(ConfigError::Invalid(
                "walk.max_file_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the language registry for this configuration.
    pub fn registry(&self) -> LanguageRegistry {
        LanguageRegistry::with_ignored_extensions(&self.walk.ignore_extensions)
    }

    /// Create a default config file content as a string.
    pub fn default_config_string() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Directory traversal configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    /// Directory names skipped with their subtree, at any depth.
    pub ignore_dirs: Vec<String>,

    /// Extensions treated as unsupported (without leading dot).
    pub ignore_extensions: Vec<String>,

    /// Files larger than this (in bytes) are skipped.
    pub max_file_size: u64,

    /// Follow symbolic links.
    pub follow_links: bool,

    /// Honour `.gitignore` files.
    pub respect_gitignore: bool,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            ignore_dirs: DEFAULT_IGNORE_DIRS.iter().map(|s| s.to_string()).collect(),
            ignore_extensions: DEFAULT_IGNORE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            follow_links: DEFAULT_FOLLOW_LINKS,
            respect_gitignore: DEFAULT_RESPECT_GITIGNORE,
        }
    }
}

impl WalkConfig {
    /// Whether a directory name is on the ignore list.
    pub fn is_ignored_dir(&self, name: &str) -> bool {
        self.ignore_dirs.iter().any(|d| d == name)
    }

    /// Whether a file name ends in an ignored extension.
    ///
    /// Multi-part entries like `min.js` match on the full suffix.
    pub fn is_ignored_file(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        self.ignore_extensions.iter().any(|ext| {
            let ext = normalize_extension(ext);
            !ext.is_empty() && lower.ends_with(&format!(".{}", ext))
        })
    }
}

/// Parsing and worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Number of parser workers; zero means one per CPU.
    pub workers: usize,

    /// Per-file parse timeout in milliseconds; zero disables it.
    pub parse_timeout_ms: u64,

    /// Bounded queue between the walker and the workers.
    pub queue_capacity: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            parse_timeout_ms: DEFAULT_PARSE_TIMEOUT_MS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl AnalysisConfig {
    /// Resolved worker count.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    pub fn parse_timeout(&self) -> Duration {
        Duration::from_millis(self.parse_timeout_ms)
    }
}
