//! Analysis error types.
//!
//! Two layers: [`AnalysisError`] aborts a whole batch, everything else is
//! recovered per file and reported as a [`FileSkip`].

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that abort a whole analysis batch.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Root path does not exist.
    #[error("Root path not found: {}", .0.display())]
    RootNotFound(PathBuf),

    /// Root path exists but is not a directory.
    #[error("Root path is not a directory: {}", .0.display())]
    RootNotDirectory(PathBuf),

    /// Root directory cannot be read at all.
    #[error("Root path is not readable at {}: {source}", path.display())]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The batch was cancelled; partial results were discarded.
    #[error("Analysis cancelled")]
    Cancelled,

    /// A worker task could not be joined.
    #[error("Worker failed: {0}")]
    Worker(String),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failure to turn source text into a usable syntax tree.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Failed to set language {language}: {message}")]
    Language { language: String, message: String },

    #[error("Parse timed out after {0} ms")]
    Timeout(u64),

    #[error("Parse cancelled")]
    Cancelled,

    #[error("Syntax error at line {line}, column {column}")]
    Syntax { line: usize, column: usize },

    #[error("Source is not valid UTF-8")]
    InvalidUtf8,

    #[error("Parser produced no tree")]
    NoTree,
}

/// An extractor failed on a structurally valid tree.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Syntax tree nested deeper than {limit} levels at line {line}")]
    TooDeep { line: usize, limit: usize },

    #[error("Extractor panicked: {0}")]
    Panicked(String),
}

// =============================================================================
// FILE-LEVEL SKIPS
// =============================================================================

/// Why a file produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Extension not registered, empty, or ignored.
    Unsupported,
    /// Larger than the configured size limit.
    TooLarge,
    /// File or directory unreadable, or broken symlink.
    Access,
    /// Grammar failed to produce a usable tree, or timed out.
    Parse,
    /// Extractor failed on a valid tree.
    Extractor,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unsupported => "unsupported",
            Self::TooLarge => "too_large",
            Self::Access => "access",
            Self::Parse => "parse",
            Self::Extractor => "extractor",
        }
    }

    /// Whether this skip is worth reporting individually.
    ///
    /// Unsupported files are expected in every tree and only counted.
    pub fn is_notable(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file that was skipped, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSkip {
    pub path: String,
    pub reason: SkipReason,
    pub message: String,
}

impl FileSkip {
    pub fn new(path: impl Into<String>, reason: SkipReason, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason,
            message: message.into(),
        }
    }

    pub fn unsupported(path: impl Into<String>) -> Self {
        Self::new(path, SkipReason::Unsupported, "no grammar registered")
    }

    pub fn access(path: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::new(path, SkipReason::Access, err.to_string())
    }

    pub fn parse(path: impl Into<String>, err: &ParseError) -> Self {
        Self::new(path, SkipReason::Parse, err.to_string())
    }

    pub fn extractor(path: impl Into<String>, err: &ExtractError) -> Self {
        Self::new(path, SkipReason::Extractor, err.to_string())
    }
}

impl fmt::Display for FileSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.path, self.reason, self.message)
    }
}
