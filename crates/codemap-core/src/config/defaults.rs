//! Default values for codemap configuration.
//!
//! All hardcoded defaults are centralized here for easy maintenance.

// ============================================================================
// Walk Defaults
// ============================================================================

/// Maximum size of a single source file to analyse (1 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Directory names skipped with their whole subtree.
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[
    // Version control
    ".git",
    ".svn",
    ".hg",
    // Dependencies
    "node_modules",
    "bower_components",
    "vendor",
    "venv",
    ".venv",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    // Build outputs
    "target",
    "build",
    "dist",
    "out",
    "bin",
    "obj",
    // IDE/Editor
    ".idea",
    ".vscode",
    ".vs",
    // Other common excludes
    "coverage",
    ".next",
    ".nuxt",
    ".cache",
];

/// Extensions never analysed even when a grammar could read them.
///
/// Minified bundles and generated declaration files carry no useful structure.
pub const DEFAULT_IGNORE_EXTENSIONS: &[&str] = &["min.js", "map", "lock", "d.ts"];

/// Follow symbolic links while walking.
pub const DEFAULT_FOLLOW_LINKS: bool = false;

/// Honour `.gitignore` files while walking.
pub const DEFAULT_RESPECT_GITIGNORE: bool = false;

// ============================================================================
// Analysis Defaults
// ============================================================================

/// Worker count; zero means one per available CPU.
pub const DEFAULT_WORKERS: usize = 0;

/// Per-file parse timeout (10 s).
pub const DEFAULT_PARSE_TIMEOUT_MS: u64 = 10_000;

/// Capacity of the channel between the walker and the workers.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

// ============================================================================
// Locations
// ============================================================================

/// Project-local config file name.
pub const PROJECT_CONFIG_FILE: &str = "codemap.toml";

/// Directory under the user config dir holding `config.toml`.
pub const USER_CONFIG_DIR: &str = "codemap";
