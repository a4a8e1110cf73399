//! Core extractor trait for language-specific entity extraction.

use tree_sitter::Tree;

use super::context::Extraction;
use crate::analysis::error::ExtractError;

/// Language-specific entity extractor.
///
/// Implementations walk a syntax tree that parsed without errors and report
/// declarations to an [`ExtractionContext`](super::ExtractionContext). They
/// are pure: no I/O and no state shared between calls.
pub trait Extractor: Send + Sync {
    /// Extract the entities and relationships of one file.
    ///
    /// # Arguments
    /// * `tree` - Error-free syntax tree of `source`
    /// * `source` - File content
    /// * `path` - Project-relative path, used for entity ids
    fn extract(&self, tree: &Tree, source: &str, path: &str) -> Result<Extraction, ExtractError>;

    /// Human-readable language name.
    fn language_name(&self) -> &'static str;
}
