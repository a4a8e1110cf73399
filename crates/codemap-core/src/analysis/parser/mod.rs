//! Parsing infrastructure: turns source text into tree-sitter syntax trees.
//!
//! Each worker owns a [`ParserAdapter`]; adapters are never shared.

mod adapter;

pub use adapter::{first_error, ParserAdapter};
