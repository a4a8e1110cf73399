//! Multi-language static analysis producing per-file code graph records.
//!
//! # Components
//!
//! - [`LanguageRegistry`] - extension to [`Language`] mapping with ignore rules
//! - [`ParserAdapter`] - one tree-sitter parser, reset between files
//! - [`extract`] - per-language extractors behind the [`Extractor`] trait
//! - [`Walker`] - lazy, sorted traversal yielding files or skips
//! - [`GraphAssembler`] - collects outcomes into records and a [`BatchSummary`]
//! - [`Analyzer`] - the pipeline, sequential or on a worker pool
//!
//! # Output
//!
//! One [`AnalysisRecord`] per successfully analysed file:
//! - **Entities**: File, Module, Class, Interface, Function, Variable
//! - **Relationships**: CONTAINS, CALLS, IMPORTS, HAS_METHOD, HAS_PARAMETER
//!
//! Records are self-contained; edges never reference another file's entities.
//!
//! # Example
//!
//! ```ignore
//! use codemap_core::analysis::Analyzer;
//! use codemap_core::config::Config;
//!
//! let analyzer = Analyzer::new(Config::load()?);
//! let output = analyzer.analyze("./src").await?;
//! println!("{}", output.summary);
//! ```

pub mod assembler;
pub mod cancellation;
pub mod error;
pub mod extract;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod registry;
pub mod walker;

pub use assembler::{assemble, AnalysisOutput, BatchSummary, FileOutcome, GraphAssembler};
pub use cancellation::CancellationToken;
pub use error::{AnalysisError, ExtractError, FileSkip, ParseError, SkipReason};
pub use extract::{Extraction, Extractor};
pub use models::{AnalysisRecord, CodeEntity, EntityKind, RecordStats, RelationKind, Relationship, SourceFile, Span};
pub use parser::ParserAdapter;
pub use pipeline::Analyzer;
pub use registry::{Language, LanguageRegistry};
pub use walker::{Walk, Walker};
