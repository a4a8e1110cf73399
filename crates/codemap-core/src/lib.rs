pub mod analysis;
pub mod config;

pub use analysis::{
    AnalysisError, AnalysisOutput, AnalysisRecord, Analyzer, BatchSummary, CancellationToken,
    CodeEntity, EntityKind, FileSkip, Language, LanguageRegistry, RelationKind, Relationship,
    SkipReason,
};
pub use config::Config;
