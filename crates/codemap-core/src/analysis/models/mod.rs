//! Data models for analysis output.

mod entity;
mod record;
mod relationship;

pub use entity::{entity_id, CodeEntity, EntityKind, Span};
pub use record::{AnalysisRecord, RecordStats, SourceFile};
pub use relationship::{RelationKind, Relationship};
