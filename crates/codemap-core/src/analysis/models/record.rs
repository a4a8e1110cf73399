//! Per-file inputs and outputs of the analysis pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::entity::{CodeEntity, EntityKind};
use super::relationship::{RelationKind, Relationship};
use crate::analysis::registry::Language;

/// A file selected by the walker for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the project root, `/`-separated.
    pub path: String,
    /// Absolute (or root-joined) path used for reading.
    pub absolute_path: PathBuf,
    pub language: Language,
    /// Size on disk in bytes.
    pub size: u64,
}

/// The self-contained extraction result for one source file.
///
/// Serializes as `{path, language, entities, relationships}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub path: String,
    /// Grammar name of the language (e.g. `python`, `c_sharp`).
    pub language: String,
    pub entities: Vec<CodeEntity>,
    pub relationships: Vec<Relationship>,
}

impl AnalysisRecord {
    /// The record's File entity.
    pub fn file_entity(&self) -> Option<&CodeEntity> {
        self.entities.iter().find(|e| e.kind == EntityKind::File)
    }

    /// Entities of the given kind.
    pub fn entities_of(&self, kind: EntityKind) -> impl Iterator<Item = &CodeEntity> {
        self.entities.iter().filter(move |e| e.kind == kind)
    }

    /// Relationships of the given kind.
    pub fn relationships_of(&self, kind: RelationKind) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter().filter(move |r| r.kind == kind)
    }

    /// Look up an entity by id.
    pub fn entity(&self, id: &str) -> Option<&CodeEntity> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Look up the first entity of a kind by display name.
    pub fn find(&self, kind: EntityKind, name: &str) -> Option<&CodeEntity> {
        self.entities.iter().find(|e| e.kind == kind && e.name == name)
    }

    /// Whether an edge of `kind` connects the two ids.
    pub fn has_relationship(&self, kind: RelationKind, from: &str, to: &str) -> bool {
        self.relationships
            .iter()
            .any(|r| r.kind == kind && r.from == from && r.to == to)
    }

    /// Statistics about this record.
    pub fn stats(&self) -> RecordStats {
        let mut stats = RecordStats::default();

        for entity in &self.entities {
            match entity.kind {
                EntityKind::File => stats.files += 1,
                EntityKind::Module => stats.modules += 1,
                EntityKind::Class => stats.classes += 1,
                EntityKind::Interface => stats.interfaces += 1,
                EntityKind::Function => stats.functions += 1,
                EntityKind::Variable => stats.variables += 1,
            }
        }

        for rel in &self.relationships {
            match rel.kind {
                RelationKind::Contains => stats.contains += 1,
                RelationKind::Calls => stats.calls += 1,
                RelationKind::Imports => stats.imports += 1,
                RelationKind::HasMethod => stats.has_method += 1,
                RelationKind::HasParameter => stats.has_parameter += 1,
            }
        }

        stats
    }
}

/// Counts of entities and relationships in a record.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordStats {
    pub files: usize,
    pub modules: usize,
    pub classes: usize,
    pub interfaces: usize,
    pub functions: usize,
    pub variables: usize,
    pub contains: usize,
    pub calls: usize,
    pub imports: usize,
    pub has_method: usize,
    pub has_parameter: usize,
}

impl std::fmt::Display for RecordStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Entities:")?;
        writeln!(f, "  Modules:    {}", self.modules)?;
        writeln!(f, "  Classes:    {}", self.classes)?;
        writeln!(f, "  Interfaces: {}", self.interfaces)?;
        writeln!(f, "  Functions:  {}", self.functions)?;
        writeln!(f, "  Variables:  {}", self.variables)?;
        writeln!(f, "Relationships:")?;
        writeln!(f, "  Contains:     {}", self.contains)?;
        writeln!(f, "  Calls:        {}", self.calls)?;
        writeln!(f, "  Imports:      {}", self.imports)?;
        writeln!(f, "  HasMethod:    {}", self.has_method)?;
        writeln!(f, "  HasParameter: {}", self.has_parameter)?;
        Ok(())
    }
}
