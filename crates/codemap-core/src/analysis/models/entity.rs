//! Code entity nodes: Files, Modules, Classes, Interfaces, Functions, Variables.
//!
//! The label set here is the vocabulary consumed by the downstream graph store,
//! so variant names serialize exactly as `File`, `Module`, `Class`, ...

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// ENTITY KIND
// =============================================================================

/// The closed set of entity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    File,
    Module,
    Class,
    Interface,
    Function,
    Variable,
}

impl EntityKind {
    /// Graph label for this kind.
    pub fn label(&self) -> &'static str {
        match self {
            Self::File => "File",
            Self::Module => "Module",
            Self::Class => "Class",
            Self::Interface => "Interface",
            Self::Function => "Function",
            Self::Variable => "Variable",
        }
    }

    /// Lower-case prefix used in entity identifiers.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Module => "module",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Function => "function",
            Self::Variable => "variable",
        }
    }

    /// Whether this kind can own methods (`HAS_METHOD`).
    pub fn is_type(&self) -> bool {
        matches!(self, Self::Class | Self::Interface)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// SPAN
// =============================================================================

/// Source location of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// 1-based first line.
    pub start_line: u32,
    /// 1-based last line (inclusive).
    pub end_line: u32,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl Span {
    pub fn new(start_line: u32, end_line: u32, start_byte: usize, end_byte: usize) -> Self {
        Self {
            start_line,
            end_line,
            start_byte,
            end_byte,
        }
    }

    /// Span of a tree-sitter node.
    pub fn of(node: &tree_sitter::Node) -> Self {
        Self {
            start_line: node.start_position().row as u32 + 1,
            end_line: node.end_position().row as u32 + 1,
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
        }
    }
}

// =============================================================================
// CODE ENTITY
// =============================================================================

/// A node in the code graph.
///
/// Identity is `id`: two entities with the same id are the same entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeEntity {
    /// Stable identifier, see [`entity_id`].
    pub id: String,

    pub kind: EntityKind,

    /// Display name (last path segment, or a synthetic `<anonymous@L:C>` name).
    pub name: String,

    /// Name qualified by enclosing modules, classes and functions (dot separated).
    pub qualified_name: String,

    /// Project-relative path of the owning file.
    pub file_path: String,

    pub span: Span,

    /// Whether the entity is visible outside its file, by language convention.
    pub exported: bool,

    /// Optional facts (`async`, `return_type`, `position`, `alias`, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl CodeEntity {
    /// Create an entity, deriving its id from kind, path and qualified name.
    pub fn new(
        kind: EntityKind,
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        file_path: impl Into<String>,
        span: Span,
    ) -> Self {
        let qualified_name = qualified_name.into();
        let file_path = file_path.into();
        Self {
            id: entity_id(kind, &file_path, &qualified_name),
            kind,
            name: name.into(),
            qualified_name,
            file_path,
            span,
            exported: false,
            attributes: BTreeMap::new(),
        }
    }

    pub fn exported(mut self, exported: bool) -> Self {
        self.exported = exported;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Derive the identifier of an entity.
///
/// Files are `file:<path>`; everything else is `<kind>:<path>#<qualified_name>`.
pub fn entity_id(kind: EntityKind, file_path: &str, qualified_name: &str) -> String {
    match kind {
        EntityKind::File => format!("file:{}", file_path),
        _ => format!("{}:{}#{}", kind.id_prefix(), file_path, qualified_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_format() {
        assert_eq!(entity_id(EntityKind::File, "src/a.py", "a.py"), "file:src/a.py");
        assert_eq!(
            entity_id(EntityKind::Function, "src/a.py", "Foo.bar"),
            "function:src/a.py#Foo.bar"
        );
        assert_eq!(entity_id(EntityKind::Module, "a.go", "fmt"), "module:a.go#fmt");
    }

    #[test]
    fn test_kind_serializes_as_label() {
        let json = serde_json::to_string(&EntityKind::Interface).unwrap();
        assert_eq!(json, "\"Interface\"");
    }

    #[test]
    fn test_entity_builder() {
        let entity = CodeEntity::new(EntityKind::Class, "User", "models.User", "m.py", Span::default())
            .exported(true)
            .with_attribute("bases", "Base");
        assert_eq!(entity.id, "class:m.py#models.User");
        assert!(entity.exported);
        assert_eq!(entity.attribute("bases"), Some("Base"));
    }
}
