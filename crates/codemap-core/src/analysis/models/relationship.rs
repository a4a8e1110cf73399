//! Relationship edges between code entities.
//!
//! - **Structural**: CONTAINS, HAS_METHOD, HAS_PARAMETER
//! - **Dependency**: IMPORTS
//! - **Behavioral**: CALLS

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of relationship types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationKind {
    /// Parent contains child (file contains function, class contains field).
    Contains,
    /// Function calls function.
    Calls,
    /// File imports module.
    Imports,
    /// Class or interface declares method.
    HasMethod,
    /// Function declares parameter.
    HasParameter,
}

impl RelationKind {
    /// Graph relationship type for this kind.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Contains => "CONTAINS",
            Self::Calls => "CALLS",
            Self::Imports => "IMPORTS",
            Self::HasMethod => "HAS_METHOD",
            Self::HasParameter => "HAS_PARAMETER",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A directed, typed edge between two entity ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub kind: RelationKind,
    /// Source entity id.
    pub from: String,
    /// Target entity id.
    pub to: String,
    /// Extra edge facts (import `alias`, imported `names`, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Relationship {
    pub fn new(kind: RelationKind, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            kind,
            from: from.into(),
            to: to.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Identity used for de-duplication within a record.
    pub fn key(&self) -> (RelationKind, &str, &str) {
        (self.kind, &self.from, &self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_as_graph_type() {
        assert_eq!(serde_json::to_string(&RelationKind::HasMethod).unwrap(), "\"HAS_METHOD\"");
        assert_eq!(serde_json::to_string(&RelationKind::HasParameter).unwrap(), "\"HAS_PARAMETER\"");
        assert_eq!(RelationKind::Imports.to_string(), "IMPORTS");
    }

    #[test]
    fn test_attributes_skipped_when_empty() {
        let edge = Relationship::new(RelationKind::Calls, "a", "b");
        let json = serde_json::to_value(&edge).unwrap();
        assert!(json.get("attributes").is_none());

        let edge = edge.with_attribute("alias", "np");
        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json["attributes"]["alias"], "np");
    }
}
