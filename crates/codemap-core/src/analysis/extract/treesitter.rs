//! Tree-sitter node helpers shared across language extractors.

use tree_sitter::Node;

/// All children of a node, named and anonymous.
pub fn children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

/// Named children of a node.
pub fn named_children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// First child whose kind is one of `kinds`.
pub fn child_of_kind<'t>(node: &Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| kinds.contains(&c.kind()));
    found
}

/// All children whose kind is one of `kinds`.
pub fn children_of_kind<'t>(node: &Node<'t>, kinds: &[&str]) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .filter(|c| kinds.contains(&c.kind()))
        .collect()
}

/// Whether any direct child has the given kind (keywords included).
pub fn has_child(node: &Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == kind);
    found
}

/// Last segment of a path-like name: `a::b::C` -> `C`, `pkg.mod.f` -> `f`.
pub fn last_segment(text: &str) -> &str {
    text.rsplit(|c| matches!(c, '.' | ':' | '\\' | '/'))
        .find(|s| !s.is_empty())
        .unwrap_or(text)
}

/// Strip generic arguments: `Vec<T>` -> `Vec`.
pub fn strip_generics(text: &str) -> &str {
    match text.find('<') {
        Some(idx) => text[..idx].trim(),
        None => text.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("std::collections::HashMap"), "HashMap");
        assert_eq!(last_segment("os.path"), "path");
        assert_eq!(last_segment("App\\Models\\User"), "User");
        assert_eq!(last_segment("plain"), "plain");
    }

    #[test]
    fn test_strip_generics() {
        assert_eq!(strip_generics("Repo<T, U>"), "Repo");
        assert_eq!(strip_generics(" Server "), "Server");
    }

    #[test]
    fn test_child_helpers() {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .unwrap();
        let tree = parser.parse("async def f(): pass\n", None).unwrap();
        let func = tree.root_node().named_child(0).unwrap();
        assert_eq!(func.kind(), "function_definition");
        assert!(has_child(&func, "async"));
        assert!(child_of_kind(&func, &["parameters"]).is_some());
        assert_eq!(children_of_kind(&func, &["identifier"]).len(), 1);
        assert!(named_children(&func).len() >= 3);
        assert!(children(&func).len() > named_children(&func).len());
    }
}
