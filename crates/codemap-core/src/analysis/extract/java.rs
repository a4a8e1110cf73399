//! Java extractor.

use tree_sitter::{Node, Tree};

use super::context::{CallTarget, Declared, Extraction, ExtractionContext, ScopeKind};
use super::traits::Extractor;
use super::treesitter::{child_of_kind, children, has_child, named_children};
use crate::analysis::error::ExtractError;
use crate::analysis::models::{entity_id, EntityKind};

pub struct JavaExtractor;

impl Extractor for JavaExtractor {
    fn extract(&self, tree: &Tree, source: &str, path: &str) -> Result<Extraction, ExtractError> {
        let mut ctx = ExtractionContext::new(path, source);
        self.visit(tree.root_node(), &mut ctx, 0)?;
        Ok(ctx.finish())
    }

    fn language_name(&self) -> &'static str {
        "Java"
    }
}

/// Modifier keywords on a declaration.
fn modifiers(node: &Node) -> Vec<&'static str> {
    let Some(mods) = child_of_kind(node, &["modifiers"]) else {
        return Vec::new();
    };
    children(&mods)
        .iter()
        .filter_map(|m| match m.kind() {
            "public" => Some("public"),
            "private" => Some("private"),
            "protected" => Some("protected"),
            "static" => Some("static"),
            "abstract" => Some("abstract"),
            "final" => Some("final"),
            _ => None,
        })
        .collect()
}

fn is_exported(mods: &[&str]) -> bool {
    !mods.iter().any(|m| matches!(*m, "private" | "protected"))
}

impl JavaExtractor {
    fn visit(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        ctx.check_depth(&node, depth)?;

        match node.kind() {
            "package_declaration" => {
                if let Some(name) = child_of_kind(&node, &["scoped_identifier", "identifier"]) {
                    let name = ctx.text(&name);
                    let module = ctx.declare_module(name, &node);
                    ctx.enter(ScopeKind::Module, &module);
                }
                return Ok(());
            }
            "import_declaration" => {
                self.extract_import(&node, ctx);
                return Ok(());
            }
            "class_declaration" | "enum_declaration" | "record_declaration" => {
                return self.visit_type(node, EntityKind::Class, ctx, depth)
            }
            "interface_declaration" | "annotation_type_declaration" => {
                return self.visit_type(node, EntityKind::Interface, ctx, depth)
            }
            "method_declaration" | "constructor_declaration" => {
                return self.visit_method(node, ctx, depth)
            }
            "field_declaration" | "constant_declaration" => {
                self.extract_field(&node, ctx);
                return Ok(());
            }
            "enum_constant" => {
                if let Some(name) = ctx.field_text(&node, "name") {
                    ctx.declare_variable(name, &node, true);
                }
            }
            "method_invocation" => self.extract_call(&node, ctx),
            _ => {}
        }

        self.visit_children(node, ctx, depth)
    }

    fn visit_children(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child, ctx, depth + 1)?;
        }
        Ok(())
    }

    fn visit_type(
        &self,
        node: Node,
        kind: EntityKind,
        ctx: &mut ExtractionContext,
        depth: usize,
    ) -> Result<(), ExtractError> {
        let Some(name) = ctx.field_text(&node, "name") else {
            return Ok(());
        };
        let mods = modifiers(&node);
        let declared = ctx.declare_type(kind, name, &node, is_exported(&mods));

        match node.kind() {
            "enum_declaration" => ctx.set_attribute(&declared.id, "type_kind", "enum"),
            "record_declaration" => ctx.set_attribute(&declared.id, "type_kind", "record"),
            "annotation_type_declaration" => ctx.set_attribute(&declared.id, "type_kind", "annotation"),
            _ => {}
        }
        if mods.contains(&"abstract") {
            ctx.set_attribute(&declared.id, "abstract", "true");
        }
        if let Some(superclass) = node.child_by_field_name("superclass") {
            let base = ctx.text(&superclass).trim_start_matches("extends").trim();
            ctx.set_attribute(&declared.id, "bases", base);
        }
        let implemented = node
            .child_by_field_name("interfaces")
            .or_else(|| child_of_kind(&node, &["extends_interfaces"]))
            .and_then(|i| child_of_kind(&i, &["type_list"]))
            .map(|list| {
                named_children(&list)
                    .iter()
                    .map(|t| ctx.text(t))
                    .collect::<Vec<_>>()
                    .join(",")
            });
        if let Some(implemented) = implemented {
            let key = if kind == EntityKind::Interface { "bases" } else { "implements" };
            ctx.set_attribute(&declared.id, key, implemented);
        }

        ctx.enter(ScopeKind::Class, &declared);

        // Record components are fields.
        if let Some(params) = node.child_by_field_name("parameters") {
            for component in named_children(&params) {
                if let Some(field) = ctx.field_text(&component, "name") {
                    ctx.declare_variable(field, &component, true);
                }
            }
        }

        let result = match node.child_by_field_name("body") {
            Some(body) => self.visit_children(body, ctx, depth + 1),
            None => Ok(()),
        };
        ctx.leave();
        result
    }

    fn visit_method(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let Some(name) = ctx.field_text(&node, "name") else {
            return Ok(());
        };
        let mods = modifiers(&node);
        let method = ctx.declare_function(name, &node, is_exported(&mods));

        if node.kind() == "constructor_declaration" {
            ctx.set_attribute(&method.id, "constructor", "true");
        } else if let Some(return_type) = ctx.field_text(&node, "type") {
            ctx.set_attribute(&method.id, "return_type", return_type);
        }
        if mods.contains(&"static") {
            ctx.set_attribute(&method.id, "static", "true");
        }
        if mods.contains(&"abstract") {
            ctx.set_attribute(&method.id, "abstract", "true");
        }

        if let Some(params) = node.child_by_field_name("parameters") {
            self.extract_parameters(&params, &method, ctx);
        }

        ctx.enter(ScopeKind::Function, &method);
        let result = match node.child_by_field_name("body") {
            Some(body) => self.visit(body, ctx, depth + 1),
            None => Ok(()),
        };
        ctx.leave();
        result
    }

    fn extract_parameters(&self, params: &Node, method: &Declared, ctx: &mut ExtractionContext) {
        let mut position = 0;
        for param in named_children(params) {
            let name = match param.kind() {
                "formal_parameter" => param.child_by_field_name("name"),
                "spread_parameter" => child_of_kind(&param, &["variable_declarator"])
                    .and_then(|d| d.child_by_field_name("name")),
                _ => None,
            };
            let Some(name) = name else { continue };

            let type_name = ctx.field_text(&param, "type").or_else(|| {
                named_children(&param)
                    .into_iter()
                    .find(|c| c.kind().ends_with("_type") || c.kind() == "type_identifier")
                    .map(|t| ctx.text(&t))
            });

            position += 1;
            let name = ctx.text(&name);
            ctx.declare_parameter(method, name, position, &param, type_name);
        }
    }

    fn extract_field(&self, node: &Node, ctx: &mut ExtractionContext) {
        let mods = modifiers(node);
        // Interface constants are implicitly public.
        let exported = node.kind() == "constant_declaration" || is_exported(&mods);
        let type_name = ctx.field_text(node, "type");

        let mut cursor = node.walk();
        let declarators: Vec<Node> = node.children_by_field_name("declarator", &mut cursor).collect();
        for declarator in declarators {
            let Some(name) = ctx.field_text(&declarator, "name") else { continue };
            if let Some(field) = ctx.declare_variable(name, &declarator, exported) {
                if let Some(t) = type_name {
                    ctx.set_attribute(&field.id, "type", t);
                }
                if mods.contains(&"static") {
                    ctx.set_attribute(&field.id, "static", "true");
                }
            }
        }
    }

    fn extract_import(&self, node: &Node, ctx: &mut ExtractionContext) {
        let Some(path) = child_of_kind(node, &["scoped_identifier", "identifier"]) else {
            return;
        };
        let path = ctx.text(&path);
        let names = if has_child(node, "asterisk") {
            vec!["*".to_string()]
        } else {
            Vec::new()
        };
        ctx.add_import(path, node, None, &names);

        if has_child(node, "static") {
            let id = entity_id(EntityKind::Module, ctx.path(), path);
            ctx.set_attribute(&id, "static", "true");
        }
    }

    fn extract_call(&self, node: &Node, ctx: &mut ExtractionContext) {
        let Some(name) = ctx.field_text(node, "name") else { return };
        let target = match node.child_by_field_name("object") {
            None => CallTarget::Bare(name.to_string()),
            Some(object) if object.kind() == "this" => CallTarget::SelfMember(name.to_string()),
            Some(_) => CallTarget::Member(name.to_string()),
        };
        ctx.record_call(target);
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::analysis::models::{EntityKind, RelationKind};
    use crate::analysis::registry::Language;

    const SOURCE: &str = r#"package com.example.users;

import java.util.List;
import java.util.*;
import static java.lang.Math.max;

public class UserService extends BaseService implements Service, Closeable {
    private static final int LIMIT = 10;
    protected String name, label;

    public UserService(String name) {
        this.name = name;
    }

    public List<User> findAll(int page, String... filters) {
        validate(page);
        return this.query(page);
    }

    private void validate(int page) {}

    private List<User> query(int page) {
        return repo.fetch(page);
    }

    static class Cache {}
}

interface Service {
    void close();
}

enum Role { ADMIN, USER }

record Point(int x, int y) {}
"#;

    #[test]
    fn test_package_and_types() {
        let out = run(Language::Java, "src/UserService.java", SOURCE);

        let package = find(&out, EntityKind::Module, "com.example.users");
        let service = find(&out, EntityKind::Class, "UserService");
        assert_eq!(service.qualified_name, "com.example.users.UserService");
        assert!(service.exported);
        assert_eq!(service.attribute("bases"), Some("BaseService"));
        assert_eq!(service.attribute("implements"), Some("Service,Closeable"));
        assert!(related(&out, RelationKind::Contains, &package.id, &service.id));

        let cache = find(&out, EntityKind::Class, "Cache");
        assert!(related(&out, RelationKind::Contains, &service.id, &cache.id));

        let iface = find(&out, EntityKind::Interface, "Service");
        let close = find(&out, EntityKind::Function, "close");
        assert!(related(&out, RelationKind::HasMethod, &iface.id, &close.id));

        assert_eq!(find(&out, EntityKind::Class, "Role").attribute("type_kind"), Some("enum"));
        assert!(has(&out, EntityKind::Variable, "ADMIN"));
        assert_eq!(find(&out, EntityKind::Class, "Point").attribute("type_kind"), Some("record"));
        assert!(out
            .entities
            .iter()
            .any(|e| e.qualified_name == "com.example.users.Point.x"));
    }

    #[test]
    fn test_methods_fields_and_calls() {
        let out = run(Language::Java, "src/UserService.java", SOURCE);

        let service = find(&out, EntityKind::Class, "UserService");
        let ctor = out
            .entities
            .iter()
            .find(|e| e.qualified_name == "com.example.users.UserService.UserService")
            .unwrap();
        assert_eq!(ctor.attribute("constructor"), Some("true"));

        let find_all = find(&out, EntityKind::Function, "findAll");
        let validate = find(&out, EntityKind::Function, "validate");
        let query = find(&out, EntityKind::Function, "query");
        assert!(related(&out, RelationKind::HasMethod, &service.id, &find_all.id));
        assert_eq!(parameters(&out, find_all), vec!["page", "filters"]);
        assert_eq!(find_all.attribute("return_type"), Some("List<User>"));
        assert!(find_all.exported);
        assert!(!validate.exported);
        assert!(related(&out, RelationKind::Calls, &find_all.id, &validate.id));
        assert!(related(&out, RelationKind::Calls, &find_all.id, &query.id));

        let limit = find(&out, EntityKind::Variable, "LIMIT");
        assert!(!limit.exported);
        assert_eq!(limit.attribute("static"), Some("true"));
        assert!(has(&out, EntityKind::Variable, "label"));
    }

    #[test]
    fn test_imports() {
        let out = run(Language::Java, "src/UserService.java", SOURCE);
        assert_eq!(
            imports(&out),
            vec!["java.util.List", "java.util", "java.lang.Math.max"]
        );
        let wildcard = out
            .relationships
            .iter()
            .find(|r| r.to == "module:src/UserService.java#java.util")
            .unwrap();
        assert_eq!(wildcard.attributes.get("names").map(String::as_str), Some("*"));
    }
}
