//! Python extractor.

use tree_sitter::{Node, Tree};

use super::context::{CallTarget, Declared, Extraction, ExtractionContext, ScopeKind};
use super::traits::Extractor;
use super::treesitter::{has_child, named_children};
use crate::analysis::error::ExtractError;
use crate::analysis::models::EntityKind;

/// Base classes that make a Python class an interface.
const INTERFACE_BASES: &[&str] = &["Protocol", "typing.Protocol", "ABC", "abc.ABC"];

pub struct PythonExtractor;

impl Extractor for PythonExtractor {
    fn extract(&self, tree: &Tree, source: &str, path: &str) -> Result<Extraction, ExtractError> {
        let mut ctx = ExtractionContext::new(path, source);
        self.visit(tree.root_node(), &mut ctx, 0)?;
        Ok(ctx.finish())
    }

    fn language_name(&self) -> &'static str {
        "Python"
    }
}

/// Leading underscore marks a private name; dunder names stay public.
fn is_public(name: &str) -> bool {
    !name.starts_with('_') || (name.starts_with("__") && name.ends_with("__") && name.len() > 4)
}

impl PythonExtractor {
    fn visit(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        ctx.check_depth(&node, depth)?;

        match node.kind() {
            "function_definition" => return self.visit_function(node, ctx, depth),
            "class_definition" => return self.visit_class(node, ctx, depth),
            "lambda" => return self.visit_lambda(node, ctx, depth),
            "import_statement" => {
                self.extract_import(&node, ctx);
                return Ok(());
            }
            "import_from_statement" | "future_import_statement" => {
                self.extract_from_import(&node, ctx);
                return Ok(());
            }
            "assignment" => self.extract_assignment(&node, ctx),
            "call" => self.extract_call(&node, ctx),
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

    fn visit_function(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let Some(name) = ctx.field_text(&node, "name") else {
            return self.visit_children(node, ctx, depth);
        };

        let function = ctx.declare_function(name, &node, is_public(name));

        if has_child(&node, "async") {
            ctx.set_attribute(&function.id, "async", "true");
        }
        if let Some(return_type) = ctx.field_text(&node, "return_type") {
            ctx.set_attribute(&function.id, "return_type", return_type);
        }
        if let Some(decorated) = node.parent().filter(|p| p.kind() == "decorated_definition") {
            let decorators: Vec<&str> = named_children(&decorated)
                .iter()
                .filter(|c| c.kind() == "decorator")
                .map(|d| ctx.text(d).trim_start_matches('@').trim())
                .collect();
            if !decorators.is_empty() {
                ctx.set_attribute(&function.id, "decorators", decorators.join(","));
            }
        }

        if let Some(params) = node.child_by_field_name("parameters") {
            self.extract_parameters(&params, &function, ctx);
        }

        self.visit_body(node, &function, ctx, depth)
    }

    fn visit_lambda(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let name = ctx.synthetic_name("anonymous", &node);
        let function = ctx.declare_function(&name, &node, false);
        if let Some(params) = node.child_by_field_name("parameters") {
            self.extract_parameters(&params, &function, ctx);
        }
        self.visit_body(node, &function, ctx, depth)
    }

    fn visit_body(
        &self,
        node: Node,
        function: &Declared,
        ctx: &mut ExtractionContext,
        depth: usize,
    ) -> Result<(), ExtractError> {
        ctx.enter(ScopeKind::Function, function);
        let result = match node.child_by_field_name("body") {
            Some(body) => self.visit(body, ctx, depth + 1),
            None => Ok(()),
        };
        ctx.leave();
        result
    }

    fn visit_class(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let Some(name) = ctx.field_text(&node, "name") else {
            return self.visit_children(node, ctx, depth);
        };

        let bases: Vec<&str> = node
            .child_by_field_name("superclasses")
            .map(|sc| {
                named_children(&sc)
                    .iter()
                    .filter(|c| matches!(c.kind(), "identifier" | "attribute" | "subscript"))
                    .map(|c| ctx.text(c))
                    .collect()
            })
            .unwrap_or_default();

        let kind = if bases.iter().any(|b| {
            let base = b.split('[').next().unwrap_or(b);
            INTERFACE_BASES.contains(&base)
        }) {
            EntityKind::Interface
        } else {
            EntityKind::Class
        };

        let class = ctx.declare_type(kind, name, &node, is_public(name));
        if !bases.is_empty() {
            ctx.set_attribute(&class.id, "bases", bases.join(","));
        }

        ctx.enter(ScopeKind::Class, &class);
        let result = match node.child_by_field_name("body") {
            Some(body) => self.visit(body, ctx, depth + 1),
            None => Ok(()),
        };
        ctx.leave();
        result
    }

    fn extract_parameters(&self, params: &Node, function: &Declared, ctx: &mut ExtractionContext) {
        let mut position = 0;
        for child in named_children(params) {
            let (name_node, type_name) = match child.kind() {
                "identifier" => (Some(child), None),
                "typed_parameter" => (
                    named_children(&child).into_iter().find(|c| {
                        matches!(
                            c.kind(),
                            "identifier" | "list_splat_pattern" | "dictionary_splat_pattern"
                        )
                    }),
                    ctx.field_text(&child, "type"),
                ),
                "default_parameter" | "typed_default_parameter" => (
                    child.child_by_field_name("name"),
                    ctx.field_text(&child, "type"),
                ),
                "list_splat_pattern" | "dictionary_splat_pattern" => (Some(child), None),
                _ => (None, None),
            };

            let Some(name_node) = name_node else { continue };
            let name = ctx
                .text(&name_node)
                .trim_start_matches('*')
                .trim();
            if name.is_empty() || name == "self" || name == "cls" {
                continue;
            }

            position += 1;
            ctx.declare_parameter(function, name, position, &child, type_name);
        }
    }

    fn extract_import(&self, node: &Node, ctx: &mut ExtractionContext) {
        let mut cursor = node.walk();
        let names: Vec<Node> = node.children_by_field_name("name", &mut cursor).collect();
        for name in names {
            match name.kind() {
                "aliased_import" => {
                    let source = ctx.field_text(&name, "name").unwrap_or_default();
                    let alias = ctx.field_text(&name, "alias");
                    ctx.add_import(source, node, alias, &[]);
                }
                _ => {
                    let source = ctx.text(&name);
                    ctx.add_import(source, node, None, &[]);
                }
            }
        }
    }

    fn extract_from_import(&self, node: &Node, ctx: &mut ExtractionContext) {
        let source = if node.kind() == "future_import_statement" {
            "__future__"
        } else {
            match ctx.field_text(node, "module_name") {
                Some(module) => module,
                None => return,
            }
        };

        let mut imported = Vec::new();
        let mut cursor = node.walk();
        let names: Vec<Node> = node.children_by_field_name("name", &mut cursor).collect();
        for name in names {
            let text = match name.kind() {
                "aliased_import" => {
                    let original = ctx.field_text(&name, "name").unwrap_or_default();
                    match ctx.field_text(&name, "alias") {
                        Some(alias) => format!("{} as {}", original, alias),
                        None => original.to_string(),
                    }
                }
                _ => ctx.text(&name).to_string(),
            };
            imported.push(text);
        }
        if named_children(node).iter().any(|c| c.kind() == "wildcard_import") {
            imported.push("*".to_string());
        }

        ctx.add_import(source, node, None, &imported);
    }

    fn extract_assignment(&self, node: &Node, ctx: &mut ExtractionContext) {
        let Some(left) = node.child_by_field_name("left") else { return };

        match left.kind() {
            "identifier" => {
                let name = ctx.text(&left);
                if let Some(var) = ctx.declare_variable(name, node, is_public(name)) {
                    if let Some(t) = ctx.field_text(node, "type") {
                        ctx.set_attribute(&var.id, "type", t);
                    }
                }
            }
            "attribute" => {
                let object = left.child_by_field_name("object").map(|o| ctx.text(&o));
                if object == Some("self") {
                    if let Some(attr) = ctx.field_text(&left, "attribute") {
                        ctx.declare_field(attr, node, is_public(attr));
                    }
                }
            }
            "pattern_list" | "tuple_pattern" | "list_pattern" => {
                if !(ctx.at_module_level() || ctx.in_type_body()) {
                    return;
                }
                let mut names = Vec::new();
                collect_pattern_names(&left, ctx, &mut names);
                if names.is_empty() {
                    let synthetic = ctx.synthetic_name("destructured", &left);
                    ctx.declare_variable(&synthetic, node, false);
                }
                for name in names {
                    ctx.declare_variable(name, node, is_public(name));
                }
            }
            _ => {}
        }
    }

    fn extract_call(&self, node: &Node, ctx: &mut ExtractionContext) {
        let Some(function) = node.child_by_field_name("function") else { return };

        let target = match function.kind() {
            "identifier" => CallTarget::Bare(ctx.text(&function).to_string()),
            "attribute" => {
                let Some(attr) = ctx.field_text(&function, "attribute") else { return };
                let object = function.child_by_field_name("object").map(|o| ctx.text(&o));
                match object {
                    Some("self") | Some("cls") => CallTarget::SelfMember(attr.to_string()),
                    _ => CallTarget::Member(attr.to_string()),
                }
            }
            _ => return,
        };
        ctx.record_call(target);
    }
}

fn collect_pattern_names<'a>(node: &Node, ctx: &ExtractionContext<'a>, out: &mut Vec<&'a str>) {
    for child in named_children(node) {
        match child.kind() {
            "identifier" => out.push(ctx.text(&child)),
            "pattern_list" | "tuple_pattern" | "list_pattern" | "list_splat_pattern" => {
                collect_pattern_names(&child, ctx, out)
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::analysis::models::{EntityKind, RelationKind};
    use crate::analysis::registry::Language;

    fn run_py(source: &str) -> super::Extraction {
        run(Language::Python, "proj/a.py", source)
    }

    #[test]
    fn test_function_and_class_minimum() {
        let out = run_py("def foo():\n    pass\n\nclass Bar:\n    pass\n");

        let file = find(&out, EntityKind::File, "a.py");
        let foo = find(&out, EntityKind::Function, "foo");
        let bar = find(&out, EntityKind::Class, "Bar");

        assert_eq!(file.id, "file:proj/a.py");
        assert!(related(&out, RelationKind::Contains, &file.id, &foo.id));
        assert!(related(&out, RelationKind::Contains, &file.id, &bar.id));
        assert_eq!(out.entities.len(), 3);
    }

    #[test]
    fn test_methods_parameters_and_calls() {
        let source = r#"
class Service(Base):
    def __init__(self, repo: Repo, *args, limit=10, **kwargs):
        self.repo = repo
        self._cache = {}

    async def run(self) -> int:
        self.load()
        return helper()

    def load(self):
        pass

def helper():
    return 1
"#;
        let out = run_py(source);

        let class = find(&out, EntityKind::Class, "Service");
        let init = find(&out, EntityKind::Function, "__init__");
        let run_fn = find(&out, EntityKind::Function, "run");
        let load = find(&out, EntityKind::Function, "load");
        let helper = find(&out, EntityKind::Function, "helper");

        assert_eq!(class.attribute("bases"), Some("Base"));
        assert_eq!(init.qualified_name, "Service.__init__");
        assert!(init.exported);
        assert!(related(&out, RelationKind::HasMethod, &class.id, &run_fn.id));
        assert_eq!(parameters(&out, init), vec!["repo", "args", "limit", "kwargs"]);

        let repo = find(&out, EntityKind::Variable, "repo");
        assert_eq!(repo.attribute("role"), Some("parameter"));
        assert_eq!(repo.attribute("type"), Some("Repo"));

        assert_eq!(run_fn.attribute("async"), Some("true"));
        assert_eq!(run_fn.attribute("return_type"), Some("int"));
        assert!(related(&out, RelationKind::Calls, &run_fn.id, &load.id));
        assert!(related(&out, RelationKind::Calls, &run_fn.id, &helper.id));

        let cache = out
            .entities
            .iter()
            .find(|e| e.qualified_name == "Service._cache")
            .unwrap();
        assert!(!cache.exported);
        assert!(related(&out, RelationKind::Contains, &class.id, &cache.id));
    }

    #[test]
    fn test_imports() {
        let source = "import os\nimport numpy as np\nfrom .models import User, Post as P\nfrom x import *\n";
        let out = run_py(source);

        assert_eq!(imports(&out), vec!["os", "numpy", ".models", "x"]);

        let file_id = "file:proj/a.py";
        let np = out
            .relationships
            .iter()
            .find(|r| r.kind == RelationKind::Imports && r.to == "module:proj/a.py#numpy")
            .unwrap();
        assert_eq!(np.attributes.get("alias").map(String::as_str), Some("np"));
        assert_eq!(np.from, file_id);

        let models = out
            .relationships
            .iter()
            .find(|r| r.to == "module:proj/a.py#.models")
            .unwrap();
        assert_eq!(
            models.attributes.get("names").map(String::as_str),
            Some("User,Post as P")
        );

        // Imported modules are not contained by the file.
        assert!(!related(&out, RelationKind::Contains, file_id, "module:proj/a.py#os"));
    }

    #[test]
    fn test_module_variables_and_visibility() {
        let source = "MAX = 3\n_private = 1\na, (b, c) = 1, (2, 3)\n\ndef f():\n    local = 2\n";
        let out = run_py(source);

        assert!(find(&out, EntityKind::Variable, "MAX").exported);
        assert!(!find(&out, EntityKind::Variable, "_private").exported);
        assert!(has(&out, EntityKind::Variable, "a"));
        assert!(has(&out, EntityKind::Variable, "c"));
        assert!(!has(&out, EntityKind::Variable, "local"));
    }

    #[test]
    fn test_protocol_is_interface_and_lambda_is_anonymous() {
        let source = "class Reader(Protocol):\n    def read(self): ...\n\nhandler = lambda x: x\n";
        let out = run_py(source);

        let reader = find(&out, EntityKind::Interface, "Reader");
        let read = find(&out, EntityKind::Function, "read");
        assert!(related(&out, RelationKind::HasMethod, &reader.id, &read.id));

        let lambda = find(&out, EntityKind::Function, "<anonymous@4:11>");
        assert_eq!(parameters(&out, lambda), vec!["x"]);
    }

    #[test]
    fn test_ids_are_stable() {
        let source = "class A:\n    def m(self):\n        pass\n";
        let first = run_py(source);
        let second = run_py(source);
        assert_eq!(names(&first), names(&second));
        assert_eq!(first.relationships, second.relationships);
    }
}
