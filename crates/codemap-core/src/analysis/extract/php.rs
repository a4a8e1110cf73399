//! PHP extractor.

use tree_sitter::{Node, Tree};

use super::context::{unquote, CallTarget, Declared, Extraction, ExtractionContext, ScopeKind};
use super::traits::Extractor;
use super::treesitter::{child_of_kind, children_of_kind, last_segment, named_children};
use crate::analysis::error::ExtractError;
use crate::analysis::models::EntityKind;

const INCLUDES: &[&str] = &[
    "include_expression",
    "include_once_expression",
    "require_expression",
    "require_once_expression",
];

pub struct PhpExtractor;

impl Extractor for PhpExtractor {
    fn extract(&self, tree: &Tree, source: &str, path: &str) -> Result<Extraction, ExtractError> {
        let mut ctx = ExtractionContext::new(path, source);
        self.visit(tree.root_node(), &mut ctx, 0)?;
        Ok(ctx.finish())
    }

    fn language_name(&self) -> &'static str {
        "PHP"
    }
}

fn visibility<'a>(node: &Node, ctx: &ExtractionContext<'a>) -> Option<&'a str> {
    child_of_kind(node, &["visibility_modifier"]).map(|v| ctx.text(&v).trim())
}

fn is_exported(visibility: Option<&str>) -> bool {
    !matches!(visibility, Some("private") | Some("protected"))
}

fn variable_name(text: &str) -> &str {
    text.trim().trim_start_matches('$')
}

impl PhpExtractor {
    fn visit(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        ctx.check_depth(&node, depth)?;

        match node.kind() {
            "namespace_definition" => return self.visit_namespace(node, ctx, depth),
            "namespace_use_declaration" => {
                self.extract_use(&node, ctx);
                return Ok(());
            }
            "class_declaration" | "trait_declaration" | "enum_declaration" => {
                return self.visit_type(node, EntityKind::Class, ctx, depth)
            }
            "interface_declaration" => return self.visit_type(node, EntityKind::Interface, ctx, depth),
            "function_definition" | "method_declaration" => return self.visit_function(node, ctx, depth),
            "anonymous_function" | "anonymous_function_creation_expression" | "arrow_function" => {
                return self.visit_anonymous(node, ctx, depth)
            }
            "property_declaration" => {
                self.extract_properties(&node, ctx);
                return Ok(());
            }
            "const_declaration" => {
                let exported = is_exported(visibility(&node, ctx));
                for element in children_of_kind(&node, &["const_element"]) {
                    if let Some(name) = child_of_kind(&element, &["name"]) {
                        let name = ctx.text(&name);
                        if let Some(var) = ctx.declare_variable(name, &element, exported) {
                            ctx.set_attribute(&var.id, "const", "true");
                        }
                    }
                }
                return Ok(());
            }
            kind if INCLUDES.contains(&kind) => {
                let target = named_children(&node)
                    .into_iter()
                    .find(|c| matches!(c.kind(), "string" | "encapsed_string"));
                if let Some(target) = target {
                    let source = unquote(ctx.text(&target));
                    ctx.add_import(source, &node, None, &[]);
                }
                return Ok(());
            }
            "assignment_expression" => self.extract_assignment(&node, ctx),
            "function_call_expression" | "member_call_expression" | "scoped_call_expression"
            | "nullsafe_member_call_expression" => self.extract_call(&node, ctx),
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

    fn visit_namespace(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let Some(name) = ctx.field_text(&node, "name") else {
            return self.visit_children(node, ctx, depth);
        };
        let module = ctx.declare_module(name, &node);

        match node.child_by_field_name("body") {
            Some(body) => {
                ctx.enter(ScopeKind::Module, &module);
                let result = self.visit_children(body, ctx, depth + 1);
                ctx.leave();
                result
            }
            None => {
                // `namespace App;` applies until the next namespace statement.
                ctx.leave_modules();
                ctx.enter(ScopeKind::Module, &module);
                Ok(())
            }
        }
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
        let declared = ctx.declare_type(kind, name, &node, true);

        match node.kind() {
            "trait_declaration" => ctx.set_attribute(&declared.id, "type_kind", "trait"),
            "enum_declaration" => ctx.set_attribute(&declared.id, "type_kind", "enum"),
            _ => {}
        }
        if child_of_kind(&node, &["abstract_modifier"]).is_some() {
            ctx.set_attribute(&declared.id, "abstract", "true");
        }
        if let Some(base) = child_of_kind(&node, &["base_clause"]) {
            let bases: Vec<&str> = named_children(&base).iter().map(|b| ctx.text(b)).collect();
            ctx.set_attribute(&declared.id, "bases", bases.join(","));
        }
        if let Some(interfaces) = child_of_kind(&node, &["class_interface_clause"]) {
            let names: Vec<&str> = named_children(&interfaces).iter().map(|b| ctx.text(b)).collect();
            ctx.set_attribute(&declared.id, "implements", names.join(","));
        }

        ctx.enter(ScopeKind::Class, &declared);
        let result = match node.child_by_field_name("body") {
            Some(body) => self.visit_children(body, ctx, depth + 1),
            None => Ok(()),
        };
        ctx.leave();
        result
    }

    fn visit_function(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let Some(name) = ctx.field_text(&node, "name") else {
            return Ok(());
        };
        let vis = visibility(&node, ctx);
        let function = ctx.declare_function(name, &node, is_exported(vis));
        if child_of_kind(&node, &["static_modifier"]).is_some() {
            ctx.set_attribute(&function.id, "static", "true");
        }
        self.visit_callable(node, &function, ctx, depth)
    }

    fn visit_anonymous(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let name = ctx.synthetic_name("anonymous", &node);
        let function = ctx.declare_function(&name, &node, false);
        self.visit_callable(node, &function, ctx, depth)
    }

    fn visit_callable(
        &self,
        node: Node,
        function: &Declared,
        ctx: &mut ExtractionContext,
        depth: usize,
    ) -> Result<(), ExtractError> {
        if let Some(ret) = ctx.field_text(&node, "return_type") {
            ctx.set_attribute(&function.id, "return_type", ret.trim_start_matches(':').trim());
        }
        if let Some(params) = node.child_by_field_name("parameters") {
            self.extract_parameters(&params, function, ctx);
        }

        ctx.enter(ScopeKind::Function, function);
        let result = match node.child_by_field_name("body") {
            Some(body) => self.visit(body, ctx, depth + 1),
            None => Ok(()),
        };
        ctx.leave();
        result
    }

    fn extract_parameters(&self, params: &Node, function: &Declared, ctx: &mut ExtractionContext) {
        let mut position = 0;
        for param in named_children(params) {
            if !matches!(
                param.kind(),
                "simple_parameter" | "variadic_parameter" | "property_promotion_parameter"
            ) {
                continue;
            }
            let Some(name) = ctx.field_text(&param, "name").map(variable_name) else {
                continue;
            };
            position += 1;
            let type_name = ctx.field_text(&param, "type");
            ctx.declare_parameter(function, name, position, &param, type_name);

            // Constructor promotion declares a property too.
            if param.kind() == "property_promotion_parameter" {
                let exported = is_exported(visibility(&param, ctx));
                ctx.declare_field(name, &param, exported);
            }
        }
    }

    fn extract_properties(&self, node: &Node, ctx: &mut ExtractionContext) {
        let exported = is_exported(visibility(node, ctx));
        let type_name = ctx.field_text(node, "type");
        for element in children_of_kind(node, &["property_element"]) {
            let Some(var) = child_of_kind(&element, &["variable_name"]) else { continue };
            let name = variable_name(ctx.text(&var));
            if let Some(field) = ctx.declare_field(name, &element, exported) {
                if let Some(t) = type_name {
                    ctx.set_attribute(&field.id, "type", t);
                }
            }
        }
    }

    fn extract_assignment(&self, node: &Node, ctx: &mut ExtractionContext) {
        let Some(left) = node.child_by_field_name("left") else { return };
        match left.kind() {
            "variable_name" => {
                let name = variable_name(ctx.text(&left));
                if name != "this" {
                    ctx.declare_variable(name, node, true);
                }
            }
            "member_access_expression" => {
                let object = left.child_by_field_name("object").map(|o| ctx.text(&o));
                if object == Some("$this") {
                    if let Some(name) = ctx.field_text(&left, "name") {
                        ctx.declare_field(name, node, true);
                    }
                }
            }
            _ => {}
        }
    }

    /// `use App\Models\User;`, `use App\{A, B as C};`, `use function App\helper;`.
    fn extract_use(&self, node: &Node, ctx: &mut ExtractionContext) {
        let text = ctx.text(node).trim().trim_end_matches(';').trim();
        let mut rest = text.strip_prefix("use").unwrap_or(text).trim_start();
        for keyword in ["function ", "const "] {
            rest = rest.strip_prefix(keyword).unwrap_or(rest).trim_start();
        }

        let (prefix, items) = match rest.split_once('{') {
            Some((prefix, group)) => (
                prefix.trim().trim_end_matches('\\'),
                group.trim_end_matches('}'),
            ),
            None => ("", rest),
        };

        for item in items.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            let (path, alias) = match item.split_once(" as ") {
                Some((path, alias)) => (path.trim(), Some(alias.trim())),
                None => (item, None),
            };
            let path = path.trim_start_matches('\\');
            let source = if prefix.is_empty() {
                path.to_string()
            } else {
                format!("{}\\{}", prefix.trim_start_matches('\\'), path)
            };
            ctx.add_import(&source, node, alias, &[]);
        }
    }

    fn extract_call(&self, node: &Node, ctx: &mut ExtractionContext) {
        let target = match node.kind() {
            "function_call_expression" => {
                let Some(function) = ctx.field_text(node, "function") else { return };
                CallTarget::Bare(last_segment(function).to_string())
            }
            "scoped_call_expression" => {
                let Some(name) = ctx.field_text(node, "name") else { return };
                match ctx.field_text(node, "scope") {
                    Some("self") | Some("static") => CallTarget::SelfMember(name.to_string()),
                    Some(scope) if scope != "parent" => CallTarget::Associated {
                        owner: last_segment(scope).to_string(),
                        name: name.to_string(),
                    },
                    _ => CallTarget::Member(name.to_string()),
                }
            }
            _ => {
                let Some(name) = ctx.field_text(node, "name") else { return };
                let object = node.child_by_field_name("object").map(|o| ctx.text(&o));
                match object {
                    Some("$this") => CallTarget::SelfMember(name.to_string()),
                    _ => CallTarget::Member(name.to_string()),
                }
            }
        };
        ctx.record_call(target);
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::analysis::models::{EntityKind, RelationKind};
    use crate::analysis::registry::Language;

    const SOURCE: &str = r#"<?php
namespace App\Http;

use App\Models\User;
use App\Services\{Mailer, Logger as Log};
require_once 'bootstrap.php';

const LIMIT = 10;

interface Handler
{
    public function handle(Request $request): Response;
}

class UserController extends Controller implements Handler
{
    private string $table = "users";

    public function __construct(private Mailer $mailer) {}

    public function handle(Request $request): Response
    {
        $user = $this->find($request->id);
        self::audit($user);
        return format_response($user);
    }

    protected function find(int $id, ...$rest)
    {
        $this->cache = [];
        return User::find($id);
    }

    private static function audit($user) {}
}

function format_response($data)
{
    return array_map(fn($x) => $x, $data);
}
"#;

    #[test]
    fn test_namespace_classes_and_members() {
        let out = run(Language::Php, "app/UserController.php", SOURCE);

        let ns = find(&out, EntityKind::Module, "App\\Http");
        let controller = find(&out, EntityKind::Class, "UserController");
        let handler = find(&out, EntityKind::Interface, "Handler");
        assert!(related(&out, RelationKind::Contains, &ns.id, &controller.id));
        assert_eq!(controller.qualified_name, "App\\Http.UserController");
        assert_eq!(controller.attribute("bases"), Some("Controller"));
        assert_eq!(controller.attribute("implements"), Some("Handler"));

        let handle_sig = out
            .entities
            .iter()
            .find(|e| e.qualified_name == "App\\Http.Handler.handle")
            .unwrap();
        assert!(related(&out, RelationKind::HasMethod, &handler.id, &handle_sig.id));

        let table = find(&out, EntityKind::Variable, "table");
        assert!(!table.exported);
        assert_eq!(table.attribute("type"), Some("string"));
        assert!(out
            .entities
            .iter()
            .any(|e| e.qualified_name == "App\\Http.UserController.mailer"));
        assert!(out
            .entities
            .iter()
            .any(|e| e.qualified_name == "App\\Http.UserController.cache"));
        assert!(has(&out, EntityKind::Variable, "LIMIT"));
    }

    #[test]
    fn test_methods_parameters_and_calls() {
        let out = run(Language::Php, "app/UserController.php", SOURCE);

        let handle = out
            .entities
            .iter()
            .find(|e| e.qualified_name == "App\\Http.UserController.handle")
            .unwrap();
        let find_fn = find(&out, EntityKind::Function, "find");
        let audit = find(&out, EntityKind::Function, "audit");
        let format = find(&out, EntityKind::Function, "format_response");

        assert_eq!(parameters(&out, handle), vec!["request"]);
        assert_eq!(handle.attribute("return_type"), Some("Response"));
        assert_eq!(parameters(&out, find_fn), vec!["id", "rest"]);
        assert!(!find_fn.exported);
        assert_eq!(audit.attribute("static"), Some("true"));

        assert!(related(&out, RelationKind::Calls, &handle.id, &find_fn.id));
        assert!(related(&out, RelationKind::Calls, &handle.id, &audit.id));
        assert!(related(&out, RelationKind::Calls, &handle.id, &format.id));

        assert!(out
            .entities
            .iter()
            .any(|e| e.kind == EntityKind::Function && e.name.starts_with("<anonymous@")));
    }

    #[test]
    fn test_uses_and_requires() {
        let out = run(Language::Php, "app/UserController.php", SOURCE);
        assert_eq!(
            imports(&out),
            vec![
                "App\\Models\\User",
                "App\\Services\\Mailer",
                "App\\Services\\Logger",
                "bootstrap.php",
            ]
        );
        let logger = out
            .relationships
            .iter()
            .find(|r| r.to == "module:app/UserController.php#App\\Services\\Logger")
            .unwrap();
        assert_eq!(logger.attributes.get("alias").map(String::as_str), Some("Log"));
    }
}
