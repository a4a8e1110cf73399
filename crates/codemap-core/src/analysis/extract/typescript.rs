//! JavaScript, TypeScript and TSX extractor.
//!
//! The three grammars share node kinds for everything extracted here; the
//! TypeScript-only nodes (interfaces, namespaces, typed parameters) simply
//! never appear in JavaScript trees.

use tree_sitter::{Node, Tree};

use super::context::{unquote, CallTarget, Declared, Extraction, ExtractionContext, ScopeKind};
use super::traits::Extractor;
use super::treesitter::{child_of_kind, has_child, named_children};
use crate::analysis::error::ExtractError;
use crate::analysis::models::EntityKind;

const FUNCTION_EXPRESSIONS: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

pub struct TypeScriptExtractor {
    typed: bool,
}

impl TypeScriptExtractor {
    pub const fn javascript() -> Self {
        Self { typed: false }
    }

    pub const fn typescript() -> Self {
        Self { typed: true }
    }
}

impl Extractor for TypeScriptExtractor {
    fn extract(&self, tree: &Tree, source: &str, path: &str) -> Result<Extraction, ExtractError> {
        let mut ctx = ExtractionContext::new(path, source);
        self.visit(tree.root_node(), &mut ctx, 0)?;
        Ok(ctx.finish())
    }

    fn language_name(&self) -> &'static str {
        if self.typed {
            "TypeScript"
        } else {
            "JavaScript"
        }
    }
}

/// Whether a declaration sits under an `export` statement.
fn is_exported(node: &Node) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        match parent.kind() {
            "export_statement" => return true,
            "lexical_declaration" | "variable_declaration" | "variable_declarator" => {
                current = parent.parent()
            }
            _ => return false,
        }
    }
    false
}

/// Enclosing class declaration of a class member.
fn owning_class<'t>(member: &Node<'t>) -> Option<Node<'t>> {
    member.parent().and_then(|body| body.parent())
}

fn type_annotation<'a>(ctx: &ExtractionContext<'a>, node: &Node, field: &str) -> Option<&'a str> {
    ctx.field_text(node, field)
        .map(|t| t.trim_start_matches(':').trim())
}

impl TypeScriptExtractor {
    fn visit(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        ctx.check_depth(&node, depth)?;
        // Keyword tokens share kinds with expressions (`function`, `class`).
        if !node.is_named() {
            return Ok(());
        }

        match node.kind() {
            "function_declaration" | "generator_function_declaration" | "function_signature" => {
                return match ctx.field_text(&node, "name") {
                    Some(name) => self.visit_function(node, name, is_exported(&node), ctx, depth),
                    None => self.visit_children(node, ctx, depth),
                };
            }
            kind if FUNCTION_EXPRESSIONS.contains(&kind) => {
                return self.visit_function_expression(node, None, ctx, depth)
            }
            "class_declaration" | "abstract_class_declaration" | "class" => {
                return self.visit_class(node, None, ctx, depth)
            }
            "interface_declaration" => return self.visit_interface(node, ctx, depth),
            "enum_declaration" => {
                if let Some(name) = ctx.field_text(&node, "name") {
                    let declared = ctx.declare_type(EntityKind::Class, name, &node, is_exported(&node));
                    ctx.set_attribute(&declared.id, "type_kind", "enum");
                }
                return Ok(());
            }
            "internal_module" | "module" => return self.visit_namespace(node, ctx, depth),
            "method_definition" | "method_signature" | "abstract_method_signature" => {
                return self.visit_method(node, ctx, depth)
            }
            "public_field_definition" | "field_definition" => {
                return self.visit_field(node, ctx, depth)
            }
            "property_signature" => {
                if let Some(name) = ctx.field_text(&node, "name") {
                    ctx.declare_variable(unquote(name), &node, true);
                }
                return Ok(());
            }
            "lexical_declaration" | "variable_declaration" => {
                return self.visit_declaration(node, ctx, depth)
            }
            "import_statement" => {
                self.extract_import(&node, ctx);
                return Ok(());
            }
            "export_statement" => self.extract_reexport(&node, ctx),
            "call_expression" => self.extract_call(&node, ctx),
            "assignment_expression" => self.extract_this_assignment(&node, ctx),
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

    // =========================================================================
    // FUNCTIONS
    // =========================================================================

    fn visit_function(
        &self,
        node: Node,
        name: &str,
        exported: bool,
        ctx: &mut ExtractionContext,
        depth: usize,
    ) -> Result<(), ExtractError> {
        let function = ctx.declare_function(name, &node, exported);
        self.annotate_function(&node, &function, ctx);
        self.visit_body(node, &function, ctx, depth)
    }

    /// Arrow functions and function expressions, named by their binding when
    /// one exists and by position otherwise.
    fn visit_function_expression(
        &self,
        node: Node,
        binding: Option<&str>,
        ctx: &mut ExtractionContext,
        depth: usize,
    ) -> Result<(), ExtractError> {
        let name = match ctx.field_text(&node, "name").or(binding) {
            Some(name) => name.to_string(),
            None => ctx.synthetic_name("anonymous", &node),
        };
        let exported = is_exported(&node);
        self.visit_function(node, &name, exported, ctx, depth)
    }

    fn annotate_function(&self, node: &Node, function: &Declared, ctx: &mut ExtractionContext) {
        if has_child(node, "async") {
            ctx.set_attribute(&function.id, "async", "true");
        }
        if has_child(node, "*") {
            ctx.set_attribute(&function.id, "generator", "true");
        }
        if let Some(return_type) = type_annotation(ctx, node, "return_type") {
            ctx.set_attribute(&function.id, "return_type", return_type);
        }

        if let Some(params) = node.child_by_field_name("parameters") {
            self.extract_parameters(&params, function, ctx);
        } else if let Some(param) = node.child_by_field_name("parameter") {
            // `x => ...`
            let name = ctx.text(&param);
            ctx.declare_parameter(function, name, 1, &param, None);
        }
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

    fn extract_parameters(&self, params: &Node, function: &Declared, ctx: &mut ExtractionContext) {
        let mut position = 0;
        for child in named_children(params) {
            let (pattern, type_name) = match child.kind() {
                "required_parameter" | "optional_parameter" => (
                    child.child_by_field_name("pattern"),
                    type_annotation(ctx, &child, "type"),
                ),
                "identifier" | "assignment_pattern" | "rest_pattern" | "object_pattern"
                | "array_pattern" => (Some(child), None),
                _ => (None, None),
            };
            let Some(pattern) = pattern else { continue };

            let name = match pattern.kind() {
                "identifier" => ctx.text(&pattern).to_string(),
                "this" => continue,
                "assignment_pattern" => match pattern.child_by_field_name("left") {
                    Some(left) if left.kind() == "identifier" => ctx.text(&left).to_string(),
                    _ => ctx.synthetic_name("destructured", &pattern),
                },
                "rest_pattern" => match child_of_kind(&pattern, &["identifier"]) {
                    Some(ident) => ctx.text(&ident).to_string(),
                    None => ctx.synthetic_name("destructured", &pattern),
                },
                _ => ctx.synthetic_name("destructured", &pattern),
            };

            position += 1;
            ctx.declare_parameter(function, &name, position, &child, type_name);
        }
    }

    // =========================================================================
    // TYPES
    // =========================================================================

    fn visit_class(
        &self,
        node: Node,
        binding: Option<&str>,
        ctx: &mut ExtractionContext,
        depth: usize,
    ) -> Result<(), ExtractError> {
        let name = match ctx.field_text(&node, "name").or(binding) {
            Some(name) => name.to_string(),
            None => ctx.synthetic_name("anonymous", &node),
        };

        let class = ctx.declare_type(EntityKind::Class, &name, &node, is_exported(&node));
        if node.kind() == "abstract_class_declaration" {
            ctx.set_attribute(&class.id, "abstract", "true");
        }

        if let Some(heritage) = child_of_kind(&node, &["class_heritage"]) {
            let mut bases = Vec::new();
            let mut implements = Vec::new();
            for clause in named_children(&heritage) {
                match clause.kind() {
                    "extends_clause" => {
                        if let Some(value) = clause.child_by_field_name("value") {
                            bases.push(ctx.text(&value));
                        }
                    }
                    "implements_clause" => {
                        implements.extend(named_children(&clause).iter().map(|t| ctx.text(t)))
                    }
                    _ => bases.push(ctx.text(&clause)),
                }
            }
            if !bases.is_empty() {
                ctx.set_attribute(&class.id, "bases", bases.join(","));
            }
            if !implements.is_empty() {
                ctx.set_attribute(&class.id, "implements", implements.join(","));
            }
        }

        ctx.enter(ScopeKind::Class, &class);
        let result = match node.child_by_field_name("body") {
            Some(body) => self.visit_children(body, ctx, depth + 1),
            None => Ok(()),
        };
        ctx.leave();
        result
    }

    fn visit_interface(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let Some(name) = ctx.field_text(&node, "name") else {
            return Ok(());
        };
        let interface = ctx.declare_type(EntityKind::Interface, name, &node, is_exported(&node));

        if let Some(extends) = child_of_kind(&node, &["extends_type_clause"]) {
            let bases: Vec<&str> = named_children(&extends).iter().map(|t| ctx.text(t)).collect();
            ctx.set_attribute(&interface.id, "bases", bases.join(","));
        }

        ctx.enter(ScopeKind::Class, &interface);
        let result = match node.child_by_field_name("body") {
            Some(body) => self.visit_children(body, ctx, depth + 1),
            None => Ok(()),
        };
        ctx.leave();
        result
    }

    fn visit_namespace(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let Some(name) = ctx.field_text(&node, "name").map(unquote) else {
            return self.visit_children(node, ctx, depth);
        };
        let module = ctx.declare_module(name, &node);

        ctx.enter(ScopeKind::Module, &module);
        let result = match node.child_by_field_name("body") {
            Some(body) => self.visit_children(body, ctx, depth + 1),
            None => Ok(()),
        };
        ctx.leave();
        result
    }

    fn member_exported(&self, member: &Node, name: &str, ctx: &ExtractionContext) -> bool {
        if name.starts_with('#') {
            return false;
        }
        let private = child_of_kind(member, &["accessibility_modifier"])
            .map(|m| matches!(ctx.text(&m), "private" | "protected"))
            .unwrap_or(false);
        if private {
            return false;
        }
        owning_class(member).map(|class| is_exported(&class)).unwrap_or(false)
    }

    fn visit_method(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let Some(name) = ctx.field_text(&node, "name").map(unquote) else {
            return Ok(());
        };
        let exported = self.member_exported(&node, name, ctx);
        let method = ctx.declare_function(name, &node, exported);
        if has_child(&node, "static") {
            ctx.set_attribute(&method.id, "static", "true");
        }
        self.annotate_function(&node, &method, ctx);
        self.visit_body(node, &method, ctx, depth)
    }

    fn visit_field(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let name = ctx
            .field_text(&node, "name")
            .or_else(|| ctx.field_text(&node, "property"))
            .map(unquote);
        let Some(name) = name else { return Ok(()) };

        let value = node.child_by_field_name("value");
        match value {
            Some(value) if FUNCTION_EXPRESSIONS.contains(&value.kind()) => {
                let exported = self.member_exported(&node, name, ctx);
                self.visit_function(value, name, exported, ctx, depth + 1)
            }
            _ => {
                let exported = self.member_exported(&node, name, ctx);
                if let Some(field) = ctx.declare_variable(name, &node, exported) {
                    if let Some(t) = type_annotation(ctx, &node, "type") {
                        ctx.set_attribute(&field.id, "type", t);
                    }
                }
                match value {
                    Some(value) => self.visit(value, ctx, depth + 1),
                    None => Ok(()),
                }
            }
        }
    }

    // =========================================================================
    // VARIABLES
    // =========================================================================

    fn visit_declaration(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let exported = is_exported(&node);
        let constant = has_child(&node, "const");

        for declarator in named_children(&node) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name_node) = declarator.child_by_field_name("name") else { continue };
            let value = declarator.child_by_field_name("value");

            if name_node.kind() == "identifier" {
                let name = ctx.text(&name_node);
                match value {
                    Some(v) if FUNCTION_EXPRESSIONS.contains(&v.kind()) => {
                        self.visit_function_expression(v, Some(name), ctx, depth + 1)?;
                        continue;
                    }
                    Some(v) if v.kind() == "class" => {
                        self.visit_class(v, Some(name), ctx, depth + 1)?;
                        continue;
                    }
                    _ => {
                        if let Some(var) = ctx.declare_variable(name, &declarator, exported) {
                            if constant {
                                ctx.set_attribute(&var.id, "const", "true");
                            }
                            if let Some(t) = type_annotation(ctx, &declarator, "type") {
                                ctx.set_attribute(&var.id, "type", t);
                            }
                        }
                    }
                }
            } else {
                let mut names = Vec::new();
                collect_pattern_names(&name_node, ctx, &mut names);
                if names.is_empty() {
                    let synthetic = ctx.synthetic_name("destructured", &name_node);
                    ctx.declare_variable(&synthetic, &declarator, exported);
                }
                for name in names {
                    ctx.declare_variable(name, &declarator, exported);
                }
            }

            if let Some(v) = value {
                self.visit(v, ctx, depth + 1)?;
            }
        }
        Ok(())
    }

    fn extract_this_assignment(&self, node: &Node, ctx: &mut ExtractionContext) {
        let Some(left) = node.child_by_field_name("left") else { return };
        if left.kind() != "member_expression" {
            return;
        }
        let object = left.child_by_field_name("object");
        if object.map(|o| o.kind()) == Some("this") {
            if let Some(property) = ctx.field_text(&left, "property") {
                ctx.declare_field(property, node, !property.starts_with('#'));
            }
        }
    }

    // =========================================================================
    // IMPORTS & CALLS
    // =========================================================================

    fn extract_import(&self, node: &Node, ctx: &mut ExtractionContext) {
        let source = match node.child_by_field_name("source") {
            Some(s) => unquote(ctx.text(&s)),
            // import x = require("y")
            None => match child_of_kind(node, &["import_require_clause"])
                .and_then(|c| c.child_by_field_name("source"))
            {
                Some(s) => unquote(ctx.text(&s)),
                None => return,
            },
        };

        let mut names = Vec::new();
        let mut alias = None;
        if let Some(clause) = child_of_kind(node, &["import_clause"]) {
            for part in named_children(&clause) {
                match part.kind() {
                    "identifier" => names.push(format!("default as {}", ctx.text(&part))),
                    "namespace_import" => {
                        alias = child_of_kind(&part, &["identifier"]).map(|i| ctx.text(&i));
                    }
                    "named_imports" => {
                        for spec in named_children(&part) {
                            if spec.kind() != "import_specifier" {
                                continue;
                            }
                            let name = ctx.field_text(&spec, "name").unwrap_or_default();
                            match ctx.field_text(&spec, "alias") {
                                Some(a) => names.push(format!("{} as {}", name, a)),
                                None => names.push(name.to_string()),
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        ctx.add_import(source, node, alias, &names);
    }

    fn extract_reexport(&self, node: &Node, ctx: &mut ExtractionContext) {
        let Some(source) = node.child_by_field_name("source") else { return };
        let source = unquote(ctx.text(&source));

        let names: Vec<String> = match child_of_kind(node, &["export_clause"]) {
            Some(clause) => named_children(&clause)
                .iter()
                .filter(|s| s.kind() == "export_specifier")
                .filter_map(|s| ctx.field_text(s, "name"))
                .map(str::to_string)
                .collect(),
            None => vec!["*".to_string()],
        };
        ctx.add_import(source, node, None, &names);
    }

    fn extract_call(&self, node: &Node, ctx: &mut ExtractionContext) {
        let Some(function) = node.child_by_field_name("function") else { return };

        let target = match function.kind() {
            "identifier" => {
                let name = ctx.text(&function);
                if name == "require" {
                    self.extract_dynamic_import(node, ctx);
                    return;
                }
                CallTarget::Bare(name.to_string())
            }
            "import" => {
                self.extract_dynamic_import(node, ctx);
                return;
            }
            "member_expression" => {
                let Some(property) = ctx.field_text(&function, "property") else { return };
                let object = function.child_by_field_name("object").map(|o| o.kind());
                match object {
                    Some("this") => CallTarget::SelfMember(property.to_string()),
                    _ => CallTarget::Member(property.to_string()),
                }
            }
            _ => return,
        };
        ctx.record_call(target);
    }

    /// `require("x")` and `import("x")` with a literal argument.
    fn extract_dynamic_import(&self, node: &Node, ctx: &mut ExtractionContext) {
        let argument = node
            .child_by_field_name("arguments")
            .and_then(|args| named_children(&args).into_iter().next())
            .filter(|arg| arg.kind() == "string");
        if let Some(arg) = argument {
            let source = unquote(ctx.text(&arg));
            ctx.add_import(source, node, None, &[]);
        }
    }
}

fn collect_pattern_names<'a>(node: &Node, ctx: &ExtractionContext<'a>, out: &mut Vec<&'a str>) {
    for child in named_children(node) {
        match child.kind() {
            "identifier" | "shorthand_property_identifier_pattern" => out.push(ctx.text(&child)),
            "pair_pattern" => {
                if let Some(value) = child.child_by_field_name("value") {
                    if value.kind() == "identifier" {
                        out.push(ctx.text(&value));
                    } else {
                        collect_pattern_names(&value, ctx, out);
                    }
                }
            }
            "object_assignment_pattern" | "assignment_pattern" => {
                if let Some(left) = child.child_by_field_name("left") {
                    if matches!(left.kind(), "identifier" | "shorthand_property_identifier_pattern") {
                        out.push(ctx.text(&left));
                    } else {
                        collect_pattern_names(&left, ctx, out);
                    }
                }
            }
            "object_pattern" | "array_pattern" | "rest_pattern" => collect_pattern_names(&child, ctx, out),
            _ => {}
        }
    }
}
