//! Go extractor.

use tree_sitter::{Node, Tree};

use super::context::{unquote, CallTarget, Declared, Extraction, ExtractionContext, ScopeKind};
use super::traits::Extractor;
use super::treesitter::{child_of_kind, named_children, strip_generics};
use crate::analysis::error::ExtractError;
use crate::analysis::models::EntityKind;

pub struct GoExtractor;

impl Extractor for GoExtractor {
    fn extract(&self, tree: &Tree, source: &str, path: &str) -> Result<Extraction, ExtractError> {
        let mut ctx = ExtractionContext::new(path, source);
        self.visit(tree.root_node(), &mut ctx, 0, None)?;
        Ok(ctx.finish())
    }

    fn language_name(&self) -> &'static str {
        "Go"
    }
}

/// Go exports identifiers starting with an upper-case letter.
fn is_exported(name: &str) -> bool {
    name.chars().next().map(char::is_uppercase).unwrap_or(false)
}

/// Type name of a receiver: `*Server` and `Server[T]` both give `Server`.
fn receiver_type<'a>(ctx: &ExtractionContext<'a>, receiver: &Node) -> Option<(Option<&'a str>, &'a str)> {
    let param = child_of_kind(receiver, &["parameter_declaration"])?;
    let name = param.child_by_field_name("name").map(|n| ctx.text(&n));
    let type_text = ctx.field_text(&param, "type")?;
    let type_name = strip_generics(type_text.trim_start_matches('*'));
    let type_name = type_name.split('[').next().unwrap_or(type_name).trim();
    Some((name, type_name))
}

impl GoExtractor {
    /// `receiver` is the receiver variable of the enclosing method, if any.
    fn visit(
        &self,
        node: Node,
        ctx: &mut ExtractionContext,
        depth: usize,
        receiver: Option<&str>,
    ) -> Result<(), ExtractError> {
        ctx.check_depth(&node, depth)?;

        match node.kind() {
            "package_clause" => {
                if let Some(name) = child_of_kind(&node, &["package_identifier"]) {
                    let name = ctx.text(&name);
                    let module = ctx.declare_module(name, &node);
                    // The package scope covers the rest of the file.
                    ctx.enter(ScopeKind::Module, &module);
                }
                return Ok(());
            }
            "import_declaration" => {
                self.extract_imports(&node, ctx);
                return Ok(());
            }
            "function_declaration" => return self.visit_function(node, ctx, depth),
            "method_declaration" => return self.visit_method(node, ctx, depth),
            "func_literal" => return self.visit_func_literal(node, ctx, depth, receiver),
            "type_spec" | "type_alias" => return self.visit_type_spec(node, ctx, depth),
            "var_spec" | "const_spec" => self.extract_var_spec(&node, ctx),
            "call_expression" => self.extract_call(&node, ctx, receiver),
            _ => {}
        }

        self.visit_children(node, ctx, depth, receiver)
    }

    fn visit_children(
        &self,
        node: Node,
        ctx: &mut ExtractionContext,
        depth: usize,
        receiver: Option<&str>,
    ) -> Result<(), ExtractError> {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child, ctx, depth + 1, receiver)?;
        }
        Ok(())
    }

    fn visit_function(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let Some(name) = ctx.field_text(&node, "name") else {
            return Ok(());
        };
        let function = ctx.declare_function(name, &node, is_exported(name));
        self.annotate(&node, &function, ctx);
        self.visit_body(node, &function, ctx, depth, None)
    }

    fn visit_method(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let Some(name) = ctx.field_text(&node, "name") else {
            return Ok(());
        };
        let receiver = node
            .child_by_field_name("receiver")
            .and_then(|r| receiver_type(ctx, &r));

        let (receiver_name, method) = match receiver {
            Some((receiver_name, owner)) => (
                receiver_name,
                ctx.declare_method_of(owner, name, &node, is_exported(name)),
            ),
            None => (None, ctx.declare_function(name, &node, is_exported(name))),
        };
        self.annotate(&node, &method, ctx);
        self.visit_body(node, &method, ctx, depth, receiver_name)
    }

    fn visit_func_literal(
        &self,
        node: Node,
        ctx: &mut ExtractionContext,
        depth: usize,
        receiver: Option<&str>,
    ) -> Result<(), ExtractError> {
        let name = ctx.synthetic_name("anonymous", &node);
        let function = ctx.declare_function(&name, &node, false);
        self.annotate(&node, &function, ctx);
        self.visit_body(node, &function, ctx, depth, receiver)
    }

    fn visit_body(
        &self,
        node: Node,
        function: &Declared,
        ctx: &mut ExtractionContext,
        depth: usize,
        receiver: Option<&str>,
    ) -> Result<(), ExtractError> {
        ctx.enter(ScopeKind::Function, function);
        let result = match node.child_by_field_name("body") {
            Some(body) => self.visit(body, ctx, depth + 1, receiver),
            None => Ok(()),
        };
        ctx.leave();
        result
    }

    fn annotate(&self, node: &Node, function: &Declared, ctx: &mut ExtractionContext) {
        if let Some(result) = ctx.field_text(node, "result") {
            ctx.set_attribute(&function.id, "return_type", result);
        }
        if let Some(params) = node.child_by_field_name("parameters") {
            self.extract_parameters(&params, function, ctx);
        }
    }

    fn extract_parameters(&self, params: &Node, function: &Declared, ctx: &mut ExtractionContext) {
        let mut position = 0;
        for decl in named_children(params) {
            if !matches!(
                decl.kind(),
                "parameter_declaration" | "variadic_parameter_declaration"
            ) {
                continue;
            }
            let type_name = ctx.field_text(&decl, "type");
            let mut cursor = decl.walk();
            let names: Vec<Node> = decl.children_by_field_name("name", &mut cursor).collect();
            for name in names {
                position += 1;
                let name = ctx.text(&name);
                ctx.declare_parameter(function, name, position, &decl, type_name);
            }
        }
    }

    fn visit_type_spec(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let Some(name) = ctx.field_text(&node, "name") else {
            return Ok(());
        };
        let Some(type_node) = node.child_by_field_name("type") else {
            return Ok(());
        };

        if node.kind() == "type_alias" {
            let underlying = ctx.text(&type_node);
            let alias = ctx.declare_type(EntityKind::Class, name, &node, is_exported(name));
            ctx.set_attribute(&alias.id, "type_kind", "alias");
            ctx.set_attribute(&alias.id, "underlying", underlying);
            return Ok(());
        }

        let kind = match type_node.kind() {
            "interface_type" => EntityKind::Interface,
            _ => EntityKind::Class,
        };
        let declared = ctx.declare_type(kind, name, &node, is_exported(name));
        if !matches!(type_node.kind(), "struct_type" | "interface_type") {
            let underlying = ctx.text(&type_node);
            ctx.set_attribute(&declared.id, "type_kind", "defined");
            ctx.set_attribute(&declared.id, "underlying", underlying);
            return Ok(());
        }

        ctx.enter(ScopeKind::Class, &declared);
        let result = self.visit_type_body(type_node, ctx, depth + 1);
        ctx.leave();
        result
    }

    /// Struct fields and interface methods.
    fn visit_type_body(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        ctx.check_depth(&node, depth)?;

        for child in named_children(&node) {
            match child.kind() {
                "field_declaration_list" => self.visit_type_body(child, ctx, depth + 1)?,
                "field_declaration" => {
                    let mut cursor = child.walk();
                    let names: Vec<Node> = child.children_by_field_name("name", &mut cursor).collect();
                    let type_name = ctx.field_text(&child, "type");
                    for name in names {
                        let name = ctx.text(&name);
                        if let Some(field) = ctx.declare_variable(name, &child, is_exported(name)) {
                            if let Some(t) = type_name {
                                ctx.set_attribute(&field.id, "type", t);
                            }
                        }
                    }
                }
                "method_elem" | "method_spec" => {
                    if let Some(name) = ctx.field_text(&child, "name") {
                        let method = ctx.declare_function(name, &child, is_exported(name));
                        self.annotate(&child, &method, ctx);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn extract_var_spec(&self, node: &Node, ctx: &mut ExtractionContext) {
        let constant = node.kind() == "const_spec";
        let type_name = ctx.field_text(node, "type");
        let mut cursor = node.walk();
        let names: Vec<Node> = node.children_by_field_name("name", &mut cursor).collect();
        for name in names {
            let name = ctx.text(&name);
            if name == "_" {
                continue;
            }
            if let Some(var) = ctx.declare_variable(name, node, is_exported(name)) {
                if constant {
                    ctx.set_attribute(&var.id, "const", "true");
                }
                if let Some(t) = type_name {
                    ctx.set_attribute(&var.id, "type", t);
                }
            }
        }
    }

    fn extract_imports(&self, node: &Node, ctx: &mut ExtractionContext) {
        let mut specs = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "import_spec" => specs.push(child),
                "import_spec_list" => specs.extend(
                    named_children(&child)
                        .into_iter()
                        .filter(|c| c.kind() == "import_spec"),
                ),
                _ => {}
            }
        }

        for spec in specs {
            let Some(path) = ctx.field_text(&spec, "path") else { continue };
            let alias = ctx.field_text(&spec, "name");
            ctx.add_import(unquote(path), &spec, alias, &[]);
        }
    }

    fn extract_call(&self, node: &Node, ctx: &mut ExtractionContext, receiver: Option<&str>) {
        let Some(function) = node.child_by_field_name("function") else { return };

        let target = match function.kind() {
            "identifier" => CallTarget::Bare(ctx.text(&function).to_string()),
            "selector_expression" => {
                let Some(field) = ctx.field_text(&function, "field") else { return };
                let operand = ctx.field_text(&function, "operand");
                match (operand, receiver) {
                    (Some(op), Some(recv)) if op == recv => CallTarget::SelfMember(field.to_string()),
                    _ => CallTarget::Member(field.to_string()),
                }
            }
            _ => return,
        };
        ctx.record_call(target);
    }
}
