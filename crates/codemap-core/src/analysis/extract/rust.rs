//! Rust extractor.
//!
//! Methods in `impl` blocks attach to their type by name, so an `impl` may
//! come before the type it extends, or refer to a type from another file.

use tree_sitter::{Node, Tree};

use super::context::{CallTarget, Declared, Extraction, ExtractionContext, ScopeKind};
use super::traits::Extractor;
use super::treesitter::{child_of_kind, has_child, last_segment, named_children, strip_generics};
use crate::analysis::error::ExtractError;
use crate::analysis::models::EntityKind;

pub struct RustExtractor;

impl Extractor for RustExtractor {
    fn extract(&self, tree: &Tree, source: &str, path: &str) -> Result<Extraction, ExtractError> {
        let mut ctx = ExtractionContext::new(path, source);
        self.visit(tree.root_node(), &mut ctx, 0)?;
        Ok(ctx.finish())
    }

    fn language_name(&self) -> &'static str {
        "Rust"
    }
}

fn is_pub(node: &Node) -> bool {
    child_of_kind(node, &["visibility_modifier"]).is_some()
}

/// Name of the type an `impl` block targets: `Repo<T>` and `crate::a::Repo` give `Repo`.
fn impl_target<'a>(ctx: &ExtractionContext<'a>, ty: &Node) -> &'a str {
    let text = ctx.text(ty).trim_start_matches('&');
    last_segment(strip_generics(text))
}

impl RustExtractor {
    fn visit(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        ctx.check_depth(&node, depth)?;

        match node.kind() {
            "function_item" | "function_signature_item" => return self.visit_function(node, ctx, depth),
            "struct_item" | "enum_item" | "union_item" => {
                self.extract_struct(&node, ctx);
                return Ok(());
            }
            "trait_item" => return self.visit_trait(node, ctx, depth),
            "impl_item" => return self.visit_impl(node, ctx, depth),
            "mod_item" => return self.visit_mod(node, ctx, depth),
            "use_declaration" => {
                if let Some(argument) = node.child_by_field_name("argument") {
                    self.extract_use(&node, &argument, "", ctx);
                }
                return Ok(());
            }
            "extern_crate_declaration" => {
                if let Some(name) = ctx.field_text(&node, "name") {
                    let alias = ctx.field_text(&node, "alias");
                    ctx.add_import(name, &node, alias, &[]);
                }
                return Ok(());
            }
            "const_item" | "static_item" => {
                if let Some(name) = ctx.field_text(&node, "name") {
                    if let Some(var) = ctx.declare_variable(name, &node, is_pub(&node)) {
                        if let Some(t) = ctx.field_text(&node, "type") {
                            ctx.set_attribute(&var.id, "type", t);
                        }
                        if node.kind() == "const_item" {
                            ctx.set_attribute(&var.id, "const", "true");
                        }
                    }
                }
            }
            "call_expression" => self.extract_call(&node, ctx),
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

    fn visit_body(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        match node.child_by_field_name("body") {
            Some(body) => self.visit_children(body, ctx, depth + 1),
            None => Ok(()),
        }
    }

    fn visit_function(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let Some(name) = ctx.field_text(&node, "name") else {
            return Ok(());
        };

        // Trait items share the trait's visibility.
        let exported = is_pub(&node)
            || node
                .parent()
                .and_then(|body| body.parent())
                .map(|owner| owner.kind() == "trait_item" && is_pub(&owner))
                .unwrap_or(false);
        let function = ctx.declare_function(name, &node, exported);

        if let Some(mods) = child_of_kind(&node, &["function_modifiers"]) {
            for flag in ["async", "const", "unsafe"] {
                if has_child(&mods, flag) {
                    ctx.set_attribute(&function.id, flag, "true");
                }
            }
        }
        if let Some(ret) = ctx.field_text(&node, "return_type") {
            ctx.set_attribute(&function.id, "return_type", ret);
        }
        if let Some(params) = node.child_by_field_name("parameters") {
            self.extract_parameters(&params, &function, ctx);
        }

        ctx.enter(ScopeKind::Function, &function);
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
            if param.kind() != "parameter" {
                continue;
            }
            let Some(pattern) = param.child_by_field_name("pattern") else { continue };
            let name = match pattern.kind() {
                "identifier" => ctx.text(&pattern).to_string(),
                // `mut x`
                "mut_pattern" => match child_of_kind(&pattern, &["identifier"]) {
                    Some(ident) => ctx.text(&ident).to_string(),
                    None => ctx.synthetic_name("destructured", &pattern),
                },
                _ => ctx.synthetic_name("destructured", &pattern),
            };
            position += 1;
            let type_name = ctx.field_text(&param, "type");
            ctx.declare_parameter(function, &name, position, &param, type_name);
        }
    }

    fn extract_struct(&self, node: &Node, ctx: &mut ExtractionContext) {
        let Some(name) = ctx.field_text(node, "name") else {
            return;
        };
        let declared = ctx.declare_type(EntityKind::Class, name, node, is_pub(node));
        let type_kind = match node.kind() {
            "enum_item" => "enum",
            "union_item" => "union",
            _ => "struct",
        };
        ctx.set_attribute(&declared.id, "type_kind", type_kind);

        ctx.enter(ScopeKind::Class, &declared);
        if let Some(body) = node.child_by_field_name("body") {
            for field in named_children(&body) {
                if field.kind() != "field_declaration" {
                    continue;
                }
                let Some(field_name) = ctx.field_text(&field, "name") else { continue };
                if let Some(var) = ctx.declare_variable(field_name, &field, is_pub(&field)) {
                    if let Some(t) = ctx.field_text(&field, "type") {
                        ctx.set_attribute(&var.id, "type", t);
                    }
                }
            }
        }
        ctx.leave();
    }

    fn visit_trait(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let Some(name) = ctx.field_text(&node, "name") else {
            return Ok(());
        };
        let declared = ctx.declare_type(EntityKind::Interface, name, &node, is_pub(&node));
        if let Some(bounds) = ctx.field_text(&node, "bounds") {
            ctx.set_attribute(&declared.id, "bases", bounds.trim_start_matches(':').trim());
        }

        ctx.enter(ScopeKind::Class, &declared);
        let result = self.visit_body(node, ctx, depth);
        ctx.leave();
        result
    }

    fn visit_impl(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let Some(ty) = node.child_by_field_name("type") else {
            return self.visit_children(node, ctx, depth);
        };
        let target = impl_target(ctx, &ty);

        ctx.enter_impl(target);
        let result = self.visit_body(node, ctx, depth);
        ctx.leave();
        result
    }

    fn visit_mod(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let Some(name) = ctx.field_text(&node, "name") else {
            return Ok(());
        };
        let module = ctx.declare_module(name, &node);
        if !is_pub(&node) {
            ctx.set_attribute(&module.id, "private", "true");
        }
        if node.child_by_field_name("body").is_none() {
            // `mod foo;` lives in another file.
            ctx.set_attribute(&module.id, "external", "true");
            return Ok(());
        }

        ctx.enter(ScopeKind::Module, &module);
        let result = self.visit_body(node, ctx, depth);
        ctx.leave();
        result
    }

    /// Flatten a `use` tree into one import per path.
    ///
    /// `prefix` is the path of an enclosing `a::b::{...}` list.
    fn extract_use(&self, decl: &Node, node: &Node, prefix: &str, ctx: &mut ExtractionContext) {
        let join = |path: &str| {
            if prefix.is_empty() {
                path.to_string()
            } else {
                format!("{}::{}", prefix, path)
            }
        };

        match node.kind() {
            "use_as_clause" => {
                let path = ctx.field_text(node, "path").unwrap_or_default();
                let alias = ctx.field_text(node, "alias");
                ctx.add_import(&join(path), decl, alias, &[]);
            }
            "scoped_use_list" => {
                let path = join(ctx.field_text(node, "path").unwrap_or_default());
                let Some(list) = node.child_by_field_name("list") else { return };
                let items = named_children(&list);

                let simple: Vec<String> = items
                    .iter()
                    .filter(|i| matches!(i.kind(), "identifier" | "self"))
                    .map(|i| ctx.text(i).to_string())
                    .collect();
                if !simple.is_empty() {
                    ctx.add_import(&path, decl, None, &simple);
                }
                for item in items
                    .iter()
                    .filter(|i| !matches!(i.kind(), "identifier" | "self"))
                {
                    self.extract_use(decl, item, &path, ctx);
                }
            }
            "use_list" => {
                for item in named_children(node) {
                    self.extract_use(decl, &item, prefix, ctx);
                }
            }
            "use_wildcard" => {
                let text = ctx.text(node).trim_end_matches('*').trim_end_matches("::");
                let path = if text.is_empty() { prefix.to_string() } else { join(text) };
                ctx.add_import(&path, decl, None, &["*".to_string()]);
            }
            _ => {
                let path = ctx.text(node);
                ctx.add_import(&join(path), decl, None, &[]);
            }
        }
    }

    fn extract_call(&self, node: &Node, ctx: &mut ExtractionContext) {
        let Some(mut function) = node.child_by_field_name("function") else { return };
        if function.kind() == "generic_function" {
            match function.child_by_field_name("function") {
                Some(inner) => function = inner,
                None => return,
            }
        }

        let target = match function.kind() {
            "identifier" => CallTarget::Bare(ctx.text(&function).to_string()),
            "field_expression" => {
                let Some(field) = ctx.field_text(&function, "field") else { return };
                match function.child_by_field_name("value").map(|v| v.kind()) {
                    Some("self") => CallTarget::SelfMember(field.to_string()),
                    _ => CallTarget::Member(field.to_string()),
                }
            }
            "scoped_identifier" => {
                let Some(name) = ctx.field_text(&function, "name") else { return };
                match ctx.field_text(&function, "path") {
                    Some("Self") => CallTarget::SelfMember(name.to_string()),
                    Some(path) => CallTarget::Associated {
                        owner: path.to_string(),
                        name: name.to_string(),
                    },
                    None => CallTarget::Bare(name.to_string()),
                }
            }
            _ => return,
        };
        ctx.record_call(target);
    }
}
