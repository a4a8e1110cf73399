//! Ruby extractor.

use tree_sitter::{Node, Tree};

use super::context::{unquote, CallTarget, Declared, Extraction, ExtractionContext, ScopeKind};
use super::traits::Extractor;
use super::treesitter::named_children;
use crate::analysis::error::ExtractError;
use crate::analysis::models::EntityKind;

const IMPORT_METHODS: &[&str] = &["require", "require_relative", "load"];
const ACCESSOR_METHODS: &[&str] = &["attr_accessor", "attr_reader", "attr_writer"];
const CLOSURE_METHODS: &[&str] = &["lambda", "proc"];

pub struct RubyExtractor;

impl Extractor for RubyExtractor {
    fn extract(&self, tree: &Tree, source: &str, path: &str) -> Result<Extraction, ExtractError> {
        let mut ctx = ExtractionContext::new(path, source);
        self.visit(tree.root_node(), &mut ctx, 0)?;
        Ok(ctx.finish())
    }

    fn language_name(&self) -> &'static str {
        "Ruby"
    }
}

impl RubyExtractor {
    fn visit(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        ctx.check_depth(&node, depth)?;
        if !node.is_named() {
            return Ok(());
        }

        match node.kind() {
            "class" => return self.visit_container(node, EntityKind::Class, ctx, depth),
            "module" => return self.visit_container(node, EntityKind::Module, ctx, depth),
            "method" | "singleton_method" => return self.visit_method(node, ctx, depth),
            "lambda" => {
                let body = node.child_by_field_name("body");
                return self.visit_closure(node, node.child_by_field_name("parameters"), body, ctx, depth);
            }
            "call" => {
                if let Some(block) = closure_block(&node, ctx) {
                    return self.visit_closure(node, None, Some(block), ctx, depth);
                }
                if self.extract_call(&node, ctx) {
                    return Ok(());
                }
            }
            "assignment" => self.extract_assignment(&node, ctx),
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

    /// Visit named children other than the given fields.
    fn visit_except(
        &self,
        node: Node,
        fields: &[&str],
        ctx: &mut ExtractionContext,
        depth: usize,
    ) -> Result<(), ExtractError> {
        let skipped: Vec<Node> = fields
            .iter()
            .filter_map(|f| node.child_by_field_name(f))
            .collect();
        for child in named_children(&node) {
            if !skipped.contains(&child) {
                self.visit(child, ctx, depth + 1)?;
            }
        }
        Ok(())
    }

    /// `class` and `module` bodies.
    fn visit_container(
        &self,
        node: Node,
        kind: EntityKind,
        ctx: &mut ExtractionContext,
        depth: usize,
    ) -> Result<(), ExtractError> {
        let Some(name_node) = node.child_by_field_name("name") else {
            return Ok(());
        };
        let name = ctx.text(&name_node).replace("::", ".");

        let (declared, scope) = if kind == EntityKind::Module {
            (ctx.declare_module(&name, &node), ScopeKind::Module)
        } else {
            let class = ctx.declare_type(EntityKind::Class, &name, &node, true);
            if let Some(superclass) = node.child_by_field_name("superclass") {
                let base = ctx.text(&superclass).trim_start_matches('<').trim();
                ctx.set_attribute(&class.id, "bases", base);
            }
            (class, ScopeKind::Class)
        };

        ctx.enter(scope, &declared);
        let result = self.visit_except(node, &["name", "superclass"], ctx, depth);
        ctx.leave();
        result
    }

    fn visit_method(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let Some(name) = ctx.field_text(&node, "name") else {
            return Ok(());
        };
        let method = ctx.declare_function(name, &node, true);
        if node.kind() == "singleton_method" {
            ctx.set_attribute(&method.id, "singleton", "true");
        }
        if let Some(params) = node.child_by_field_name("parameters") {
            self.extract_parameters(&params, &method, ctx);
        }

        ctx.enter(ScopeKind::Function, &method);
        let result = self.visit_except(node, &["name", "object", "parameters"], ctx, depth);
        ctx.leave();
        result
    }

    /// `->(x) { }`, `lambda { |x| }` and `proc do |x| end` become anonymous functions.
    fn visit_closure(
        &self,
        node: Node,
        params: Option<Node>,
        block: Option<Node>,
        ctx: &mut ExtractionContext,
        depth: usize,
    ) -> Result<(), ExtractError> {
        let name = ctx.synthetic_name("anonymous", &node);
        let function = ctx.declare_function(&name, &node, false);
        let params = params.or_else(|| block.and_then(|b| b.child_by_field_name("parameters")));
        if let Some(params) = params {
            self.extract_parameters(&params, &function, ctx);
        }

        ctx.enter(ScopeKind::Function, &function);
        let result = match block.and_then(|b| b.child_by_field_name("body")) {
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
                "identifier" => ctx.text(&param).to_string(),
                "optional_parameter" | "keyword_parameter" | "splat_parameter"
                | "hash_splat_parameter" | "block_parameter" => {
                    match ctx.field_text(&param, "name") {
                        Some(name) => name.to_string(),
                        None => continue,
                    }
                }
                "destructured_parameter" => ctx.synthetic_name("destructured", &param),
                _ => continue,
            };
            position += 1;
            ctx.declare_parameter(method, &name, position, &param, None);
        }
    }

    /// Returns true when the call was fully handled as a declaration.
    fn extract_call(&self, node: &Node, ctx: &mut ExtractionContext) -> bool {
        let Some(method) = ctx.field_text(node, "method") else {
            return false;
        };
        let receiver = node.child_by_field_name("receiver");

        if receiver.is_none() && IMPORT_METHODS.contains(&method) {
            let argument = node
                .child_by_field_name("arguments")
                .and_then(|args| named_children(&args).into_iter().next())
                .filter(|arg| arg.kind() == "string");
            if let Some(arg) = argument {
                let source = unquote(ctx.text(&arg));
                ctx.add_import(source, node, None, &[]);
                return true;
            }
        }

        if receiver.is_none() && ACCESSOR_METHODS.contains(&method) {
            if let Some(args) = node.child_by_field_name("arguments") {
                for arg in named_children(&args) {
                    if arg.kind() == "simple_symbol" {
                        let name = ctx.text(&arg).trim_start_matches(':');
                        ctx.declare_field(name, &arg, true);
                    }
                }
            }
            return true;
        }

        let target = match receiver {
            None => CallTarget::Bare(method.to_string()),
            Some(r) if r.kind() == "self" => CallTarget::SelfMember(method.to_string()),
            Some(_) => CallTarget::Member(method.to_string()),
        };
        ctx.record_call(target);
        false
    }

    fn extract_assignment(&self, node: &Node, ctx: &mut ExtractionContext) {
        let Some(left) = node.child_by_field_name("left") else { return };
        match left.kind() {
            "identifier" | "constant" => {
                let name = ctx.text(&left);
                if let Some(var) = ctx.declare_variable(name, node, true) {
                    if left.kind() == "constant" {
                        ctx.set_attribute(&var.id, "const", "true");
                    }
                }
            }
            "instance_variable" => {
                let name = ctx.text(&left).trim_start_matches('@');
                ctx.declare_field(name, node, false);
            }
            _ => {}
        }
    }
}

/// The block of a receiverless `lambda`/`proc` call, or of `Proc.new`.
fn closure_block<'a>(node: &Node<'a>, ctx: &ExtractionContext) -> Option<Node<'a>> {
    let block = node.child_by_field_name("block")?;
    let method = ctx.field_text(node, "method")?;
    let closure = match node.child_by_field_name("receiver") {
        None => CLOSURE_METHODS.contains(&method),
        Some(receiver) => method == "new" && ctx.text(&receiver) == "Proc",
    };
    closure.then_some(block)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::analysis::models::{EntityKind, RelationKind};
    use crate::analysis::registry::Language;

    const SOURCE: &str = r#"require 'json'
require_relative "lib/store"

VERSION = "1.0"

module Billing
  class Invoice < Base
    attr_reader :total
    TAX = 0.2

    def initialize(lines, currency = "EUR", *rest, strict:, **opts, &block)
      @lines = lines
    end

    def amount
      compute(@lines) + self.tax
    end

    def tax
      helper
    end

    def self.build(data)
      new(data)
    end

    private

    def compute(lines)
      lines.sum
    end
  end
end
"#;

    #[test]
    fn test_modules_classes_and_methods() {
        let out = run(Language::Ruby, "app/invoice.rb", SOURCE);

        let billing = find(&out, EntityKind::Module, "Billing");
        let invoice = find(&out, EntityKind::Class, "Invoice");
        assert_eq!(invoice.qualified_name, "Billing.Invoice");
        assert_eq!(invoice.attribute("bases"), Some("Base"));
        assert!(related(&out, RelationKind::Contains, &billing.id, &invoice.id));

        let init = find(&out, EntityKind::Function, "initialize");
        assert!(related(&out, RelationKind::HasMethod, &invoice.id, &init.id));
        assert_eq!(
            parameters(&out, init),
            vec!["lines", "currency", "rest", "strict", "opts", "block"]
        );

        let build = find(&out, EntityKind::Function, "build");
        assert_eq!(build.attribute("singleton"), Some("true"));
        assert!(out.entities.iter().all(|e| e.kind != EntityKind::Function || e.exported));
    }

    #[test]
    fn test_fields_constants_and_calls() {
        let out = run(Language::Ruby, "app/invoice.rb", SOURCE);

        assert!(out.entities.iter().any(|e| e.qualified_name == "Billing.Invoice.total"));
        assert!(out.entities.iter().any(|e| e.qualified_name == "Billing.Invoice.lines"));
        assert_eq!(find(&out, EntityKind::Variable, "TAX").attribute("const"), Some("true"));
        assert!(has(&out, EntityKind::Variable, "VERSION"));

        let amount = find(&out, EntityKind::Function, "amount");
        let compute = find(&out, EntityKind::Function, "compute");
        let tax = find(&out, EntityKind::Function, "tax");
        assert!(related(&out, RelationKind::Calls, &amount.id, &compute.id));
        assert!(related(&out, RelationKind::Calls, &amount.id, &tax.id));
    }

    #[test]
    fn test_lambdas_are_anonymous_functions() {
        let source = "handler = ->(x) { x + 1 }\nCB = lambda { |y| y }\nP = Proc.new do |a, b|\n  run(a)\nend\n\ndef run(v)\nend\n";
        let out = run(Language::Ruby, "a.rb", source);

        let arrow = find(&out, EntityKind::Function, "<anonymous@1:11>");
        assert_eq!(parameters(&out, arrow), vec!["x"]);
        assert!(!arrow.exported);

        let lambda = find(&out, EntityKind::Function, "<anonymous@2:6>");
        assert_eq!(parameters(&out, lambda), vec!["y"]);

        let block = find(&out, EntityKind::Function, "<anonymous@3:5>");
        assert_eq!(parameters(&out, block), vec!["a", "b"]);
        let run_fn = find(&out, EntityKind::Function, "run");
        assert!(related(&out, RelationKind::Calls, &block.id, &run_fn.id));

        assert!(has(&out, EntityKind::Variable, "handler"));
        assert!(has(&out, EntityKind::Variable, "CB"));
    }

    #[test]
    fn test_requires() {
        let out = run(Language::Ruby, "app/invoice.rb", SOURCE);
        assert_eq!(imports(&out), vec!["json", "lib/store"]);
    }
}
