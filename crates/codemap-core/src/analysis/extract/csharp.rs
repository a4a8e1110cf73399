//! C# extractor.

use tree_sitter::{Node, Tree};

use super::context::{CallTarget, Declared, Extraction, ExtractionContext, ScopeKind};
use super::traits::Extractor;
use super::treesitter::{child_of_kind, children_of_kind, named_children, strip_generics};
use crate::analysis::error::ExtractError;
use crate::analysis::models::EntityKind;

pub struct CSharpExtractor;

impl Extractor for CSharpExtractor {
    fn extract(&self, tree: &Tree, source: &str, path: &str) -> Result<Extraction, ExtractError> {
        let mut ctx = ExtractionContext::new(path, source);
        self.visit(tree.root_node(), &mut ctx, 0)?;
        Ok(ctx.finish())
    }

    fn language_name(&self) -> &'static str {
        "C#"
    }
}

fn modifiers<'a>(node: &Node, ctx: &ExtractionContext<'a>) -> Vec<&'a str> {
    children_of_kind(node, &["modifier"])
        .iter()
        .map(|m| ctx.text(m).trim())
        .collect()
}

fn is_exported(mods: &[&str]) -> bool {
    !mods.iter().any(|m| matches!(*m, "private" | "protected"))
}

impl CSharpExtractor {
    fn visit(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        ctx.check_depth(&node, depth)?;

        match node.kind() {
            "using_directive" => {
                self.extract_using(&node, ctx);
                return Ok(());
            }
            "namespace_declaration" => return self.visit_namespace(node, ctx, depth),
            "file_scoped_namespace_declaration" => {
                if let Some(name) = ctx.field_text(&node, "name") {
                    let module = ctx.declare_module(name, &node);
                    // Applies to the rest of the file.
                    ctx.enter(ScopeKind::Module, &module);
                }
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if Some(child) != node.child_by_field_name("name") {
                        self.visit(child, ctx, depth + 1)?;
                    }
                }
                return Ok(());
            }
            "class_declaration" | "struct_declaration" | "record_declaration"
            | "record_struct_declaration" | "enum_declaration" => {
                return self.visit_type(node, EntityKind::Class, ctx, depth)
            }
            "interface_declaration" => return self.visit_type(node, EntityKind::Interface, ctx, depth),
            "method_declaration" | "constructor_declaration" | "local_function_statement" => {
                return self.visit_method(node, ctx, depth)
            }
            "field_declaration" => {
                self.extract_field(&node, ctx);
                return Ok(());
            }
            "property_declaration" => {
                if let Some(name) = ctx.field_text(&node, "name") {
                    let mods = modifiers(&node, ctx);
                    if let Some(prop) = ctx.declare_variable(name, &node, is_exported(&mods)) {
                        ctx.set_attribute(&prop.id, "role", "property");
                        if let Some(t) = ctx.field_text(&node, "type") {
                            ctx.set_attribute(&prop.id, "type", t);
                        }
                    }
                }
            }
            "enum_member_declaration" => {
                if let Some(name) = ctx.field_text(&node, "name") {
                    ctx.declare_variable(name, &node, true);
                }
                return Ok(());
            }
            "invocation_expression" => self.extract_call(&node, ctx),
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
        ctx.enter(ScopeKind::Module, &module);
        let result = match node.child_by_field_name("body") {
            Some(body) => self.visit_children(body, ctx, depth + 1),
            None => Ok(()),
        };
        ctx.leave();
        result
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
        let mods = modifiers(&node, ctx);
        let declared = ctx.declare_type(kind, name, &node, is_exported(&mods));

        let type_kind = match node.kind() {
            "struct_declaration" => Some("struct"),
            "record_declaration" | "record_struct_declaration" => Some("record"),
            "enum_declaration" => Some("enum"),
            _ => None,
        };
        if let Some(type_kind) = type_kind {
            ctx.set_attribute(&declared.id, "type_kind", type_kind);
        }
        if let Some(bases) = child_of_kind(&node, &["base_list"]) {
            let bases: Vec<&str> = named_children(&bases)
                .iter()
                .filter(|b| b.kind() != "argument_list")
                .map(|b| ctx.text(b))
                .collect();
            ctx.set_attribute(&declared.id, "bases", bases.join(","));
        }

        ctx.enter(ScopeKind::Class, &declared);

        // Positional record parameters become properties.
        if let Some(params) = node
            .child_by_field_name("parameters")
            .or_else(|| child_of_kind(&node, &["parameter_list"]))
        {
            for param in named_children(&params) {
                if let Some(field) = ctx.field_text(&param, "name") {
                    ctx.declare_variable(field, &param, true);
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
        let mods = modifiers(&node, ctx);
        let exported = node.kind() != "local_function_statement" && is_exported(&mods);
        let method = ctx.declare_function(name, &node, exported);

        if node.kind() == "constructor_declaration" {
            ctx.set_attribute(&method.id, "constructor", "true");
        } else if let Some(returns) = ctx
            .field_text(&node, "returns")
            .or_else(|| ctx.field_text(&node, "type"))
        {
            ctx.set_attribute(&method.id, "return_type", returns);
        }
        for flag in ["static", "async", "abstract", "override"] {
            if mods.contains(&flag) {
                ctx.set_attribute(&method.id, flag, "true");
            }
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
            if param.kind() != "parameter" {
                continue;
            }
            let Some(name) = ctx.field_text(&param, "name") else { continue };
            position += 1;
            let type_name = ctx.field_text(&param, "type");
            ctx.declare_parameter(method, name, position, &param, type_name);
        }
    }

    fn extract_field(&self, node: &Node, ctx: &mut ExtractionContext) {
        let mods = modifiers(node, ctx);
        let exported = is_exported(&mods);
        let Some(declaration) = child_of_kind(node, &["variable_declaration"]) else {
            return;
        };
        let type_name = ctx.field_text(&declaration, "type");

        for declarator in children_of_kind(&declaration, &["variable_declarator"]) {
            let name = declarator
                .child_by_field_name("name")
                .or_else(|| child_of_kind(&declarator, &["identifier"]))
                .map(|n| ctx.text(&n));
            let Some(name) = name else { continue };
            if let Some(field) = ctx.declare_variable(name, &declarator, exported) {
                if let Some(t) = type_name {
                    ctx.set_attribute(&field.id, "type", t);
                }
                if mods.contains(&"static") || mods.contains(&"const") {
                    ctx.set_attribute(&field.id, "static", "true");
                }
            }
        }
    }

    /// `using System.Text;`, `using static System.Math;`, `using Json = Newtonsoft.Json;`.
    fn extract_using(&self, node: &Node, ctx: &mut ExtractionContext) {
        let text = ctx.text(node).trim().trim_end_matches(';');
        let mut rest = text.trim();
        for keyword in ["global ", "using ", "static ", "unsafe "] {
            rest = rest.strip_prefix(keyword).unwrap_or(rest).trim_start();
        }

        match rest.split_once('=') {
            Some((alias, source)) => ctx.add_import(source.trim(), node, Some(alias.trim()), &[]),
            None => ctx.add_import(rest, node, None, &[]),
        }
    }

    fn extract_call(&self, node: &Node, ctx: &mut ExtractionContext) {
        let Some(function) = node.child_by_field_name("function") else { return };

        let target = match function.kind() {
            "identifier" => CallTarget::Bare(ctx.text(&function).to_string()),
            "generic_name" => {
                CallTarget::Bare(strip_generics(ctx.text(&function)).to_string())
            }
            "member_access_expression" => {
                let Some(name) = ctx.field_text(&function, "name") else { return };
                let name = strip_generics(name).to_string();
                let receiver = ctx.field_text(&function, "expression");
                match receiver {
                    Some("this") => CallTarget::SelfMember(name),
                    _ => CallTarget::Member(name),
                }
            }
            _ => return,
        };
        ctx.record_call(target);
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::analysis::models::{EntityKind, RelationKind};
    use crate::analysis::registry::Language;

    const SOURCE: &str = r#"using System;
using System.Collections.Generic;
using Json = Newtonsoft.Json;

namespace Shop.Orders
{
    public interface IOrderService
    {
        Order Get(int id);
    }

    public class OrderService : BaseService, IOrderService
    {
        private readonly List<Order> _orders;
        public int Count { get; set; }

        public OrderService(List<Order> orders)
        {
            _orders = orders;
        }

        public Order Get(int id)
        {
            Log(id);
            return this.Find(id);
        }

        private Order Find(int id) => _orders[id];

        protected static void Log(int id) {}
    }

    public enum Status { Open, Closed }
}
"#;

    #[test]
    fn test_namespace_types_and_members() {
        let out = run(Language::CSharp, "Orders/OrderService.cs", SOURCE);

        let ns = find(&out, EntityKind::Module, "Shop.Orders");
        let iface = find(&out, EntityKind::Interface, "IOrderService");
        let class = find(&out, EntityKind::Class, "OrderService");
        assert!(related(&out, RelationKind::Contains, &ns.id, &class.id));
        assert!(related(&out, RelationKind::Contains, &ns.id, &iface.id));
        assert_eq!(class.qualified_name, "Shop.Orders.OrderService");
        assert_eq!(class.attribute("bases"), Some("BaseService,IOrderService"));

        let orders = find(&out, EntityKind::Variable, "_orders");
        assert!(!orders.exported);
        let count = find(&out, EntityKind::Variable, "Count");
        assert_eq!(count.attribute("role"), Some("property"));

        let status = find(&out, EntityKind::Class, "Status");
        assert_eq!(status.attribute("type_kind"), Some("enum"));
        assert!(has(&out, EntityKind::Variable, "Closed"));
    }

    #[test]
    fn test_methods_and_calls() {
        let out = run(Language::CSharp, "Orders/OrderService.cs", SOURCE);

        let get = out
            .entities
            .iter()
            .find(|e| e.qualified_name == "Shop.Orders.OrderService.Get")
            .unwrap();
        let find_fn = find(&out, EntityKind::Function, "Find");
        let log = find(&out, EntityKind::Function, "Log");
        let class = find(&out, EntityKind::Class, "OrderService");

        assert!(related(&out, RelationKind::HasMethod, &class.id, &get.id));
        assert_eq!(parameters(&out, get), vec!["id"]);
        assert!(related(&out, RelationKind::Calls, &get.id, &find_fn.id));
        assert!(related(&out, RelationKind::Calls, &get.id, &log.id));
        assert!(!find_fn.exported);
        assert!(!log.exported);
        assert_eq!(log.attribute("static"), Some("true"));

        let ctor = out
            .entities
            .iter()
            .find(|e| e.qualified_name == "Shop.Orders.OrderService.OrderService")
            .unwrap();
        assert_eq!(ctor.attribute("constructor"), Some("true"));
    }

    #[test]
    fn test_usings() {
        let out = run(Language::CSharp, "Orders/OrderService.cs", SOURCE);
        assert_eq!(
            imports(&out),
            vec!["System", "System.Collections.Generic", "Newtonsoft.Json"]
        );
        let json = out
            .relationships
            .iter()
            .find(|r| r.to == "module:Orders/OrderService.cs#Newtonsoft.Json")
            .unwrap();
        assert_eq!(json.attributes.get("alias").map(String::as_str), Some("Json"));
    }
}
