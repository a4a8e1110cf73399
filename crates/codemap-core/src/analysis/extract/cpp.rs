//! C and C++ extractor.
//!
//! Both languages are parsed with the C++ grammar, which accepts nearly all C.

use tree_sitter::{Node, Tree};

use super::context::{unquote, CallTarget, Declared, Extraction, ExtractionContext, ScopeKind};
use super::traits::Extractor;
use super::treesitter::{child_of_kind, children_of_kind, has_child, named_children};
use crate::analysis::error::ExtractError;
use crate::analysis::models::EntityKind;

const NAME_KINDS: &[&str] = &[
    "identifier",
    "field_identifier",
    "qualified_identifier",
    "destructor_name",
    "operator_name",
    "type_identifier",
];

pub struct CppExtractor;

impl Extractor for CppExtractor {
    fn extract(&self, tree: &Tree, source: &str, path: &str) -> Result<Extraction, ExtractError> {
        let mut ctx = ExtractionContext::new(path, source);
        self.visit(tree.root_node(), &mut ctx, 0)?;
        Ok(ctx.finish())
    }

    fn language_name(&self) -> &'static str {
        "C/C++"
    }
}

/// Follow nested declarators (pointers, references, arrays, initialisers) down to the name.
fn declarator_name<'t>(node: Node<'t>) -> Option<Node<'t>> {
    let mut current = node;
    loop {
        if NAME_KINDS.contains(&current.kind()) {
            return Some(current);
        }
        current = match current.child_by_field_name("declarator") {
            Some(inner) => inner,
            None => named_children(&current)
                .into_iter()
                .rev()
                .find(|c| c.kind().ends_with("declarator") || NAME_KINDS.contains(&c.kind()))?,
        };
    }
}

/// The function declarator under a declaration, if it declares a function.
fn function_declarator<'t>(node: Node<'t>) -> Option<Node<'t>> {
    let mut current = node.child_by_field_name("declarator")?;
    loop {
        match current.kind() {
            "function_declarator" => return Some(current),
            "pointer_declarator" | "reference_declarator" | "parenthesized_declarator" => {
                current = match current.child_by_field_name("declarator") {
                    Some(inner) => inner,
                    None => named_children(&current).into_iter().last()?,
                };
            }
            _ => return None,
        }
    }
}

fn is_static(node: &Node, ctx: &ExtractionContext) -> bool {
    children_of_kind(node, &["storage_class_specifier"])
        .iter()
        .any(|s| ctx.text(s) == "static")
}

impl CppExtractor {
    fn visit(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        ctx.check_depth(&node, depth)?;
        if !node.is_named() {
            return Ok(());
        }

        match node.kind() {
            "preproc_include" => {
                if let Some(path) = ctx.field_text(&node, "path") {
                    ctx.add_import(unquote(path), &node, None, &[]);
                }
                return Ok(());
            }
            "namespace_definition" => return self.visit_namespace(node, ctx, depth),
            "class_specifier" | "struct_specifier" | "union_specifier" => {
                if node.child_by_field_name("body").is_some() {
                    return self.visit_class(node, ctx, depth);
                }
            }
            "enum_specifier" => {
                if node.child_by_field_name("body").is_some() {
                    self.extract_enum(&node, ctx);
                    return Ok(());
                }
            }
            "function_definition" => return self.visit_function(node, true, ctx, depth),
            "declaration" => {
                self.extract_declaration(&node, true, ctx);
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

    fn visit_namespace(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let Some(body) = node.child_by_field_name("body") else {
            return Ok(());
        };
        // Anonymous namespaces add no scope.
        let Some(name) = ctx.field_text(&node, "name") else {
            return self.visit_children(body, ctx, depth);
        };
        let module = ctx.declare_module(&name.replace("::", "."), &node);

        ctx.enter(ScopeKind::Module, &module);
        let result = self.visit_children(body, ctx, depth + 1);
        ctx.leave();
        result
    }

    fn visit_class(&self, node: Node, ctx: &mut ExtractionContext, depth: usize) -> Result<(), ExtractError> {
        let Some(name) = ctx.field_text(&node, "name") else {
            return Ok(());
        };
        let class = ctx.declare_type(EntityKind::Class, name, &node, true);
        match node.kind() {
            "struct_specifier" => ctx.set_attribute(&class.id, "type_kind", "struct"),
            "union_specifier" => ctx.set_attribute(&class.id, "type_kind", "union"),
            _ => {}
        }
        if let Some(clause) = child_of_kind(&node, &["base_class_clause"]) {
            let bases: Vec<&str> = named_children(&clause)
                .iter()
                .filter(|b| b.kind() != "access_specifier")
                .map(|b| ctx.text(b))
                .collect();
            ctx.set_attribute(&class.id, "bases", bases.join(","));
        }

        let Some(body) = node.child_by_field_name("body") else {
            return Ok(());
        };

        // Members of a `class` are private until an access label says otherwise.
        let mut public = node.kind() != "class_specifier";

        ctx.enter(ScopeKind::Class, &class);
        let mut result = Ok(());
        for member in named_children(&body) {
            result = match member.kind() {
                "access_specifier" => {
                    public = ctx.text(&member).trim_end_matches(':').trim() == "public";
                    Ok(())
                }
                "field_declaration" | "declaration" => {
                    self.extract_member(&member, public, ctx);
                    self.visit_children(member, ctx, depth + 1)
                }
                "function_definition" => self.visit_function(member, public, ctx, depth + 1),
                _ => self.visit(member, ctx, depth + 1),
            };
            if result.is_err() {
                break;
            }
        }
        ctx.leave();
        result
    }

    fn extract_enum(&self, node: &Node, ctx: &mut ExtractionContext) {
        let Some(name) = ctx.field_text(node, "name") else { return };
        let declared = ctx.declare_type(EntityKind::Class, name, node, true);
        ctx.set_attribute(&declared.id, "type_kind", "enum");

        let Some(body) = node.child_by_field_name("body") else { return };
        ctx.enter(ScopeKind::Class, &declared);
        for enumerator in children_of_kind(&body, &["enumerator"]) {
            if let Some(value) = ctx.field_text(&enumerator, "name") {
                ctx.declare_variable(value, &enumerator, true);
            }
        }
        ctx.leave();
    }

    /// A member declaration inside a class body: method prototypes or fields.
    fn extract_member(&self, node: &Node, public: bool, ctx: &mut ExtractionContext) {
        if let Some(declarator) = function_declarator(*node) {
            let Some(name_node) = declarator
                .child_by_field_name("declarator")
                .and_then(declarator_name)
            else {
                return;
            };
            let name = ctx.text(&name_node);
            let method = ctx.declare_function(name, node, public);
            if let Some(params) = declarator.child_by_field_name("parameters") {
                self.extract_parameters(&params, &method, ctx);
            }
            self.annotate_function(node, &method, ctx);
            return;
        }

        let type_name = ctx.field_text(node, "type");
        let mut cursor = node.walk();
        let declarators: Vec<Node> = node.children_by_field_name("declarator", &mut cursor).collect();
        for declarator in declarators {
            let Some(name_node) = declarator_name(declarator) else { continue };
            let name = ctx.text(&name_node);
            if let Some(field) = ctx.declare_field(name, &declarator, public) {
                if let Some(t) = type_name {
                    ctx.set_attribute(&field.id, "type", t);
                }
                if is_static(node, ctx) {
                    ctx.set_attribute(&field.id, "static", "true");
                }
            }
        }
    }

    /// Top-level variable declarations. Function prototypes are skipped.
    fn extract_declaration(&self, node: &Node, exported: bool, ctx: &mut ExtractionContext) {
        if !ctx.at_module_level() || function_declarator(*node).is_some() {
            return;
        }
        let exported = exported && !is_static(node, ctx);
        let is_const = children_of_kind(node, &["type_qualifier"])
            .iter()
            .any(|q| ctx.text(q) == "const");
        let type_name = ctx.field_text(node, "type");

        let mut cursor = node.walk();
        let declarators: Vec<Node> = node.children_by_field_name("declarator", &mut cursor).collect();
        for declarator in declarators {
            let Some(name_node) = declarator_name(declarator) else { continue };
            let name = ctx.text(&name_node);
            if let Some(var) = ctx.declare_variable(name, &declarator, exported) {
                if let Some(t) = type_name {
                    ctx.set_attribute(&var.id, "type", t);
                }
                if is_const {
                    ctx.set_attribute(&var.id, "const", "true");
                }
            }
        }
    }

    fn visit_function(
        &self,
        node: Node,
        public: bool,
        ctx: &mut ExtractionContext,
        depth: usize,
    ) -> Result<(), ExtractError> {
        let Some(declarator) = function_declarator(node) else {
            return self.visit_children(node, ctx, depth);
        };
        let Some(name_node) = declarator
            .child_by_field_name("declarator")
            .and_then(declarator_name)
        else {
            return Ok(());
        };

        let exported = public && !is_static(&node, ctx);
        let function = if name_node.kind() == "qualified_identifier" {
            // `void Type::method() { ... }` defined outside the class body.
            let text = ctx.text(&name_node);
            let (owner, name) = match text.rsplit_once("::") {
                Some((owner, name)) => (owner.replace("::", "."), name),
                None => (String::new(), text),
            };
            if owner.is_empty() {
                ctx.declare_function(name, &node, exported)
            } else {
                ctx.declare_method_of(&owner, name, &node, exported)
            }
        } else {
            let name = ctx.text(&name_node);
            ctx.declare_function(name, &node, exported)
        };

        if let Some(params) = declarator.child_by_field_name("parameters") {
            self.extract_parameters(&params, &function, ctx);
        }
        self.annotate_function(&node, &function, ctx);

        ctx.enter(ScopeKind::Function, &function);
        let result = match node.child_by_field_name("body") {
            Some(body) => self.visit(body, ctx, depth + 1),
            None => Ok(()),
        };
        ctx.leave();
        result
    }

    fn annotate_function(&self, node: &Node, function: &Declared, ctx: &mut ExtractionContext) {
        if let Some(ret) = ctx.field_text(node, "type") {
            ctx.set_attribute(&function.id, "return_type", ret);
        }
        if is_static(node, ctx) {
            ctx.set_attribute(&function.id, "static", "true");
        }
        if has_child(node, "virtual") {
            ctx.set_attribute(&function.id, "virtual", "true");
        }
    }

    fn extract_parameters(&self, params: &Node, function: &Declared, ctx: &mut ExtractionContext) {
        let mut position = 0;
        for param in named_children(params) {
            if !matches!(
                param.kind(),
                "parameter_declaration" | "optional_parameter_declaration"
            ) {
                continue;
            }
            // Unnamed parameters (`int`) declare nothing.
            let Some(name_node) = param.child_by_field_name("declarator").and_then(declarator_name) else {
                continue;
            };
            position += 1;
            let name = ctx.text(&name_node);
            let type_name = ctx.field_text(&param, "type");
            ctx.declare_parameter(function, name, position, &param, type_name);
        }
    }

    fn extract_call(&self, node: &Node, ctx: &mut ExtractionContext) {
        let Some(function) = node.child_by_field_name("function") else { return };
        let target = match function.kind() {
            "identifier" => CallTarget::Bare(ctx.text(&function).to_string()),
            "template_function" => match ctx.field_text(&function, "name") {
                Some(name) => CallTarget::Bare(name.to_string()),
                None => return,
            },
            "field_expression" => {
                let Some(field) = ctx.field_text(&function, "field") else { return };
                match function.child_by_field_name("argument").map(|a| a.kind()) {
                    Some("this") => CallTarget::SelfMember(field.to_string()),
                    _ => CallTarget::Member(field.to_string()),
                }
            }
            "qualified_identifier" => {
                let text = ctx.text(&function);
                match text.rsplit_once("::") {
                    Some((owner, name)) if !owner.is_empty() => CallTarget::Associated {
                        owner: owner.to_string(),
                        name: name.to_string(),
                    },
                    Some((_, name)) => CallTarget::Bare(name.to_string()),
                    None => CallTarget::Bare(text.to_string()),
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

    const SOURCE: &str = r#"#include <vector>
#include "store.h"

static int counter = 0;
const double RATE = 0.5;

namespace billing {

class Invoice : public Base {
public:
    double total() const;
    void add(const Line& line, int qty = 1);
private:
    double compute() { return helper(); }
    std::vector<Line> lines_;
};

double Invoice::total() const {
    return this->compute() + Invoice::rate();
}

void Invoice::add(const Line& line, int qty) {
    lines_.push_back(line);
    log_line(line);
}

static void log_line(const Line& line) {}

}

struct Point { int x; int y; };

int main(int argc, char** argv) {
    billing::Invoice inv;
    inv.add(Line{}, 2);
    return 0;
}
"#;

    #[test]
    fn test_classes_namespaces_and_members() {
        let out = run(Language::Cpp, "src/invoice.cpp", SOURCE);

        let ns = find(&out, EntityKind::Module, "billing");
        let invoice = find(&out, EntityKind::Class, "Invoice");
        assert_eq!(invoice.qualified_name, "billing.Invoice");
        assert_eq!(invoice.attribute("bases"), Some("Base"));
        assert!(related(&out, RelationKind::Contains, &ns.id, &invoice.id));

        let total = find(&out, EntityKind::Function, "total");
        let compute = find(&out, EntityKind::Function, "compute");
        assert_eq!(total.qualified_name, "billing.Invoice.total");
        assert!(total.exported);
        assert!(!compute.exported);
        assert!(related(&out, RelationKind::HasMethod, &invoice.id, &total.id));

        let lines = find(&out, EntityKind::Variable, "lines_");
        assert_eq!(lines.attribute("role"), Some("field"));
        assert!(!lines.exported);

        let point = find(&out, EntityKind::Class, "Point");
        assert_eq!(point.attribute("type_kind"), Some("struct"));
        assert!(find(&out, EntityKind::Variable, "x").exported);
    }

    #[test]
    fn test_out_of_line_methods_and_calls() {
        let out = run(Language::Cpp, "src/invoice.cpp", SOURCE);

        let total = find(&out, EntityKind::Function, "total");
        let compute = find(&out, EntityKind::Function, "compute");
        let add = find(&out, EntityKind::Function, "add");
        let log_line = find(&out, EntityKind::Function, "log_line");
        let main = find(&out, EntityKind::Function, "main");

        assert_eq!(parameters(&out, add), vec!["line", "qty"]);
        assert_eq!(parameters(&out, main), vec!["argc", "argv"]);
        assert!(!log_line.exported);

        assert!(related(&out, RelationKind::Calls, &total.id, &compute.id));
        assert!(related(&out, RelationKind::Calls, &add.id, &log_line.id));
        assert!(related(&out, RelationKind::Calls, &main.id, &add.id));
        assert!(out.unresolved_calls >= 3);
    }

    #[test]
    fn test_includes_and_globals() {
        let out = run(Language::Cpp, "src/invoice.cpp", SOURCE);
        assert_eq!(imports(&out), vec!["vector", "store.h"]);

        let counter = find(&out, EntityKind::Variable, "counter");
        assert!(!counter.exported);
        let rate = find(&out, EntityKind::Variable, "RATE");
        assert!(rate.exported);
        assert_eq!(rate.attribute("const"), Some("true"));
    }

    #[test]
    fn test_c_source_uses_same_extractor() {
        let source = "#include <stdio.h>\n\nint square(int n) { return n * n; }\n\nint main(void) { return square(3); }\n";
        let out = run(Language::Cpp, "main.c", source);
        let square = find(&out, EntityKind::Function, "square");
        let main = find(&out, EntityKind::Function, "main");
        assert!(related(&out, RelationKind::Calls, &main.id, &square.id));
        assert_eq!(parameters(&out, main), Vec::<String>::new());
        assert_eq!(imports(&out), vec!["stdio.h"]);
    }
}
