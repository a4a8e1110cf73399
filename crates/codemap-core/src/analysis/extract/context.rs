//! Extraction context: builds the canonical entities and relationships for one file.
//!
//! Language extractors walk their own grammar and report declarations here.
//! The context owns the containment rules, scope-qualified naming, local call
//! resolution and the removal of edges whose endpoints are not in the record.

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};
use tree_sitter::Node;

use super::treesitter::{last_segment, strip_generics};
use crate::analysis::error::ExtractError;
use crate::analysis::models::{CodeEntity, EntityKind, RelationKind, Relationship, Span};

/// Maximum syntax-tree depth an extractor will descend into.
pub const MAX_DEPTH: usize = 2048;

/// Output of an extractor for one file.
#[derive(Debug, Default, Clone)]
pub struct Extraction {
    pub entities: Vec<CodeEntity>,
    pub relationships: Vec<Relationship>,
    /// Calls whose callee is not a function of this file.
    pub unresolved_calls: usize,
    /// Edges dropped because an endpoint was missing.
    pub dropped_relationships: usize,
}

/// A declared entity: its id and qualified name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declared {
    pub id: String,
    pub qualified_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Namespace, package or module body.
    Module,
    /// Class, struct, interface or trait body.
    Class,
    /// Block attaching methods to a type declared elsewhere (Rust `impl`).
    Impl,
    Function,
}

#[derive(Debug, Clone)]
struct Scope {
    kind: ScopeKind,
    /// Entity id, when the scope is itself an entity of this file.
    id: Option<String>,
    qualified_name: String,
}

/// How a call names its callee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    /// `foo()`.
    Bare(String),
    /// `self.foo()`, `this.foo()`, `$this->foo()`.
    SelfMember(String),
    /// `obj.foo()` for any other receiver.
    Member(String),
    /// `Type::foo()`: a method of the named type.
    Associated { owner: String, name: String },
}

impl CallTarget {
    fn name(&self) -> &str {
        match self {
            Self::Bare(n) | Self::SelfMember(n) | Self::Member(n) => n,
            Self::Associated { name, .. } => name,
        }
    }
}

#[derive(Debug)]
struct PendingCall {
    caller: String,
    target: CallTarget,
}

#[derive(Debug)]
struct FunctionInfo {
    id: String,
    name: String,
    /// Qualified name of the owning type, for methods.
    owner: Option<String>,
}

/// Builder for a single file's entities and relationships.
pub struct ExtractionContext<'a> {
    path: &'a str,
    source: &'a str,
    file_id: String,
    entities: Vec<CodeEntity>,
    /// Entity id to position in `entities`.
    index: HashMap<String, usize>,
    relationships: Vec<Relationship>,
    scopes: Vec<Scope>,
    functions: Vec<FunctionInfo>,
    function_owner: HashMap<String, Option<String>>,
    pending_calls: Vec<PendingCall>,
    pending_methods: Vec<(String, String)>,
}

impl<'a> ExtractionContext<'a> {
    /// Start a file, creating its File entity.
    pub fn new(path: &'a str, source: &'a str) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path);
        let lines = source.lines().count().max(1) as u32;

        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());

        let file = CodeEntity::new(
            EntityKind::File,
            name,
            path,
            path,
            Span::new(1, lines, 0, source.len()),
        )
        .exported(true)
        .with_attribute("hash", hex::encode(hasher.finalize()))
        .with_attribute("lines", lines.to_string())
        .with_attribute("size", source.len().to_string());

        let file_id = file.id.clone();
        let mut index = HashMap::new();
        index.insert(file_id.clone(), 0);

        Self {
            path,
            source,
            file_id,
            entities: vec![file],
            index,
            relationships: Vec::new(),
            scopes: Vec::new(),
            functions: Vec::new(),
            function_owner: HashMap::new(),
            pending_calls: Vec::new(),
            pending_methods: Vec::new(),
        }
    }

    pub fn path(&self) -> &'a str {
        self.path
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    /// Source text of a node.
    pub fn text(&self, node: &Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// Text of a named field child, if present.
    pub fn field_text(&self, node: &Node, field: &str) -> Option<&'a str> {
        node.child_by_field_name(field).map(|n| self.text(&n))
    }

    /// Deterministic name for constructs without an identifier.
    pub fn synthetic_name(&self, prefix: &str, node: &Node) -> String {
        let pos = node.start_position();
        format!("<{}@{}:{}>", prefix, pos.row + 1, pos.column + 1)
    }

    /// Fail when the tree is nested deeper than [`MAX_DEPTH`].
    pub fn check_depth(&self, node: &Node, depth: usize) -> Result<(), ExtractError> {
        if depth > MAX_DEPTH {
            return Err(ExtractError::TooDeep {
                line: node.start_position().row + 1,
                limit: MAX_DEPTH,
            });
        }
        Ok(())
    }

    // =========================================================================
    // SCOPES
    // =========================================================================

    /// Qualify a name with the enclosing scopes.
    pub fn qualify(&self, name: &str) -> String {
        match self.scopes.last() {
            Some(scope) => format!("{}.{}", scope.qualified_name, name),
            None => name.to_string(),
        }
    }

    /// Enter the body of a declared entity.
    pub fn enter(&mut self, kind: ScopeKind, declared: &Declared) {
        self.scopes.push(Scope {
            kind,
            id: Some(declared.id.clone()),
            qualified_name: declared.qualified_name.clone(),
        });
    }

    /// Enter an `impl`-style block for a type that may be declared elsewhere in the file.
    pub fn enter_impl(&mut self, type_name: &str) {
        let qualified_name = self.qualify(type_name);
        self.scopes.push(Scope {
            kind: ScopeKind::Impl,
            id: None,
            qualified_name,
        });
    }

    pub fn leave(&mut self) {
        self.scopes.pop();
    }

    /// Leave every trailing module scope (a new statement-style namespace replaces the last).
    pub fn leave_modules(&mut self) {
        while self.scopes.last().map(|s| s.kind) == Some(ScopeKind::Module) {
            self.scopes.pop();
        }
    }

    /// True when no class or function encloses the current position.
    pub fn at_module_level(&self) -> bool {
        self.scopes.iter().all(|s| s.kind == ScopeKind::Module)
    }

    /// True directly inside a class, interface or impl body.
    pub fn in_type_body(&self) -> bool {
        matches!(
            self.scopes.last().map(|s| s.kind),
            Some(ScopeKind::Class | ScopeKind::Impl)
        )
    }

    fn innermost_function(&self) -> Option<&Scope> {
        self.scopes.iter().rev().find(|s| s.kind == ScopeKind::Function)
    }

    /// Innermost module or class scope that is an entity of this file.
    fn structural_parent(&self) -> Option<&Scope> {
        self.scopes
            .iter()
            .rev()
            .find(|s| matches!(s.kind, ScopeKind::Module | ScopeKind::Class))
            .filter(|s| s.id.is_some())
    }

    // =========================================================================
    // DECLARATIONS
    // =========================================================================

    fn insert(&mut self, entity: CodeEntity) -> Declared {
        let declared = Declared {
            id: entity.id.clone(),
            qualified_name: entity.qualified_name.clone(),
        };
        if !self.index.contains_key(&entity.id) {
            self.index.insert(entity.id.clone(), self.entities.len());
            self.entities.push(entity);
        }
        declared
    }

    fn relate(&mut self, kind: RelationKind, from: &str, to: &str) {
        self.relationships.push(Relationship::new(kind, from, to));
    }

    /// File CONTAINS the entity; so does the enclosing module or class.
    fn contain(&mut self, id: &str) {
        let file_id = self.file_id.clone();
        self.relate(RelationKind::Contains, &file_id, id);
        if let Some(parent) = self.structural_parent().and_then(|s| s.id.clone()) {
            if parent != id {
                self.relate(RelationKind::Contains, &parent, id);
            }
        }
    }

    fn entity(&self, kind: EntityKind, name: &str, node: &Node) -> CodeEntity {
        CodeEntity::new(kind, name, self.qualify(name), self.path, Span::of(node))
    }

    /// Declare a namespace, package or module.
    pub fn declare_module(&mut self, name: &str, node: &Node) -> Declared {
        let entity = self.entity(EntityKind::Module, name, node).exported(true);
        let declared = self.insert(entity);
        self.contain(&declared.id);
        declared
    }

    /// Declare a class-like (`Class`) or interface-like (`Interface`) type.
    pub fn declare_type(
        &mut self,
        kind: EntityKind,
        name: &str,
        node: &Node,
        exported: bool,
    ) -> Declared {
        debug_assert!(kind.is_type());
        let entity = self.entity(kind, name, node).exported(exported);
        let declared = self.insert(entity);
        self.contain(&declared.id);
        declared
    }

    /// Declare a function. Inside a type or impl body it becomes a method.
    pub fn declare_function(&mut self, name: &str, node: &Node, exported: bool) -> Declared {
        let owner = match self.scopes.last() {
            Some(scope) if matches!(scope.kind, ScopeKind::Class | ScopeKind::Impl) => {
                Some((scope.id.clone(), scope.qualified_name.clone()))
            }
            _ => None,
        };
        let entity = self.entity(EntityKind::Function, name, node).exported(exported);
        self.register_function(entity, name, owner)
    }

    /// Declare a method attached to a type by name (Go receivers, C++ `Type::method`).
    pub fn declare_method_of(
        &mut self,
        owner: &str,
        name: &str,
        node: &Node,
        exported: bool,
    ) -> Declared {
        let owner_qualified = self.qualify(owner);
        let qualified_name = format!("{}.{}", owner_qualified, name);
        let entity = CodeEntity::new(EntityKind::Function, name, qualified_name, self.path, Span::of(node))
            .exported(exported);
        self.register_function(entity, name, Some((None, owner_qualified)))
    }

    fn register_function(
        &mut self,
        mut entity: CodeEntity,
        name: &str,
        owner: Option<(Option<String>, String)>,
    ) -> Declared {
        if let Some((_, owner_qualified)) = &owner {
            entity = entity.with_attribute("method_of", owner_qualified.clone());
        }
        let is_new = !self.index.contains_key(&entity.id);
        let declared = self.insert(entity);
        if !is_new {
            return declared;
        }

        let file_id = self.file_id.clone();
        self.relate(RelationKind::Contains, &file_id, &declared.id);

        let owner_qualified = match owner {
            Some((Some(owner_id), owner_qualified)) => {
                self.relate(RelationKind::HasMethod, &owner_id, &declared.id);
                Some(owner_qualified)
            }
            Some((None, owner_qualified)) => {
                self.pending_methods
                    .push((owner_qualified.clone(), declared.id.clone()));
                Some(owner_qualified)
            }
            None => None,
        };

        self.function_owner
            .insert(declared.id.clone(), owner_qualified.clone());
        self.functions.push(FunctionInfo {
            id: declared.id.clone(),
            name: name.to_string(),
            owner: owner_qualified,
        });
        declared
    }

    /// Declare a named parameter of a function (1-based position).
    pub fn declare_parameter(
        &mut self,
        function: &Declared,
        name: &str,
        position: usize,
        node: &Node,
        type_name: Option<&str>,
    ) {
        let qualified_name = format!("{}({})", function.qualified_name, name);
        let mut entity = CodeEntity::new(EntityKind::Variable, name, qualified_name, self.path, Span::of(node))
            .with_attribute("role", "parameter")
            .with_attribute("position", position.to_string());
        if let Some(t) = type_name.map(str::trim).filter(|t| !t.is_empty()) {
            entity = entity.with_attribute("type", t);
        }
        let declared = self.insert(entity);
        self.relate(RelationKind::HasParameter, &function.id, &declared.id);
    }

    /// Declare a variable binding.
    ///
    /// Only module-level and type-level bindings are recorded; locals are ignored.
    pub fn declare_variable(&mut self, name: &str, node: &Node, exported: bool) -> Option<Declared> {
        if !(self.at_module_level() || self.in_type_body()) {
            return None;
        }
        let entity = self.entity(EntityKind::Variable, name, node).exported(exported);
        let declared = self.insert(entity);
        self.contain(&declared.id);
        Some(declared)
    }

    /// Declare an instance field (`self.x`, `@x`, `this.x`) on the enclosing class.
    pub fn declare_field(&mut self, name: &str, node: &Node, exported: bool) -> Option<Declared> {
        let class = self
            .scopes
            .iter()
            .rev()
            .find(|s| s.kind == ScopeKind::Class)?;
        let class_id = class.id.clone()?;
        let qualified_name = format!("{}.{}", class.qualified_name, name);

        let entity = CodeEntity::new(EntityKind::Variable, name, qualified_name, self.path, Span::of(node))
            .exported(exported)
            .with_attribute("role", "field");
        let is_new = !self.index.contains_key(&entity.id);
        let declared = self.insert(entity);
        if is_new {
            let file_id = self.file_id.clone();
            self.relate(RelationKind::Contains, &file_id, &declared.id);
            self.relate(RelationKind::Contains, &class_id, &declared.id);
        }
        Some(declared)
    }

    /// Record an import of `source` by this file.
    ///
    /// The imported path becomes a `Module` entity of this record; resolving it
    /// to another file is left to the consumer.
    pub fn add_import(&mut self, source: &str, node: &Node, alias: Option<&str>, names: &[String]) {
        let source = source.trim();
        if source.is_empty() {
            return;
        }

        let entity = CodeEntity::new(EntityKind::Module, source, source, self.path, Span::of(node))
            .with_attribute("import", "true");
        let declared = self.insert(entity);

        let existing = self.relationships.iter_mut().find(|r| {
            r.kind == RelationKind::Imports && r.from == self.file_id && r.to == declared.id
        });

        match existing {
            Some(edge) => {
                if !names.is_empty() {
                    let merged = match edge.attributes.get("names") {
                        Some(prev) => format!("{},{}", prev, names.join(",")),
                        None => names.join(","),
                    };
                    edge.attributes.insert("names".to_string(), merged);
                }
                if let Some(alias) = alias {
                    edge.attributes
                        .entry("alias".to_string())
                        .or_insert_with(|| alias.to_string());
                }
            }
            None => {
                let mut edge = Relationship::new(RelationKind::Imports, &self.file_id, &declared.id);
                if let Some(alias) = alias.filter(|a| !a.is_empty()) {
                    edge = edge.with_attribute("alias", alias);
                }
                if !names.is_empty() {
                    edge = edge.with_attribute("names", names.join(","));
                }
                self.relationships.push(edge);
            }
        }
    }

    /// Record a call made from the innermost enclosing function.
    ///
    /// Calls outside any function have no caller and are ignored.
    pub fn record_call(&mut self, target: CallTarget) {
        if target.name().is_empty() {
            return;
        }
        if let Some(caller) = self.innermost_function().and_then(|s| s.id.clone()) {
            self.pending_calls.push(PendingCall { caller, target });
        }
    }

    /// Add an attribute to an already declared entity.
    pub fn set_attribute(&mut self, id: &str, key: &str, value: impl Into<String>) {
        if let Some(&idx) = self.index.get(id) {
            self.entities[idx]
                .attributes
                .insert(key.to_string(), value.into());
        }
    }

    // =========================================================================
    // FINISH
    // =========================================================================

    fn resolve_call(&self, call: &PendingCall) -> Option<&str> {
        let caller_owner = self.function_owner.get(&call.caller).cloned().flatten();
        let name = call.target.name();
        let mut candidates = self.functions.iter().filter(|f| f.name == name);

        let same_owner = |f: &&FunctionInfo| caller_owner.is_some() && f.owner == caller_owner;

        let found = match &call.target {
            CallTarget::SelfMember(_) => candidates.find(same_owner),
            CallTarget::Bare(_) => {
                let all: Vec<&FunctionInfo> = candidates.collect();
                all.iter()
                    .find(|f| same_owner(f))
                    .or_else(|| all.iter().find(|f| f.owner.is_none()))
                    .copied()
            }
            CallTarget::Associated { owner, .. } => {
                let owner = last_segment(strip_generics(owner));
                candidates.find(|f| {
                    f.owner
                        .as_deref()
                        .map(|o| last_segment(o) == owner)
                        .unwrap_or(false)
                })
            }
            CallTarget::Member(_) => {
                let methods: Vec<&FunctionInfo> =
                    candidates.filter(|f| f.owner.is_some()).collect();
                if methods.len() == 1 {
                    Some(methods[0])
                } else {
                    None
                }
            }
        };

        found.map(|f| f.id.as_str())
    }

    /// Resolve pending edges, drop dangling ones and return the extraction.
    pub fn finish(mut self) -> Extraction {
        let mut unresolved_calls = 0;

        let calls = std::mem::take(&mut self.pending_calls);
        let mut call_edges = Vec::new();
        for call in &calls {
            match self.resolve_call(call) {
                Some(callee) => {
                    call_edges.push(Relationship::new(RelationKind::Calls, &call.caller, callee))
                }
                None => unresolved_calls += 1,
            }
        }
        self.relationships.extend(call_edges);

        let methods = std::mem::take(&mut self.pending_methods);
        for (owner_qualified, function_id) in methods {
            let owner_id = self
                .entities
                .iter()
                .find(|e| e.kind.is_type() && e.qualified_name == owner_qualified)
                .map(|e| e.id.clone());
            // Owners declared in another file leave the method unattached.
            if let Some(owner_id) = owner_id {
                self.relate(RelationKind::HasMethod, &owner_id, &function_id);
            }
        }

        let mut seen = HashSet::new();
        let mut relationships = Vec::with_capacity(self.relationships.len());
        let mut dropped_relationships = 0;
        for rel in self.relationships {
            if !self.index.contains_key(&rel.from) || !self.index.contains_key(&rel.to) {
                dropped_relationships += 1;
                continue;
            }
            if seen.insert((rel.kind, rel.from.clone(), rel.to.clone())) {
                relationships.push(rel);
            }
        }

        Extraction {
            entities: self.entities,
            relationships,
            unresolved_calls,
            dropped_relationships,
        }
    }
}

/// Strip quotes or angle brackets around a string literal.
pub fn unquote(text: &str) -> &str {
    text.trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '<' | '>'))
}
