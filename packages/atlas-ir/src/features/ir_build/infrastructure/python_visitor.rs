//! Python structural extraction
//!
//! Walks the tree-sitter Python AST and emits nodes, edges, and
//! per-function statement trees. Malformed subtrees degrade to
//! best-effort nodes; extraction never panics on grammar surprises.

use crate::features::ir_build::domain::{
    AllocKind, AllocSite, ArgValue, CallSite, FieldAccess, FunctionBody, Stmt, StmtKind,
};
use crate::features::ir_build::infrastructure::fqn::{anonymous_name, FqnBuilder};
use crate::shared::models::{Edge, EdgeKind, Node, NodeKind, Span, Value};
use std::collections::HashMap;
use tree_sitter::Node as TsNode;

/// Nesting depth guard; deeper trees are extracted flat and flagged
const MAX_DEPTH: usize = 200;

fn span_of(node: TsNode<'_>) -> Span {
    let start = node.start_position();
    let end = node.end_position();
    Span::new(
        start.row as u32,
        start.column as u32,
        end.row as u32,
        end.column as u32,
    )
}

/// Aggregated facts about one expression
#[derive(Debug, Default)]
struct ExprInfo {
    uses: Vec<String>,
    calls: Vec<CallSite>,
    field_reads: Vec<FieldAccess>,
    allocs: Vec<AllocSite>,
}

pub struct PythonVisitor<'a> {
    source: &'a [u8],
    file_path: &'a str,
    repo_id: &'a str,

    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub bodies: Vec<FunctionBody>,
    pub degraded: bool,

    file_node_id: String,
    /// Module-level callables for intra-file call resolution
    module_functions: HashMap<String, String>,
}

impl<'a> PythonVisitor<'a> {
    pub fn new(source: &'a str, file_path: &'a str, repo_id: &'a str) -> Self {
        Self {
            source: source.as_bytes(),
            file_path,
            repo_id,
            nodes: Vec::new(),
            edges: Vec::new(),
            bodies: Vec::new(),
            degraded: false,
            file_node_id: String::new(),
            module_functions: HashMap::new(),
        }
    }

    pub fn run(mut self, root: TsNode<'a>) -> (Vec<Node>, Vec<Edge>, Vec<FunctionBody>, bool) {
        let mut fqn = FqnBuilder::for_module(self.file_path);
        let module_fqn = if fqn.current().is_empty() {
            self.file_path.to_string()
        } else {
            fqn.current()
        };

        let file_node = Node::new(
            Node::stable_id(self.repo_id, &module_fqn, NodeKind::File, span_of(root)),
            NodeKind::File,
            module_fqn,
            self.file_path,
            span_of(root),
        );
        self.file_node_id = file_node.id.clone();
        self.nodes.push(file_node);

        // Pass 1: module-level callable names so call sites inside
        // earlier functions can link to later definitions
        self.collect_module_functions(root, &fqn);

        let file_id = self.file_node_id.clone();
        let module_fqn = self.nodes[0].fqn.clone();

        // Pass 2: declarations plus the module-level statement tree
        // (top-level calls and assignments flow through analysis too)
        let statements = self.build_stmts(root, &file_id, &mut fqn, 0, true);
        self.bodies.push(FunctionBody {
            function_id: file_id.clone(),
            function_fqn: module_fqn,
            file_path: self.file_path.to_string(),
            params: Vec::new(),
            span: span_of(root),
            statements,
        });

        // Module docstring
        if let Some(doc) = self.leading_docstring(root) {
            if let Some(file_node) = self.nodes.iter_mut().find(|n| n.id == file_id) {
                file_node.docstring = Some(doc);
            }
        }

        self.link_calls();

        (self.nodes, self.edges, self.bodies, self.degraded)
    }

    fn text(&self, node: TsNode<'_>) -> String {
        node.utf8_text(self.source).unwrap_or_default().to_string()
    }

    /// Dotted path of an identifier/attribute chain; None for dynamic bases
    fn dotted(&self, node: TsNode<'_>) -> Option<String> {
        match node.kind() {
            "identifier" => Some(self.text(node)),
            "attribute" => {
                let object = node.child_by_field_name("object")?;
                let attr = node.child_by_field_name("attribute")?;
                Some(format!("{}.{}", self.dotted(object)?, self.text(attr)))
            }
            _ => None,
        }
    }

    fn collect_module_functions(&mut self, root: TsNode<'a>, fqn: &FqnBuilder) {
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            let def = match child.kind() {
                "function_definition" => Some(child),
                "decorated_definition" => child.child_by_field_name("definition"),
                _ => None,
            };
            if let Some(def) = def {
                if def.kind() == "function_definition" {
                    if let Some(name_node) = def.child_by_field_name("name") {
                        let name = self.text(name_node);
                        let func_fqn = fqn.child(&name);
                        let id = Node::stable_id(
                            self.repo_id,
                            &func_fqn,
                            NodeKind::Function,
                            span_of(def),
                        );
                        self.module_functions.insert(name, id);
                    }
                }
            }
        }
    }

    /// First statement string literal of a block owner (module/def/class)
    fn leading_docstring(&self, owner: TsNode<'_>) -> Option<String> {
        let block = if owner.kind() == "module" {
            owner
        } else {
            owner.child_by_field_name("body")?
        };
        let mut cursor = block.walk();
        let first = block.named_children(&mut cursor).next()?;
        if first.kind() == "expression_statement" && first.named_child_count() == 1 {
            let expr = first.named_child(0)?;
            if expr.kind() == "string" {
                let raw = self.text(expr);
                return Some(
                    raw.trim_matches(|c| c == '"' || c == '\'')
                        .trim()
                        .to_string(),
                );
            }
        }
        None
    }

    // ────────────────────────────────────────────────────────────────
    // Declarations
    // ────────────────────────────────────────────────────────────────

    fn visit_block(
        &mut self,
        block: TsNode<'a>,
        parent_id: &str,
        fqn: &mut FqnBuilder,
        in_class: bool,
        depth: usize,
    ) {
        if depth > MAX_DEPTH {
            self.degraded = true;
            return;
        }

        let mut cursor = block.walk();
        let children: Vec<TsNode<'a>> = block.named_children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "function_definition" => {
                    self.visit_function(child, &[], parent_id, fqn, in_class, depth + 1);
                }
                "class_definition" => {
                    self.visit_class(child, &[], parent_id, fqn, depth + 1);
                }
                "decorated_definition" => {
                    let mut dcursor = child.walk();
                    let decorators: Vec<String> = child
                        .named_children(&mut dcursor)
                        .filter(|c| c.kind() == "decorator")
                        .map(|c| self.text(c).trim_start_matches('@').to_string())
                        .collect();
                    if let Some(def) = child.child_by_field_name("definition") {
                        match def.kind() {
                            "function_definition" => self.visit_function(
                                def,
                                &decorators,
                                parent_id,
                                fqn,
                                in_class,
                                depth + 1,
                            ),
                            "class_definition" => {
                                self.visit_class(def, &decorators, parent_id, fqn, depth + 1)
                            }
                            _ => {}
                        }
                    }
                }
                "import_statement" | "import_from_statement" => {
                    self.visit_import(child);
                }
                "expression_statement" => {
                    self.visit_scope_assignment(child, parent_id, fqn, in_class);
                }
                "if_statement" | "try_statement" => {
                    // Conditional module-level definitions (guards, fallbacks)
                    let mut icursor = child.walk();
                    let blocks: Vec<TsNode<'a>> = child
                        .named_children(&mut icursor)
                        .filter(|c| c.kind() == "block")
                        .collect();
                    for inner in blocks {
                        self.visit_block(inner, parent_id, fqn, in_class, depth + 1);
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_function(
        &mut self,
        def: TsNode<'a>,
        decorators: &[String],
        parent_id: &str,
        fqn: &mut FqnBuilder,
        in_class: bool,
        depth: usize,
    ) {
        let Some(name_node) = def.child_by_field_name("name") else {
            self.degraded = true;
            return;
        };
        let name = self.text(name_node);
        let func_fqn = fqn.child(&name);
        let span = span_of(def);
        let kind = if in_class {
            NodeKind::Method
        } else {
            NodeKind::Function
        };
        let func_id = Node::stable_id(self.repo_id, &func_fqn, kind, span);

        let params = self.param_names(def);
        let signature = format!("{}({})", name, params.join(", "));

        let mut node = Node::new(&func_id, kind, &func_fqn, self.file_path, span)
            .with_parent(parent_id)
            .with_attr("signature", Value::String(signature));
        if !decorators.is_empty() {
            node = node.with_attr(
                "decorators",
                Value::Array(decorators.iter().map(|d| Value::String(d.clone())).collect()),
            );
        }
        if let Some(doc) = self.leading_docstring(def) {
            node = node.with_docstring(doc);
        }
        self.nodes.push(node);
        self.edges
            .push(Edge::new(parent_id, &func_id, EdgeKind::Contains));

        // Parameter nodes
        for pname in &params {
            let pfqn = format!("{}.{}", func_fqn, pname);
            let pspan = span_of(def.child_by_field_name("parameters").unwrap_or(def));
            let pid = Node::stable_id(self.repo_id, &pfqn, NodeKind::Parameter, pspan);
            self.nodes.push(
                Node::new(&pid, NodeKind::Parameter, &pfqn, self.file_path, pspan)
                    .with_parent(&func_id),
            );
            self.edges
                .push(Edge::new(&func_id, &pid, EdgeKind::Contains));
        }

        // Statement tree
        fqn.push(name.clone());
        let statements = def
            .child_by_field_name("body")
            .map(|body| self.build_stmts(body, &func_id, fqn, depth, false))
            .unwrap_or_default();
        fqn.pop();

        let body = FunctionBody {
            function_id: func_id.clone(),
            function_fqn: func_fqn.clone(),
            file_path: self.file_path.to_string(),
            params: params.clone(),
            span,
            statements,
        };

        self.emit_local_variables(&body, &func_id, &func_fqn);
        self.bodies.push(body);
    }

    fn visit_class(
        &mut self,
        def: TsNode<'a>,
        decorators: &[String],
        parent_id: &str,
        fqn: &mut FqnBuilder,
        depth: usize,
    ) {
        let Some(name_node) = def.child_by_field_name("name") else {
            self.degraded = true;
            return;
        };
        let name = self.text(name_node);
        let class_fqn = fqn.child(&name);
        let span = span_of(def);
        let class_id = Node::stable_id(self.repo_id, &class_fqn, NodeKind::Class, span);

        let mut node = Node::new(&class_id, NodeKind::Class, &class_fqn, self.file_path, span)
            .with_parent(parent_id);
        if !decorators.is_empty() {
            node = node.with_attr(
                "decorators",
                Value::Array(decorators.iter().map(|d| Value::String(d.clone())).collect()),
            );
        }
        if let Some(doc) = self.leading_docstring(def) {
            node = node.with_docstring(doc);
        }
        self.nodes.push(node);
        self.edges
            .push(Edge::new(parent_id, &class_id, EdgeKind::Contains));

        // Base classes: syntactic targets, resolved cross-file later
        if let Some(superclasses) = def.child_by_field_name("superclasses") {
            let mut scursor = superclasses.walk();
            let bases: Vec<TsNode<'a>> = superclasses.named_children(&mut scursor).collect();
            for base in bases {
                if let Some(base_path) = self.dotted(base) {
                    self.edges.push(
                        Edge::new(
                            &class_id,
                            format!("unresolved:type:{}", base_path),
                            EdgeKind::Inherits,
                        )
                        .with_span(span_of(base)),
                    );
                }
            }
        }

        if let Some(body) = def.child_by_field_name("body") {
            fqn.push(name.clone());
            self.visit_block(body, &class_id, fqn, true, depth + 1);
            fqn.pop();
        }
    }

    fn visit_import(&mut self, stmt: TsNode<'a>) {
        let span = span_of(stmt);
        let is_from = stmt.kind() == "import_from_statement";

        let module = if is_from {
            stmt.child_by_field_name("module_name")
                .map(|m| self.text(m))
                .unwrap_or_default()
        } else {
            String::new()
        };

        let mut cursor = stmt.walk();
        let children: Vec<TsNode<'a>> = stmt.named_children(&mut cursor).collect();
        for child in children {
            let (name_path, alias) = match child.kind() {
                "dotted_name" | "relative_import" => (self.text(child), None),
                "wildcard_import" => ("*".to_string(), None),
                "aliased_import" => {
                    let name = child
                        .child_by_field_name("name")
                        .map(|n| self.text(n))
                        .unwrap_or_default();
                    let alias = child.child_by_field_name("alias").map(|a| self.text(a));
                    (name, alias)
                }
                _ => continue,
            };
            // The module_name field also surfaces as a named child
            if is_from && name_path == module {
                continue;
            }
            if name_path.is_empty() {
                continue;
            }

            let target_path = if is_from {
                if name_path == "*" {
                    module.clone()
                } else {
                    format!("{}.{}", module, name_path)
                }
            } else {
                name_path.clone()
            };

            let local_name = alias
                .clone()
                .unwrap_or_else(|| name_path.rsplit('.').next().unwrap_or(&name_path).to_string());

            let import_fqn = format!("{}:{}", self.nodes[0].fqn, local_name);
            let import_id = Node::stable_id(self.repo_id, &import_fqn, NodeKind::Import, span);
            let mut import_node =
                Node::new(&import_id, NodeKind::Import, &import_fqn, self.file_path, span)
                    .with_parent(&self.file_node_id)
                    .with_attr("target", Value::String(target_path.clone()))
                    .with_attr("local_name", Value::String(local_name.clone()));
            if name_path == "*" {
                import_node = import_node.with_attr("wildcard", Value::Bool(true));
            }
            self.nodes.push(import_node);
            self.edges
                .push(Edge::new(&self.file_node_id, &import_id, EdgeKind::Contains));
            self.edges.push(
                Edge::new(
                    &self.file_node_id,
                    format!("unresolved:import:{}", target_path),
                    EdgeKind::Imports,
                )
                .with_span(span)
                .with_attr("local_name", Value::String(local_name)),
            );
        }
    }

    /// Module/class level assignment → Variable/Field node
    fn visit_scope_assignment(
        &mut self,
        stmt: TsNode<'a>,
        parent_id: &str,
        fqn: &FqnBuilder,
        in_class: bool,
    ) {
        let Some(expr) = stmt.named_child(0) else {
            return;
        };
        if expr.kind() != "assignment" {
            return;
        }
        let Some(left) = expr.child_by_field_name("left") else {
            return;
        };
        if left.kind() != "identifier" {
            return;
        }

        let name = self.text(left);
        let var_fqn = fqn.child(&name);
        let span = span_of(stmt);
        let kind = if in_class {
            NodeKind::Field
        } else {
            NodeKind::Variable
        };
        let var_id = Node::stable_id(self.repo_id, &var_fqn, kind, span);

        let is_const = name.chars().all(|c| c.is_ascii_uppercase() || c == '_');
        let mut node =
            Node::new(&var_id, kind, &var_fqn, self.file_path, span).with_parent(parent_id);
        if is_const {
            node = node.with_attr("constant", Value::Bool(true));
        }
        self.nodes.push(node);
        self.edges
            .push(Edge::new(parent_id, &var_id, EdgeKind::Contains));
    }

    fn param_names(&self, def: TsNode<'_>) -> Vec<String> {
        let Some(params) = def.child_by_field_name("parameters") else {
            return Vec::new();
        };
        let mut cursor = params.walk();
        let mut names = Vec::new();
        for child in params.named_children(&mut cursor) {
            match child.kind() {
                "identifier" => names.push(self.text(child)),
                "typed_parameter" | "default_parameter" | "typed_default_parameter" => {
                    if let Some(name) = child
                        .child_by_field_name("name")
                        .or_else(|| child.named_child(0))
                    {
                        if name.kind() == "identifier" {
                            names.push(self.text(name));
                        }
                    }
                }
                "list_splat_pattern" | "dictionary_splat_pattern" => {
                    if let Some(name) = child.named_child(0) {
                        if name.kind() == "identifier" {
                            names.push(self.text(name));
                        }
                    }
                }
                _ => {}
            }
        }
        names
    }

    // ────────────────────────────────────────────────────────────────
    // Statement trees
    // ────────────────────────────────────────────────────────────────

    fn build_stmts(
        &mut self,
        block: TsNode<'a>,
        func_id: &str,
        fqn: &mut FqnBuilder,
        depth: usize,
        module_level: bool,
    ) -> Vec<Stmt> {
        if depth > MAX_DEPTH {
            self.degraded = true;
            return Vec::new();
        }

        let mut stmts = Vec::new();
        let mut cursor = block.walk();
        let children: Vec<TsNode<'a>> = block.named_children(&mut cursor).collect();

        for child in children {
            match child.kind() {
                "import_statement" | "import_from_statement" => {
                    self.visit_import(child);
                }
                "expression_statement" => {
                    if module_level {
                        let file_id = self.file_node_id.clone();
                        let module_fqn = FqnBuilder::for_module(self.file_path);
                        self.visit_scope_assignment(child, &file_id, &module_fqn, false);
                    }
                    if let Some(expr) = child.named_child(0) {
                        stmts.push(self.build_expr_stmt(expr, child));
                    }
                }
                "return_statement" => {
                    let mut stmt = Stmt::new(StmtKind::Return, span_of(child));
                    if let Some(value) = child.named_child(0) {
                        let mut info = ExprInfo::default();
                        self.analyze_expr(value, &mut info);
                        self.apply_expr_info(&mut stmt, info);
                    }
                    stmts.push(stmt);
                }
                "raise_statement" => {
                    let mut stmt = Stmt::new(StmtKind::Raise, span_of(child));
                    let mut info = ExprInfo::default();
                    let mut rcursor = child.walk();
                    let raised: Vec<TsNode<'a>> = child.named_children(&mut rcursor).collect();
                    for value in raised {
                        self.analyze_expr(value, &mut info);
                    }
                    self.apply_expr_info(&mut stmt, info);
                    stmts.push(stmt);
                }
                "if_statement" => {
                    stmts.push(self.build_if(child, func_id, fqn, depth, module_level))
                }
                "while_statement" => {
                    let mut stmt = Stmt::new(StmtKind::While, span_of(child));
                    if let Some(cond) = child.child_by_field_name("condition") {
                        let mut info = ExprInfo::default();
                        self.analyze_expr(cond, &mut info);
                        self.apply_expr_info(&mut stmt, info);
                    }
                    if let Some(body) = child.child_by_field_name("body") {
                        stmt.body = self.build_stmts(body, func_id, fqn, depth + 1, module_level);
                    }
                    stmts.push(stmt);
                }
                "for_statement" => {
                    let mut stmt = Stmt::new(StmtKind::For, span_of(child));
                    if let Some(left) = child.child_by_field_name("left") {
                        stmt.defs = self.target_names(left);
                    }
                    if let Some(right) = child.child_by_field_name("right") {
                        let mut info = ExprInfo::default();
                        self.analyze_expr(right, &mut info);
                        self.apply_expr_info(&mut stmt, info);
                    }
                    if let Some(body) = child.child_by_field_name("body") {
                        stmt.body = self.build_stmts(body, func_id, fqn, depth + 1, module_level);
                    }
                    stmts.push(stmt);
                }
                "try_statement" => {
                    let mut stmt = Stmt::new(StmtKind::Try, span_of(child));
                    if let Some(body) = child.child_by_field_name("body") {
                        stmt.body = self.build_stmts(body, func_id, fqn, depth + 1, module_level);
                    }
                    let mut tcursor = child.walk();
                    let clauses: Vec<TsNode<'a>> = child.named_children(&mut tcursor).collect();
                    for clause in clauses {
                        match clause.kind() {
                            "except_clause" => {
                                let mut handler =
                                    Stmt::new(StmtKind::Handler, span_of(clause));
                                let mut hcursor = clause.walk();
                                let parts: Vec<TsNode<'a>> =
                                    clause.named_children(&mut hcursor).collect();
                                for part in parts {
                                    match part.kind() {
                                        "block" => {
                                            handler.body = self
                                                .build_stmts(part, func_id, fqn, depth + 1, module_level);
                                        }
                                        "as_pattern" => {
                                            if let Some(alias) = part.named_child(1) {
                                                handler.defs.push(self.text(alias));
                                            }
                                        }
                                        _ => {}
                                    }
                                }
                                stmt.handlers.push(handler);
                            }
                            "finally_clause" => {
                                let mut fcursor = clause.walk();
                                let blocks: Vec<TsNode<'a>> = clause
                                    .named_children(&mut fcursor)
                                    .filter(|c| c.kind() == "block")
                                    .collect();
                                if let Some(block) = blocks.into_iter().next() {
                                    stmt.finalizer =
                                        self.build_stmts(block, func_id, fqn, depth + 1, module_level);
                                }
                            }
                            _ => {}
                        }
                    }
                    stmts.push(stmt);
                }
                "with_statement" => {
                    let mut stmt = Stmt::new(StmtKind::With, span_of(child));
                    let mut info = ExprInfo::default();
                    let mut wcursor = child.walk();
                    let clauses: Vec<TsNode<'a>> = child.named_children(&mut wcursor).collect();
                    for clause in clauses {
                        if clause.kind() == "with_clause" {
                            let mut ccursor = clause.walk();
                            let items: Vec<TsNode<'a>> =
                                clause.named_children(&mut ccursor).collect();
                            for item in items {
                                if let Some(value) = item.named_child(0) {
                                    if value.kind() == "as_pattern" {
                                        if let Some(expr) = value.named_child(0) {
                                            self.analyze_expr(expr, &mut info);
                                        }
                                        if let Some(alias) = value.named_child(1) {
                                            stmt.defs.extend(self.target_names(alias));
                                        }
                                    } else {
                                        self.analyze_expr(value, &mut info);
                                    }
                                }
                            }
                        }
                    }
                    self.apply_expr_info(&mut stmt, info);
                    if let Some(body) = child.child_by_field_name("body") {
                        stmt.body = self.build_stmts(body, func_id, fqn, depth + 1, module_level);
                    }
                    stmts.push(stmt);
                }
                "break_statement" => stmts.push(Stmt::new(StmtKind::Break, span_of(child))),
                "continue_statement" => {
                    stmts.push(Stmt::new(StmtKind::Continue, span_of(child)))
                }
                "pass_statement" => stmts.push(Stmt::new(StmtKind::Pass, span_of(child))),
                "function_definition" | "decorated_definition" | "class_definition" => {
                    // Nested definition: a closure allocation in the
                    // enclosing body plus its own symbol subtree
                    let def = if child.kind() == "decorated_definition" {
                        child.child_by_field_name("definition").unwrap_or(child)
                    } else {
                        child
                    };
                    let nested_name = def
                        .child_by_field_name("name")
                        .map(|n| self.text(n))
                        .unwrap_or_else(|| anonymous_name(span_of(def)));

                    let nested_fqn = fqn.child(&nested_name);
                    match def.kind() {
                        "function_definition" => {
                            self.visit_function(def, &[], func_id, fqn, false, depth + 1)
                        }
                        "class_definition" => self.visit_class(def, &[], func_id, fqn, depth + 1),
                        _ => {}
                    }

                    let mut stmt = Stmt::new(StmtKind::NestedDef, span_of(child));
                    stmt.defs.push(nested_name.clone());
                    if !module_level && def.kind() == "function_definition" {
                        // A def inside a function is a closure value in
                        // the enclosing body
                        let captures = self
                            .bodies
                            .iter()
                            .find(|b| b.function_fqn == nested_fqn)
                            .map(free_variables)
                            .unwrap_or_default();
                        stmt.allocs.push(AllocSite {
                            var: Some(nested_name),
                            kind: AllocKind::Closure,
                            captures,
                            span: span_of(child),
                        });
                    }
                    stmts.push(stmt);
                }
                _ => {}
            }
        }

        stmts
    }

    fn build_if(
        &mut self,
        node: TsNode<'a>,
        func_id: &str,
        fqn: &mut FqnBuilder,
        depth: usize,
        module_level: bool,
    ) -> Stmt {
        let mut stmt = Stmt::new(StmtKind::If, span_of(node));
        if let Some(cond) = node.child_by_field_name("condition") {
            let mut info = ExprInfo::default();
            self.analyze_expr(cond, &mut info);
            self.apply_expr_info(&mut stmt, info);
        }
        if let Some(consequence) = node.child_by_field_name("consequence") {
            stmt.body = self.build_stmts(consequence, func_id, fqn, depth + 1, module_level);
        }
        let mut cursor = node.walk();
        let alts: Vec<TsNode<'a>> = node.named_children(&mut cursor).collect();
        for alt in alts {
            match alt.kind() {
                "elif_clause" => {
                    let mut elif = Stmt::new(StmtKind::If, span_of(alt));
                    if let Some(cond) = alt.child_by_field_name("condition") {
                        let mut info = ExprInfo::default();
                        self.analyze_expr(cond, &mut info);
                        self.apply_expr_info(&mut elif, info);
                    }
                    if let Some(consequence) = alt.child_by_field_name("consequence") {
                        elif.body = self.build_stmts(consequence, func_id, fqn, depth + 1, module_level);
                    }
                    stmt.orelse.push(elif);
                }
                "else_clause" => {
                    if let Some(body) = alt.child_by_field_name("body").or_else(|| {
                        let mut ecursor = alt.walk();
                        let found = alt.named_children(&mut ecursor).find(|c| c.kind() == "block");
                        found
                    }) {
                        let mut else_stmts = self.build_stmts(body, func_id, fqn, depth + 1, module_level);
                        stmt.orelse.append(&mut else_stmts);
                    }
                }
                _ => {}
            }
        }
        stmt
    }

    fn build_expr_stmt(&mut self, expr: TsNode<'a>, stmt_node: TsNode<'a>) -> Stmt {
        match expr.kind() {
            "assignment" => {
                let mut stmt = Stmt::new(StmtKind::Assign, span_of(stmt_node));
                if let Some(left) = expr.child_by_field_name("left") {
                    self.collect_targets(left, &mut stmt);
                }
                if let Some(right) = expr.child_by_field_name("right") {
                    let mut info = ExprInfo::default();
                    self.analyze_expr(right, &mut info);
                    let bound = stmt.defs.first().cloned();
                    if let Some(bound) = bound {
                        // Bind the result of the outermost RHS value
                        if right.kind() == "call" {
                            if let Some(call) = info.calls.last_mut() {
                                call.assigned_to = Some(bound.clone());
                            }
                        }
                        if matches!(
                            right.kind(),
                            "dictionary" | "list" | "set" | "tuple" | "lambda"
                        ) {
                            if let Some(alloc) = info.allocs.last_mut() {
                                alloc.var = Some(bound.clone());
                            }
                        }
                        if right.kind() == "subscript" {
                            if let Some(call) = info.calls.last_mut() {
                                call.assigned_to = Some(bound);
                            }
                        }
                    }
                    self.apply_expr_info(&mut stmt, info);
                }
                stmt
            }
            "augmented_assignment" => {
                let mut stmt = Stmt::new(StmtKind::AugAssign, span_of(stmt_node));
                if let Some(left) = expr.child_by_field_name("left") {
                    self.collect_targets(left, &mut stmt);
                    // Augmented targets are read as well
                    let mut info = ExprInfo::default();
                    self.analyze_expr(left, &mut info);
                    self.apply_expr_info(&mut stmt, info);
                }
                if let Some(right) = expr.child_by_field_name("right") {
                    let mut info = ExprInfo::default();
                    self.analyze_expr(right, &mut info);
                    self.apply_expr_info(&mut stmt, info);
                }
                stmt
            }
            _ => {
                let mut stmt = Stmt::new(StmtKind::Expr, span_of(stmt_node));
                let mut info = ExprInfo::default();
                self.analyze_expr(expr, &mut info);
                self.apply_expr_info(&mut stmt, info);
                stmt
            }
        }
    }

    /// Assignment target extraction: identifiers define, attribute and
    /// subscript targets become field writes
    fn collect_targets(&mut self, target: TsNode<'a>, stmt: &mut Stmt) {
        match target.kind() {
            "identifier" => stmt.defs.push(self.text(target)),
            "attribute" => {
                if let (Some(object), Some(attr)) = (
                    target.child_by_field_name("object"),
                    target.child_by_field_name("attribute"),
                ) {
                    if let Some(base) = self.dotted(object) {
                        if let Some(root) = base.split('.').next() {
                            stmt.uses.push(root.to_string());
                        }
                        stmt.field_writes.push(FieldAccess {
                            base,
                            field: self.text(attr),
                            span: span_of(target),
                        });
                    }
                }
            }
            "subscript" => {
                if let Some(value) = target.child_by_field_name("value") {
                    if let Some(base) = self.dotted(value) {
                        if let Some(root) = base.split('.').next() {
                            stmt.uses.push(root.to_string());
                        }
                        stmt.field_writes.push(FieldAccess {
                            base,
                            field: "[]".to_string(),
                            span: span_of(target),
                        });
                    }
                }
                if let Some(index) = target.child_by_field_name("subscript") {
                    let mut info = ExprInfo::default();
                    self.analyze_expr(index, &mut info);
                    stmt.uses.append(&mut info.uses);
                }
            }
            "tuple_pattern" | "list_pattern" | "pattern_list" | "tuple" | "list" => {
                let mut cursor = target.walk();
                let parts: Vec<TsNode<'a>> = target.named_children(&mut cursor).collect();
                for part in parts {
                    self.collect_targets(part, stmt);
                }
            }
            _ => {}
        }
    }

    fn target_names(&self, target: TsNode<'a>) -> Vec<String> {
        let mut names = Vec::new();
        collect_identifier_names(target, self.source, &mut names);
        names
    }

    fn apply_expr_info(&mut self, stmt: &mut Stmt, mut info: ExprInfo) {
        stmt.uses.append(&mut info.uses);
        stmt.calls.append(&mut info.calls);
        stmt.field_reads.append(&mut info.field_reads);
        stmt.allocs.append(&mut info.allocs);
        stmt.uses.dedup();
    }

    // ────────────────────────────────────────────────────────────────
    // Expressions
    // ────────────────────────────────────────────────────────────────

    fn analyze_expr(&mut self, node: TsNode<'a>, info: &mut ExprInfo) {
        match node.kind() {
            "identifier" => info.uses.push(self.text(node)),
            "attribute" => {
                if let (Some(object), Some(attr)) = (
                    node.child_by_field_name("object"),
                    node.child_by_field_name("attribute"),
                ) {
                    if let Some(base) = self.dotted(object) {
                        if let Some(root) = base.split('.').next() {
                            info.uses.push(root.to_string());
                        }
                        info.field_reads.push(FieldAccess {
                            base,
                            field: self.text(attr),
                            span: span_of(node),
                        });
                    } else {
                        self.analyze_expr(object, info);
                    }
                }
            }
            "call" => {
                let function = node.child_by_field_name("function");
                let callee = function.and_then(|f| self.dotted(f));

                // Dynamic callee (call result, subscript, ...) still
                // contributes its reads
                if callee.is_none() {
                    if let Some(f) = function {
                        self.analyze_expr(f, info);
                    }
                }

                let mut args = Vec::new();
                if let Some(arg_list) = node.child_by_field_name("arguments") {
                    let mut cursor = arg_list.walk();
                    let arg_nodes: Vec<TsNode<'a>> =
                        arg_list.named_children(&mut cursor).collect();
                    for arg in arg_nodes {
                        let value = if arg.kind() == "keyword_argument" {
                            arg.child_by_field_name("value")
                        } else {
                            Some(arg)
                        };
                        let Some(value) = value else { continue };
                        args.push(self.arg_value(value, info));
                    }
                }

                if let Some(callee) = callee {
                    let base = callee.rsplit_once('.').map(|(b, _)| b.to_string());
                    if let Some(root) = callee.split('.').next() {
                        info.uses.push(root.to_string());
                    }
                    info.calls.push(CallSite {
                        callee,
                        base,
                        args,
                        assigned_to: None,
                        span: span_of(node),
                    });
                }
            }
            "subscript" => {
                // `x[k]` lowers to `x.__getitem__` so the rule catalog
                // can key subscript reads by FQN
                if let Some(value) = node.child_by_field_name("value") {
                    if let Some(base) = self.dotted(value) {
                        if let Some(root) = base.split('.').next() {
                            info.uses.push(root.to_string());
                        }
                        let mut args = Vec::new();
                        if let Some(index) = node.child_by_field_name("subscript") {
                            args.push(self.arg_value(index, info));
                        }
                        info.calls.push(CallSite {
                            callee: format!("{}.__getitem__", base),
                            base: Some(base),
                            args,
                            assigned_to: None,
                            span: span_of(node),
                        });
                    } else {
                        self.analyze_expr(value, info);
                        if let Some(index) = node.child_by_field_name("subscript") {
                            self.analyze_expr(index, info);
                        }
                    }
                }
            }
            "dictionary" => {
                info.allocs.push(AllocSite {
                    var: None,
                    kind: AllocKind::Dict,
                    captures: Vec::new(),
                    span: span_of(node),
                });
                self.analyze_children(node, info);
            }
            "list" => {
                info.allocs.push(AllocSite {
                    var: None,
                    kind: AllocKind::List,
                    captures: Vec::new(),
                    span: span_of(node),
                });
                self.analyze_children(node, info);
            }
            "set" => {
                info.allocs.push(AllocSite {
                    var: None,
                    kind: AllocKind::Set,
                    captures: Vec::new(),
                    span: span_of(node),
                });
                self.analyze_children(node, info);
            }
            "tuple" => {
                info.allocs.push(AllocSite {
                    var: None,
                    kind: AllocKind::Tuple,
                    captures: Vec::new(),
                    span: span_of(node),
                });
                self.analyze_children(node, info);
            }
            "lambda" => {
                let mut captures = Vec::new();
                if let Some(body) = node.child_by_field_name("body") {
                    collect_identifier_names(body, self.source, &mut captures);
                }
                let params: Vec<String> = node
                    .child_by_field_name("parameters")
                    .map(|p| {
                        let mut names = Vec::new();
                        collect_identifier_names(p, self.source, &mut names);
                        names
                    })
                    .unwrap_or_default();
                captures.retain(|c| !params.contains(c));
                captures.sort();
                captures.dedup();
                info.allocs.push(AllocSite {
                    var: None,
                    kind: AllocKind::Closure,
                    captures,
                    span: span_of(node),
                });
            }
            "string" | "integer" | "float" | "none" | "true" | "false" | "ellipsis" => {}
            _ => self.analyze_children(node, info),
        }
    }

    fn analyze_children(&mut self, node: TsNode<'a>, info: &mut ExprInfo) {
        let mut cursor = node.walk();
        let children: Vec<TsNode<'a>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.analyze_expr(child, info);
        }
    }

    fn arg_value(&mut self, value: TsNode<'a>, info: &mut ExprInfo) -> ArgValue {
        match value.kind() {
            "identifier" => {
                let name = self.text(value);
                info.uses.push(name.clone());
                ArgValue::Var(name)
            }
            "none" => ArgValue::NoneLiteral,
            "string" => ArgValue::StrLiteral,
            "integer" | "float" => ArgValue::NumLiteral,
            _ => {
                self.analyze_expr(value, info);
                ArgValue::Other
            }
        }
    }

    // ────────────────────────────────────────────────────────────────
    // Derived nodes and edges
    // ────────────────────────────────────────────────────────────────

    /// Variable nodes + READS/WRITES edges for one function
    fn emit_local_variables(
        &mut self,
        body: &FunctionBody,
        func_id: &str,
        func_fqn: &str,
    ) {
        let mut var_ids: HashMap<String, String> = HashMap::new();

        // Parameters already have nodes
        for node in &self.nodes {
            if node.kind == NodeKind::Parameter && node.parent_id.as_deref() == Some(func_id) {
                if let Some(name) = &node.name {
                    var_ids.insert(name.clone(), node.id.clone());
                }
            }
        }

        for stmt in body.iter_preorder() {
            // Nested defs own a Function/Class node already
            if stmt.kind == StmtKind::NestedDef {
                continue;
            }
            for def in &stmt.defs {
                if !var_ids.contains_key(def) {
                    let var_fqn = format!("{}.{}", func_fqn, def);
                    let var_id =
                        Node::stable_id(self.repo_id, &var_fqn, NodeKind::Variable, stmt.span);
                    self.nodes.push(
                        Node::new(&var_id, NodeKind::Variable, &var_fqn, self.file_path, stmt.span)
                            .with_parent(func_id),
                    );
                    self.edges
                        .push(Edge::new(func_id, &var_id, EdgeKind::Contains));
                    var_ids.insert(def.clone(), var_id);
                }
                if let Some(var_id) = var_ids.get(def) {
                    self.edges
                        .push(Edge::new(func_id, var_id, EdgeKind::Writes).with_span(stmt.span));
                }
            }
            for used in &stmt.uses {
                if let Some(var_id) = var_ids.get(used) {
                    self.edges
                        .push(Edge::new(func_id, var_id, EdgeKind::Reads).with_span(stmt.span));
                }
            }
        }
    }

    /// CALLS edges: intra-file targets link directly, everything else is
    /// left for the cross-file resolver
    fn link_calls(&mut self) {
        let mut new_edges = Vec::new();
        for body in &self.bodies {
            for stmt in body.iter_preorder() {
                for call in &stmt.calls {
                    let target = if !call.callee.contains('.') {
                        self.module_functions.get(&call.callee).cloned()
                    } else {
                        None
                    };
                    let edge = match target {
                        Some(target_id) => {
                            Edge::new(&body.function_id, target_id, EdgeKind::Calls)
                                .with_span(call.span)
                                .with_attr("callee", Value::String(call.callee.clone()))
                        }
                        None => Edge::new(
                            &body.function_id,
                            format!("unresolved:call:{}", call.callee),
                            EdgeKind::Calls,
                        )
                        .with_span(call.span)
                        .with_attr("callee", Value::String(call.callee.clone())),
                    };
                    new_edges.push(edge);
                }
            }
        }
        self.edges.append(&mut new_edges);
    }
}


/// Every identifier name under a node (used for pattern targets and
/// closure capture approximation)
fn collect_identifier_names(node: TsNode<'_>, source: &[u8], out: &mut Vec<String>) {
    if node.kind() == "identifier" {
        if let Ok(text) = node.utf8_text(source) {
            out.push(text.to_string());
        }
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_identifier_names(child, source, out);
    }
}

/// Variables a body reads that it neither defines nor receives
fn free_variables(body: &FunctionBody) -> Vec<String> {
    let mut bound: Vec<&str> = body.params.iter().map(|s| s.as_str()).collect();
    for stmt in body.iter_preorder() {
        bound.extend(stmt.defs.iter().map(|s| s.as_str()));
    }
    let mut free = Vec::new();
    for stmt in body.iter_preorder() {
        for used in &stmt.uses {
            if !bound.contains(&used.as_str()) && !free.contains(used) {
                free.push(used.clone());
            }
        }
    }
    free
}
