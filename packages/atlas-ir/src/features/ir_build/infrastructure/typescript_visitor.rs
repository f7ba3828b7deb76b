//! TypeScript/JavaScript structural extraction
//!
//! Covers declarations, imports, class heritage, and call sites. The
//! statement-tree detail of the Python extractor is not mirrored here;
//! TS functions carry empty bodies and the semantic stages skip them.

use crate::features::ir_build::infrastructure::fqn::{module_path, FqnBuilder};
use crate::shared::models::{Edge, EdgeKind, Node, NodeKind, Span, Value};
use std::collections::HashMap;
use tree_sitter::Node as TsNode;

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

pub struct TypeScriptVisitor<'a> {
    source: &'a [u8],
    file_path: &'a str,
    repo_id: &'a str,

    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub degraded: bool,

    file_node_id: String,
    local_functions: HashMap<String, String>,
}

impl<'a> TypeScriptVisitor<'a> {
    pub fn new(source: &'a str, file_path: &'a str, repo_id: &'a str) -> Self {
        Self {
            source: source.as_bytes(),
            file_path,
            repo_id,
            nodes: Vec::new(),
            edges: Vec::new(),
            degraded: false,
            file_node_id: String::new(),
            local_functions: HashMap::new(),
        }
    }

    pub fn run(mut self, root: TsNode<'a>) -> (Vec<Node>, Vec<Edge>, bool) {
        let fqn = FqnBuilder::for_module(self.file_path);
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

        let file_id = self.file_node_id.clone();
        let mut builder = FqnBuilder::for_module(self.file_path);
        self.visit_scope(root, &file_id, &mut builder);

        (self.nodes, self.edges, self.degraded)
    }

    fn text(&self, node: TsNode<'_>) -> String {
        node.utf8_text(self.source).unwrap_or_default().to_string()
    }

    fn visit_scope(&mut self, scope: TsNode<'a>, parent_id: &str, fqn: &mut FqnBuilder) {
        let mut cursor = scope.walk();
        let children: Vec<TsNode<'a>> = scope.named_children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "export_statement" => {
                    // Unwrap `export` and visit the inner declaration
                    self.visit_scope(child, parent_id, fqn);
                }
                "function_declaration" | "generator_function_declaration" => {
                    self.visit_function(child, parent_id, fqn, NodeKind::Function);
                }
                "class_declaration" | "abstract_class_declaration" => {
                    self.visit_class(child, parent_id, fqn);
                }
                "interface_declaration" => {
                    self.visit_named(child, parent_id, fqn, NodeKind::Interface);
                }
                "enum_declaration" => {
                    self.visit_named(child, parent_id, fqn, NodeKind::Enum);
                }
                "import_statement" => {
                    self.visit_import(child);
                }
                "lexical_declaration" | "variable_declaration" => {
                    self.visit_variables(child, parent_id, fqn);
                }
                _ => {}
            }
        }
    }

    fn declared_name(&self, node: TsNode<'a>) -> Option<String> {
        node.child_by_field_name("name").map(|n| self.text(n))
    }

    fn visit_named(
        &mut self,
        node: TsNode<'a>,
        parent_id: &str,
        fqn: &mut FqnBuilder,
        kind: NodeKind,
    ) {
        let Some(name) = self.declared_name(node) else {
            self.degraded = true;
            return;
        };
        let sym_fqn = fqn.child(&name);
        let span = span_of(node);
        let id = Node::stable_id(self.repo_id, &sym_fqn, kind, span);
        self.nodes
            .push(Node::new(&id, kind, &sym_fqn, self.file_path, span).with_parent(parent_id));
        self.edges.push(Edge::new(parent_id, &id, EdgeKind::Contains));
    }

    fn visit_function(
        &mut self,
        node: TsNode<'a>,
        parent_id: &str,
        fqn: &mut FqnBuilder,
        kind: NodeKind,
    ) {
        let Some(name) = self.declared_name(node) else {
            self.degraded = true;
            return;
        };
        let func_fqn = fqn.child(&name);
        let span = span_of(node);
        let func_id = Node::stable_id(self.repo_id, &func_fqn, kind, span);

        let params = node
            .child_by_field_name("parameters")
            .map(|p| self.text(p))
            .unwrap_or_default();

        self.nodes.push(
            Node::new(&func_id, kind, &func_fqn, self.file_path, span)
                .with_parent(parent_id)
                .with_attr("signature", Value::String(format!("{}{}", name, params))),
        );
        self.edges
            .push(Edge::new(parent_id, &func_id, EdgeKind::Contains));
        self.local_functions.insert(name, func_id.clone());

        if let Some(body) = node.child_by_field_name("body") {
            self.collect_calls(body, &func_id);
        }
    }

    fn visit_class(&mut self, node: TsNode<'a>, parent_id: &str, fqn: &mut FqnBuilder) {
        let Some(name) = self.declared_name(node) else {
            self.degraded = true;
            return;
        };
        let class_fqn = fqn.child(&name);
        let span = span_of(node);
        let class_id = Node::stable_id(self.repo_id, &class_fqn, NodeKind::Class, span);

        self.nodes.push(
            Node::new(&class_id, NodeKind::Class, &class_fqn, self.file_path, span)
                .with_parent(parent_id),
        );
        self.edges
            .push(Edge::new(parent_id, &class_id, EdgeKind::Contains));

        // extends / implements clauses
        let mut cursor = node.walk();
        let heritage: Vec<TsNode<'a>> = node
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "class_heritage")
            .collect();
        for clause in heritage {
            let mut hcursor = clause.walk();
            let parts: Vec<TsNode<'a>> = clause.named_children(&mut hcursor).collect();
            for part in parts {
                let (edge_kind, list) = match part.kind() {
                    "extends_clause" => (EdgeKind::Inherits, part),
                    "implements_clause" => (EdgeKind::Implements, part),
                    _ => continue,
                };
                let mut lcursor = list.walk();
                let types: Vec<TsNode<'a>> = list.named_children(&mut lcursor).collect();
                for ty in types {
                    let type_name = self.text(ty);
                    if type_name.is_empty() {
                        continue;
                    }
                    self.edges.push(
                        Edge::new(
                            &class_id,
                            format!("unresolved:type:{}", type_name),
                            edge_kind,
                        )
                        .with_span(span_of(ty)),
                    );
                }
            }
        }

        // Methods and fields
        if let Some(body) = node.child_by_field_name("body") {
            fqn.push(name);
            let mut bcursor = body.walk();
            let members: Vec<TsNode<'a>> = body.named_children(&mut bcursor).collect();
            for member in members {
                match member.kind() {
                    "method_definition" => {
                        if let Some(mname) = self.declared_name(member) {
                            let method_fqn = fqn.child(&mname);
                            let mspan = span_of(member);
                            let method_id = Node::stable_id(
                                self.repo_id,
                                &method_fqn,
                                NodeKind::Method,
                                mspan,
                            );
                            self.nodes.push(
                                Node::new(
                                    &method_id,
                                    NodeKind::Method,
                                    &method_fqn,
                                    self.file_path,
                                    mspan,
                                )
                                .with_parent(&class_id),
                            );
                            self.edges
                                .push(Edge::new(&class_id, &method_id, EdgeKind::Contains));
                            if let Some(mbody) = member.child_by_field_name("body") {
                                self.collect_calls(mbody, &method_id);
                            }
                        }
                    }
                    "public_field_definition" | "property_signature" => {
                        if let Some(fname) = self.declared_name(member) {
                            let field_fqn = fqn.child(&fname);
                            let fspan = span_of(member);
                            let field_id = Node::stable_id(
                                self.repo_id,
                                &field_fqn,
                                NodeKind::Field,
                                fspan,
                            );
                            self.nodes.push(
                                Node::new(
                                    &field_id,
                                    NodeKind::Field,
                                    &field_fqn,
                                    self.file_path,
                                    fspan,
                                )
                                .with_parent(&class_id),
                            );
                            self.edges
                                .push(Edge::new(&class_id, &field_id, EdgeKind::Contains));
                        }
                    }
                    _ => {}
                }
            }
            fqn.pop();
        }
    }

    fn visit_variables(&mut self, node: TsNode<'a>, parent_id: &str, fqn: &mut FqnBuilder) {
        let mut cursor = node.walk();
        let declarators: Vec<TsNode<'a>> = node
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "variable_declarator")
            .collect();
        for declarator in declarators {
            let Some(name) = self.declared_name(declarator) else {
                continue;
            };
            let var_fqn = fqn.child(&name);
            let span = span_of(declarator);
            let var_id = Node::stable_id(self.repo_id, &var_fqn, NodeKind::Variable, span);
            self.nodes.push(
                Node::new(&var_id, NodeKind::Variable, &var_fqn, self.file_path, span)
                    .with_parent(parent_id),
            );
            self.edges
                .push(Edge::new(parent_id, &var_id, EdgeKind::Contains));

            // Arrow functions bound to consts act as local callables
            if let Some(value) = declarator.child_by_field_name("value") {
                if value.kind() == "arrow_function" || value.kind() == "function_expression" {
                    self.local_functions.insert(name, var_id.clone());
                    if let Some(body) = value.child_by_field_name("body") {
                        self.collect_calls(body, &var_id);
                    }
                }
            }
        }
    }

    fn visit_import(&mut self, stmt: TsNode<'a>) {
        let span = span_of(stmt);
        let Some(source) = stmt.child_by_field_name("source") else {
            return;
        };
        let source_path = self.text(source);
        let source_path = source_path.trim_matches(|c| c == '"' || c == '\'' || c == '`');

        // Relative specifiers resolve against the importing module
        let target_module = if let Some(stripped) = source_path.strip_prefix("./") {
            let dir = module_path(self.file_path)
                .rsplit_once('.')
                .map(|(d, _)| d.to_string())
                .unwrap_or_default();
            if dir.is_empty() {
                module_path(&format!("{}.ts", stripped))
            } else {
                format!("{}.{}", dir, module_path(&format!("{}.ts", stripped)))
            }
        } else {
            source_path.replace('/', ".")
        };

        let mut names: Vec<(String, Option<String>)> = Vec::new();
        let mut cursor = stmt.walk();
        let clauses: Vec<TsNode<'a>> = stmt
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "import_clause")
            .collect();
        for clause in clauses {
            let mut ccursor = clause.walk();
            let parts: Vec<TsNode<'a>> = clause.named_children(&mut ccursor).collect();
            for part in parts {
                match part.kind() {
                    "identifier" => names.push((self.text(part), None)),
                    "namespace_import" => {
                        if let Some(alias) = part.named_child(0) {
                            names.push(("*".to_string(), Some(self.text(alias))));
                        }
                    }
                    "named_imports" => {
                        let mut ncursor = part.walk();
                        let specs: Vec<TsNode<'a>> = part.named_children(&mut ncursor).collect();
                        for spec in specs {
                            if spec.kind() == "import_specifier" {
                                let name = spec
                                    .child_by_field_name("name")
                                    .map(|n| self.text(n))
                                    .unwrap_or_default();
                                let alias =
                                    spec.child_by_field_name("alias").map(|a| self.text(a));
                                names.push((name, alias));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        for (name, alias) in names {
            let target_path = if name == "*" {
                target_module.clone()
            } else {
                format!("{}.{}", target_module, name)
            };
            let local_name = alias.unwrap_or_else(|| name.clone());
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

    /// CALLS edges for every call expression under `body`
    fn collect_calls(&mut self, body: TsNode<'a>, caller_id: &str) {
        let mut stack = vec![body];
        while let Some(node) = stack.pop() {
            if node.kind() == "call_expression" {
                if let Some(function) = node.child_by_field_name("function") {
                    let callee = self.text(function);
                    if !callee.is_empty() && !callee.contains('(') {
                        let target = if !callee.contains('.') {
                            self.local_functions.get(&callee).cloned()
                        } else {
                            None
                        };
                        let edge = match target {
                            Some(target_id) => Edge::new(caller_id, target_id, EdgeKind::Calls),
                            None => Edge::new(
                                caller_id,
                                format!("unresolved:call:{}", callee),
                                EdgeKind::Calls,
                            ),
                        };
                        self.edges.push(
                            edge.with_span(span_of(node))
                                .with_attr("callee", Value::String(callee)),
                        );
                    }
                }
            }
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                stack.push(child);
            }
        }
    }
}
