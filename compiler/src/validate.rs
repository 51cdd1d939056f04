// validate.rs — Cross-reference checks for graph snapshots
//
// Checks that every node carries a label and component type, that every
// argument reference resolves, and that edges connect existing nodes.
// Repeated edges and edges from a node to itself are reported as warnings.
//
// Preconditions: none.
// Postconditions: returns every violation found; checking never stops early.
// Failure modes: none. Violations are data, not errors.
// Side effects: none.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::diag::{codes, Diagnostic, Location};
use crate::graph::{ArgSource, Edge, Node, NodeId, PipelineParam, Returns};

// ── Public types ────────────────────────────────────────────────────────────

/// Outcome of validation. `valid` holds exactly when `errors` is empty.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Human-readable error messages naming node and argument.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(Diagnostic::contextual_message).collect()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        let mut all = self.errors;
        all.extend(self.warnings);
        all
    }
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Validate a graph snapshot.
pub fn validate(nodes: &[Node], edges: &[Edge], params: &[PipelineParam]) -> ValidationResult {
    let mut ctx = ValidateCtx::new(nodes, params);
    ctx.check_graph_shape();
    for node in nodes {
        ctx.check_node(node);
    }
    for edge in edges {
        ctx.check_edge(edge);
    }
    ctx.build_result()
}

// ── Internal context ────────────────────────────────────────────────────────

struct ValidateCtx<'a> {
    nodes: &'a [Node],
    by_id: HashMap<&'a NodeId, &'a Node>,
    param_keys: HashSet<&'a str>,
    seen_edges: HashSet<(&'a NodeId, &'a NodeId)>,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl<'a> ValidateCtx<'a> {
    fn new(nodes: &'a [Node], params: &'a [PipelineParam]) -> Self {
        let mut by_id = HashMap::new();
        for node in nodes {
            // First occurrence wins; duplicates are reported separately.
            by_id.entry(&node.id).or_insert(node);
        }
        ValidateCtx {
            nodes,
            by_id,
            param_keys: params.iter().map(|p| p.key.as_str()).collect(),
            seen_edges: HashSet::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn build_result(self) -> ValidationResult {
        ValidationResult {
            valid: self.errors.is_empty(),
            errors: self.errors,
            warnings: self.warnings,
        }
    }

    fn error(&mut self, diag: Diagnostic) {
        self.errors.push(diag);
    }

    fn warn(&mut self, diag: Diagnostic) {
        self.warnings.push(diag);
    }

    // ── Graph-level checks ──────────────────────────────────────────────

    fn check_graph_shape(&mut self) {
        if self.nodes.is_empty() {
            self.error(
                Diagnostic::error(Location::default(), "no nodes found")
                    .with_code(codes::E0001)
                    .with_hint("add at least one component"),
            );
        }

        let mut seen = HashSet::new();
        for node in self.nodes {
            if !seen.insert(&node.id) {
                self.error(
                    Diagnostic::error(
                        Location::node(node.id.as_str(), node.display_name()),
                        format!("duplicate node id '{}'", node.id),
                    )
                    .with_code(codes::E0102),
                );
            }
        }
    }

    // ── Node-level checks ───────────────────────────────────────────────

    fn check_node(&mut self, node: &'a Node) {
        let at = Location::node(node.id.as_str(), node.display_name());
        if node.label.trim().is_empty() {
            self.error(Diagnostic::error(at.clone(), "missing label").with_code(codes::E0100));
        }
        if node.component_type.trim().is_empty() {
            self.error(Diagnostic::error(at, "missing component type").with_code(codes::E0101));
        }

        let mut arg_ids = HashSet::new();
        for (idx, arg) in node.args.iter().enumerate() {
            let at = Location::arg(node.id.as_str(), node.display_name(), idx);
            if !arg_ids.insert(arg.id.as_str()) {
                self.error(
                    Diagnostic::error(at.clone(), format!("duplicate argument id '{}'", arg.id))
                        .with_code(codes::E0103),
                );
            }
            self.check_source(&arg.source, at);
        }
    }

    fn check_source(&mut self, source: &ArgSource, at: Location) {
        match source {
            ArgSource::Literal { .. } => {}
            ArgSource::Pipeline { key } => {
                if key.is_empty() {
                    self.error(
                        Diagnostic::error(at, "no pipeline parameter selected")
                            .with_code(codes::E0203),
                    );
                } else if !self.param_keys.contains(key.as_str()) {
                    self.error(
                        Diagnostic::error(
                            at,
                            format!("references non-existent pipeline parameter '{}'", key),
                        )
                        .with_code(codes::E0200),
                    );
                }
            }
            ArgSource::Node {
                node_id,
                output_name,
            } => {
                if node_id.as_str().is_empty() {
                    self.error(
                        Diagnostic::error(at, "no upstream node selected").with_code(codes::E0203),
                    );
                    return;
                }
                let Some(upstream) = self.by_id.get(node_id).copied() else {
                    self.error(
                        Diagnostic::error(at, format!("references non-existent node '{}'", node_id))
                            .with_code(codes::E0201),
                    );
                    return;
                };
                match output_name {
                    Some(name) if upstream.returns.find(name).is_none() => {
                        self.error(
                            Diagnostic::error(
                                at,
                                format!(
                                    "node '{}' has no output named '{}'",
                                    upstream.display_name(),
                                    name
                                ),
                            )
                            .with_code(codes::E0202),
                        );
                    }
                    None if upstream.returns.sole_type().is_none() => {
                        let count = match &upstream.returns {
                            Returns::Named(outputs) => outputs.len(),
                            Returns::Single(_) => 1,
                        };
                        self.error(
                            Diagnostic::error(
                                at,
                                format!(
                                    "node '{}' has {} outputs; select one",
                                    upstream.display_name(),
                                    count
                                ),
                            )
                            .with_code(codes::E0204),
                        );
                    }
                    _ => {}
                }
            }
        }
    }

    // ── Edge checks ─────────────────────────────────────────────────────

    fn check_edge(&mut self, edge: &'a Edge) {
        if !self.seen_edges.insert((&edge.source, &edge.target)) {
            self.warn(
                Diagnostic::warning(
                    Location::default(),
                    format!("duplicate edge {} -> {}", edge.source, edge.target),
                )
                .with_code(codes::W0301),
            );
            return;
        }
        if edge.source == edge.target {
            self.warn(
                Diagnostic::warning(
                    Location::default(),
                    format!("edge {} -> {} connects a node to itself", edge.source, edge.target),
                )
                .with_code(codes::W0302)
                .with_hint("remove the edge; a component cannot run after itself"),
            );
        }
        for (end, id) in [("source", &edge.source), ("target", &edge.target)] {
            if !self.by_id.contains_key(id) {
                self.error(
                    Diagnostic::error(
                        Location::default(),
                        format!(
                            "edge {} -> {} has non-existent {} node '{}'",
                            edge.source, edge.target, end, id
                        ),
                    )
                    .with_code(codes::E0300),
                );
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
