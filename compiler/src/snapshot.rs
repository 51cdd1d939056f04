// snapshot.rs — Graph snapshot container: loading and copy-on-write editing
//
// `GraphSnapshot` owns one version of the graph together with the id
// allocator for that graph. Loading turns the loosely-shaped wire JSON into
// normalized records; each editing operation replaces the affected list with
// a new one and re-synchronizes cached argument types.
//
// Preconditions: none.
// Postconditions: after every successful edit, cached argument types are
//                 consistent with their referenced declarations.
// Failure modes: unreadable files and malformed JSON yield `SnapshotError`;
//                edits naming unknown nodes or out-of-range indices yield
//                `EditError` and leave the snapshot unchanged.
// Side effects: `load_snapshot` reads one file; rejected edits log at warn.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diag::{Diagnostic, Location};
use crate::graph::{Argument, Edge, Node, NodeId, OutputParam, PipelineParam, Returns, TypeTag};
use crate::id::IdAllocator;
use crate::normalize::{
    self, normalize_arguments, normalize_outputs, value_to_raw, ArgumentPatch, EditError,
    OutputPatch, RawArgument, RawOutput,
};
use crate::type_sync::sync_nodes;

/// Label given to nodes added without one.
pub const NEW_NODE_LABEL: &str = "New Component";
/// Component type given to nodes added without one.
pub const NEW_NODE_TYPE: &str = "blank";

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ── Wire records ────────────────────────────────────────────────────────────

/// A snapshot as the editing surface exports it. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSnapshot {
    pub pipeline_name: Option<String>,
    pub pipeline_params: Vec<RawParam>,
    pub nodes: Vec<RawNode>,
    pub edges: Vec<RawEdge>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawParam {
    pub key: Option<String>,
    #[serde(rename = "type")]
    pub ty: Option<String>,
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawNode {
    pub id: Option<String>,
    pub label: Option<String>,
    pub component_type: Option<String>,
    pub base_image: Option<String>,
    pub args: Vec<RawArgument>,
    pub outputs: Vec<RawOutput>,
    pub return_type: Option<String>,
    #[serde(alias = "codeString")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawEdge {
    pub source: Option<String>,
    pub target: Option<String>,
}

fn declared_type(raw: Option<&String>) -> TypeTag {
    raw.filter(|t| !t.is_empty())
        .map(|t| TypeTag::parse(t))
        .unwrap_or_default()
}

// ── Snapshot ────────────────────────────────────────────────────────────────

/// One version of the graph.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub pipeline_name: String,
    pub pipeline_params: Vec<PipelineParam>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(skip)]
    ids: IdAllocator,
}

/// A loaded snapshot plus the repairs made while loading.
#[derive(Debug)]
pub struct LoadResult {
    pub snapshot: GraphSnapshot,
    pub diagnostics: Vec<Diagnostic>,
}

/// Read a snapshot file without normalizing it.
pub fn read_raw(path: &Path) -> Result<RawSnapshot, SnapshotError> {
    let text = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_raw(&text)
}

pub fn parse_raw(text: &str) -> Result<RawSnapshot, SnapshotError> {
    Ok(serde_json::from_str(text)?)
}

/// Read and normalize a snapshot file.
pub fn load_snapshot(path: &Path) -> Result<LoadResult, SnapshotError> {
    Ok(GraphSnapshot::from_raw(&read_raw(path)?))
}

/// Parse and normalize a snapshot from JSON text.
pub fn from_json(text: &str) -> Result<LoadResult, SnapshotError> {
    Ok(GraphSnapshot::from_raw(&parse_raw(text)?))
}

/// A value an argument can be wired to, as offered to the editing surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SourceOption {
    Pipeline {
        key: String,
        #[serde(rename = "type")]
        ty: TypeTag,
    },
    #[serde(rename_all = "camelCase")]
    Node { node_id: NodeId, label: String },
    #[serde(rename_all = "camelCase")]
    NodeOutput {
        node_id: NodeId,
        label: String,
        output_name: String,
        #[serde(rename = "type")]
        ty: TypeTag,
    },
}

impl GraphSnapshot {
    pub fn new(pipeline_name: &str) -> Self {
        GraphSnapshot {
            pipeline_name: pipeline_name.to_string(),
            ..Default::default()
        }
    }

    /// Normalize wire records. Types are not synchronized here.
    pub fn from_raw(raw: &RawSnapshot) -> LoadResult {
        let mut ids = IdAllocator::new();
        let mut diagnostics = Vec::new();

        let pipeline_params = raw
            .pipeline_params
            .iter()
            .map(|p| PipelineParam {
                key: p.key.clone().unwrap_or_default(),
                ty: declared_type(p.ty.as_ref()),
                default: p
                    .value
                    .as_ref()
                    .map(value_to_raw)
                    .filter(|v| !v.is_empty()),
            })
            .collect();

        let taken: HashSet<String> = raw
            .nodes
            .iter()
            .filter_map(|n| n.id.clone())
            .filter(|id| !id.is_empty())
            .collect();

        let mut nodes = Vec::with_capacity(raw.nodes.len());
        for r in &raw.nodes {
            let id = match r.id.as_deref() {
                Some(id) if !id.is_empty() => NodeId::from(id),
                _ => ids.alloc_node(&taken),
            };
            let label = r.label.clone().unwrap_or_default();
            let shown = if label.is_empty() { id.as_str() } else { label.as_str() };
            let at = Location::node(id.as_str(), shown);
            let args = normalize_arguments(&r.args, &mut ids, &at);
            diagnostics.extend(args.diagnostics);
            let outputs = normalize_outputs(&r.outputs, &mut ids, &at);
            diagnostics.extend(outputs.diagnostics);
            nodes.push(Node {
                id,
                label,
                component_type: r.component_type.clone().unwrap_or_default(),
                base_image: r.base_image.clone().unwrap_or_default(),
                args: args.items,
                returns: Returns::from_outputs(
                    outputs.items,
                    declared_type(r.return_type.as_ref()),
                ),
                code: r.code.clone().unwrap_or_default(),
            });
        }

        let edges = raw
            .edges
            .iter()
            .map(|e| Edge {
                source: NodeId(e.source.clone().unwrap_or_default()),
                target: NodeId(e.target.clone().unwrap_or_default()),
            })
            .collect();

        LoadResult {
            snapshot: GraphSnapshot {
                pipeline_name: raw.pipeline_name.clone().unwrap_or_default(),
                pipeline_params,
                nodes,
                edges,
                ids,
            },
            diagnostics,
        }
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        crate::graph::find_node(&self.nodes, id)
    }

    /// Refresh cached argument types. Returns true when anything changed.
    pub fn sync_types(&mut self) -> bool {
        match sync_nodes(&self.nodes, &self.pipeline_params) {
            Some(next) => {
                self.nodes = next;
                true
            }
            None => false,
        }
    }

    /// SHA-256 fingerprint of the snapshot's canonical JSON.
    pub fn fingerprint(&self) -> [u8; 32] {
        crate::codegen::fingerprint(
            &self.nodes,
            &self.edges,
            &self.pipeline_params,
            &self.pipeline_name,
        )
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Every pipeline parameter, node and named node output an argument
    /// could reference.
    pub fn available_sources(&self) -> Vec<SourceOption> {
        let params = self
            .pipeline_params
            .iter()
            .filter(|p| !p.key.is_empty())
            .map(|p| SourceOption::Pipeline {
                key: p.key.clone(),
                ty: p.ty.clone(),
            });
        let nodes = self.nodes.iter().map(|n| SourceOption::Node {
            node_id: n.id.clone(),
            label: n.display_name().to_string(),
        });
        let outputs = self.nodes.iter().flat_map(|n| {
            n.returns.outputs().iter().map(move |o| SourceOption::NodeOutput {
                node_id: n.id.clone(),
                label: n.display_name().to_string(),
                output_name: o.name.clone(),
                ty: o.kind.clone(),
            })
        });
        params.chain(nodes).chain(outputs).collect()
    }

    // ── Node edits ──────────────────────────────────────────────────────

    /// Append a node built from `template` and return its id. Missing label
    /// and component type take the new-node defaults; a missing or taken id
    /// is replaced with a fresh one.
    pub fn add_node(&mut self, template: &RawNode) -> NodeId {
        let taken: HashSet<String> = self.nodes.iter().map(|n| n.id.0.clone()).collect();
        let id = match template.id.as_deref() {
            Some(id) if !id.is_empty() && !taken.contains(id) => NodeId::from(id),
            _ => self.ids.alloc_node(&taken),
        };
        let label = template
            .label
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| NEW_NODE_LABEL.to_string());
        let at = Location::node(id.as_str(), &label);
        let args = normalize_arguments(&template.args, &mut self.ids, &at);
        let outputs = normalize_outputs(&template.outputs, &mut self.ids, &at);

        let mut nodes = self.nodes.clone();
        nodes.push(Node {
            id: id.clone(),
            label,
            component_type: template
                .component_type
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| NEW_NODE_TYPE.to_string()),
            base_image: template.base_image.clone().unwrap_or_default(),
            args: args.items,
            returns: Returns::from_outputs(
                outputs.items,
                declared_type(template.return_type.as_ref()),
            ),
            code: template.code.clone().unwrap_or_default(),
        });
        self.nodes = nodes;
        self.sync_types();
        id
    }

    /// Remove a node and every edge touching it. Arguments elsewhere that
    /// reference it are kept; validation reports them.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<(), EditError> {
        self.position(id)?;
        self.nodes = self.nodes.iter().filter(|n| &n.id != id).cloned().collect();
        self.edges = self.edges.iter().filter(|e| !e.touches(id)).cloned().collect();
        Ok(())
    }

    pub fn rename_node(&mut self, id: &NodeId, label: &str) -> Result<(), EditError> {
        self.update_node(id, |node| node.label = label.to_string())
    }

    pub fn set_base_image(&mut self, id: &NodeId, image: &str) -> Result<(), EditError> {
        self.update_node(id, |node| node.base_image = image.to_string())
    }

    pub fn set_code(&mut self, id: &NodeId, code: &str) -> Result<(), EditError> {
        self.update_node(id, |node| node.code = code.to_string())
    }

    /// Set the anonymous return type. Ignored while the node declares named
    /// outputs, which take precedence.
    pub fn set_return_type(&mut self, id: &NodeId, ty: TypeTag) -> Result<(), EditError> {
        self.update_node(id, |node| {
            if matches!(node.returns, Returns::Single(_)) {
                node.returns = Returns::Single(ty);
            } else {
                tracing::debug!(node = %node.id, "return type ignored; node has named outputs");
            }
        })?;
        self.sync_types();
        Ok(())
    }

    // ── Argument edits ──────────────────────────────────────────────────

    /// Replace a node's argument list with normalized `raw` records.
    pub fn set_arguments(
        &mut self,
        id: &NodeId,
        raw: &[RawArgument],
    ) -> Result<Vec<Diagnostic>, EditError> {
        let i = self.position(id)?;
        let node = &self.nodes[i];
        let at = Location::node(node.id.as_str(), node.display_name());
        let normalized = normalize_arguments(raw, &mut self.ids, &at);
        self.replace_args(i, normalized.items);
        Ok(normalized.diagnostics)
    }

    /// Append a fresh literal argument; returns its id.
    pub fn add_argument(&mut self, id: &NodeId) -> Result<String, EditError> {
        let i = self.position(id)?;
        let args = normalize::add_argument(&self.nodes[i].args, &mut self.ids);
        let new_id = args.last().map(|a| a.id.clone()).unwrap_or_default();
        self.replace_args(i, args);
        Ok(new_id)
    }

    pub fn patch_argument(
        &mut self,
        id: &NodeId,
        index: usize,
        patch: &ArgumentPatch,
    ) -> Result<(), EditError> {
        let i = self.position(id)?;
        let args = normalize::patch_argument(&self.nodes[i].args, index, patch)?;
        self.replace_args(i, args);
        Ok(())
    }

    pub fn move_argument(&mut self, id: &NodeId, from: usize, to: usize) -> Result<(), EditError> {
        let i = self.position(id)?;
        let args = normalize::move_entry(&self.nodes[i].args, from, to)?;
        self.replace_args(i, args);
        Ok(())
    }

    pub fn remove_argument(&mut self, id: &NodeId, index: usize) -> Result<(), EditError> {
        let i = self.position(id)?;
        let args = normalize::remove_entry(&self.nodes[i].args, index)?;
        self.replace_args(i, args);
        Ok(())
    }

    // ── Output edits ────────────────────────────────────────────────────

    /// Append a fresh `Output[Dataset]` output; returns its id.
    pub fn add_output(&mut self, id: &NodeId) -> Result<String, EditError> {
        let i = self.position(id)?;
        let outputs = normalize::add_output(self.nodes[i].returns.outputs(), &mut self.ids);
        let new_id = outputs.last().map(|o| o.id.clone()).unwrap_or_default();
        self.replace_outputs(i, outputs);
        Ok(new_id)
    }

    pub fn patch_output(
        &mut self,
        id: &NodeId,
        index: usize,
        patch: &OutputPatch,
    ) -> Result<(), EditError> {
        let i = self.position(id)?;
        let outputs = normalize::patch_output(self.nodes[i].returns.outputs(), index, patch)?;
        self.replace_outputs(i, outputs);
        Ok(())
    }

    pub fn move_output(&mut self, id: &NodeId, from: usize, to: usize) -> Result<(), EditError> {
        let i = self.position(id)?;
        let outputs = normalize::move_entry(self.nodes[i].returns.outputs(), from, to)?;
        self.replace_outputs(i, outputs);
        Ok(())
    }

    pub fn remove_output(&mut self, id: &NodeId, index: usize) -> Result<(), EditError> {
        let i = self.position(id)?;
        let outputs = normalize::remove_entry(self.nodes[i].returns.outputs(), index)?;
        self.replace_outputs(i, outputs);
        Ok(())
    }

    // ── Pipeline-level edits ────────────────────────────────────────────

    pub fn set_pipeline_name(&mut self, name: &str) {
        self.pipeline_name = name.to_string();
    }

    pub fn set_pipeline_params(&mut self, params: Vec<PipelineParam>) {
        self.pipeline_params = params;
        self.sync_types();
    }

    /// Add an ordering edge. Returns false when the edge already exists.
    pub fn connect(&mut self, source: &NodeId, target: &NodeId) -> Result<bool, EditError> {
        self.position(source)?;
        self.position(target)?;
        let edge = Edge {
            source: source.clone(),
            target: target.clone(),
        };
        if self.edges.contains(&edge) {
            return Ok(false);
        }
        let mut edges = self.edges.clone();
        edges.push(edge);
        self.edges = edges;
        Ok(true)
    }

    /// Remove an ordering edge. Returns false when there was none.
    pub fn disconnect(&mut self, source: &NodeId, target: &NodeId) -> bool {
        let before = self.edges.len();
        self.edges = self
            .edges
            .iter()
            .filter(|e| !(&e.source == source && &e.target == target))
            .cloned()
            .collect();
        self.edges.len() != before
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn position(&self, id: &NodeId) -> Result<usize, EditError> {
        self.nodes.iter().position(|n| &n.id == id).ok_or_else(|| {
            tracing::warn!(node = %id, "edit names an unknown node; ignored");
            EditError::UnknownNode(id.clone())
        })
    }

    fn update_node(&mut self, id: &NodeId, f: impl FnOnce(&mut Node)) -> Result<(), EditError> {
        let i = self.position(id)?;
        let mut nodes = self.nodes.clone();
        f(&mut nodes[i]);
        self.nodes = nodes;
        Ok(())
    }

    fn replace_args(&mut self, i: usize, args: Vec<Argument>) {
        let mut nodes = self.nodes.clone();
        nodes[i].args = args;
        self.nodes = nodes;
        self.sync_types();
    }

    fn replace_outputs(&mut self, i: usize, outputs: Vec<OutputParam>) {
        let mut nodes = self.nodes.clone();
        nodes[i].returns = Returns::from_outputs(outputs, TypeTag::default());
        self.nodes = nodes;
        self.sync_types();
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
