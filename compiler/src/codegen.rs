// codegen.rs — Kubeflow Pipelines module generation for graph snapshots
//
// Renders a graph snapshot as one Python module: provenance comments, imports,
// one `@component` function per node, the `@pipeline` entry point with one
// step per node, explicit `.after()` ordering, and a `__main__` block that
// compiles the pipeline to YAML.
//
// Preconditions: none. Unresolvable references render as `None`; run the
//                validator first to reject them.
// Postconditions: returns `CodegenResult` with the module text. The text is a
//                 pure function of the snapshot and options.
// Failure modes: an empty node list yields empty text plus error E0001.
// Side effects: none.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::diag::{codes, Diagnostic, Location};
use crate::graph::{ArgSource, ArtifactKind, Edge, Node, NodeId, PipelineParam, Returns, TypeTag};
use crate::literal::{format_literal, quote};
use crate::parser::find_header;
use crate::sanitize::{sanitize, sanitize_first, FALLBACK};
use crate::sequence::sequence;

/// Pipeline name used when the snapshot has none.
pub const DEFAULT_PIPELINE_NAME: &str = "ml_pipeline";

const INDENT: &str = "    ";

// ── Public types ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct CodegenResult {
    pub generated: GeneratedCode,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct CodegenOptions {
    /// Emit a `# Fingerprint: sha256:<hex>` provenance line.
    pub fingerprint: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        CodegenOptions { fingerprint: true }
    }
}

// ── Public entry points ─────────────────────────────────────────────────────

/// Compile a snapshot, sequencing the nodes by `edges` first.
pub fn compile(
    nodes: &[Node],
    edges: &[Edge],
    params: &[PipelineParam],
    pipeline_name: &str,
    options: &CodegenOptions,
) -> CodegenResult {
    let order = sequence(nodes, edges);
    compile_ordered(nodes, &order.nodes, edges, params, pipeline_name, options)
}

/// Compile a snapshot whose emission order has already been fixed.
///
/// `nodes` is the snapshot as authored (used for the fingerprint);
/// `ordered` is the same nodes in emission order.
pub fn compile_ordered(
    nodes: &[Node],
    ordered: &[&Node],
    edges: &[Edge],
    params: &[PipelineParam],
    pipeline_name: &str,
    options: &CodegenOptions,
) -> CodegenResult {
    if ordered.is_empty() {
        return CodegenResult {
            generated: GeneratedCode {
                source: String::new(),
            },
            diagnostics: vec![Diagnostic::error(Location::default(), "no nodes found")
                .with_code(codes::E0001)
                .with_hint("add at least one component")],
        };
    }

    let mut ctx = CodegenCtx::new(ordered, edges, params, pipeline_name);
    ctx.plan();
    ctx.emit_all(nodes, options);
    ctx.build_result()
}

/// SHA-256 of the canonical compact JSON of a snapshot.
pub fn fingerprint(
    nodes: &[Node],
    edges: &[Edge],
    params: &[PipelineParam],
    pipeline_name: &str,
) -> [u8; 32] {
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Canonical<'a> {
        pipeline_name: &'a str,
        pipeline_params: &'a [PipelineParam],
        nodes: &'a [Node],
        edges: &'a [Edge],
    }

    let canonical = serde_json::to_vec(&Canonical {
        pipeline_name,
        pipeline_params: params,
        nodes,
        edges,
    })
    .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

pub fn to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

// ── Name scope ──────────────────────────────────────────────────────────────

/// Identifiers already bound in one Python scope.
#[derive(Debug, Default)]
struct NameScope {
    taken: HashSet<String>,
}

impl NameScope {
    fn reserve(&mut self, name: &str) {
        self.taken.insert(name.to_string());
    }

    /// Bind `base`, or `base_1`, `base_2`, ... when already bound.
    fn claim(&mut self, base: &str) -> String {
        let name = if self.taken.contains(base) {
            (1..)
                .map(|n| format!("{}_{}", base, n))
                .find(|candidate| !self.taken.contains(candidate))
                .unwrap_or_else(|| base.to_string())
        } else {
            base.to_string()
        };
        self.taken.insert(name.clone());
        name
    }
}

/// Names the generated module imports from `kfp.dsl` unconditionally.
const DSL_NAMES: [&str; 2] = ["pipeline", "component"];

// ── Internal context ────────────────────────────────────────────────────────

/// Identifiers chosen for one node.
#[derive(Debug)]
struct NodePlan {
    func: String,
    step: String,
    /// Python parameter name per argument, in argument order.
    arg_names: Vec<String>,
    /// Python parameter name per named output, in output order.
    output_names: Vec<String>,
}

struct CodegenCtx<'a> {
    ordered: &'a [&'a Node],
    edges: &'a [Edge],
    params: &'a [PipelineParam],
    pipeline_name: &'a str,
    pipeline_func: String,
    /// Keyed pipeline parameters with their identifiers, in authored order.
    param_idents: Vec<(&'a PipelineParam, String)>,
    /// Pipeline parameter identifier by key (first occurrence wins).
    param_names: HashMap<&'a str, String>,
    plans: Vec<NodePlan>,
    /// Index into `plans` by node id (first occurrence wins).
    plan_index: HashMap<&'a NodeId, usize>,
    uses_any: bool,
    uses_input: bool,
    uses_output: bool,
    artifacts: HashSet<ArtifactKind>,
    out: String,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> CodegenCtx<'a> {
    fn new(
        ordered: &'a [&'a Node],
        edges: &'a [Edge],
        params: &'a [PipelineParam],
        pipeline_name: &'a str,
    ) -> Self {
        let pipeline_name = if pipeline_name.trim().is_empty() {
            DEFAULT_PIPELINE_NAME
        } else {
            pipeline_name
        };
        CodegenCtx {
            ordered,
            edges,
            params,
            pipeline_name,
            pipeline_func: sanitize(pipeline_name),
            param_idents: Vec::new(),
            param_names: HashMap::new(),
            plans: Vec::with_capacity(ordered.len()),
            plan_index: HashMap::new(),
            uses_any: false,
            uses_input: false,
            uses_output: false,
            artifacts: HashSet::new(),
            out: String::with_capacity(4096),
            diagnostics: Vec::new(),
        }
    }

    fn build_result(self) -> CodegenResult {
        CodegenResult {
            generated: GeneratedCode { source: self.out },
            diagnostics: self.diagnostics,
        }
    }

    // ── Planning ────────────────────────────────────────────────────────

    /// Allocate every module-level identifier before any text is written.
    fn plan(&mut self) {
        let mut scope = NameScope::default();
        for name in DSL_NAMES {
            scope.reserve(name);
        }
        for name in ["Input", "Output", "Any", "Compiler"] {
            scope.reserve(name);
        }
        for kind in ArtifactKind::ALL {
            scope.reserve(kind.name());
        }
        let pipeline_func = scope.claim(&self.pipeline_func);
        self.pipeline_func = pipeline_func;

        let params = self.params;
        for p in params.iter().filter(|p| !p.key.is_empty()) {
            let name = scope.claim(&sanitize(&p.key));
            self.param_names.entry(p.key.as_str()).or_insert_with(|| name.clone());
            self.param_idents.push((p, name));
        }

        let ordered = self.ordered;
        let funcs: Vec<String> = ordered
            .iter()
            .map(|node| {
                let base = sanitize_first(
                    &[node.label.as_str(), node.component_type.as_str()],
                    "component",
                );
                scope.claim(&base)
            })
            .collect();

        for (i, (&node, func)) in ordered.iter().zip(funcs).enumerate() {
            let step = scope.claim(&format!("step{}", i));
            let mut local = NameScope::default();
            let arg_names = node
                .args
                .iter()
                .map(|a| {
                    let fallback = format!("arg_{}", a.id);
                    local.claim(&sanitize_first(&[a.name.as_str(), fallback.as_str()], FALLBACK))
                })
                .collect();
            let output_names = node
                .returns
                .outputs()
                .iter()
                .map(|o| local.claim(&sanitize_first(&[o.name.as_str()], "output")))
                .collect();
            self.plan_index.entry(&node.id).or_insert(i);
            self.plans.push(NodePlan {
                func,
                step,
                arg_names,
                output_names,
            });
        }
    }

    /// Render `ty` as an annotation, recording the imports it needs.
    fn annotate(&mut self, ty: &TypeTag) -> String {
        match ty {
            TypeTag::Any => self.uses_any = true,
            TypeTag::Artifact(kind) => {
                self.artifacts.insert(*kind);
            }
            TypeTag::Input(kind) => {
                self.uses_input = true;
                self.artifacts.insert(*kind);
            }
            TypeTag::Output(kind) => {
                self.uses_output = true;
                self.artifacts.insert(*kind);
            }
            TypeTag::Scalar(_) | TypeTag::Other(_) => {}
        }
        ty.to_string()
    }

    // ── Top-level emit ──────────────────────────────────────────────────

    fn emit_all(&mut self, authored: &[Node], options: &CodegenOptions) {
        // Bodies first: annotations decide the import list.
        let components: Vec<String> = (0..self.ordered.len())
            .map(|i| self.render_component(i))
            .collect();
        let entry = self.render_pipeline();

        self.emit_provenance(authored, options);
        self.emit_imports();
        for component in &components {
            self.out.push_str(component);
            self.out.push_str("\n\n\n");
        }
        self.out.push_str(&entry);
        self.out.push_str("\n\n");
        self.emit_main();
    }

    // ── Phase 1: Provenance comments ────────────────────────────────────

    fn emit_provenance(&mut self, authored: &[Node], options: &CodegenOptions) {
        let params_json = serde_json::to_string(self.params).unwrap_or_default();
        let _ = writeln!(self.out, "# Pipeline: {}", single_line(self.pipeline_name));
        self.out.push_str("# Generated by Pipeline Builder\n");
        let _ = writeln!(self.out, "# Params: {}", params_json);
        if options.fingerprint {
            let hash = fingerprint(authored, self.edges, self.params, self.pipeline_name);
            let _ = writeln!(self.out, "# Fingerprint: sha256:{}", to_hex(&hash));
        }
        self.out.push('\n');
    }

    // ── Phase 2: Imports ────────────────────────────────────────────────

    fn emit_imports(&mut self) {
        if self.uses_any {
            self.out.push_str("from typing import Any\n");
        }
        let mut names: Vec<&str> = DSL_NAMES.to_vec();
        if self.uses_input {
            names.push("Input");
        }
        if self.uses_output {
            names.push("Output");
        }
        names.extend(
            ArtifactKind::ALL
                .iter()
                .filter(|k| self.artifacts.contains(*k))
                .map(|k| k.name()),
        );
        let _ = writeln!(self.out, "from kfp.dsl import {}", names.join(", "));
        self.out.push_str("\n\n");
    }

    // ── Phase 3: Component functions ────────────────────────────────────

    fn render_component(&mut self, i: usize) -> String {
        let node = self.ordered[i];

        let mut params = Vec::with_capacity(node.args.len());
        for (arg, name) in node.args.iter().zip(&self.plans[i].arg_names) {
            params.push((name.clone(), arg.ty.clone()));
        }
        for (output, name) in node.returns.outputs().iter().zip(&self.plans[i].output_names) {
            params.push((name.clone(), output.kind.clone()));
        }
        let param_list: Vec<String> = params
            .iter()
            .map(|(name, ty)| format!("{}: {}", name, self.annotate(ty)))
            .collect();

        let ret = match &node.returns {
            Returns::Single(ty) => self.annotate(ty),
            Returns::Named(_) => "None".to_string(),
        };

        let decorator = if node.base_image.trim().is_empty() {
            "@component()".to_string()
        } else {
            format!("@component(base_image={})", quote(node.base_image.trim()))
        };
        let header = format!(
            "{}\ndef {}({}) -> {}:",
            decorator,
            self.plans[i].func,
            param_list.join(", "),
            ret
        );

        splice_body(&header, &node.code)
    }

    // ── Phase 4: Pipeline entry point ───────────────────────────────────

    fn render_pipeline(&mut self) -> String {
        let mut out = String::new();

        // Parameters without a default must precede those with one.
        let (required, defaulted): (Vec<_>, Vec<_>) = self
            .param_idents
            .clone()
            .into_iter()
            .partition(|(p, _)| p.default.as_deref().map_or(true, str::is_empty));

        let mut sig = Vec::new();
        for (p, name) in required.into_iter().chain(defaulted) {
            let ty = self.annotate(&p.ty);
            match p.default.as_deref().filter(|d| !d.is_empty()) {
                Some(default) => {
                    sig.push(format!("{}: {} = {}", name, ty, format_literal(default, &p.ty)))
                }
                None => sig.push(format!("{}: {}", name, ty)),
            }
        }

        let _ = writeln!(out, "@pipeline(name={})", quote(self.pipeline_name));
        let _ = writeln!(out, "def {}({}):", self.pipeline_func, sig.join(", "));

        for i in 0..self.ordered.len() {
            let call = self.render_step(i);
            let _ = writeln!(out, "{}{} = {}", INDENT, self.plans[i].step, call);
        }

        let after: Vec<String> = self
            .edges
            .iter()
            .filter_map(|e| {
                let source = self.plan_index.get(&e.source)?;
                let target = self.plan_index.get(&e.target)?;
                Some(format!(
                    "{}{}.after({})",
                    INDENT, self.plans[*target].step, self.plans[*source].step
                ))
            })
            .collect();
        if !after.is_empty() {
            out.push('\n');
            for line in after {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out
    }

    fn render_step(&self, i: usize) -> String {
        let node = self.ordered[i];
        let plan = &self.plans[i];
        let kwargs: Vec<String> = node
            .args
            .iter()
            .zip(&plan.arg_names)
            .map(|(arg, name)| format!("{}={}", name, self.render_value(&arg.source, &arg.ty)))
            .collect();
        format!("{}({})", plan.func, kwargs.join(", "))
    }

    /// Python expression for an argument value. Dangling references render
    /// as `None`.
    fn render_value(&self, source: &ArgSource, ty: &TypeTag) -> String {
        match source {
            ArgSource::Literal { value } => format_literal(value, ty),
            ArgSource::Pipeline { key } => self
                .param_names
                .get(key.as_str())
                .cloned()
                .unwrap_or_else(|| "None".to_string()),
            ArgSource::Node {
                node_id,
                output_name,
            } => self
                .output_ref(node_id, output_name.as_deref())
                .unwrap_or_else(|| "None".to_string()),
        }
    }

    fn output_ref(&self, node_id: &NodeId, output_name: Option<&str>) -> Option<String> {
        let &idx = self.plan_index.get(node_id)?;
        let upstream = self.ordered[idx];
        let plan = &self.plans[idx];
        let outputs = upstream.returns.outputs();
        let pos = match (output_name, &upstream.returns) {
            (Some(name), _) => outputs.iter().position(|o| o.name == name)?,
            (None, Returns::Single(_)) => return Some(format!("{}.output", plan.step)),
            (None, Returns::Named(list)) if list.len() == 1 => 0,
            (None, Returns::Named(_)) => return None,
        };
        Some(format!("{}.outputs[{}]", plan.step, quote(&plan.output_names[pos])))
    }

    // ── Phase 5: Build invocation ───────────────────────────────────────

    fn emit_main(&mut self) {
        self.out.push_str("if __name__ == \"__main__\":\n");
        let _ = writeln!(self.out, "{}from kfp.compiler import Compiler", INDENT);
        self.out.push('\n');
        let _ = writeln!(self.out, "{}Compiler().compile(", INDENT);
        let _ = writeln!(self.out, "{}{}pipeline_func={},", INDENT, INDENT, self.pipeline_func);
        let _ = writeln!(
            self.out,
            "{}{}package_path=\"{}.yaml\"",
            INDENT, INDENT, self.pipeline_func
        );
        let _ = writeln!(self.out, "{})", INDENT);
    }
}

// ── Body handling ───────────────────────────────────────────────────────────

fn single_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

/// Combine a synthesized decorator+header with a free-form body.
///
/// A body that already has a function header keeps everything but that
/// header (and its decorators), which `header` replaces in place. Any other
/// body is dedented and indented beneath `header`.
fn splice_body(header: &str, code: &str) -> String {
    let body = trim_leading_blank_lines(code.trim_end());

    if let Some(found) = find_header(body) {
        tracing::debug!(name = %found.name, "replacing function header in component body");
        let mut out = String::with_capacity(body.len() + header.len());
        let rest = &body[found.end..];
        out.push_str(&body[..found.start]);
        out.push_str(header);
        out.push_str(rest);
        if !has_statement(rest) {
            out.push('\n');
            out.push_str(INDENT);
            out.push_str("pass");
        }
        return out;
    }

    let lines: Vec<&str> = body.lines().collect();
    let margin = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);

    let mut out = String::from(header);
    if lines.is_empty() {
        out.push('\n');
        out.push_str(INDENT);
        out.push_str("pass");
        return out;
    }
    for line in lines {
        out.push('\n');
        if !line.trim().is_empty() {
            out.push_str(INDENT);
            out.push_str(&line[margin..]);
        }
    }
    out
}

/// Whether `rest` holds anything beyond blank lines and comments.
fn has_statement(rest: &str) -> bool {
    rest.lines().any(|l| {
        let l = l.trim();
        !l.is_empty() && !l.starts_with('#')
    })
}

fn trim_leading_blank_lines(s: &str) -> &str {
    let mut start = 0;
    for line in s.split_inclusive('\n') {
        if !line.trim().is_empty() {
            break;
        }
        start += line.len();
    }
    &s[start..]
}

// ── Tests ───────────────────────────────────────────────────────────────────
