// pipeline.rs — Compilation state and pass orchestration
//
// Holds all pass artifacts and runs the minimal set of passes for a given
// terminal PassId.
//
// Preconditions: the raw snapshot must be set before calling run_pipeline.
// Postconditions: all artifacts for required passes are populated, or has_error is set.
// Failure modes: any pass emitting error-level diagnostics.
// Side effects: calls on_pass_complete callback after each pass for immediate
//               display; logs per-pass timing at debug level.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::codegen::{compile_ordered, to_hex, CodegenOptions, GeneratedCode};
use crate::diag::{codes, has_errors, Diagnostic, Location};
use crate::graph::{find_node, NodeId};
use crate::pass::{descriptor, required_passes, PassId};
use crate::sequence::sequence;
use crate::snapshot::{GraphSnapshot, RawSnapshot};
use crate::validate::{validate, ValidationResult};

// ── Artifact storage ───────────────────────────────────────────────────────

/// Provenance metadata for reproducible builds and cache-key use.
///
/// `source_hash`: SHA-256 of the snapshot file text as read.
/// `snapshot_fingerprint`: SHA-256 of the normalized snapshot's canonical JSON.
/// `compiler_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub snapshot_fingerprint: [u8; 32],
    pub compiler_version: &'static str,
}

#[derive(Serialize)]
struct ProvenanceJson<'a> {
    source_hash: String,
    snapshot_fingerprint: String,
    compiler_version: &'a str,
}

impl Provenance {
    /// Hex string of the source hash (64 characters).
    pub fn source_hash_hex(&self) -> String {
        to_hex(&self.source_hash)
    }

    /// Hex string of the snapshot fingerprint (64 characters).
    pub fn snapshot_fingerprint_hex(&self) -> String {
        to_hex(&self.snapshot_fingerprint)
    }

    /// Serialize provenance as pretty JSON for `--emit build-info`.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&ProvenanceJson {
            source_hash: self.source_hash_hex(),
            snapshot_fingerprint: self.snapshot_fingerprint_hex(),
            compiler_version: self.compiler_version,
        })
    }
}

/// Compute provenance from the snapshot file text and its normalized form.
pub fn compute_provenance(source: &str, snapshot: &GraphSnapshot) -> Provenance {
    use sha2::{Digest, Sha256};

    let source_hash = {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    };

    Provenance {
        source_hash,
        snapshot_fingerprint: snapshot.fingerprint(),
        compiler_version: env!("CARGO_PKG_VERSION"),
    }
}

/// Holds all compilation artifacts and accumulated diagnostics.
pub struct CompilationState {
    pub raw: RawSnapshot,
    pub snapshot: Option<GraphSnapshot>,
    pub validation: Option<ValidationResult>,
    pub order: Option<Vec<NodeId>>,
    pub generated: Option<GeneratedCode>,
    pub diagnostics: Vec<Diagnostic>,
    pub has_error: bool,
}

impl CompilationState {
    pub fn new(raw: RawSnapshot) -> Self {
        Self {
            raw,
            snapshot: None,
            validation: None,
            order: None,
            generated: None,
            diagnostics: Vec::new(),
            has_error: false,
        }
    }
}

// ── Error type ─────────────────────────────────────────────────────────────

/// Pipeline execution failed due to error-level diagnostics in a pass.
/// The specific diagnostics are available in `CompilationState.diagnostics`.
#[derive(Debug)]
pub struct PipelineError {
    /// The pass that produced the error.
    pub failing_pass: PassId,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pass reported errors", descriptor(self.failing_pass).name)
    }
}

impl std::error::Error for PipelineError {}

// ── Per-pass bookkeeping ───────────────────────────────────────────────────

/// Per-pass post-processing: callback, accumulate, timing, error check.
fn finish_pass(
    state: &mut CompilationState,
    pass_id: PassId,
    diags: Vec<Diagnostic>,
    elapsed: Duration,
    on_pass_complete: &mut impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    on_pass_complete(pass_id, &diags);
    let is_err = has_errors(&diags);
    state.diagnostics.extend(diags);
    tracing::debug!(
        pass = descriptor(pass_id).name,
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "pass complete"
    );
    if is_err {
        state.has_error = true;
        return Err(PipelineError {
            failing_pass: pass_id,
        });
    }
    Ok(())
}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Run the minimal set of passes to produce `terminal`.
///
/// Per-pass sequence: execute → on_pass_complete(callback) → timing → error check.
///
/// Preconditions: `state.raw` is set.
/// Postconditions: artifacts for all passes in `required_passes(terminal)` are
///   populated, or `state.has_error` is true and later passes did not run.
/// Failure modes: any pass producing error-level diagnostics.
/// Side effects: calls `on_pass_complete` after each pass.
pub fn run_pipeline(
    state: &mut CompilationState,
    terminal: PassId,
    codegen_options: &CodegenOptions,
    mut on_pass_complete: impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    for pass_id in required_passes(terminal) {
        let t = Instant::now();
        let diags = match pass_id {
            PassId::Normalize => {
                let loaded = GraphSnapshot::from_raw(&state.raw);
                state.snapshot = Some(loaded.snapshot);
                loaded.diagnostics
            }
            PassId::Sync => {
                if let Some(snapshot) = state.snapshot.as_mut() {
                    snapshot.sync_types();
                }
                Vec::new()
            }
            PassId::Validate => match state.snapshot.as_ref() {
                Some(s) => {
                    let result = validate(&s.nodes, &s.edges, &s.pipeline_params);
                    let diags = result.clone().into_diagnostics();
                    state.validation = Some(result);
                    diags
                }
                None => Vec::new(),
            },
            PassId::Sequence => match state.snapshot.as_ref() {
                Some(s) => {
                    let seq = sequence(&s.nodes, &s.edges);
                    let diags = seq.cycle.as_ref().map(|stuck| cycle_warning(s, stuck));
                    state.order = Some(seq.ids());
                    diags.into_iter().collect()
                }
                None => Vec::new(),
            },
            PassId::Codegen => match (state.snapshot.as_ref(), state.order.as_ref()) {
                (Some(s), Some(order)) => {
                    let ordered: Vec<_> = order
                        .iter()
                        .filter_map(|id| find_node(&s.nodes, id))
                        .collect();
                    let result = compile_ordered(
                        &s.nodes,
                        &ordered,
                        &s.edges,
                        &s.pipeline_params,
                        &s.pipeline_name,
                        codegen_options,
                    );
                    state.generated = Some(result.generated);
                    result.diagnostics
                }
                _ => Vec::new(),
            },
        };
        finish_pass(state, pass_id, diags, t.elapsed(), &mut on_pass_complete)?;
    }
    Ok(())
}

fn cycle_warning(snapshot: &GraphSnapshot, stuck: &[NodeId]) -> Diagnostic {
    let names: Vec<&str> = stuck
        .iter()
        .map(|id| snapshot.node(id).map_or(id.as_str(), |n| n.display_name()))
        .collect();
    Diagnostic::warning(
        Location::default(),
        format!(
            "dependency cycle among {}; nodes are emitted in their original order",
            names.join(", ")
        ),
    )
    .with_code(codes::W0400)
    .with_hint("remove one of the edges between these nodes")
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::parse_raw;

    fn state(json: &str) -> CompilationState {
        CompilationState::new(parse_raw(json).unwrap())
    }

    const VALID: &str = r#"{
        "pipelineName": "demo",
        "nodes": [
            {"id": "b", "label": "Train", "componentType": "python",
             "args": [{"name": "data", "mode": "node", "nodeId": "a"}]},
            {"id": "a", "label": "Load", "componentType": "python", "returnType": "int"}
        ],
        "edges": [{"source": "a", "target": "b"}]
    }"#;

    #[test]
    fn codegen_runs_every_pass_in_order() {
        let mut st = state(VALID);
        let mut seen = Vec::new();
        run_pipeline(&mut st, PassId::Codegen, &CodegenOptions::default(), |p, _| {
            seen.push(p)
        })
        .unwrap();
        assert_eq!(seen, required_passes(PassId::Codegen));
        assert_eq!(st.order, Some(vec![NodeId::from("a"), NodeId::from("b")]));
        let code = &st.generated.unwrap().source;
        assert!(code.contains("step0 = Load()"));
        assert!(code.contains("step1 = Train(data=step0.output)"));
        assert!(st.validation.unwrap().valid);
    }

    #[test]
    fn sync_runs_before_validation() {
        let mut st = state(VALID);
        run_pipeline(&mut st, PassId::Validate, &CodegenOptions::default(), |_, _| {}).unwrap();
        let snap = st.snapshot.unwrap();
        assert_eq!(snap.nodes[0].args[0].ty.to_string(), "int");
        assert!(st.order.is_none());
        assert!(st.generated.is_none());
    }

    #[test]
    fn invalid_snapshot_stops_before_codegen() {
        let mut st = state(r#"{"nodes":[{"id":"a","label":"A","componentType":"python",
            "args":[{"name":"x","mode":"pipeline","key":"missing"}]}]}"#);
        let err = run_pipeline(&mut st, PassId::Codegen, &CodegenOptions::default(), |_, _| {})
            .unwrap_err();
        assert_eq!(err.failing_pass, PassId::Validate);
        assert!(st.has_error);
        assert!(st.generated.is_none());
        assert!(!st.validation.unwrap().valid);
        assert!(st.diagnostics.iter().any(|d| d.code == Some(codes::E0200)));
    }

    #[test]
    fn empty_snapshot_fails_validation() {
        let mut st = state("{}");
        let err = run_pipeline(&mut st, PassId::Codegen, &CodegenOptions::default(), |_, _| {})
            .unwrap_err();
        assert_eq!(err.failing_pass, PassId::Validate);
        assert_eq!(err.to_string(), "validate pass reported errors");
    }

    #[test]
    fn cycle_is_a_warning_and_code_is_still_emitted() {
        let mut st = state(r#"{"nodes":[
            {"id":"a","label":"A","componentType":"python"},
            {"id":"b","label":"B","componentType":"python"}],
            "edges":[{"source":"a","target":"b"},{"source":"b","target":"a"}]}"#);
        let options = CodegenOptions { fingerprint: false };
        run_pipeline(&mut st, PassId::Codegen, &options, |_, _| {}).unwrap();
        let cycle: Vec<_> = st
            .diagnostics
            .iter()
            .filter(|d| d.code == Some(codes::W0400))
            .collect();
        assert_eq!(cycle.len(), 1);
        assert!(cycle[0].message.contains("A, B"));
        assert_eq!(st.order, Some(vec![NodeId::from("a"), NodeId::from("b")]));
        assert!(st.generated.is_some());
    }

    #[test]
    fn normalization_warnings_flow_through_callback() {
        let mut st = state(r#"{"nodes":[{"id":"a","label":"A","componentType":"python",
            "args":[{"id":"x","mode":"weird"}]}]}"#);
        let mut normalize_diags = 0;
        run_pipeline(&mut st, PassId::Normalize, &CodegenOptions::default(), |p, d| {
            if p == PassId::Normalize {
                normalize_diags = d.len();
            }
        })
        .unwrap();
        assert_eq!(normalize_diags, 1);
        assert_eq!(st.diagnostics[0].code, Some(codes::W0500));
    }

    #[test]
    fn provenance_tracks_source_and_snapshot() {
        let mut st = state(VALID);
        run_pipeline(&mut st, PassId::Sync, &CodegenOptions::default(), |_, _| {}).unwrap();
        let snap = st.snapshot.as_ref().unwrap();
        let p1 = compute_provenance(VALID, snap);
        let p2 = compute_provenance(&format!("{} ", VALID), snap);
        assert_ne!(p1.source_hash, p2.source_hash);
        assert_eq!(p1.snapshot_fingerprint, p2.snapshot_fingerprint);
        assert_eq!(p1.source_hash_hex().len(), 64);
        let json = p1.to_json().unwrap();
        assert!(json.contains("\"compiler_version\""));
        assert!(json.contains(&p1.snapshot_fingerprint_hex()));
    }
}
