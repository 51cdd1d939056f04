// pass.rs — Pass descriptor module: metadata, dependency resolution, artifact IDs
//
// Declares the compiler's 5 passes (reading the JSON file is outside the
// runner), their dependency edges, and the artifacts they produce. Used by the
// pipeline runner to compute minimal pass subsets for each --emit target.

use std::collections::HashSet;

// ── Pass and Artifact identifiers ──────────────────────────────────────────

/// Identifies each compiler pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    Normalize,
    Sync,
    Validate,
    Sequence,
    Codegen,
}

/// Machine-readable artifact identifiers. Each maps to a concrete type
/// in the compilation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    Snapshot,   // GraphSnapshot
    Validation, // ValidationResult
    Order,      // Vec<NodeId>
    Generated,  // GeneratedCode
}

// ── Pass descriptor ────────────────────────────────────────────────────────

/// Static metadata about a compiler pass.
pub struct PassDescriptor {
    /// Human-readable name for diagnostics/verbose output.
    pub name: &'static str,
    /// Pass dependencies (other passes whose outputs this pass consumes).
    pub inputs: &'static [PassId],
    /// Artifacts this pass produces or rewrites.
    pub outputs: &'static [ArtifactId],
    /// What invalidates this pass's output.
    pub invalidation_key: &'static str,
    /// Postconditions (documentation only).
    pub invariants: &'static str,
}

/// Return the static descriptor for a given pass.
pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::Normalize => PassDescriptor {
            name: "normalize",
            inputs: &[],
            outputs: &[ArtifactId::Snapshot],
            invalidation_key: "raw snapshot",
            invariants: "every argument has an id, a mode and a typed payload",
        },
        PassId::Sync => PassDescriptor {
            name: "sync",
            inputs: &[PassId::Normalize],
            outputs: &[ArtifactId::Snapshot],
            invalidation_key: "snapshot nodes + pipeline params",
            invariants: "resolvable argument caches equal their authoritative types",
        },
        PassId::Validate => PassDescriptor {
            name: "validate",
            inputs: &[PassId::Sync],
            outputs: &[ArtifactId::Validation],
            invalidation_key: "snapshot",
            invariants: "every reference resolves, or an error names it",
        },
        PassId::Sequence => PassDescriptor {
            name: "sequence",
            inputs: &[PassId::Normalize],
            outputs: &[ArtifactId::Order],
            invalidation_key: "snapshot nodes + edges",
            invariants: "edge sources precede targets unless a cycle was reported",
        },
        PassId::Codegen => PassDescriptor {
            name: "codegen",
            inputs: &[PassId::Validate, PassId::Sequence],
            outputs: &[ArtifactId::Generated],
            invalidation_key: "snapshot + order + codegen_options",
            invariants: "one component per node, one step per node, unique identifiers",
        },
    }
}

// ── Dependency resolution ──────────────────────────────────────────────────

/// All 5 pass IDs in declaration order (used for iteration).
pub const ALL_PASSES: [PassId; 5] = [
    PassId::Normalize,
    PassId::Sync,
    PassId::Validate,
    PassId::Sequence,
    PassId::Codegen,
];

/// Compute the minimal ordered set of passes needed to produce `terminal`.
/// Returns passes in topological (execution) order.
pub fn required_passes(terminal: PassId) -> Vec<PassId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visit(terminal, &mut visited, &mut order);
    order
}

fn visit(id: PassId, visited: &mut HashSet<PassId>, order: &mut Vec<PassId>) {
    if !visited.insert(id) {
        return;
    }
    for &dep in descriptor(id).inputs {
        visit(dep, visited, order);
    }
    order.push(id);
}

// ── Tests ──────────────────────────────────────────────────────────────────
