// type_sync.rs — Propagation of authoritative types into argument caches
//
// An argument's `ty` is a cache. The authoritative type lives on whatever the
// argument references: the pipeline parameter's declared type, or the
// upstream node's output declaration. Synchronization copies those types
// into the caches, touching only entries whose cache is stale.
//
// Preconditions: none. References that do not resolve are left alone (the
//                validator reports them).
// Postconditions: every resolvable reference has a cache equal to its
//                 authoritative type; re-running is a no-op.
// Failure modes: none.
// Side effects: none.

use std::borrow::Cow;

use crate::graph::{find_node, ArgSource, Argument, Node, PipelineParam, Returns, TypeTag};

/// The type `arg` should carry given the current graph, or `None` when the
/// argument is a literal or its reference does not resolve.
///
/// Pipeline references take the parameter's declared type. Node references
/// take the upstream output's kind, with producer artifacts (`Output[F]`)
/// rewritten to their consumer variant (`Input[F]`). A node reference with
/// no output name copies the upstream node's anonymous return type as is;
/// against a node with exactly one named output it resolves like a named
/// reference to that output.
pub fn authoritative_type(
    arg: &Argument,
    nodes: &[Node],
    params: &[PipelineParam],
) -> Option<TypeTag> {
    match &arg.source {
        ArgSource::Literal { .. } => None,
        ArgSource::Pipeline { key } => {
            if key.is_empty() {
                return None;
            }
            params.iter().find(|p| &p.key == key).map(|p| p.ty.clone())
        }
        ArgSource::Node {
            node_id,
            output_name,
        } => {
            let upstream = find_node(nodes, node_id)?;
            match (output_name, &upstream.returns) {
                (Some(name), returns) => returns.find(name).map(|o| o.kind.as_consumed()),
                (None, Returns::Single(ty)) => Some(ty.clone()),
                (None, returns) => returns.sole_type().map(TypeTag::as_consumed),
            }
        }
    }
}

/// Refresh the cached types of `args`.
///
/// Returns `Cow::Borrowed` when nothing changed, so callers can detect a
/// no-op without comparing lists. Entries that are already consistent are
/// copied unchanged.
pub fn sync_arguments<'a>(
    args: &'a [Argument],
    nodes: &[Node],
    params: &[PipelineParam],
) -> Cow<'a, [Argument]> {
    let stale: Vec<(usize, TypeTag)> = args
        .iter()
        .enumerate()
        .filter_map(|(i, arg)| {
            authoritative_type(arg, nodes, params)
                .filter(|ty| ty != &arg.ty)
                .map(|ty| (i, ty))
        })
        .collect();

    if stale.is_empty() {
        return Cow::Borrowed(args);
    }

    let mut next = args.to_vec();
    for (i, ty) in stale {
        next[i].ty = ty;
    }
    Cow::Owned(next)
}

/// Refresh every node's argument caches.
///
/// Returns the updated node list, or `None` when every cache was already
/// current. Output declarations are never derived, so a single pass over
/// the nodes reaches the fixed point.
pub fn sync_nodes(nodes: &[Node], params: &[PipelineParam]) -> Option<Vec<Node>> {
    let updates: Vec<(usize, Vec<Argument>)> = nodes
        .iter()
        .enumerate()
        .filter_map(|(i, node)| match sync_arguments(&node.args, nodes, params) {
            Cow::Borrowed(_) => None,
            Cow::Owned(args) => Some((i, args)),
        })
        .collect();

    if updates.is_empty() {
        return None;
    }

    tracing::debug!(nodes = updates.len(), "argument types refreshed");
    let mut next = nodes.to_vec();
    for (i, args) in updates {
        next[i].args = args;
    }
    Some(next)
}

// ── Tests ───────────────────────────────────────────────────────────────────
