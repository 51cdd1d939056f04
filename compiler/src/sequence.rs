// sequence.rs — Emission order for graph nodes
//
// Orders nodes so that every edge source precedes its target (Kahn's
// algorithm). Ties are broken by the nodes' original relative order.
//
// Preconditions: none. Edges naming unknown nodes are ignored.
// Postconditions: `nodes` is a permutation of the input. When the edges form
//                 a cycle, `nodes` is the input order unchanged and `cycle`
//                 names the nodes that could not be placed.
// Failure modes: none. Cycles degrade to input order.
// Side effects: a warn-level log line on cycle fallback.

use std::collections::{HashMap, VecDeque};

use crate::graph::{Edge, Node, NodeId};

/// Result of sequencing.
#[derive(Debug)]
pub struct Sequence<'a> {
    pub nodes: Vec<&'a Node>,
    /// Nodes left unplaced by the sort, in input order, when a cycle exists.
    pub cycle: Option<Vec<NodeId>>,
}

impl Sequence<'_> {
    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    pub fn is_sorted(&self) -> bool {
        self.cycle.is_none()
    }
}

/// Order `nodes` by the dependencies in `edges`.
pub fn sequence<'a>(nodes: &'a [Node], edges: &[Edge]) -> Sequence<'a> {
    let index: HashMap<&NodeId, usize> = nodes
        .iter()
        .enumerate()
        .rev() // first occurrence of a duplicate id wins
        .map(|(i, n)| (&n.id, i))
        .collect();

    let mut in_degree = vec![0usize; nodes.len()];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for edge in edges {
        let (Some(&s), Some(&t)) = (index.get(&edge.source), index.get(&edge.target)) else {
            continue;
        };
        successors[s].push(t);
        in_degree[t] += 1;
    }
    for succ in &mut successors {
        succ.sort_unstable();
    }

    let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &next in &successors[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() < nodes.len() {
        let stuck: Vec<NodeId> = nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| in_degree[*i] > 0)
            .map(|(_, n)| n.id.clone())
            .collect();
        tracing::warn!(
            stuck = stuck.len(),
            "dependency cycle detected; keeping original node order"
        );
        return Sequence {
            nodes: nodes.iter().collect(),
            cycle: Some(stuck),
        };
    }

    Sequence {
        nodes: order.into_iter().map(|i| &nodes[i]).collect(),
        cycle: None,
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
