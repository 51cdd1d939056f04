// id.rs — Fallback identifier generation for graph snapshots
//
// Nodes, arguments and output parameters authored by the collaborator may
// arrive without ids. The allocator is owned by the snapshot container (no
// process-wide counters) and never hands out an id that is already in use.

use std::collections::HashSet;

use crate::graph::NodeId;

/// Allocator for fallback ids. Produces monotonically increasing ids in
/// allocation order, skipping any candidate the caller reports as taken.
#[derive(Debug, Default, Clone)]
pub struct IdAllocator {
    next_node: u32,
    next_arg: u32,
    next_output: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_node(&mut self, taken: &HashSet<String>) -> NodeId {
        NodeId(next_free("node", &mut self.next_node, taken))
    }

    pub fn alloc_arg(&mut self, taken: &HashSet<String>) -> String {
        next_free("arg", &mut self.next_arg, taken)
    }

    pub fn alloc_output(&mut self, taken: &HashSet<String>) -> String {
        next_free("output", &mut self.next_output, taken)
    }
}

fn next_free(prefix: &str, counter: &mut u32, taken: &HashSet<String>) -> String {
    loop {
        let candidate = format!("{}_{}", prefix, counter);
        *counter += 1;
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential_per_kind() {
        let mut ids = IdAllocator::new();
        let none = HashSet::new();
        assert_eq!(ids.alloc_arg(&none), "arg_0");
        assert_eq!(ids.alloc_arg(&none), "arg_1");
        assert_eq!(ids.alloc_output(&none), "output_0");
        assert_eq!(ids.alloc_node(&none), NodeId("node_0".into()));
    }

    #[test]
    fn taken_ids_are_skipped() {
        let mut ids = IdAllocator::new();
        let taken: HashSet<String> = ["arg_0", "arg_1"].iter().map(|s| s.to_string()).collect();
        assert_eq!(ids.alloc_arg(&taken), "arg_2");
        assert_eq!(ids.alloc_arg(&taken), "arg_3");
    }
}
