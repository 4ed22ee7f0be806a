//! Graph topology analysis using CSR format.
//!
//! This module provides reachability queries over a genotype's *enabled*
//! connections using Compressed Sparse Row (CSR) adjacency. CSR avoids
//! per-call `Vec<Vec<usize>>` allocations, which matters because pruning runs
//! once per phenotype build and once per reachability query during evolution.
//!
//! ## Determinism
//!
//! Nodes are indexed in ascending node-ID order and edges are sorted by
//! innovation number before CSR construction, so traversal order does not
//! depend on the mutation history of the genotype.

use std::collections::VecDeque;

use crate::gene::NodeId;
use crate::genotype::NetworkGenotype;

/// CSR-format snapshot of a genotype's enabled connections.
#[derive(Debug, Clone)]
pub struct GraphTopology {
    /// Node IDs in ascending order; position is the dense index.
    idx_to_node: Vec<NodeId>,
    /// CSR offsets for forward edges (outgoing). Length = node_count + 1.
    fwd_offsets: Vec<usize>,
    /// `fwd_targets[fwd_offsets[i]..fwd_offsets[i+1]]` are successors of node i.
    fwd_targets: Vec<usize>,
    /// CSR offsets for reverse edges (incoming). Length = node_count + 1.
    rev_offsets: Vec<usize>,
    /// `rev_sources[rev_offsets[i]..rev_offsets[i+1]]` are predecessors of node i.
    rev_sources: Vec<usize>,
}

impl GraphTopology {
    /// Build topology from a genotype's enabled connections.
    ///
    /// Connections whose endpoints are not nodes of the genotype are ignored.
    #[must_use]
    pub fn from_genotype(genotype: &NetworkGenotype) -> Self {
        let mut idx_to_node: Vec<NodeId> = genotype.nodes().iter().map(|n| n.node_id).collect();
        idx_to_node.sort_unstable();
        idx_to_node.dedup();
        let node_count = idx_to_node.len();

        let mut edges: Vec<(usize, usize, u32)> = genotype
            .connections()
            .iter()
            .filter(|c| c.enabled)
            .filter_map(|c| {
                let from = lookup_idx(&idx_to_node, c.source_id)?;
                let to = lookup_idx(&idx_to_node, c.destination_id)?;
                Some((from, to, c.innovation))
            })
            .collect();
        edges.sort_by_key(|&(_, _, inn)| inn);

        let (fwd_offsets, fwd_targets) =
            build_csr(node_count, edges.iter().map(|&(f, t, _)| (f, t)));
        let (rev_offsets, rev_sources) =
            build_csr(node_count, edges.iter().map(|&(f, t, _)| (t, f)));

        Self {
            idx_to_node,
            fwd_offsets,
            fwd_targets,
            rev_offsets,
            rev_sources,
        }
    }

    /// Get the dense index for a node ID.
    #[inline]
    #[must_use]
    pub fn node_index(&self, id: NodeId) -> Option<usize> {
        lookup_idx(&self.idx_to_node, id)
    }

    /// Get the node ID for a dense index.
    #[inline]
    #[must_use]
    pub fn node_id(&self, idx: usize) -> Option<NodeId> {
        self.idx_to_node.get(idx).copied()
    }

    /// Number of nodes in the topology.
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.idx_to_node.len()
    }

    /// Number of enabled edges with valid endpoints.
    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.fwd_targets.len()
    }

    /// Iterate over successors of a node (forward edges).
    #[inline]
    pub fn successors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        let start = self.fwd_offsets[idx];
        let end = self.fwd_offsets[idx + 1];
        self.fwd_targets[start..end].iter().copied()
    }

    /// Iterate over predecessors of a node (reverse edges).
    #[inline]
    pub fn predecessors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        let start = self.rev_offsets[idx];
        let end = self.rev_offsets[idx + 1];
        self.rev_sources[start..end].iter().copied()
    }

    /// Nodes reachable from any of `starts` by following edges forward.
    ///
    /// Returns a mask indexed by dense node index. Start nodes are included.
    #[must_use]
    pub fn reachable_forward(&self, starts: impl IntoIterator<Item = NodeId>) -> Vec<bool> {
        self.flood(starts, |idx| self.successors(idx).collect())
    }

    /// Nodes from which any of `targets` can be reached.
    ///
    /// Returns a mask indexed by dense node index. Target nodes are included.
    #[must_use]
    pub fn reachable_backward(&self, targets: impl IntoIterator<Item = NodeId>) -> Vec<bool> {
        self.flood(targets, |idx| self.predecessors(idx).collect())
    }

    fn flood(
        &self,
        seeds: impl IntoIterator<Item = NodeId>,
        next: impl Fn(usize) -> Vec<usize>,
    ) -> Vec<bool> {
        let mut visited = vec![false; self.node_count()];
        let mut queue = VecDeque::new();
        for idx in seeds.into_iter().filter_map(|id| self.node_index(id)) {
            if !visited[idx] {
                visited[idx] = true;
                queue.push_back(idx);
            }
        }

        while let Some(current) = queue.pop_front() {
            for neighbor in next(current) {
                if !visited[neighbor] {
                    visited[neighbor] = true;
                    queue.push_back(neighbor);
                }
            }
        }

        visited
    }
}

fn build_csr(
    node_count: usize,
    edges: impl Iterator<Item = (usize, usize)> + Clone,
) -> (Vec<usize>, Vec<usize>) {
    let mut counts = vec![0usize; node_count];
    for (from, _) in edges.clone() {
        counts[from] += 1;
    }

    let mut offsets = Vec::with_capacity(node_count + 1);
    let mut running = 0;
    offsets.push(0);
    for &count in &counts {
        running += count;
        offsets.push(running);
    }

    let mut targets = vec![0usize; running];
    let mut write_pos = offsets[..node_count].to_vec();
    for (from, to) in edges {
        targets[write_pos[from]] = to;
        write_pos[from] += 1;
    }

    (offsets, targets)
}

/// Binary search for a node ID in the sorted index.
fn lookup_idx(sorted: &[NodeId], id: NodeId) -> Option<usize> {
    sorted.binary_search(&id).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gene::{ConnectionDef, NodeDef};

    /// 0 (in) -> 2 (hidden) -> 1 (out), plus a dead end 0 -> 3 and an island 4 -> 5.
    fn sample() -> NetworkGenotype {
        let mut g = NetworkGenotype::new();
        g.add_node(NodeDef::input(0, 0));
        g.add_node(NodeDef::output(1, 1));
        g.add_node(NodeDef::hidden(2, 2));
        g.add_node(NodeDef::hidden(3, 3));
        g.add_node(NodeDef::hidden(4, 4));
        g.add_node(NodeDef::hidden(5, 5));
        g.add_connection(ConnectionDef::new(10, 0, 2, 1.0, 1));
        g.add_connection(ConnectionDef::new(11, 2, 1, 1.0, 1));
        g.add_connection(ConnectionDef::new(12, 0, 3, 1.0, 1));
        g.add_connection(ConnectionDef::new(13, 4, 5, 1.0, 1));
        g
    }

    #[test]
    fn test_topology_basic() {
        let topo = GraphTopology::from_genotype(&sample());
        assert_eq!(topo.node_count(), 6);
        assert_eq!(topo.edge_count(), 4);

        let idx0 = topo.node_index(0).expect("node 0");
        let succ: Vec<NodeId> = topo
            .successors(idx0)
            .filter_map(|i| topo.node_id(i))
            .collect();
        assert_eq!(succ, vec![2, 3]);
    }

    #[test]
    fn test_reachability() {
        let topo = GraphTopology::from_genotype(&sample());
        let fwd = topo.reachable_forward([0]);
        let bwd = topo.reachable_backward([1]);

        let reached = |mask: &[bool]| -> Vec<NodeId> {
            (0..topo.node_count())
                .filter(|&i| mask[i])
                .filter_map(|i| topo.node_id(i))
                .collect()
        };
        assert_eq!(reached(&fwd), vec![0, 1, 2, 3]);
        assert_eq!(reached(&bwd), vec![0, 1, 2]);
    }

    #[test]
    fn test_disabled_edges_are_ignored() {
        let mut g = sample();
        g.connection_mut(11).expect("connection 11").enabled = false;
        let topo = GraphTopology::from_genotype(&g);
        let bwd = topo.reachable_backward([1]);
        let idx2 = topo.node_index(2).expect("node 2");
        assert!(!bwd[idx2]);
    }
}
