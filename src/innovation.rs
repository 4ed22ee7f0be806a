//! Innovation tracking for structural mutations.
//!
//! Every node and connection gene carries an identifier issued by a single
//! [`InnovationGenerator`] shared by the whole population. Within one
//! generation the generator remembers which structural additions it has
//! already numbered, so two genotypes that independently grow the same link
//! (or split the same connection) receive identical identifiers. Crossover
//! relies on this to align homologous genes.
//!
//! Mutation runs on worker threads, so the counters and the per-generation
//! table each sit behind their own lock.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::gene::{InnovationId, NodeId};

/// Identifiers assigned to a connection split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSplit {
    /// Node ID of the inserted hidden node.
    pub node_id: NodeId,
    /// Innovation of the inserted hidden node.
    pub node_innovation: InnovationId,
    /// Innovation of `source -> new node`.
    pub first: InnovationId,
    /// Innovation of `new node -> destination`.
    pub second: InnovationId,
}

/// Next identifiers to hand out. Persisted with population snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnovationCounters {
    /// Node ID handed out next.
    pub next_node_id: NodeId,
    /// Innovation number handed out next, shared by nodes and connections.
    pub next_innovation: InnovationId,
}

#[derive(Debug, Default)]
struct GenerationTable {
    connections: HashMap<(NodeId, NodeId), InnovationId>,
    splits: HashMap<InnovationId, NodeSplit>,
}

/// Issues globally unique node IDs and innovation numbers.
#[derive(Debug, Default)]
pub struct InnovationGenerator {
    counters: Mutex<InnovationCounters>,
    table: Mutex<GenerationTable>,
}

impl InnovationGenerator {
    /// Create a generator whose first identifiers are zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a generator that resumes from saved counters.
    #[must_use]
    pub fn with_counters(counters: InnovationCounters) -> Self {
        Self {
            counters: Mutex::new(counters),
            table: Mutex::new(GenerationTable::default()),
        }
    }

    /// Current counters.
    #[must_use]
    pub fn counters(&self) -> InnovationCounters {
        *self.counters.lock()
    }

    /// Make sure future identifiers are strictly above the given ones.
    pub fn reserve(&self, max_node_id: NodeId, max_innovation: InnovationId) {
        let mut counters = self.counters.lock();
        counters.next_node_id = counters.next_node_id.max(max_node_id.saturating_add(1));
        counters.next_innovation = counters
            .next_innovation
            .max(max_innovation.saturating_add(1));
    }

    /// Issue a node ID that has never been used.
    pub fn next_node_id(&self) -> NodeId {
        let mut counters = self.counters.lock();
        let id = counters.next_node_id;
        counters.next_node_id += 1;
        id
    }

    /// Issue an innovation number that has never been used.
    pub fn next_innovation(&self) -> InnovationId {
        let mut counters = self.counters.lock();
        let id = counters.next_innovation;
        counters.next_innovation += 1;
        id
    }

    /// Innovation for a `source -> destination` link.
    ///
    /// Repeated requests for the same pair within one generation return the
    /// same number.
    pub fn connection_innovation(&self, source: NodeId, destination: NodeId) -> InnovationId {
        let mut table = self.table.lock();
        if let Some(&innovation) = table.connections.get(&(source, destination)) {
            return innovation;
        }
        let innovation = self.next_innovation();
        table.connections.insert((source, destination), innovation);
        innovation
    }

    /// Identifiers for splitting the connection with innovation `split`.
    ///
    /// Repeated splits of the same connection within one generation return
    /// the same identifiers.
    pub fn node_split(&self, split: InnovationId) -> NodeSplit {
        let mut table = self.table.lock();
        if let Some(&known) = table.splits.get(&split) {
            return known;
        }
        let result = self.fresh_split();
        table.splits.insert(split, result);
        result
    }

    /// Identifiers for a split that must not be shared with anybody.
    pub fn fresh_split(&self) -> NodeSplit {
        let mut counters = self.counters.lock();
        let node_id = counters.next_node_id;
        counters.next_node_id += 1;
        let base = counters.next_innovation;
        counters.next_innovation += 3;
        NodeSplit {
            node_id,
            node_innovation: base,
            first: base + 1,
            second: base + 2,
        }
    }

    /// Forget this generation's structural additions.
    ///
    /// Called once per generation before mutation so that novel structures
    /// are tracked fresh.
    pub fn clear_generation(&self) {
        let mut table = self.table.lock();
        table.connections.clear();
        table.splits.clear();
    }

    /// Number of structural additions remembered this generation.
    #[must_use]
    pub fn tracked_this_generation(&self) -> usize {
        let table = self.table.lock();
        table.connections.len() + table.splits.len()
    }
}
