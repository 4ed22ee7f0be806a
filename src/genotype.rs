//! Network genotypes: gene lists, genetic distance and reachability pruning.
//!
//! A [`NetworkGenotype`] is an ordered list of node genes and connection
//! genes. It is mutated in place, spliced with other genotypes, and read to
//! build a [`NetworkPhenotype`](crate::NetworkPhenotype). Node IDs and
//! connection innovations must be unique within one genotype; violating that
//! is a construction bug and panics.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::MutationLimits;
use crate::error::ConfigError;
use crate::gene::{ConnectionDef, InnovationId, NodeDef, NodeId, NodeType};
use crate::topology::GraphTopology;

/// Identifier of a species. Issued from 1 upwards; 0 means "not yet classified".
pub type SpeciesId = u32;

/// Weights of the genetic-distance terms plus the classification threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesDistanceParameters {
    /// Weight of excess connection genes (normalized by genotype size).
    pub excess: f64,
    /// Weight of disjoint connection genes (normalized by genotype size).
    pub disjoint: f64,
    /// Weight of the average weight difference of shared connections.
    pub weights: f64,
    /// Weight of the average length difference of shared connections.
    pub lengths: f64,
    /// Weight of the average firing-window difference of shared nodes.
    pub thresholds: f64,
    /// Weight of the average decay difference of shared nodes.
    pub decays: f64,
    /// Weight of the average refractory difference of shared nodes.
    pub pulses: f64,
    /// Weight of nodes present in only one genotype (normalized by size).
    pub nodes: f64,
    /// Maximum distance to an archetype for membership in its species.
    pub threshold: f64,
}

impl Default for SpeciesDistanceParameters {
    fn default() -> Self {
        Self {
            excess: 1.0,
            disjoint: 1.0,
            weights: 0.4,
            lengths: 0.05,
            thresholds: 0.2,
            decays: 0.2,
            pulses: 0.02,
            nodes: 1.0,
            threshold: 3.0,
        }
    }
}

impl SpeciesDistanceParameters {
    fn all(&self) -> [f64; 9] {
        [
            self.excess,
            self.disjoint,
            self.weights,
            self.lengths,
            self.thresholds,
            self.decays,
            self.pulses,
            self.nodes,
            self.threshold,
        ]
    }

    fn uses_connections(&self) -> bool {
        self.excess > 0.0 || self.disjoint > 0.0 || self.weights > 0.0 || self.lengths > 0.0
    }

    fn uses_nodes(&self) -> bool {
        self.thresholds > 0.0 || self.decays > 0.0 || self.pulses > 0.0 || self.nodes > 0.0
    }

    /// All values finite and non-negative, at least one nonzero.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let all = self.all();
        all.iter().all(|w| w.is_finite() && *w >= 0.0) && all.iter().any(|w| *w > 0.0)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDistanceParameters`] when [`is_valid`](Self::is_valid) fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ConfigError::InvalidDistanceParameters(format!(
                "weights must be finite, non-negative and not all zero: {:?}",
                self.all()
            )))
        }
    }
}

/// The genome of a spiking network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkGenotype {
    nodes: Vec<NodeDef>,
    connections: Vec<ConnectionDef>,
    /// Species of the parent this genotype descends from.
    species: SpeciesId,
}

impl NetworkGenotype {
    /// An empty genotype.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fully-connected template: one connection per input×output pair.
    ///
    /// Node IDs are `0..num_inputs` for inputs followed by the outputs. Node
    /// innovations equal their node IDs and connection innovations follow
    /// on. Parameters are drawn from the midpoint of `limits`; use
    /// [`randomize_parameters`](Self::randomize_parameters) per individual.
    #[must_use]
    pub fn template(num_inputs: usize, num_outputs: usize, limits: &MutationLimits) -> Self {
        let mut genotype = Self::new();
        let mid = |lo: f64, hi: f64| lo + (hi - lo) / 2.0;

        let total = (num_inputs + num_outputs) as u32;
        for id in 0..total {
            let node_type = if (id as usize) < num_inputs {
                NodeType::Input
            } else {
                NodeType::Output
            };
            let mut node = NodeDef::new(id, id, node_type);
            node.threshold_min = limits.threshold.min;
            node.threshold_max = limits.threshold.max;
            node.value_decay = mid(limits.value_decay.min, limits.value_decay.max);
            node.activ_decay = mid(limits.activ_decay.min, limits.activ_decay.max);
            node.pulse_fast = limits.pulse.min;
            node.pulse_slow = limits.pulse.max;
            genotype.add_node(node);
        }

        let mut innovation = total;
        let weight = mid(limits.weight.min, limits.weight.max);
        for input in 0..num_inputs as u32 {
            for output in num_inputs as u32..total {
                genotype.add_connection(ConnectionDef::new(
                    innovation,
                    input,
                    output,
                    weight,
                    limits.length.min,
                ));
                innovation += 1;
            }
        }

        genotype
    }

    /// Redraw every gene parameter uniformly within `limits`, keeping the structure.
    pub fn randomize_parameters<R: Rng + ?Sized>(&mut self, limits: &MutationLimits, rng: &mut R) {
        for node in &mut self.nodes {
            limits.randomize_node(node, rng);
        }
        for conn in &mut self.connections {
            limits.randomize_connection(conn, rng);
        }
    }

    /// Append a node gene.
    ///
    /// # Panics
    ///
    /// Panics if a node with the same ID already exists.
    pub fn add_node(&mut self, node: NodeDef) {
        assert!(
            !self.has_node(node.node_id),
            "duplicate node id {} in genotype",
            node.node_id
        );
        self.nodes.push(node);
    }

    /// Append a connection gene.
    ///
    /// # Panics
    ///
    /// Panics if a connection with the same innovation already exists.
    pub fn add_connection(&mut self, conn: ConnectionDef) {
        assert!(
            !self.has_innovation(conn.innovation),
            "duplicate connection innovation {} in genotype",
            conn.innovation
        );
        self.connections.push(conn);
    }

    #[must_use]
    pub fn nodes(&self) -> &[NodeDef] {
        &self.nodes
    }

    #[must_use]
    pub fn connections(&self) -> &[ConnectionDef] {
        &self.connections
    }

    /// Mutable access to node parameters. Node IDs must not be changed.
    pub fn nodes_mut(&mut self) -> &mut [NodeDef] {
        &mut self.nodes
    }

    /// Mutable access to connection parameters. Innovations must not be changed.
    pub fn connections_mut(&mut self) -> &mut [ConnectionDef] {
        &mut self.connections
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&NodeDef> {
        self.nodes.iter().find(|n| n.node_id == id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeDef> {
        self.nodes.iter_mut().find(|n| n.node_id == id)
    }

    #[must_use]
    pub fn connection(&self, innovation: InnovationId) -> Option<&ConnectionDef> {
        self.connections.iter().find(|c| c.innovation == innovation)
    }

    pub fn connection_mut(&mut self, innovation: InnovationId) -> Option<&mut ConnectionDef> {
        self.connections
            .iter_mut()
            .find(|c| c.innovation == innovation)
    }

    #[must_use]
    pub fn has_node(&self, id: NodeId) -> bool {
        self.nodes.iter().any(|n| n.node_id == id)
    }

    #[must_use]
    pub fn has_innovation(&self, innovation: InnovationId) -> bool {
        self.connections.iter().any(|c| c.innovation == innovation)
    }

    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn num_connections(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn num_enabled_connections(&self) -> usize {
        self.connections.iter().filter(|c| c.enabled).count()
    }

    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.count_type(NodeType::Input)
    }

    #[must_use]
    pub fn num_outputs(&self) -> usize {
        self.count_type(NodeType::Output)
    }

    fn count_type(&self, node_type: NodeType) -> usize {
        self.nodes.iter().filter(|n| n.node_type == node_type).count()
    }

    /// Node IDs of the given type in ascending order.
    #[must_use]
    pub fn node_ids_of_type(&self, node_type: NodeType) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|n| n.node_type == node_type)
            .map(|n| n.node_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn max_node_id(&self) -> Option<NodeId> {
        self.nodes.iter().map(|n| n.node_id).max()
    }

    /// Highest innovation among nodes and connections.
    #[must_use]
    pub fn max_innovation(&self) -> Option<InnovationId> {
        self.nodes
            .iter()
            .map(|n| n.innovation)
            .chain(self.connections.iter().map(|c| c.innovation))
            .max()
    }

    #[must_use]
    pub fn species(&self) -> SpeciesId {
        self.species
    }

    pub fn set_species(&mut self, species: SpeciesId) {
        self.species = species;
    }

    /// Node IDs kept in the phenotype.
    ///
    /// A hidden node survives when it is forward-reachable from an input and
    /// backward-reachable from an output over enabled connections. Inputs and
    /// outputs always survive.
    #[must_use]
    pub fn reachable_node_ids(&self) -> BTreeSet<NodeId> {
        let topo = GraphTopology::from_genotype(self);
        let inputs = self.node_ids_of_type(NodeType::Input);
        let outputs = self.node_ids_of_type(NodeType::Output);
        let forward = topo.reachable_forward(inputs.iter().copied());
        let backward = topo.reachable_backward(outputs.iter().copied());

        let mut reachable: BTreeSet<NodeId> = (0..topo.node_count())
            .filter(|&idx| forward[idx] && backward[idx])
            .filter_map(|idx| topo.node_id(idx))
            .collect();
        reachable.extend(inputs);
        reachable.extend(outputs);
        reachable
    }

    #[must_use]
    pub fn get_num_reachable_nodes(&self) -> usize {
        self.reachable_node_ids().len()
    }

    /// Enabled connections whose endpoints both survive pruning.
    pub fn active_connections(&self) -> impl Iterator<Item = &ConnectionDef> {
        let reachable = self.reachable_node_ids();
        self.connections.iter().filter(move |c| {
            c.enabled && reachable.contains(&c.source_id) && reachable.contains(&c.destination_id)
        })
    }

    #[must_use]
    pub fn active_connection_count(&self) -> usize {
        self.active_connections().count()
    }

    /// The active subgraph as a genotype of its own.
    ///
    /// Pruning is idempotent: pruning the result again changes nothing.
    #[must_use]
    pub fn pruned(&self) -> Self {
        let reachable = self.reachable_node_ids();
        Self {
            nodes: self
                .nodes
                .iter()
                .filter(|n| reachable.contains(&n.node_id))
                .cloned()
                .collect(),
            connections: self.active_connections().cloned().collect(),
            species: self.species,
        }
    }

    /// Genetic distance to another genotype. See [`network_genotype_distance`].
    #[must_use]
    pub fn distance(&self, other: &Self, params: &SpeciesDistanceParameters) -> f64 {
        network_genotype_distance(self, other, params)
    }
}

/// Genetic distance between two genotypes.
///
/// The connection component aligns genes by innovation and counts excess and
/// disjoint genes (normalized by the larger connection count) plus the average
/// weight and length differences of shared genes. The node component aligns
/// nodes by ID and averages firing-window, decay and refractory differences,
/// plus the share of nodes present on one side only. A component whose weights
/// are all zero is skipped. The result is symmetric and zero for identical
/// genotypes.
#[must_use]
pub fn network_genotype_distance(
    a: &NetworkGenotype,
    b: &NetworkGenotype,
    params: &SpeciesDistanceParameters,
) -> f64 {
    debug_assert!(params.is_valid(), "malformed distance parameters");

    let mut distance = 0.0;
    if params.uses_connections() {
        distance += connection_distance(a, b, params);
    }
    if params.uses_nodes() {
        distance += node_distance(a, b, params);
    }
    distance
}

fn connection_distance(
    a: &NetworkGenotype,
    b: &NetworkGenotype,
    params: &SpeciesDistanceParameters,
) -> f64 {
    let map_a: BTreeMap<InnovationId, &ConnectionDef> =
        a.connections.iter().map(|c| (c.innovation, c)).collect();
    let map_b: BTreeMap<InnovationId, &ConnectionDef> =
        b.connections.iter().map(|c| (c.innovation, c)).collect();
    let max_a = map_a.keys().next_back().copied();
    let max_b = map_b.keys().next_back().copied();

    let mut excess = 0usize;
    let mut disjoint = 0usize;
    let mut shared = 0usize;
    let mut weight_diff = 0.0;
    let mut length_diff = 0.0;

    for (&innovation, ca) in &map_a {
        if let Some(cb) = map_b.get(&innovation) {
            shared += 1;
            weight_diff += (ca.weight - cb.weight).abs();
            length_diff += (f64::from(ca.length) - f64::from(cb.length)).abs();
        } else if Some(innovation) > max_b {
            excess += 1;
        } else {
            disjoint += 1;
        }
    }
    for &innovation in map_b.keys() {
        if map_a.contains_key(&innovation) {
            continue;
        }
        if Some(innovation) > max_a {
            excess += 1;
        } else {
            disjoint += 1;
        }
    }

    let n = map_a.len().max(map_b.len()).max(1) as f64;
    let (avg_weight, avg_length) = if shared > 0 {
        (weight_diff / shared as f64, length_diff / shared as f64)
    } else {
        (0.0, 0.0)
    };

    params.excess * excess as f64 / n
        + params.disjoint * disjoint as f64 / n
        + params.weights * avg_weight
        + params.lengths * avg_length
}

fn node_distance(
    a: &NetworkGenotype,
    b: &NetworkGenotype,
    params: &SpeciesDistanceParameters,
) -> f64 {
    let map_a: BTreeMap<NodeId, &NodeDef> = a.nodes.iter().map(|n| (n.node_id, n)).collect();
    let map_b: BTreeMap<NodeId, &NodeDef> = b.nodes.iter().map(|n| (n.node_id, n)).collect();

    let mut shared = 0usize;
    let mut threshold_diff = 0.0;
    let mut decay_diff = 0.0;
    let mut pulse_diff = 0.0;

    for (id, na) in &map_a {
        let Some(nb) = map_b.get(id) else {
            continue;
        };
        shared += 1;
        let (min_a, max_a) = na.threshold_range();
        let (min_b, max_b) = nb.threshold_range();
        threshold_diff += (min_a - min_b).abs() + (max_a - max_b).abs();
        decay_diff +=
            (na.value_decay - nb.value_decay).abs() + (na.activ_decay - nb.activ_decay).abs();
        pulse_diff += (f64::from(na.pulse_fast) - f64::from(nb.pulse_fast)).abs()
            + (f64::from(na.pulse_slow) - f64::from(nb.pulse_slow)).abs();
    }

    let exclusive = map_a.len() + map_b.len() - 2 * shared;
    let n = map_a.len().max(map_b.len()).max(1) as f64;

    let mut distance = params.nodes * exclusive as f64 / n;
    if shared > 0 {
        let s = shared as f64;
        distance += params.thresholds * threshold_diff / s
            + params.decays * decay_diff / s
            + params.pulses * pulse_diff / s;
    }
    distance
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn weights_only(w: f64) -> SpeciesDistanceParameters {
        SpeciesDistanceParameters {
            excess: 0.0,
            disjoint: 0.0,
            weights: w,
            lengths: 0.0,
            thresholds: 0.0,
            decays: 0.0,
            pulses: 0.0,
            nodes: 0.0,
            threshold: 1.0,
        }
    }

    fn one_connection(weight: f64) -> NetworkGenotype {
        let mut g = NetworkGenotype::new();
        g.add_node(NodeDef::input(0, 0));
        g.add_node(NodeDef::output(1, 1));
        g.add_connection(ConnectionDef::new(0, 0, 1, weight, 10));
        g
    }

    #[test]
    fn test_template_shape() {
        let g = NetworkGenotype::template(3, 2, &MutationLimits::default());
        assert_eq!(g.num_nodes(), 5);
        assert_eq!(g.num_connections(), 6);
        assert_eq!(g.num_inputs(), 3);
        assert_eq!(g.num_outputs(), 2);
        assert_eq!(g.max_node_id(), Some(4));
        assert_eq!(g.max_innovation(), Some(10));
        assert!(g.connections().iter().all(|c| c.enabled && c.length >= 1));
    }

    #[test]
    fn test_weight_only_distance_example() {
        let a = one_connection(1.0);
        let b = one_connection(2.0);
        let d = network_genotype_distance(&a, &b, &weights_only(0.5));
        assert!((d - 0.5).abs() < 1e-12, "distance was {d}");
    }

    #[test]
    fn test_excess_and_disjoint() {
        let a = one_connection(1.0);
        let mut b = one_connection(1.0);
        b.add_node(NodeDef::hidden(2, 2));
        b.add_connection(ConnectionDef::new(5, 0, 2, 1.0, 1));

        let params = SpeciesDistanceParameters {
            excess: 1.0,
            ..weights_only(0.0)
        };
        // innovation 5 is beyond a's maximum (0): one excess gene over n = 2
        assert!((a.distance(&b, &params) - 0.5).abs() < 1e-12);

        let params = SpeciesDistanceParameters {
            disjoint: 1.0,
            ..weights_only(0.0)
        };
        assert_eq!(a.distance(&b, &params), 0.0);

        let params = SpeciesDistanceParameters {
            nodes: 1.0,
            ..weights_only(0.0)
        };
        // one exclusive node over max(2, 3)
        assert!((a.distance(&b, &params) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_identity_and_symmetry() {
        let limits = MutationLimits::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut a = NetworkGenotype::template(2, 2, &limits);
        let mut b = a.clone();
        a.randomize_parameters(&limits, &mut rng);
        b.randomize_parameters(&limits, &mut rng);
        b.add_node(NodeDef::hidden(9, 20));

        let params = SpeciesDistanceParameters::default();
        assert_eq!(a.distance(&a, &params), 0.0);
        assert_eq!(a.distance(&b, &params), b.distance(&a, &params));
        assert!(a.distance(&b, &params) > 0.0);
    }

    #[test]
    fn test_pruning_removes_dead_ends() {
        let mut g = one_connection(1.0);
        g.add_node(NodeDef::hidden(2, 2));
        g.add_node(NodeDef::hidden(3, 3));
        g.add_connection(ConnectionDef::new(1, 0, 2, 1.0, 1)); // dead end
        g.add_connection(ConnectionDef::new(2, 3, 1, 1.0, 1)); // unreachable from input

        assert_eq!(g.get_num_reachable_nodes(), 2);
        let pruned = g.pruned();
        assert_eq!(pruned.num_nodes(), 2);
        assert_eq!(pruned.num_connections(), 1);
        assert_eq!(pruned.pruned(), pruned, "pruning is idempotent");
    }

    #[test]
    fn test_disabled_connection_shrinks_active_set() {
        let mut g = one_connection(1.0);
        g.add_node(NodeDef::hidden(2, 2));
        g.add_connection(ConnectionDef::new(1, 0, 2, 1.0, 1));
        g.add_connection(ConnectionDef::new(2, 2, 1, 1.0, 1));
        assert_eq!(g.get_num_reachable_nodes(), 3);
        assert_eq!(g.active_connection_count(), 3);

        g.connection_mut(2).expect("innovation 2").enabled = false;
        assert_eq!(g.get_num_reachable_nodes(), 2);
        assert_eq!(g.active_connection_count(), 1);
        assert!(g.get_num_reachable_nodes() <= g.num_nodes());
    }

    #[test]
    #[should_panic(expected = "duplicate connection innovation")]
    fn test_duplicate_innovation_panics() {
        let mut g = one_connection(1.0);
        g.add_connection(ConnectionDef::new(0, 1, 0, 1.0, 1));
    }

    #[test]
    fn test_invalid_distance_parameters() {
        assert!(weights_only(0.0).is_valid(), "threshold alone is nonzero");
        let zero = SpeciesDistanceParameters {
            threshold: 0.0,
            ..weights_only(0.0)
        };
        assert!(zero.validate().is_err());
        let negative = SpeciesDistanceParameters {
            excess: -1.0,
            ..Default::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_genotype_serialization_roundtrip() {
        let mut g = NetworkGenotype::template(2, 1, &MutationLimits::default());
        g.set_species(4);
        let json = serde_json::to_string(&g).expect("Serialization failed");
        let restored: NetworkGenotype =
            serde_json::from_str(&json).expect("Deserialization failed");
        assert_eq!(g, restored);
    }
}
