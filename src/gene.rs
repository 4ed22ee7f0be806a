//! Gene types for spiking NEAT genotypes.
//!
//! This module defines the fundamental building blocks of a genotype:
//! - [`NodeDef`]: a spiking neuron with a firing window, decay rates and
//!   refractory bounds
//! - [`ConnectionDef`]: a weighted, delayed link between two nodes
//!
//! Genes are plain values. Range invariants (`threshold_min <= threshold_max`,
//! `pulse_fast <= pulse_slow`) are *not* enforced here because mutation may
//! transiently invert them; they are normalized when a phenotype is built.

use serde::{Deserialize, Serialize};

/// Identifier of a node within a genotype. Unique per genotype and shared by
/// homologous nodes across genotypes.
pub type NodeId = u32;

/// Innovation identifier used to align genes across genotypes.
pub type InnovationId = u32;

/// The role of a node in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    /// Receives an external drive from the fitness calculator.
    Input,
    /// Reports its firings to the fitness calculator.
    Output,
    /// Internal node added through mutation.
    Hidden,
}

/// A node gene describing one spiking neuron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    /// Innovation number issued when this node first appeared.
    pub innovation: InnovationId,
    /// Identity of the node; connections refer to it.
    pub node_id: NodeId,
    /// Lower bound of the firing window.
    pub threshold_min: f64,
    /// Upper bound of the firing window.
    pub threshold_max: f64,
    /// Fraction of the stored value lost each tick, in `[0, 1]`.
    pub value_decay: f64,
    /// Smoothing rate of the activation-percentage estimate, in `[0, 1]`.
    pub activ_decay: f64,
    /// Refractory ticks after firing while the neuron is quiet.
    pub pulse_fast: u32,
    /// Refractory ticks after firing while the neuron is saturated.
    pub pulse_slow: u32,
    /// Role of the node.
    pub node_type: NodeType,
}

impl NodeDef {
    /// Create a node gene with neutral parameters.
    #[must_use]
    pub fn new(node_id: NodeId, innovation: InnovationId, node_type: NodeType) -> Self {
        Self {
            innovation,
            node_id,
            threshold_min: 1.0,
            threshold_max: f64::MAX,
            value_decay: 0.1,
            activ_decay: 0.1,
            pulse_fast: 1,
            pulse_slow: 1,
            node_type,
        }
    }

    /// Create an input node.
    #[must_use]
    pub fn input(node_id: NodeId, innovation: InnovationId) -> Self {
        Self::new(node_id, innovation, NodeType::Input)
    }

    /// Create an output node.
    #[must_use]
    pub fn output(node_id: NodeId, innovation: InnovationId) -> Self {
        Self::new(node_id, innovation, NodeType::Output)
    }

    /// Create a hidden node.
    #[must_use]
    pub fn hidden(node_id: NodeId, innovation: InnovationId) -> Self {
        Self::new(node_id, innovation, NodeType::Hidden)
    }

    /// Firing window with the bounds put in order.
    #[must_use]
    pub fn threshold_range(&self) -> (f64, f64) {
        (
            self.threshold_min.min(self.threshold_max),
            self.threshold_min.max(self.threshold_max),
        )
    }

    /// Refractory bounds with the durations put in order.
    #[must_use]
    pub fn pulse_range(&self) -> (u32, u32) {
        (
            self.pulse_fast.min(self.pulse_slow),
            self.pulse_fast.max(self.pulse_slow),
        )
    }

    /// Whether a connection may originate at this node.
    #[inline]
    #[must_use]
    pub fn can_send(&self) -> bool {
        matches!(self.node_type, NodeType::Input | NodeType::Hidden)
    }

    /// Whether a connection may terminate at this node.
    #[inline]
    #[must_use]
    pub fn can_receive(&self) -> bool {
        matches!(self.node_type, NodeType::Hidden | NodeType::Output)
    }
}

/// A connection gene: a weighted link that delivers pulses after `length` ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionDef {
    /// Innovation number used for alignment during distance and crossover.
    pub innovation: InnovationId,
    /// Node the pulse leaves from.
    pub source_id: NodeId,
    /// Node the pulse arrives at.
    pub destination_id: NodeId,
    /// Multiplier applied to the source value.
    pub weight: f64,
    /// Transmission delay in ticks, at least 1.
    pub length: u32,
    /// Disabled connections are kept for crossover but never simulated.
    pub enabled: bool,
}

impl ConnectionDef {
    /// Create a new enabled connection.
    #[must_use]
    pub fn new(
        innovation: InnovationId,
        source_id: NodeId,
        destination_id: NodeId,
        weight: f64,
        length: u32,
    ) -> Self {
        Self {
            innovation,
            source_id,
            destination_id,
            weight,
            length: length.max(1),
            enabled: true,
        }
    }

    /// True if this connection links `a` and `b` in either direction.
    #[inline]
    #[must_use]
    pub fn links(&self, a: NodeId, b: NodeId) -> bool {
        (self.source_id == a && self.destination_id == b)
            || (self.source_id == b && self.destination_id == a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_def_creation() {
        let input = NodeDef::input(0, 0);
        assert_eq!(input.node_type, NodeType::Input);
        assert!(input.can_send());
        assert!(!input.can_receive());

        let output = NodeDef::output(1, 1);
        assert_eq!(output.node_type, NodeType::Output);
        assert!(!output.can_send());
        assert!(output.can_receive());

        let hidden = NodeDef::hidden(2, 7);
        assert_eq!(hidden.node_type, NodeType::Hidden);
        assert_eq!(hidden.innovation, 7);
        assert!(hidden.can_send() && hidden.can_receive());
    }

    #[test]
    fn test_inverted_ranges_are_ordered() {
        let mut node = NodeDef::hidden(3, 3);
        node.threshold_min = 2.0;
        node.threshold_max = -1.0;
        node.pulse_fast = 9;
        node.pulse_slow = 4;

        assert_eq!(node.threshold_range(), (-1.0, 2.0));
        assert_eq!(node.pulse_range(), (4, 9));
    }

    #[test]
    fn test_connection_def_creation() {
        let conn = ConnectionDef::new(100, 1, 2, 0.5, 0);
        assert_eq!(conn.source_id, 1);
        assert_eq!(conn.destination_id, 2);
        assert!((conn.weight - 0.5).abs() < 1e-12);
        assert_eq!(conn.length, 1, "length is clamped to at least one tick");
        assert!(conn.enabled);
        assert!(conn.links(2, 1));
        assert!(!conn.links(1, 3));
    }
}
