//! Runnable phenotypes built from genotypes.

use std::collections::BTreeMap;
use std::fmt;

use slotmap::SecondaryMap;

use crate::gene::{NodeDef, NodeId, NodeType};
use crate::genotype::NetworkGenotype;
use crate::simulator::{Network, NeuronKey, NeuronParams, NodeCallback, SignalValue, TickTime};

/// A genotype materialized as a spiking network.
///
/// Only the active subgraph of the genotype is built: one neuron per
/// reachable node and one synapse per active connection. Inputs and outputs
/// are bound in ascending node-ID order. The structure is fixed after
/// construction; only neuron state changes as the network ticks.
pub struct NetworkPhenotype<V = f64, T = u64> {
    network: Network<V, T>,
    inputs: Vec<NeuronKey>,
    outputs: Vec<NeuronKey>,
    node_keys: BTreeMap<NodeId, NeuronKey>,
    output_slots: SecondaryMap<NeuronKey, usize>,
    output_firings: Vec<(usize, V)>,
}

impl<V: SignalValue, T: TickTime> fmt::Debug for NetworkPhenotype<V, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkPhenotype")
            .field("network", &self.network)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .field("output_firings", &self.output_firings)
            .finish_non_exhaustive()
    }
}

impl<V: SignalValue, T: TickTime> NetworkPhenotype<V, T> {
    /// Build the phenotype of `genotype`.
    ///
    /// Inverted firing windows and refractory bounds are put in order here.
    #[must_use]
    pub fn from_genotype(genotype: &NetworkGenotype) -> Self {
        let reachable = genotype.reachable_node_ids();
        let mut network = Network::new();
        let mut node_keys = BTreeMap::new();

        for node in genotype.nodes() {
            if reachable.contains(&node.node_id) {
                node_keys.insert(node.node_id, network.add_neuron(neuron_params(node)));
            }
        }

        for conn in genotype.active_connections() {
            let (Some(&source), Some(&destination)) = (
                node_keys.get(&conn.source_id),
                node_keys.get(&conn.destination_id),
            ) else {
                continue;
            };
            network.connect(
                source,
                destination,
                V::from_f64(conn.weight),
                T::from_u32(conn.length),
            );
        }

        let keys_of = |node_type| -> Vec<NeuronKey> {
            genotype
                .node_ids_of_type(node_type)
                .iter()
                .filter_map(|id| node_keys.get(id).copied())
                .collect()
        };
        let inputs = keys_of(NodeType::Input);
        let outputs = keys_of(NodeType::Output);

        let mut output_slots = SecondaryMap::new();
        for (slot, &key) in outputs.iter().enumerate() {
            output_slots.insert(key, slot);
        }

        Self {
            network,
            inputs,
            outputs,
            node_keys,
            output_slots,
            output_firings: Vec::new(),
        }
    }

    /// Set the drive of input `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not an input slot.
    pub fn set_input(&mut self, index: usize, value: V) {
        let key = self.inputs[index];
        self.network.set_drive(key, value);
    }

    /// Set the drive of every input.
    ///
    /// # Panics
    ///
    /// Panics if `values` does not have one entry per input.
    pub fn set_inputs(&mut self, values: &[f64]) {
        assert_eq!(
            values.len(),
            self.inputs.len(),
            "Input length mismatch: expected {}, got {}",
            self.inputs.len(),
            values.len()
        );
        for (index, &value) in values.iter().enumerate() {
            self.set_input(index, V::from_f64(value));
        }
    }

    /// Register an observer for output `index`.
    pub fn bind_output_callback(&mut self, index: usize, callback: Box<dyn NodeCallback<V, T>>) {
        let key = self.outputs[index];
        self.network.set_callback(key, callback);
    }

    /// Advance one tick and return `(output index, value)` for every output
    /// that fired.
    pub fn tick(&mut self) -> &[(usize, V)] {
        self.output_firings.clear();
        for &(key, value) in self.network.tick() {
            if let Some(&slot) = self.output_slots.get(key) {
                self.output_firings.push((slot, value));
            }
        }
        &self.output_firings
    }

    /// Output firings of the most recent tick.
    #[must_use]
    pub fn output_firings(&self) -> &[(usize, V)] {
        &self.output_firings
    }

    /// Return to time zero, keeping the structure.
    pub fn reset(&mut self) {
        self.network.reset();
        self.output_firings.clear();
    }

    #[must_use]
    pub fn time(&self) -> T {
        self.network.time()
    }

    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    #[must_use]
    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    #[must_use]
    pub fn num_neurons(&self) -> usize {
        self.network.num_neurons()
    }

    #[must_use]
    pub fn num_synapses(&self) -> usize {
        self.network.num_synapses()
    }

    /// Neuron built for a node, if the node survived pruning.
    #[must_use]
    pub fn neuron_key(&self, node_id: NodeId) -> Option<NeuronKey> {
        self.node_keys.get(&node_id).copied()
    }

    #[must_use]
    pub fn network(&self) -> &Network<V, T> {
        &self.network
    }
}

fn neuron_params<V: SignalValue, T: TickTime>(node: &NodeDef) -> NeuronParams<V, T> {
    let (threshold_min, threshold_max) = node.threshold_range();
    let (pulse_fast, pulse_slow) = node.pulse_range();
    NeuronParams {
        threshold_min: V::from_f64(threshold_min),
        threshold_max: V::from_f64(threshold_max),
        value_decay: node.value_decay,
        activ_decay: node.activ_decay,
        pulse_fast: T::from_u32(pulse_fast),
        pulse_slow: T::from_u32(pulse_slow),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gene::ConnectionDef;

    fn relay(node: NodeDef) -> NodeDef {
        NodeDef {
            threshold_min: 1.0,
            threshold_max: 10.0,
            value_decay: 1.0,
            activ_decay: 0.0,
            pulse_fast: 0,
            pulse_slow: 0,
            ..node
        }
    }

    /// in(0) -> hidden(2) -> out(1), with an unreachable hidden(3) feeding the output.
    fn chain() -> NetworkGenotype {
        let mut g = NetworkGenotype::new();
        g.add_node(relay(NodeDef::input(0, 0)));
        g.add_node(relay(NodeDef::output(1, 1)));
        g.add_node(relay(NodeDef::hidden(2, 2)));
        g.add_node(relay(NodeDef::hidden(3, 3)));
        g.add_connection(ConnectionDef::new(10, 0, 2, 1.0, 2));
        g.add_connection(ConnectionDef::new(11, 2, 1, 1.0, 3));
        g.add_connection(ConnectionDef::new(12, 3, 1, 1.0, 1));
        g
    }

    #[test]
    fn test_pruned_structure() {
        let phenotype: NetworkPhenotype = NetworkPhenotype::from_genotype(&chain());
        assert_eq!(phenotype.num_neurons(), 3);
        assert_eq!(phenotype.num_synapses(), 2);
        assert_eq!(phenotype.num_inputs(), 1);
        assert_eq!(phenotype.num_outputs(), 1);
        assert!(phenotype.neuron_key(3).is_none());
    }

    #[test]
    fn test_signal_travels_through_delays() {
        let mut phenotype: NetworkPhenotype = NetworkPhenotype::from_genotype(&chain());
        phenotype.set_inputs(&[1.0]);

        // input fires at t=1, hidden at t=3, output at t=6
        let mut first_output = None;
        for _ in 0..10 {
            if !phenotype.tick().is_empty() && first_output.is_none() {
                first_output = Some(phenotype.time());
            }
        }
        assert_eq!(first_output, Some(6));
    }

    #[test]
    fn test_inverted_genes_are_normalized() {
        let mut g = chain();
        let node = g.node_mut(2).expect("node 2");
        node.threshold_min = 10.0;
        node.threshold_max = 1.0;
        node.pulse_fast = 5;
        node.pulse_slow = 2;

        let phenotype: NetworkPhenotype<f32, u32> = NetworkPhenotype::from_genotype(&g);
        let key = phenotype.neuron_key(2).expect("hidden survives");
        let params = phenotype.network().neuron(key).expect("neuron").params();
        assert!(params.threshold_min <= params.threshold_max);
        assert!(params.pulse_fast <= params.pulse_slow);
    }

    #[test]
    fn test_debug_summarizes_structure() {
        let phenotype: NetworkPhenotype<f32, u16> = NetworkPhenotype::from_genotype(&chain());
        let text = format!("{phenotype:?}");
        assert!(text.starts_with("NetworkPhenotype"));
        assert!(text.contains("neurons: 3"));
        assert!(text.contains("inputs: 1"));
    }

    #[test]
    #[should_panic(expected = "Input length mismatch")]
    fn test_wrong_input_count_panics() {
        let mut phenotype: NetworkPhenotype = NetworkPhenotype::from_genotype(&chain());
        phenotype.set_inputs(&[1.0, 2.0]);
    }
}
