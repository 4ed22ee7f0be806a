//! # Symbios Pulse
//!
//! NeuroEvolution of Augmenting Topologies (NEAT) for delay-aware spiking
//! networks.
//!
//! ## Features
//!
//! - **Pulse Simulator**: Discrete-event spiking networks where every synapse
//!   has a transmission delay and every neuron fires inside a threshold
//!   window, with refractory periods that lengthen as the neuron gets busier
//! - **Shared Innovations**: Identical structural mutations made in the same
//!   generation receive the same innovation numbers, even when made on
//!   different worker threads
//! - **Speciation**: Distance-based species with archetype history, fitness
//!   proportional allocation, kill delays and mass extinction
//! - **Parallel Generations**: Evaluation, crossover and mutation run on a
//!   `rayon` pool with a private random stream per task
//!
//! ## Quick Start
//!
//! ```rust
//! use symbios_pulse::{
//!     mutation, FitnessCalculator, FitnessFactory, NetworkPhenotype, Population,
//!     PopulationConfig,
//! };
//!
//! /// Rewards networks whose single output fires often.
//! struct Busy;
//!
//! struct BusyRun {
//!     firings: usize,
//! }
//!
//! impl FitnessCalculator for BusyRun {
//!     fn fitness_score(&self) -> f64 {
//!         self.firings as f64
//!     }
//!     fn max_num_timesteps(&self) -> u64 {
//!         50
//!     }
//!     fn input_values(&mut self, _time: u64) -> Vec<f64> {
//!         vec![1.0]
//!     }
//!     fn output_fired(&mut self, _output: usize, _time: u64, _value: f64) {
//!         self.firings += 1;
//!     }
//! }
//!
//! impl FitnessFactory for Busy {
//!     fn num_inputs(&self) -> usize {
//!         1
//!     }
//!     fn num_outputs(&self) -> usize {
//!         1
//!     }
//!     fn new_fitness_calculator(
//!         &self,
//!         _phenotype: &NetworkPhenotype,
//!         _test_index: usize,
//!     ) -> Box<dyn FitnessCalculator> {
//!         Box::new(BusyRun { firings: 0 })
//!     }
//! }
//!
//! let mut population =
//!     Population::new(PopulationConfig::minimal(12), Box::new(mutation::standard()))?;
//! population.init_fully_connected(1, 1);
//! for _ in 0..3 {
//!     let generation = population.iterate_generation(&Busy);
//!     assert!(generation.max_fitness >= generation.min_fitness);
//! }
//! assert_eq!(population.genotypes().len(), 12);
//! # Ok::<(), symbios_pulse::ConfigError>(())
//! ```
//!
//! ## Architecture
//!
//! ### Genotype and Phenotype
//!
//! A [`NetworkGenotype`] is a flat list of node and connection genes. Before a
//! genotype is run it is pruned to the nodes that lie on some path from an
//! input to an output, and the survivors are built into a
//! [`NetworkPhenotype`]. Disabled genes and dead ends stay in the genotype
//! for crossover but never cost simulation time.
//!
//! ### Generation Loop
//!
//! [`Population::iterate_generation`] runs speciation, evaluation,
//! archiving, the mass-extinction check, allocation, crossover and mutation
//! as strict phases. See [`population`] for details.

pub mod config;
pub mod error;
pub mod fitness;
pub mod gene;
pub mod generation;
pub mod genotype;
pub mod innovation;
pub mod mutation;
pub mod phenotype;
pub mod population;
pub mod rng;
pub mod simulator;
pub mod snapshot;
pub mod species;
pub mod splice;
pub mod topology;

// Re-exports for convenience
pub use config::{Bounds, MutationLimits, MutationRates, PopulationConfig};
pub use error::{ConfigError, SnapshotError};
pub use fitness::{evaluate_genotype, FitnessCalculator, FitnessFactory};
pub use gene::{ConnectionDef, InnovationId, NodeDef, NodeId, NodeType};
pub use generation::{Generation, GenerationHistory, SpeciesFitness};
pub use genotype::{
    network_genotype_distance, NetworkGenotype, SpeciesDistanceParameters, SpeciesId,
};
pub use innovation::{InnovationCounters, InnovationGenerator, NodeSplit};
pub use mutation::{MutationContext, Mutator};
pub use phenotype::NetworkPhenotype;
pub use population::{allocate_species_sizes, Population, SpeciesStanding};
pub use rng::{LocalRng, SharedRng};
pub use simulator::{Network, NeuronKey};
pub use snapshot::PopulationSnapshot;
pub use species::{ArchivedArchetype, SpeciesManager};
pub use splice::splice;
pub use topology::GraphTopology;
