//! Configuration for mutation and for the population loop.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::gene::{ConnectionDef, InnovationId, NodeDef, NodeId, NodeType};
use crate::genotype::SpeciesDistanceParameters;
use crate::rng::{uniform, uniform_u32};

/// Inclusive `[min, max]` range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy> Bounds<T> {
    #[must_use]
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn clamp(&self, value: T) -> T {
        if value < self.min {
            self.min
        } else if value > self.max {
            self.max
        } else {
            value
        }
    }

    #[must_use]
    pub fn is_ordered(&self) -> bool {
        self.min <= self.max
    }
}

/// Per-field ranges every gene value is kept inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationLimits {
    /// Range for both ends of the firing window.
    pub threshold: Bounds<f64>,
    pub value_decay: Bounds<f64>,
    pub activ_decay: Bounds<f64>,
    /// Range for both refractory durations.
    pub pulse: Bounds<u32>,
    pub weight: Bounds<f64>,
    pub length: Bounds<u32>,
}

impl Default for MutationLimits {
    fn default() -> Self {
        Self {
            threshold: Bounds::new(0.1, 4.0),
            value_decay: Bounds::new(0.0, 1.0),
            activ_decay: Bounds::new(0.0, 1.0),
            pulse: Bounds::new(1, 20),
            weight: Bounds::new(-2.0, 2.0),
            length: Bounds::new(1, 20),
        }
    }
}

impl MutationLimits {
    /// Check that every range is ordered and physically meaningful.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLimits`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = [
            ("threshold", self.threshold.is_ordered()),
            ("value_decay", self.value_decay.is_ordered()),
            ("activ_decay", self.activ_decay.is_ordered()),
            ("pulse", self.pulse.is_ordered()),
            ("weight", self.weight.is_ordered()),
            ("length", self.length.is_ordered()),
        ];
        if let Some((field, _)) = ordered.iter().find(|(_, ok)| !ok) {
            return Err(ConfigError::InvalidLimits(format!("{field}: min > max")));
        }
        for (field, b) in [
            ("value_decay", self.value_decay),
            ("activ_decay", self.activ_decay),
        ] {
            if b.min < 0.0 || b.max > 1.0 {
                let reason = format!("{field} must lie within [0, 1]");
                return Err(ConfigError::InvalidLimits(reason));
            }
        }
        if self.length.min == 0 {
            let reason = "length must be at least one tick".to_string();
            return Err(ConfigError::InvalidLimits(reason));
        }
        Ok(())
    }

    pub fn random_threshold<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        uniform(rng, self.threshold.min, self.threshold.max)
    }

    pub fn random_weight<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        uniform(rng, self.weight.min, self.weight.max)
    }

    pub fn random_length<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        uniform_u32(rng, self.length.min, self.length.max).max(1)
    }

    pub fn random_pulse<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        uniform_u32(rng, self.pulse.min, self.pulse.max)
    }

    /// Redraw every parameter of a node uniformly within the limits.
    pub fn randomize_node<R: Rng + ?Sized>(&self, node: &mut NodeDef, rng: &mut R) {
        node.threshold_min = self.random_threshold(rng);
        node.threshold_max = self.random_threshold(rng);
        node.value_decay = uniform(rng, self.value_decay.min, self.value_decay.max);
        node.activ_decay = uniform(rng, self.activ_decay.min, self.activ_decay.max);
        node.pulse_fast = self.random_pulse(rng);
        node.pulse_slow = self.random_pulse(rng);
    }

    /// Redraw weight and length of a connection uniformly within the limits.
    pub fn randomize_connection<R: Rng + ?Sized>(&self, conn: &mut ConnectionDef, rng: &mut R) {
        conn.weight = self.random_weight(rng);
        conn.length = self.random_length(rng);
    }

    /// A node with every parameter drawn uniformly within the limits.
    pub fn random_node<R: Rng + ?Sized>(
        &self,
        node_id: NodeId,
        innovation: InnovationId,
        node_type: NodeType,
        rng: &mut R,
    ) -> NodeDef {
        let mut node = NodeDef::new(node_id, innovation, node_type);
        self.randomize_node(&mut node, rng);
        node
    }
}

/// Standard deviations of the Gaussian perturbation applied per field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRates {
    pub threshold: f64,
    pub value_decay: f64,
    pub activ_decay: f64,
    pub pulse: f64,
    pub weight: f64,
    pub length: f64,
}

impl Default for MutationRates {
    fn default() -> Self {
        Self {
            threshold: 0.25,
            value_decay: 0.05,
            activ_decay: 0.05,
            pulse: 2.0,
            weight: 0.25,
            length: 2.0,
        }
    }
}

/// Configuration for [`Population`](crate::Population).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Fixed number of genotypes per generation.
    pub population_size: usize,
    /// Smallest allocation a struggling species is granted while its kill
    /// delay lasts.
    pub min_species_size: usize,
    /// Consecutive under-size generations after which a species gets no slots.
    pub kill_delay_limit: u32,
    /// Length of the rolling window of average fitness checked for stagnation.
    pub mass_extinction_timer: usize,
    /// Required improvement between the two halves of the window.
    pub mass_extinction_epsilon: f64,
    /// Fraction of each species excluded from mating.
    pub attrition_rate: f64,
    /// Keep full genotype copies in each [`Generation`](crate::Generation).
    pub keeps_genotype_copies: bool,
    /// Number of generation records retained.
    pub generations_to_keep: usize,
    /// Only archive archetypes whose genes changed since the last entry.
    pub archive_only_on_change: bool,
    /// Worker threads; `None` uses rayon's default.
    pub num_threads: Option<usize>,
    /// Seed of the shared random stream. Random draws are reproducible, but
    /// node and innovation IDs handed out during parallel mutation follow
    /// worker scheduling, so IDs may differ between runs with the same seed.
    pub seed: u64,
    pub distance: SpeciesDistanceParameters,
    pub limits: MutationLimits,
    pub rates: MutationRates,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            population_size: 150,
            min_species_size: 5,
            kill_delay_limit: 10,
            mass_extinction_timer: 30,
            mass_extinction_epsilon: 0.1,
            attrition_rate: 0.5,
            keeps_genotype_copies: false,
            generations_to_keep: 10,
            archive_only_on_change: true,
            num_threads: None,
            seed: 42,
            distance: SpeciesDistanceParameters::default(),
            limits: MutationLimits::default(),
            rates: MutationRates::default(),
        }
    }
}

impl PopulationConfig {
    /// A small configuration for tests and demos.
    #[must_use]
    pub fn minimal(population_size: usize) -> Self {
        Self {
            population_size,
            min_species_size: 1,
            kill_delay_limit: 3,
            mass_extinction_timer: 8,
            num_threads: Some(2),
            ..Default::default()
        }
    }

    /// Reject configurations that could only fail mid-run.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        if self.population_size < 2 * self.min_species_size {
            return Err(ConfigError::PopulationTooSmall {
                population_size: self.population_size,
                min_species_size: self.min_species_size,
            });
        }
        if self.mass_extinction_timer <= self.kill_delay_limit as usize {
            return Err(ConfigError::ExtinctionTimerTooShort {
                timer: self.mass_extinction_timer,
                kill_delay_limit: self.kill_delay_limit,
            });
        }
        if !(0.0..1.0).contains(&self.attrition_rate) {
            return Err(ConfigError::InvalidAttritionRate(self.attrition_rate));
        }
        if self.generations_to_keep == 0 {
            return Err(ConfigError::GenerationsToKeepZero);
        }
        self.distance.validate()?;
        self.limits.validate()
    }
}
