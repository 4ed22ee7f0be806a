//! Saving and restoring populations as JSON.
//!
//! A [`PopulationSnapshot`] holds everything needed to continue a run:
//! the configuration, the current genotypes, the innovation counters and
//! the live species archetypes. Generation records and archetype history
//! are not persisted.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::PopulationConfig;
use crate::error::SnapshotError;
use crate::genotype::{NetworkGenotype, SpeciesId};
use crate::innovation::{InnovationCounters, InnovationGenerator};
use crate::mutation::Mutator;
use crate::population::Population;
use crate::rng::SharedRng;

/// Serializable state of a [`Population`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationSnapshot {
    pub generation: usize,
    pub config: PopulationConfig,
    pub genotypes: Vec<NetworkGenotype>,
    pub counters: InnovationCounters,
    pub archetypes: BTreeMap<SpeciesId, NetworkGenotype>,
    pub next_species_id: SpeciesId,
    pub kill_delays: BTreeMap<SpeciesId, u32>,
    pub extinction_window: Vec<f64>,
}

impl PopulationSnapshot {
    /// # Errors
    ///
    /// Returns [`SnapshotError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// # Errors
    ///
    /// Returns [`SnapshotError::Json`] for malformed input.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Population {
    /// Capture the state needed to resume this population.
    #[must_use]
    pub fn snapshot(&self) -> PopulationSnapshot {
        PopulationSnapshot {
            generation: self.generation,
            config: self.config.clone(),
            genotypes: self.genotypes.clone(),
            counters: self.innovations.counters(),
            archetypes: self.species.archetypes(),
            next_species_id: self.species.next_species_id(),
            kill_delays: self.kill_delays.clone(),
            extinction_window: self.extinction_window.iter().copied().collect(),
        }
    }

    /// Resume a population from a snapshot.
    ///
    /// The random stream restarts from the configured seed mixed with the
    /// generation number rather than continuing the original stream.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Config`] if the stored configuration is
    /// invalid and [`SnapshotError::SizeMismatch`] if the genotype count
    /// disagrees with it.
    pub fn from_snapshot(
        snapshot: PopulationSnapshot,
        mutator: Box<dyn Mutator>,
    ) -> Result<Self, SnapshotError> {
        let expected = snapshot.config.population_size;
        if snapshot.genotypes.len() != expected {
            return Err(SnapshotError::SizeMismatch {
                expected,
                found: snapshot.genotypes.len(),
            });
        }

        let mut population = Self::new(snapshot.config, mutator)?;
        population.rng = SharedRng::seed_from_u64(
            population.config.seed ^ (snapshot.generation as u64).rotate_left(32),
        );
        population.innovations = InnovationGenerator::with_counters(snapshot.counters);
        for (species, archetype) in snapshot.archetypes {
            population.species.set_archetype(species, archetype);
        }
        population.species.reserve_species_ids(snapshot.next_species_id);
        population.genotypes = snapshot.genotypes;
        population.generation = snapshot.generation;
        population.kill_delays = snapshot.kill_delays;
        population.extinction_window = VecDeque::from(snapshot.extinction_window);

        info!(
            generation = population.generation,
            size = population.genotypes.len(),
            "population restored"
        );
        Ok(population)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::standard;

    #[test]
    fn test_snapshot_json_roundtrip() {
        let mut population =
            Population::new(PopulationConfig::minimal(8), Box::new(standard())).expect("config");
        population.init_fully_connected(2, 1);
        population.species.set_archetype(3, population.genotypes[0].clone());

        let snapshot = population.snapshot();
        let json = snapshot.to_json().expect("serialize");
        let restored = PopulationSnapshot::from_json(&json).expect("deserialize");
        assert_eq!(restored, snapshot);

        let resumed = Population::from_snapshot(restored, Box::new(standard())).expect("resume");
        assert_eq!(resumed.genotypes(), population.genotypes());
        assert_eq!(
            resumed.innovations().counters(),
            population.innovations().counters()
        );
        assert_eq!(resumed.species_manager().next_species_id(), 4);
        assert!(resumed.species_manager().archetype(3).is_some());
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let mut population =
            Population::new(PopulationConfig::minimal(8), Box::new(standard())).expect("config");
        population.init_fully_connected(2, 1);
        let mut snapshot = population.snapshot();
        snapshot.genotypes.pop();

        let err = Population::from_snapshot(snapshot, Box::new(standard())).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::SizeMismatch {
                expected: 8,
                found: 7
            }
        ));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            PopulationSnapshot::from_json("{ not json"),
            Err(SnapshotError::Json(_))
        ));
    }
}
