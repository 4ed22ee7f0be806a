//! Per-generation fitness records.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::genotype::{NetworkGenotype, SpeciesId};

/// Fitness summary of one species in one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesFitness {
    /// Fitness of every member, in population order.
    pub fitnesses: Vec<f64>,
    pub average: f64,
    pub best: f64,
}

impl SpeciesFitness {
    /// Summarize member scores.
    ///
    /// # Panics
    ///
    /// Panics if `fitnesses` is empty.
    #[must_use]
    pub fn from_scores(fitnesses: Vec<f64>) -> Self {
        assert!(!fitnesses.is_empty(), "a species needs at least one member");
        let average = fitnesses.iter().sum::<f64>() / fitnesses.len() as f64;
        let best = fitnesses.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            fitnesses,
            average,
            best,
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.fitnesses.len()
    }
}

/// Snapshot of one evaluated generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub number: usize,
    pub species: BTreeMap<SpeciesId, SpeciesFitness>,
    pub min_fitness: f64,
    pub max_fitness: f64,
    pub average_fitness: f64,
    /// `(species, fitness, genotype)` per individual, when copies are kept.
    /// Shared copies are not serialized; a deserialized record has `None`.
    #[serde(skip)]
    pub genotypes: Option<Vec<(SpeciesId, f64, Arc<NetworkGenotype>)>>,
}

impl Generation {
    /// Build the record from per-individual species and scores.
    #[must_use]
    pub fn new(number: usize, species: &[SpeciesId], fitnesses: &[f64]) -> Self {
        debug_assert_eq!(species.len(), fitnesses.len());

        let mut grouped: BTreeMap<SpeciesId, Vec<f64>> = BTreeMap::new();
        for (&id, &fitness) in species.iter().zip(fitnesses) {
            grouped.entry(id).or_default().push(fitness);
        }

        let (min_fitness, max_fitness, average_fitness) = if fitnesses.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            (
                fitnesses.iter().copied().fold(f64::INFINITY, f64::min),
                fitnesses.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                fitnesses.iter().sum::<f64>() / fitnesses.len() as f64,
            )
        };

        Self {
            number,
            species: grouped
                .into_iter()
                .map(|(id, scores)| (id, SpeciesFitness::from_scores(scores)))
                .collect(),
            min_fitness,
            max_fitness,
            average_fitness,
            genotypes: None,
        }
    }

    /// Attach copies of the evaluated genotypes.
    #[must_use]
    pub fn with_genotypes(
        mut self,
        species: &[SpeciesId],
        fitnesses: &[f64],
        genotypes: &[NetworkGenotype],
    ) -> Self {
        self.genotypes = Some(
            species
                .iter()
                .zip(fitnesses)
                .zip(genotypes)
                .map(|((&id, &fitness), g)| (id, fitness, Arc::new(g.clone())))
                .collect(),
        );
        self
    }

    #[must_use]
    pub fn num_species(&self) -> usize {
        self.species.len()
    }

    /// Species with the highest average fitness; the lowest ID wins ties.
    #[must_use]
    pub fn best_species(&self) -> Option<SpeciesId> {
        let mut best: Option<(SpeciesId, f64)> = None;
        for (&id, s) in &self.species {
            if best.map_or(true, |(_, avg)| s.average > avg) {
                best = Some((id, s.average));
            }
        }
        best.map(|(id, _)| id)
    }
}

/// The most recent generations, oldest first.
#[derive(Debug, Clone)]
pub struct GenerationHistory {
    capacity: usize,
    records: VecDeque<Generation>,
}

impl GenerationHistory {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "generation history needs room for one record");
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a record, dropping the oldest when full.
    pub fn push(&mut self, generation: Generation) -> &Generation {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(generation);
        &self.records[self.records.len() - 1]
    }

    #[must_use]
    pub fn latest(&self) -> Option<&Generation> {
        self.records.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Generation> {
        self.records.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_summary() {
        let generation = Generation::new(3, &[1, 2, 1, 2], &[1.0, 10.0, 3.0, 6.0]);
        assert_eq!(generation.number, 3);
        assert_eq!(generation.num_species(), 2);
        assert_eq!(generation.min_fitness, 1.0);
        assert_eq!(generation.max_fitness, 10.0);
        assert!((generation.average_fitness - 5.0).abs() < 1e-12);

        let s1 = &generation.species[&1];
        assert_eq!(s1.fitnesses, vec![1.0, 3.0]);
        assert!((s1.average - 2.0).abs() < 1e-12);
        assert_eq!(s1.best, 3.0);
        assert_eq!(generation.best_species(), Some(2));
        assert!(generation.genotypes.is_none());
    }

    #[test]
    fn test_json_roundtrip_drops_genotype_copies() {
        let genotype = NetworkGenotype::new();
        let generation = Generation::new(1, &[4, 4], &[2.0, 3.0]).with_genotypes(
            &[4, 4],
            &[2.0, 3.0],
            &[genotype.clone(), genotype],
        );
        assert_eq!(generation.genotypes.as_ref().map(Vec::len), Some(2));

        let json = serde_json::to_string(&generation).expect("Serialization failed");
        let restored: Generation = serde_json::from_str(&json).expect("Deserialization failed");
        assert!(restored.genotypes.is_none());
        assert_eq!(restored.number, 1);
        assert_eq!(restored.species, generation.species);
        assert_eq!(restored.max_fitness, 3.0);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut history = GenerationHistory::new(2);
        for n in 0..5 {
            history.push(Generation::new(n, &[1], &[n as f64]));
        }
        assert_eq!(history.len(), 2);
        let numbers: Vec<_> = history.iter().map(|g| g.number).collect();
        assert_eq!(numbers, vec![3, 4]);
        assert_eq!(history.latest().map(|g| g.number), Some(4));
    }
}
