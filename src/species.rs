//! Species classification by distance to archetypes.
//!
//! Each live species is represented by one archetype genotype. A genotype
//! joins the species of the nearest archetype within the distance threshold,
//! or founds a new species with itself as archetype. After every generation
//! the live archetypes are archived into an append-only timeline per species
//! and the live set starts over.
//!
//! The live map sits behind a reader-biased lock: classification takes
//! shared access, founding a species takes exclusive access and re-checks
//! before allocating.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::genotype::{NetworkGenotype, SpeciesDistanceParameters, SpeciesId};

/// An archetype recorded at the end of a generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedArchetype {
    pub generation: usize,
    pub genotype: NetworkGenotype,
}

#[derive(Debug)]
struct LiveArchetypes {
    archetypes: BTreeMap<SpeciesId, NetworkGenotype>,
    next_species: SpeciesId,
}

/// Assigns species IDs and keeps archetype history.
#[derive(Debug)]
pub struct SpeciesManager {
    params: SpeciesDistanceParameters,
    archive_only_on_change: bool,
    live: RwLock<LiveArchetypes>,
    history: RwLock<BTreeMap<SpeciesId, Vec<ArchivedArchetype>>>,
}

impl SpeciesManager {
    /// # Panics
    ///
    /// Panics if `params` are malformed (see
    /// [`SpeciesDistanceParameters::is_valid`]).
    #[must_use]
    pub fn new(params: SpeciesDistanceParameters, archive_only_on_change: bool) -> Self {
        assert!(
            params.is_valid(),
            "Species distance parameters must be finite, non-negative and not all zero"
        );
        Self {
            params,
            archive_only_on_change,
            live: RwLock::new(LiveArchetypes {
                archetypes: BTreeMap::new(),
                next_species: 1,
            }),
            history: RwLock::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn params(&self) -> &SpeciesDistanceParameters {
        &self.params
    }

    /// Nearest archetype within the threshold; the lowest ID wins ties.
    fn nearest(
        &self,
        archetypes: &BTreeMap<SpeciesId, NetworkGenotype>,
        genotype: &NetworkGenotype,
    ) -> Option<SpeciesId> {
        let mut best: Option<(SpeciesId, f64)> = None;
        for (&id, archetype) in archetypes {
            let d = archetype.distance(genotype, &self.params);
            if d <= self.params.threshold && best.map_or(true, |(_, bd)| d < bd) {
                best = Some((id, d));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Species of `genotype`, founding a new species if no archetype is close enough.
    pub fn get_species_id(&self, genotype: &NetworkGenotype) -> SpeciesId {
        if let Some(id) = self.nearest(&self.live.read().archetypes, genotype) {
            return id;
        }

        let mut live = self.live.write();
        // another thread may have founded a matching species meanwhile
        if let Some(id) = self.nearest(&live.archetypes, genotype) {
            return id;
        }
        found(&mut live, genotype.clone())
    }

    /// Species of every genotype, in input order.
    ///
    /// Genotypes are first matched against the existing archetypes in
    /// parallel. The rest are grouped among themselves: the first unmatched
    /// genotype founds a species, every unmatched genotype within the
    /// threshold of it joins, and the process repeats.
    pub fn get_species_ids_of_genotypes(&self, genotypes: &[NetworkGenotype]) -> Vec<SpeciesId> {
        let mut ids: Vec<Option<SpeciesId>> = {
            let live = self.live.read();
            genotypes
                .par_iter()
                .map(|g| self.nearest(&live.archetypes, g))
                .collect()
        };

        let mut unknown: Vec<usize> = (0..genotypes.len()).filter(|&i| ids[i].is_none()).collect();
        if unknown.is_empty() {
            return ids.into_iter().flatten().collect();
        }

        let mut live = self.live.write();
        while let Some(&founder) = unknown.first() {
            let archetype = &genotypes[founder];
            let species = found(&mut live, archetype.clone());

            let joins: Vec<bool> = unknown
                .par_iter()
                .map(|&i| archetype.distance(&genotypes[i], &self.params) <= self.params.threshold)
                .collect();
            let mut rest = Vec::with_capacity(unknown.len());
            for (&i, joined) in unknown.iter().zip(joins) {
                if joined || i == founder {
                    ids[i] = Some(species);
                } else {
                    rest.push(i);
                }
            }
            unknown = rest;
        }

        ids.into_iter().flatten().collect()
    }

    /// Install `genotype` as the archetype of an existing species.
    pub fn set_archetype(&self, species: SpeciesId, genotype: NetworkGenotype) {
        let mut live = self.live.write();
        live.next_species = live.next_species.max(species.saturating_add(1));
        live.archetypes.insert(species, genotype);
    }

    /// Make sure newly founded species get IDs of at least `next`.
    pub fn reserve_species_ids(&self, next: SpeciesId) {
        let mut live = self.live.write();
        live.next_species = live.next_species.max(next);
    }

    /// Move the live archetypes into the history and clear them.
    ///
    /// With `archive_only_on_change`, an archetype at distance zero from the
    /// species' previous entry is not appended.
    pub fn archive_species_archetypes(&self, generation: usize) {
        let archetypes = std::mem::take(&mut self.live.write().archetypes);
        let mut history = self.history.write();
        for (species, genotype) in archetypes {
            let timeline = history.entry(species).or_default();
            let unchanged = self.archive_only_on_change
                && timeline
                    .last()
                    .is_some_and(|last| last.genotype.distance(&genotype, &self.params) == 0.0);
            if !unchanged {
                timeline.push(ArchivedArchetype {
                    generation,
                    genotype,
                });
            }
        }
    }

    #[must_use]
    pub fn archetype(&self, species: SpeciesId) -> Option<NetworkGenotype> {
        self.live.read().archetypes.get(&species).cloned()
    }

    /// Copy of the live archetype map.
    #[must_use]
    pub fn archetypes(&self) -> BTreeMap<SpeciesId, NetworkGenotype> {
        self.live.read().archetypes.clone()
    }

    #[must_use]
    pub fn num_live_species(&self) -> usize {
        self.live.read().archetypes.len()
    }

    /// ID the next founded species will receive.
    #[must_use]
    pub fn next_species_id(&self) -> SpeciesId {
        self.live.read().next_species
    }

    /// Archived timeline of one species, oldest first.
    #[must_use]
    pub fn history(&self, species: SpeciesId) -> Vec<ArchivedArchetype> {
        self.history
            .read()
            .get(&species)
            .cloned()
            .unwrap_or_default()
    }

    /// Species that have at least one archived archetype.
    #[must_use]
    pub fn archived_species(&self) -> Vec<SpeciesId> {
        self.history.read().keys().copied().collect()
    }
}

fn found(live: &mut LiveArchetypes, genotype: NetworkGenotype) -> SpeciesId {
    let id = live.next_species;
    live.next_species += 1;
    live.archetypes.insert(id, genotype);
    debug!(species = id, "founded species");
    id
}
