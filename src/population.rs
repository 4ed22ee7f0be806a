//! The generation loop.
//!
//! [`Population::iterate_generation`] runs one full generation as a fixed
//! sequence of phases, each a barrier for the next:
//!
//! 1. **Speciate**: classify every genotype against the species archetypes.
//! 2. **Fitness**: evaluate all genotypes in parallel.
//! 3. **Archive**: record a [`Generation`] and archive the archetypes.
//! 4. **Mass extinction check**: cull to the two best species when the
//!    rolling average fitness stops improving.
//! 5. **Allocate**: size each species' next generation with
//!    [`allocate_species_sizes`].
//! 6. **Splice**: copy each species' best genotype, fill the rest with
//!    children of its fitter members.
//! 7. **Mutate**: mutate every child except the copied elites.
//! 8. **Swap**: the children become the population.
//!
//! Parallel phases run on the population's own worker pool. Every task draws
//! from a private generator seeded from the population's shared generator
//! before the phase starts.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, info, warn};

use crate::config::PopulationConfig;
use crate::error::ConfigError;
use crate::fitness::{evaluate_genotype, FitnessFactory};
use crate::generation::{Generation, GenerationHistory};
use crate::genotype::{NetworkGenotype, SpeciesId};
use crate::innovation::InnovationGenerator;
use crate::mutation::{MutationContext, Mutator};
use crate::rng::{LocalRng, SharedRng};
use crate::species::SpeciesManager;
use crate::splice::splice;

/// A species as seen by the allocator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeciesStanding {
    pub species: SpeciesId,
    pub average_fitness: f64,
    /// Number of members this generation.
    pub size: usize,
}

/// Split `config.population_size` slots among species.
///
/// Shares are proportional to `average - lowest average + 1`. A species
/// whose share falls below `min_species_size` is lifted to the minimum until
/// it has been under-size for more than `kill_delay_limit` consecutive
/// generations, after which it gets nothing. The best species never
/// accumulates delay. Each share is then averaged with the species' current
/// size, and rounding drift is corrected one slot at a time on the smallest
/// (when short) or largest (when over) surviving species, ties broken at
/// random. The result always sums to `population_size`.
///
/// `kill_delays` is updated in place; entries of absent species are dropped.
pub fn allocate_species_sizes<R: Rng + ?Sized>(
    standings: &[SpeciesStanding],
    kill_delays: &mut BTreeMap<SpeciesId, u32>,
    config: &PopulationConfig,
    rng: &mut R,
) -> BTreeMap<SpeciesId, usize> {
    kill_delays.retain(|id, _| standings.iter().any(|s| s.species == *id));
    let mut sizes = BTreeMap::new();
    let Some(best) = best_standing(standings) else {
        return sizes;
    };

    let min_average = standings
        .iter()
        .map(|s| s.average_fitness)
        .fold(f64::INFINITY, f64::min);
    let weights: Vec<f64> = standings
        .iter()
        .map(|s| s.average_fitness - min_average + 1.0)
        .collect();
    let total_weight: f64 = weights.iter().sum();
    let population = config.population_size as f64;
    let min_size = config.min_species_size as f64;

    for (standing, weight) in standings.iter().zip(&weights) {
        let share = population * weight / total_weight;
        let delay = kill_delays.entry(standing.species).or_insert(0);

        let target = if standing.species == best {
            *delay = 0;
            share.max(min_size)
        } else if share < min_size {
            *delay += 1;
            if *delay > config.kill_delay_limit {
                0.0
            } else {
                min_size
            }
        } else {
            *delay = 0;
            share
        };

        let size = if target > 0.0 {
            ((target + standing.size as f64) / 2.0).round().max(1.0) as usize
        } else {
            0
        };
        sizes.insert(standing.species, size);
    }

    rebalance(&mut sizes, standings, best, config.population_size, rng);
    sizes
}

/// Highest average fitness; the lowest ID wins ties.
fn best_standing(standings: &[SpeciesStanding]) -> Option<SpeciesId> {
    let mut best: Option<&SpeciesStanding> = None;
    for s in standings {
        let better = best.map_or(true, |b| {
            s.average_fitness > b.average_fitness
                || (s.average_fitness == b.average_fitness && s.species < b.species)
        });
        if better {
            best = Some(s);
        }
    }
    best.map(|s| s.species)
}

fn rebalance<R: Rng + ?Sized>(
    sizes: &mut BTreeMap<SpeciesId, usize>,
    standings: &[SpeciesStanding],
    best: SpeciesId,
    total: usize,
    rng: &mut R,
) {
    loop {
        let sum: usize = sizes.values().sum();
        if sum == total {
            return;
        }

        let alive: Vec<(SpeciesId, usize)> = sizes
            .iter()
            .filter(|(_, &n)| n > 0)
            .map(|(&id, &n)| (id, n))
            .collect();

        if sum < total {
            let smallest = alive.iter().map(|&(_, n)| n).min().unwrap_or(0);
            let ties: Vec<SpeciesId> = alive
                .iter()
                .filter(|&&(_, n)| n == smallest)
                .map(|&(id, _)| id)
                .collect();
            // the best species is never zeroed, so `ties` is not empty
            let id = ties[rng.random_range(0..ties.len())];
            *sizes.entry(id).or_insert(0) += 1;
            continue;
        }

        let largest = alive.iter().map(|&(_, n)| n).max().unwrap_or(0);
        if largest > 1 {
            let ties: Vec<SpeciesId> = alive
                .iter()
                .filter(|&&(_, n)| n == largest)
                .map(|&(id, _)| id)
                .collect();
            let id = ties[rng.random_range(0..ties.len())];
            *sizes.entry(id).or_insert(1) -= 1;
            continue;
        }

        // every survivor is down to one slot: drop the weakest
        let worst = standings
            .iter()
            .filter(|s| s.species != best && sizes.get(&s.species).is_some_and(|&n| n > 0))
            .min_by(|a, b| {
                a.average_fitness
                    .total_cmp(&b.average_fitness)
                    .then(b.species.cmp(&a.species))
            })
            .map(|s| s.species);
        match worst {
            Some(id) => {
                sizes.insert(id, 0);
            }
            None => return,
        }
    }
}

/// A fixed-size population evolving under a fitness task.
pub struct Population {
    pub(crate) config: PopulationConfig,
    pub(crate) mutator: Box<dyn Mutator>,
    pool: ThreadPool,
    pub(crate) rng: SharedRng,
    pub(crate) innovations: InnovationGenerator,
    pub(crate) species: SpeciesManager,
    pub(crate) genotypes: Vec<NetworkGenotype>,
    pub(crate) generation: usize,
    pub(crate) kill_delays: BTreeMap<SpeciesId, u32>,
    pub(crate) extinction_window: VecDeque<f64>,
    history: GenerationHistory,
    best: Option<(NetworkGenotype, f64)>,
}

impl fmt::Debug for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Population")
            .field("generation", &self.generation)
            .field("size", &self.genotypes.len())
            .field("mutator", &self.mutator.name())
            .field("threads", &self.pool.current_num_threads())
            .field("kill_delays", &self.kill_delays)
            .finish_non_exhaustive()
    }
}

impl Population {
    /// Validate `config` and start an empty population.
    ///
    /// # Errors
    ///
    /// Returns the first configuration problem found, or
    /// [`ConfigError::WorkerPool`] if the worker threads cannot be started.
    pub fn new(config: PopulationConfig, mutator: Box<dyn Mutator>) -> Result<Self, ConfigError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_threads.unwrap_or(0))
            .thread_name(|i| format!("pulse-worker-{i}"))
            .build()
            .map_err(|e| ConfigError::WorkerPool(e.to_string()))?;

        Ok(Self {
            rng: SharedRng::seed_from_u64(config.seed),
            species: SpeciesManager::new(config.distance.clone(), config.archive_only_on_change),
            history: GenerationHistory::new(config.generations_to_keep),
            innovations: InnovationGenerator::new(),
            genotypes: Vec::new(),
            generation: 0,
            kill_delays: BTreeMap::new(),
            extinction_window: VecDeque::new(),
            best: None,
            mutator,
            pool,
            config,
        })
    }

    /// Fill the population with copies of `template`, each with parameters
    /// redrawn uniformly within the mutation limits.
    pub fn init(&mut self, template: &NetworkGenotype) {
        self.innovations.reserve(
            template.max_node_id().unwrap_or(0),
            template.max_innovation().unwrap_or(0),
        );
        let mut rng = self.rng.fork();
        let limits = &self.config.limits;
        self.genotypes = (0..self.config.population_size)
            .map(|_| {
                let mut genotype = template.clone();
                genotype.randomize_parameters(limits, &mut rng);
                genotype.set_species(0);
                genotype
            })
            .collect();
        info!(
            size = self.genotypes.len(),
            nodes = template.num_nodes(),
            connections = template.num_connections(),
            "population initialized"
        );
    }

    /// [`init`](Self::init) from a fully connected input×output template.
    pub fn init_fully_connected(&mut self, num_inputs: usize, num_outputs: usize) {
        let template = NetworkGenotype::template(num_inputs, num_outputs, &self.config.limits);
        self.init(&template);
    }

    /// Run one generation and return its record.
    ///
    /// # Panics
    ///
    /// Panics if the population has not been initialized, or if the
    /// genotypes do not match the factory's input and output counts.
    pub fn iterate_generation(&mut self, factory: &dyn FitnessFactory) -> &Generation {
        assert!(
            !self.genotypes.is_empty(),
            "Population not initialized; call init() first"
        );

        // speciate
        let species_ids = self
            .pool
            .install(|| self.species.get_species_ids_of_genotypes(&self.genotypes));
        for (genotype, &id) in self.genotypes.iter_mut().zip(&species_ids) {
            genotype.set_species(id);
        }

        // fitness
        let mut fitnesses: Vec<f64> = self.pool.install(|| {
            self.genotypes
                .par_iter()
                .map(|g| evaluate_genotype(factory, g))
                .collect()
        });
        let invalid = fitnesses.iter().filter(|f| !f.is_finite()).count();
        if invalid > 0 {
            warn!(
                count = invalid,
                "non-finite fitness scores replaced by zero"
            );
            for f in fitnesses.iter_mut().filter(|f| !f.is_finite()) {
                *f = 0.0;
            }
        }

        // archive
        let mut record = Generation::new(self.generation, &species_ids, &fitnesses);
        if self.config.keeps_genotype_copies {
            record = record.with_genotypes(&species_ids, &fitnesses, &self.genotypes);
        }
        self.species.archive_species_archetypes(self.generation);
        if let Some((index, &fitness)) = fitnesses
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
        {
            self.best = Some((self.genotypes[index].clone(), fitness));
        }

        // members of each species, fittest first
        let mut members: BTreeMap<SpeciesId, Vec<usize>> = BTreeMap::new();
        for (index, &id) in species_ids.iter().enumerate() {
            members.entry(id).or_default().push(index);
        }
        for list in members.values_mut() {
            list.sort_by(|&a, &b| fitnesses[b].total_cmp(&fitnesses[a]).then(a.cmp(&b)));
        }

        self.check_mass_extinction(record.average_fitness, &mut members, &fitnesses);

        // allocate
        let standings: Vec<SpeciesStanding> = members
            .iter()
            .map(|(&species, list)| SpeciesStanding {
                species,
                average_fitness: list.iter().map(|&i| fitnesses[i]).sum::<f64>()
                    / list.len() as f64,
                size: list.len(),
            })
            .collect();
        let sizes = self.rng.with(|rng| {
            allocate_species_sizes(&standings, &mut self.kill_delays, &self.config, rng)
        });
        debug!(?sizes, "species allocation");

        for (&species, &size) in &sizes {
            if size > 0 {
                let elite = members[&species][0];
                self.species
                    .set_archetype(species, self.genotypes[elite].clone());
            }
        }

        // splice
        let mut next = Vec::with_capacity(self.config.population_size);
        let mut matings: Vec<(SpeciesId, usize, usize)> = Vec::new();
        let attrition = self.config.attrition_rate;
        self.rng.with(|rng| {
            for (&species, &size) in sizes.iter().filter(|(_, &n)| n > 0) {
                let list = &members[&species];
                next.push(self.genotypes[list[0]].clone());

                let breeders =
                    ((list.len() as f64 * (1.0 - attrition)).ceil() as usize).clamp(1, list.len());
                for _ in 1..size {
                    let a = list[rng.random_range(0..breeders)];
                    let b = list[rng.random_range(0..breeders)];
                    matings.push((species, a, b));
                }
            }
        });
        let elites = next.len();

        let seeds = self.rng.seeds(matings.len());
        let genotypes = &self.genotypes;
        let mut children: Vec<NetworkGenotype> = self.pool.install(|| {
            matings
                .par_iter()
                .zip(seeds.par_iter())
                .map(|(&(species, a, b), &seed)| {
                    let mut rng = LocalRng::seed_from_u64(seed);
                    let mut child = if a == b {
                        genotypes[a].clone()
                    } else {
                        splice(&[&genotypes[a], &genotypes[b]], &mut rng)
                    };
                    child.set_species(species);
                    child
                })
                .collect()
        });

        // mutate
        self.innovations.clear_generation();
        let seeds = self.rng.seeds(children.len());
        let ctx = MutationContext {
            innovations: &self.innovations,
            rates: &self.config.rates,
            limits: &self.config.limits,
        };
        let mutator = &self.mutator;
        let mutations: usize = self.pool.install(|| {
            children
                .par_iter_mut()
                .zip(seeds.par_iter())
                .map(|(child, &seed)| {
                    let mut rng = LocalRng::seed_from_u64(seed);
                    mutator.mutate(child, &ctx, &mut rng)
                })
                .sum()
        });
        debug!(
            elites,
            children = children.len(),
            mutations,
            new_structures = self.innovations.tracked_this_generation(),
            "offspring produced"
        );

        // swap
        next.append(&mut children);
        next.truncate(self.config.population_size);
        debug_assert_eq!(next.len(), self.config.population_size);
        self.genotypes = next;

        info!(
            generation = record.number,
            species = record.num_species(),
            min = record.min_fitness,
            avg = record.average_fitness,
            max = record.max_fitness,
            "generation complete"
        );
        self.generation += 1;
        self.history.push(record)
    }

    /// Maintain the rolling window and cull the population when it stalls.
    fn check_mass_extinction(
        &mut self,
        average_fitness: f64,
        members: &mut BTreeMap<SpeciesId, Vec<usize>>,
        fitnesses: &[f64],
    ) {
        let timer = self.config.mass_extinction_timer;
        self.extinction_window.push_back(average_fitness);
        while self.extinction_window.len() > timer {
            self.extinction_window.pop_front();
        }
        let half = timer / 2;
        if self.extinction_window.len() < timer || half == 0 {
            return;
        }

        let earlier = self.extinction_window.iter().take(half).sum::<f64>() / half as f64;
        let later = self.extinction_window.iter().skip(half).sum::<f64>() / (timer - half) as f64;
        if later - earlier >= self.config.mass_extinction_epsilon {
            return;
        }

        let mut ranked: Vec<(SpeciesId, f64)> = members
            .iter()
            .map(|(&id, list)| {
                let avg = list.iter().map(|&i| fitnesses[i]).sum::<f64>() / list.len() as f64;
                (id, avg)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        let survivors: Vec<SpeciesId> = ranked.iter().take(2).map(|&(id, _)| id).collect();

        members.retain(|id, _| survivors.contains(id));
        for list in members.values_mut() {
            list.truncate(1);
        }
        self.extinction_window.clear();
        warn!(
            generation = self.generation,
            earlier,
            later,
            ?survivors,
            "mass extinction"
        );
    }

    #[must_use]
    pub fn config(&self) -> &PopulationConfig {
        &self.config
    }

    /// Genotypes of the current generation.
    #[must_use]
    pub fn genotypes(&self) -> &[NetworkGenotype] {
        &self.genotypes
    }

    /// Number of generations run so far.
    #[must_use]
    pub fn generation(&self) -> usize {
        self.generation
    }

    #[must_use]
    pub fn history(&self) -> &GenerationHistory {
        &self.history
    }

    #[must_use]
    pub fn last_generation(&self) -> Option<&Generation> {
        self.history.latest()
    }

    /// Fittest genotype of the last evaluated generation.
    #[must_use]
    pub fn best_genotype(&self) -> Option<&NetworkGenotype> {
        self.best.as_ref().map(|(g, _)| g)
    }

    #[must_use]
    pub fn best_fitness(&self) -> Option<f64> {
        self.best.as_ref().map(|&(_, f)| f)
    }

    /// Species with the highest average fitness in the last generation.
    #[must_use]
    pub fn best_species(&self) -> Option<SpeciesId> {
        self.history.latest().and_then(Generation::best_species)
    }

    /// Current genotypes descended from `species`.
    #[must_use]
    pub fn species_members(&self, species: SpeciesId) -> Vec<&NetworkGenotype> {
        self.genotypes
            .iter()
            .filter(|g| g.species() == species)
            .collect()
    }

    /// Consecutive under-size generations per species.
    #[must_use]
    pub fn kill_delays(&self) -> &BTreeMap<SpeciesId, u32> {
        &self.kill_delays
    }

    #[must_use]
    pub fn species_manager(&self) -> &SpeciesManager {
        &self.species
    }

    #[must_use]
    pub fn innovations(&self) -> &InnovationGenerator {
        &self.innovations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;

    fn standing(species: SpeciesId, average_fitness: f64, size: usize) -> SpeciesStanding {
        SpeciesStanding {
            species,
            average_fitness,
            size,
        }
    }

    #[test]
    fn test_fitter_species_gets_more_slots() {
        let config = PopulationConfig::minimal(10);
        let mut delays = BTreeMap::new();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let sizes = allocate_species_sizes(
            &[standing(1, 5.0, 5), standing(2, 10.0, 5)],
            &mut delays,
            &config,
            &mut rng,
        );
        assert_eq!(sizes.values().sum::<usize>(), 10);
        assert!(sizes[&2] > sizes[&1]);
    }

    #[test]
    fn test_allocation_always_sums_to_population() {
        let config = PopulationConfig {
            min_species_size: 2,
            ..PopulationConfig::minimal(23)
        };
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for round in 0..50_u32 {
            let mut delays = BTreeMap::new();
            let standings: Vec<_> = (1..=7)
                .map(|id| standing(id, f64::from((id * 13 + round) % 11), (id as usize % 4) + 1))
                .collect();
            let sizes = allocate_species_sizes(&standings, &mut delays, &config, &mut rng);
            assert_eq!(sizes.values().sum::<usize>(), 23);
        }
    }

    #[test]
    fn test_struggling_species_is_killed_after_delay() {
        let config = PopulationConfig {
            min_species_size: 3,
            kill_delay_limit: 1,
            ..PopulationConfig::minimal(10)
        };
        let standings = [standing(1, 100.0, 8), standing(2, 0.0, 2)];
        let mut delays = BTreeMap::new();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let first = allocate_species_sizes(&standings, &mut delays, &config, &mut rng);
        assert!(first[&2] > 0);
        assert_eq!(delays[&2], 1);
        assert_eq!(delays[&1], 0);

        let second = allocate_species_sizes(&standings, &mut delays, &config, &mut rng);
        assert_eq!(second[&2], 0);
        assert_eq!(second[&1], 10);
    }

    #[test]
    fn test_absent_species_lose_their_delay() {
        let config = PopulationConfig::minimal(10);
        let mut delays = BTreeMap::from([(9, 4)]);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let sizes = allocate_species_sizes(&[standing(1, 1.0, 10)], &mut delays, &config, &mut rng);
        assert_eq!(sizes[&1], 10);
        assert!(!delays.contains_key(&9));
    }

    #[test]
    fn test_overfull_singletons_drop_weakest() {
        let config = PopulationConfig {
            min_species_size: 1,
            ..PopulationConfig::minimal(3)
        };
        let standings: Vec<_> = (1..=5).map(|id| standing(id, f64::from(id), 1)).collect();
        let mut delays = BTreeMap::new();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let sizes = allocate_species_sizes(&standings, &mut delays, &config, &mut rng);
        assert_eq!(sizes.values().sum::<usize>(), 3);
        assert_eq!(sizes[&5], 1, "best species survives");
        assert_eq!(sizes[&1], 0);
        assert_eq!(sizes[&2], 0);
    }

    fn extinction_population(timer: usize, epsilon: f64) -> Population {
        let config = PopulationConfig {
            mass_extinction_timer: timer,
            mass_extinction_epsilon: epsilon,
            ..PopulationConfig::minimal(10)
        };
        Population::new(config, Box::new(crate::mutation::standard())).expect("valid config")
    }

    /// Species 1 averages 1.0, species 2 averages 5.0, species 3 averages 3.5.
    fn three_species() -> (BTreeMap<SpeciesId, Vec<usize>>, Vec<f64>) {
        let fitnesses = vec![1.0, 1.0, 5.0, 3.0, 4.0];
        let members = BTreeMap::from([(1, vec![0, 1]), (2, vec![2]), (3, vec![4, 3])]);
        (members, fitnesses)
    }

    #[test]
    fn test_stalled_window_keeps_two_best_species() {
        let mut population = extinction_population(8, 0.5);
        population.extinction_window = VecDeque::from(vec![1.0; 7]);
        let (mut members, fitnesses) = three_species();

        population.check_mass_extinction(1.0, &mut members, &fitnesses);

        // ranked by average, each cut to its fittest member
        assert_eq!(members, BTreeMap::from([(2, vec![2]), (3, vec![4])]));
        assert!(population.extinction_window.is_empty());
    }

    #[test]
    fn test_improvement_of_epsilon_prevents_extinction() {
        let mut population = extinction_population(8, 0.5);
        population.extinction_window = VecDeque::from(vec![0.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.5]);
        let (mut members, fitnesses) = three_species();
        let before = members.clone();

        population.check_mass_extinction(0.5, &mut members, &fitnesses);

        assert_eq!(members, before);
        assert_eq!(population.extinction_window.len(), 8);
    }

    #[test]
    fn test_partial_window_never_triggers() {
        let mut population = extinction_population(8, 0.5);
        population.extinction_window = VecDeque::from(vec![1.0; 5]);
        let (mut members, fitnesses) = three_species();
        let before = members.clone();

        population.check_mass_extinction(1.0, &mut members, &fitnesses);

        assert_eq!(members, before);
        assert_eq!(population.extinction_window.len(), 6);
    }

    #[test]
    fn test_odd_window_splits_floor_then_ceil() {
        let mut population = extinction_population(9, 0.5);
        population.extinction_window = VecDeque::from(vec![0.0, 0.0, 0.0, 0.0, 2.5, 0.0, 0.0, 0.0]);
        let (mut members, fitnesses) = three_species();
        let before = members.clone();

        // earlier = first 4 (mean 0), later = last 5 (mean 0.5)
        population.check_mass_extinction(0.0, &mut members, &fitnesses);
        assert_eq!(members, before);
        assert_eq!(population.extinction_window.len(), 9);

        // the oldest entry falls out: earlier mean 0.625, later mean 0
        population.check_mass_extinction(0.0, &mut members, &fitnesses);
        assert_eq!(members.len(), 2);
        assert!(members.values().all(|list| list.len() == 1));
        assert!(population.extinction_window.is_empty());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = PopulationConfig {
            population_size: 0,
            ..Default::default()
        };
        let err = Population::new(config, Box::new(crate::mutation::standard())).unwrap_err();
        assert_eq!(err, ConfigError::EmptyPopulation);
    }
}
