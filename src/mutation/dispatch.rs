//! Combinators that apply several operators.

use std::fmt;

use rand::Rng;

use super::{MutationContext, Mutator};
use crate::genotype::NetworkGenotype;
use crate::rng::LocalRng;

/// One operator in a [`Multi`] with its call chances.
///
/// The expected number of calls per genotype is
/// `per_genotype + per_node * nodes + per_connection * connections`.
pub struct MultiEntry {
    pub mutator: Box<dyn Mutator>,
    pub per_genotype: f64,
    pub per_node: f64,
    pub per_connection: f64,
}

impl MultiEntry {
    fn chance(&self, genotype: &NetworkGenotype) -> f64 {
        self.per_genotype
            + self.per_node * genotype.num_nodes() as f64
            + self.per_connection * genotype.num_connections() as f64
    }
}

impl fmt::Debug for MultiEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiEntry")
            .field("mutator", &self.mutator.name())
            .field("per_genotype", &self.per_genotype)
            .field("per_node", &self.per_node)
            .field("per_connection", &self.per_connection)
            .finish()
    }
}

/// Call every registered operator a chance-weighted number of times.
///
/// A chance of `c` yields `floor(c)` guaranteed calls plus one more with
/// probability `c - floor(c)`. Entries run in registration order.
#[derive(Debug, Default)]
pub struct Multi {
    entries: Vec<MultiEntry>,
}

impl Multi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operator with explicit chances.
    pub fn push(&mut self, entry: MultiEntry) {
        self.entries.push(entry);
    }

    /// Register an operator with a flat per-genotype chance.
    #[must_use]
    pub fn per_genotype(mut self, mutator: impl Mutator + 'static, chance: f64) -> Self {
        self.push(MultiEntry {
            mutator: Box::new(mutator),
            per_genotype: chance,
            per_node: 0.0,
            per_connection: 0.0,
        });
        self
    }

    /// Register an operator whose chance scales with the node count.
    #[must_use]
    pub fn per_node(mut self, mutator: impl Mutator + 'static, chance: f64) -> Self {
        self.push(MultiEntry {
            mutator: Box::new(mutator),
            per_genotype: 0.0,
            per_node: chance,
            per_connection: 0.0,
        });
        self
    }

    /// Register an operator whose chance scales with the connection count.
    #[must_use]
    pub fn per_connection(mut self, mutator: impl Mutator + 'static, chance: f64) -> Self {
        self.push(MultiEntry {
            mutator: Box::new(mutator),
            per_genotype: 0.0,
            per_node: 0.0,
            per_connection: chance,
        });
        self
    }

    #[must_use]
    pub fn entries(&self) -> &[MultiEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Mutator for Multi {
    fn mutate(
        &self,
        genotype: &mut NetworkGenotype,
        ctx: &MutationContext<'_>,
        rng: &mut LocalRng,
    ) -> usize {
        let mut successes = 0;
        for entry in &self.entries {
            let chance = entry.chance(genotype).max(0.0);
            let mut calls = chance.floor() as usize;
            if rng.random::<f64>() < chance.fract() {
                calls += 1;
            }
            for _ in 0..calls {
                successes += entry.mutator.mutate(genotype, ctx, rng);
            }
        }
        successes
    }

    fn name(&self) -> &'static str {
        "multi"
    }
}

/// Call exactly one registered operator, chosen uniformly.
#[derive(Default)]
pub struct MultiOne {
    mutators: Vec<Box<dyn Mutator>>,
}

impl MultiOne {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, mutator: impl Mutator + 'static) -> Self {
        self.mutators.push(Box::new(mutator));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mutators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutators.is_empty()
    }
}

impl fmt::Debug for MultiOne {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.mutators.iter().map(|m| m.name()))
            .finish()
    }
}

impl Mutator for MultiOne {
    fn mutate(
        &self,
        genotype: &mut NetworkGenotype,
        ctx: &MutationContext<'_>,
        rng: &mut LocalRng,
    ) -> usize {
        if self.mutators.is_empty() {
            return 0;
        }
        let index = rng.random_range(0..self.mutators.len());
        self.mutators[index].mutate(genotype, ctx, rng)
    }

    fn name(&self) -> &'static str {
        "multi_one"
    }
}
