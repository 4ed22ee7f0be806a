//! Mutation operators.
//!
//! Every operator implements [`Mutator`]: it receives a genotype, the shared
//! [`MutationContext`] and a task-local generator, and returns the number of
//! successful mutations. Structurally infeasible requests (splitting a
//! genotype with no connections, linking an already complete graph) return
//! `0` and leave the genotype untouched.
//!
//! ## Operators
//!
//! - [`ParamMutation`]: perturb or replace one field of one random gene
//! - [`AddNode`], [`AddConnection`], [`AddConnectionUnique`],
//!   [`AddConnectionDuplicate`], [`ConnectionEnable`]: structural changes
//! - [`Multi`], [`MultiOne`]: combinators over boxed operators
//!
//! [`standard`] assembles a balanced [`Multi`] covering all of them.

mod dispatch;
mod parametric;
mod structural;

pub use dispatch::{Multi, MultiEntry, MultiOne};
pub use parametric::{GeneField, ParamMode, ParamMutation};
pub use structural::{
    AddConnection, AddConnectionDuplicate, AddConnectionUnique, AddNode, ConnectionEnable,
};

use crate::config::{MutationLimits, MutationRates};
use crate::genotype::NetworkGenotype;
use crate::innovation::InnovationGenerator;
use crate::rng::LocalRng;

/// Shared, read-only state every operator may consult.
#[derive(Debug, Clone, Copy)]
pub struct MutationContext<'a> {
    pub innovations: &'a InnovationGenerator,
    pub rates: &'a MutationRates,
    pub limits: &'a MutationLimits,
}

/// A mutation operator.
///
/// Operators are shared by every worker thread during the mutate phase, so
/// they must not hold per-call state.
pub trait Mutator: Send + Sync {
    /// Apply the operator once and return the number of successful mutations.
    fn mutate(
        &self,
        genotype: &mut NetworkGenotype,
        ctx: &MutationContext<'_>,
        rng: &mut LocalRng,
    ) -> usize;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

impl<M: Mutator + ?Sized> Mutator for Box<M> {
    fn mutate(
        &self,
        genotype: &mut NetworkGenotype,
        ctx: &MutationContext<'_>,
        rng: &mut LocalRng,
    ) -> usize {
        (**self).mutate(genotype, ctx, rng)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// A general-purpose mutation schedule.
///
/// Parametric changes scale with genotype size; structural growth happens at
/// a flat per-genotype rate so large networks do not grow faster than small ones.
#[must_use]
pub fn standard() -> Multi {
    let mut multi = Multi::new();

    for field in GeneField::NODE_FIELDS {
        multi = multi
            .per_node(ParamMutation::perturb(field), 0.04)
            .per_node(ParamMutation::replace(field), 0.005);
    }
    multi = multi
        .per_connection(ParamMutation::perturb(GeneField::Weight), 0.1)
        .per_connection(ParamMutation::replace(GeneField::Weight), 0.01)
        .per_connection(ParamMutation::perturb(GeneField::Length), 0.05)
        .per_connection(ParamMutation::replace(GeneField::Length), 0.005);

    multi
        .per_genotype(AddNode, 0.03)
        .per_genotype(AddConnection, 0.03)
        .per_genotype(AddConnectionUnique, 0.08)
        .per_genotype(AddConnectionDuplicate, 0.02)
        .per_genotype(ConnectionEnable, 0.02)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_standard_preserves_invariants() {
        let limits = MutationLimits::default();
        let rates = MutationRates::default();
        let innovations = InnovationGenerator::new();
        let ctx = MutationContext {
            innovations: &innovations,
            rates: &rates,
            limits: &limits,
        };

        let mut genotype = NetworkGenotype::template(3, 2, &limits);
        innovations.reserve(
            genotype.max_node_id().unwrap_or(0),
            genotype.max_innovation().unwrap_or(0),
        );
        let mut rng = LocalRng::seed_from_u64(42);
        let schedule = standard();

        for _ in 0..200 {
            schedule.mutate(&mut genotype, &ctx, &mut rng);
        }

        assert_eq!(genotype.num_inputs(), 3);
        assert_eq!(genotype.num_outputs(), 2);
        assert!(genotype.num_nodes() >= 5);

        let mut ids: Vec<_> = genotype.nodes().iter().map(|n| n.node_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), genotype.num_nodes(), "node ids stay unique");

        let mut innovs: Vec<_> = genotype
            .connections()
            .iter()
            .map(|c| c.innovation)
            .collect();
        innovs.sort_unstable();
        innovs.dedup();
        assert_eq!(
            innovs.len(),
            genotype.num_connections(),
            "innovations stay unique"
        );

        for conn in genotype.connections() {
            assert!(conn.length >= 1);
            assert!(genotype.has_node(conn.source_id));
            assert!(genotype.has_node(conn.destination_id));
        }
    }
}
