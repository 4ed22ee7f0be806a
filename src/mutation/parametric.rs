//! Parametric mutation: change one value of one gene.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{MutationContext, Mutator};
use crate::config::Bounds;
use crate::genotype::NetworkGenotype;
use crate::rng::{gaussian, uniform, uniform_u32, LocalRng};

/// A mutable gene field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeneField {
    ThresholdMin,
    ThresholdMax,
    ValueDecay,
    ActivDecay,
    PulseFast,
    PulseSlow,
    Weight,
    Length,
}

impl GeneField {
    /// Fields carried by node genes.
    pub const NODE_FIELDS: [Self; 6] = [
        Self::ThresholdMin,
        Self::ThresholdMax,
        Self::ValueDecay,
        Self::ActivDecay,
        Self::PulseFast,
        Self::PulseSlow,
    ];

    /// Fields carried by connection genes.
    pub const CONNECTION_FIELDS: [Self; 2] = [Self::Weight, Self::Length];

    #[must_use]
    pub fn is_node_field(self) -> bool {
        !matches!(self, Self::Weight | Self::Length)
    }
}

/// How a field is changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamMode {
    /// Add a Gaussian step scaled by the field's rate, then clamp to limits.
    Perturb,
    /// Draw a fresh value uniformly within limits.
    Replace,
}

/// Change `field` on one uniformly chosen gene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamMutation {
    pub field: GeneField,
    pub mode: ParamMode,
}

impl ParamMutation {
    #[must_use]
    pub const fn perturb(field: GeneField) -> Self {
        Self {
            field,
            mode: ParamMode::Perturb,
        }
    }

    #[must_use]
    pub const fn replace(field: GeneField) -> Self {
        Self {
            field,
            mode: ParamMode::Replace,
        }
    }

    fn mutate_f64(&self, value: &mut f64, rate: f64, bounds: Bounds<f64>, rng: &mut LocalRng) {
        *value = match self.mode {
            ParamMode::Perturb => bounds.clamp(*value + gaussian(rng) * rate),
            ParamMode::Replace => uniform(rng, bounds.min, bounds.max),
        };
    }

    fn mutate_u32(&self, value: &mut u32, rate: f64, bounds: Bounds<u32>, rng: &mut LocalRng) {
        *value = match self.mode {
            ParamMode::Perturb => {
                let stepped = (f64::from(*value) + gaussian(rng) * rate).round();
                let clamped = stepped.clamp(f64::from(bounds.min), f64::from(bounds.max));
                clamped as u32
            }
            ParamMode::Replace => uniform_u32(rng, bounds.min, bounds.max),
        };
    }
}

fn pick<'g, T>(genes: &'g mut [T], rng: &mut LocalRng) -> Option<&'g mut T> {
    if genes.is_empty() {
        return None;
    }
    let index = rng.random_range(0..genes.len());
    genes.get_mut(index)
}

impl Mutator for ParamMutation {
    fn mutate(
        &self,
        genotype: &mut NetworkGenotype,
        ctx: &MutationContext<'_>,
        rng: &mut LocalRng,
    ) -> usize {
        let (rates, limits) = (ctx.rates, ctx.limits);
        let changed = match self.field {
            GeneField::ThresholdMin => pick(genotype.nodes_mut(), rng).map(|n| {
                self.mutate_f64(&mut n.threshold_min, rates.threshold, limits.threshold, rng)
            }),
            GeneField::ThresholdMax => pick(genotype.nodes_mut(), rng).map(|n| {
                self.mutate_f64(&mut n.threshold_max, rates.threshold, limits.threshold, rng)
            }),
            GeneField::ValueDecay => pick(genotype.nodes_mut(), rng).map(|n| {
                self.mutate_f64(
                    &mut n.value_decay,
                    rates.value_decay,
                    limits.value_decay,
                    rng,
                );
            }),
            GeneField::ActivDecay => pick(genotype.nodes_mut(), rng).map(|n| {
                self.mutate_f64(
                    &mut n.activ_decay,
                    rates.activ_decay,
                    limits.activ_decay,
                    rng,
                );
            }),
            GeneField::PulseFast => pick(genotype.nodes_mut(), rng)
                .map(|n| self.mutate_u32(&mut n.pulse_fast, rates.pulse, limits.pulse, rng)),
            GeneField::PulseSlow => pick(genotype.nodes_mut(), rng)
                .map(|n| self.mutate_u32(&mut n.pulse_slow, rates.pulse, limits.pulse, rng)),
            GeneField::Weight => pick(genotype.connections_mut(), rng)
                .map(|c| self.mutate_f64(&mut c.weight, rates.weight, limits.weight, rng)),
            GeneField::Length => pick(genotype.connections_mut(), rng).map(|c| {
                self.mutate_u32(&mut c.length, rates.length, limits.length, rng);
                c.length = c.length.max(1);
            }),
        };
        usize::from(changed.is_some())
    }

    fn name(&self) -> &'static str {
        match (self.field, self.mode) {
            (GeneField::ThresholdMin, ParamMode::Perturb) => "thresh_min",
            (GeneField::ThresholdMin, ParamMode::Replace) => "thresh_min_new",
            (GeneField::ThresholdMax, ParamMode::Perturb) => "thresh_max",
            (GeneField::ThresholdMax, ParamMode::Replace) => "thresh_max_new",
            (GeneField::ValueDecay, ParamMode::Perturb) => "value_decay",
            (GeneField::ValueDecay, ParamMode::Replace) => "value_decay_new",
            (GeneField::ActivDecay, ParamMode::Perturb) => "activ_decay",
            (GeneField::ActivDecay, ParamMode::Replace) => "activ_decay_new",
            (GeneField::PulseFast, ParamMode::Perturb) => "pulse_fast",
            (GeneField::PulseFast, ParamMode::Replace) => "pulse_fast_new",
            (GeneField::PulseSlow, ParamMode::Perturb) => "pulse_slow",
            (GeneField::PulseSlow, ParamMode::Replace) => "pulse_slow_new",
            (GeneField::Weight, ParamMode::Perturb) => "weight",
            (GeneField::Weight, ParamMode::Replace) => "weight_new",
            (GeneField::Length, ParamMode::Perturb) => "length",
            (GeneField::Length, ParamMode::Replace) => "length_new",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MutationLimits, MutationRates};
    use crate::gene::{ConnectionDef, NodeDef};
    use crate::innovation::InnovationGenerator;
    use rand::SeedableRng;

    fn single_link() -> NetworkGenotype {
        let mut g = NetworkGenotype::new();
        g.add_node(NodeDef::input(0, 0));
        g.add_node(NodeDef::output(1, 1));
        g.add_connection(ConnectionDef::new(2, 0, 1, 0.5, 4));
        g
    }

    #[test]
    fn test_perturb_stays_within_limits() {
        let limits = MutationLimits::default();
        let rates = MutationRates {
            weight: 50.0,
            length: 50.0,
            threshold: 50.0,
            ..Default::default()
        };
        let innovations = InnovationGenerator::new();
        let ctx = MutationContext {
            innovations: &innovations,
            rates: &rates,
            limits: &limits,
        };
        let mut g = single_link();
        let mut rng = LocalRng::seed_from_u64(42);

        for _ in 0..100 {
            assert_eq!(
                ParamMutation::perturb(GeneField::Weight).mutate(&mut g, &ctx, &mut rng),
                1
            );
            assert_eq!(
                ParamMutation::perturb(GeneField::Length).mutate(&mut g, &ctx, &mut rng),
                1
            );
            assert_eq!(
                ParamMutation::perturb(GeneField::ThresholdMax).mutate(&mut g, &ctx, &mut rng),
                1
            );
            let conn = &g.connections()[0];
            assert!((limits.weight.min..=limits.weight.max).contains(&conn.weight));
            assert!((limits.length.min..=limits.length.max).contains(&conn.length));
        }
        // both nodes have been picked by now
        for node in g.nodes() {
            assert!(node.threshold_max <= limits.threshold.max);
        }
    }

    #[test]
    fn test_replace_draws_within_limits() {
        let limits = MutationLimits::default();
        let rates = MutationRates::default();
        let innovations = InnovationGenerator::new();
        let ctx = MutationContext {
            innovations: &innovations,
            rates: &rates,
            limits: &limits,
        };
        let mut g = single_link();
        let mut rng = LocalRng::seed_from_u64(7);

        for _ in 0..50 {
            ParamMutation::replace(GeneField::PulseSlow).mutate(&mut g, &ctx, &mut rng);
            ParamMutation::replace(GeneField::ValueDecay).mutate(&mut g, &ctx, &mut rng);
        }
        for node in g.nodes() {
            assert!((1..=20).contains(&node.pulse_slow));
            assert!((0.0..=1.0).contains(&node.value_decay));
        }
    }

    #[test]
    fn test_no_gene_means_no_mutation() {
        let limits = MutationLimits::default();
        let rates = MutationRates::default();
        let innovations = InnovationGenerator::new();
        let ctx = MutationContext {
            innovations: &innovations,
            rates: &rates,
            limits: &limits,
        };
        let mut g = NetworkGenotype::new();
        g.add_node(NodeDef::input(0, 0));
        let mut rng = LocalRng::seed_from_u64(1);

        assert_eq!(
            ParamMutation::perturb(GeneField::Weight).mutate(&mut g, &ctx, &mut rng),
            0
        );
        assert_eq!(
            ParamMutation::perturb(GeneField::PulseFast).mutate(&mut g, &ctx, &mut rng),
            1
        );
    }

    #[test]
    fn test_names_distinguish_modes() {
        assert_eq!(
            ParamMutation::perturb(GeneField::ThresholdMin).name(),
            "thresh_min"
        );
        assert_eq!(
            ParamMutation::replace(GeneField::ThresholdMin).name(),
            "thresh_min_new"
        );
    }
}
