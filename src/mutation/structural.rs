//! Structural mutation: add nodes and connections, toggle connections.

use rand::Rng;

use super::{MutationContext, Mutator};
use crate::gene::{ConnectionDef, NodeId, NodeType};
use crate::genotype::NetworkGenotype;
use crate::innovation::NodeSplit;
use crate::rng::{uniform_u32, LocalRng};

/// Split a random connection with a new hidden node.
///
/// The split connection is disabled and replaced by
/// `source -> new -> destination`. The first half carries the maximum weight
/// allowed by the limits so the new node is driven strongly; the second half
/// keeps the original weight. The two lengths sum to the original length,
/// except that each half is at least one tick long.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddNode;

impl Mutator for AddNode {
    fn mutate(
        &self,
        genotype: &mut NetworkGenotype,
        ctx: &MutationContext<'_>,
        rng: &mut LocalRng,
    ) -> usize {
        let count = genotype.num_connections();
        if count == 0 {
            return 0;
        }
        let index = rng.random_range(0..count);
        let original = genotype.connections()[index].clone();

        let mut split = ctx.innovations.node_split(original.innovation);
        if split_collides(genotype, &split) {
            // same connection split twice in this genotype
            split = ctx.innovations.fresh_split();
        }

        let first_length = (original.length / 2).max(1);
        let second_length = original.length.saturating_sub(first_length).max(1);

        genotype.connections_mut()[index].enabled = false;
        genotype.add_node(ctx.limits.random_node(
            split.node_id,
            split.node_innovation,
            NodeType::Hidden,
            rng,
        ));
        genotype.add_connection(ConnectionDef::new(
            split.first,
            original.source_id,
            split.node_id,
            ctx.limits.weight.max,
            first_length,
        ));
        genotype.add_connection(ConnectionDef::new(
            split.second,
            split.node_id,
            original.destination_id,
            original.weight,
            second_length,
        ));
        1
    }

    fn name(&self) -> &'static str {
        "add_node"
    }
}

fn split_collides(genotype: &NetworkGenotype, split: &NodeSplit) -> bool {
    genotype.has_node(split.node_id)
        || genotype.has_innovation(split.first)
        || genotype.has_innovation(split.second)
}

/// Innovation for a new `source -> destination` link in `genotype`.
///
/// Convergent additions share the generation's innovation unless this
/// genotype already carries it.
fn link_innovation(
    genotype: &NetworkGenotype,
    ctx: &MutationContext<'_>,
    source: NodeId,
    destination: NodeId,
) -> u32 {
    let innovation = ctx.innovations.connection_innovation(source, destination);
    if genotype.has_innovation(innovation) {
        ctx.innovations.next_innovation()
    } else {
        innovation
    }
}

fn add_link(
    genotype: &mut NetworkGenotype,
    ctx: &MutationContext<'_>,
    source: NodeId,
    destination: NodeId,
    rng: &mut LocalRng,
) {
    let innovation = link_innovation(genotype, ctx, source, destination);
    let weight = ctx.limits.random_weight(rng);
    let length = ctx.limits.random_length(rng);
    genotype.add_connection(ConnectionDef::new(
        innovation,
        source,
        destination,
        weight,
        length,
    ));
}

/// Link a random sender (input or hidden) to a random receiver (hidden or output).
///
/// Existing links are not checked: the same pair may end up connected more
/// than once, each link with its own innovation, weight and delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddConnection;

impl Mutator for AddConnection {
    fn mutate(
        &self,
        genotype: &mut NetworkGenotype,
        ctx: &MutationContext<'_>,
        rng: &mut LocalRng,
    ) -> usize {
        let senders: Vec<NodeId> = genotype
            .nodes()
            .iter()
            .filter(|n| n.can_send())
            .map(|n| n.node_id)
            .collect();
        let receivers: Vec<NodeId> = genotype
            .nodes()
            .iter()
            .filter(|n| n.can_receive())
            .map(|n| n.node_id)
            .collect();
        if senders.is_empty() || receivers.is_empty() {
            return 0;
        }

        let source = senders[rng.random_range(0..senders.len())];
        let destination = receivers[rng.random_range(0..receivers.len())];
        add_link(genotype, ctx, source, destination, rng);
        1
    }

    fn name(&self) -> &'static str {
        "add_conn"
    }
}

/// Link a random pair of nodes that are not yet linked in either direction.
///
/// Self-loops are never created. Returns `0` once the graph is complete.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddConnectionUnique;

impl Mutator for AddConnectionUnique {
    fn mutate(
        &self,
        genotype: &mut NetworkGenotype,
        ctx: &MutationContext<'_>,
        rng: &mut LocalRng,
    ) -> usize {
        let nodes = genotype.nodes();
        let candidates: Vec<(NodeId, NodeId)> = nodes
            .iter()
            .filter(|a| a.can_send())
            .flat_map(|a| {
                nodes
                    .iter()
                    .filter(|b| b.can_receive() && b.node_id != a.node_id)
                    .map(move |b| (a.node_id, b.node_id))
            })
            .filter(|&(a, b)| !genotype.connections().iter().any(|c| c.links(a, b)))
            .collect();
        if candidates.is_empty() {
            return 0;
        }

        let (source, destination) = candidates[rng.random_range(0..candidates.len())];
        add_link(genotype, ctx, source, destination, rng);
        1
    }

    fn name(&self) -> &'static str {
        "add_conn_unique"
    }
}

/// Copy the endpoints of a random connection with a new weight and, when the
/// limits allow it, a different length.
///
/// The copy always receives a fresh innovation.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddConnectionDuplicate;

impl Mutator for AddConnectionDuplicate {
    fn mutate(
        &self,
        genotype: &mut NetworkGenotype,
        ctx: &MutationContext<'_>,
        rng: &mut LocalRng,
    ) -> usize {
        let count = genotype.num_connections();
        if count == 0 {
            return 0;
        }
        let original = genotype.connections()[rng.random_range(0..count)].clone();
        let bounds = ctx.limits.length;

        let in_range = (bounds.min..=bounds.max).contains(&original.length);
        let length = if bounds.max > bounds.min && in_range {
            // draw from the range with the original length removed
            let drawn = uniform_u32(rng, bounds.min, bounds.max - 1);
            if drawn >= original.length {
                drawn + 1
            } else {
                drawn
            }
        } else {
            ctx.limits.random_length(rng)
        };

        genotype.add_connection(ConnectionDef::new(
            ctx.innovations.next_innovation(),
            original.source_id,
            original.destination_id,
            ctx.limits.random_weight(rng),
            length,
        ));
        1
    }

    fn name(&self) -> &'static str {
        "add_conn_dup"
    }
}

/// Flip the `enabled` flag of a random connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionEnable;

impl Mutator for ConnectionEnable {
    fn mutate(
        &self,
        genotype: &mut NetworkGenotype,
        _ctx: &MutationContext<'_>,
        rng: &mut LocalRng,
    ) -> usize {
        let connections = genotype.connections_mut();
        if connections.is_empty() {
            return 0;
        }
        let index = rng.random_range(0..connections.len());
        connections[index].enabled = !connections[index].enabled;
        1
    }

    fn name(&self) -> &'static str {
        "conn_enable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MutationLimits, MutationRates};
    use crate::gene::NodeDef;
    use crate::innovation::InnovationGenerator;
    use rand::SeedableRng;

    struct Fixture {
        innovations: InnovationGenerator,
        rates: MutationRates,
        limits: MutationLimits,
    }

    impl Fixture {
        fn new() -> Self {
            let innovations = InnovationGenerator::new();
            innovations.reserve(10, 10);
            Self {
                innovations,
                rates: MutationRates::default(),
                limits: MutationLimits::default(),
            }
        }

        fn ctx(&self) -> MutationContext<'_> {
            MutationContext {
                innovations: &self.innovations,
                rates: &self.rates,
                limits: &self.limits,
            }
        }
    }

    fn link(length: u32) -> NetworkGenotype {
        let mut g = NetworkGenotype::new();
        g.add_node(NodeDef::input(0, 0));
        g.add_node(NodeDef::output(1, 1));
        g.add_connection(ConnectionDef::new(2, 0, 1, 0.7, length));
        g
    }

    #[test]
    fn test_add_node_splits_connection() {
        let fx = Fixture::new();
        for (seed, length) in [(1_u64, 10_u32), (2, 7), (3, 1), (4, 2)] {
            let mut g = link(length);
            let mut rng = LocalRng::seed_from_u64(seed);

            assert_eq!(AddNode.mutate(&mut g, &fx.ctx(), &mut rng), 1);
            assert_eq!(g.num_nodes(), 3);
            assert_eq!(g.num_connections(), 3);
            assert_eq!(g.num_enabled_connections(), 2);
            assert!(!g.connection(2).expect("original kept").enabled);

            let total: u32 = g
                .connections()
                .iter()
                .filter(|c| c.enabled)
                .map(|c| c.length)
                .sum();
            assert!(
                total.abs_diff(length) <= 1,
                "length {length} split into {total}"
            );

            let hidden = g.node_ids_of_type(NodeType::Hidden);
            assert_eq!(hidden.len(), 1);
            let second = g
                .connections()
                .iter()
                .find(|c| c.source_id == hidden[0])
                .expect("second half");
            assert_eq!(second.weight, 0.7);
        }
    }

    #[test]
    fn test_add_node_without_connections_fails() {
        let fx = Fixture::new();
        let mut g = NetworkGenotype::new();
        g.add_node(NodeDef::input(0, 0));
        let mut rng = LocalRng::seed_from_u64(42);
        assert_eq!(AddNode.mutate(&mut g, &fx.ctx(), &mut rng), 0);
        assert_eq!(g.num_nodes(), 1);
    }

    #[test]
    fn test_convergent_splits_share_identifiers() {
        let fx = Fixture::new();
        let mut a = link(4);
        let mut b = link(4);
        let mut rng = LocalRng::seed_from_u64(42);

        AddNode.mutate(&mut a, &fx.ctx(), &mut rng);
        AddNode.mutate(&mut b, &fx.ctx(), &mut rng);
        let structure = |g: &NetworkGenotype| {
            let nodes: Vec<_> = g
                .nodes()
                .iter()
                .map(|n| (n.node_id, n.innovation))
                .collect();
            let conns: Vec<_> = g
                .connections()
                .iter()
                .map(|c| (c.innovation, c.source_id, c.destination_id, c.enabled))
                .collect();
            (nodes, conns)
        };
        assert_eq!(structure(&a), structure(&b));
    }

    #[test]
    fn test_repeated_split_in_one_genotype_stays_unique() {
        let fx = Fixture::new();
        let mut g = link(4);
        let mut rng = LocalRng::seed_from_u64(42);

        // only one connection can be chosen on the first call
        AddNode.mutate(&mut g, &fx.ctx(), &mut rng);
        for _ in 0..10 {
            AddNode.mutate(&mut g, &fx.ctx(), &mut rng);
        }
        let mut ids: Vec<_> = g.nodes().iter().map(|n| n.node_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), g.num_nodes());
    }

    #[test]
    fn test_add_connection_respects_roles() {
        let fx = Fixture::new();
        let mut g = link(3);
        let mut rng = LocalRng::seed_from_u64(42);
        for _ in 0..20 {
            assert_eq!(AddConnection.mutate(&mut g, &fx.ctx(), &mut rng), 1);
        }
        // the only legal pair is input -> output
        assert!(g.connections().iter().all(|c| c.links(0, 1)));
        assert_eq!(g.num_connections(), 21);
    }

    #[test]
    fn test_add_connection_unique_saturates() {
        let fx = Fixture::new();
        let mut g = NetworkGenotype::new();
        g.add_node(NodeDef::input(0, 0));
        g.add_node(NodeDef::input(1, 1));
        g.add_node(NodeDef::output(2, 2));
        let mut rng = LocalRng::seed_from_u64(42);

        assert_eq!(AddConnectionUnique.mutate(&mut g, &fx.ctx(), &mut rng), 1);
        assert_eq!(AddConnectionUnique.mutate(&mut g, &fx.ctx(), &mut rng), 1);
        assert_eq!(AddConnectionUnique.mutate(&mut g, &fx.ctx(), &mut rng), 0);
        assert_eq!(g.num_connections(), 2);
    }

    #[test]
    fn test_duplicate_changes_length() {
        let fx = Fixture::new();
        let mut rng = LocalRng::seed_from_u64(42);
        for _ in 0..20 {
            let mut g = link(5);
            assert_eq!(
                AddConnectionDuplicate.mutate(&mut g, &fx.ctx(), &mut rng),
                1
            );
            let copy = &g.connections()[1];
            assert!(copy.links(0, 1));
            assert_ne!(copy.length, 5);
            assert_ne!(copy.innovation, 2);
        }
    }

    #[test]
    fn test_connection_enable_toggles() {
        let fx = Fixture::new();
        let mut g = link(3);
        let mut rng = LocalRng::seed_from_u64(42);
        assert_eq!(ConnectionEnable.mutate(&mut g, &fx.ctx(), &mut rng), 1);
        assert!(!g.connections()[0].enabled);
        assert_eq!(ConnectionEnable.mutate(&mut g, &fx.ctx(), &mut rng), 1);
        assert!(g.connections()[0].enabled);
    }
}
