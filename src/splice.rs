//! N-parent crossover aligned by node ID and connection innovation.

use std::collections::HashMap;
use std::hash::Hash;

use rand::Rng;

use crate::genotype::NetworkGenotype;

/// Cross any number of parents.
///
/// The child carries the union of the parents' node IDs and connection
/// innovations, in order of first appearance. Each gene's values are copied
/// from one parent chosen uniformly among the parents that carry it. Splicing
/// identical parents therefore reproduces the parent exactly. The child
/// inherits the species of the first parent.
///
/// # Panics
///
/// Panics if `parents` is empty.
pub fn splice<R: Rng + ?Sized>(parents: &[&NetworkGenotype], rng: &mut R) -> NetworkGenotype {
    assert!(!parents.is_empty(), "splice needs at least one parent");

    let mut child = NetworkGenotype::new();
    child.set_species(parents[0].species());

    let nodes = align(parents.iter().flat_map(|p| p.nodes()), |n| n.node_id);
    for candidates in nodes {
        child.add_node(choose(&candidates, rng).clone());
    }

    let connections = align(
        parents.iter().flat_map(|p| p.connections()),
        |c| c.innovation,
    );
    for candidates in connections {
        child.add_connection(choose(&candidates, rng).clone());
    }

    child
}

/// Group genes by key, keeping keys in order of first appearance.
fn align<'a, G, K, I>(genes: I, key: impl Fn(&G) -> K) -> Vec<Vec<&'a G>>
where
    G: 'a,
    K: Eq + Hash,
    I: Iterator<Item = &'a G>,
{
    let mut slots: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<Vec<&'a G>> = Vec::new();
    for gene in genes {
        let slot = *slots.entry(key(gene)).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(gene);
    }
    groups
}

fn choose<'a, G, R: Rng + ?Sized>(candidates: &[&'a G], rng: &mut R) -> &'a G {
    if candidates.len() == 1 {
        candidates[0]
    } else {
        candidates[rng.random_range(0..candidates.len())]
    }
}
