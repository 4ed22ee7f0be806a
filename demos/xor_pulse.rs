//! Timing-based XOR with delay-aware spiking networks.
//!
//! Each of the four XOR cases is run as a separate test. The two inputs are
//! driven with `1.0` for a true bit and `0.0` for a false one, and the single
//! output must fire at least once within the window when exactly one input
//! is true and stay silent otherwise. Maximum fitness is 1.0.
//!
//! Run with: `RUST_LOG=symbios_pulse=info cargo run --example xor_pulse`

use symbios_pulse::{
    mutation, FitnessCalculator, FitnessFactory, NetworkGenotype, NetworkPhenotype, Population,
    PopulationConfig,
};
use tracing_subscriber::EnvFilter;

const CASES: [([f64; 2], bool); 4] = [
    ([0.0, 0.0], false),
    ([0.0, 1.0], true),
    ([1.0, 0.0], true),
    ([1.0, 1.0], false),
];

const WINDOW: u64 = 40;

struct XorTiming;

struct XorCase {
    inputs: [f64; 2],
    expected: bool,
    firings: usize,
}

impl FitnessCalculator for XorCase {
    fn fitness_score(&self) -> f64 {
        match (self.expected, self.firings) {
            (true, 0) => 0.0,
            (true, _) => 1.0,
            // penalize each spurious firing, bottoming out at zero
            (false, n) => 1.0 - (n.min(4) as f64 / 4.0),
        }
    }

    fn max_num_timesteps(&self) -> u64 {
        WINDOW
    }

    fn input_values(&mut self, _time: u64) -> Vec<f64> {
        self.inputs.to_vec()
    }

    fn output_fired(&mut self, _output: usize, _time: u64, _value: f64) {
        self.firings += 1;
    }
}

impl FitnessFactory for XorTiming {
    fn num_inputs(&self) -> usize {
        2
    }

    fn num_outputs(&self) -> usize {
        1
    }

    fn num_times_to_test(&self) -> usize {
        CASES.len()
    }

    fn new_fitness_calculator(
        &self,
        _phenotype: &NetworkPhenotype,
        test_index: usize,
    ) -> Box<dyn FitnessCalculator> {
        let (inputs, expected) = CASES[test_index % CASES.len()];
        Box::new(XorCase {
            inputs,
            expected,
            firings: 0,
        })
    }
}

/// Output firings of `genotype` for each case.
fn firings(genotype: &NetworkGenotype) -> Vec<usize> {
    let mut phenotype: NetworkPhenotype = NetworkPhenotype::from_genotype(genotype);
    CASES
        .iter()
        .map(|(inputs, _)| {
            phenotype.reset();
            phenotype.set_inputs(inputs);
            (0..WINDOW).map(|_| phenotype.tick().len()).sum()
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    println!("Pulse XOR Example");
    println!("=================\n");

    let config = PopulationConfig {
        population_size: 150,
        min_species_size: 3,
        kill_delay_limit: 8,
        mass_extinction_timer: 40,
        ..PopulationConfig::default()
    };
    let generations = 150;

    println!("Population: {}", config.population_size);
    println!("Generations: {generations}");
    println!();

    let mut population = Population::new(config, Box::new(mutation::standard()))?;
    population.init_fully_connected(2, 1);

    let mut solution_generation = None;
    for gen in 0..generations {
        let record = population.iterate_generation(&XorTiming);
        let (best, avg, species) = (
            record.max_fitness,
            record.average_fitness,
            record.num_species(),
        );

        if best >= 1.0 && solution_generation.is_none() {
            solution_generation = Some(gen);
        }

        if gen % 10 == 0 || gen == generations - 1 {
            let (nodes, conns) = population
                .best_genotype()
                .map(|g| (g.get_num_reachable_nodes(), g.active_connection_count()))
                .unwrap_or_default();
            println!(
                "Gen {gen:3}: best={best:.4}, avg={avg:.4}, species={species}, nodes={nodes}, connections={conns}"
            );
        }

        if solution_generation.is_some() {
            break;
        }
    }

    println!();
    println!("Evolution Complete!");
    println!("==================");

    let Some(champion) = population.best_genotype() else {
        return Ok(());
    };
    println!(
        "Best fitness: {:.4}",
        population.best_fitness().unwrap_or_default()
    );
    println!("Active nodes: {}", champion.get_num_reachable_nodes());
    println!("Active connections: {}", champion.active_connection_count());
    if let Some(gen) = solution_generation {
        println!("Solution found at generation: {gen}");
    }

    println!("\nChampion output firings in {WINDOW} ticks:");
    for ((inputs, expected), count) in CASES.iter().zip(firings(champion)) {
        let ok = (count > 0) == *expected;
        println!(
            "  {} XOR {} -> {count} firings (expected {}) {}",
            inputs[0] as i32,
            inputs[1] as i32,
            if *expected { "some" } else { "none" },
            if ok { "✓" } else { "✗" }
        );
    }
    Ok(())
}
