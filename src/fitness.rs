//! Fitness contract between the population and a task.
//!
//! A [`FitnessFactory`] describes the task's interface (input and output
//! counts, repetitions) and creates one [`FitnessCalculator`] per test run.
//! [`run`] drives a phenotype through one test; [`evaluate_genotype`] builds
//! the phenotype and averages the scores of all runs.
//!
//! Output firings are reported through [`FitnessCalculator::output_fired`]
//! while the run executes. The score is read once the run is over.

use crate::genotype::NetworkGenotype;
use crate::phenotype::NetworkPhenotype;

/// One test run of a task.
pub trait FitnessCalculator {
    /// Score of the finished run. Higher is better.
    fn fitness_score(&self) -> f64;

    /// Upper bound on the ticks of the run.
    fn max_num_timesteps(&self) -> u64;

    /// Polled before every tick; `true` ends the run early.
    fn stop_test(&self) -> bool {
        false
    }

    /// Called after every tick with the new network time.
    fn test_tick(&mut self, _time: u64) {}

    /// `0` sets inputs once before the run; `n > 0` re-reads them every `n` ticks.
    fn input_value_check_cadence(&self) -> u64 {
        0
    }

    /// Input drives at `time`, one per input node.
    fn input_values(&mut self, time: u64) -> Vec<f64>;

    /// Called for every firing of output `output` during the run.
    fn output_fired(&mut self, _output: usize, _time: u64, _value: f64) {}
}

/// Creates calculators for a task. Shared by all evaluation workers.
pub trait FitnessFactory: Send + Sync {
    fn num_inputs(&self) -> usize;

    fn num_outputs(&self) -> usize;

    /// Number of runs averaged per genotype.
    fn num_times_to_test(&self) -> usize {
        1
    }

    fn new_fitness_calculator(
        &self,
        phenotype: &NetworkPhenotype,
        test_index: usize,
    ) -> Box<dyn FitnessCalculator>;
}

/// Drive `phenotype` through one run and return the elapsed ticks.
///
/// The phenotype is reset first. The loop ticks while the calculator does
/// not ask to stop and the tick limit has not been reached.
///
/// # Panics
///
/// Panics if the calculator returns the wrong number of input values.
pub fn run(calculator: &mut dyn FitnessCalculator, phenotype: &mut NetworkPhenotype) -> u64 {
    phenotype.reset();
    phenotype.set_inputs(&calculator.input_values(0));

    let cadence = calculator.input_value_check_cadence();
    let max_ticks = calculator.max_num_timesteps();

    while !calculator.stop_test() && phenotype.time() < max_ticks {
        let time = phenotype.time();
        if cadence > 0 && time > 0 && time % cadence == 0 {
            phenotype.set_inputs(&calculator.input_values(time));
        }

        phenotype.tick();
        let now = phenotype.time();
        for &(output, value) in phenotype.output_firings() {
            calculator.output_fired(output, now, value);
        }
        calculator.test_tick(now);
    }

    phenotype.time()
}

/// Average score of `genotype` over the factory's test runs.
///
/// # Panics
///
/// Panics if the genotype's input or output count does not match the factory.
pub fn evaluate_genotype(factory: &dyn FitnessFactory, genotype: &NetworkGenotype) -> f64 {
    assert_eq!(
        genotype.num_inputs(),
        factory.num_inputs(),
        "Input count mismatch between genotype and fitness factory"
    );
    assert_eq!(
        genotype.num_outputs(),
        factory.num_outputs(),
        "Output count mismatch between genotype and fitness factory"
    );

    let runs = factory.num_times_to_test().max(1);
    let mut phenotype = NetworkPhenotype::from_genotype(genotype);

    let total: f64 = (0..runs)
        .map(|test_index| {
            let mut calculator = factory.new_fitness_calculator(&phenotype, test_index);
            run(calculator.as_mut(), &mut phenotype);
            calculator.fitness_score()
        })
        .sum();
    total / runs as f64
}
