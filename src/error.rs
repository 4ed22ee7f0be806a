//! Error types.
//!
//! Only configuration and persistence problems are reported as errors.
//! Broken genotype invariants (duplicate IDs, mismatched input counts) are
//! construction bugs and panic instead.

/// A configuration rejected before any generation runs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("population size must be > 0")]
    EmptyPopulation,

    #[error(
        "population size {population_size} is smaller than twice the minimum species size {min_species_size}"
    )]
    PopulationTooSmall {
        population_size: usize,
        min_species_size: usize,
    },

    #[error("mass extinction timer {timer} must exceed the kill delay limit {kill_delay_limit}")]
    ExtinctionTimerTooShort { timer: usize, kill_delay_limit: u32 },

    #[error("attrition rate must be in [0, 1), got {0}")]
    InvalidAttritionRate(f64),

    #[error("invalid species distance parameters: {0}")]
    InvalidDistanceParameters(String),

    #[error("invalid mutation limits: {0}")]
    InvalidLimits(String),

    #[error("generations_to_keep must be > 0")]
    GenerationsToKeepZero,

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
}

/// Failure while saving or restoring a population snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot carries an invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("snapshot holds {found} genotypes but the configuration expects {expected}")]
    SizeMismatch { expected: usize, found: usize },
}
