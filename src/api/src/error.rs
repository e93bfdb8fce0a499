//! Error types for the simulation core.
//!
//! Configuration problems are fatal and abort a run before any result is
//! produced. Data-quality problems are not errors; see [`crate::diagnostics`].

use thiserror::Error;

/// Fatal misconfiguration of the feature engine, a strategy, or a simulation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("required column `{0}` is missing from the input table")]
    MissingColumn(String),

    #[error("unsupported betting type `{0}` (expected `win` or `place`)")]
    UnsupportedBettingType(String),

    #[error("unknown entity `{0}` (expected `horse` or `jockey`)")]
    UnknownEntity(String),

    #[error("unknown strategy `{0}`")]
    UnknownStrategy(String),

    #[error("rolling window must be at least 1 race, got {0}")]
    InvalidWindow(usize),

    #[error("number of trials must be at least 1")]
    InvalidTrialCount,
}

/// Errors returned by a simulation run.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("simulation cancelled after {completed} of {requested} trials")]
    Cancelled { completed: usize, requested: usize },
}

pub type Result<T, E = SimError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigurationError::MissingColumn("horse_id".to_string());
        assert!(err.to_string().contains("horse_id"));

        let err = SimError::from(ConfigurationError::UnsupportedBettingType("show".to_string()));
        assert!(err.to_string().contains("show"));
    }

    #[test]
    fn test_cancelled_display() {
        let err = SimError::Cancelled {
            completed: 3,
            requested: 10,
        };
        assert_eq!(err.to_string(), "simulation cancelled after 3 of 10 trials");
    }
}
