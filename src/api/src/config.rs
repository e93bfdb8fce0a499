//! Configuration for keiba-sim.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::features::{SameDayPolicy, DEFAULT_WINDOW};
use crate::simulation::{Execution, SimulationConfig, DEFAULT_SEED, DEFAULT_TRIALS};
use crate::strategy::Strategy;
use crate::types::BettingType;

/// Input data configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_path")]
    pub path: String,
    /// Rolling window, in prior races
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default)]
    pub same_day: SameDayPolicy,
}

fn default_data_path() -> String {
    "data/race_history.csv".to_string()
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: default_data_path(),
            window: default_window(),
            same_day: SameDayPolicy::default(),
        }
    }
}

/// Simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSettings {
    #[serde(default = "default_trials")]
    pub trials: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_betting_type")]
    pub betting_type: BettingType,
    #[serde(default)]
    pub parallel: bool,
    /// Abort the run after this many seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_trials() -> usize {
    DEFAULT_TRIALS
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_betting_type() -> BettingType {
    BettingType::Win
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            trials: default_trials(),
            seed: default_seed(),
            betting_type: default_betting_type(),
            parallel: false,
            timeout_secs: None,
        }
    }
}

impl SimulationSettings {
    pub fn to_config(&self) -> SimulationConfig {
        let execution = if self.parallel {
            Execution::Parallel
        } else {
            Execution::Sequential
        };
        let config = SimulationConfig::new(self.trials, self.betting_type)
            .with_seed(self.seed)
            .with_execution(execution);

        match self.timeout_secs {
            Some(secs) => config.with_time_limit(Duration::from_secs(secs)),
            None => config,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub strategy: Strategy,
}

impl AppConfig {
    /// Load configuration from environment and config file
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from("config")
    }

    /// Defaults, then `<name>.{toml,json,yaml}` if present, then
    /// `KEIBA_SIM__SECTION__KEY` environment variables.
    pub fn load_from(name: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name(name).required(false))
            // Override with environment variables (KEIBA_SIM__SIMULATION__TRIALS, etc.)
            .add_source(
                config::Environment::with_prefix("KEIBA_SIM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.data.window, 10);
        assert_eq!(config.data.same_day, SameDayPolicy::StrictlyEarlier);
        assert_eq!(config.simulation.trials, 10);
        assert_eq!(config.simulation.betting_type, BettingType::Win);
        assert!(!config.simulation.parallel);
        assert_eq!(config.strategy, Strategy::combined(0.75, 0.25, 0.10));
    }

    #[test]
    fn test_defaults_round_trip_through_config_crate() {
        let config = AppConfig::load_from("keiba-sim-test-does-not-exist").unwrap();
        assert_eq!(config.data.path, "data/race_history.csv");
        assert_eq!(config.simulation.seed, 42);
        assert_eq!(config.strategy, Strategy::default());
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{"simulation": {"trials": 50, "betting_type": "place"},
                "strategy": {"kind": "odds_range", "min": 2.0, "max": 5.0}}"#,
        )
        .unwrap();

        assert_eq!(config.simulation.trials, 50);
        assert_eq!(config.simulation.betting_type, BettingType::Place);
        assert_eq!(config.simulation.seed, 42);
        assert_eq!(config.data.window, 10);
        assert_eq!(config.strategy, Strategy::odds_range(2.0, 5.0));
    }

    #[test]
    fn test_to_simulation_config() {
        let settings = SimulationSettings {
            trials: 25,
            seed: 7,
            betting_type: BettingType::Place,
            parallel: true,
            timeout_secs: Some(30),
        };
        let config = settings.to_config();

        assert_eq!(config.trials, 25);
        assert_eq!(config.seed, 7);
        assert_eq!(config.execution, Execution::Parallel);
        assert_eq!(config.time_limit, Some(Duration::from_secs(30)));
    }
}
