//! Keiba-Sim: Monte Carlo backtesting of horse racing selection strategies.
//!
//! Pipeline: [`loader`] reads race history, [`features::FeatureEngine`] adds
//! leakage-free rolling horse and jockey rates, [`strategy::Strategy`] picks
//! one horse per race, and [`simulation::Simulation`] repeats the walk over
//! all races to estimate the profit distribution.

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod features;
pub mod loader;
pub mod report;
pub mod simulation;
pub mod strategy;
pub mod types;

pub use diagnostics::{DataQualityWarning, Diagnostics};
pub use error::{ConfigurationError, SimError};
pub use features::{FeatureEngine, SameDayPolicy};
pub use simulation::{CancelToken, Execution, Simulation, SimulationConfig, SimulationSummary};
pub use strategy::{evaluate, Selection, Strategy, ValueRange};
pub use types::{BettingType, Entity, RaceGroup, RaceRecord, RaceTable};
