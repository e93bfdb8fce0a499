//! Monte Carlo simulation of a selection strategy.
//!
//! One trial walks every race once, lets the strategy pick a horse, and
//! books the profit of a one-unit bet on it. Repeating the walk with fresh
//! random draws gives a distribution of total profit per strategy.

use rand::rngs::SmallRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::diagnostics::{DataQualityWarning, Diagnostics};
use crate::error::{ConfigurationError, Result, SimError};
use crate::strategy::{evaluate, Strategy};
use crate::types::{columns, BettingType, RaceGroup, RaceRecord};

pub const DEFAULT_TRIALS: usize = 10;
pub const DEFAULT_SEED: u64 = 42;

/// How trials are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Execution {
    /// One random stream shared by all trials, in order
    #[default]
    Sequential,
    /// Trial `i` seeded with `seed + i`, run on the rayon pool
    Parallel,
}

/// Cooperative cancellation flag, checked before each trial.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub trials: usize,
    pub betting_type: BettingType,
    pub seed: u64,
    pub execution: Execution,
    pub time_limit: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            trials: DEFAULT_TRIALS,
            betting_type: BettingType::Win,
            seed: DEFAULT_SEED,
            execution: Execution::Sequential,
            time_limit: None,
            cancel: None,
        }
    }
}

impl SimulationConfig {
    pub fn new(trials: usize, betting_type: BettingType) -> Self {
        Self {
            trials,
            betting_type,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Outcome of one pass over every race.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trial {
    pub profit: f64,
    pub race_count: usize,
}

/// Aggregate result of a simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    pub strategy: String,
    pub betting_type: BettingType,
    pub seed: u64,
    /// Total profit per trial, in trial order
    pub results: Vec<f64>,
    pub mean: f64,
    /// Population standard deviation of `results`
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub race_counts: Vec<usize>,
    pub avg_races: f64,
    pub diagnostics: Diagnostics,
}

impl SimulationSummary {
    fn from_trials(
        strategy: String,
        config: &SimulationConfig,
        trials: Vec<Trial>,
        diagnostics: Diagnostics,
    ) -> Self {
        let results: Vec<f64> = trials.iter().map(|t| t.profit).collect();
        let race_counts: Vec<usize> = trials.iter().map(|t| t.race_count).collect();
        let n = results.len().max(1) as f64;

        let sum: f64 = results.iter().sum();
        let mean = sum / n;
        let variance = results.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let min = results.iter().copied().fold(f64::INFINITY, f64::min);
        let max = results.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg_races = race_counts.iter().sum::<usize>() as f64 / n;

        Self {
            strategy,
            betting_type: config.betting_type,
            seed: config.seed,
            results,
            mean,
            std: variance.sqrt(),
            min,
            max,
            sum,
            race_counts,
            avg_races,
            diagnostics,
        }
    }

    pub fn trials(&self) -> usize {
        self.results.len()
    }

    /// Mean profit per unit staked.
    pub fn roi(&self) -> f64 {
        if self.avg_races > 0.0 {
            self.mean / self.avg_races
        } else {
            0.0
        }
    }
}

/// A strategy bound to a simulation configuration.
pub struct Simulation {
    strategy: Strategy,
    config: SimulationConfig,
}

impl Simulation {
    pub fn new(strategy: Strategy, config: SimulationConfig) -> Result<Self, ConfigurationError> {
        if config.trials == 0 {
            return Err(ConfigurationError::InvalidTrialCount);
        }
        Ok(Self { strategy, config })
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run every trial and summarize. Either all trials complete or the run fails.
    pub fn run(&self, races: &[RaceGroup]) -> Result<SimulationSummary> {
        let label = self.strategy.label();
        info!(
            strategy = %label,
            betting_type = %self.config.betting_type,
            trials = self.config.trials,
            races = races.len(),
            execution = ?self.config.execution,
            "Starting simulation"
        );

        let started = Instant::now();
        let outcomes = match self.config.execution {
            Execution::Sequential => self.run_sequential(races, started)?,
            Execution::Parallel => self.run_parallel(races, started)?,
        };

        let mut diagnostics = Diagnostics::new();
        let mut trials = Vec::with_capacity(outcomes.len());
        for (trial, trial_diagnostics) in outcomes {
            trials.push(trial);
            diagnostics.merge(trial_diagnostics);
        }

        if diagnostics.has_warnings() {
            warn!(
                strategy = %label,
                nan_values = diagnostics.nan_values,
                infinite_scores = diagnostics.infinite_scores,
                missing_columns = diagnostics.missing_columns,
                missing_dividends = diagnostics.missing_dividends,
                "Data quality warnings during simulation"
            );
        }

        let summary = SimulationSummary::from_trials(label, &self.config, trials, diagnostics);
        info!(
            strategy = %summary.strategy,
            mean = summary.mean,
            std = summary.std,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Simulation finished"
        );
        Ok(summary)
    }

    fn run_sequential(
        &self,
        races: &[RaceGroup],
        started: Instant,
    ) -> Result<Vec<(Trial, Diagnostics)>> {
        let mut rng = SmallRng::seed_from_u64(self.config.seed);
        let mut outcomes = Vec::with_capacity(self.config.trials);

        for i in 0..self.config.trials {
            self.check_cancelled(started, i)?;
            outcomes.push(self.run_trial(i, races, &mut rng));
        }
        Ok(outcomes)
    }

    fn run_parallel(
        &self,
        races: &[RaceGroup],
        started: Instant,
    ) -> Result<Vec<(Trial, Diagnostics)>> {
        let completed = AtomicUsize::new(0);

        (0..self.config.trials)
            .into_par_iter()
            .map(|i| {
                self.check_cancelled(started, completed.load(Ordering::Relaxed))?;
                let mut rng = SmallRng::seed_from_u64(self.config.seed.wrapping_add(i as u64));
                let outcome = self.run_trial(i, races, &mut rng);
                completed.fetch_add(1, Ordering::Relaxed);
                Ok(outcome)
            })
            .collect()
    }

    fn check_cancelled(&self, started: Instant, completed: usize) -> Result<()> {
        let cancelled = self.config.cancel.as_ref().is_some_and(CancelToken::is_cancelled);
        let timed_out = self
            .config
            .time_limit
            .is_some_and(|limit| started.elapsed() >= limit);

        if cancelled || timed_out {
            return Err(SimError::Cancelled {
                completed,
                requested: self.config.trials,
            });
        }
        Ok(())
    }

    fn run_trial(
        &self,
        index: usize,
        races: &[RaceGroup],
        rng: &mut SmallRng,
    ) -> (Trial, Diagnostics) {
        let betting_type = self.config.betting_type;
        let mut diagnostics = Diagnostics::new();
        let mut profit = 0.0;
        let mut race_count = 0;

        for race in races {
            let selection = self.strategy.select(race, betting_type, rng, &mut diagnostics);
            profit += payout(selection.record, betting_type, &mut diagnostics);
            race_count += 1;
        }

        debug!(trial = index, race_count, profit, "Trial finished");
        (Trial { profit, race_count }, diagnostics)
    }
}

/// Profit of a one-unit bet on `record`: `dividend / 10 - 1` on a hit, `-1` otherwise.
///
/// A hit whose dividend is missing or NaN is paid as a dividend of 1 and
/// reported.
pub fn payout(record: &RaceRecord, betting_type: BettingType, diagnostics: &mut Diagnostics) -> f64 {
    if !evaluate(record, betting_type) {
        return -1.0;
    }

    let (dividend, column) = match betting_type {
        BettingType::Win => {
            let d = record.win_dividend1;
            ((!d.is_nan()).then_some(d), columns::WIN_DIVIDEND1)
        }
        BettingType::Place => (
            record.place_dividend(record.result),
            columns::PLACE_DIVIDENDS[(record.result - 1) as usize],
        ),
    };

    let dividend = dividend.unwrap_or_else(|| {
        diagnostics.report(DataQualityWarning::MissingDividend {
            race_id: record.race_id.clone(),
            column,
        });
        1.0
    });

    dividend / 10.0 - 1.0
}
