//! CLI commands for keiba-sim.
//!
//! `simulate` runs one strategy, `sweep` runs the built-in strategy catalog
//! for each requested bet type.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use crate::config::AppConfig;
use crate::error::ConfigurationError;
use crate::features::FeatureEngine;
use crate::loader::load_races;
use crate::report::{print_summary_table, print_sweep_table, SweepReport};
use crate::simulation::Simulation;
use crate::strategy::{Strategy, ValueRange};
use crate::types::{BettingType, Entity, RaceGroup};

#[derive(Parser)]
#[command(name = "keiba-sim")]
#[command(version, about = "Keiba-Sim: Monte Carlo backtests of race selection strategies", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Simulate a single strategy
    Simulate {
        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        strategy: StrategyArgs,
    },

    /// Simulate every built-in strategy and rank them
    Sweep {
        #[command(flatten)]
        run: RunArgs,

        /// Bet types to sweep (win, place)
        #[arg(long, value_delimiter = ',', default_value = "win,place")]
        bet_types: Vec<String>,
    },
}

/// Options shared by both commands. Unset values come from the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Path to race history CSV
    #[arg(value_name = "DATA")]
    pub data: Option<PathBuf>,

    /// Bet type (win, place)
    #[arg(short, long)]
    pub bet_type: Option<String>,

    /// Number of Monte Carlo trials
    #[arg(short = 'n', long)]
    pub trials: Option<usize>,

    /// Master random seed
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Rolling window in prior races
    #[arg(short, long)]
    pub window: Option<usize>,

    /// Run trials in parallel (per-trial seeds)
    #[arg(long)]
    pub parallel: bool,

    /// Abort after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", value_parser = ["table", "json"])]
    pub format: String,
}

/// Strategy choice and parameter overrides.
#[derive(Args, Debug, Clone, Default)]
pub struct StrategyArgs {
    /// random, odds_range, min_odds, max_odds, win_rate_range, max_win_rate,
    /// composite, combined
    #[arg(long)]
    pub strategy: Option<String>,

    /// Entity for rate-based strategies (horse, jockey)
    #[arg(long)]
    pub entity: Option<String>,

    #[arg(long)]
    pub min_odds: Option<f64>,

    #[arg(long)]
    pub max_odds: Option<f64>,

    #[arg(long)]
    pub min_rate: Option<f64>,

    #[arg(long)]
    pub max_rate: Option<f64>,

    /// Combined: horse rate weight
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Combined: jockey rate weight
    #[arg(long)]
    pub beta: Option<f64>,

    /// Combined: odds weight
    #[arg(long)]
    pub gamma: Option<f64>,

    /// Combined: which distinct score to bet on (1 = highest)
    #[arg(long)]
    pub score_rank: Option<usize>,
}

/// Strategy named on the command line, or the configured one, with overrides applied.
pub fn build_strategy(args: &StrategyArgs, configured: &Strategy) -> Result<Strategy, ConfigurationError> {
    let strategy = match args.strategy.as_deref() {
        Some(name) => strategy_from_name(name)?,
        None => configured.clone(),
    };
    apply_overrides(strategy, args)
}

/// Strategy with its default parameters.
pub fn strategy_from_name(name: &str) -> Result<Strategy, ConfigurationError> {
    let normalized = name.trim().to_lowercase().replace('-', "_");
    let strategy = match normalized.as_str() {
        "random" => Strategy::Random,
        "odds_range" => Strategy::odds_range(1.0, f64::INFINITY),
        "min_odds" => Strategy::MinOdds,
        "max_odds" => Strategy::MaxOdds,
        "win_rate_range" => Strategy::win_rate_range(Entity::Jockey, 0.0, 1.0),
        "max_win_rate" => Strategy::MaxWinRate {
            entity: Entity::Jockey,
        },
        "composite" | "composite_score" => {
            Strategy::composite(Entity::Jockey, ValueRange::rate(), ValueRange::odds())
        }
        "combined" => Strategy::Combined {
            alpha: 0.65,
            beta: 0.25,
            gamma: 0.10,
            score_rank: 3,
        },
        _ => return Err(ConfigurationError::UnknownStrategy(name.to_string())),
    };
    Ok(strategy)
}

fn set<T: Copy>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn apply_overrides(mut strategy: Strategy, args: &StrategyArgs) -> Result<Strategy, ConfigurationError> {
    let entity = args.entity.as_deref().map(str::parse::<Entity>).transpose()?;

    match &mut strategy {
        Strategy::OddsRange { min, max } => {
            set(min, args.min_odds);
            set(max, args.max_odds);
        }
        Strategy::WinRateRange {
            entity: target,
            min,
            max,
        } => {
            set(target, entity);
            set(min, args.min_rate);
            set(max, args.max_rate);
        }
        Strategy::MaxWinRate { entity: target } => set(target, entity),
        Strategy::CompositeScore {
            entity: target,
            rate,
            odds,
        } => {
            set(target, entity);
            set(&mut rate.min, args.min_rate);
            set(&mut rate.max, args.max_rate);
            set(&mut odds.min, args.min_odds);
            set(&mut odds.max, args.max_odds);
        }
        Strategy::Combined {
            alpha,
            beta,
            gamma,
            score_rank,
        } => {
            set(alpha, args.alpha);
            set(beta, args.beta);
            set(gamma, args.gamma);
            set(score_rank, args.score_rank);
        }
        Strategy::Random | Strategy::MinOdds | Strategy::MaxOdds => {}
    }
    Ok(strategy)
}

/// Fold command-line overrides into the loaded configuration.
pub fn apply_run_args(config: &mut AppConfig, run: &RunArgs) -> Result<(), ConfigurationError> {
    if let Some(path) = &run.data {
        config.data.path = path.to_string_lossy().to_string();
    }
    if let Some(bet_type) = &run.bet_type {
        config.simulation.betting_type = bet_type.parse()?;
    }
    set(&mut config.simulation.trials, run.trials);
    set(&mut config.simulation.seed, run.seed);
    set(&mut config.data.window, run.window);
    if run.parallel {
        config.simulation.parallel = true;
    }
    if run.timeout_secs.is_some() {
        config.simulation.timeout_secs = run.timeout_secs;
    }
    Ok(())
}

/// Load the history file, derive rolling rates, and group by race.
pub fn prepare_races(config: &AppConfig) -> anyhow::Result<Vec<RaceGroup>> {
    let mut table = load_races(&config.data.path)
        .with_context(|| format!("failed to load race data from {}", config.data.path))?;

    FeatureEngine::new(config.data.window)?
        .with_same_day_policy(config.data.same_day)
        .apply(&mut table)?;

    let races = table.races();
    info!(races = races.len(), window = config.data.window, "Prepared races");
    Ok(races)
}

/// Run a single strategy.
pub fn run_simulate(run: RunArgs, strategy_args: StrategyArgs) -> anyhow::Result<()> {
    let mut config = AppConfig::load()?;
    apply_run_args(&mut config, &run)?;
    let strategy = build_strategy(&strategy_args, &config.strategy)?;

    let races = prepare_races(&config)?;
    let simulation = Simulation::new(strategy, config.simulation.to_config())?;
    let summary = simulation.run(&races)?;

    match run.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        _ => print_summary_table(&summary),
    }
    Ok(())
}

/// Run the strategy catalog for each bet type.
pub fn run_sweep(run: RunArgs, bet_types: Vec<String>) -> anyhow::Result<()> {
    let mut config = AppConfig::load()?;
    apply_run_args(&mut config, &run)?;

    let bet_types = bet_types
        .iter()
        .map(|b| b.parse::<BettingType>())
        .collect::<Result<Vec<_>, _>>()?;

    let races = prepare_races(&config)?;

    let mut summaries = Vec::new();
    for betting_type in bet_types {
        let mut settings = config.simulation.clone();
        settings.betting_type = betting_type;

        for strategy in Strategy::catalog() {
            let simulation = Simulation::new(strategy, settings.to_config())?;
            summaries.push(simulation.run(&races)?);
        }
    }

    let report = SweepReport { summaries };
    match run.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_sweep_table(&report),
    }
    Ok(())
}
