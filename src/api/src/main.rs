//! Keiba-Sim
//!
//! Monte Carlo backtests of horse racing selection strategies.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keiba_sim::cli::{self, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so JSON reports on stdout stay parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keiba_sim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate { run, strategy } => cli::run_simulate(run, strategy),
        Commands::Sweep { run, bet_types } => cli::run_sweep(run, bet_types),
    }
}
