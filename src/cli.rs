//! Command line interface for beamdrift

use clap::Parser;
use thiserror::Error;

use crate::config::SimulationConfig;
use crate::tracker::SolverRegistry;

/// CLI-specific errors
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file could not be loaded or is inconsistent
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(String),
    /// Invalid solver name provided
    #[error("Invalid solver: {0}")]
    InvalidSolver(String),
}

/// beamdrift - longitudinal beam dynamics with wake fields
#[derive(Parser, Debug)]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_DATE"), ")"), about, long_about = None)]
pub struct Args {
    /// Path to configuration file (TOML format)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<String>,

    /// Number of turns to track (overrides config file)
    #[arg(short = 't', long, value_name = "COUNT")]
    pub turns: Option<usize>,

    /// Number of macroparticles (overrides config file)
    #[arg(short = 'n', long, value_name = "COUNT")]
    pub particles: Option<usize>,

    /// Number of profile slices (overrides config file)
    #[arg(long, value_name = "COUNT")]
    pub slices: Option<usize>,

    /// Drift solver (e.g., simple, full, exact)
    #[arg(long, value_name = "NAME")]
    pub solver: Option<String>,

    /// Random seed for bunch generation
    #[arg(short = 's', long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Worker threads for particle updates
    #[arg(short = 'j', long, value_name = "COUNT")]
    pub threads: Option<usize>,

    /// Write the effective configuration to FILE and exit
    #[arg(long, value_name = "FILE")]
    pub save_config: Option<String>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// List available solvers and exit
    #[arg(long)]
    pub list_solvers: bool,
}

/// Handles the --list-solvers flag by printing available solvers
pub fn handle_list_solvers() {
    let registry = SolverRegistry::default();
    println!("Available solvers:");
    for name in registry.list_available() {
        println!("  - {name}");
    }

    let aliases = registry.list_aliases();
    if !aliases.is_empty() {
        println!("\nAliases:");
        for (alias, target) in aliases {
            println!("  - {alias} -> {target}");
        }
    }
}

/// Loads configuration from file or defaults, then applies command-line overrides
pub fn load_and_apply_config(args: &Args) -> Result<SimulationConfig, CliError> {
    let mut config = if let Some(config_path) = &args.config {
        println!("Loading configuration from: {config_path}");
        SimulationConfig::load(std::path::Path::new(config_path))
            .map_err(|err| CliError::ConfigLoad(format!("{config_path}: {err}")))?
    } else {
        SimulationConfig::load_from_user_config()
    };

    if let Some(turns) = args.turns {
        println!("Overriding turn count to: {turns}");
        config.run.n_turns = turns;
    }

    if let Some(particles) = args.particles {
        println!("Overriding macroparticle count to: {particles}");
        config.beam.n_macroparticles = particles;
    }

    if let Some(slices) = args.slices {
        println!("Overriding slice count to: {slices}");
        config.profile.n_slices = slices;
    }

    if let Some(name) = &args.solver {
        let solver = SolverRegistry::default()
            .create(name)
            .map_err(|err| CliError::InvalidSolver(err.to_string()))?;
        println!("Using solver: {solver}");
        config.tracking.solver = solver;
    }

    if let Some(seed) = args.seed {
        println!("Using random seed: {seed}");
        config.beam.seed = seed;
    }

    if let Some(threads) = args.threads {
        println!("Using {threads} worker threads");
        config.run.threads = Some(threads);
    }

    config
        .validate()
        .map_err(|err| CliError::ConfigLoad(err.to_string()))?;
    Ok(config)
}
