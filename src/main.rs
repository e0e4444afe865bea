use anyhow::Context;
use beamdrift::cli::{self, Args};
use beamdrift::scenario::Simulation;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if args.list_solvers {
        cli::handle_list_solvers();
        return Ok(());
    }

    let config = cli::load_and_apply_config(&args)?;

    if let Some(path) = &args.save_config {
        config
            .save(path)
            .with_context(|| format!("writing configuration to {path}"))?;
        println!("Configuration saved to: {path}");
        return Ok(());
    }

    if let Some(threads) = config.run.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("configuring the worker pool")?;
    }

    let mut simulation = Simulation::from_config(&config).context("building the simulation")?;
    let summary = simulation.run().context("tracking")?;
    info!(
        turns = summary.turns,
        alive = summary.statistics.n_alive,
        lost = summary.statistics.n_lost,
        bunch_length = summary.bunch_length_rms,
        bunch_position = summary.bunch_position_rms,
        emittance = summary.statistics.epsn_rms_l,
        "run complete"
    );
    Ok(())
}
