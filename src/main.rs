use std::path::Path;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use cosmogen_lib::model::config::SimConfig;
use cosmogen_lib::model::error::SimError;
use cosmogen_lib::model::io::history::write_state_dump;
use cosmogen_lib::model::io::{export_grid, export_run};
use cosmogen_lib::model::metrics::init_logging;
use cosmogen_lib::model::state::HistoryLog;
use cosmogen_lib::model::universe::Universe;
use cosmogen_lib::model::ParameterSet;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Named stopping point for the run
    #[arg(long, value_enum, default_value = "recombination")]
    until: Stage,

    /// Explicit target time in seconds, overrides --until
    #[arg(long)]
    target_time: Option<f64>,

    /// Directory run artifacts are written into
    #[arg(short, long, default_value = "runs")]
    out_dir: PathBuf,

    /// Write the full grid field next to the scalar history
    #[arg(long)]
    export_grid: bool,

    /// Override the grid seed from the config
    #[arg(long)]
    seed: Option<u64>,

    /// Print a log-spaced timeline of the completed run
    #[arg(long)]
    timeline: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Stage {
    /// Matter-radiation equality.
    Equality,
    /// End of light-element burning, about 25 minutes in.
    Nucleosynthesis,
    /// Photon decoupling era.
    Recombination,
    /// Present day.
    Now,
}

impl Stage {
    fn target_time_s(self, params: &ParameterSet) -> f64 {
        match self {
            Stage::Equality => params.equality_time(),
            Stage::Nucleosynthesis => 1.5e3,
            Stage::Recombination => 1.2e13,
            Stage::Now => 4.35e17,
        }
    }
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let path = Path::new(&args.config);
    let mut config = if path.exists() {
        SimConfig::load(path)?
    } else {
        tracing::warn!(
            path = %path.display(),
            "config file not found, using built-in defaults"
        );
        SimConfig::default()
    };
    if let Some(seed) = args.seed {
        config.grid.seed = seed;
    }

    let mut universe = Universe::new(config)?;
    let target = args
        .target_time
        .unwrap_or_else(|| args.until.target_time_s(universe.params()));
    let run_dir = args.out_dir.join(universe.meta().run_id.to_string());

    println!(
        "cosmogen {} run {}",
        env!("CARGO_PKG_VERSION"),
        universe.meta().run_id
    );
    match args.target_time {
        Some(t) => println!("Target: t = {t:.3e} s (explicit)"),
        None => println!("Target: t = {target:.3e} s ({:?})", args.until),
    }

    let report = match universe.run_to_time(target) {
        Ok(report) => report,
        Err(err) => {
            if let SimError::NonPhysical { state, .. } = &err {
                match write_state_dump(&run_dir, state) {
                    Ok(dump_path) => {
                        tracing::error!(dump = %dump_path.display(), "fatal state dump written")
                    }
                    Err(io_err) => {
                        tracing::error!(error = %io_err, "failed to write state dump")
                    }
                }
            }
            // Keep whatever history accumulated; partial runs are still data.
            match export_run(&run_dir, universe.meta(), universe.history()) {
                Ok(history_path) => {
                    tracing::info!(history = %history_path.display(), "partial history exported")
                }
                Err(io_err) => {
                    tracing::error!(error = %io_err, "failed to export partial history")
                }
            }
            return Err(err.into());
        }
    };

    let history_path = export_run(&run_dir, universe.meta(), universe.history())?;
    if args.export_grid {
        let grid_path = run_dir.join("grid.json.gz");
        export_grid(&grid_path, &universe.grid_snapshot())?;
        println!("Grid snapshot: {}", grid_path.display());
    }

    println!(
        "Finished: {} steps, {} retries in {:.1?}",
        report.steps,
        report.retries,
        universe.metrics().elapsed()
    );
    println!(
        "Final state: t = {:.4e} s, a = {:.4e}, T = {:.4e} K, epoch {:?}",
        report.final_time,
        report.final_scale_factor,
        universe.thermal().temperature_k,
        universe.epoch()
    );
    if let Some(x) = universe.abundances() {
        println!(
            "Abundances: H {:.4}, He-4 {:.4}, D {:.3e}, He-3 {:.3e}, Li-7 {:.3e}, n {:.3e}",
            x.proton, x.helium4, x.deuterium, x.helium3, x.lithium7, x.neutron
        );
    }
    println!("History: {}", history_path.display());

    if args.timeline {
        print_timeline(universe.history());
    }
    Ok(())
}

/// Prints roughly log-spaced rows of the scalar history.
fn print_timeline(history: &HistoryLog) {
    println!(
        "{:>12} {:>12} {:>12} {:>7}  epoch",
        "t [s]", "a", "T [K]", "g*"
    );
    let mut next_time = 0.0;
    for r in history.iter() {
        if r.time_s >= next_time {
            println!(
                "{:>12.4e} {:>12.4e} {:>12.4e} {:>7.2}  {:?}",
                r.time_s, r.scale_factor, r.temperature_k, r.g_star, r.epoch
            );
            next_time = r.time_s * 1.1;
        }
    }
}
