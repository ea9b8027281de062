//! Heatband command-line interface.
//!
//! Run the banded heat solver with built-in defaults, a TOML job file, or
//! both (flags override the file):
//! ```sh
//! heatband run --rows 200 --cols 200 --workers 4
//! heatband run job.toml --output results --verify
//! mpirun -n 4 heatband run job.toml --transport mpi
//! heatband validate job.toml
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use config::JobConfig;

#[derive(Parser)]
#[command(name = "heatband")]
#[command(about = "Heatband: row-band distributed Jacobi heat solver")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum TransportChoice {
    /// Worker threads inside this process.
    Local,
    /// One worker per MPI rank (requires the `mpi` feature).
    Mpi,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation.
    Run {
        /// Optional job configuration file.
        config: Option<PathBuf>,
        /// Global row count.
        #[arg(long)]
        rows: Option<usize>,
        /// Global column count.
        #[arg(long)]
        cols: Option<usize>,
        /// Number of workers (local transport only).
        #[arg(short, long)]
        workers: Option<usize>,
        /// Iteration cap.
        #[arg(long)]
        max_iterations: Option<usize>,
        /// Convergence threshold on the global max change.
        #[arg(long)]
        threshold: Option<f64>,
        /// Sweep each band on the Rayon thread pool.
        #[arg(long)]
        parallel_stencil: bool,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Compare against a sequential solve of the whole domain.
        #[arg(long)]
        verify: bool,
        #[arg(long, value_enum, default_value_t = TransportChoice::Local)]
        transport: TransportChoice,
    },
    /// Validate a configuration file without running the simulation.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            rows,
            cols,
            workers,
            max_iterations,
            threshold,
            parallel_stencil,
            output,
            verify,
            transport,
        } => {
            let mut job = match &config {
                Some(path) => config::load_config(path)?,
                None => JobConfig::default(),
            };
            if let Some(rows) = rows {
                job.domain.rows = rows;
            }
            if let Some(cols) = cols {
                job.domain.cols = cols;
            }
            if workers.is_some() {
                job.domain.workers = workers;
            }
            if let Some(max_iterations) = max_iterations {
                job.solver.max_iterations = max_iterations;
            }
            if let Some(threshold) = threshold {
                job.solver.convergence_threshold = threshold;
            }
            job.solver.parallel_stencil |= parallel_stencil;
            let out_dir = runner::output_dir(&job, output);

            match transport {
                TransportChoice::Local => {
                    println!("Heatband Solver");
                    println!("===============");
                    if let Some(path) = &config {
                        println!("Configuration: {}", path.display());
                    }
                    runner::run_local(&job, &out_dir, verify)?;
                }
                TransportChoice::Mpi => {
                    if verify {
                        log::warn!("--verify is only available for local runs");
                    }
                    #[cfg(feature = "mpi")]
                    runner::run_mpi(&job, &out_dir)?;
                    #[cfg(not(feature = "mpi"))]
                    anyhow::bail!("MPI requested but binary was built without --features mpi");
                }
            }

            println!("Simulation complete.");
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            heatband_core::partition::validate(job.domain(), job.workers())?;
            println!("Configuration is valid: {}", config.display());
            Ok(())
        }
    }
}
