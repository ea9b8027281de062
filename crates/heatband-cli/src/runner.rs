//! Job runner: launches the workers and writes their results.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use heatband_core::launch::{solve_threads, LocalRun};
use heatband_core::reference::{max_abs_deviation, solve_sequential};
use heatband_core::sink::{write_csv_file, CsvDirectorySink, ResultSink};
use heatband_core::SolveReport;

use crate::config::JobConfig;

/// Largest deviation from the sequential solver accepted by `--verify`.
pub const VERIFY_TOLERANCE: f64 = 1e-6;

/// Run all workers as threads of this process.
pub fn run_local(job: &JobConfig, out_dir: &Path, verify: bool) -> Result<SolveReport> {
    let domain = job.domain();
    let workers = job.workers();
    let config = job.solver_config();

    println!("Domain: {}x{} cells", domain.rows, domain.cols);
    println!(
        "Workers: {} ({}x{} cells per band)",
        workers,
        domain.rows / workers.max(1),
        domain.cols
    );

    let run = solve_threads(domain, workers, &config)?;
    print_report(&run.report);

    if job.output.save_bands {
        write_bands(&run, workers, out_dir)?;
    }

    if job.output.save_field {
        let field = run.field(workers)?;
        let path = out_dir.join("heat_output.csv");
        write_csv_file(&path, field.view())?;
        println!("Field written to: {}", path.display());
    }

    if job.output.save_summary {
        write_summary_json(job, workers, &run.report, &out_dir.join("summary.json"))?;
    }

    if verify {
        let field = run.field(workers)?;
        let (oracle, _) = solve_sequential(domain, &config)?;
        let deviation = max_abs_deviation(&field, &oracle)
            .context("Assembled field does not match the domain shape")?;
        println!("Max deviation from sequential solve: {:.3e}", deviation);
        if deviation > VERIFY_TOLERANCE {
            anyhow::bail!(
                "Verification failed: deviation {:.3e} exceeds {:.0e}",
                deviation,
                VERIFY_TOLERANCE
            );
        }
        println!("Verification: PASSED");
    }

    Ok(run.report)
}

/// Run this process as one rank of an MPI job.
#[cfg(feature = "mpi")]
pub fn run_mpi(job: &JobConfig, out_dir: &Path) -> Result<SolveReport> {
    use heatband_comm::{MpiTransport, Transport};
    use heatband_core::{BandPlan, Worker};

    let universe = mpi::initialize().context("MPI is already initialised")?;
    let transport = MpiTransport::new(universe.world());
    let rank = transport.rank();
    let size = transport.size();

    let plan = BandPlan::new(job.domain(), size, rank)?;
    if job.domain.workers.is_some_and(|w| w != size) {
        log::warn!("Ignoring configured worker count; the MPI world has {} ranks", size);
    }

    let mut worker = Worker::new(plan, transport, job.solver_config())?;
    let report = worker.run()?;

    if job.output.save_bands {
        let mut sink = CsvDirectorySink::new(out_dir);
        worker.write_band(&mut sink)?;
    }

    if rank == 0 {
        print_report(&report);
        if job.output.save_field {
            log::warn!("save_field is only available for local runs; skipping");
        }
        if job.output.save_summary {
            write_summary_json(job, size, &report, &out_dir.join("summary.json"))?;
        }
    }

    Ok(report)
}

fn print_report(report: &SolveReport) {
    if report.converged {
        println!("Converged after {} iterations", report.iterations);
    } else {
        println!(
            "Stopped after {} iterations without converging",
            report.iterations
        );
    }
    println!("Final maximum difference: {:.6}", report.final_max_diff);
    println!("Execution time: {:.3} seconds", report.elapsed_seconds);
}

/// Write each worker's band to its own CSV file.
fn write_bands(run: &LocalRun, workers: usize, out_dir: &Path) -> Result<()> {
    let mut sink = CsvDirectorySink::new(out_dir);
    for rank in 0..workers {
        let band = run
            .bands
            .band(rank)
            .with_context(|| format!("No band from worker {}", rank))?;
        sink.write_band(rank, band.view())?;
    }
    println!(
        "Bands written to: {} ({} files)",
        out_dir.display(),
        sink.written().len()
    );
    Ok(())
}

/// Run summary serialised to JSON.
#[derive(serde::Serialize)]
struct Summary<'a> {
    version: &'a str,
    rows: usize,
    cols: usize,
    workers: usize,
    solver: heatband_core::SolverConfig,
    report: &'a SolveReport,
}

fn write_summary_json(
    job: &JobConfig,
    workers: usize,
    report: &SolveReport,
    path: &Path,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let summary = Summary {
        version: env!("CARGO_PKG_VERSION"),
        rows: job.domain.rows,
        cols: job.domain.cols,
        workers,
        solver: job.solver_config(),
        report,
    };
    let json = serde_json::to_string_pretty(&summary)
        .map_err(|e| anyhow::anyhow!("JSON serialisation error: {}", e))?;
    std::fs::write(path, json)
        .with_context(|| format!("Cannot write {}", path.display()))?;

    println!("Summary written to: {}", path.display());
    Ok(())
}

/// Resolve the output directory: command line first, then the job file.
pub fn output_dir(job: &JobConfig, cli: Option<PathBuf>) -> PathBuf {
    cli.unwrap_or_else(|| PathBuf::from(&job.output.directory))
}
