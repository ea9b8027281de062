//! Run a whole partition inside one process, one thread per worker.

use std::thread;

use heatband_comm::LocalTransport;
use ndarray::Array2;

use crate::partition::{self, BandPlan, Domain, PartitionError};
use crate::sink::{MemorySink, ResultSink};
use crate::solver::{SolveError, SolveReport, SolverConfig, Worker};

/// Result of an in-process run.
#[derive(Debug, Clone)]
pub struct LocalRun {
    pub report: SolveReport,
    /// Final interior band of every worker.
    pub bands: MemorySink,
}

impl LocalRun {
    /// The final field of the whole domain.
    pub fn field(&self, workers: usize) -> Result<Array2<f64>, SolveError> {
        Ok(self.bands.assemble(workers)?)
    }
}

/// Solve `domain` with `workers` threads connected by a [`LocalTransport`].
///
/// The first failing worker (by index) determines the returned error; its
/// peers then fail with disconnection errors and are ignored.
pub fn solve_threads(
    domain: Domain,
    workers: usize,
    config: &SolverConfig,
) -> Result<LocalRun, SolveError> {
    partition::validate(domain, workers)?;
    let plans = BandPlan::all(domain, workers)?;
    let transports = LocalTransport::group(workers);

    let outcomes: Vec<Result<(SolveReport, Array2<f64>), SolveError>> = thread::scope(|s| {
        let handles: Vec<_> = plans
            .into_iter()
            .zip(transports)
            .map(|(plan, transport)| {
                let config = *config;
                s.spawn(move || -> Result<(SolveReport, Array2<f64>), SolveError> {
                    let mut worker = Worker::new(plan, transport, config)?;
                    let report = worker.run()?;
                    Ok((report, worker.band().to_owned()))
                })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(rank, h)| h.join().unwrap_or(Err(SolveError::WorkerPanicked(rank))))
            .collect()
    });

    let mut bands = MemorySink::new();
    let mut reports = Vec::with_capacity(workers);
    for (rank, outcome) in outcomes.into_iter().enumerate() {
        let (report, band) = outcome?;
        bands.write_band(rank, band.view())?;
        reports.push(report);
    }

    let report = reports
        .into_iter()
        .next()
        .ok_or(PartitionError::NoWorkers)?;
    Ok(LocalRun { report, bands })
}
