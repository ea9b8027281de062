//! The per-worker iteration driver.
//!
//! A [`Worker`] owns one band and runs the lockstep loop
//!
//! ```text
//! halo exchange -> stencil sweep -> max all-reduce -> swap
//! ```
//!
//! until the iteration cap is hit or the global change drops to the
//! threshold. Because every worker sees the same reduced value, all workers
//! leave the loop in the same iteration.

use std::time::Instant;

use heatband_comm::{Transport, TransportError};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::boundary::{BoundaryInitializer, BoundaryValues};
use crate::convergence::{ConvergenceReducer, Criteria, IterationState};
use crate::field::FieldBuffer;
use crate::halo::{HaloError, HaloExchanger};
use crate::partition::{BandPlan, PartitionError};
use crate::sink::{ResultSink, SinkError};
use crate::stencil::StencilUpdater;

/// Errors that abort a solve.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error("Invalid partition: {0}")]
    Partition(#[from] PartitionError),

    #[error("Transport has worker {rank} of {size}, but the band belongs to worker {plan_rank} of {plan_size}")]
    GroupMismatch {
        rank: usize,
        size: usize,
        plan_rank: usize,
        plan_size: usize,
    },

    #[error(transparent)]
    Halo(#[from] HaloError),

    #[error("Convergence all-reduce failed: {0}")]
    Reduce(#[from] TransportError),

    #[error("Failed to persist band: {0}")]
    Sink(#[from] SinkError),

    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),
}

/// Solver settings shared by every worker of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    pub criteria: Criteria,
    pub boundary: BoundaryValues,
    /// Sweep each band's rows on the Rayon pool.
    pub parallel_stencil: bool,
    /// Log progress on worker 0 every this many iterations (0 = never).
    pub report_interval: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            criteria: Criteria::default(),
            boundary: BoundaryValues::default(),
            parallel_stencil: false,
            report_interval: 100,
        }
    }
}

/// Outcome of a solve. Every worker of a run returns the same report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveReport {
    pub iterations: usize,
    /// Global max change of the last iteration; infinite if none ran.
    pub final_max_diff: f64,
    pub converged: bool,
    /// Global max change per iteration.
    pub history: Vec<f64>,
    /// Wall-clock time of the loop, max across workers.
    pub elapsed_seconds: f64,
}

/// One worker of a banded solve.
pub struct Worker<T: Transport> {
    plan: BandPlan,
    transport: T,
    config: SolverConfig,
    field: FieldBuffer,
    halo: HaloExchanger,
    stencil: StencilUpdater,
    reducer: ConvergenceReducer,
}

impl<T: Transport> Worker<T> {
    /// Allocate the band and stamp its boundary conditions.
    pub fn new(plan: BandPlan, transport: T, config: SolverConfig) -> Result<Self, SolveError> {
        if transport.rank() != plan.rank() || transport.size() != plan.workers() {
            return Err(SolveError::GroupMismatch {
                rank: transport.rank(),
                size: transport.size(),
                plan_rank: plan.rank(),
                plan_size: plan.workers(),
            });
        }

        let (rows, cols) = plan.buffer_shape();
        let mut field = FieldBuffer::allocate(rows, cols);
        BoundaryInitializer::new(plan, config.boundary).apply(&mut field);

        Ok(Self {
            plan,
            transport,
            config,
            field,
            halo: HaloExchanger::new(&plan),
            stencil: StencilUpdater::new(plan).with_parallel(config.parallel_stencil),
            reducer: ConvergenceReducer::new(config.criteria),
        })
    }

    pub fn plan(&self) -> &BandPlan {
        &self.plan
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn field(&self) -> &FieldBuffer {
        &self.field
    }

    /// Interior rows of the current field.
    pub fn band(&self) -> ArrayView2<'_, f64> {
        self.field.interior()
    }

    /// Refresh the ghost rows of the current field.
    pub fn exchange_halo(&mut self) -> Result<(), SolveError> {
        self.halo
            .exchange(&self.transport, self.field.current_mut())?;
        Ok(())
    }

    /// Run one full iteration and return the global max change.
    pub fn step(&mut self, state: &mut IterationState) -> Result<f64, SolveError> {
        self.exchange_halo()?;

        let (current, next) = self.field.split();
        let local_max_diff = self.stencil.update(current, next);

        let global_max_diff = self.reducer.reduce(&self.transport, local_max_diff)?;
        self.field.swap();
        state.advance(global_max_diff);

        log::debug!(
            "Worker {}: iteration {} local max diff {:.6e}, global {:.6e}",
            self.plan.rank(),
            state.iteration,
            local_max_diff,
            global_max_diff
        );
        Ok(global_max_diff)
    }

    /// Iterate until the termination criteria are met.
    pub fn run(&mut self) -> Result<SolveReport, SolveError> {
        let start = Instant::now();
        let mut state = IterationState::new();

        if self.plan.is_first() {
            log::info!(
                "Starting heat distribution with {} workers, {}x{} cells per band",
                self.plan.workers(),
                self.plan.local_rows(),
                self.plan.cols()
            );
        }

        while self.reducer.should_continue(&state) {
            let global_max_diff = self.step(&mut state)?;
            let interval = self.config.report_interval;
            if self.plan.is_first() && interval > 0 && state.iteration % interval == 0 {
                log::info!(
                    "Iteration {}: maximum difference = {:.6}",
                    state.iteration,
                    global_max_diff
                );
            }
        }

        let local_elapsed = start.elapsed().as_secs_f64();
        let elapsed_seconds = self.transport.all_reduce_max(local_elapsed)?;
        let converged = self.reducer.has_converged(&state);

        if self.plan.is_first() {
            if converged {
                log::info!("Converged after {} iterations", state.iteration);
            } else {
                log::info!(
                    "Stopped at the iteration cap ({}) without converging",
                    state.iteration
                );
            }
            log::info!("Execution time: {:.3} seconds", elapsed_seconds);
        }

        Ok(SolveReport {
            iterations: state.iteration,
            final_max_diff: state.global_max_diff,
            converged,
            history: state.history,
            elapsed_seconds,
        })
    }

    /// Hand the interior rows of the current field to `sink`.
    pub fn write_band<S: ResultSink + ?Sized>(&self, sink: &mut S) -> Result<(), SolveError> {
        sink.write_band(self.plan.rank(), self.band())?;
        Ok(())
    }
}
