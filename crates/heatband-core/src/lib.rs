//! # Heatband Core
//!
//! Steady-state heat distribution on a rectangular plate, solved with a
//! Jacobi iteration that is decomposed into horizontal row bands. Each band
//! is owned by one worker; neighbouring workers trade ghost rows every
//! iteration and agree on convergence through a max all-reduce.
//!
//! ## Architecture
//!
//! A [`solver::Worker`] drives one band through
//! halo exchange, stencil sweep, reduction and buffer swap. Workers talk
//! only through a [`heatband_comm::Transport`], so the same loop runs on
//! threads ([`launch::solve_threads`]) or on MPI ranks.
//!
//! ## Modules
//!
//! - [`partition`] — Row-band layout and neighbour links.
//! - [`field`] — Double-buffered band storage.
//! - [`boundary`] — Fixed edge temperatures.
//! - [`halo`] — Two-phase ghost-row exchange.
//! - [`stencil`] — Four-point Jacobi sweep.
//! - [`convergence`] — Global max reduction and stop criteria.
//! - [`solver`] — The per-worker iteration loop.
//! - [`sink`] — CSV and in-memory persistence of finished bands.
//! - [`launch`] — In-process multi-threaded runs.
//! - [`reference`] — Sequential solver used as an oracle.

pub mod boundary;
pub mod convergence;
pub mod field;
pub mod halo;
pub mod launch;
pub mod partition;
pub mod reference;
pub mod sink;
pub mod solver;
pub mod stencil;

pub use partition::{BandPlan, Domain, PartitionError};
pub use solver::{SolveError, SolveReport, SolverConfig, Worker};
