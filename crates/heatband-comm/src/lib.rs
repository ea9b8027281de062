//! # Heatband Comm
//!
//! Message-passing transport for the heatband solver. This crate provides a
//! [`Transport`](backend::Transport) trait that isolates the solver from the
//! way workers are launched and connected.
//!
//! ## Available transports
//!
//! | Transport | Feature flag | Status |
//! |-----------|-------------|--------|
//! | Local threads (crossbeam channels) | `local` (default) | Implemented |
//! | MPI processes | `mpi` | Implemented |

pub mod backend;

#[cfg(feature = "local")]
pub mod local;

#[cfg(feature = "mpi")]
pub mod mpi_comm;

pub use backend::{Tag, Transport, TransportError, TransportInfo, TransportKind};

#[cfg(feature = "local")]
pub use local::LocalTransport;

#[cfg(feature = "mpi")]
pub use mpi_comm::MpiTransport;
