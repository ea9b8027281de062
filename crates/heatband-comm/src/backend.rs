//! Transport trait and error types.
//!
//! The [`Transport`] trait abstracts over the way workers talk to each other
//! (threads in one process, MPI ranks on a cluster) so that the solver in
//! `heatband-core` never sees process-group details.

use thiserror::Error;

/// Message tag used to match a send with its receive.
pub type Tag = i32;

/// Errors originating from a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Worker {peer} disconnected")]
    Disconnected { peer: usize },

    #[error("Expected tag {expected} from worker {peer}, received tag {found}")]
    TagMismatch {
        peer: usize,
        expected: Tag,
        found: Tag,
    },

    #[error("Expected {expected} values from worker {peer}, received {found}")]
    LengthMismatch {
        peer: usize,
        expected: usize,
        found: usize,
    },

    #[error("Worker {rank} is not a valid peer in a group of {size}")]
    InvalidRank { rank: usize, size: usize },
}

/// Describes a transport instance.
#[derive(Debug, Clone)]
pub struct TransportInfo {
    pub name: String,
    pub kind: TransportKind,
    pub rank: usize,
    pub size: usize,
}

/// The kind of transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Worker threads inside one process.
    Local,
    /// Separate MPI processes.
    Mpi,
}

/// Blocking point-to-point and collective communication for one worker.
///
/// Every worker of a group holds its own transport. Receives block until the
/// matching send has been delivered; the collective blocks until every
/// worker of the group has contributed.
pub trait Transport {
    /// Return information about this transport.
    fn info(&self) -> TransportInfo;

    /// Index of this worker in the group.
    fn rank(&self) -> usize;

    /// Number of workers in the group.
    fn size(&self) -> usize;

    /// Send `data` to worker `dest` under `tag`.
    fn send(&self, dest: usize, tag: Tag, data: &[f64]) -> Result<(), TransportError>;

    /// Receive exactly `buf.len()` values from worker `source` under `tag`.
    fn receive(&self, source: usize, tag: Tag, buf: &mut [f64]) -> Result<(), TransportError>;

    /// Combine `value` across the group with `max`; every worker gets the
    /// same result.
    fn all_reduce_max(&self, value: f64) -> Result<f64, TransportError>;

    /// Block until every worker has reached this point.
    fn barrier(&self) -> Result<(), TransportError> {
        self.all_reduce_max(0.0).map(|_| ())
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn info(&self) -> TransportInfo {
        (**self).info()
    }

    fn rank(&self) -> usize {
        (**self).rank()
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    fn send(&self, dest: usize, tag: Tag, data: &[f64]) -> Result<(), TransportError> {
        (**self).send(dest, tag, data)
    }

    fn receive(&self, source: usize, tag: Tag, buf: &mut [f64]) -> Result<(), TransportError> {
        (**self).receive(source, tag, buf)
    }

    fn all_reduce_max(&self, value: f64) -> Result<f64, TransportError> {
        (**self).all_reduce_max(value)
    }

    fn barrier(&self) -> Result<(), TransportError> {
        (**self).barrier()
    }
}
