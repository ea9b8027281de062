//! MPI transport for multi-process runs.
//!
//! Requires the `mpi` feature and an MPI installation. The caller owns the
//! MPI universe and hands the world communicator in:
//!
//! ```ignore
//! let universe = mpi::initialize().expect("MPI init failed");
//! let transport = MpiTransport::new(universe.world());
//! ```

use mpi::collective::SystemOperation;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use crate::backend::{Tag, Transport, TransportError, TransportInfo, TransportKind};

/// Transport backed by an MPI communicator.
pub struct MpiTransport {
    world: SimpleCommunicator,
}

impl MpiTransport {
    pub fn new(world: SimpleCommunicator) -> Self {
        log::debug!("MPI rank {} of {} ready", world.rank(), world.size());
        Self { world }
    }

    fn check_peer(&self, peer: usize) -> Result<i32, TransportError> {
        let size = self.size();
        if peer >= size || peer == self.rank() {
            return Err(TransportError::InvalidRank { rank: peer, size });
        }
        Ok(peer as i32)
    }
}

impl Transport for MpiTransport {
    fn info(&self) -> TransportInfo {
        TransportInfo {
            name: format!("MPI ({} ranks)", self.size()),
            kind: TransportKind::Mpi,
            rank: self.rank(),
            size: self.size(),
        }
    }

    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn send(&self, dest: usize, tag: Tag, data: &[f64]) -> Result<(), TransportError> {
        let dest = self.check_peer(dest)?;
        self.world.process_at_rank(dest).send_with_tag(data, tag);
        Ok(())
    }

    fn receive(&self, source: usize, tag: Tag, buf: &mut [f64]) -> Result<(), TransportError> {
        let peer = self.check_peer(source)?;
        let status = self
            .world
            .process_at_rank(peer)
            .receive_into_with_tag(buf, tag);
        let count = status.count(f64::equivalent_datatype()) as usize;
        if count != buf.len() {
            return Err(TransportError::LengthMismatch {
                peer: source,
                expected: buf.len(),
                found: count,
            });
        }
        Ok(())
    }

    fn all_reduce_max(&self, value: f64) -> Result<f64, TransportError> {
        let mut global = 0.0_f64;
        self.world
            .all_reduce_into(&value, &mut global, SystemOperation::max());
        Ok(global)
    }

    fn barrier(&self) -> Result<(), TransportError> {
        self.world.barrier();
        Ok(())
    }
}
