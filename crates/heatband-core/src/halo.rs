//! Ghost-row exchange between vertically adjacent bands.
//!
//! The exchange runs in two phases so that blocking sends and receives can
//! never wait on each other in a cycle:
//!
//! 1. **Downward**: every band except the last sends its last interior row
//!    down; every band except the first receives its top ghost row from above.
//! 2. **Upward**: every band except the first sends its first interior row
//!    up; every band except the last receives its bottom ghost row from below.
//!
//! Bands on the top or bottom edge of the domain skip the missing neighbour.
//! Their outer ghost row is never read, because the edge row next to it is
//! fixed rather than computed.

use std::fmt;

use heatband_comm::{Tag, Transport, TransportError};
use ndarray::{Array2, ArrayView1};
use thiserror::Error;

use crate::partition::BandPlan;

pub const DOWNWARD_TAG: Tag = 0;
pub const UPWARD_TAG: Tag = 1;

/// Direction of one exchange phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Downward,
    Upward,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Downward => write!(f, "downward"),
            Phase::Upward => write!(f, "upward"),
        }
    }
}

/// A failed halo exchange. Always fatal for the whole computation.
#[derive(Debug, Error)]
pub enum HaloError {
    #[error("{phase} halo send to worker {peer} failed: {source}")]
    Send {
        phase: Phase,
        peer: usize,
        #[source]
        source: TransportError,
    },

    #[error("{phase} halo receive from worker {peer} failed: {source}")]
    Receive {
        phase: Phase,
        peer: usize,
        #[source]
        source: TransportError,
    },
}

/// Exchanges ghost rows for one band.
#[derive(Debug, Clone)]
pub struct HaloExchanger {
    up: Option<usize>,
    down: Option<usize>,
    local_rows: usize,
    /// One row of staging space, reused every iteration.
    scratch: Vec<f64>,
}

impl HaloExchanger {
    pub fn new(plan: &BandPlan) -> Self {
        Self {
            up: plan.up(),
            down: plan.down(),
            local_rows: plan.local_rows(),
            scratch: vec![0.0; plan.cols()],
        }
    }

    /// Refresh both ghost rows of `field` from the neighbouring bands.
    pub fn exchange<T: Transport + ?Sized>(
        &mut self,
        transport: &T,
        field: &mut Array2<f64>,
    ) -> Result<(), HaloError> {
        let last = self.local_rows;
        let bottom_ghost = self.local_rows + 1;

        if let Some(down) = self.down {
            self.send_row(transport, field, last, down, Phase::Downward)?;
        }
        if let Some(up) = self.up {
            self.receive_row(transport, field, 0, up, Phase::Downward)?;
        }

        if let Some(up) = self.up {
            self.send_row(transport, field, 1, up, Phase::Upward)?;
        }
        if let Some(down) = self.down {
            self.receive_row(transport, field, bottom_ghost, down, Phase::Upward)?;
        }

        Ok(())
    }

    fn send_row<T: Transport + ?Sized>(
        &mut self,
        transport: &T,
        field: &Array2<f64>,
        row: usize,
        peer: usize,
        phase: Phase,
    ) -> Result<(), HaloError> {
        for (dst, src) in self.scratch.iter_mut().zip(field.row(row)) {
            *dst = *src;
        }
        transport
            .send(peer, tag(phase), &self.scratch)
            .map_err(|source| HaloError::Send {
                phase,
                peer,
                source,
            })
    }

    fn receive_row<T: Transport + ?Sized>(
        &mut self,
        transport: &T,
        field: &mut Array2<f64>,
        row: usize,
        peer: usize,
        phase: Phase,
    ) -> Result<(), HaloError> {
        transport
            .receive(peer, tag(phase), &mut self.scratch)
            .map_err(|source| HaloError::Receive {
                phase,
                peer,
                source,
            })?;
        field
            .row_mut(row)
            .assign(&ArrayView1::from(self.scratch.as_slice()));
        Ok(())
    }
}

fn tag(phase: Phase) -> Tag {
    match phase {
        Phase::Downward => DOWNWARD_TAG,
        Phase::Upward => UPWARD_TAG,
    }
}
