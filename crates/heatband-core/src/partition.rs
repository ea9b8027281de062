//! Row-band partitioning of the global domain.
//!
//! The domain of `rows × cols` cells is split into `workers` contiguous row
//! bands of equal height. Worker 0 owns the topmost band. Each band is stored
//! with one ghost row above and one below, so a band of `local_rows` rows
//! occupies a `(local_rows + 2) × cols` buffer:
//!
//! ```text
//! buffer row 0              top ghost (from the up neighbour)
//! buffer rows 1..=local     interior
//! buffer row local + 1      bottom ghost (from the down neighbour)
//! ```

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors detected before any iteration runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    #[error("Worker count must be at least 1")]
    NoWorkers,

    #[error("Domain must have at least one row and one column (got {rows}x{cols})")]
    EmptyDomain { rows: usize, cols: usize },

    #[error("{rows} rows cannot be split evenly across {workers} workers")]
    UnevenRows { rows: usize, workers: usize },

    #[error("Worker index {rank} is out of range for {workers} workers")]
    RankOutOfRange { rank: usize, workers: usize },
}

/// Global domain dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub rows: usize,
    pub cols: usize,
}

impl Default for Domain {
    fn default() -> Self {
        Self {
            rows: 100,
            cols: 100,
        }
    }
}

/// The band owned by one worker, and its static neighbour links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandPlan {
    domain: Domain,
    workers: usize,
    rank: usize,
    local_rows: usize,
}

impl BandPlan {
    /// Plan the band of worker `rank` out of `workers`.
    pub fn new(domain: Domain, workers: usize, rank: usize) -> Result<Self, PartitionError> {
        validate(domain, workers)?;
        if rank >= workers {
            return Err(PartitionError::RankOutOfRange { rank, workers });
        }
        Ok(Self {
            domain,
            workers,
            rank,
            local_rows: domain.rows / workers,
        })
    }

    /// Plan every band of the partition, ordered by worker index.
    pub fn all(domain: Domain, workers: usize) -> Result<Vec<Self>, PartitionError> {
        (0..workers)
            .map(|rank| Self::new(domain, workers, rank))
            .collect()
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of interior rows in this band.
    pub fn local_rows(&self) -> usize {
        self.local_rows
    }

    pub fn cols(&self) -> usize {
        self.domain.cols
    }

    /// Shape of the band buffer including both ghost rows.
    pub fn buffer_shape(&self) -> (usize, usize) {
        (self.local_rows + 2, self.domain.cols)
    }

    /// Global row index of the band's first interior row.
    pub fn first_global_row(&self) -> usize {
        self.rank * self.local_rows
    }

    /// Buffer rows holding interior cells.
    pub fn interior_rows(&self) -> RangeInclusive<usize> {
        1..=self.local_rows
    }

    /// Whether this band holds the top edge of the domain.
    pub fn is_first(&self) -> bool {
        self.rank == 0
    }

    /// Whether this band holds the bottom edge of the domain.
    pub fn is_last(&self) -> bool {
        self.rank + 1 == self.workers
    }

    /// Worker owning the band directly above, if any.
    pub fn up(&self) -> Option<usize> {
        self.rank.checked_sub(1)
    }

    /// Worker owning the band directly below, if any.
    pub fn down(&self) -> Option<usize> {
        (!self.is_last()).then_some(self.rank + 1)
    }
}

/// Check that `domain` can be split into `workers` equal bands.
pub fn validate(domain: Domain, workers: usize) -> Result<(), PartitionError> {
    if workers == 0 {
        return Err(PartitionError::NoWorkers);
    }
    if domain.rows == 0 || domain.cols == 0 {
        return Err(PartitionError::EmptyDomain {
            rows: domain.rows,
            cols: domain.cols,
        });
    }
    if domain.rows % workers != 0 {
        return Err(PartitionError::UnevenRows {
            rows: domain.rows,
            workers,
        });
    }
    Ok(())
}
