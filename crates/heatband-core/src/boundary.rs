//! Fixed-temperature boundary conditions.
//!
//! The top edge of the domain is hot, the bottom edge cold, the left edge
//! warm and the right edge cool. Only the first band carries the top edge and
//! only the last band the bottom edge; every band carries a slice of the
//! left and right edges.

use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};

use crate::field::FieldBuffer;
use crate::partition::BandPlan;

pub const HOT: f64 = 100.0;
pub const COLD: f64 = 0.0;
pub const WARM: f64 = 75.0;
pub const COOL: f64 = 25.0;

/// Temperatures held fixed on the four edges of the domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryValues {
    /// Top edge.
    pub hot: f64,
    /// Bottom edge.
    pub cold: f64,
    /// Left edge.
    pub warm: f64,
    /// Right edge.
    pub cool: f64,
}

impl Default for BoundaryValues {
    fn default() -> Self {
        Self {
            hot: HOT,
            cold: COLD,
            warm: WARM,
            cool: COOL,
        }
    }
}

/// Stamps the boundary conditions of one band into its buffers.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryInitializer {
    plan: BandPlan,
    values: BoundaryValues,
}

impl BoundaryInitializer {
    pub fn new(plan: BandPlan, values: BoundaryValues) -> Self {
        Self { plan, values }
    }

    /// Initialise both buffers so either role starts boundary-consistent.
    pub fn apply(&self, field: &mut FieldBuffer) {
        for buffer in field.both_mut() {
            self.stamp(buffer);
        }
    }

    /// Zero `buffer` and write the edge values this band owns.
    ///
    /// Column stamps come after row stamps, so corner cells take the left
    /// and right edge values.
    pub fn stamp(&self, buffer: &mut Array2<f64>) {
        let local_rows = self.plan.local_rows();
        buffer.fill(0.0);

        if self.plan.is_first() {
            buffer.row_mut(1).fill(self.values.hot);
        }
        if self.plan.is_last() {
            buffer.row_mut(local_rows).fill(self.values.cold);
        }

        let last_col = self.plan.cols() - 1;
        buffer
            .slice_mut(s![1..=local_rows, 0])
            .fill(self.values.warm);
        buffer
            .slice_mut(s![1..=local_rows, last_col])
            .fill(self.values.cool);
    }
}

/// Stamp the boundary conditions of the whole undivided domain.
pub fn stamp_domain(field: &mut Array2<f64>, values: &BoundaryValues) {
    let (rows, cols) = field.dim();
    field.fill(0.0);
    if rows == 0 || cols == 0 {
        return;
    }
    field.row_mut(0).fill(values.hot);
    field.row_mut(rows - 1).fill(values.cold);
    field.column_mut(0).fill(values.warm);
    field.column_mut(cols - 1).fill(values.cool);
}
