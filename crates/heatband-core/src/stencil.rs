//! Four-point Jacobi relaxation over one band.
//!
//! Every cell that is not on an edge of the global domain becomes the mean
//! of its four neighbours in the current field:
//!
//! $$ u'_{i,j} = \tfrac14 (u_{i-1,j} + u_{i+1,j} + u_{i,j-1} + u_{i,j+1}) $$
//!
//! The first and last interior rows of a band read their vertical neighbours
//! from the ghost rows, so the halo exchange must have run for the current
//! iteration. Edge cells are copied unchanged into the next field.

use std::ops::Range;

use ndarray::parallel::prelude::*;
use ndarray::{s, Array2, ArrayViewMut1, Axis};

use crate::partition::BandPlan;

/// Computes one Jacobi sweep of a band.
#[derive(Debug, Clone)]
pub struct StencilUpdater {
    plan: BandPlan,
    parallel: bool,
}

impl StencilUpdater {
    pub fn new(plan: BandPlan) -> Self {
        Self {
            plan,
            parallel: false,
        }
    }

    /// Sweep rows on the Rayon thread pool. Results are identical to the
    /// sequential sweep.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Buffer rows whose cells are recomputed.
    pub fn updated_rows(&self) -> Range<usize> {
        let local_rows = self.plan.local_rows();
        let start = if self.plan.is_first() { 2 } else { 1 };
        let end = if self.plan.is_last() {
            local_rows
        } else {
            local_rows + 1
        };
        start..end.max(start)
    }

    /// Write the next iteration of the band into `next` and return the
    /// largest absolute change of any recomputed cell (0.0 if none).
    pub fn update(&self, current: &Array2<f64>, next: &mut Array2<f64>) -> f64 {
        self.preserve_edges(current, next);

        let rows = self.updated_rows();
        if rows.is_empty() || self.plan.cols() < 3 {
            return 0.0;
        }

        if self.parallel && rayon::current_num_threads() > 1 {
            let first = rows.start;
            let mut band = next.slice_mut(s![rows.start..rows.end, ..]);
            band.axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .map(|(offset, row)| relax_row(current, first + offset, row))
                .reduce(|| 0.0, f64::max)
        } else {
            rows.map(|i| relax_row(current, i, next.row_mut(i)))
                .fold(0.0, f64::max)
        }
    }

    /// Copy the fixed edge cells owned by this band from `current` to `next`.
    fn preserve_edges(&self, current: &Array2<f64>, next: &mut Array2<f64>) {
        let local_rows = self.plan.local_rows();
        if self.plan.is_first() {
            next.row_mut(1).assign(&current.row(1));
        }
        if self.plan.is_last() {
            next.row_mut(local_rows).assign(&current.row(local_rows));
        }
        for col in [0, self.plan.cols() - 1] {
            next.slice_mut(s![1..=local_rows, col])
                .assign(&current.slice(s![1..=local_rows, col]));
        }
    }
}

/// Relax the inner columns of buffer row `i` into `out`.
fn relax_row(current: &Array2<f64>, i: usize, mut out: ArrayViewMut1<'_, f64>) -> f64 {
    let cols = current.ncols();
    let mut max_diff = 0.0_f64;
    for j in 1..cols - 1 {
        let value = 0.25
            * (current[[i - 1, j]] + current[[i + 1, j]] + current[[i, j - 1]] + current[[i, j + 1]]);
        max_diff = max_diff.max((value - current[[i, j]]).abs());
        out[j] = value;
    }
    max_diff
}
