//! Double-buffered band storage.

use ndarray::{s, Array2, ArrayView2};

/// A pair of equally shaped arrays playing the "current" and "next" roles.
///
/// Roles are tracked by an index into a two-element array, so [`swap`]
/// moves no data. Outside an in-progress iteration "current" holds the
/// consistent state of the latest iteration and "next" holds stale values
/// that the stencil overwrites before they are read.
///
/// [`swap`]: FieldBuffer::swap
#[derive(Debug, Clone)]
pub struct FieldBuffer {
    buffers: [Array2<f64>; 2],
    current: usize,
}

impl FieldBuffer {
    /// Allocate a zero-initialised pair of `rows × cols` arrays.
    pub fn allocate(rows: usize, cols: usize) -> Self {
        Self {
            buffers: [Array2::zeros((rows, cols)), Array2::zeros((rows, cols))],
            current: 0,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.buffers[0].dim()
    }

    pub fn current(&self) -> &Array2<f64> {
        &self.buffers[self.current]
    }

    pub fn current_mut(&mut self) -> &mut Array2<f64> {
        &mut self.buffers[self.current]
    }

    pub fn next(&self) -> &Array2<f64> {
        &self.buffers[1 - self.current]
    }

    /// Borrow "current" for reading and "next" for writing at the same time.
    pub fn split(&mut self) -> (&Array2<f64>, &mut Array2<f64>) {
        let [a, b] = &mut self.buffers;
        if self.current == 0 {
            (&*a, b)
        } else {
            (&*b, a)
        }
    }

    /// Both arrays, for stamping state that must hold in either role.
    pub fn both_mut(&mut self) -> [&mut Array2<f64>; 2] {
        let [a, b] = &mut self.buffers;
        [a, b]
    }

    /// Exchange the "current" and "next" roles.
    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }

    /// The interior rows of "current", ghost rows excluded.
    pub fn interior(&self) -> ArrayView2<'_, f64> {
        let rows = self.shape().0;
        if rows < 2 {
            return self.current().slice(s![0..0, ..]);
        }
        self.current().slice(s![1..rows - 1, ..])
    }
}
