//! Sequential Jacobi solve of the undivided domain.
//!
//! Shares no code with the banded path beyond the boundary constants, so it
//! serves as an independent oracle for the distributed solver.

use ndarray::Array2;

use crate::boundary::stamp_domain;
use crate::partition::{self, Domain, PartitionError};
use crate::solver::{SolveReport, SolverConfig};

/// Solve the whole domain in one thread with the criteria of `config`.
///
/// `parallel_stencil` and `report_interval` are ignored.
pub fn solve_sequential(
    domain: Domain,
    config: &SolverConfig,
) -> Result<(Array2<f64>, SolveReport), PartitionError> {
    partition::validate(domain, 1)?;
    let start = std::time::Instant::now();
    let Domain { rows, cols } = domain;

    let mut current = Array2::zeros((rows, cols));
    stamp_domain(&mut current, &config.boundary);
    let mut next = current.clone();

    let criteria = config.criteria;
    let mut history = Vec::new();
    let mut max_diff = f64::INFINITY;

    while history.len() < criteria.max_iterations && max_diff > criteria.threshold {
        max_diff = 0.0;
        for i in 1..rows.saturating_sub(1) {
            for j in 1..cols.saturating_sub(1) {
                let value = 0.25
                    * (current[[i - 1, j]]
                        + current[[i + 1, j]]
                        + current[[i, j - 1]]
                        + current[[i, j + 1]]);
                max_diff = f64::max(max_diff, (value - current[[i, j]]).abs());
                next[[i, j]] = value;
            }
        }
        std::mem::swap(&mut current, &mut next);
        history.push(max_diff);
    }

    let report = SolveReport {
        iterations: history.len(),
        final_max_diff: max_diff,
        converged: max_diff <= criteria.threshold,
        history,
        elapsed_seconds: start.elapsed().as_secs_f64(),
    };
    Ok((current, report))
}

/// Largest absolute element-wise difference between two fields of equal shape.
pub fn max_abs_deviation(a: &Array2<f64>, b: &Array2<f64>) -> Option<f64> {
    if a.dim() != b.dim() {
        return None;
    }
    Some(
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0, f64::max),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_boundaries_untouched() {
        let (field, report) = solve_sequential(Domain { rows: 6, cols: 5 }, &SolverConfig::default())
            .unwrap();
        assert!(report.iterations > 0);
        assert_eq!(field.row(0).to_vec(), vec![75.0, 100.0, 100.0, 100.0, 25.0]);
        assert_eq!(field.row(5).to_vec(), vec![75.0, 0.0, 0.0, 0.0, 25.0]);
    }

    #[test]
    fn test_symmetric_sides_give_mean_temperature() {
        // With equal edges the steady state is uniform.
        let mut config = SolverConfig::default();
        config.boundary.hot = 40.0;
        config.boundary.cold = 40.0;
        config.boundary.warm = 40.0;
        config.boundary.cool = 40.0;
        config.criteria.threshold = 1e-9;
        config.criteria.max_iterations = 10_000;

        let (field, report) = solve_sequential(Domain { rows: 8, cols: 8 }, &config).unwrap();
        assert!(report.converged);
        for &v in field.iter() {
            assert_abs_diff_eq!(v, 40.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_max_abs_deviation() {
        let a = Array2::from_elem((2, 2), 1.0);
        let mut b = a.clone();
        b[[1, 0]] = 1.5;
        assert_eq!(max_abs_deviation(&a, &b), Some(0.5));
        assert_eq!(max_abs_deviation(&a, &Array2::zeros((3, 2))), None);
    }
}
