//! End-to-end behaviour of the banded solver on in-process worker groups.

use std::thread;

use approx::assert_abs_diff_eq;
use heatband_comm::LocalTransport;
use heatband_core::convergence::{Criteria, IterationState};
use heatband_core::launch::solve_threads;
use heatband_core::reference::{max_abs_deviation, solve_sequential};
use heatband_core::{BandPlan, Domain, SolveError, SolverConfig, Worker};
use ndarray::{array, Array2};

fn quiet(criteria: Criteria) -> SolverConfig {
    SolverConfig {
        criteria,
        report_interval: 0,
        ..Default::default()
    }
}

/// Start one thread per band and hand each its worker.
fn with_workers<R, F>(domain: Domain, workers: usize, config: SolverConfig, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(&mut Worker<LocalTransport>) -> R + Sync,
{
    let plans = BandPlan::all(domain, workers).unwrap();
    let transports = LocalTransport::group(workers);
    let f = &f;
    thread::scope(|s| {
        let handles: Vec<_> = plans
            .into_iter()
            .zip(transports)
            .map(|(plan, transport)| {
                s.spawn(move || {
                    let mut worker = Worker::new(plan, transport, config).unwrap();
                    f(&mut worker)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

#[test]
fn test_forced_single_pass_on_4x4() {
    let config = quiet(Criteria {
        max_iterations: 1,
        threshold: 0.0,
    });
    let run = solve_threads(Domain { rows: 4, cols: 4 }, 2, &config).unwrap();

    assert_eq!(run.report.iterations, 1);
    assert!(!run.report.converged);
    assert_abs_diff_eq!(run.report.final_max_diff, 43.75, epsilon = 1e-12);

    let expected = array![
        [75.0, 100.0, 100.0, 25.0],
        [75.0, 43.75, 31.25, 25.0],
        [75.0, 18.75, 6.25, 25.0],
        [75.0, 0.0, 0.0, 25.0],
    ];
    let field = run.field(2).unwrap();
    for (got, want) in field.iter().zip(expected.iter()) {
        assert_abs_diff_eq!(*got, *want, epsilon = 1e-12);
    }
}

#[test]
fn test_single_worker_matches_sequential_oracle() {
    let domain = Domain { rows: 12, cols: 9 };
    let config = quiet(Criteria {
        max_iterations: 250,
        threshold: 0.001,
    });

    let run = solve_threads(domain, 1, &config).unwrap();
    let (oracle, oracle_report) = solve_sequential(domain, &config).unwrap();

    assert_eq!(run.report.iterations, oracle_report.iterations);
    assert_eq!(run.report.converged, oracle_report.converged);
    let deviation = max_abs_deviation(&run.field(1).unwrap(), &oracle).unwrap();
    assert!(deviation < 1e-12, "deviation {}", deviation);
}

#[test]
fn test_worker_count_invariance() {
    let domain = Domain { rows: 16, cols: 12 };
    let config = quiet(Criteria::default());

    let fields: Vec<Array2<f64>> = [1, 2, 4]
        .iter()
        .map(|&w| solve_threads(domain, w, &config).unwrap().field(w).unwrap())
        .collect();

    for other in &fields[1..] {
        let deviation = max_abs_deviation(&fields[0], other).unwrap();
        assert!(deviation < 1e-6, "deviation {}", deviation);
    }
}

#[test]
fn test_boundary_cells_never_change() {
    let domain = Domain { rows: 8, cols: 6 };
    let config = quiet(Criteria {
        max_iterations: 20,
        threshold: 0.0,
    });

    let violations = with_workers(domain, 2, config, |worker| {
        let plan = *worker.plan();
        let initial = worker.band().to_owned();
        let mut state = IterationState::new();
        let mut violations = 0;
        for _ in 0..20 {
            worker.step(&mut state).unwrap();
            let band = worker.band();
            let last_row = plan.local_rows() - 1;
            let last_col = plan.cols() - 1;
            for ((i, j), &v) in band.indexed_iter() {
                let on_edge = j == 0
                    || j == last_col
                    || (plan.is_first() && i == 0)
                    || (plan.is_last() && i == last_row);
                if on_edge && v != initial[[i, j]] {
                    violations += 1;
                }
            }
        }
        violations
    });

    assert_eq!(violations, vec![0, 0]);
}

#[test]
fn test_max_diff_is_non_increasing() {
    let config = quiet(Criteria::default());
    let run = solve_threads(Domain { rows: 10, cols: 10 }, 2, &config).unwrap();
    let history = &run.report.history;

    assert!(run.report.converged);
    assert!(history.len() > 3);
    for pair in history[2..].windows(2) {
        assert!(pair[1] <= pair[0] + 1e-12, "{} then {}", pair[0], pair[1]);
    }
}

#[test]
fn test_ghost_rows_match_neighbour_interior() {
    let domain = Domain { rows: 8, cols: 5 };
    let config = quiet(Criteria::default());

    let snapshots = with_workers(domain, 2, config, |worker| {
        let mut state = IterationState::new();
        for _ in 0..3 {
            worker.step(&mut state).unwrap();
        }
        worker.exchange_halo().unwrap();
        worker.field().current().clone()
    });

    let local_rows = 4;
    // Bottom ghost of worker 0 == first interior row of worker 1.
    assert_eq!(snapshots[0].row(local_rows + 1), snapshots[1].row(1));
    // Top ghost of worker 1 == last interior row of worker 0.
    assert_eq!(snapshots[1].row(0), snapshots[0].row(local_rows));
    // The rows are not trivially equal to the initial state.
    assert!(snapshots[1].row(1).iter().skip(1).take(3).any(|&v| v != 0.0));
}

#[test]
fn test_extra_iteration_after_convergence_is_small() {
    let domain = Domain { rows: 12, cols: 10 };
    let config = quiet(Criteria::default());

    let changes = with_workers(domain, 3, config, |worker| {
        let report = worker.run().unwrap();
        assert!(report.converged);
        let before = worker.band().to_owned();

        let mut state = IterationState::new();
        worker.step(&mut state).unwrap();
        max_abs_deviation(&before, &worker.band().to_owned()).unwrap()
    });

    for change in changes {
        assert!(change <= 0.001, "change {}", change);
    }
}

#[test]
fn test_parallel_stencil_matches_sequential_run() {
    let domain = Domain { rows: 12, cols: 16 };
    let sequential = quiet(Criteria::default());
    let parallel = SolverConfig {
        parallel_stencil: true,
        ..sequential
    };

    let a = solve_threads(domain, 2, &sequential).unwrap();
    let b = solve_threads(domain, 2, &parallel).unwrap();
    assert_eq!(a.report.iterations, b.report.iterations);
    assert_eq!(a.field(2).unwrap(), b.field(2).unwrap());
}

#[test]
fn test_zero_iteration_cap_keeps_initial_field() {
    let config = quiet(Criteria {
        max_iterations: 0,
        threshold: 0.001,
    });
    let run = solve_threads(Domain { rows: 4, cols: 3 }, 2, &config).unwrap();
    assert_eq!(run.report.iterations, 0);
    assert!(!run.report.converged);
    assert_eq!(
        run.field(2).unwrap(),
        array![
            [75.0, 100.0, 25.0],
            [75.0, 0.0, 25.0],
            [75.0, 0.0, 25.0],
            [75.0, 0.0, 25.0],
        ]
    );
}

#[test]
fn test_transport_group_must_match_plan() {
    let plan = BandPlan::new(Domain { rows: 4, cols: 4 }, 2, 1).unwrap();
    let transport = LocalTransport::group(2).remove(0);
    let err = Worker::new(plan, transport, SolverConfig::default())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        SolveError::GroupMismatch { rank: 0, plan_rank: 1, .. }
    ));
}
