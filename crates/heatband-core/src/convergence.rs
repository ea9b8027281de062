//! Global convergence check.
//!
//! Every worker contributes the largest change it saw in its band; the max
//! all-reduce gives all workers the same global value, so they all take the
//! same continue/stop decision in the same iteration.

use heatband_comm::{Transport, TransportError};
use serde::{Deserialize, Serialize};

pub const MAX_ITERATIONS: usize = 1000;
pub const CONVERGENCE_THRESHOLD: f64 = 0.001;

/// When to stop iterating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    /// Hard cap on the number of iterations.
    pub max_iterations: usize,
    /// Stop once the global max change is at or below this value.
    pub threshold: f64,
}

impl Default for Criteria {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            threshold: CONVERGENCE_THRESHOLD,
        }
    }
}

/// Loop state shared by the iteration driver and the reducer.
#[derive(Debug, Clone)]
pub struct IterationState {
    /// Completed iterations.
    pub iteration: usize,
    /// Last global max change; infinite before the first iteration.
    pub global_max_diff: f64,
    /// Global max change of every completed iteration, in order.
    pub history: Vec<f64>,
}

impl IterationState {
    pub fn new() -> Self {
        Self {
            iteration: 0,
            global_max_diff: f64::INFINITY,
            history: Vec::new(),
        }
    }

    /// Record the result of a completed iteration.
    pub fn advance(&mut self, global_max_diff: f64) {
        self.iteration += 1;
        self.global_max_diff = global_max_diff;
        self.history.push(global_max_diff);
    }
}

impl Default for IterationState {
    fn default() -> Self {
        Self::new()
    }
}

/// Combines local changes and decides whether to continue.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvergenceReducer {
    criteria: Criteria,
}

impl ConvergenceReducer {
    pub fn new(criteria: Criteria) -> Self {
        Self { criteria }
    }

    pub fn criteria(&self) -> Criteria {
        self.criteria
    }

    /// All-reduce `local_max_diff` with `max` across the group.
    pub fn reduce<T: Transport + ?Sized>(
        &self,
        transport: &T,
        local_max_diff: f64,
    ) -> Result<f64, TransportError> {
        transport.all_reduce_max(local_max_diff)
    }

    /// Whether another iteration should run. The iteration cap is checked
    /// before the threshold.
    pub fn should_continue(&self, state: &IterationState) -> bool {
        if state.iteration >= self.criteria.max_iterations {
            return false;
        }
        !self.has_converged(state)
    }

    /// Whether the last global change is at or below the threshold.
    pub fn has_converged(&self, state: &IterationState) -> bool {
        state.global_max_diff <= self.criteria.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_iteration_always_runs() {
        let reducer = ConvergenceReducer::new(Criteria {
            max_iterations: 10,
            threshold: 1e9,
        });
        assert!(reducer.should_continue(&IterationState::new()));
    }

    #[test]
    fn test_zero_cap_runs_nothing() {
        let reducer = ConvergenceReducer::new(Criteria {
            max_iterations: 0,
            threshold: 0.0,
        });
        assert!(!reducer.should_continue(&IterationState::new()));
    }

    #[test]
    fn test_cap_stops_non_converged_run() {
        let reducer = ConvergenceReducer::new(Criteria {
            max_iterations: 2,
            threshold: 0.001,
        });
        let mut state = IterationState::new();
        state.advance(5.0);
        assert!(reducer.should_continue(&state));
        state.advance(4.0);
        assert!(!reducer.should_continue(&state));
        assert!(!reducer.has_converged(&state));
        assert_eq!(state.history, vec![5.0, 4.0]);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let reducer = ConvergenceReducer::new(Criteria {
            max_iterations: 100,
            threshold: 0.5,
        });
        let mut state = IterationState::new();
        state.advance(0.5);
        assert!(reducer.has_converged(&state));
        assert!(!reducer.should_continue(&state));
    }
}
