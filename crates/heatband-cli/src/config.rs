//! TOML configuration deserialisation for solver jobs.
//!
//! Every section and key is optional:
//!
//! ```toml
//! [domain]
//! rows = 200
//! cols = 200
//! workers = 4
//!
//! [solver]
//! max_iterations = 5000
//! convergence_threshold = 1e-4
//!
//! [boundary]
//! hot = 120.0
//!
//! [output]
//! directory = "./results"
//! save_field = true
//! ```

use anyhow::Context;
use serde::Deserialize;

use heatband_core::boundary::BoundaryValues;
use heatband_core::convergence::{Criteria, CONVERGENCE_THRESHOLD, MAX_ITERATIONS};
use heatband_core::{Domain, SolverConfig};

/// Top-level job configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub domain: DomainConfig,
    pub solver: SolverSection,
    pub boundary: BoundaryValues,
    pub output: OutputConfig,
}

/// Domain size and partitioning.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    pub rows: usize,
    pub cols: usize,
    /// Worker count for local runs. Default: the largest divisor of `rows`
    /// not exceeding the available parallelism.
    pub workers: Option<usize>,
}

impl Default for DomainConfig {
    fn default() -> Self {
        let domain = Domain::default();
        Self {
            rows: domain.rows,
            cols: domain.cols,
            workers: None,
        }
    }
}

/// Iteration parameters.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SolverSection {
    pub max_iterations: usize,
    pub convergence_threshold: f64,
    pub parallel_stencil: bool,
    pub report_interval: usize,
}

impl Default for SolverSection {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            convergence_threshold: CONVERGENCE_THRESHOLD,
            parallel_stencil: false,
            report_interval: 100,
        }
    }
}

/// Output configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    pub directory: String,
    /// Write one CSV per worker band (default: true).
    pub save_bands: bool,
    /// Also write the assembled field as one CSV (default: false, local runs only).
    pub save_field: bool,
    /// Write a JSON run summary (default: false).
    pub save_summary: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "./output".into(),
            save_bands: true,
            save_field: false,
            save_summary: false,
        }
    }
}

impl JobConfig {
    pub fn domain(&self) -> Domain {
        Domain {
            rows: self.domain.rows,
            cols: self.domain.cols,
        }
    }

    pub fn solver_config(&self) -> SolverConfig {
        SolverConfig {
            criteria: Criteria {
                max_iterations: self.solver.max_iterations,
                threshold: self.solver.convergence_threshold,
            },
            boundary: self.boundary,
            parallel_stencil: self.solver.parallel_stencil,
            report_interval: self.solver.report_interval,
        }
    }

    /// Worker count for a local run.
    pub fn workers(&self) -> usize {
        self.domain
            .workers
            .unwrap_or_else(|| default_workers(self.domain.rows))
    }
}

/// Largest divisor of `rows` that does not exceed the available parallelism.
pub fn default_workers(rows: usize) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (1..=cores.min(rows.max(1)))
        .rev()
        .find(|w| rows % w == 0)
        .unwrap_or(1)
}

/// Parse a TOML job configuration.
pub fn parse_config(content: &str) -> anyhow::Result<JobConfig> {
    let config: JobConfig = toml::from_str(content)?;
    Ok(config)
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read configuration {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid configuration {}", path.display()))
}
