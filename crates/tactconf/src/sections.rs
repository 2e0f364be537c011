//! Configuration sections.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filesystem locations for datasets and generated reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root holding one directory per dataset (`kp`, `kp-perf`, `tap`).
    /// Default: ../datasets
    pub datasets_dir: PathBuf,

    /// Where evolution reports and traces are written.
    /// Default: visualizations
    pub visualizations_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            datasets_dir: PathBuf::from("../datasets"),
            visualizations_dir: PathBuf::from("visualizations"),
        }
    }
}

/// Dataset scoring behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Harmonic correctness tolerance in BPM.
    pub tolerance: f64,

    /// Maximum examples scored per dataset. Unset scores everything.
    pub limit: Option<usize>,

    /// Drop failing examples and count them instead of failing the dataset.
    pub skip_failures: bool,

    /// Per-example tracker timeout in seconds. Unset waits forever.
    pub timeout_secs: Option<u64>,

    /// Examples tracked concurrently within a dataset.
    pub max_parallel: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            tolerance: 1.5,
            limit: None,
            skip_failures: false,
            timeout_secs: None,
            max_parallel: 1,
        }
    }
}

/// Parameters of the reference pairwise tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub min_period_ms: f64,
    pub max_period_ms: f64,
    /// Relative period difference under which two hypotheses are the same.
    pub similarity_epsilon: f64,
    /// Beat-matching window as a fraction of the period.
    pub match_tolerance: f64,
    /// Number of recent onsets scored for confidence.
    pub eval_window: usize,
    pub max_hypotheses: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_period_ms: 250.0,
            max_period_ms: 1500.0,
            similarity_epsilon: 0.05,
            match_tolerance: 0.12,
            eval_window: 8,
            max_hypotheses: 30,
        }
    }
}

/// Onset extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetsConfig {
    /// Onsets closer than this many milliseconds are merged.
    pub collapse_ms: f64,
}

impl Default for OnsetsConfig {
    fn default() -> Self {
        Self { collapse_ms: 0.0 }
    }
}

/// Logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Log filter directive (trace, debug, info, warn, error, or an
    /// `EnvFilter` expression).
    /// Default: info
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
