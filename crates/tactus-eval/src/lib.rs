//! Evaluation of tactus (beat-level tempo) hypothesis trackers.
//!
//! A [`Tracker`] turns onset times into competing hypotheses with
//! per-onset confidences. This crate judges those hypotheses: whether a
//! tempo is harmonically compatible with ground truth, how the leading
//! hypothesis evolves over a piece, and how often the majority leader
//! beats a baseline system across whole datasets.

pub mod comparator;
pub mod dataset;
pub mod evolution;
pub mod melisma;
pub mod overtime;
pub mod scorer;
pub mod summary;
pub mod tracker;
pub mod types;

pub use comparator::{harmonic_distance, is_correct, DEFAULT_TOLERANCE};
pub use dataset::{load_datasets, standard_datasets, DatasetSource, ExpectedTempo, MidiDirectory};
pub use evolution::{
    detect_changes, evolution_report, format_confidence_table, format_evolution_report,
    report_path, EvolutionTrace,
};
pub use overtime::OvertimeIndex;
pub use scorer::{majority_vote, FailurePolicy, Scorer, ScorerConfig};
pub use summary::{render_latex, render_table};
pub use tracker::{PairwiseTracker, Tracker, TrackerError, TrackerParams};
pub use types::{
    ChangeEvent, DatasetExample, ExampleScore, Hypothesis, HypothesisId, HypothesisSet,
    RankingAtTime, ScoreSummary, System,
};

use std::path::PathBuf;
use std::time::Duration;

/// Errors from evaluation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("tempo must be finite and positive, got {value}")]
    Domain { value: f64 },

    #[error("tracker failed on {example}: {source}")]
    TrackerFailure {
        example: String,
        #[source]
        source: TrackerError,
    },

    #[error("tracker timed out on {example} after {after:?}")]
    TrackerTimeout { example: String, after: Duration },

    #[error("{example} has an invalid {what}: {value}")]
    InvalidTempo {
        example: String,
        what: &'static str,
        value: f64,
    },

    #[error("{example} has no {what}")]
    MissingReference { example: String, what: &'static str },

    #[error("no rankings to detect changes in")]
    EmptyRanking,

    #[error("dataset {dataset} has no scored examples")]
    EmptyDataset { dataset: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read MIDI {path}: {source}")]
    Midi {
        path: PathBuf,
        source: midi_onsets::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
