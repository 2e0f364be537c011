//! The tracker boundary and a reference pairwise tactus tracker.

use tactconf::TrackerConfig;

use crate::types::{Hypothesis, HypothesisId, HypothesisSet};

/// Errors raised by a tracker while processing one onset sequence.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackerError {
    #[error("onset {index} is not a valid timestamp: {value}")]
    InvalidOnset { index: usize, value: f64 },

    #[error("onset {index} precedes the onset before it")]
    Unordered { index: usize },

    #[error("tracker produced no hypotheses for {onsets} onsets")]
    NoHypotheses { onsets: usize },

    #[error("tracker panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

/// Incremental tempo hypothesis tracking over a full onset sequence.
///
/// Implementations must be deterministic for a given input and must not
/// keep state between calls; the scorer runs them from worker threads.
pub trait Tracker: Send + Sync {
    fn track(&self, onsets: &[f64]) -> Result<HypothesisSet, TrackerError>;
}

/// Parameters for [`PairwiseTracker`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerParams {
    pub min_period_ms: f64,
    pub max_period_ms: f64,
    pub similarity_epsilon: f64,
    pub match_tolerance: f64,
    pub eval_window: usize,
    pub max_hypotheses: usize,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self::from(&TrackerConfig::default())
    }
}

impl From<&TrackerConfig> for TrackerParams {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            min_period_ms: config.min_period_ms,
            max_period_ms: config.max_period_ms,
            similarity_epsilon: config.similarity_epsilon,
            match_tolerance: config.match_tolerance,
            eval_window: config.eval_window.max(1),
            max_hypotheses: config.max_hypotheses.max(1),
        }
    }
}

/// Offline tactus tracker in the spirit of pairwise hypothesis trackers.
///
/// Each pair of onsets whose distance is a plausible beat period proposes a
/// beat grid. At every onset, live grids are scored on how well they explain
/// the recent onsets, realigned to the onset when it lands on a beat, and the
/// weakest beyond `max_hypotheses` are retired. Retired hypotheses keep their
/// history but stop receiving samples.
#[derive(Debug, Clone, Default)]
pub struct PairwiseTracker {
    params: TrackerParams,
}

impl PairwiseTracker {
    pub fn new(params: TrackerParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TrackerParams {
        &self.params
    }

    fn tolerance_ms(&self, hypothesis: &Hypothesis) -> f64 {
        self.params.match_tolerance * hypothesis.period_ms()
    }

    /// An alive hypothesis already describes the grid `(phase, period)`.
    fn is_known(&self, hypothesis: &Hypothesis, phase_ms: f64, period_ms: f64) -> bool {
        let relative = (hypothesis.period_ms() - period_ms).abs() / period_ms;
        relative < self.params.similarity_epsilon
            && hypothesis.beat_distance(phase_ms) <= self.tolerance_ms(hypothesis)
    }

    /// How well the grid explains `window`: the mean closeness of onsets to
    /// beats, scaled by the share of beats in the window that have an onset.
    fn confidence(&self, hypothesis: &Hypothesis, window: &[f64]) -> f64 {
        let (Some(&first), Some(&last)) = (window.first(), window.last()) else {
            return 0.0;
        };
        let tolerance = self.tolerance_ms(hypothesis);
        if tolerance <= 0.0 {
            return 0.0;
        }

        let closeness = window
            .iter()
            .map(|&t| (1.0 - hypothesis.beat_distance(t) / tolerance).max(0.0))
            .sum::<f64>()
            / window.len() as f64;

        let period = hypothesis.period_ms();
        let phase = hypothesis.phase_ms();
        let first_beat = ((first - tolerance - phase) / period).ceil() as i64;
        let last_beat = ((last + tolerance - phase) / period).floor() as i64;
        if last_beat < first_beat {
            return 0.0;
        }
        let covered = (first_beat..=last_beat)
            .filter(|&n| {
                let beat = phase + n as f64 * period;
                window.iter().any(|&t| (t - beat).abs() <= tolerance)
            })
            .count();
        let coverage = covered as f64 / (last_beat - first_beat + 1) as f64;

        closeness * coverage
    }
}

fn validate(onsets: &[f64]) -> Result<(), TrackerError> {
    for (index, &value) in onsets.iter().enumerate() {
        if !value.is_finite() || value < 0.0 {
            return Err(TrackerError::InvalidOnset { index, value });
        }
        if index > 0 && value < onsets[index - 1] {
            return Err(TrackerError::Unordered { index });
        }
    }
    Ok(())
}

impl Tracker for PairwiseTracker {
    fn track(&self, onsets: &[f64]) -> Result<HypothesisSet, TrackerError> {
        validate(onsets)?;

        let mut set = HypothesisSet::new();
        let mut alive: Vec<HypothesisId> = Vec::new();

        for (k, &now) in onsets.iter().enumerate() {
            for (j, &earlier) in onsets[..k].iter().enumerate() {
                let period = now - earlier;
                if period < self.params.min_period_ms || period > self.params.max_period_ms {
                    continue;
                }
                let known = alive
                    .iter()
                    .filter_map(|id| set.get(id))
                    .any(|h| self.is_known(h, earlier, period));
                if known {
                    continue;
                }
                let id = HypothesisId::new(format!("{j}-{k}"));
                let hypothesis = Hypothesis::new(id.clone(), earlier, period)
                    .map_err(|e| TrackerError::Other(e.to_string()))?;
                set.insert(hypothesis);
                alive.push(id);
            }

            let window = &onsets[(k + 1).saturating_sub(self.params.eval_window)..=k];
            let mut scored: Vec<(HypothesisId, f64)> = Vec::with_capacity(alive.len());
            for id in &alive {
                let Some(hypothesis) = set.get_mut(id) else {
                    continue;
                };
                let confidence = self.confidence(hypothesis, window);
                if hypothesis.beat_distance(now) <= self.tolerance_ms(hypothesis) {
                    hypothesis.realign(now);
                }
                hypothesis.record(k, confidence);
                scored.push((id.clone(), confidence));
            }

            if scored.len() > self.params.max_hypotheses {
                scored.sort_by(|(ia, ca), (ib, cb)| cb.total_cmp(ca).then_with(|| ia.cmp(ib)));
                scored.truncate(self.params.max_hypotheses);
                alive = scored.into_iter().map(|(id, _)| id).collect();
            }
        }

        if set.is_empty() && onsets.len() > 1 {
            tracing::debug!(onsets = onsets.len(), "no onset pair fell in the period range");
        }
        Ok(set)
    }
}
