use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Identity of a tactus hypothesis.
///
/// Ordering is lexicographic and serves as the deterministic tie-break
/// wherever two hypotheses compete on equal terms.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HypothesisId(String);

impl HypothesisId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HypothesisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HypothesisId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A candidate beat interpretation: a periodic grid anchored at `phase_ms`,
/// plus the confidence it earned at each onset index it was evaluated on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hypothesis {
    id: HypothesisId,
    phase_ms: f64,
    period_ms: f64,
    /// `(onset_index, confidence)`, strictly increasing by onset index.
    confs: Vec<(usize, f64)>,
}

impl Hypothesis {
    /// Fails with [`Error::Domain`] unless the period is finite and positive.
    pub fn new(id: HypothesisId, phase_ms: f64, period_ms: f64) -> Result<Self, Error> {
        if !(period_ms.is_finite() && period_ms > 0.0) {
            return Err(Error::Domain { value: period_ms });
        }
        Ok(Self {
            id,
            phase_ms,
            period_ms,
            confs: Vec::new(),
        })
    }

    pub fn id(&self) -> &HypothesisId {
        &self.id
    }

    pub fn phase_ms(&self) -> f64 {
        self.phase_ms
    }

    pub fn period_ms(&self) -> f64 {
        self.period_ms
    }

    /// Tempo in beats per minute; always strictly positive.
    pub fn bpm(&self) -> f64 {
        60_000.0 / self.period_ms
    }

    pub fn confidences(&self) -> &[(usize, f64)] {
        &self.confs
    }

    pub fn confidence_at(&self, onset_index: usize) -> Option<f64> {
        self.confs
            .binary_search_by_key(&onset_index, |&(idx, _)| idx)
            .ok()
            .map(|pos| self.confs[pos].1)
    }

    /// Record the confidence at `onset_index`, clamped to [0, 1].
    ///
    /// Samples must arrive in increasing onset order; a repeated index
    /// replaces the previous sample.
    pub fn record(&mut self, onset_index: usize, confidence: f64) {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        match self.confs.last_mut() {
            Some(last) if last.0 == onset_index => last.1 = confidence,
            _ => {
                debug_assert!(self.confs.last().map_or(true, |&(idx, _)| idx < onset_index));
                self.confs.push((onset_index, confidence));
            }
        }
    }

    /// Move the grid anchor, keeping the period.
    pub fn realign(&mut self, phase_ms: f64) {
        self.phase_ms = phase_ms;
    }

    /// Distance from `time_ms` to the nearest beat of this grid.
    pub fn beat_distance(&self, time_ms: f64) -> f64 {
        let beats = ((time_ms - self.phase_ms) / self.period_ms).round();
        (time_ms - (self.phase_ms + beats * self.period_ms)).abs()
    }
}

impl PartialEq for Hypothesis {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Hypothesis {}

impl fmt::Display for Hypothesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:.2} bpm", self.id, self.bpm())
    }
}

/// All hypotheses a tracker produced for one example.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HypothesisSet {
    hypotheses: BTreeMap<HypothesisId, Hypothesis>,
}

impl HypothesisSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a hypothesis, replacing any previous one with the same id.
    pub fn insert(&mut self, hypothesis: Hypothesis) {
        self.hypotheses.insert(hypothesis.id.clone(), hypothesis);
    }

    pub fn get(&self, id: &HypothesisId) -> Option<&Hypothesis> {
        self.hypotheses.get(id)
    }

    pub fn get_mut(&mut self, id: &HypothesisId) -> Option<&mut Hypothesis> {
        self.hypotheses.get_mut(id)
    }

    /// Hypotheses in identity order.
    pub fn iter(&self) -> impl Iterator<Item = &Hypothesis> {
        self.hypotheses.values()
    }

    pub fn len(&self) -> usize {
        self.hypotheses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hypotheses.is_empty()
    }
}

impl FromIterator<Hypothesis> for HypothesisSet {
    fn from_iter<I: IntoIterator<Item = Hypothesis>>(iter: I) -> Self {
        let mut set = Self::new();
        for hypothesis in iter {
            set.insert(hypothesis);
        }
        set
    }
}

/// The hypotheses active at one onset, best first.
#[derive(Debug, Clone)]
pub struct RankingAtTime<'a> {
    onset_index: usize,
    onset_time: f64,
    ranked: Vec<(&'a Hypothesis, f64)>,
}

impl<'a> RankingAtTime<'a> {
    /// Sorts by confidence descending, then identity ascending.
    /// Returns `None` when nothing is active, so a ranking is never empty.
    pub fn new(
        onset_index: usize,
        onset_time: f64,
        mut ranked: Vec<(&'a Hypothesis, f64)>,
    ) -> Option<Self> {
        if ranked.is_empty() {
            return None;
        }
        ranked.sort_by(|(ha, ca), (hb, cb)| cb.total_cmp(ca).then_with(|| ha.id.cmp(&hb.id)));
        Some(Self {
            onset_index,
            onset_time,
            ranked,
        })
    }

    pub fn onset_index(&self) -> usize {
        self.onset_index
    }

    pub fn onset_time(&self) -> f64 {
        self.onset_time
    }

    pub fn ranked(&self) -> &[(&'a Hypothesis, f64)] {
        &self.ranked
    }

    pub fn leader(&self) -> (&'a Hypothesis, f64) {
        self.ranked[0]
    }

    pub fn active_count(&self) -> usize {
        self.ranked.len()
    }

    /// Leader confidence as a share of the summed confidence (0 when all
    /// confidences are 0).
    pub fn relative_top_confidence(&self) -> f64 {
        let total: f64 = self.ranked.iter().map(|(_, c)| c).sum();
        if total > 0.0 {
            self.leader().1 / total
        } else {
            0.0
        }
    }
}

/// A point where a different hypothesis took the lead.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent<'a> {
    pub onset_index: usize,
    pub onset_time: f64,
    pub hypothesis: &'a Hypothesis,
    pub confidence: f64,
}

impl fmt::Display for ChangeEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (conf {:.3})", self.hypothesis, self.confidence)
    }
}

/// One piece to score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetExample {
    pub name: String,
    /// Onset times in milliseconds, non-decreasing.
    pub onsets: Vec<f64>,
    /// Ground-truth tempo; `None` when no annotation could be resolved.
    pub expected_bpm: Option<f64>,
    /// Tempo estimated by the baseline system.
    pub baseline_bpm: Option<f64>,
}

/// The two systems compared on every example.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum System {
    UnderTest,
    Baseline,
}

impl System {
    pub const ALL: [System; 2] = [System::UnderTest, System::Baseline];

    pub fn as_str(&self) -> &'static str {
        match self {
            System::UnderTest => "under_test",
            System::Baseline => "baseline",
        }
    }
}

impl fmt::Display for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for a single example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleScore {
    pub name: String,
    pub expected_bpm: f64,
    pub winner: HypothesisId,
    pub winner_bpm: f64,
    pub baseline_bpm: f64,
    pub under_test_correct: bool,
    pub baseline_correct: bool,
}

impl ExampleScore {
    pub fn correct(&self, system: System) -> bool {
        match system {
            System::UnderTest => self.under_test_correct,
            System::Baseline => self.baseline_correct,
        }
    }
}

/// Mean accuracy per system over one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub accuracy: BTreeMap<System, f64>,
    /// Examples that contributed to the means.
    pub examples: usize,
    /// Examples dropped because they failed under the skip policy.
    pub skipped: usize,
    pub results: Vec<ExampleScore>,
}

impl ScoreSummary {
    /// Aggregate scored examples. Fails on an empty slice, whose mean is
    /// undefined.
    pub fn from_results(
        dataset: &str,
        results: Vec<ExampleScore>,
        skipped: usize,
    ) -> Result<Self, Error> {
        if results.is_empty() {
            return Err(Error::EmptyDataset {
                dataset: dataset.to_string(),
            });
        }
        let n = results.len() as f64;
        let accuracy = System::ALL
            .iter()
            .map(|&system| {
                let correct = results.iter().filter(|r| r.correct(system)).count();
                (system, correct as f64 / n)
            })
            .collect();
        Ok(Self {
            accuracy,
            examples: results.len(),
            skipped,
            results,
        })
    }

    pub fn accuracy(&self, system: System) -> f64 {
        self.accuracy.get(&system).copied().unwrap_or(0.0)
    }
}
