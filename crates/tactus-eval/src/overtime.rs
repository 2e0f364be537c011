//! Time-indexed views over a hypothesis set.

use crate::types::{Hypothesis, HypothesisSet, RankingAtTime};

/// Which hypotheses were alive, and how confident, at each onset.
///
/// Every view is recomputed from the confidence samples on each call; the
/// iterators are finite, restartable and hold nothing beyond the current step.
#[derive(Debug, Clone, Copy)]
pub struct OvertimeIndex<'a> {
    set: &'a HypothesisSet,
    onset_times: &'a [f64],
}

impl<'a> OvertimeIndex<'a> {
    pub fn new(set: &'a HypothesisSet, onset_times: &'a [f64]) -> Self {
        Self { set, onset_times }
    }

    pub fn onset_times(&self) -> &'a [f64] {
        self.onset_times
    }

    pub fn hypothesis_set(&self) -> &'a HypothesisSet {
        self.set
    }

    /// `(onset_index, active hypotheses in identity order)`, ascending by
    /// index. Indices where nothing is active are skipped.
    pub fn hypothesis_by_time(&self) -> impl Iterator<Item = (usize, Vec<&'a Hypothesis>)> + 'a {
        let set = self.set;
        (0..self.onset_times.len()).filter_map(move |idx| {
            let active: Vec<&Hypothesis> = set
                .iter()
                .filter(|h| h.confidence_at(idx).is_some())
                .collect();
            (!active.is_empty()).then_some((idx, active))
        })
    }

    /// Rankings by descending confidence, ascending by onset index. Indices
    /// where nothing is active are skipped.
    pub fn hypothesis_sorted_by_conf(&self) -> impl Iterator<Item = RankingAtTime<'a>> + 'a {
        let set = self.set;
        let times = self.onset_times;
        (0..times.len()).filter_map(move |idx| {
            let active = set
                .iter()
                .filter_map(|h| h.confidence_at(idx).map(|c| (h, c)))
                .collect();
            RankingAtTime::new(idx, times[idx], active)
        })
    }
}
