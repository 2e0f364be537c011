//! Dataset scoring: majority-vote winner per example, harmonic correctness,
//! per-system mean accuracy per dataset.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tactconf::ScoringConfig;
use tracing::{debug, info, warn};

use crate::comparator::{is_correct, DEFAULT_TOLERANCE};
use crate::overtime::OvertimeIndex;
use crate::tracker::{Tracker, TrackerError};
use crate::types::{
    DatasetExample, ExampleScore, HypothesisId, HypothesisSet, RankingAtTime, ScoreSummary, System,
};
use crate::Error;

/// What to do when an example cannot be scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the whole dataset, naming the example.
    #[default]
    Abort,
    /// Leave the example out of the means and count it in `skipped`.
    Skip,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScorerConfig {
    pub tolerance: f64,
    /// Score at most this many examples per dataset, in dataset order.
    pub limit: Option<usize>,
    pub failure_policy: FailurePolicy,
    /// Upper bound on a single tracker call.
    pub tracker_timeout: Option<Duration>,
    /// Examples tracked concurrently; 1 scores sequentially.
    pub max_parallel: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            limit: None,
            failure_policy: FailurePolicy::Abort,
            tracker_timeout: None,
            max_parallel: 1,
        }
    }
}

impl From<&ScoringConfig> for ScorerConfig {
    fn from(config: &ScoringConfig) -> Self {
        Self {
            tolerance: config.tolerance,
            limit: config.limit,
            failure_policy: if config.skip_failures {
                FailurePolicy::Skip
            } else {
                FailurePolicy::Abort
            },
            tracker_timeout: config.timeout_secs.map(Duration::from_secs),
            max_parallel: config.max_parallel.max(1),
        }
    }
}

/// The identity that leads the most rankings. Ties go to the lowest
/// identity. `None` for an empty sequence.
pub fn majority_vote<'r, 'a: 'r>(
    rankings: impl IntoIterator<Item = &'r RankingAtTime<'a>>,
) -> Option<HypothesisId> {
    let mut votes: HashMap<&'a HypothesisId, usize> = HashMap::new();
    for ranking in rankings {
        *votes.entry(ranking.leader().0.id()).or_default() += 1;
    }
    votes
        .into_iter()
        .max_by(|(ia, ca), (ib, cb)| ca.cmp(cb).then_with(|| ib.cmp(ia)))
        .map(|(id, _)| id.clone())
}

/// Attach the example name to a comparator domain error.
fn named_domain_error(example: &DatasetExample, what: &'static str, err: Error) -> Error {
    match err {
        Error::Domain { value } => Error::InvalidTempo {
            example: example.name.clone(),
            what,
            value,
        },
        other => other,
    }
}

/// Scores examples with one tracker under one configuration.
pub struct Scorer {
    tracker: Arc<dyn Tracker>,
    config: ScorerConfig,
}

impl Scorer {
    pub fn new(tracker: Arc<dyn Tracker>, config: ScorerConfig) -> Self {
        Self { tracker, config }
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Score every dataset independently.
    pub async fn evaluate(
        &self,
        datasets: &BTreeMap<String, Vec<DatasetExample>>,
    ) -> Result<BTreeMap<String, ScoreSummary>, Error> {
        let mut results = BTreeMap::new();
        for (name, examples) in datasets {
            let summary = self.score_dataset(name, examples).await?;
            results.insert(name.clone(), summary);
        }
        Ok(results)
    }

    /// Mean accuracy of both systems over the first `limit` examples.
    pub async fn score_dataset(
        &self,
        dataset: &str,
        examples: &[DatasetExample],
    ) -> Result<ScoreSummary, Error> {
        let take = self.config.limit.unwrap_or(examples.len()).min(examples.len());
        let examples = &examples[..take];
        info!(dataset, examples = examples.len(), "scoring dataset");

        // `buffered` yields in input order, so the reduction below never
        // depends on which tracker call finishes first.
        let mut outcomes = stream::iter(examples.iter().map(|example| self.score_example(example)))
            .buffered(self.config.max_parallel.max(1));

        let mut scored = Vec::with_capacity(examples.len());
        let mut skipped = 0usize;
        while let Some(outcome) = outcomes.next().await {
            match (outcome, self.config.failure_policy) {
                (Ok(score), _) => scored.push(score),
                (Err(err), FailurePolicy::Abort) => return Err(err),
                (Err(err), FailurePolicy::Skip) => {
                    warn!(dataset, error = %err, "skipping failed example");
                    skipped += 1;
                }
            }
        }

        let summary = ScoreSummary::from_results(dataset, scored, skipped)?;
        info!(
            dataset,
            under_test = summary.accuracy(System::UnderTest),
            baseline = summary.accuracy(System::Baseline),
            skipped,
            "dataset scored"
        );
        Ok(summary)
    }

    /// Run the tracker on one example and judge both systems.
    pub async fn score_example(&self, example: &DatasetExample) -> Result<ExampleScore, Error> {
        let expected = example.expected_bpm.ok_or_else(|| Error::MissingReference {
            example: example.name.clone(),
            what: "expected tempo",
        })?;
        let baseline = example.baseline_bpm.ok_or_else(|| Error::MissingReference {
            example: example.name.clone(),
            what: "baseline tempo",
        })?;
        for (what, value) in [("expected tempo", expected), ("baseline tempo", baseline)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(named_domain_error(example, what, Error::Domain { value }));
            }
        }

        let set = self.run_tracker(example).await?;
        self.judge(example, &set, expected, baseline)
    }

    fn judge(
        &self,
        example: &DatasetExample,
        set: &HypothesisSet,
        expected: f64,
        baseline: f64,
    ) -> Result<ExampleScore, Error> {
        let no_ranking = || Error::TrackerFailure {
            example: example.name.clone(),
            source: TrackerError::NoHypotheses {
                onsets: example.onsets.len(),
            },
        };
        if set.is_empty() {
            return Err(no_ranking());
        }

        let index = OvertimeIndex::new(set, &example.onsets);
        let rankings: Vec<RankingAtTime<'_>> = index.hypothesis_sorted_by_conf().collect();
        let winner_id = majority_vote(&rankings).ok_or_else(no_ranking)?;
        let winner = set.get(&winner_id).ok_or_else(no_ranking)?;
        let winner_bpm = winner.bpm();

        let under_test_correct = is_correct(winner_bpm, expected, self.config.tolerance)
            .map_err(|e| named_domain_error(example, "tracker tempo", e))?;
        let baseline_correct = is_correct(baseline, expected, self.config.tolerance)
            .map_err(|e| named_domain_error(example, "baseline tempo", e))?;
        debug!(
            example = %example.name,
            winner = %winner_id,
            winner_bpm,
            expected,
            baseline,
            under_test_correct,
            baseline_correct,
            "example scored"
        );

        Ok(ExampleScore {
            name: example.name.clone(),
            expected_bpm: expected,
            winner: winner_id,
            winner_bpm,
            baseline_bpm: baseline,
            under_test_correct,
            baseline_correct,
        })
    }

    /// The tracker runs on the blocking pool. On timeout the call is
    /// abandoned, not cancelled: its thread finishes in the background.
    async fn run_tracker(&self, example: &DatasetExample) -> Result<HypothesisSet, Error> {
        let tracker = Arc::clone(&self.tracker);
        let onsets = example.onsets.clone();
        let task = tokio::task::spawn_blocking(move || tracker.track(&onsets));

        let joined = match self.config.tracker_timeout {
            Some(after) => tokio::time::timeout(after, task)
                .await
                .map_err(|_| Error::TrackerTimeout {
                    example: example.name.clone(),
                    after,
                })?,
            None => task.await,
        };

        let tracked = joined.map_err(|e| Error::TrackerFailure {
            example: example.name.clone(),
            source: TrackerError::Panicked(e.to_string()),
        })?;
        tracked.map_err(|source| Error::TrackerFailure {
            example: example.name.clone(),
            source,
        })
    }
}
