//! Leading-hypothesis evolution: change detection and text/JSON reports.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::overtime::OvertimeIndex;
use crate::types::{ChangeEvent, HypothesisId, HypothesisSet, RankingAtTime};
use crate::Error;

/// Extract the points where the leader's identity changes.
///
/// The first ranking always yields the initial event. Confidence never
/// triggers a change on its own: the same leader at a different confidence
/// is the same leader.
pub fn detect_changes<'a>(rankings: &[RankingAtTime<'a>]) -> Result<Vec<ChangeEvent<'a>>, Error> {
    let (first, rest) = rankings.split_first().ok_or(Error::EmptyRanking)?;

    let mut changes = vec![change_at(first)];
    for ranking in rest {
        let (leader, _) = ranking.leader();
        let current = changes.last().map(|c| c.hypothesis.id());
        if current != Some(leader.id()) {
            changes.push(change_at(ranking));
        }
    }
    Ok(changes)
}

fn change_at<'a>(ranking: &RankingAtTime<'a>) -> ChangeEvent<'a> {
    let (hypothesis, confidence) = ranking.leader();
    ChangeEvent {
        onset_index: ranking.onset_index(),
        onset_time: ranking.onset_time(),
        hypothesis,
        confidence,
    }
}

/// An onset that appears in the evolution report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimePoint {
    pub onset_index: usize,
    pub time_ms: f64,
}

/// One line per `(time point, active count)`: `"<time> (<active>)"`, with `" : <change>"`
/// appended where a change event has the same onset index.
///
/// Change events whose onset index matches no time point are dropped.
pub fn format_evolution_report(
    points: &[(TimePoint, usize)],
    changes: &[ChangeEvent<'_>],
) -> String {
    let mut changes_at: HashMap<usize, &ChangeEvent<'_>> = HashMap::new();
    for change in changes {
        if points.iter().any(|(t, _)| t.onset_index == change.onset_index) {
            changes_at.insert(change.onset_index, change);
        } else {
            debug!(
                onset_index = change.onset_index,
                hypothesis = %change.hypothesis.id(),
                "change event has no matching time point, skipping"
            );
        }
    }

    let mut out = String::from("# Hypothesis evolution\n");
    for (point, count) in points {
        let time = point.time_ms as i64;
        let line = match changes_at.get(&point.onset_index) {
            Some(change) => format!("{time} ({count}) : {change}\n"),
            None => format!("{time} ({count})\n"),
        };
        out.push_str(&line);
    }
    out
}

/// Build the evolution report straight from an index.
pub fn evolution_report(index: &OvertimeIndex<'_>) -> Result<String, Error> {
    let onset_times = index.onset_times();
    let points: Vec<(TimePoint, usize)> = index
        .hypothesis_by_time()
        .map(|(idx, active)| {
            (
                TimePoint {
                    onset_index: idx,
                    time_ms: onset_times[idx],
                },
                active.len(),
            )
        })
        .collect();
    let rankings: Vec<RankingAtTime<'_>> = index.hypothesis_sorted_by_conf().collect();
    let changes = detect_changes(&rankings)?;
    Ok(format_evolution_report(&points, &changes))
}

/// Every hypothesis's confidence history, one line each in identity order:
/// `"<id> (<n>): [c1, c2, ...]"`.
pub fn format_confidence_table(set: &HypothesisSet) -> String {
    let mut out = String::from("# Conf per hypothesis\n");
    for hypothesis in set.iter() {
        let confs: Vec<String> = hypothesis
            .confidences()
            .iter()
            .map(|(_, c)| format!("{c:.2}"))
            .collect();
        out.push_str(&format!(
            "{} ({}): [{}]\n",
            hypothesis.id(),
            confs.len(),
            confs.join(", ")
        ));
    }
    out
}

/// Per-onset leader statistics for external plotting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    pub onset_index: usize,
    pub time_ms: f64,
    pub leader: HypothesisId,
    pub top_confidence: f64,
    pub relative_top_confidence: f64,
    pub active_count: usize,
}

/// Owned form of a [`ChangeEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub onset_index: usize,
    pub time_ms: f64,
    pub hypothesis: HypothesisId,
    pub bpm: f64,
    pub confidence: f64,
}

impl From<&ChangeEvent<'_>> for ChangeRecord {
    fn from(change: &ChangeEvent<'_>) -> Self {
        Self {
            onset_index: change.onset_index,
            time_ms: change.onset_time,
            hypothesis: change.hypothesis.id().clone(),
            bpm: change.hypothesis.bpm(),
            confidence: change.confidence,
        }
    }
}

/// Everything needed to redraw the top-confidence plot of one example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionTrace {
    pub onset_times: Vec<f64>,
    pub steps: Vec<TraceStep>,
    pub changes: Vec<ChangeRecord>,
}

impl EvolutionTrace {
    pub fn from_index(index: &OvertimeIndex<'_>) -> Result<Self, Error> {
        let rankings: Vec<RankingAtTime<'_>> = index.hypothesis_sorted_by_conf().collect();
        let changes = detect_changes(&rankings)?;

        let steps = rankings
            .iter()
            .map(|r| {
                let (leader, confidence) = r.leader();
                TraceStep {
                    onset_index: r.onset_index(),
                    time_ms: r.onset_time(),
                    leader: leader.id().clone(),
                    top_confidence: confidence,
                    relative_top_confidence: r.relative_top_confidence(),
                    active_count: r.active_count(),
                }
            })
            .collect();

        Ok(Self {
            onset_times: index.onset_times().to_vec(),
            steps,
            changes: changes.iter().map(ChangeRecord::from).collect(),
        })
    }
}

/// `<out_dir>/<example stem><suffix>`, e.g. `song.mid` + `.txt` -> `song.txt`.
pub fn report_path(out_dir: &Path, example_name: &str, suffix: &str) -> PathBuf {
    let stem = Path::new(example_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| example_name.to_string());
    out_dir.join(format!("{stem}{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Hypothesis;
    use pretty_assertions::assert_eq;

    fn hyp(name: &str, bpm: f64) -> Hypothesis {
        Hypothesis::new(HypothesisId::new(name), 0.0, 60_000.0 / bpm).unwrap()
    }

    fn rankings<'a>(script: &[(usize, &'a Hypothesis, f64)]) -> Vec<RankingAtTime<'a>> {
        script
            .iter()
            .map(|&(idx, h, conf)| RankingAtTime::new(idx, idx as f64 * 500.0, vec![(h, conf)]).unwrap())
            .collect()
    }

    fn summary(changes: &[ChangeEvent<'_>]) -> Vec<(usize, String)> {
        changes
            .iter()
            .map(|c| (c.onset_index, c.hypothesis.id().to_string()))
            .collect()
    }

    #[test]
    fn detects_each_leader_switch() {
        let a = hyp("A", 120.0);
        let b = hyp("B", 90.0);
        let seq = rankings(&[(0, &a, 0.5), (1, &a, 0.9), (2, &b, 0.4), (3, &b, 0.1), (4, &a, 0.7)]);
        let changes = detect_changes(&seq).unwrap();
        assert_eq!(
            summary(&changes),
            vec![(0, "A".into()), (2, "B".into()), (4, "A".into())]
        );
        assert_eq!(changes[1].onset_time, 1000.0);
        assert_eq!(changes[1].confidence, 0.4);
    }

    #[test]
    fn constant_leader_yields_only_initial_event() {
        let a = hyp("A", 120.0);
        let seq = rankings(&[(0, &a, 0.1), (1, &a, 0.9), (2, &a, 0.3), (5, &a, 1.0)]);
        let changes = detect_changes(&seq).unwrap();
        assert_eq!(summary(&changes), vec![(0, "A".into())]);
    }

    #[test]
    fn empty_ranking_sequence_fails() {
        assert!(matches!(detect_changes(&[]), Err(Error::EmptyRanking)));
    }

    #[test]
    fn report_annotates_matching_lines() {
        let a = hyp("A", 120.0);
        let b = hyp("B", 60.0);
        let seq = rankings(&[(1, &a, 0.5), (2, &b, 0.75)]);
        let changes = detect_changes(&seq).unwrap();
        let points = [
            (TimePoint { onset_index: 1, time_ms: 500.0 }, 1),
            (TimePoint { onset_index: 2, time_ms: 1000.4 }, 2),
            (TimePoint { onset_index: 3, time_ms: 1500.0 }, 2),
        ];

        let report = format_evolution_report(&points, &changes);
        assert_eq!(
            report,
            "# Hypothesis evolution\n\
             500 (1) : A 120.00 bpm (conf 0.500)\n\
             1000 (2) : B 60.00 bpm (conf 0.750)\n\
             1500 (2)\n"
        );
    }

    #[test]
    fn report_skips_changes_without_time_point() {
        let a = hyp("A", 120.0);
        let b = hyp("B", 60.0);
        let seq = rankings(&[(0, &a, 0.5), (7, &b, 0.75)]);
        let changes = detect_changes(&seq).unwrap();
        let points = [(TimePoint { onset_index: 0, time_ms: 0.0 }, 1)];

        let report = format_evolution_report(&points, &changes);
        assert_eq!(report, "# Hypothesis evolution\n0 (1) : A 120.00 bpm (conf 0.500)\n");
    }

    #[test]
    fn confidence_table_lists_histories() {
        let mut a = hyp("a", 120.0);
        a.record(1, 0.25);
        a.record(2, 0.5);
        let b = hyp("b", 60.0);
        let set: HypothesisSet = [b, a].into_iter().collect();

        assert_eq!(
            format_confidence_table(&set),
            "# Conf per hypothesis\na (2): [0.25, 0.50]\nb (0): []\n"
        );
    }

    #[test]
    fn trace_and_report_from_index() {
        let mut a = hyp("a", 120.0);
        let mut b = hyp("b", 60.0);
        a.record(1, 0.8);
        b.record(1, 0.2);
        a.record(2, 0.3);
        b.record(2, 0.6);
        let set: HypothesisSet = [a, b].into_iter().collect();
        let onsets = [0.0, 500.0, 1000.0];
        let index = OvertimeIndex::new(&set, &onsets);

        let trace = EvolutionTrace::from_index(&index).unwrap();
        assert_eq!(trace.steps.len(), 2);
        assert_eq!(trace.steps[0].leader, HypothesisId::new("a"));
        assert!((trace.steps[0].relative_top_confidence - 0.8).abs() < 1e-12);
        assert_eq!(trace.changes.len(), 2);
        assert_eq!(trace.changes[1].bpm, 60.0);

        let report = evolution_report(&index).unwrap();
        assert_eq!(
            report,
            "# Hypothesis evolution\n\
             500 (2) : a 120.00 bpm (conf 0.800)\n\
             1000 (2) : b 60.00 bpm (conf 0.600)\n"
        );
    }

    #[test]
    fn report_path_swaps_extension() {
        let path = report_path(Path::new("out"), "song.mid", ".txt");
        assert_eq!(path, PathBuf::from("out/song.txt"));
        let path = report_path(Path::new("out"), "song.mid", "_trace.json");
        assert_eq!(path, PathBuf::from("out/song_trace.json"));
    }
}
