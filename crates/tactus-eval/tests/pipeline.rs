//! Full pipeline: MIDI datasets on disk, the pairwise tracker, scoring and
//! the evolution report.

use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use tactus_eval::{
    evolution_report, load_datasets, render_latex, standard_datasets, EvolutionTrace,
    HypothesisId, OvertimeIndex, PairwiseTracker, Scorer, ScorerConfig, System, Tracker,
};
use tempfile::TempDir;

/// Sixteen quarter notes at `bpm`.
fn write_metronome(dir: &Path, stem: &str, bpm: u32) {
    let usec = 60_000_000 / bpm;
    let ticks: Vec<u64> = (0..16).map(|i| i * 480).collect();
    let bytes = midi_onsets::metronome_midi(480, usec, &ticks);
    std::fs::write(dir.join(format!("{stem}.mid")), bytes).unwrap();
}

fn write_beat_log(dir: &Path, stem: &str, period_ms: u32) {
    let log: String = (0..8).map(|i| format!("Beat {} 3\n", i * period_ms)).collect();
    std::fs::write(dir.join(format!("{stem}.nb")), log).unwrap();
}

fn layout() -> TempDir {
    let root = TempDir::new().unwrap();
    let kp = root.path().join("kp");
    let perf = root.path().join("kp-perf");
    let tap = root.path().join("tap");
    for dir in [&kp, &perf, &tap] {
        std::fs::create_dir(dir).unwrap();
    }

    // Baseline right on one, wrong on the other.
    write_metronome(&kp, "steady", 120);
    write_beat_log(&kp, "steady", 500);
    write_metronome(&kp, "slow", 100);
    write_beat_log(&kp, "slow", 700);

    // Annotated at double time, still harmonically correct.
    write_metronome(&perf, "played", 120);
    write_beat_log(&perf, "played", 1000);
    std::fs::write(perf.join("bpms.txt"), "played 240\n").unwrap();

    // Tapped tempo disagrees with the file.
    write_metronome(&tap, "tapped", 120);
    write_beat_log(&tap, "tapped", 500);
    std::fs::write(tap.join("tapped.bpm"), "90\n").unwrap();

    root
}

#[tokio::test]
async fn scores_standard_datasets() {
    let root = layout();
    let datasets = load_datasets(&standard_datasets(root.path(), 0.0)).unwrap();
    assert_eq!(datasets["kp"].len(), 2);

    let scorer = Scorer::new(Arc::new(PairwiseTracker::default()), ScorerConfig::default());
    let results = scorer.evaluate(&datasets).await.unwrap();

    let kp = &results["kp"];
    assert_eq!(kp.examples, 2);
    assert_eq!(kp.accuracy(System::UnderTest), 1.0);
    assert_eq!(kp.accuracy(System::Baseline), 0.5);
    assert_eq!(kp.results[1].name, "steady.mid");
    assert_eq!(kp.results[1].winner, HypothesisId::new("0-1"));

    let perf = &results["kp-perf"];
    assert_eq!(perf.accuracy(System::UnderTest), 1.0);
    assert_eq!(perf.accuracy(System::Baseline), 1.0);

    let tap = &results["tap"];
    assert_eq!(tap.accuracy(System::UnderTest), 0.0);
    assert_eq!(tap.accuracy(System::Baseline), 0.0);

    let latex = render_latex(&results);
    assert!(latex.contains("kp & 1.00 & 0.50 \\\\"));
    assert!(latex.contains("tap & 0.00 & 0.00 \\\\"));
}

#[test]
fn metronome_evolution_has_a_single_leader() {
    let onsets: Vec<f64> = (0..12).map(|i| i as f64 * 500.0).collect();
    let set = PairwiseTracker::default().track(&onsets).unwrap();
    let index = OvertimeIndex::new(&set, &onsets);

    let report = evolution_report(&index).unwrap();
    let mut lines = report.lines();
    assert_eq!(lines.next(), Some("# Hypothesis evolution"));
    assert_eq!(lines.next(), Some("500 (1) : 0-1 120.00 bpm (conf 1.000)"));
    assert_eq!(report.matches(" : ").count(), 1);

    let trace = EvolutionTrace::from_index(&index).unwrap();
    assert_eq!(trace.steps.len(), 11);
    assert!(trace.steps.iter().all(|s| s.leader == HypothesisId::new("0-1")));
    assert_eq!(trace.changes.len(), 1);

    let json = serde_json::to_value(&trace).unwrap();
    assert_eq!(json["changes"][0]["hypothesis"], "0-1");
}
