//! Subcommand implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tactconf::{ConfigSources, TactusConfig};
use tactus_eval::{
    evolution_report, format_confidence_table, load_datasets, render_latex, render_table,
    report_path, standard_datasets, DatasetSource, EvolutionTrace, ExpectedTempo, MidiDirectory,
    OvertimeIndex, PairwiseTracker, Scorer, ScorerConfig, Tracker, TrackerParams,
};
use tracing::info;

use crate::OutputFormat;

fn tracker(config: &TactusConfig) -> PairwiseTracker {
    PairwiseTracker::new(TrackerParams::from(&config.tracker))
}

/// Score the selected datasets and render the summary.
pub async fn score(config: &TactusConfig, names: &[String], format: OutputFormat) -> Result<String> {
    let mut sources = standard_datasets(&config.paths.datasets_dir, config.onsets.collapse_ms);
    if !names.is_empty() {
        for name in names {
            if !sources.iter().any(|s| s.name() == name) {
                bail!("Unknown dataset {name:?} (expected kp, kp-perf or tap)");
            }
        }
        sources.retain(|s| names.iter().any(|n| n == s.name()));
    }

    let datasets = load_datasets(&sources).with_context(|| {
        format!(
            "Failed to load datasets from {}",
            config.paths.datasets_dir.display()
        )
    })?;

    let scorer = Scorer::new(
        Arc::new(tracker(config)),
        ScorerConfig::from(&config.scoring),
    );
    let results = scorer.evaluate(&datasets).await?;

    Ok(match format {
        OutputFormat::Table => render_table(&results),
        OutputFormat::Latex => render_latex(&results),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(&results)?;
            json.push('\n');
            json
        }
    })
}

/// Write `<stem>.txt` and `<stem>_trace.json` for every MIDI file in `input`.
pub async fn evolution(config: &TactusConfig, input: &Path, out: &Path) -> Result<()> {
    let files = MidiDirectory::new("input", input, ExpectedTempo::Midi, config.onsets.collapse_ms)
        .midi_files()?;
    if files.is_empty() {
        bail!("No .mid files in {}", input.display());
    }
    std::fs::create_dir_all(out)
        .with_context(|| format!("Failed to create {}", out.display()))?;

    let tracker = Arc::new(tracker(config));
    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let onsets = midi_onsets::onsets_from_file(&path, config.onsets.collapse_ms)
            .with_context(|| format!("Failed to read onsets from {}", path.display()))?
            .onset_ms;

        let worker = Arc::clone(&tracker);
        let times = onsets.clone();
        let set = tokio::task::spawn_blocking(move || worker.track(&times))
            .await?
            .with_context(|| format!("Tracker failed on {name}"))?;

        let index = OvertimeIndex::new(&set, &onsets);
        let mut report = evolution_report(&index).with_context(|| format!("No rankings for {name}"))?;
        report.push('\n');
        report.push_str(&format_confidence_table(&set));
        let trace = EvolutionTrace::from_index(&index)?;

        let report_file = report_path(out, &name, ".txt");
        std::fs::write(&report_file, report)
            .with_context(|| format!("Failed to write {}", report_file.display()))?;
        let trace_file = report_path(out, &name, "_trace.json");
        std::fs::write(&trace_file, serde_json::to_string_pretty(&trace)?)
            .with_context(|| format!("Failed to write {}", trace_file.display()))?;

        info!(example = %name, hypotheses = set.len(), report = %report_file.display(), "evolution written");
    }
    Ok(())
}

/// Config sources followed by the effective config as TOML.
pub fn describe_config(config: &TactusConfig, sources: &ConfigSources) -> String {
    let mut out = String::new();
    if sources.files.is_empty() {
        out.push_str("# No config files found, using defaults\n");
    } else {
        for file in &sources.files {
            out.push_str(&format!("# Loaded: {}\n", file.display()));
        }
    }
    for var in &sources.env_overrides {
        out.push_str(&format!("# Env override: {var}\n"));
    }
    out.push('\n');
    out.push_str(&config.to_toml());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_metronome(dir: &Path, stem: &str) {
        let ticks: Vec<u64> = (0..8).map(|i| i * 480).collect();
        let bytes = midi_onsets::metronome_midi(480, 500_000, &ticks);
        std::fs::write(dir.join(format!("{stem}.mid")), bytes).unwrap();
    }

    #[tokio::test]
    async fn evolution_writes_report_and_trace() {
        let input = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        write_metronome(input.path(), "click");

        evolution(&TactusConfig::default(), input.path(), out.path())
            .await
            .unwrap();

        let report = std::fs::read_to_string(out.path().join("click.txt")).unwrap();
        assert!(report.starts_with("# Hypothesis evolution\n500 (1) : 0-1 120.00 bpm"));
        assert!(report.contains("# Conf per hypothesis\n"));
        let trace: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.path().join("click_trace.json")).unwrap())
                .unwrap();
        assert_eq!(trace["steps"].as_array().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn evolution_rejects_empty_input() {
        let input = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let err = evolution(&TactusConfig::default(), input.path(), out.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No .mid files"));
    }

    #[tokio::test]
    async fn score_renders_selected_dataset() {
        let root = TempDir::new().unwrap();
        let kp = root.path().join("kp");
        std::fs::create_dir(&kp).unwrap();
        write_metronome(&kp, "click");
        std::fs::write(kp.join("click.nb"), "Beat 0 3\nBeat 1000 3\n").unwrap();

        let mut config = TactusConfig::default();
        config.paths.datasets_dir = root.path().to_path_buf();
        let names = vec!["kp".to_string()];

        let table = score(&config, &names, OutputFormat::Table).await.unwrap();
        assert!(table.contains("kp"));
        assert!(table.lines().nth(1).unwrap().contains("1.00"));

        let json = score(&config, &names, OutputFormat::Json).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["kp"]["accuracy"]["under_test"], 1.0);
        assert_eq!(value["kp"]["accuracy"]["baseline"], 1.0);
    }

    #[tokio::test]
    async fn unknown_dataset_is_rejected() {
        let err = score(&TactusConfig::default(), &["bogus".to_string()], OutputFormat::Table)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown dataset"));
    }

    #[test]
    fn config_description_lists_sources() {
        let sources = ConfigSources {
            files: vec![PathBuf::from("/etc/tactus/config.toml")],
            env_overrides: vec!["TACTUS_LIMIT".to_string()],
        };
        let text = describe_config(&TactusConfig::default(), &sources);
        assert!(text.starts_with("# Loaded: /etc/tactus/config.toml\n# Env override: TACTUS_LIMIT\n"));
        assert!(text.contains("[scoring]"));
    }
}
