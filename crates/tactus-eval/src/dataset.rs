//! Dataset sources: directories of MIDI files with tempo annotations and
//! Melisma beat logs beside them.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::melisma::BeatLevels;
use crate::types::DatasetExample;
use crate::Error;

/// Anything that can produce the examples of one named dataset.
pub trait DatasetSource: Send + Sync {
    fn name(&self) -> &str;
    fn load(&self) -> Result<Vec<DatasetExample>, Error>;
}

/// Where the ground-truth tempo of an example comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpectedTempo {
    /// The MIDI file's own initial tempo.
    Midi,
    /// First line of `<stem>.bpm`, falling back to the MIDI tempo.
    Sidecar,
    /// A `"<stem> <bpm>"` per line table.
    Table(PathBuf),
}

/// A directory of `*.mid` files, one example each, with `<stem>.nb`
/// baseline logs alongside.
#[derive(Debug, Clone)]
pub struct MidiDirectory {
    name: String,
    dir: PathBuf,
    expected: ExpectedTempo,
    collapse_ms: f64,
}

impl MidiDirectory {
    pub fn new(
        name: impl Into<String>,
        dir: impl Into<PathBuf>,
        expected: ExpectedTempo,
        collapse_ms: f64,
    ) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            expected,
            collapse_ms,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn expected(&self) -> &ExpectedTempo {
        &self.expected
    }

    /// `*.mid` files in the directory, sorted by file name.
    pub fn midi_files(&self) -> Result<Vec<PathBuf>, Error> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| Error::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| Error::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "mid") {
                files.push(path);
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    fn load_example(
        &self,
        path: &Path,
        table: Option<&HashMap<String, f64>>,
    ) -> Result<DatasetExample, Error> {
        let name = file_name(path);
        let midi = midi_onsets::onsets_from_file(path, self.collapse_ms).map_err(|source| {
            Error::Midi {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let expected_bpm = match &self.expected {
            ExpectedTempo::Midi => Some(midi.bpm),
            ExpectedTempo::Sidecar => {
                let sidecar = path.with_extension("bpm");
                if sidecar.exists() {
                    Some(read_sidecar_bpm(&sidecar)?)
                } else {
                    Some(midi.bpm)
                }
            }
            ExpectedTempo::Table(_) => {
                let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
                let bpm = table.and_then(|t| t.get(stem)).copied();
                if bpm.is_none() {
                    debug!(example = %name, "no tempo table entry");
                }
                bpm
            }
        };

        let baseline_bpm = read_baseline_bpm(&path.with_extension("nb"))?;
        if baseline_bpm.is_none() {
            debug!(example = %name, "no usable baseline beat log");
        }

        Ok(DatasetExample {
            name,
            onsets: midi.onset_ms,
            expected_bpm,
            baseline_bpm,
        })
    }
}

impl DatasetSource for MidiDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<Vec<DatasetExample>, Error> {
        let table = match &self.expected {
            ExpectedTempo::Table(path) => Some(read_tempo_table(path)?),
            _ => None,
        };
        let examples = self
            .midi_files()?
            .iter()
            .map(|path| self.load_example(path, table.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        info!(dataset = %self.name, examples = examples.len(), dir = %self.dir.display(), "dataset loaded");
        Ok(examples)
    }
}

/// The three evaluation datasets under `root`: `kp`, `kp-perf` and `tap`.
pub fn standard_datasets(root: &Path, collapse_ms: f64) -> Vec<MidiDirectory> {
    vec![
        MidiDirectory::new("kp", root.join("kp"), ExpectedTempo::Midi, collapse_ms),
        MidiDirectory::new(
            "kp-perf",
            root.join("kp-perf"),
            ExpectedTempo::Table(root.join("kp-perf").join("bpms.txt")),
            collapse_ms,
        ),
        MidiDirectory::new("tap", root.join("tap"), ExpectedTempo::Sidecar, collapse_ms),
    ]
}

/// Load every source into a name-keyed map.
pub fn load_datasets<S: DatasetSource>(
    sources: &[S],
) -> Result<BTreeMap<String, Vec<DatasetExample>>, Error> {
    sources
        .iter()
        .map(|source| Ok((source.name().to_string(), source.load()?)))
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_to_string(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_error(path: &Path, message: impl Into<String>) -> Error {
    Error::Parse {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn parse_bpm(path: &Path, text: &str) -> Result<f64, Error> {
    let bpm: f64 = text
        .trim()
        .parse()
        .map_err(|e| parse_error(path, format!("invalid tempo {text:?}: {e}")))?;
    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(parse_error(path, format!("tempo must be positive, got {bpm}")));
    }
    Ok(bpm)
}

fn read_sidecar_bpm(path: &Path) -> Result<f64, Error> {
    let contents = read_to_string(path)?;
    let first = contents
        .lines()
        .next()
        .ok_or_else(|| parse_error(path, "empty tempo file"))?;
    parse_bpm(path, first)
}

/// `None` when the log is absent or has fewer than two tactus beats.
fn read_baseline_bpm(path: &Path) -> Result<Option<f64>, Error> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = read_to_string(path)?;
    Ok(BeatLevels::parse(contents.lines()).baseline_bpm())
}

fn read_tempo_table(path: &Path) -> Result<HashMap<String, f64>, Error> {
    let contents = read_to_string(path)?;
    let mut table = HashMap::new();
    for (lineno, line) in contents.lines().enumerate() {
        let mut fields = line.split_whitespace();
        let (Some(stem), Some(bpm), None) = (fields.next(), fields.next(), fields.next()) else {
            if line.trim().is_empty() {
                continue;
            }
            return Err(parse_error(
                path,
                format!("line {}: expected \"<name> <bpm>\"", lineno + 1),
            ));
        };
        table.insert(stem.to_string(), parse_bpm(path, bpm)?);
    }
    Ok(table)
}
