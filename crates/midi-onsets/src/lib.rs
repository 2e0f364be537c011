pub mod extract;
pub mod tempo;
#[cfg(any(test, feature = "test-util"))]
pub mod writer;

pub use extract::{collapse_onsets, extract_onset_ticks, MidiOnsets};
pub use tempo::{TempoChange, TempoMap, DEFAULT_BPM};
#[cfg(any(test, feature = "test-util"))]
pub use writer::metronome_midi;

use std::path::Path;

/// Errors from MIDI onset extraction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MIDI parse error: {0}")]
    MidiParse(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("MIDI file contains no note onsets")]
    NoOnsets,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Decode MIDI bytes into collapsed onset times in milliseconds.
///
/// Onsets closer than `collapse_ms` to the previously kept onset are merged
/// into it; `0.0` merges only simultaneous onsets (chords).
pub fn onsets_from_bytes(bytes: &[u8], collapse_ms: f64) -> Result<MidiOnsets> {
    let smf = midly::Smf::parse(bytes).map_err(|e| Error::MidiParse(e.to_string()))?;
    let tempo_map = TempoMap::from_smf(&smf);
    let ticks = extract_onset_ticks(&smf);
    if ticks.is_empty() {
        return Err(Error::NoOnsets);
    }

    let times: Vec<f64> = ticks.iter().map(|&t| tempo_map.tick_to_ms(t)).collect();
    let onset_ms = collapse_onsets(&times, collapse_ms);

    Ok(MidiOnsets {
        onset_ms,
        bpm: tempo_map.initial_bpm(),
        ppq: tempo_map.ppq(),
    })
}

/// Read a MIDI file from disk and extract its collapsed onsets.
pub fn onsets_from_file(path: &Path, collapse_ms: f64) -> Result<MidiOnsets> {
    let bytes = std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    onsets_from_bytes(&bytes, collapse_ms)
}
