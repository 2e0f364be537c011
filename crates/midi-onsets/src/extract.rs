use midly::{MidiMessage, Smf, TrackEventKind};
use serde::{Deserialize, Serialize};

/// Onsets of a MIDI file in wall-clock milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiOnsets {
    /// Strictly increasing onset times.
    pub onset_ms: Vec<f64>,
    /// Notated tempo of the file (first tempo event, default 120).
    pub bpm: f64,
    pub ppq: u16,
}

/// Collect the absolute tick of every sounding note-on, across all tracks,
/// in ascending order.
pub fn extract_onset_ticks(smf: &Smf) -> Vec<u64> {
    let mut ticks = Vec::new();
    for track in &smf.tracks {
        let mut current_tick: u64 = 0;
        for event in track {
            current_tick += event.delta.as_int() as u64;
            // vel=0 NoteOn is NoteOff
            if let TrackEventKind::Midi {
                message: MidiMessage::NoteOn { vel, .. },
                ..
            } = event.kind
            {
                if vel.as_int() > 0 {
                    ticks.push(current_tick);
                }
            }
        }
    }
    ticks.sort_unstable();
    ticks
}

/// Merge onsets that fall within `window_ms` of the last kept onset.
///
/// Input need not be sorted. The output is strictly increasing.
pub fn collapse_onsets(times: &[f64], window_ms: f64) -> Vec<f64> {
    let mut sorted: Vec<f64> = times.iter().copied().filter(|t| t.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let window = window_ms.max(0.0);
    let mut out: Vec<f64> = Vec::with_capacity(sorted.len());
    for t in sorted {
        match out.last() {
            Some(&last) if t - last <= window => {}
            _ => out.push(t),
        }
    }
    out
}
