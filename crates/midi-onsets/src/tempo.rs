use midly::{MetaMessage, Smf, Timing, TrackEventKind};
use serde::{Deserialize, Serialize};

/// Tempo assumed by the MIDI standard when a file carries no tempo event.
pub const DEFAULT_BPM: f64 = 120.0;

const DEFAULT_USEC_PER_BEAT: u32 = 500_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoChange {
    pub tick: u64,
    pub microseconds_per_beat: u32,
    pub bpm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
enum Clock {
    /// Ticks per quarter note; wall time depends on the tempo map.
    Metrical(u16),
    /// SMPTE timing: fixed milliseconds per tick.
    Timecode { ms_per_tick: f64 },
}

/// Tick-to-millisecond conversion for a whole file.
///
/// Tempo events from every track are merged, since format 1 files keep the
/// tempo map in track 0 while notes live elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempoMap {
    clock: Clock,
    changes: Vec<TempoChange>,
}

impl TempoMap {
    pub fn from_smf(smf: &Smf) -> Self {
        let clock = match smf.header.timing {
            Timing::Metrical(ticks) => Clock::Metrical(ticks.as_int().max(1)),
            Timing::Timecode(fps, subframes) => {
                let ticks_per_second = fps.as_f32() as f64 * subframes.max(1) as f64;
                Clock::Timecode {
                    ms_per_tick: 1000.0 / ticks_per_second,
                }
            }
        };

        let mut changes = Vec::new();
        for track in &smf.tracks {
            let mut tick: u64 = 0;
            for event in track {
                tick += event.delta.as_int() as u64;
                if let TrackEventKind::Meta(MetaMessage::Tempo(tempo)) = event.kind {
                    let usec = tempo.as_int().max(1);
                    changes.push(TempoChange {
                        tick,
                        microseconds_per_beat: usec,
                        bpm: 60_000_000.0 / usec as f64,
                    });
                }
            }
        }
        // Stable sort keeps the later event of two at the same tick last.
        changes.sort_by_key(|c| c.tick);

        Self { clock, changes }
    }

    /// Ticks per quarter note, or 0 for SMPTE-timed files.
    pub fn ppq(&self) -> u16 {
        match self.clock {
            Clock::Metrical(ppq) => ppq,
            Clock::Timecode { .. } => 0,
        }
    }

    pub fn changes(&self) -> &[TempoChange] {
        &self.changes
    }

    /// The file's notated tempo: its first tempo event, or 120 BPM.
    pub fn initial_bpm(&self) -> f64 {
        self.changes.first().map(|c| c.bpm).unwrap_or(DEFAULT_BPM)
    }

    pub fn tick_to_ms(&self, tick: u64) -> f64 {
        let ppq = match self.clock {
            Clock::Timecode { ms_per_tick } => return tick as f64 * ms_per_tick,
            Clock::Metrical(ppq) => ppq as f64,
        };

        let mut elapsed_ms = 0.0;
        let mut last_tick = 0u64;
        let mut usec = DEFAULT_USEC_PER_BEAT;
        for change in &self.changes {
            if change.tick >= tick {
                break;
            }
            elapsed_ms += segment_ms(change.tick - last_tick, usec, ppq);
            last_tick = change.tick;
            usec = change.microseconds_per_beat;
        }
        elapsed_ms + segment_ms(tick - last_tick, usec, ppq)
    }
}

fn segment_ms(ticks: u64, usec_per_beat: u32, ppq: f64) -> f64 {
    ticks as f64 * usec_per_beat as f64 / ppq / 1000.0
}
