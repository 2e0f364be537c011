//! Minimal Standard MIDI File writer for click tracks.
//!
//! Used to build fixtures: a tempo track followed by note tracks whose
//! notes are one sixteenth long.

/// Build a format 1 file with a single tempo event and one note per onset.
pub fn metronome_midi(ppq: u16, microseconds_per_beat: u32, onset_ticks: &[u64]) -> Vec<u8> {
    build_midi_file(
        ppq,
        &[tempo_track(microseconds_per_beat), note_track(onset_ticks)],
    )
}

pub(crate) fn tempo_track(usec: u32) -> Vec<u8> {
    let mut track_data = Vec::new();
    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[
        0xFF,
        0x51,
        0x03,
        (usec >> 16) as u8,
        (usec >> 8) as u8,
        usec as u8,
    ]);
    end_of_track(&mut track_data);
    track_data
}

pub(crate) fn note_track(onset_ticks: &[u64]) -> Vec<u8> {
    let mut events: Vec<(u64, [u8; 3])> = Vec::new();
    for &tick in onset_ticks {
        events.push((tick, [0x90, 60, 100]));
        events.push((tick + 120, [0x80, 60, 0]));
    }
    // Note-offs before note-ons at the same tick
    events.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1[0].cmp(&b.1[0])));

    let mut track_data = Vec::new();
    let mut last_tick = 0u64;
    for (tick, data) in events {
        write_vlq(&mut track_data, (tick - last_tick) as u32);
        track_data.extend_from_slice(&data);
        last_tick = tick;
    }
    end_of_track(&mut track_data);
    track_data
}

pub(crate) fn build_midi_file(ppq: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();

    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes()); // format 1
    buf.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    buf.extend_from_slice(&ppq.to_be_bytes());

    for track_data in tracks {
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
        buf.extend_from_slice(track_data);
    }

    buf
}

fn end_of_track(buf: &mut Vec<u8>) {
    write_vlq(buf, 0);
    buf.extend_from_slice(&[0xFF, 0x2F, 0x00]);
}

fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    bytes.reverse();
    buf.extend_from_slice(&bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vlq_encoding() {
        let mut buf = Vec::new();
        write_vlq(&mut buf, 0);
        assert_eq!(buf, vec![0x00]);

        buf.clear();
        write_vlq(&mut buf, 128);
        assert_eq!(buf, vec![0x81, 0x00]);

        buf.clear();
        write_vlq(&mut buf, 480);
        assert_eq!(buf, vec![0x83, 0x60]);
    }

    #[test]
    fn metronome_parses_with_midly() {
        let bytes = metronome_midi(480, 500_000, &[0, 480]);
        let smf = midly::Smf::parse(&bytes).expect("generated MIDI should be valid");
        assert_eq!(smf.header.format, midly::Format::Parallel);
        assert_eq!(smf.tracks.len(), 2);
    }
}
