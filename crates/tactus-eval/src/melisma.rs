//! Melisma beat-log (`.nb`) parsing and the baseline tempo derived from it.
//!
//! A log line `Beat <ms> <level>` places a beat at `<ms>` on every metrical
//! level below `<level>`: a level-3 beat is also a level-1 and level-2 beat.
//! The tactus is the third level.

/// Metrical levels tracked in a beat log.
pub const LEVELS: usize = 5;

/// Zero-based index of the tactus level.
pub const TACTUS_LEVEL: usize = 2;

/// Beat times per metrical level, in log order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeatLevels {
    levels: [Vec<f64>; LEVELS],
}

impl BeatLevels {
    /// Parse beat-log lines. Lines that are not beat entries are ignored.
    pub fn parse<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut levels: [Vec<f64>; LEVELS] = Default::default();
        for line in lines {
            if let Some((time, level)) = parse_beat_line(line) {
                for beats in levels.iter_mut().take(level) {
                    beats.push(time);
                }
            }
        }
        Self { levels }
    }

    pub fn level(&self, index: usize) -> &[f64] {
        self.levels.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tactus(&self) -> &[f64] {
        self.level(TACTUS_LEVEL)
    }

    /// Instantaneous tempo between consecutive tactus beats. Repeated or
    /// out-of-order beats carry no tempo and are left out.
    pub fn tactus_bpms(&self) -> Vec<f64> {
        self.tactus()
            .windows(2)
            .map(|w| w[1] - w[0])
            .filter(|&delta| delta > 0.0)
            .map(|delta| 60_000.0 / delta)
            .collect()
    }

    /// Mean tactus tempo, or `None` when fewer than two usable beats exist.
    pub fn baseline_bpm(&self) -> Option<f64> {
        let bpms = self.tactus_bpms();
        if bpms.is_empty() {
            return None;
        }
        Some(bpms.iter().sum::<f64>() / bpms.len() as f64)
    }
}

/// `Beat <digits> <digit>...` → (time, level). Levels above [`LEVELS`] are
/// clamped.
fn parse_beat_line(line: &str) -> Option<(f64, usize)> {
    let rest = line.strip_prefix("Beat")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let mut fields = rest.split_whitespace();
    let time = fields.next()?;
    if time.is_empty() || !time.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let level = fields.next()?.chars().next()?.to_digit(10)? as usize;
    Some((time.parse().ok()?, level.min(LEVELS)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LOG: &str = "\
Note 0 1000 60
Beat     0 4
Beat   250 1
Beat   500 3
Beat   750 1
Beat  1000 4
Beat  1500 3 extra
Beat  x 3
Beat 2000
";

    #[test]
    fn beats_fill_every_level_below_their_own() {
        let beats = BeatLevels::parse(LOG.lines());
        assert_eq!(beats.level(0), &[0.0, 250.0, 500.0, 750.0, 1000.0, 1500.0]);
        assert_eq!(beats.level(2), &[0.0, 500.0, 1000.0, 1500.0]);
        assert_eq!(beats.level(3), &[0.0, 1000.0]);
        assert!(beats.level(4).is_empty());
        assert!(beats.level(9).is_empty());
    }

    #[test]
    fn baseline_is_mean_of_tactus_tempi() {
        let beats = BeatLevels::parse(LOG.lines());
        assert_eq!(beats.tactus_bpms(), vec![120.0, 120.0, 120.0]);
        assert_eq!(beats.baseline_bpm(), Some(120.0));

        let uneven = BeatLevels::parse(["Beat 0 3", "Beat 500 3", "Beat 1500 3"]);
        assert_eq!(uneven.baseline_bpm(), Some(90.0));
    }

    #[test]
    fn single_tactus_beat_has_no_baseline() {
        let beats = BeatLevels::parse(["Beat 0 3", "Beat 500 2"]);
        assert_eq!(beats.baseline_bpm(), None);
    }

    #[test]
    fn repeated_beats_are_ignored() {
        let beats = BeatLevels::parse(["Beat 0 3", "Beat 0 3", "Beat 600 3"]);
        assert_eq!(beats.tactus_bpms(), vec![100.0]);
    }

    #[test]
    fn high_levels_are_clamped() {
        let beats = BeatLevels::parse(["Beat 10 9"]);
        assert_eq!(beats.level(LEVELS - 1), &[10.0]);
    }
}
