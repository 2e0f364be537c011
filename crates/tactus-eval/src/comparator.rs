//! Harmonic tempo correctness.
//!
//! Trackers often lock onto double time, half time, or a triplet level of the
//! true pulse. Those answers count as correct: what matters is how far the
//! larger tempo sits from an integer multiple of the smaller one.

use crate::Error;

/// Default tolerance in BPM.
pub const DEFAULT_TOLERANCE: f64 = 1.5;

/// Distance in BPM from the larger tempo to the nearest integer multiple of
/// the smaller one. Symmetric in its arguments.
pub fn harmonic_distance(candidate_bpm: f64, reference_bpm: f64) -> Result<f64, Error> {
    for value in [candidate_bpm, reference_bpm] {
        if !(value.is_finite() && value > 0.0) {
            return Err(Error::Domain { value });
        }
    }
    let lo = candidate_bpm.min(reference_bpm);
    let hi = candidate_bpm.max(reference_bpm);
    let remainder = hi % lo;
    Ok((lo - remainder).min(remainder))
}

/// Whether `candidate_bpm` names the same pulse as `reference_bpm`, up to
/// harmonic multiples, within `tolerance` BPM.
pub fn is_correct(candidate_bpm: f64, reference_bpm: f64, tolerance: f64) -> Result<bool, Error> {
    Ok(harmonic_distance(candidate_bpm, reference_bpm)? < tolerance)
}
