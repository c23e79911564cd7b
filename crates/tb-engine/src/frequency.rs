//! Pitch-to-frequency conversion for oscillator playback.
//!
//! Pitches are fractional semitones with pitch 69 at 440 Hz. Oscillators
//! advance a phase measured in cycles, so a tone's per-sample step is its
//! frequency divided by the output sample rate.

/// Pitch of the A above middle C.
pub const REFERENCE_PITCH: f64 = 69.0;

/// Frequency of [`REFERENCE_PITCH`] in Hz.
pub const REFERENCE_HZ: f64 = 440.0;

/// Frequency in Hz of a fractional pitch.
pub fn pitch_to_hz(pitch: f64) -> f64 {
    REFERENCE_HZ * libm::pow(2.0, (pitch - REFERENCE_PITCH) / 12.0)
}

/// Fractional pitch of a frequency in Hz.
pub fn hz_to_pitch(hz: f64) -> f64 {
    REFERENCE_PITCH + 12.0 * libm::log2(hz / REFERENCE_HZ)
}

/// Frequency ratio of an interval in semitones.
pub fn semitones_to_ratio(semitones: f64) -> f64 {
    libm::pow(2.0, semitones / 12.0)
}

/// Phase advance per sample, in cycles, for a frequency.
pub fn phase_delta(hz: f64, sample_rate: f64) -> f64 {
    if sample_rate <= 0.0 {
        return 0.0;
    }
    hz / sample_rate
}

/// Per-sample multiplier that moves a phase delta from `start` to `end`
/// over `samples` samples.
pub fn delta_scale(start: f64, end: f64, samples: usize) -> f64 {
    if samples == 0 || start <= 0.0 || end <= 0.0 {
        return 1.0;
    }
    libm::pow(end / start, 1.0 / samples as f64)
}
