//! Per-sample oscillators, one module per instrument family.
//!
//! Every renderer adds into `out`, which holds one tick (or the part of it
//! left in the block) of the instrument's mono buffer. Parameters for the
//! tick have already been loaded into the [`Tone`] as start values plus
//! per-sample deltas.

mod chip;
mod fm;
mod noise;
mod picked_string;
mod pulse;

pub(crate) use chip::render_integrated;
pub(crate) use fm::{render_fm, FEEDBACK_DEPTH, MODULATOR_DEPTH};
pub(crate) use noise::{noise_table_delta, render_noise, spectrum_table_delta};
pub(crate) use picked_string::{pluck, render_picked_string, string_damping, string_loop_gain};
pub(crate) use pulse::{render_pwm, render_supersaw, SUPERSAW_DETUNES};

use tb_ir::config::{ALGORITHMS, ALGORITHMS_6OP, FEEDBACKS, FEEDBACKS_6OP};
use tb_ir::InstrumentKind;

use crate::tone::Tone;
use crate::wave_tables::{InstrumentWaves, WaveTables};

/// Render one stretch of `tone` into `out`.
pub(crate) fn render_tone(
    tone: &mut Tone,
    kind: &InstrumentKind,
    waves: &InstrumentWaves,
    tables: &WaveTables,
    out: &mut [f32],
) {
    match kind {
        InstrumentKind::Chip { wave } => render_integrated(tone, tables.chip(*wave), out),
        InstrumentKind::CustomChipWave { .. } | InstrumentKind::Harmonics { .. } => {
            if let Some(wave) = waves.integrated() {
                render_integrated(tone, wave, out);
            }
        }
        InstrumentKind::Fm { algorithm, feedback_type, .. } => {
            let algorithm = &ALGORITHMS[(*algorithm).min(ALGORITHMS.len() - 1)];
            let feedback = &FEEDBACKS[(*feedback_type).min(FEEDBACKS.len() - 1)];
            render_fm(tone, algorithm, feedback, kind.operator_count(), tables, out);
        }
        InstrumentKind::Fm6Op { algorithm, feedback_type, .. } => {
            let algorithm = &ALGORITHMS_6OP[(*algorithm).min(ALGORITHMS_6OP.len() - 1)];
            let feedback = &FEEDBACKS_6OP[(*feedback_type).min(FEEDBACKS_6OP.len() - 1)];
            render_fm(tone, algorithm, feedback, kind.operator_count(), tables, out);
        }
        InstrumentKind::Noise { wave } => render_noise(tone, tables.noise(*wave), wave.is_soft(), out),
        InstrumentKind::Spectrum { .. } => {
            if let Some(table) = waves.spectrum() {
                render_noise(tone, table, true, out);
            }
        }
        InstrumentKind::Drumset { .. } => {
            if let Some(table) = waves.drum(tone.drum) {
                render_noise(tone, table, true, out);
            }
        }
        InstrumentKind::Pwm { .. } => render_pwm(tone, out),
        InstrumentKind::Supersaw { .. } => render_supersaw(tone, out),
        InstrumentKind::PickedString { .. } => render_picked_string(tone, out),
        // Mod instruments never own tones.
        InstrumentKind::Mod { .. } => {}
    }
    tone.wrap_phases();
    tone.sanitize_filters();
}

/// Antiderivative of the naive sawtooth `2p - 1` over one cycle.
#[inline]
pub(crate) fn saw_integral(phase: f64) -> f64 {
    let p = phase - libm::floor(phase);
    p * p - p
}

/// Average of the sawtooth between `phase` and `phase + delta`.
#[inline]
pub(crate) fn band_limited_saw(phase: f64, delta: f64) -> f64 {
    if delta <= 1e-12 {
        return 2.0 * (phase - libm::floor(phase)) - 1.0;
    }
    // The saw has no DC, so the wrapped integral needs no per-cycle correction.
    (saw_integral(phase + delta) - saw_integral(phase)) / delta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saw_integral_is_periodic() {
        assert!((saw_integral(0.0) - saw_integral(1.0)).abs() < 1e-12);
        assert!((saw_integral(0.3) - saw_integral(2.3)).abs() < 1e-12);
    }

    #[test]
    fn band_limited_saw_matches_naive_for_small_steps() {
        for phase in [0.1, 0.4, 0.8] {
            let naive = 2.0 * phase - 1.0;
            let smooth = band_limited_saw(phase, 1e-6);
            assert!((smooth - naive).abs() < 1e-3, "{phase}: {smooth} vs {naive}");
        }
    }

    #[test]
    fn band_limited_saw_averages_across_the_reset() {
        // A step straddling the wrap sees both the top and the bottom of the ramp.
        let value = band_limited_saw(0.95, 0.1);
        assert!(value.abs() < 0.2, "{value}");
    }
}
