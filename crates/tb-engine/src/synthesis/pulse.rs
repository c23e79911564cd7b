//! Band-limited pulse and supersaw oscillators.
//!
//! A pulse of width `w` is a sawtooth minus the same sawtooth shifted by
//! `w` cycles. Both saws are read through their integral, so the result is
//! anti-aliased the same way the chip tables are.

use tb_ir::config::SUPERSAW_VOICE_COUNT;

use super::band_limited_saw;
use crate::tone::Tone;

/// Relative detune of each supersaw voice; multiplied by the spread in
/// semitones. Voice 0 is the undetuned center.
pub(crate) const SUPERSAW_DETUNES: [f64; SUPERSAW_VOICE_COUNT] = [0.0, -1.0, 1.0, -0.62, 0.62, -0.25, 0.25];

#[inline]
fn pulse(phase: f64, delta: f64, width: f64) -> f64 {
    0.5 * (band_limited_saw(phase, delta) - band_limited_saw(phase + width, delta))
}

pub(crate) fn render_pwm(tone: &mut Tone, out: &mut [f32]) {
    let voices = tone.voices.min(2);
    for sample in out.iter_mut() {
        let mut value = 0.0;
        for v in 0..voices {
            let delta = tone.phase_deltas[v];
            value += pulse(tone.phases[v], delta, tone.pulse_width) * tone.voice_signs[v];
            tone.phases[v] += delta;
        }
        tone.pulse_width += tone.pulse_width_delta;
        tone.scale_phase_deltas(voices);
        *sample += tone.finish_sample(value);
    }
}

pub(crate) fn render_supersaw(tone: &mut Tone, out: &mut [f32]) {
    for sample in out.iter_mut() {
        let dynamism = tone.supersaw_dynamism;
        let mut saw = 0.0;
        let mut shifted = 0.0;
        for v in 0..SUPERSAW_VOICE_COUNT {
            let amplitude = if v == 0 { 1.0 } else { dynamism };
            let delta = tone.phase_deltas[v];
            let phase = tone.phases[v];
            saw += band_limited_saw(phase, delta) * amplitude;
            shifted += band_limited_saw(phase + tone.pulse_width, delta) * amplitude;
            tone.phases[v] = phase + delta;
        }
        let value = (saw - shifted * tone.supersaw_shape) / libm::sqrt(1.0 + dynamism * dynamism * 6.0);
        tone.supersaw_dynamism += tone.supersaw_dynamism_delta;
        tone.supersaw_shape += tone.supersaw_shape_delta;
        tone.pulse_width += tone.pulse_width_delta;
        tone.scale_phase_deltas(SUPERSAW_VOICE_COUNT);
        *sample += tone.finish_sample(value);
    }
}
