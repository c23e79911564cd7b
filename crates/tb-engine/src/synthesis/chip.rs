//! Single-cycle wave oscillators: chip, custom chip and harmonics.

use crate::tone::Tone;
use crate::wave_tables::IntegratedWave;

/// Play `wave` on every unison voice, reading the running integral so each
/// output sample is the wave's average over the phase step.
pub(crate) fn render_integrated(tone: &mut Tone, wave: &IntegratedWave, out: &mut [f32]) {
    let voices = tone.voices.min(2);
    for sample in out.iter_mut() {
        let mut value = 0.0;
        for v in 0..voices {
            let delta = tone.phase_deltas[v];
            let phase = tone.phases[v] + delta;
            let integral = wave.integral_at(phase);
            value += wave.average(tone.integrals[v], integral, delta) * tone.voice_signs[v];
            tone.phases[v] = phase;
            tone.integrals[v] = integral;
        }
        tone.scale_phase_deltas(voices);
        *sample += tone.finish_sample(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tb_ir::config::ChipWave;

    fn square_tone(delta: f64) -> (Tone, IntegratedWave) {
        let mut tone = Tone::new();
        tone.voices = 1;
        tone.phase_deltas[0] = delta;
        tone.expression = 1.0;
        (tone, IntegratedWave::new(ChipWave::Square.samples(), false))
    }

    #[test]
    fn square_plays_both_levels() {
        let (mut tone, wave) = square_tone(1.0 / 100.0);
        let mut out = vec![0.0f32; 100];
        render_integrated(&mut tone, &wave, &mut out);
        assert!(out[10] > 0.0);
        assert!(out[60] < 0.0);
        assert!((out[10] + out[60]).abs() < 1e-6);
    }

    #[test]
    fn output_is_added_to_buffer() {
        let (mut tone, wave) = square_tone(1.0 / 100.0);
        let mut out = vec![1.0f32; 20];
        render_integrated(&mut tone, &wave, &mut out);
        assert!(out[10] > 1.0);
    }

    #[test]
    fn phase_is_continuous_across_calls() {
        let (mut a, wave) = square_tone(1.0 / 37.0);
        let mut whole = vec![0.0f32; 64];
        render_integrated(&mut a, &wave, &mut whole);

        let (mut b, _) = square_tone(1.0 / 37.0);
        let mut split = vec![0.0f32; 64];
        let (first, second) = split.split_at_mut(25);
        render_integrated(&mut b, &wave, first);
        render_integrated(&mut b, &wave, second);
        for (x, y) in whole.iter().zip(split.iter()) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn inverted_second_voice_cancels() {
        let (mut tone, wave) = square_tone(1.0 / 50.0);
        tone.voices = 2;
        tone.phase_deltas[1] = 1.0 / 50.0;
        tone.voice_signs[1] = -1.0;
        let mut out = vec![0.0f32; 50];
        render_integrated(&mut tone, &wave, &mut out);
        assert!(out.iter().all(|s| s.abs() < 1e-6));
    }
}
