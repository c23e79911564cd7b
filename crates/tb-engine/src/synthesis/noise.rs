//! Looped noise and spectrum tables.
//!
//! Noise, spectrum and drumset instruments all play a long table at a
//! pitch-dependent rate. Phase is kept in table cycles so it wraps like
//! every other oscillator phase.

use crate::tone::Tone;
use crate::wave_tables::SPECTRUM_FUNDAMENTAL_BIN;

/// Output rate at which a noise table at its base pitch advances one table
/// sample per output sample.
pub(crate) const NOISE_REFERENCE_RATE: f64 = 44100.0;

/// Table cycles per output sample for a noise table of `table_len`
/// samples played at `pitch` (base pitch `base_pitch`).
pub(crate) fn noise_table_delta(pitch: f64, base_pitch: i32, table_len: usize, sample_rate: f64) -> f64 {
    if table_len == 0 || sample_rate <= 0.0 {
        return 0.0;
    }
    let rate = libm::exp2((pitch - base_pitch as f64) / 12.0) * NOISE_REFERENCE_RATE / sample_rate;
    rate / table_len as f64
}

/// Table cycles per output sample so the spectrum's fundamental bin sounds
/// at `hz`.
pub(crate) fn spectrum_table_delta(hz: f64, sample_rate: f64) -> f64 {
    if sample_rate <= 0.0 {
        return 0.0;
    }
    hz / sample_rate / SPECTRUM_FUNDAMENTAL_BIN as f64
}

pub(crate) fn render_noise(tone: &mut Tone, table: &[f32], soft: bool, out: &mut [f32]) {
    let len = table.len();
    if len == 0 {
        return;
    }
    for sample in out.iter_mut() {
        let phase = tone.phases[0] - libm::floor(tone.phases[0]);
        let x = phase * len as f64;
        let i = (x as usize).min(len - 1);
        let value = if soft {
            let a = table[i] as f64;
            let b = table[(i + 1) % len] as f64;
            a + (b - a) * (x - i as f64)
        } else {
            table[i] as f64
        };
        tone.noise_sample += (value - tone.noise_sample) * tone.noise_filter;
        tone.phases[0] += tone.phase_deltas[0];
        tone.scale_phase_deltas(1);
        let filtered = tone.noise_sample;
        *sample += tone.finish_sample(filtered);
    }
}
