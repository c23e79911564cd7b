//! Karplus-Strong picked string.
//!
//! Each unison voice owns a delay line one period long, seeded with the
//! instrument's harmonics wave. Every pass through the loop is damped by a
//! two-tap average and scaled by a sustain-dependent gain.

use crate::tone::{StringVoice, Tone};
use crate::wave_tables::IntegratedWave;

/// Decay time (to -60 dB) of a string with sustain 0.
const MIN_T60_SECONDS: f64 = 0.05;
/// Octaves of decay time added across the sustain range.
const T60_OCTAVES: f64 = 8.0;

/// Loop gain for one pass of a string `period` samples long. `sustain` is
/// `0..=1`.
pub(crate) fn string_loop_gain(sustain: f64, period: f64, sample_rate: f64) -> f64 {
    let t60 = MIN_T60_SECONDS * libm::exp2(sustain.clamp(0.0, 1.0) * T60_OCTAVES);
    libm::pow(10.0, -3.0 * period / (t60 * sample_rate)).clamp(0.0, 1.0)
}

/// Two-tap damping weight for a sustain of `0..=1`. Longer strings stay brighter.
pub(crate) fn string_damping(sustain: f64) -> f64 {
    0.5 * (1.0 - 0.5 * sustain.clamp(0.0, 1.0))
}

/// Fill `voice`'s delay line with one period of `wave`.
pub(crate) fn pluck(tone: &mut Tone, voice: usize, wave: &IntegratedWave, period: f64) {
    let Some(string) = tone.strings.get_mut(voice) else {
        return;
    };
    let period = period.max(2.0);
    let length = libm::ceil(period) as usize;
    string.ensure_length(length + 1);
    string.clear();
    let size = string.buffer.len();
    let mask = size - 1;
    let step = 1.0 / period;
    let mut prev = wave.integral_at(0.0);
    for i in 0..length {
        let integral = wave.integral_at((i + 1) as f64 * step);
        let value = wave.average(prev, integral, step);
        prev = integral;
        string.buffer[(size - length + i) & mask] = value as f32;
    }
}

#[inline]
fn string_sample(string: &mut StringVoice, period: f64) -> f64 {
    let size = string.buffer.len();
    if size < 4 {
        return 0.0;
    }
    let mask = size - 1;
    // The averaging tap delays the loop by `damping` samples.
    let period = (period - string.damping).clamp(1.0, (size - 2) as f64);
    let read = string.write as f64 + size as f64 - period;
    let base = libm::floor(read);
    let frac = read - base;
    let i0 = (base as usize) & mask;
    let i1 = (i0 + 1) & mask;
    let delayed = string.buffer[i0] as f64 + (string.buffer[i1] as f64 - string.buffer[i0] as f64) * frac;
    let damped = delayed * (1.0 - string.damping) + string.last * string.damping;
    string.last = delayed;
    string.buffer[string.write] = (damped * string.loss) as f32;
    string.write = (string.write + 1) & mask;
    string.loss = (string.loss + string.loss_delta).clamp(0.0, 1.0);
    delayed
}

pub(crate) fn render_picked_string(tone: &mut Tone, out: &mut [f32]) {
    let voices = tone.voices.min(2);
    for sample in out.iter_mut() {
        let mut value = 0.0;
        for v in 0..voices {
            let delta = tone.phase_deltas[v];
            let period = if delta > 0.0 { 1.0 / delta } else { 2.0 };
            value += string_sample(&mut tone.strings[v], period) * tone.voice_signs[v];
        }
        tone.scale_phase_deltas(voices);
        *sample += tone.finish_sample(value);
    }
}
