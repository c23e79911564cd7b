//! Sample-rate and bit-depth reduction.
//!
//! The input is resampled by a phase accumulator and held between updates;
//! each held value is rounded to a grid whose step grows with the
//! quantization amount.

use tb_ir::config::{BITCRUSHER_FREQ_RANGE, BITCRUSHER_OCTAVE_STEP};

use super::{Effect, EffectTick};
use crate::frequency::pitch_to_hz;

/// Pitch of the hold rate at the lowest frequency setting.
const BASE_PITCH: f64 = 72.0;
/// Quantization step at full quantization.
const MAX_STEP: f64 = 0.5;

/// Held samples per output sample for a frequency level of `0..=1`; level 0
/// passes the input through.
fn hold_phase_delta(level: f64, sample_rate: f64) -> f64 {
    let octaves = (1.0 - level.clamp(0.0, 1.0)) * (BITCRUSHER_FREQ_RANGE - 1) as f64 * BITCRUSHER_OCTAVE_STEP;
    (pitch_to_hz(BASE_PITCH) * libm::exp2(octaves) / sample_rate).min(1.0)
}

fn quantization_step(level: f64) -> f64 {
    MAX_STEP * libm::exp2(1.0 - libm::exp2((1.0 - level.clamp(0.0, 1.0)) * 3.0))
}

pub struct Bitcrusher {
    phase: f64,
    phase_delta: f64,
    phase_delta_scale: f64,
    step: f64,
    step_scale: f64,
    prev_input: f64,
    held: f64,
}

impl Bitcrusher {
    pub fn new() -> Self {
        Self { phase: 1.0, phase_delta: 1.0, phase_delta_scale: 1.0, step: 0.0, step_scale: 1.0, prev_input: 0.0, held: 0.0 }
    }
}

impl Default for Bitcrusher {
    fn default() -> Self {
        Self::new()
    }
}

fn geometric_step(start: f64, end: f64, samples: usize) -> f64 {
    if samples == 0 || start <= 0.0 || end <= 0.0 {
        1.0
    } else {
        libm::pow(end / start, 1.0 / samples as f64)
    }
}

impl Effect for Bitcrusher {
    fn clear(&mut self) {
        self.phase = 1.0;
        self.prev_input = 0.0;
        self.held = 0.0;
    }

    fn tick(&mut self, tick: &EffectTick<'_>) {
        let freq = tick.levels.bitcrusher_freq;
        let quant = tick.levels.bitcrusher_quantization;
        let delta_start = hold_phase_delta(freq.start, tick.sample_rate);
        let delta_end = hold_phase_delta(freq.end, tick.sample_rate);
        self.phase_delta = delta_start;
        self.phase_delta_scale = geometric_step(delta_start, delta_end, tick.run_length);
        let step_start = quantization_step(quant.start);
        let step_end = quantization_step(quant.end);
        self.step = step_start;
        self.step_scale = geometric_step(step_start, step_end, tick.run_length);
    }

    fn process(&mut self, left: &mut [f32], _right: &mut [f32]) {
        for sample in left.iter_mut() {
            let input = *sample as f64;
            self.phase += self.phase_delta;
            if self.phase >= 1.0 {
                self.phase -= libm::floor(self.phase);
                // Interpolate back to where the update fell between samples.
                let ratio = self.phase / self.phase_delta;
                let lerped = input + (self.prev_input - input) * ratio;
                self.held = libm::round(lerped / self.step) * self.step;
            }
            self.prev_input = input;
            *sample = self.held as f32;
            self.phase_delta *= self.phase_delta_scale;
            self.step *= self.step_scale;
        }
    }
}
