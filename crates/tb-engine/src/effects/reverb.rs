//! Four-line feedback delay network reverb.
//!
//! One shared buffer holds four delay lines at fixed offsets. Their outputs
//! are mixed through a 4x4 Hadamard-style matrix, darkened by a high shelf
//! and written back, which keeps the loop lossless apart from the shelf and
//! the reverb amount.

use alloc::vec;
use alloc::vec::Vec;

use tb_ir::config::{REVERB_DELAY_BUFFER_SIZE, REVERB_SHELF_GAIN, REVERB_SHELF_HZ};
use tb_ir::{hz_to_radians, FilterCoefficients};

use super::{Effect, EffectTick};

const MASK: usize = REVERB_DELAY_BUFFER_SIZE - 1;
const TAP_OFFSETS: [usize; 4] = [0, 3041, 6426, 10907];
/// Loop gain at full reverb.
const LOOP_GAIN_MAX: f64 = 0.425;

/// Loop gain for a reverb level of `0..=1`.
pub(crate) fn reverb_gain(level: f64) -> f64 {
    libm::pow(level.clamp(0.0, 1.0), 0.667) * LOOP_GAIN_MAX
}

pub struct Reverb {
    line: Vec<f32>,
    position: usize,
    shelf_b0: f64,
    shelf_b1: f64,
    shelf_a1: f64,
    shelf_inputs: [f64; 4],
    shelf_outputs: [f64; 4],
    gain: f64,
    gain_delta: f64,
}

impl Reverb {
    pub fn new() -> Self {
        Self {
            line: vec![0.0; REVERB_DELAY_BUFFER_SIZE],
            position: 0,
            shelf_b0: 1.0,
            shelf_b1: 0.0,
            shelf_a1: 0.0,
            shelf_inputs: [0.0; 4],
            shelf_outputs: [0.0; 4],
            gain: 0.0,
            gain_delta: 0.0,
        }
    }
}

impl Default for Reverb {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Reverb {
    fn clear(&mut self) {
        self.line.fill(0.0);
        self.shelf_inputs = [0.0; 4];
        self.shelf_outputs = [0.0; 4];
    }

    fn tick(&mut self, tick: &EffectTick<'_>) {
        let shelf = FilterCoefficients::high_shelf_1st_order(
            hz_to_radians(REVERB_SHELF_HZ, tick.sample_rate),
            REVERB_SHELF_GAIN,
        );
        self.shelf_b0 = shelf.b[0];
        self.shelf_b1 = shelf.b[1];
        self.shelf_a1 = shelf.a[1];
        let level = tick.levels.reverb;
        let start = reverb_gain(level.start);
        self.gain = start;
        self.gain_delta = (reverb_gain(level.end) - start) / tick.run_length.max(1) as f64;
    }

    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let taps = TAP_OFFSETS.map(|offset| (self.position + offset) & MASK);
            let s = taps.map(|i| self.line[i] as f64);
            let input_l = *l as f64;
            let input_r = *r as f64;

            let t0 = -(s[0] + input_l) + s[1];
            let t1 = -(s[0] + input_r) - s[1];
            let t2 = -s[2] + s[3];
            let t3 = -s[2] - s[3];
            let mixed = [t0 + t2, t1 + t3, t0 - t2, t1 - t3];

            for k in 0..4 {
                let x = mixed[k] * self.gain;
                let y = self.shelf_b0 * x + self.shelf_b1 * self.shelf_inputs[k] - self.shelf_a1 * self.shelf_outputs[k];
                self.shelf_inputs[k] = x;
                self.shelf_outputs[k] = y;
                self.line[taps[k]] = y as f32;
            }

            *l = (input_l + s[1] + s[2] + s[3]) as f32;
            *r = (input_r + s[0] + s[2] - s[3]) as f32;
            self.position = (self.position + 1) & MASK;
            self.gain += self.gain_delta;
        }
        for v in self.shelf_inputs.iter_mut().chain(self.shelf_outputs.iter_mut()) {
            if !v.is_finite() || libm::fabs(*v) < 1e-24 {
                *v = 0.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{test_tick, EffectLevels, Ramp};
    use tb_ir::{EffectParams, FilterSettings};

    fn init_reverb(level: f64) -> Reverb {
        let params = EffectParams::default();
        let eq = FilterSettings::new();
        let levels = EffectLevels { reverb: Ramp::flat(level), ..Default::default() };
        let mut r = Reverb::new();
        r.tick(&test_tick(&params, &eq, levels));
        r
    }

    fn energy(samples: &[f32]) -> f32 {
        samples.iter().map(|s| s * s).sum()
    }

    #[test]
    fn zero_level_is_dry() {
        let mut r = init_reverb(0.0);
        let mut left = vec![0.0f32; 20000];
        let mut right = vec![0.0f32; 20000];
        left[0] = 1.0;
        r.process(&mut left, &mut right);
        assert_eq!(left[0], 1.0);
        assert!(left[1..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn impulse_leaves_a_decaying_tail() {
        let mut r = init_reverb(1.0);
        let mut left = vec![0.0f32; 88200];
        let mut right = vec![0.0f32; 88200];
        left[0] = 1.0;
        r.process(&mut left, &mut right);
        let early = energy(&left[1..20000]) + energy(&right[1..20000]);
        let late = energy(&left[68200..]) + energy(&right[68200..]);
        assert!(early > 0.0);
        assert!(late < early);
        assert!(left.iter().chain(right.iter()).all(|s| s.is_finite()));
    }
}
