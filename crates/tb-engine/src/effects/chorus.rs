//! Three-tap stereo chorus.
//!
//! Each side keeps its own delay line and reads it at three offsets swept
//! by slow sines with staggered phases. The taps are summed with
//! alternating signs so their combs partly cancel.

use alloc::vec;
use alloc::vec::Vec;
use core::f64::consts::TAU;

use super::{Effect, EffectTick};

const PERIOD_SECONDS: f64 = 2.0;
const DELAY_RANGE_SECONDS: f64 = 0.0034;
const DELAY_OFFSETS: [[f64; 3]; 2] = [[1.51, 2.10, 3.35], [1.47, 2.15, 3.25]];
const PHASE_OFFSETS: [[f64; 3]; 2] = [[0.0, 2.1, 4.2], [3.2, 5.3, 1.0]];
const TAP_SIGNS: [f64; 3] = [1.0, -1.0, 1.0];

pub struct Chorus {
    lines: [Vec<f32>; 2],
    mask: usize,
    write: usize,
    phase: f64,
    phase_delta: f64,
    delay_range: f64,
    mix: f64,
    mix_delta: f64,
}

impl Chorus {
    pub fn new(sample_rate: f64) -> Self {
        let max_offset = DELAY_OFFSETS.iter().flatten().fold(0.0f64, |a, &b| a.max(b));
        let max_delay = libm::ceil(DELAY_RANGE_SECONDS * (1.0 + max_offset) * sample_rate) as usize + 2;
        let size = max_delay.next_power_of_two();
        Self {
            lines: [vec![0.0; size], vec![0.0; size]],
            mask: size - 1,
            write: 0,
            phase: 0.0,
            phase_delta: 0.0,
            delay_range: 0.0,
            mix: 0.0,
            mix_delta: 0.0,
        }
    }

    #[inline]
    fn tap(&self, side: usize, delay: f64) -> f64 {
        let line = &self.lines[side];
        let position = self.write as f64 + line.len() as f64 - delay;
        let base = libm::floor(position);
        let frac = position - base;
        let i0 = (base as usize) & self.mask;
        let i1 = (i0 + 1) & self.mask;
        line[i0] as f64 + (line[i1] as f64 - line[i0] as f64) * frac
    }
}

impl Effect for Chorus {
    fn clear(&mut self) {
        for line in self.lines.iter_mut() {
            line.fill(0.0);
        }
        self.write = 0;
    }

    fn tick(&mut self, tick: &EffectTick<'_>) {
        self.phase_delta = TAU / (PERIOD_SECONDS * tick.sample_rate);
        self.delay_range = DELAY_RANGE_SECONDS * tick.sample_rate;
        self.mix = tick.levels.chorus.start;
        self.mix_delta = tick.levels.chorus.delta(tick.run_length);
    }

    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let limit = (self.mask - 1) as f64;
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            self.lines[0][self.write] = *l;
            self.lines[1][self.write] = *r;
            let combined = 1.0 / libm::sqrt(3.0 * self.mix * self.mix + 1.0);
            for (side, sample) in [l, r].into_iter().enumerate() {
                let mut wet = 0.0;
                for tap in 0..3 {
                    let sweep = 1.0 + libm::sin(self.phase + PHASE_OFFSETS[side][tap]) * 0.5;
                    let delay = (self.delay_range * (DELAY_OFFSETS[side][tap] - 1.0 + sweep)).clamp(1.0, limit);
                    wet += self.tap(side, delay) * TAP_SIGNS[tap];
                }
                *sample = ((*sample as f64 + wet * self.mix) * combined) as f32;
            }
            self.write = (self.write + 1) & self.mask;
            self.phase += self.phase_delta;
            if self.phase > TAU {
                self.phase -= TAU;
            }
            self.mix += self.mix_delta;
        }
    }
}
