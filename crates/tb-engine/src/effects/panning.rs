//! Equal-power panning with an inter-channel delay.
//!
//! The mono input goes into a short delay line; each side reads it back
//! through its own gain and offset, so a panned voice also arrives a little
//! later at the far ear.

use alloc::vec;
use alloc::vec::Vec;
use core::f64::consts::{FRAC_PI_2, SQRT_2};

use tb_ir::config::{PAN_DELAY_MAX, PAN_DELAY_SECONDS_MAX};

use super::{Effect, EffectTick};

/// Left and right gains for a pan of `0..=1`. Center is unity on both sides.
pub(crate) fn pan_gains(pan: f64) -> (f64, f64) {
    let angle = pan.clamp(0.0, 1.0) * FRAC_PI_2;
    (libm::cos(angle) * SQRT_2, libm::sin(angle) * SQRT_2)
}

pub struct Panning {
    line: Vec<f32>,
    mask: usize,
    write: usize,
    gain_l: f64,
    gain_r: f64,
    gain_l_delta: f64,
    gain_r_delta: f64,
    offset_l: f64,
    offset_r: f64,
    offset_l_delta: f64,
    offset_r_delta: f64,
}

impl Panning {
    pub fn new(sample_rate: f64) -> Self {
        let max_delay = libm::ceil(PAN_DELAY_SECONDS_MAX * sample_rate * 2.0) as usize + 2;
        let size = max_delay.next_power_of_two().max(4);
        Self {
            line: vec![0.0; size],
            mask: size - 1,
            write: 0,
            gain_l: 1.0,
            gain_r: 1.0,
            gain_l_delta: 0.0,
            gain_r_delta: 0.0,
            offset_l: 0.0,
            offset_r: 0.0,
            offset_l_delta: 0.0,
            offset_r_delta: 0.0,
        }
    }

    /// Delay of each side in samples for a pan of `0..=1`.
    fn offsets(&self, pan: f64, delay_samples: f64) -> (f64, f64) {
        let signed = pan.clamp(0.0, 1.0) * 2.0 - 1.0;
        let limit = (self.mask - 1) as f64;
        (((1.0 + signed) * delay_samples).min(limit), ((1.0 - signed) * delay_samples).min(limit))
    }

    #[inline]
    fn read(&self, offset: f64) -> f64 {
        let position = self.write as f64 + self.line.len() as f64 - offset;
        let base = libm::floor(position);
        let frac = position - base;
        let i0 = (base as usize) & self.mask;
        let i1 = (i0 + 1) & self.mask;
        let a = self.line[i0] as f64;
        a + (self.line[i1] as f64 - a) * frac
    }
}

impl Effect for Panning {
    fn clear(&mut self) {
        self.line.fill(0.0);
        self.write = 0;
    }

    fn tick(&mut self, tick: &EffectTick<'_>) {
        let pan = tick.levels.pan;
        let samples = tick.run_length.max(1) as f64;
        let (l0, r0) = pan_gains(pan.start);
        let (l1, r1) = pan_gains(pan.end);
        self.gain_l = l0;
        self.gain_r = r0;
        self.gain_l_delta = (l1 - l0) / samples;
        self.gain_r_delta = (r1 - r0) / samples;

        let delay = f64::from(tick.params.pan_delay.min(PAN_DELAY_MAX)) / f64::from(PAN_DELAY_MAX)
            * PAN_DELAY_SECONDS_MAX
            * tick.sample_rate;
        let (ol0, or0) = self.offsets(pan.start, delay);
        let (ol1, or1) = self.offsets(pan.end, delay);
        self.offset_l = ol0;
        self.offset_r = or0;
        self.offset_l_delta = (ol1 - ol0) / samples;
        self.offset_r_delta = (or1 - or0) / samples;
    }

    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            self.line[self.write] = *l;
            let delayed_l = self.read(self.offset_l);
            let delayed_r = self.read(self.offset_r);
            *l = (delayed_l * self.gain_l) as f32;
            *r = (delayed_r * self.gain_r) as f32;
            self.write = (self.write + 1) & self.mask;
            self.gain_l += self.gain_l_delta;
            self.gain_r += self.gain_r_delta;
            self.offset_l += self.offset_l_delta;
            self.offset_r += self.offset_r_delta;
        }
    }
}
