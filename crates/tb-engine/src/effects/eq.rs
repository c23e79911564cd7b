//! Post-synthesis EQ.
//!
//! The instrument's EQ filter runs once over the mixed tones, with the
//! cascade's loudness compensation applied as an output gain.

use arrayvec::ArrayVec;
use tb_ir::{FilterSettings, FILTER_MAX_POINTS};

use super::{Effect, EffectTick};
use crate::dynamic_filter::DynamicBiquadFilter;

pub struct Eq {
    filters: ArrayVec<DynamicBiquadFilter, FILTER_MAX_POINTS>,
    gain: f64,
}

impl Eq {
    pub fn new() -> Self {
        Self { filters: ArrayVec::new(), gain: 1.0 }
    }

    fn load(&mut self, settings: &FilterSettings, sample_rate: f64) {
        if self.filters.len() != settings.points.len() {
            self.filters.clear();
            for _ in 0..settings.points.len() {
                self.filters.push(DynamicBiquadFilter::new());
            }
        }
        let mut gain = 1.0;
        for (filter, point) in self.filters.iter_mut().zip(settings.points.iter()) {
            filter.load(&point.to_coefficients(sample_rate, 1.0, 1.0));
            gain *= point.volume_compensation_mult();
        }
        self.gain = gain;
    }
}

impl Default for Eq {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Eq {
    fn clear(&mut self) {
        for filter in self.filters.iter_mut() {
            filter.reset_output();
        }
    }

    fn tick(&mut self, tick: &EffectTick<'_>) {
        self.load(tick.eq_filter, tick.sample_rate);
    }

    fn process(&mut self, left: &mut [f32], _right: &mut [f32]) {
        if self.filters.is_empty() {
            return;
        }
        for sample in left.iter_mut() {
            let mut x = *sample as f64;
            for filter in self.filters.iter_mut() {
                x = filter.process(x);
            }
            *sample = (x * self.gain) as f32;
        }
        for filter in self.filters.iter_mut() {
            filter.sanitize();
        }
    }
}
