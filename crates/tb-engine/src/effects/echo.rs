//! Tempo-synced feedback echo.
//!
//! The delay is a whole number of ticks, so it follows the song tempo. Each
//! repeat passes through a high shelf and loses some brightness.

use alloc::vec;
use alloc::vec::Vec;

use tb_ir::config::{ECHO_DELAY_RANGE, ECHO_DELAY_STEP_TICKS, ECHO_SHELF_GAIN, ECHO_SHELF_HZ, TEMPO_MIN};
use tb_ir::{hz_to_radians, samples_per_tick, FilterCoefficients};

use super::{Effect, EffectTick};
use crate::dynamic_filter::DynamicBiquadFilter;

/// Feedback gain at full sustain.
const FEEDBACK_MAX: f64 = 0.9;

pub(crate) fn delay_ticks(echo_delay: u8) -> f64 {
    (f64::from(echo_delay.min(ECHO_DELAY_RANGE - 1)) + 1.0) * ECHO_DELAY_STEP_TICKS as f64
}

pub(crate) fn echo_feedback(level: f64) -> f64 {
    libm::pow(level.clamp(0.0, 1.0), 1.1) * FEEDBACK_MAX
}

pub struct Echo {
    lines: [Vec<f32>; 2],
    write: usize,
    shelves: [DynamicBiquadFilter; 2],
    delay: f64,
    delay_delta: f64,
    feedback: f64,
    feedback_delta: f64,
    /// Set once a tick has loaded a delay length.
    primed: bool,
}

impl Echo {
    /// Sized for the longest delay at the slowest tempo.
    pub fn new(sample_rate: f64) -> Self {
        let longest = delay_ticks(ECHO_DELAY_RANGE - 1) * samples_per_tick(sample_rate, TEMPO_MIN);
        let size = libm::ceil(longest) as usize + 2;
        let mut shelves = [DynamicBiquadFilter::new(), DynamicBiquadFilter::new()];
        let shelf = FilterCoefficients::high_shelf_1st_order(hz_to_radians(ECHO_SHELF_HZ, sample_rate), ECHO_SHELF_GAIN);
        for s in shelves.iter_mut() {
            s.load(&shelf);
        }
        Self {
            lines: [vec![0.0; size], vec![0.0; size]],
            write: 0,
            shelves,
            delay: 0.0,
            delay_delta: 0.0,
            feedback: 0.0,
            feedback_delta: 0.0,
            primed: false,
        }
    }

    #[inline]
    fn tap(&self, side: usize, delay: f64) -> f64 {
        let line = &self.lines[side];
        let len = line.len();
        let position = self.write as f64 + len as f64 - delay;
        let base = libm::floor(position);
        let frac = position - base;
        let i0 = (base as usize) % len;
        let i1 = (i0 + 1) % len;
        line[i0] as f64 + (line[i1] as f64 - line[i0] as f64) * frac
    }
}

impl Effect for Echo {
    fn clear(&mut self) {
        for line in self.lines.iter_mut() {
            line.fill(0.0);
        }
        for shelf in self.shelves.iter_mut() {
            shelf.reset_output();
        }
        self.write = 0;
    }

    fn tick(&mut self, tick: &EffectTick<'_>) {
        let len = self.lines[0].len();
        let target = (delay_ticks(tick.params.echo_delay) * tick.samples_per_tick).clamp(1.0, (len - 2) as f64);
        if !self.primed {
            self.delay = target;
            self.primed = true;
        }
        self.delay_delta = (target - self.delay) / tick.run_length.max(1) as f64;
        let sustain = tick.levels.echo_sustain;
        let start = echo_feedback(sustain.start);
        self.feedback = start;
        self.feedback_delta = (echo_feedback(sustain.end) - start) / tick.run_length.max(1) as f64;
    }

    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let len = self.lines[0].len();
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            for (side, sample) in [l, r].into_iter().enumerate() {
                let delayed = self.shelves[side].process(self.tap(side, self.delay));
                let out = *sample as f64 + delayed * self.feedback;
                self.lines[side][self.write] = out as f32;
                *sample = out as f32;
            }
            self.write = (self.write + 1) % len;
            self.delay += self.delay_delta;
            self.feedback += self.feedback_delta;
        }
        for shelf in self.shelves.iter_mut() {
            shelf.sanitize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{test_tick, EffectLevels, Ramp};
    use tb_ir::{EffectParams, FilterSettings};

    fn init_echo(sustain: f64) -> Echo {
        let params = EffectParams { echo_delay: 0, ..Default::default() };
        let eq = FilterSettings::new();
        let levels = EffectLevels { echo_sustain: Ramp::flat(sustain), ..Default::default() };
        let mut e = Echo::new(44100.0);
        e.tick(&test_tick(&params, &eq, levels));
        e
    }

    #[test]
    fn shortest_delay_is_one_step() {
        assert_eq!(delay_ticks(0), ECHO_DELAY_STEP_TICKS as f64);
        assert_eq!(delay_ticks(u8::MAX), (ECHO_DELAY_RANGE as u32 * ECHO_DELAY_STEP_TICKS) as f64);
    }

    #[test]
    fn impulse_repeats_at_the_delay() {
        let mut e = init_echo(1.0);
        // 4 ticks of 100 samples.
        let mut left = vec![0.0f32; 1000];
        let mut right = vec![0.0f32; 1000];
        left[0] = 1.0;
        e.process(&mut left, &mut right);
        assert!(left[1..390].iter().all(|s| s.abs() < 1e-6));
        assert!(left[395..410].iter().any(|s| s.abs() > 0.3));
        let first: f32 = left[395..410].iter().map(|s| s.abs()).sum();
        let second: f32 = left[795..810].iter().map(|s| s.abs()).sum();
        assert!(second < first);
    }

    #[test]
    fn no_sustain_no_repeats() {
        let mut e = init_echo(0.0);
        let mut left = vec![0.0f32; 600];
        let mut right = vec![0.0f32; 600];
        left[0] = 1.0;
        e.process(&mut left, &mut right);
        assert!(left[1..].iter().all(|&s| s == 0.0));
    }
}
