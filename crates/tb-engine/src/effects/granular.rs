//! Granular resynthesis.
//!
//! Incoming audio is recorded into a ring buffer. A fixed set of grains
//! each replay a window of the recent past under a parabolic envelope, and
//! every grain picks a fresh random offset when it restarts.

use arrayvec::ArrayVec;
use tb_ir::config::{GRAIN_RANGE_MAX, GRAIN_SIZE_MAX, GRAIN_SIZE_MIN, MAX_GRAIN_COUNT};

use super::{Effect, EffectTick};
use crate::wave_tables::TableRng;

const BUFFER_SIZE: usize = 8192;
const BUFFER_MASK: usize = BUFFER_SIZE - 1;
/// Average of the parabolic window; normalizes overlapping grains.
const WINDOW_MEAN: f64 = 2.0 / 3.0;

#[derive(Clone, Copy, Debug, Default)]
struct Grain {
    /// Samples behind the write head.
    offset: usize,
    age: usize,
    length: usize,
}

impl Grain {
    #[inline]
    fn envelope(&self) -> f64 {
        let t = self.age as f64 / self.length.max(1) as f64;
        4.0 * t * (1.0 - t)
    }
}

pub struct Granular {
    buffer: [f32; BUFFER_SIZE],
    write: usize,
    grains: ArrayVec<Grain, MAX_GRAIN_COUNT>,
    grain_size: usize,
    grain_range: usize,
    mix: f64,
    mix_delta: f64,
    rng: TableRng,
}

impl Granular {
    pub fn new() -> Self {
        Self {
            buffer: [0.0; BUFFER_SIZE],
            write: 0,
            grains: ArrayVec::new(),
            grain_size: GRAIN_SIZE_MIN as usize,
            grain_range: 0,
            mix: 0.0,
            mix_delta: 0.0,
            rng: TableRng::new(0x6772_6169),
        }
    }

    fn restart(&mut self, index: usize) {
        let jitter = if self.grain_range == 0 { 0 } else { (self.rng.next_u32() as usize) % (self.grain_range + 1) };
        let length = self.grain_size;
        if let Some(grain) = self.grains.get_mut(index) {
            *grain = Grain { offset: length + jitter, age: 0, length };
        }
    }

    /// Stagger the grains evenly across one grain length.
    fn spawn_grains(&mut self) {
        self.grains.clear();
        let length = self.grain_size;
        for i in 0..MAX_GRAIN_COUNT {
            self.grains.push(Grain { offset: length, age: i * length / MAX_GRAIN_COUNT, length });
        }
    }
}

impl Default for Granular {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Granular {
    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write = 0;
        self.grains.clear();
    }

    fn tick(&mut self, tick: &EffectTick<'_>) {
        self.grain_size = tick.params.grain_size.clamp(GRAIN_SIZE_MIN, GRAIN_SIZE_MAX) as usize;
        self.grain_range = tick.params.grain_range.min(GRAIN_RANGE_MAX) as usize;
        if self.grains.is_empty() {
            self.spawn_grains();
        }
        self.mix = tick.levels.granular.start;
        self.mix_delta = tick.levels.granular.delta(tick.run_length);
    }

    fn process(&mut self, left: &mut [f32], _right: &mut [f32]) {
        let norm = 1.0 / (MAX_GRAIN_COUNT as f64 * WINDOW_MEAN);
        for sample in left.iter_mut() {
            let dry = *sample as f64;
            self.buffer[self.write] = *sample;
            let mut wet = 0.0;
            for i in 0..self.grains.len() {
                let grain = self.grains[i];
                let read = (self.write + BUFFER_SIZE - grain.offset.min(BUFFER_SIZE - 1)) & BUFFER_MASK;
                wet += self.buffer[read] as f64 * grain.envelope();
                self.grains[i].age += 1;
                if self.grains[i].age >= grain.length {
                    self.restart(i);
                }
            }
            self.write = (self.write + 1) & BUFFER_MASK;
            *sample = (dry + (wet * norm - dry) * self.mix) as f32;
            self.mix += self.mix_delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{test_tick, EffectLevels, Ramp};
    use tb_ir::{EffectParams, FilterSettings};

    fn init_granular(mix: f64, grain_range: u32) -> Granular {
        let params = EffectParams { grain_size: 400, grain_range, ..Default::default() };
        let eq = FilterSettings::new();
        let levels = EffectLevels { granular: Ramp::flat(mix), ..Default::default() };
        let mut g = Granular::new();
        g.tick(&test_tick(&params, &eq, levels));
        g
    }

    #[test]
    fn grains_cover_the_window() {
        let g = init_granular(1.0, 0);
        assert_eq!(g.grains.len(), MAX_GRAIN_COUNT);
        assert!(g.grains.iter().all(|grain| grain.length == 400));
    }

    #[test]
    fn wet_signal_follows_steady_input() {
        let mut g = init_granular(1.0, 200);
        let mut left = vec![0.5f32; 4000];
        let mut right = vec![0.0f32; 4000];
        g.process(&mut left, &mut right);
        // Once the buffer is full, overlapping grains reproduce the level.
        let tail: f32 = left[3000..].iter().sum::<f32>() / 1000.0;
        assert!((tail - 0.5).abs() < 0.1, "{tail}");
        assert!(left.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn zero_mix_is_dry() {
        let mut g = init_granular(0.0, 100);
        let mut left = [0.25f32; 64];
        let mut right = [0.0f32; 64];
        g.process(&mut left, &mut right);
        assert!(left.iter().all(|&s| s == 0.25));
    }
}
