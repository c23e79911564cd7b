//! Ring modulation against an internal oscillator.

use core::f64::consts::TAU;

use tb_ir::config::{RING_MOD_MAX_HZ, RING_MOD_MIN_HZ};
use tb_ir::RingModWaveform;

use super::{Effect, EffectTick};

fn carrier_hz(level: f64) -> f64 {
    RING_MOD_MIN_HZ * libm::pow(RING_MOD_MAX_HZ / RING_MOD_MIN_HZ, level.clamp(0.0, 1.0))
}

#[inline]
fn carrier(waveform: RingModWaveform, phase: f64) -> f64 {
    match waveform {
        RingModWaveform::Sine => libm::sin(phase * TAU),
        RingModWaveform::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        RingModWaveform::Triangle => 1.0 - 4.0 * libm::fabs(phase - 0.5),
        RingModWaveform::Sawtooth => 2.0 * phase - 1.0,
    }
}

pub struct RingModulator {
    waveform: RingModWaveform,
    phase: f64,
    phase_delta: f64,
    phase_delta_delta: f64,
    mix: f64,
    mix_delta: f64,
}

impl RingModulator {
    pub fn new() -> Self {
        Self { waveform: RingModWaveform::Sine, phase: 0.0, phase_delta: 0.0, phase_delta_delta: 0.0, mix: 0.0, mix_delta: 0.0 }
    }
}

impl Default for RingModulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for RingModulator {
    fn clear(&mut self) {
        self.phase = 0.0;
    }

    fn tick(&mut self, tick: &EffectTick<'_>) {
        self.waveform = tick.params.ring_mod_waveform;
        let hz = tick.levels.ring_mod_hz;
        let start = carrier_hz(hz.start) / tick.sample_rate;
        let end = carrier_hz(hz.end) / tick.sample_rate;
        let samples = tick.run_length.max(1) as f64;
        self.phase_delta = start;
        self.phase_delta_delta = (end - start) / samples;
        self.mix = tick.levels.ring_mod.start;
        self.mix_delta = tick.levels.ring_mod.delta(tick.run_length);
    }

    fn process(&mut self, left: &mut [f32], _right: &mut [f32]) {
        for sample in left.iter_mut() {
            let dry = *sample as f64;
            let wet = dry * carrier(self.waveform, self.phase);
            *sample = (dry + (wet - dry) * self.mix) as f32;
            self.phase += self.phase_delta;
            self.phase -= libm::floor(self.phase);
            self.phase_delta += self.phase_delta_delta;
            self.mix += self.mix_delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{test_tick, EffectLevels, Ramp};
    use tb_ir::{EffectParams, FilterSettings};

    fn init_ring(mix: f64, waveform: RingModWaveform) -> RingModulator {
        let params = EffectParams { ring_mod_waveform: waveform, ..Default::default() };
        let eq = FilterSettings::new();
        let levels = EffectLevels { ring_mod: Ramp::flat(mix), ring_mod_hz: Ramp::flat(0.5), ..Default::default() };
        let mut r = RingModulator::new();
        r.tick(&test_tick(&params, &eq, levels));
        r
    }

    #[test]
    fn carrier_range_spans_the_limits() {
        assert_eq!(carrier_hz(0.0), RING_MOD_MIN_HZ);
        assert!((carrier_hz(1.0) - RING_MOD_MAX_HZ).abs() < 1e-9);
    }

    #[test]
    fn dry_mix_passes_through() {
        let mut r = init_ring(0.0, RingModWaveform::Sine);
        let mut left = [0.5f32; 16];
        let mut right = [0.0f32; 16];
        r.process(&mut left, &mut right);
        assert!(left.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn square_carrier_flips_sign() {
        let mut r = init_ring(1.0, RingModWaveform::Square);
        let period = (44100.0 / carrier_hz(0.5)) as usize;
        let mut left = vec![0.5f32; period];
        let mut right = vec![0.0f32; period];
        r.process(&mut left, &mut right);
        assert_eq!(left[1], 0.5);
        assert_eq!(left[period * 3 / 4], -0.5);
    }
}
