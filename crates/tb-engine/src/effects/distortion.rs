//! Soft-clipping waveshaper.

use super::{Effect, EffectTick};

/// Drive at full distortion.
const DRIVE_MAX: f64 = 40.0;
/// Output trim exponent; keeps louder drive settings from jumping in level.
const DRIVE_TRIM: f64 = -0.6;

fn drive_for_level(level: f64) -> f64 {
    libm::pow(DRIVE_MAX, level.clamp(0.0, 1.0))
}

pub struct Distortion {
    drive: f64,
    drive_delta: f64,
}

impl Distortion {
    pub fn new() -> Self {
        Self { drive: 1.0, drive_delta: 0.0 }
    }
}

impl Default for Distortion {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn shape(x: f64, drive: f64) -> f64 {
    let driven = x * drive;
    driven / (1.0 + libm::fabs(driven)) * libm::pow(drive, DRIVE_TRIM)
}

impl Effect for Distortion {
    fn clear(&mut self) {}

    fn tick(&mut self, tick: &EffectTick<'_>) {
        let start = drive_for_level(tick.levels.distortion.start);
        let end = drive_for_level(tick.levels.distortion.end);
        self.drive = start;
        self.drive_delta = if tick.run_length == 0 { 0.0 } else { (end - start) / tick.run_length as f64 };
    }

    fn process(&mut self, left: &mut [f32], _right: &mut [f32]) {
        for sample in left.iter_mut() {
            *sample = shape(*sample as f64, self.drive) as f32;
            self.drive += self.drive_delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{test_tick, EffectLevels, Ramp};
    use tb_ir::{EffectParams, FilterSettings};

    fn init_distortion(level: f64) -> Distortion {
        let params = EffectParams::default();
        let eq = FilterSettings::new();
        let levels = EffectLevels { distortion: Ramp::flat(level), ..Default::default() };
        let mut d = Distortion::new();
        d.tick(&test_tick(&params, &eq, levels));
        d
    }

    #[test]
    fn output_is_bounded_by_drive_trim() {
        let mut d = init_distortion(1.0);
        let mut left = [100.0f32, -100.0, 0.0];
        let mut right = [0.0f32; 3];
        d.process(&mut left, &mut right);
        let ceiling = libm::pow(DRIVE_MAX, DRIVE_TRIM) as f32;
        assert!(left[0] > 0.0 && left[0] <= ceiling);
        assert!(left[1] < 0.0 && left[1] >= -ceiling);
        assert_eq!(left[2], 0.0);
    }

    #[test]
    fn more_drive_flattens_the_peak() {
        // Ratio of a quiet sample to a loud one rises as the curve saturates.
        let ratio = |level: f64| {
            let mut d = init_distortion(level);
            let mut left = [0.1f32, 1.0];
            let mut right = [0.0f32; 2];
            d.process(&mut left, &mut right);
            left[0] / left[1]
        };
        assert!(ratio(1.0) > ratio(0.0));
    }

    #[test]
    fn odd_symmetry() {
        let mut d = init_distortion(0.5);
        let mut left = [0.3f32, -0.3];
        let mut right = [0.0f32; 2];
        d.process(&mut left, &mut right);
        assert!((left[0] + left[1]).abs() < 1e-6);
    }
}
