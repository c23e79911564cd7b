//! Per-instrument envelope slots.
//!
//! An envelope slot ties one shape to one automatable parameter. The engine's
//! envelope computer evaluates every slot once per tick; this module only
//! holds the settings.

use crate::automation::AutomationTarget;
use crate::config::{
    LFO_STEPS_MAX, MAX_PITCH, PER_ENVELOPE_BOUND_MAX, PER_ENVELOPE_SPEED_MAX, RANDOM_ENVELOPE_SEED_MAX,
    RANDOM_ENVELOPE_STEPS_MAX,
};
use crate::error::IrError;

/// What a pseudorandom envelope hashes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RandomKind {
    /// Coarse 256-tick time buckets.
    #[default]
    Time,
    /// The tone's resolved pitch.
    Pitch,
    /// The absolute start tick of the note's pin segment.
    Note,
    /// Cross-fade between neighbouring time buckets.
    TimeSmooth,
}

impl TryFrom<u8> for RandomKind {
    type Error = IrError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RandomKind::Time),
            1 => Ok(RandomKind::Pitch),
            2 => Ok(RandomKind::Note),
            3 => Ok(RandomKind::TimeSmooth),
            other => Err(IrError::UnknownRandomKind(other)),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LfoWaveform {
    #[default]
    Sine,
    Square,
    Triangle,
    Sawtooth,
    Trapezoid,
    SteppedSaw,
    SteppedTri,
}

impl LfoWaveform {
    pub const ALL: [LfoWaveform; 7] = [
        LfoWaveform::Sine,
        LfoWaveform::Square,
        LfoWaveform::Triangle,
        LfoWaveform::Sawtooth,
        LfoWaveform::Trapezoid,
        LfoWaveform::SteppedSaw,
        LfoWaveform::SteppedTri,
    ];

    /// Waveforms that use the slot's step count.
    pub const fn is_stepped(self) -> bool {
        matches!(self, LfoWaveform::SteppedSaw | LfoWaveform::SteppedTri)
    }
}

impl TryFrom<u8> for LfoWaveform {
    type Error = IrError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        LfoWaveform::ALL
            .get(value as usize)
            .copied()
            .ok_or(IrError::UnknownLfoWaveform(value))
    }
}

/// Envelope shape. Sub-kinds travel with the variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EnvelopeShape {
    #[default]
    None,
    NoteSize,
    Pitch,
    Pseudorandom(RandomKind),
    Twang,
    Swell,
    Lfo(LfoWaveform),
    Tremolo2,
    Punch,
    Flare,
    Decay,
    Blip,
    Wibble,
    Linear,
    Rise,
    Fall,
}

impl EnvelopeShape {
    /// Every shape, with default sub-kinds.
    pub const ALL: [EnvelopeShape; 16] = [
        EnvelopeShape::None,
        EnvelopeShape::NoteSize,
        EnvelopeShape::Pitch,
        EnvelopeShape::Pseudorandom(RandomKind::Time),
        EnvelopeShape::Twang,
        EnvelopeShape::Swell,
        EnvelopeShape::Lfo(LfoWaveform::Sine),
        EnvelopeShape::Tremolo2,
        EnvelopeShape::Punch,
        EnvelopeShape::Flare,
        EnvelopeShape::Decay,
        EnvelopeShape::Blip,
        EnvelopeShape::Wibble,
        EnvelopeShape::Linear,
        EnvelopeShape::Rise,
        EnvelopeShape::Fall,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            EnvelopeShape::None => "none",
            EnvelopeShape::NoteSize => "note size",
            EnvelopeShape::Pitch => "pitch",
            EnvelopeShape::Pseudorandom(_) => "random",
            EnvelopeShape::Twang => "twang",
            EnvelopeShape::Swell => "swell",
            EnvelopeShape::Lfo(_) => "lfo",
            EnvelopeShape::Tremolo2 => "tremolo2",
            EnvelopeShape::Punch => "punch",
            EnvelopeShape::Flare => "flare",
            EnvelopeShape::Decay => "decay",
            EnvelopeShape::Blip => "blip",
            EnvelopeShape::Wibble => "wibble",
            EnvelopeShape::Linear => "linear",
            EnvelopeShape::Rise => "rise",
            EnvelopeShape::Fall => "fall",
        }
    }

    /// Build a shape from its index and sub-kind index.
    pub fn from_parts(shape: u8, sub: u8) -> Result<Self, IrError> {
        match EnvelopeShape::try_from(shape)? {
            EnvelopeShape::Pseudorandom(_) => Ok(EnvelopeShape::Pseudorandom(RandomKind::try_from(sub)?)),
            EnvelopeShape::Lfo(_) => Ok(EnvelopeShape::Lfo(LfoWaveform::try_from(sub)?)),
            other => Ok(other),
        }
    }
}

impl TryFrom<u8> for EnvelopeShape {
    type Error = IrError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        EnvelopeShape::ALL
            .get(value as usize)
            .copied()
            .ok_or(IrError::UnknownEnvelopeShape(value))
    }
}

/// One automation rule on an instrument.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvelopeSettings {
    pub target: AutomationTarget,
    /// Which instance of a multi-instance target, e.g. the operator number.
    pub index: u8,
    pub shape: EnvelopeShape,
    pub inverse: bool,
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// Per-slot clock multiplier.
    pub speed: f64,
    /// Hold the tick-start value through the tick.
    pub discrete: bool,
    /// Quantization levels for pseudorandom and stepped LFO shapes.
    pub steps: u8,
    pub seed: u8,
    /// Pitch range mapped by the `Pitch` shape.
    pub pitch_start: i32,
    pub pitch_end: i32,
}

impl Default for EnvelopeSettings {
    fn default() -> Self {
        Self {
            target: AutomationTarget::NoteVolume,
            index: 0,
            shape: EnvelopeShape::NoteSize,
            inverse: false,
            lower_bound: 0.0,
            upper_bound: 1.0,
            speed: 1.0,
            discrete: false,
            steps: 2,
            seed: 2,
            pitch_start: 0,
            pitch_end: MAX_PITCH,
        }
    }
}

impl EnvelopeSettings {
    pub fn new(target: AutomationTarget, index: u8, shape: EnvelopeShape) -> Self {
        Self { target, index, shape, ..Self::default() }
    }

    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lower_bound = lower;
        self.upper_bound = upper;
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn inverted(mut self) -> Self {
        self.inverse = true;
        self
    }

    /// Bring stored values back into range. Crossed bounds reset to `[0, 1]`.
    pub fn normalize(&mut self) {
        self.normalize_bounds();
        self.speed = self.speed.clamp(0.0, PER_ENVELOPE_SPEED_MAX);
        let steps_max = match self.shape {
            EnvelopeShape::Lfo(_) => LFO_STEPS_MAX,
            _ => RANDOM_ENVELOPE_STEPS_MAX,
        };
        self.steps = self.steps.clamp(1, steps_max);
        self.seed = self.seed.min(RANDOM_ENVELOPE_SEED_MAX);
    }

    /// Clamp bounds and reset them to `[0, 1]` when they are crossed.
    pub fn normalize_bounds(&mut self) {
        let clamp = |v: f64| if v.is_finite() { v.clamp(0.0, PER_ENVELOPE_BOUND_MAX) } else { 0.0 };
        self.lower_bound = clamp(self.lower_bound);
        self.upper_bound = clamp(self.upper_bound);
        if self.lower_bound > self.upper_bound {
            self.lower_bound = 0.0;
            self.upper_bound = 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_indices_round_trip() {
        for (i, shape) in EnvelopeShape::ALL.iter().enumerate() {
            assert_eq!(EnvelopeShape::try_from(i as u8), Ok(*shape));
        }
        assert_eq!(EnvelopeShape::try_from(16), Err(IrError::UnknownEnvelopeShape(16)));
    }

    #[test]
    fn sub_kinds_are_validated() {
        assert_eq!(EnvelopeShape::from_parts(6, 4), Ok(EnvelopeShape::Lfo(LfoWaveform::Trapezoid)));
        assert_eq!(EnvelopeShape::from_parts(6, 9), Err(IrError::UnknownLfoWaveform(9)));
        assert_eq!(EnvelopeShape::from_parts(3, 2), Ok(EnvelopeShape::Pseudorandom(RandomKind::Note)));
        assert_eq!(EnvelopeShape::from_parts(3, 7), Err(IrError::UnknownRandomKind(7)));
        // Sub index is ignored for shapes without sub-kinds.
        assert_eq!(EnvelopeShape::from_parts(10, 200), Ok(EnvelopeShape::Decay));
    }

    #[test]
    fn crossed_bounds_reset() {
        let mut env = EnvelopeSettings::default().with_bounds(0.8, 0.2);
        env.normalize_bounds();
        assert_eq!((env.lower_bound, env.upper_bound), (0.0, 1.0));
    }

    #[test]
    fn ordered_bounds_are_kept() {
        let mut env = EnvelopeSettings::default().with_bounds(0.25, 0.75);
        env.normalize_bounds();
        assert_eq!((env.lower_bound, env.upper_bound), (0.25, 0.75));
    }

    #[test]
    fn normalize_clamps_steps_and_seed() {
        let mut env = EnvelopeSettings::new(
            AutomationTarget::NoteVolume,
            0,
            EnvelopeShape::Pseudorandom(RandomKind::Time),
        );
        env.steps = 0;
        env.seed = 200;
        env.normalize();
        assert_eq!(env.steps, 1);
        assert_eq!(env.seed, RANDOM_ENVELOPE_SEED_MAX);
    }
}
