//! Instrument effect toggles and their settings.

use crate::config::{
    BITCRUSHER_FREQ_RANGE, BITCRUSHER_QUANTIZATION_RANGE, CHORUS_RANGE, DISTORTION_RANGE, ECHO_SUSTAIN_RANGE,
    GRAIN_SIZE_MAX, GRAIN_SIZE_MIN, GRANULAR_RANGE, PAN_CENTER, PITCH_SHIFT_CENTER, REVERB_RANGE,
    RING_MOD_HZ_RANGE, RING_MOD_RANGE,
};

/// An effect that can be switched on for an instrument.
///
/// Besides audio processors this covers note-level features that are
/// toggled the same way (transition, chord, vibrato, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectType {
    Reverb,
    Chorus,
    Panning,
    Distortion,
    Bitcrusher,
    NoteFilter,
    Echo,
    PitchShift,
    Detune,
    Vibrato,
    Transition,
    Chord,
    RingModulation,
    Granular,
}

impl EffectType {
    pub const ALL: [EffectType; 14] = [
        EffectType::Reverb,
        EffectType::Chorus,
        EffectType::Panning,
        EffectType::Distortion,
        EffectType::Bitcrusher,
        EffectType::NoteFilter,
        EffectType::Echo,
        EffectType::PitchShift,
        EffectType::Detune,
        EffectType::Vibrato,
        EffectType::Transition,
        EffectType::Chord,
        EffectType::RingModulation,
        EffectType::Granular,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            EffectType::Reverb => "reverb",
            EffectType::Chorus => "chorus",
            EffectType::Panning => "panning",
            EffectType::Distortion => "distortion",
            EffectType::Bitcrusher => "bitcrusher",
            EffectType::NoteFilter => "note filter",
            EffectType::Echo => "echo",
            EffectType::PitchShift => "pitch shift",
            EffectType::Detune => "detune",
            EffectType::Vibrato => "vibrato",
            EffectType::Transition => "transition type",
            EffectType::Chord => "chord type",
            EffectType::RingModulation => "ring mod",
            EffectType::Granular => "granular",
        }
    }

    const fn bit(self) -> u16 {
        1 << self as u16
    }
}

/// Set of enabled effects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct EffectSet(u16);

impl EffectSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, effect: EffectType) -> bool {
        self.0 & effect.bit() != 0
    }

    pub fn insert(&mut self, effect: EffectType) {
        self.0 |= effect.bit();
    }

    pub fn remove(&mut self, effect: EffectType) {
        self.0 &= !effect.bit();
    }

    pub const fn with(self, effect: EffectType) -> Self {
        Self(self.0 | effect.bit())
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub fn iter(self) -> impl Iterator<Item = EffectType> {
        EffectType::ALL.into_iter().filter(move |e| self.contains(*e))
    }
}

/// Waveform of the ring modulator's carrier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RingModWaveform {
    #[default]
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

/// Settings of every effect, used only while the effect is enabled.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectParams {
    /// `0..DISTORTION_RANGE`
    pub distortion: u8,
    /// `0..BITCRUSHER_FREQ_RANGE`
    pub bitcrusher_freq: u8,
    /// `0..BITCRUSHER_QUANTIZATION_RANGE`
    pub bitcrusher_quantization: u8,
    pub ring_mod: u8,
    pub ring_mod_hz: u8,
    pub ring_mod_waveform: RingModWaveform,
    /// Wet/dry mix, `0..GRANULAR_RANGE`.
    pub granular: u8,
    /// Grain length in samples.
    pub grain_size: u32,
    /// Maximum random grain offset in samples.
    pub grain_range: u32,
    /// `0..=PAN_MAX`, `PAN_CENTER` is center.
    pub pan: i32,
    /// Inter-channel delay, `0..=PAN_DELAY_MAX`.
    pub pan_delay: u8,
    pub chorus: u8,
    pub echo_sustain: u8,
    /// Echo delay in steps of `ECHO_DELAY_STEP_TICKS`.
    pub echo_delay: u8,
    pub reverb: u8,
    /// Semitones above `-PITCH_SHIFT_CENTER`.
    pub pitch_shift: i32,
    /// Cents.
    pub detune: i32,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            distortion: DISTORTION_RANGE - 1,
            bitcrusher_freq: (BITCRUSHER_FREQ_RANGE - 1) / 2,
            bitcrusher_quantization: (BITCRUSHER_QUANTIZATION_RANGE - 1) / 2,
            ring_mod: RING_MOD_RANGE / 2,
            ring_mod_hz: RING_MOD_HZ_RANGE / 2,
            ring_mod_waveform: RingModWaveform::Sine,
            granular: GRANULAR_RANGE / 2,
            grain_size: (GRAIN_SIZE_MIN + GRAIN_SIZE_MAX) / 4,
            grain_range: 400,
            pan: PAN_CENTER,
            pan_delay: 10,
            chorus: CHORUS_RANGE - 1,
            echo_sustain: ECHO_SUSTAIN_RANGE / 2,
            echo_delay: 11,
            reverb: REVERB_RANGE / 4,
            pitch_shift: PITCH_SHIFT_CENTER,
            detune: 0,
        }
    }
}
