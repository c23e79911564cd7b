//! Instrument definitions.
//!
//! An instrument is a set of shared note settings (volume, chord, unison,
//! note filter, envelopes, effects) plus one synthesis-specific block held
//! in [`InstrumentKind`].

use arrayvec::ArrayVec;

use crate::automation::AutomationTarget;
use crate::config::{
    Chord, ChipWave, NoiseWave, Transition, Unison, Vibrato, ARPEGGIO_SPEED_DEFAULT, CUSTOM_CHIP_WAVE_LENGTH,
    DRUMSET_FADE_OUT_TICKS, DRUM_COUNT, ENVELOPE_SPEED_DEFAULT, FADE_OUT_NEUTRAL, FADE_OUT_TICKS,
    FILTER_MORPH_COUNT, FM6_OPERATOR_COUNT, HARMONICS_CONTROL_POINTS, HARMONICS_MAX, MAX_ENVELOPE_COUNT,
    MAX_PITCH, OPERATOR_AMPLITUDE_MAX, OPERATOR_COUNT, OPERATOR_FREQUENCY_UNITY, PULSE_WIDTH_DEFAULT,
    PULSE_WIDTH_RANGE, SPECTRUM_CONTROL_POINTS, SPECTRUM_MAX, SUPERSAW_DYNAMISM_MAX, SUPERSAW_SPREAD_MAX,
};
use crate::effects::{EffectParams, EffectSet, EffectType};
use crate::envelope::{EnvelopeSettings, EnvelopeShape};
use crate::error::IrError;
use crate::filter::FilterSettings;
use crate::modulation::{ModSlot, MOD_COUNT};

/// Plain discriminant of [`InstrumentKind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstrumentType {
    Chip,
    Fm,
    Noise,
    Spectrum,
    Drumset,
    Harmonics,
    Pwm,
    PickedString,
    Supersaw,
    CustomChipWave,
    Mod,
    Fm6Op,
}

impl InstrumentType {
    pub const ALL: [InstrumentType; 12] = [
        InstrumentType::Chip,
        InstrumentType::Fm,
        InstrumentType::Noise,
        InstrumentType::Spectrum,
        InstrumentType::Drumset,
        InstrumentType::Harmonics,
        InstrumentType::Pwm,
        InstrumentType::PickedString,
        InstrumentType::Supersaw,
        InstrumentType::CustomChipWave,
        InstrumentType::Mod,
        InstrumentType::Fm6Op,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            InstrumentType::Chip => "chip",
            InstrumentType::Fm => "FM",
            InstrumentType::Noise => "noise",
            InstrumentType::Spectrum => "spectrum",
            InstrumentType::Drumset => "drumset",
            InstrumentType::Harmonics => "harmonics",
            InstrumentType::Pwm => "PWM",
            InstrumentType::PickedString => "Picked String",
            InstrumentType::Supersaw => "supersaw",
            InstrumentType::CustomChipWave => "custom chip",
            InstrumentType::Mod => "mod",
            InstrumentType::Fm6Op => "FM6op",
        }
    }
}

impl TryFrom<u8> for InstrumentType {
    type Error = IrError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        InstrumentType::ALL
            .get(value as usize)
            .copied()
            .ok_or(IrError::UnknownInstrumentType(value))
    }
}

/// One FM operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Operator {
    /// Index into `OPERATOR_FREQUENCIES`.
    pub frequency: usize,
    /// `0..=OPERATOR_AMPLITUDE_MAX`.
    pub amplitude: u8,
}

impl Operator {
    /// Default for operator `index`: the first two operators are at full
    /// amplitude, the rest silent.
    pub const fn reset(index: usize) -> Self {
        Self {
            frequency: OPERATOR_FREQUENCY_UNITY,
            amplitude: if index <= 1 { OPERATOR_AMPLITUDE_MAX } else { 0 },
        }
    }
}

/// Amplitudes of a noise spectrum, one per control point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SpectrumWave {
    pub spectrum: [u8; SPECTRUM_CONTROL_POINTS],
}

impl SpectrumWave {
    /// Default spectrum. Noise channels get a gentle roll-off, pitch
    /// channels a set of harmonic peaks.
    pub fn new(noise_channel: bool) -> Self {
        let mut spectrum = [0u8; SPECTRUM_CONTROL_POINTS];
        for (i, s) in spectrum.iter_mut().enumerate() {
            let value = if noise_channel {
                SPECTRUM_MAX as f64 / libm::sqrt(1.0 + i as f64 / 3.0)
            } else {
                let harmonic = matches!(i, 0 | 7 | 11 | 14 | 16 | 18 | 21 | 23) || i >= 25;
                if harmonic { (SPECTRUM_MAX as f64 * (1.0 - i as f64 / 30.0)).max(0.0) } else { 0.0 }
            };
            *s = libm::round(value) as u8;
        }
        Self { spectrum }
    }
}

/// Amplitudes of the first `HARMONICS_CONTROL_POINTS` partials.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HarmonicsWave {
    pub harmonics: [u8; HARMONICS_CONTROL_POINTS],
}

impl Default for HarmonicsWave {
    fn default() -> Self {
        let mut harmonics = [0u8; HARMONICS_CONTROL_POINTS];
        harmonics[0] = HARMONICS_MAX;
        harmonics[3] = HARMONICS_MAX;
        harmonics[6] = HARMONICS_MAX;
        Self { harmonics }
    }
}

/// Settings for one drum of a drumset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrumSettings {
    /// Filter decay shape.
    pub envelope: EnvelopeShape,
    /// Intrinsic speed of the decay shape.
    pub envelope_speed: f64,
    pub spectrum: SpectrumWave,
}

impl Default for DrumSettings {
    fn default() -> Self {
        Self { envelope: EnvelopeShape::Twang, envelope_speed: 8.0, spectrum: SpectrumWave::new(true) }
    }
}

/// Synthesis-specific parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum InstrumentKind {
    Chip {
        wave: ChipWave,
    },
    CustomChipWave {
        /// One period, values in `-24..=24`.
        wave: [f32; CUSTOM_CHIP_WAVE_LENGTH],
    },
    Fm {
        algorithm: usize,
        feedback_type: usize,
        feedback_amplitude: u8,
        operators: [Operator; OPERATOR_COUNT],
    },
    Fm6Op {
        algorithm: usize,
        feedback_type: usize,
        feedback_amplitude: u8,
        operators: [Operator; FM6_OPERATOR_COUNT],
    },
    Noise {
        wave: NoiseWave,
    },
    Spectrum {
        spectrum: SpectrumWave,
    },
    Drumset {
        drums: [DrumSettings; DRUM_COUNT],
    },
    Harmonics {
        harmonics: HarmonicsWave,
    },
    Pwm {
        /// `0..=PULSE_WIDTH_RANGE`, where the range is a 50% duty cycle.
        pulse_width: u8,
    },
    PickedString {
        harmonics: HarmonicsWave,
        string_sustain: u8,
    },
    Supersaw {
        dynamism: u8,
        spread: u8,
        /// 0 is a pure saw, `SUPERSAW_SHAPE_MAX` a pulse.
        shape: u8,
        pulse_width: u8,
    },
    Mod {
        slots: [ModSlot; MOD_COUNT],
    },
}

impl InstrumentKind {
    /// Type-specific defaults.
    pub fn default_for(ty: InstrumentType, noise_channel: bool) -> Self {
        match ty {
            InstrumentType::Chip => InstrumentKind::Chip { wave: ChipWave::Square },
            InstrumentType::CustomChipWave => {
                let mut wave = [0.0f32; CUSTOM_CHIP_WAVE_LENGTH];
                for (i, w) in wave.iter_mut().enumerate() {
                    *w = 24.0 - libm::floorf(i as f32 * 48.0 / CUSTOM_CHIP_WAVE_LENGTH as f32);
                }
                InstrumentKind::CustomChipWave { wave }
            }
            InstrumentType::Fm => InstrumentKind::Fm {
                algorithm: 0,
                feedback_type: 0,
                feedback_amplitude: 0,
                operators: core::array::from_fn(Operator::reset),
            },
            InstrumentType::Fm6Op => InstrumentKind::Fm6Op {
                algorithm: 0,
                feedback_type: 0,
                feedback_amplitude: 0,
                operators: core::array::from_fn(Operator::reset),
            },
            InstrumentType::Noise => InstrumentKind::Noise { wave: NoiseWave::Retro },
            InstrumentType::Spectrum => InstrumentKind::Spectrum { spectrum: SpectrumWave::new(noise_channel) },
            InstrumentType::Drumset => InstrumentKind::Drumset { drums: [DrumSettings::default(); DRUM_COUNT] },
            InstrumentType::Harmonics => InstrumentKind::Harmonics { harmonics: HarmonicsWave::default() },
            InstrumentType::Pwm => InstrumentKind::Pwm { pulse_width: PULSE_WIDTH_DEFAULT },
            InstrumentType::PickedString => {
                InstrumentKind::PickedString { harmonics: HarmonicsWave::default(), string_sustain: 10 }
            }
            InstrumentType::Supersaw => InstrumentKind::Supersaw {
                dynamism: SUPERSAW_DYNAMISM_MAX,
                spread: SUPERSAW_SPREAD_MAX.div_ceil(2),
                shape: 0,
                pulse_width: PULSE_WIDTH_RANGE - 1,
            },
            InstrumentType::Mod => InstrumentKind::Mod { slots: [ModSlot::default(); MOD_COUNT] },
        }
    }

    pub const fn instrument_type(&self) -> InstrumentType {
        match self {
            InstrumentKind::Chip { .. } => InstrumentType::Chip,
            InstrumentKind::CustomChipWave { .. } => InstrumentType::CustomChipWave,
            InstrumentKind::Fm { .. } => InstrumentType::Fm,
            InstrumentKind::Fm6Op { .. } => InstrumentType::Fm6Op,
            InstrumentKind::Noise { .. } => InstrumentType::Noise,
            InstrumentKind::Spectrum { .. } => InstrumentType::Spectrum,
            InstrumentKind::Drumset { .. } => InstrumentType::Drumset,
            InstrumentKind::Harmonics { .. } => InstrumentType::Harmonics,
            InstrumentKind::Pwm { .. } => InstrumentType::Pwm,
            InstrumentKind::PickedString { .. } => InstrumentType::PickedString,
            InstrumentKind::Supersaw { .. } => InstrumentType::Supersaw,
            InstrumentKind::Mod { .. } => InstrumentType::Mod,
        }
    }

    /// Number of FM operators, 0 for other types.
    pub const fn operator_count(&self) -> usize {
        match self {
            InstrumentKind::Fm { .. } => OPERATOR_COUNT,
            InstrumentKind::Fm6Op { .. } => FM6_OPERATOR_COUNT,
            _ => 0,
        }
    }
}

/// A complete instrument.
#[derive(Clone, Debug, PartialEq)]
pub struct Instrument {
    pub kind: InstrumentKind,
    /// Created for a noise channel.
    pub is_noise_instrument: bool,
    /// `-VOLUME_RANGE/2..=VOLUME_RANGE/2`; the bottom is silent.
    pub volume: i32,
    pub effects: EffectSet,
    pub effect_params: EffectParams,
    pub transition: Transition,
    pub chord: Chord,
    /// Chord tone played by a monophonic chord, counted from the bottom.
    pub mono_chord_tone: usize,
    /// Index into `ARPEGGIO_SPEED_SCALE`.
    pub arpeggio_speed: usize,
    /// Two-note arpeggios alternate every step instead of every other.
    pub fast_two_note_arpeggio: bool,
    pub unison: Unison,
    pub vibrato: Vibrato,
    pub fade_in: u8,
    /// Index into `FADE_OUT_TICKS`.
    pub fade_out: usize,
    pub note_filter: FilterSettings,
    /// Optional morph targets, selected by `note_filter_morph`.
    pub note_sub_filters: [Option<FilterSettings>; FILTER_MORPH_COUNT],
    /// Position among the sub-filters, `0..FILTER_MORPH_COUNT-1`.
    pub note_filter_morph: f64,
    /// Static post-synthesis filter.
    pub eq_filter: FilterSettings,
    pub envelope_speed: u8,
    pub envelopes: ArrayVec<EnvelopeSettings, MAX_ENVELOPE_COUNT>,
}

impl Instrument {
    pub fn new(kind: InstrumentKind) -> Self {
        let is_noise_instrument = matches!(kind, InstrumentKind::Noise { .. } | InstrumentKind::Drumset { .. });
        Self {
            kind,
            is_noise_instrument,
            volume: 0,
            effects: EffectSet::empty(),
            effect_params: EffectParams::default(),
            transition: Transition::Normal,
            chord: Chord::Simultaneous,
            mono_chord_tone: 0,
            arpeggio_speed: ARPEGGIO_SPEED_DEFAULT,
            fast_two_note_arpeggio: false,
            unison: Unison::None,
            vibrato: Vibrato::None,
            fade_in: 0,
            fade_out: FADE_OUT_NEUTRAL,
            note_filter: FilterSettings::new(),
            note_sub_filters: Default::default(),
            note_filter_morph: 0.0,
            eq_filter: FilterSettings::new(),
            envelope_speed: ENVELOPE_SPEED_DEFAULT,
            envelopes: ArrayVec::new(),
        }
    }

    /// A fresh instrument of the given type.
    pub fn of_type(ty: InstrumentType, noise_channel: bool) -> Self {
        let mut inst = Self::new(InstrumentKind::default_for(ty, noise_channel));
        inst.set_type_and_reset(ty, noise_channel);
        inst
    }

    /// Switch type and restore every setting to the type's defaults.
    pub fn set_type_and_reset(&mut self, ty: InstrumentType, noise_channel: bool) {
        *self = Self::new(InstrumentKind::default_for(ty, noise_channel));
        self.is_noise_instrument = noise_channel;
        if noise_channel || ty == InstrumentType::Drumset {
            self.chord = Chord::Arpeggio;
        }
        match ty {
            InstrumentType::PickedString => self.effects.insert(EffectType::Transition),
            InstrumentType::Drumset => {
                self.fade_out = FADE_OUT_TICKS
                    .iter()
                    .position(|&t| t == DRUMSET_FADE_OUT_TICKS)
                    .unwrap_or(FADE_OUT_NEUTRAL);
            }
            _ => {}
        }
    }

    pub fn instrument_type(&self) -> InstrumentType {
        self.kind.instrument_type()
    }

    pub fn is_mod(&self) -> bool {
        matches!(self.kind, InstrumentKind::Mod { .. })
    }

    /// Pitches index drums rather than notes.
    pub fn is_noise_type(&self) -> bool {
        self.is_noise_instrument || matches!(self.kind, InstrumentKind::Noise { .. } | InstrumentKind::Drumset { .. })
    }

    pub fn effect_enabled(&self, effect: EffectType) -> bool {
        self.effects.contains(effect)
    }

    /// Add an envelope slot. Returns false when all slots are used.
    ///
    /// A crossed pitch range falls back to this instrument's full span.
    pub fn add_envelope(&mut self, envelope: EnvelopeSettings) -> bool {
        let mut envelope = envelope;
        envelope.normalize();
        if envelope.pitch_start > envelope.pitch_end {
            (envelope.pitch_start, envelope.pitch_end) = self.warmest_freq_pitch_range();
        }
        self.envelopes.try_push(envelope).is_ok()
    }

    pub fn remove_envelope(&mut self, index: usize) -> Option<EnvelopeSettings> {
        if index < self.envelopes.len() {
            Some(self.envelopes.remove(index))
        } else {
            None
        }
    }

    pub fn envelope_count(&self) -> usize {
        self.envelopes.len()
    }

    /// Full pitch span, used as the default pitch envelope range.
    pub fn warmest_freq_pitch_range(&self) -> (i32, i32) {
        if self.is_noise_type() {
            (0, DRUM_COUNT as i32 - 1)
        } else {
            (0, MAX_PITCH)
        }
    }

    /// Whether an envelope on `(target, index)` has any effect on this instrument.
    pub fn supports_target(&self, target: AutomationTarget, index: usize) -> bool {
        if target == AutomationTarget::None || self.is_mod() {
            return false;
        }
        let info = target.info();
        if !info.compatible.is_empty() && !info.compatible.contains(&self.instrument_type()) {
            return false;
        }
        if let Some(effect) = info.effect {
            if !self.effect_enabled(effect) {
                return false;
            }
        }
        match target {
            AutomationTarget::OperatorFrequency | AutomationTarget::OperatorAmplitude => {
                index < self.kind.operator_count()
            }
            AutomationTarget::NoteFilterFreq | AutomationTarget::NoteFilterGain => index < self.note_filter.len(),
            AutomationTarget::ArpeggioSpeed => self.chord.arpeggiates(),
            _ => index < info.max_count,
        }
    }

    /// The note filter at the current morph position.
    pub fn morphed_note_filter(&self) -> FilterSettings {
        self.morphed_note_filter_at(self.note_filter_morph)
    }

    /// The note filter at morph position `pos`. Sub-filter 0 is the main
    /// note filter; missing sub-filters fall back to it.
    pub fn morphed_note_filter_at(&self, pos: f64) -> FilterSettings {
        let pos = pos.clamp(0.0, (FILTER_MORPH_COUNT - 1) as f64);
        let low = libm::floor(pos) as usize;
        let high = (low + 1).min(FILTER_MORPH_COUNT - 1);
        let pick = |i: usize| -> &FilterSettings {
            if i == 0 {
                &self.note_filter
            } else {
                self.note_sub_filters[i].as_ref().unwrap_or(&self.note_filter)
            }
        };
        let frac = pos - low as f64;
        if frac == 0.0 {
            return pick(low).clone();
        }
        FilterSettings::lerp(pick(low), pick(high), frac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterType;

    #[test]
    fn reset_establishes_type_defaults() {
        let chip = Instrument::of_type(InstrumentType::Chip, false);
        assert_eq!(chip.kind, InstrumentKind::Chip { wave: ChipWave::Square });
        let noise = Instrument::of_type(InstrumentType::Noise, true);
        assert_eq!(noise.kind, InstrumentKind::Noise { wave: NoiseWave::Retro });
        assert!(noise.is_noise_type());
        let fm = Instrument::of_type(InstrumentType::Fm, false);
        match fm.kind {
            InstrumentKind::Fm { operators, algorithm, .. } => {
                assert_eq!(algorithm, 0);
                assert_eq!(operators[0].amplitude, OPERATOR_AMPLITUDE_MAX);
                assert_eq!(operators[3].amplitude, 0);
            }
            other => panic!("expected FM, got {:?}", other),
        }
    }

    #[test]
    fn reset_discards_previous_settings() {
        let mut inst = Instrument::of_type(InstrumentType::Chip, false);
        inst.volume = -10;
        inst.add_envelope(EnvelopeSettings::default());
        inst.set_type_and_reset(InstrumentType::Harmonics, false);
        assert_eq!(inst.volume, 0);
        assert_eq!(inst.envelope_count(), 0);
        assert_eq!(inst.instrument_type(), InstrumentType::Harmonics);
    }

    #[test]
    fn envelope_slots_are_bounded() {
        let mut inst = Instrument::of_type(InstrumentType::Chip, false);
        for _ in 0..MAX_ENVELOPE_COUNT {
            assert!(inst.add_envelope(EnvelopeSettings::default()));
        }
        assert!(!inst.add_envelope(EnvelopeSettings::default()));
        assert!(inst.remove_envelope(0).is_some());
        assert!(inst.remove_envelope(MAX_ENVELOPE_COUNT).is_none());
    }

    #[test]
    fn crossed_pitch_range_uses_full_span() {
        let mut chip = Instrument::of_type(InstrumentType::Chip, false);
        let mut env = EnvelopeSettings::new(AutomationTarget::NoteVolume, 0, EnvelopeShape::Pitch);
        env.pitch_start = 80;
        env.pitch_end = 20;
        assert!(chip.add_envelope(env));
        assert_eq!((chip.envelopes[0].pitch_start, chip.envelopes[0].pitch_end), (0, MAX_PITCH));

        let mut drums = Instrument::of_type(InstrumentType::Noise, true);
        assert!(drums.add_envelope(env));
        assert_eq!((drums.envelopes[0].pitch_start, drums.envelopes[0].pitch_end), (0, DRUM_COUNT as i32 - 1));

        // An ordered range is kept as given.
        env.pitch_start = 20;
        env.pitch_end = 80;
        assert!(chip.add_envelope(env));
        assert_eq!((chip.envelopes[1].pitch_start, chip.envelopes[1].pitch_end), (20, 80));
    }

    #[test]
    fn targets_depend_on_type_and_effects() {
        let mut inst = Instrument::of_type(InstrumentType::Chip, false);
        assert!(inst.supports_target(AutomationTarget::NoteVolume, 0));
        assert!(!inst.supports_target(AutomationTarget::OperatorAmplitude, 0));
        assert!(!inst.supports_target(AutomationTarget::PitchShift, 0));
        inst.effects.insert(EffectType::PitchShift);
        assert!(inst.supports_target(AutomationTarget::PitchShift, 0));

        inst.effects.insert(EffectType::NoteFilter);
        inst.note_filter.add_point(FilterType::LowPass, 20.0, 7.0);
        assert!(inst.supports_target(AutomationTarget::NoteFilterFreq, 0));
        assert!(!inst.supports_target(AutomationTarget::NoteFilterFreq, 1));

        let fm6 = Instrument::of_type(InstrumentType::Fm6Op, false);
        assert!(fm6.supports_target(AutomationTarget::OperatorAmplitude, 5));
        let fm = Instrument::of_type(InstrumentType::Fm, false);
        assert!(!fm.supports_target(AutomationTarget::OperatorAmplitude, 5));
    }

    #[test]
    fn mod_instruments_support_nothing() {
        let inst = Instrument::of_type(InstrumentType::Mod, false);
        assert!(!inst.supports_target(AutomationTarget::NoteVolume, 0));
    }

    #[test]
    fn pitch_range_follows_channel_kind() {
        assert_eq!(Instrument::of_type(InstrumentType::Chip, false).warmest_freq_pitch_range(), (0, MAX_PITCH));
        assert_eq!(
            Instrument::of_type(InstrumentType::Drumset, true).warmest_freq_pitch_range(),
            (0, DRUM_COUNT as i32 - 1)
        );
    }

    #[test]
    fn morph_falls_back_to_main_filter() {
        let mut inst = Instrument::of_type(InstrumentType::Chip, false);
        inst.note_filter.add_point(FilterType::LowPass, 10.0, 7.0);
        let mut sub = FilterSettings::new();
        sub.add_point(FilterType::LowPass, 20.0, 7.0);
        inst.note_sub_filters[1] = Some(sub);
        assert_eq!(inst.morphed_note_filter_at(0.5).points[0].freq, 15.0);
        // Sub-filter 2 is missing, so it reads as the main filter.
        assert_eq!(inst.morphed_note_filter_at(1.5).points[0].freq, 15.0);
        assert_eq!(inst.morphed_note_filter_at(3.0).points[0].freq, 10.0);
    }

    #[test]
    fn raw_type_indices_convert() {
        assert_eq!(InstrumentType::try_from(11), Ok(InstrumentType::Fm6Op));
        assert_eq!(InstrumentType::try_from(12), Err(IrError::UnknownInstrumentType(12)));
    }

    #[test]
    fn spectrum_defaults_differ_by_channel() {
        let pitched = SpectrumWave::new(false);
        let noisy = SpectrumWave::new(true);
        assert_eq!(pitched.spectrum[1], 0);
        assert_eq!(noisy.spectrum[0], SPECTRUM_MAX);
        assert!(noisy.spectrum[1] > 0);
    }
}
