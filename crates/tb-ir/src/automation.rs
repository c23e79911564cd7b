//! Automatable parameters and their metadata.
//!
//! Every envelope slot targets one entry of this table. The engine keeps a
//! flat start/end array per tone, indexed by [`compute_index`], so several
//! slots on the same parameter multiply together.

use crate::effects::EffectType;
use crate::error::IrError;
use crate::filter::FILTER_MAX_POINTS;
use crate::instrument::InstrumentType;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AutomationTarget {
    #[default]
    None,
    NoteVolume,
    PulseWidth,
    StringSustain,
    Unison,
    OperatorFrequency,
    OperatorAmplitude,
    FeedbackAmplitude,
    PitchShift,
    Detune,
    VibratoDepth,
    NoteFilterAllFreqs,
    NoteFilterFreq,
    NoteFilterGain,
    SupersawDynamism,
    SupersawSpread,
    SupersawShape,
    Distortion,
    BitcrusherQuantization,
    BitcrusherFrequency,
    Panning,
    Chorus,
    EchoSustain,
    Reverb,
    ArpeggioSpeed,
    RingModulation,
    RingModulationHz,
    Granular,
}

/// Static description of an automation target.
#[derive(Clone, Copy, Debug)]
pub struct TargetInfo {
    pub name: &'static str,
    /// Number of addressable instances.
    pub max_count: usize,
    pub is_filter: bool,
    /// Effect that must be enabled for the target to apply.
    pub effect: Option<EffectType>,
    /// Instrument types the target applies to. Empty means all audio types.
    pub compatible: &'static [InstrumentType],
}

const FM_TYPES: &[InstrumentType] = &[InstrumentType::Fm, InstrumentType::Fm6Op];

const fn info(
    name: &'static str,
    max_count: usize,
    is_filter: bool,
    effect: Option<EffectType>,
    compatible: &'static [InstrumentType],
) -> TargetInfo {
    TargetInfo { name, max_count, is_filter, effect, compatible }
}

impl AutomationTarget {
    pub const ALL: [AutomationTarget; 28] = [
        AutomationTarget::None,
        AutomationTarget::NoteVolume,
        AutomationTarget::PulseWidth,
        AutomationTarget::StringSustain,
        AutomationTarget::Unison,
        AutomationTarget::OperatorFrequency,
        AutomationTarget::OperatorAmplitude,
        AutomationTarget::FeedbackAmplitude,
        AutomationTarget::PitchShift,
        AutomationTarget::Detune,
        AutomationTarget::VibratoDepth,
        AutomationTarget::NoteFilterAllFreqs,
        AutomationTarget::NoteFilterFreq,
        AutomationTarget::NoteFilterGain,
        AutomationTarget::SupersawDynamism,
        AutomationTarget::SupersawSpread,
        AutomationTarget::SupersawShape,
        AutomationTarget::Distortion,
        AutomationTarget::BitcrusherQuantization,
        AutomationTarget::BitcrusherFrequency,
        AutomationTarget::Panning,
        AutomationTarget::Chorus,
        AutomationTarget::EchoSustain,
        AutomationTarget::Reverb,
        AutomationTarget::ArpeggioSpeed,
        AutomationTarget::RingModulation,
        AutomationTarget::RingModulationHz,
        AutomationTarget::Granular,
    ];

    pub const fn info(self) -> TargetInfo {
        use AutomationTarget as T;
        use EffectType as E;
        use InstrumentType as I;
        match self {
            T::None => info("none", 1, false, None, &[]),
            T::NoteVolume => info("note volume", 1, false, None, &[]),
            T::PulseWidth => info("pulse width", 1, false, None, &[I::Pwm, I::Supersaw]),
            T::StringSustain => info("sustain", 1, false, None, &[I::PickedString]),
            T::Unison => info("unison", 1, false, None, &[
                I::Chip, I::CustomChipWave, I::Harmonics, I::PickedString, I::Pwm, I::Noise,
            ]),
            T::OperatorFrequency => info("fm freq", 6, false, None, FM_TYPES),
            T::OperatorAmplitude => info("fm volume", 6, false, None, FM_TYPES),
            T::FeedbackAmplitude => info("fm feedback", 1, false, None, FM_TYPES),
            T::PitchShift => info("pitch shift", 1, false, Some(E::PitchShift), &[]),
            T::Detune => info("detune", 1, false, Some(E::Detune), &[]),
            T::VibratoDepth => info("vibrato range", 1, false, Some(E::Vibrato), &[]),
            T::NoteFilterAllFreqs => info("n. filter freqs", 1, true, Some(E::NoteFilter), &[]),
            T::NoteFilterFreq => info("n. filter # freq", FILTER_MAX_POINTS, true, Some(E::NoteFilter), &[]),
            T::NoteFilterGain => info("n. filter # vol", FILTER_MAX_POINTS, true, Some(E::NoteFilter), &[]),
            T::SupersawDynamism => info("dynamism", 1, false, None, &[I::Supersaw]),
            T::SupersawSpread => info("spread", 1, false, None, &[I::Supersaw]),
            T::SupersawShape => info("saw↔pulse", 1, false, None, &[I::Supersaw]),
            T::Distortion => info("distortion", 1, false, Some(E::Distortion), &[]),
            T::BitcrusherQuantization => info("bit crush", 1, false, Some(E::Bitcrusher), &[]),
            T::BitcrusherFrequency => info("freq crush", 1, false, Some(E::Bitcrusher), &[]),
            T::Panning => info("pan", 1, false, Some(E::Panning), &[]),
            T::Chorus => info("chorus", 1, false, Some(E::Chorus), &[]),
            T::EchoSustain => info("echo", 1, false, Some(E::Echo), &[]),
            T::Reverb => info("reverb", 1, false, Some(E::Reverb), &[]),
            T::ArpeggioSpeed => info("arp speed", 1, false, Some(E::Chord), &[]),
            T::RingModulation => info("ring mod", 1, false, Some(E::RingModulation), &[]),
            T::RingModulationHz => info("ring mod hz", 1, false, Some(E::RingModulation), &[]),
            T::Granular => info("granular", 1, false, Some(E::Granular), &[]),
        }
    }

    pub const fn name(self) -> &'static str {
        self.info().name
    }

    /// Targets evaluated once per instrument rather than once per tone.
    pub const fn is_instrument_level(self) -> bool {
        matches!(
            self,
            AutomationTarget::Distortion
                | AutomationTarget::BitcrusherQuantization
                | AutomationTarget::BitcrusherFrequency
                | AutomationTarget::Panning
                | AutomationTarget::Chorus
                | AutomationTarget::EchoSustain
                | AutomationTarget::Reverb
                | AutomationTarget::RingModulation
                | AutomationTarget::RingModulationHz
                | AutomationTarget::Granular
        )
    }

    /// First flat index used by this target.
    const fn base_index(self) -> usize {
        let mut base = 0;
        let mut i = 0;
        while i < Self::ALL.len() {
            if Self::ALL[i] as usize == self as usize {
                return base;
            }
            base += Self::ALL[i].info().max_count;
            i += 1;
        }
        base
    }
}

impl TryFrom<u8> for AutomationTarget {
    type Error = IrError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        AutomationTarget::ALL
            .get(value as usize)
            .copied()
            .ok_or(IrError::UnknownAutomationTarget(value))
    }
}

/// Total size of a per-tone envelope start/end array.
pub const ENVELOPE_COMPUTE_INDEX_COUNT: usize = {
    let mut total = 0;
    let mut i = 0;
    while i < AutomationTarget::ALL.len() {
        total += AutomationTarget::ALL[i].info().max_count;
        i += 1;
    }
    total
};

/// Flat index of `(target, index)`, or `None` when `index` exceeds the
/// target's instance count.
pub const fn compute_index(target: AutomationTarget, index: usize) -> Option<usize> {
    if index >= target.info().max_count {
        return None;
    }
    Some(target.base_index() + index)
}
