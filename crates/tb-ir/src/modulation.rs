//! Mod channel slots.
//!
//! A mod instrument has `MOD_COUNT` slots. On a mod channel, a note's pitch
//! picks the slot and its pin-interpolated size is the raw setting value
//! written to the slot's target.

use crate::config::{
    ARPEGGIO_SPEED_SCALE, BITCRUSHER_FREQ_RANGE, BITCRUSHER_QUANTIZATION_RANGE, CHORUS_RANGE, DETUNE_MAX,
    DETUNE_MIN, DISTORTION_RANGE, ECHO_SUSTAIN_RANGE, ENVELOPE_SPEED_MAX, FILTER_MORPH_COUNT, GRANULAR_RANGE,
    PAN_MAX, PITCH_SHIFT_RANGE, PULSE_WIDTH_RANGE, REVERB_RANGE, RING_MOD_RANGE, TEMPO_MAX, TEMPO_MIN,
    VOLUME_RANGE,
};

pub const MOD_COUNT: usize = 6;

/// Parameter written by a mod slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ModSetting {
    #[default]
    None,
    SongVolume,
    Tempo,
    MixVolume,
    Pan,
    Reverb,
    Distortion,
    Chorus,
    EchoSustain,
    BitcrusherQuantization,
    BitcrusherFreq,
    RingModulation,
    Granular,
    PulseWidth,
    Detune,
    VibratoDepth,
    ArpeggioSpeed,
    PitchShift,
    EnvelopeSpeed,
    NoteFilterMorph,
}

impl ModSetting {
    pub const fn name(self) -> &'static str {
        match self {
            ModSetting::None => "none",
            ModSetting::SongVolume => "song volume",
            ModSetting::Tempo => "tempo",
            ModSetting::MixVolume => "mix volume",
            ModSetting::Pan => "pan",
            ModSetting::Reverb => "reverb",
            ModSetting::Distortion => "distortion",
            ModSetting::Chorus => "chorus",
            ModSetting::EchoSustain => "echo",
            ModSetting::BitcrusherQuantization => "bit crush",
            ModSetting::BitcrusherFreq => "freq crush",
            ModSetting::RingModulation => "ring mod",
            ModSetting::Granular => "granular",
            ModSetting::PulseWidth => "pulse width",
            ModSetting::Detune => "detune",
            ModSetting::VibratoDepth => "vibrato depth",
            ModSetting::ArpeggioSpeed => "arp speed",
            ModSetting::PitchShift => "pitch shift",
            ModSetting::EnvelopeSpeed => "envelope speed",
            ModSetting::NoteFilterMorph => "note filt. morph",
        }
    }

    /// Largest raw value a mod note can carry for this setting.
    pub fn max_raw(self) -> u16 {
        (match self {
            ModSetting::None => 0,
            ModSetting::SongVolume => 100,
            ModSetting::Tempo => (TEMPO_MAX - TEMPO_MIN) as i32,
            ModSetting::MixVolume => VOLUME_RANGE,
            ModSetting::Pan => PAN_MAX,
            ModSetting::Reverb => REVERB_RANGE as i32 - 1,
            ModSetting::Distortion => DISTORTION_RANGE as i32 - 1,
            ModSetting::Chorus => CHORUS_RANGE as i32 - 1,
            ModSetting::EchoSustain => ECHO_SUSTAIN_RANGE as i32 - 1,
            ModSetting::BitcrusherQuantization => BITCRUSHER_QUANTIZATION_RANGE as i32 - 1,
            ModSetting::BitcrusherFreq => BITCRUSHER_FREQ_RANGE as i32 - 1,
            ModSetting::RingModulation => RING_MOD_RANGE as i32 - 1,
            ModSetting::Granular => GRANULAR_RANGE as i32 - 1,
            ModSetting::PulseWidth => PULSE_WIDTH_RANGE as i32,
            ModSetting::Detune => DETUNE_MAX - DETUNE_MIN,
            ModSetting::VibratoDepth => 50,
            ModSetting::ArpeggioSpeed => ARPEGGIO_SPEED_SCALE.len() as i32 - 1,
            ModSetting::PitchShift => PITCH_SHIFT_RANGE,
            ModSetting::EnvelopeSpeed => ENVELOPE_SPEED_MAX as i32,
            ModSetting::NoteFilterMorph => FILTER_MORPH_COUNT as i32 - 1,
        }) as u16
    }

    /// Offset added to a raw mod value to get the setting value.
    pub fn raw_offset(self) -> f64 {
        match self {
            ModSetting::Tempo => TEMPO_MIN,
            ModSetting::MixVolume => -(VOLUME_RANGE as f64) / 2.0,
            ModSetting::Detune => DETUNE_MIN as f64,
            _ => 0.0,
        }
    }

    /// Setting value for a raw mod note size.
    pub fn value_from_raw(self, raw: f64) -> f64 {
        let raw = raw.clamp(0.0, self.max_raw() as f64);
        match self {
            ModSetting::VibratoDepth => raw / 25.0,
            _ => raw + self.raw_offset(),
        }
    }

    /// Settings that apply to the whole song rather than one instrument.
    pub const fn is_song_level(self) -> bool {
        matches!(self, ModSetting::SongVolume | ModSetting::Tempo)
    }
}

/// Which instrument(s) of the target channel a slot writes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModInstrument {
    Index(u8),
    All,
}

impl Default for ModInstrument {
    fn default() -> Self {
        ModInstrument::Index(0)
    }
}

impl ModInstrument {
    pub fn matches(self, instrument: usize) -> bool {
        match self {
            ModInstrument::Index(i) => i as usize == instrument,
            ModInstrument::All => true,
        }
    }
}

/// One modulator: a (channel, instrument, setting) triple.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ModSlot {
    /// Target channel; `None` for song-level settings.
    pub channel: Option<usize>,
    pub instrument: ModInstrument,
    pub setting: ModSetting,
}

impl ModSlot {
    pub fn song(setting: ModSetting) -> Self {
        Self { channel: None, instrument: ModInstrument::All, setting }
    }

    pub fn instrument(channel: usize, instrument: ModInstrument, setting: ModSetting) -> Self {
        Self { channel: Some(channel), instrument, setting }
    }

    pub fn is_active(&self) -> bool {
        self.setting != ModSetting::None
    }
}
