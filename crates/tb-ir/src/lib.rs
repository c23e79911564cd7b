//! Core data model for the tonebox synthesizer.
//!
//! Songs, channels, patterns, instruments and their envelope and filter
//! settings, plus the static tables the engine reads. The playback engine
//! consumes these types; importers produce them, going through
//! [`legacy`] when the source predates the current layout.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod automation;
pub mod config;
mod effects;
mod envelope;
mod error;
mod filter;
mod filtering;
mod instrument;
pub mod legacy;
mod modulation;
mod pattern;
mod song;
mod time;

pub use automation::{compute_index, AutomationTarget, TargetInfo, ENVELOPE_COMPUTE_INDEX_COUNT};
pub use effects::{EffectParams, EffectSet, EffectType, RingModWaveform};
pub use envelope::{EnvelopeSettings, EnvelopeShape, LfoWaveform, RandomKind};
pub use error::IrError;
pub use filter::{
    FilterControlPoint, FilterSettings, FilterType, FILTER_FREQ_MAX_HZ, FILTER_FREQ_MIN_HZ, FILTER_FREQ_RANGE,
    FILTER_FREQ_REFERENCE_HZ, FILTER_FREQ_REFERENCE_SETTING, FILTER_FREQ_STEP, FILTER_GAIN_CENTER,
    FILTER_GAIN_RANGE, FILTER_GAIN_STEP, FILTER_MAX_POINTS,
};
pub use filtering::{hz_to_radians, FilterCoefficients, FrequencyResponse};
pub use instrument::{DrumSettings, HarmonicsWave, Instrument, InstrumentKind, InstrumentType, Operator, SpectrumWave};
pub use modulation::{ModInstrument, ModSetting, ModSlot, MOD_COUNT};
pub use pattern::{Note, NotePin, Pattern};
pub use song::{beats_per_bar_in_range, Channel, ChannelKind, Song};
pub use time::{
    parts_to_ticks, samples_per_tick, seconds_per_tick, ticks_to_beats, Rhythm, SongPosition, PARTS_PER_BEAT,
    TICKS_PER_BEAT, TICKS_PER_PART,
};
