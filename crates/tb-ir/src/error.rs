//! Error type for the data model.
//!
//! Only raised at the boundary where raw indices or freshly built songs
//! enter the model. Once a `Song` validates, the engine never fails on it.

use thiserror::Error;

/// Errors raised while converting raw values into the data model or while
/// validating a song.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum IrError {
    #[error("unknown envelope shape index {0}")]
    UnknownEnvelopeShape(u8),

    #[error("unknown LFO waveform index {0}")]
    UnknownLfoWaveform(u8),

    #[error("unknown pseudorandom envelope kind {0}")]
    UnknownRandomKind(u8),

    #[error("unknown filter type index {0}")]
    UnknownFilterType(u8),

    #[error("unknown instrument type index {0}")]
    UnknownInstrumentType(u8),

    #[error("unknown automation target index {0}")]
    UnknownAutomationTarget(u8),

    #[error("channel {channel} is out of order: {kind} channels must follow the previous group")]
    ChannelOrder { channel: usize, kind: &'static str },

    #[error("too many {kind} channels: {count} (max {max})")]
    TooManyChannels { kind: &'static str, count: usize, max: usize },

    #[error("channel {channel} has {bars} bars but the song has {expected}")]
    BarCountMismatch { channel: usize, bars: usize, expected: usize },

    #[error("channel {channel} bar {bar} references missing pattern {pattern}")]
    MissingPattern { channel: usize, bar: usize, pattern: u16 },

    #[error("channel {channel} pattern {pattern} references missing instrument {instrument}")]
    MissingInstrument { channel: usize, pattern: usize, instrument: u8 },

    #[error("channel {channel} has no instruments")]
    NoInstruments { channel: usize },

    #[error("note at part {start} in channel {channel} pattern {pattern} has malformed pins")]
    MalformedPins { channel: usize, pattern: usize, start: u32 },
}
