//! Song structure: channels, pattern arenas and bar sequences.

use alloc::vec::Vec;

use crate::config::{
    key_base_pitch, BAR_COUNT_MAX, BEATS_PER_BAR_MAX, BEATS_PER_BAR_MIN, INSTRUMENT_COUNT_MAX,
    MOD_CHANNEL_COUNT_MAX, NOISE_CHANNEL_COUNT_MAX, PITCH_CHANNEL_COUNT_MAX, TEMPO_DEFAULT, TEMPO_MAX, TEMPO_MIN,
};
use crate::error::IrError;
use crate::instrument::{Instrument, InstrumentType};
use crate::pattern::Pattern;
use crate::time::{Rhythm, PARTS_PER_BEAT, TICKS_PER_BEAT};

/// Role of a channel. Channels are grouped in this order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChannelKind {
    Pitch,
    Noise,
    Mod,
}

impl ChannelKind {
    pub const fn name(self) -> &'static str {
        match self {
            ChannelKind::Pitch => "pitch",
            ChannelKind::Noise => "noise",
            ChannelKind::Mod => "mod",
        }
    }

    pub const fn max_count(self) -> usize {
        match self {
            ChannelKind::Pitch => PITCH_CHANNEL_COUNT_MAX,
            ChannelKind::Noise => NOISE_CHANNEL_COUNT_MAX,
            ChannelKind::Mod => MOD_CHANNEL_COUNT_MAX,
        }
    }

    /// Instrument type a fresh channel of this kind starts with.
    pub const fn default_instrument_type(self) -> InstrumentType {
        match self {
            ChannelKind::Pitch => InstrumentType::Chip,
            ChannelKind::Noise => InstrumentType::Noise,
            ChannelKind::Mod => InstrumentType::Mod,
        }
    }
}

/// One channel: its instruments, a pattern arena and the bar sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct Channel {
    pub kind: ChannelKind,
    /// Octave offset applied to the pitches of this channel.
    pub octave: i32,
    pub muted: bool,
    pub instruments: Vec<Instrument>,
    /// Pattern `n` lives at `patterns[n - 1]`.
    pub patterns: Vec<Pattern>,
    /// Pattern number per bar, 0 for an empty bar.
    pub bars: Vec<u16>,
}

impl Channel {
    /// A channel with one default instrument and `bar_count` empty bars.
    pub fn new(kind: ChannelKind, bar_count: usize) -> Self {
        let noise = kind == ChannelKind::Noise;
        Self {
            kind,
            octave: if kind == ChannelKind::Pitch { 3 } else { 0 },
            muted: false,
            instruments: alloc::vec![Instrument::of_type(kind.default_instrument_type(), noise)],
            patterns: Vec::new(),
            bars: alloc::vec![0; bar_count],
        }
    }

    /// Append a pattern to the arena and return its 1-based number.
    pub fn add_pattern(&mut self, pattern: Pattern) -> u16 {
        self.patterns.push(pattern);
        self.patterns.len() as u16
    }

    pub fn pattern(&self, number: u16) -> Option<&Pattern> {
        if number == 0 {
            return None;
        }
        self.patterns.get(number as usize - 1)
    }

    pub fn pattern_mut(&mut self, number: u16) -> Option<&mut Pattern> {
        if number == 0 {
            return None;
        }
        self.patterns.get_mut(number as usize - 1)
    }

    /// The pattern placed in `bar`, if any.
    pub fn pattern_at_bar(&self, bar: usize) -> Option<&Pattern> {
        self.bars.get(bar).and_then(|&n| self.pattern(n))
    }

    /// Place pattern `number` (0 clears) at `bar`. Out-of-range bars are ignored.
    pub fn set_bar(&mut self, bar: usize, number: u16) {
        if let Some(slot) = self.bars.get_mut(bar) {
            *slot = number;
        }
    }

    /// Add an instrument. Returns false once the channel is full.
    pub fn add_instrument(&mut self, instrument: Instrument) -> bool {
        if self.instruments.len() >= INSTRUMENT_COUNT_MAX {
            return false;
        }
        self.instruments.push(instrument);
        true
    }
}

/// A complete song.
#[derive(Clone, Debug, PartialEq)]
pub struct Song {
    /// Beats per minute.
    pub tempo: f64,
    pub beats_per_bar: u32,
    /// Key, `0..12` with C at 0.
    pub key: u8,
    /// Scale index; editor-only.
    pub scale: u8,
    pub rhythm: Rhythm,
    pub loop_start: usize,
    pub loop_length: usize,
    pub bar_count: usize,
    /// Patterns may select several instruments at once.
    pub layered_instruments: bool,
    /// Patterns select their instruments.
    pub pattern_instruments: bool,
    /// Linear gain applied to the final mix.
    pub master_gain: f64,
    /// Pitch channels, then noise channels, then mod channels.
    pub channels: Vec<Channel>,
}

impl Default for Song {
    fn default() -> Self {
        Self {
            tempo: TEMPO_DEFAULT,
            beats_per_bar: 8,
            key: 0,
            scale: 0,
            rhythm: Rhythm::Standard,
            loop_start: 0,
            loop_length: 4,
            bar_count: 16,
            layered_instruments: false,
            pattern_instruments: false,
            master_gain: 1.0,
            channels: Vec::new(),
        }
    }
}

impl Song {
    /// An empty song with no channels.
    pub fn new() -> Self {
        Self::default()
    }

    /// A song with the given number of channels of each kind.
    pub fn with_channels(pitch: usize, noise: usize, modulation: usize) -> Self {
        let mut song = Self::new();
        for (kind, count) in [(ChannelKind::Pitch, pitch), (ChannelKind::Noise, noise), (ChannelKind::Mod, modulation)]
        {
            for _ in 0..count.min(kind.max_count()) {
                song.add_channel(kind);
            }
        }
        song
    }

    /// Insert a channel at the end of its group. Returns its index, or
    /// `None` when the group is full.
    pub fn add_channel(&mut self, kind: ChannelKind) -> Option<usize> {
        if self.channel_count(kind) >= kind.max_count() {
            return None;
        }
        let at = self.channels.partition_point(|c| c.kind <= kind);
        self.channels.insert(at, Channel::new(kind, self.bar_count));
        Some(at)
    }

    pub fn channel_kind(&self, channel: usize) -> Option<ChannelKind> {
        self.channels.get(channel).map(|c| c.kind)
    }

    pub fn channel_count(&self, kind: ChannelKind) -> usize {
        self.channels.iter().filter(|c| c.kind == kind).count()
    }

    pub fn pitch_channel_count(&self) -> usize {
        self.channel_count(ChannelKind::Pitch)
    }

    pub fn noise_channel_count(&self) -> usize {
        self.channel_count(ChannelKind::Noise)
    }

    pub fn mod_channel_count(&self) -> usize {
        self.channel_count(ChannelKind::Mod)
    }

    /// Resize every channel's bar list. New bars are empty. The loop is
    /// clamped into the new length.
    pub fn set_bar_count(&mut self, bar_count: usize) {
        let bar_count = bar_count.clamp(1, BAR_COUNT_MAX);
        self.bar_count = bar_count;
        for channel in &mut self.channels {
            channel.bars.resize(bar_count, 0);
        }
        self.loop_start = self.loop_start.min(bar_count - 1);
        self.loop_length = self.loop_length.clamp(1, bar_count - self.loop_start);
    }

    pub fn set_tempo(&mut self, tempo: f64) {
        self.tempo = tempo.clamp(TEMPO_MIN, TEMPO_MAX);
    }

    pub fn pattern_at(&self, channel: usize, bar: usize) -> Option<&Pattern> {
        self.channels.get(channel)?.pattern_at_bar(bar)
    }

    pub fn beats_per_minute(&self) -> f64 {
        self.tempo.clamp(TEMPO_MIN, TEMPO_MAX)
    }

    pub fn parts_per_bar(&self) -> u32 {
        self.beats_per_bar * PARTS_PER_BEAT
    }

    pub fn ticks_per_bar(&self) -> u64 {
        self.beats_per_bar as u64 * TICKS_PER_BEAT as u64
    }

    pub fn total_ticks(&self) -> u64 {
        self.ticks_per_bar() * self.bar_count as u64
    }

    pub fn key_base_pitch(&self) -> i32 {
        key_base_pitch(self.key)
    }

    /// Check every structural invariant. Returns the first violation.
    pub fn validate(&self) -> Result<(), IrError> {
        let mut previous = ChannelKind::Pitch;
        for (index, channel) in self.channels.iter().enumerate() {
            if channel.kind < previous {
                return Err(IrError::ChannelOrder { channel: index, kind: channel.kind.name() });
            }
            previous = channel.kind;
        }
        for kind in [ChannelKind::Pitch, ChannelKind::Noise, ChannelKind::Mod] {
            let count = self.channel_count(kind);
            if count > kind.max_count() {
                return Err(IrError::TooManyChannels { kind: kind.name(), count, max: kind.max_count() });
            }
        }
        for (index, channel) in self.channels.iter().enumerate() {
            if channel.bars.len() != self.bar_count {
                return Err(IrError::BarCountMismatch {
                    channel: index,
                    bars: channel.bars.len(),
                    expected: self.bar_count,
                });
            }
            if channel.instruments.is_empty() {
                return Err(IrError::NoInstruments { channel: index });
            }
            for (bar, &number) in channel.bars.iter().enumerate() {
                if number != 0 && channel.pattern(number).is_none() {
                    return Err(IrError::MissingPattern { channel: index, bar, pattern: number });
                }
            }
            for (p, pattern) in channel.patterns.iter().enumerate() {
                for &instrument in &pattern.instruments {
                    if instrument as usize >= channel.instruments.len() {
                        return Err(IrError::MissingInstrument { channel: index, pattern: p + 1, instrument });
                    }
                }
                for note in &pattern.notes {
                    if !note.has_valid_pins() {
                        return Err(IrError::MalformedPins { channel: index, pattern: p + 1, start: note.start });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Beats-per-bar bounds.
pub const fn beats_per_bar_in_range(beats: u32) -> bool {
    beats >= BEATS_PER_BAR_MIN && beats <= BEATS_PER_BAR_MAX
}
