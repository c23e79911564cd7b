//! Tick/part/beat time units.
//!
//! Notes are placed on a grid of parts (`PARTS_PER_BEAT` per beat). The
//! engine advances in ticks, `TICKS_PER_PART` per part, and recomputes
//! every tone's envelopes once per tick.

/// Smallest note placement unit: parts in one beat.
pub const PARTS_PER_BEAT: u32 = 24;

/// Engine ticks per part.
pub const TICKS_PER_PART: u32 = 2;

/// Engine ticks per beat.
pub const TICKS_PER_BEAT: u32 = PARTS_PER_BEAT * TICKS_PER_PART;

/// Grid subdivision offered to the editor when placing notes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rhythm {
    /// Three steps per beat.
    Triplets,
    /// Four steps per beat.
    #[default]
    Standard,
    /// Six steps per beat.
    Sixths,
    /// Eight steps per beat.
    Eighths,
    /// Every part is a step.
    Freehand,
}

impl Rhythm {
    /// Steps per beat for this subdivision.
    pub const fn steps_per_beat(self) -> u32 {
        match self {
            Rhythm::Triplets => 3,
            Rhythm::Standard => 4,
            Rhythm::Sixths => 6,
            Rhythm::Eighths => 8,
            Rhythm::Freehand => 24,
        }
    }

    /// Parts spanned by one grid step.
    pub const fn parts_per_step(self) -> u32 {
        PARTS_PER_BEAT / self.steps_per_beat()
    }
}

/// A playhead position, broken down the way the tick loop consumes it.
///
/// Ordering is lexicographic: bar, then beat, then part, then tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SongPosition {
    pub bar: u32,
    /// Beat within the bar.
    pub beat: u32,
    /// Part within the beat.
    pub part: u32,
    /// Tick within the part.
    pub tick: u32,
}

impl SongPosition {
    /// The start of the song.
    pub const fn zero() -> Self {
        Self { bar: 0, beat: 0, part: 0, tick: 0 }
    }

    /// Start of the given bar.
    pub const fn at_bar(bar: u32) -> Self {
        Self { bar, beat: 0, part: 0, tick: 0 }
    }

    /// Absolute tick count from the song start.
    pub fn to_ticks(self, beats_per_bar: u32) -> u64 {
        let beats = self.bar as u64 * beats_per_bar as u64 + self.beat as u64;
        let parts = beats * PARTS_PER_BEAT as u64 + self.part as u64;
        parts * TICKS_PER_PART as u64 + self.tick as u64
    }

    /// Inverse of [`to_ticks`](Self::to_ticks).
    pub fn from_ticks(ticks: u64, beats_per_bar: u32) -> Self {
        let beats_per_bar = beats_per_bar.max(1) as u64;
        let tick = (ticks % TICKS_PER_PART as u64) as u32;
        let parts = ticks / TICKS_PER_PART as u64;
        let part = (parts % PARTS_PER_BEAT as u64) as u32;
        let beats = parts / PARTS_PER_BEAT as u64;
        Self {
            bar: (beats / beats_per_bar) as u32,
            beat: (beats % beats_per_bar) as u32,
            part,
            tick,
        }
    }

    /// Part offset within the current bar.
    pub const fn part_in_bar(self) -> u32 {
        self.beat * PARTS_PER_BEAT + self.part
    }
}

/// Audio samples per engine tick at the given tempo.
pub fn samples_per_tick(sample_rate: f64, tempo: f64) -> f64 {
    sample_rate * 60.0 / (tempo * TICKS_PER_BEAT as f64)
}

/// Seconds per engine tick at the given tempo.
pub fn seconds_per_tick(tempo: f64) -> f64 {
    60.0 / (tempo * TICKS_PER_BEAT as f64)
}

/// Convert a tick count to (fractional) beats.
pub fn ticks_to_beats(ticks: f64) -> f64 {
    ticks / TICKS_PER_BEAT as f64
}

/// Convert parts to ticks.
pub const fn parts_to_ticks(parts: u32) -> u32 {
    parts * TICKS_PER_PART
}
