//! Patterns, notes and note pins.

use alloc::vec::Vec;
use arrayvec::ArrayVec;

use crate::config::{LAYERED_INSTRUMENT_COUNT_MAX, MAX_CHORD_SIZE};

/// A keyframe inside a note's own pitch/size envelope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NotePin {
    /// Parts from the note start.
    pub time: u32,
    /// Semitones relative to the note's pitches.
    pub interval: i32,
    /// Loudness. `0..=NOTE_SIZE_MAX` for audio notes; mod notes use the
    /// target setting's range.
    pub size: u16,
}

impl NotePin {
    pub const fn new(time: u32, interval: i32, size: u16) -> Self {
        Self { time, interval, size }
    }
}

/// One musical event: a chord held over `start..end` parts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Note {
    pub pitches: ArrayVec<i32, MAX_CHORD_SIZE>,
    /// Start part within the pattern.
    pub start: u32,
    /// End part within the pattern (exclusive).
    pub end: u32,
    pub pins: Vec<NotePin>,
    /// Starts at part 0 and carries on from the previous bar's last note.
    pub continues_last_pattern: bool,
}

impl Note {
    /// A flat note with two pins.
    pub fn new(pitch: i32, start: u32, end: u32, size: u16) -> Self {
        let mut pitches = ArrayVec::new();
        pitches.push(pitch);
        let length = end.saturating_sub(start);
        Self {
            pitches,
            start,
            end,
            pins: alloc::vec![NotePin::new(0, 0, size), NotePin::new(length, 0, size)],
            continues_last_pattern: false,
        }
    }

    /// A note with explicit pins. Extra pitches beyond the chord limit are dropped.
    pub fn with_pins(pitches: &[i32], start: u32, end: u32, pins: Vec<NotePin>) -> Self {
        Self {
            pitches: pitches.iter().copied().take(MAX_CHORD_SIZE).collect(),
            start,
            end,
            pins,
            continues_last_pattern: false,
        }
    }

    /// Add a chord pitch. Returns false when the chord is full or the pitch is present.
    pub fn add_pitch(&mut self, pitch: i32) -> bool {
        if self.pitches.contains(&pitch) {
            return false;
        }
        self.pitches.try_push(pitch).is_ok()
    }

    pub fn length(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Pitch the note is heard at for most of its length.
    ///
    /// The interval of the longest flat pin segment, falling back to the
    /// interval of the loudest pin when the note bends throughout.
    pub fn pick_main_interval(&self) -> i32 {
        let mut longest = 0;
        let mut main_interval = 0;
        for pair in self.pins.windows(2) {
            if pair[0].interval == pair[1].interval {
                let duration = pair[1].time.saturating_sub(pair[0].time);
                if duration > longest {
                    longest = duration;
                    main_interval = pair[0].interval;
                }
            }
        }
        if longest == 0 {
            let mut loudest = 0;
            for pin in &self.pins {
                if pin.size > loudest {
                    loudest = pin.size;
                    main_interval = pin.interval;
                }
            }
        }
        main_interval
    }

    /// Index of the pin that opens the segment containing `part` (relative
    /// to the note start). The segment runs to the following pin.
    pub fn pin_segment_at(&self, part: f64) -> usize {
        let mut index = 0;
        for (i, pair) in self.pins.windows(2).enumerate() {
            index = i;
            if (pair[1].time as f64) > part {
                break;
            }
        }
        index
    }

    fn lerp_pins<F: Fn(&NotePin) -> f64>(&self, part: f64, value: F) -> f64 {
        match self.pins.len() {
            0 => 0.0,
            1 => value(&self.pins[0]),
            _ => {
                let i = self.pin_segment_at(part);
                let (a, b) = (&self.pins[i], &self.pins[i + 1]);
                let span = b.time as f64 - a.time as f64;
                if span <= 0.0 {
                    return value(b);
                }
                let ratio = ((part - a.time as f64) / span).clamp(0.0, 1.0);
                value(a) + (value(b) - value(a)) * ratio
            }
        }
    }

    /// Pin-interpolated size at `part` parts after the note start.
    pub fn size_at_part(&self, part: f64) -> f64 {
        self.lerp_pins(part, |p| p.size as f64)
    }

    /// Pin-interpolated interval at `part` parts after the note start.
    pub fn interval_at_part(&self, part: f64) -> f64 {
        self.lerp_pins(part, |p| p.interval as f64)
    }

    /// Pins are sorted, start at 0 and end at the note length.
    pub fn has_valid_pins(&self) -> bool {
        let length = self.length();
        self.pins.len() >= 2
            && self.pins[0].time == 0
            && self.pins.windows(2).all(|w| w[0].time <= w[1].time)
            && self.pins.last().map(|p| p.time) == Some(length)
    }

    /// Repair pins coming from an importer: sort, pin the first to time 0,
    /// drop pins past the end and terminate at the note length.
    pub fn normalize_pins(&mut self) {
        let length = self.length();
        if self.pins.is_empty() {
            self.pins.push(NotePin::new(0, 0, 0));
        }
        self.pins.sort_by_key(|p| p.time);
        self.pins[0].time = 0;
        self.pins.retain(|p| p.time <= length);
        if self.pins.is_empty() {
            self.pins.push(NotePin::new(0, 0, 0));
        }
        let last = self.pins[self.pins.len() - 1];
        if last.time < length || self.pins.len() == 1 {
            self.pins.push(NotePin::new(length, last.interval, last.size));
        }
    }
}

/// Notes for one bar of one channel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pattern {
    /// Sorted by start, non-overlapping.
    pub notes: Vec<Note>,
    /// Instruments of the owning channel that play this pattern.
    pub instruments: ArrayVec<u8, LAYERED_INSTRUMENT_COUNT_MAX>,
}

impl Pattern {
    /// An empty pattern played by instrument 0.
    pub fn new() -> Self {
        Self::with_instrument(0)
    }

    pub fn with_instrument(instrument: u8) -> Self {
        let mut instruments = ArrayVec::new();
        instruments.push(instrument);
        Self { notes: Vec::new(), instruments }
    }

    /// Insert a note, keeping notes sorted by start.
    pub fn add_note(&mut self, note: Note) {
        let at = self.notes.partition_point(|n| n.start <= note.start);
        self.notes.insert(at, note);
    }

    /// The note sounding at `part`, with its index.
    pub fn note_at(&self, part: u32) -> Option<(usize, &Note)> {
        self.notes
            .iter()
            .enumerate()
            .find(|(_, n)| n.start <= part && part < n.end)
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn flat_note_has_two_pins() {
        let note = Note::new(60, 4, 16, 6);
        assert_eq!(note.length(), 12);
        assert!(note.has_valid_pins());
        assert_eq!(note.size_at_part(5.0), 6.0);
    }

    #[test]
    fn pins_interpolate_linearly() {
        let note = Note::with_pins(
            &[60],
            0,
            24,
            vec![NotePin::new(0, 0, 6), NotePin::new(12, 2, 0), NotePin::new(24, 2, 0)],
        );
        assert_eq!(note.size_at_part(0.0), 6.0);
        assert_eq!(note.size_at_part(6.0), 3.0);
        assert_eq!(note.interval_at_part(6.0), 1.0);
        assert_eq!(note.interval_at_part(18.0), 2.0);
        assert_eq!(note.pin_segment_at(13.0), 1);
    }

    #[test]
    fn main_interval_prefers_longest_flat_segment() {
        let note = Note::with_pins(
            &[60],
            0,
            24,
            vec![NotePin::new(0, 0, 6), NotePin::new(4, 0, 6), NotePin::new(8, 5, 6), NotePin::new(24, 5, 6)],
        );
        assert_eq!(note.pick_main_interval(), 5);
    }

    #[test]
    fn main_interval_falls_back_to_loudest_pin() {
        let note = Note::with_pins(
            &[60],
            0,
            8,
            vec![NotePin::new(0, 0, 2), NotePin::new(4, 3, 5), NotePin::new(8, 7, 1)],
        );
        assert_eq!(note.pick_main_interval(), 3);
    }

    #[test]
    fn normalize_repairs_unsorted_open_pins() {
        let mut note = Note::with_pins(&[60], 0, 12, vec![NotePin::new(6, 1, 3), NotePin::new(2, 0, 5)]);
        assert!(!note.has_valid_pins());
        note.normalize_pins();
        assert!(note.has_valid_pins());
        assert_eq!(note.pins[0], NotePin::new(0, 0, 5));
        assert_eq!(*note.pins.last().unwrap(), NotePin::new(12, 1, 3));
    }

    #[test]
    fn normalize_drops_pins_past_the_end() {
        let mut note = Note::with_pins(&[60], 0, 4, vec![NotePin::new(0, 0, 6), NotePin::new(10, 0, 0)]);
        note.normalize_pins();
        assert!(note.has_valid_pins());
        assert_eq!(note.pins.len(), 2);
    }

    #[test]
    fn chord_is_capped() {
        let mut note = Note::new(60, 0, 4, 6);
        for p in 61..80 {
            note.add_pitch(p);
        }
        assert_eq!(note.pitches.len(), MAX_CHORD_SIZE);
        assert!(!note.add_pitch(60));
    }

    #[test]
    fn notes_stay_sorted() {
        let mut pattern = Pattern::new();
        pattern.add_note(Note::new(60, 8, 12, 6));
        pattern.add_note(Note::new(62, 0, 4, 6));
        pattern.add_note(Note::new(64, 4, 8, 6));
        let starts: Vec<u32> = pattern.notes.iter().map(|n| n.start).collect();
        assert_eq!(starts, vec![0, 4, 8]);
        assert_eq!(pattern.note_at(5).map(|(i, _)| i), Some(1));
        assert!(pattern.note_at(12).is_none());
    }
}
