//! Channel state and note lookup.
//!
//! Each tick the synth asks a channel which note an instrument is playing
//! and which notes touch it on either side. Neighbours in the same pattern
//! always count; neighbours in the previous or next bar count when the
//! transition reaches across patterns, and force a continue when the later
//! note is flagged as carrying on from the bar before.

use alloc::vec::Vec;
use arrayvec::ArrayVec;

use tb_ir::config::{Transition, LAYERED_INSTRUMENT_COUNT_MAX};
use tb_ir::{Channel, ChannelKind, Note, Pattern, Song};

use crate::config::EngineConfig;
use crate::instrument_state::InstrumentState;
use crate::tone::NoteRef;

/// Peak output of one channel over the last rendered block.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChannelLevel {
    pub left: f32,
    pub right: f32,
}

impl ChannelLevel {
    pub fn peak(&self) -> f32 {
        self.left.max(self.right)
    }
}

/// Runtime state of one channel.
pub struct ChannelState {
    /// One entry per instrument of the channel.
    pub(crate) instruments: Vec<InstrumentState>,
    /// Muted from the transport, on top of the song's own mute flag.
    pub(crate) muted: bool,
    pub(crate) solo: bool,
}

impl ChannelState {
    pub fn new(channel: &Channel, config: &EngineConfig) -> Self {
        let noise = channel.kind == ChannelKind::Noise;
        let instruments = if channel.kind == ChannelKind::Mod {
            Vec::new()
        } else {
            channel.instruments.iter().map(|i| InstrumentState::new(i, noise, config)).collect()
        };
        Self { instruments, muted: false, solo: false }
    }
}

// --- Note lookup ---

/// The note an instrument plays on this tick and its joined neighbours.
#[derive(Clone, Copy, Debug)]
pub struct NoteContext<'a> {
    pub note_ref: NoteRef,
    pub note: &'a Note,
    /// Touching note before this one, when the transition joins them.
    pub prev: Option<(NoteRef, &'a Note)>,
    pub next: Option<(NoteRef, &'a Note)>,
    /// The note carries on from the previous bar's note.
    pub force_continue_at_start: bool,
    /// The next bar's first note carries this one on.
    pub force_continue_at_end: bool,
}

/// Instruments of `channel` that play in `bar`.
pub fn playing_instruments(song: &Song, channel: &Channel, bar: usize) -> ArrayVec<usize, LAYERED_INSTRUMENT_COUNT_MAX> {
    let mut out = ArrayVec::new();
    let Some(pattern) = channel.pattern_at_bar(bar) else {
        return out;
    };
    if !song.pattern_instruments {
        if !channel.instruments.is_empty() {
            out.push(0);
        }
        return out;
    }
    for &instrument in pattern.instruments.iter() {
        let index = instrument as usize;
        if index < channel.instruments.len() && !out.contains(&index) && out.try_push(index).is_err() {
            break;
        }
        if !song.layered_instruments && !out.is_empty() {
            break;
        }
    }
    out
}

fn plays_instrument(song: &Song, pattern: &Pattern, instrument: usize) -> bool {
    if !song.pattern_instruments {
        return instrument == 0;
    }
    match pattern.instruments.iter().position(|&i| i as usize == instrument) {
        Some(0) => true,
        Some(_) => song.layered_instruments,
        None => false,
    }
}

/// `bar`'s pattern, if `instrument` plays in it.
fn instrument_pattern<'a>(song: &Song, channel: &'a Channel, bar: usize, instrument: usize) -> Option<&'a Pattern> {
    channel.pattern_at_bar(bar).filter(|p| plays_instrument(song, p, instrument))
}

/// Look up the note `instrument` plays at `part` of `bar`.
pub fn note_context<'a>(
    song: &Song,
    channel: &'a Channel,
    bar: usize,
    part: u32,
    instrument: usize,
    transition: Transition,
) -> Option<NoteContext<'a>> {
    let pattern = instrument_pattern(song, channel, bar, instrument)?;
    let (index, note) = pattern.note_at(part)?;
    let parts_per_bar = song.parts_per_bar();

    let mut prev = None;
    let mut force_continue_at_start = false;
    if index > 0 && pattern.notes[index - 1].end == note.start {
        prev = Some((NoteRef { bar, index: index - 1 }, &pattern.notes[index - 1]));
    } else if note.start == 0 && bar > 0 {
        let before = instrument_pattern(song, channel, bar - 1, instrument)
            .and_then(|p| p.notes.iter().enumerate().next_back())
            .filter(|(_, n)| n.end == parts_per_bar);
        if let Some((i, n)) = before {
            force_continue_at_start = note.continues_last_pattern;
            if transition.includes_adjacent_patterns() || force_continue_at_start {
                prev = Some((NoteRef { bar: bar - 1, index: i }, n));
            }
        }
    }

    let mut next = None;
    let mut force_continue_at_end = false;
    if let Some(n) = pattern.notes.get(index + 1).filter(|n| n.start == note.end) {
        next = Some((NoteRef { bar, index: index + 1 }, n));
    } else if note.end == parts_per_bar && bar + 1 < song.bar_count {
        let after = instrument_pattern(song, channel, bar + 1, instrument)
            .and_then(|p| p.notes.first())
            .filter(|n| n.start == 0);
        if let Some(n) = after {
            force_continue_at_end = n.continues_last_pattern;
            if transition.includes_adjacent_patterns() || force_continue_at_end {
                next = Some((NoteRef { bar: bar + 1, index: 0 }, n));
            }
        }
    }

    if !transition.is_seamless() {
        if !force_continue_at_start {
            prev = None;
        }
        if !force_continue_at_end {
            next = None;
        }
    }

    Some(NoteContext {
        note_ref: NoteRef { bar, index },
        note,
        prev,
        next,
        force_continue_at_start,
        force_continue_at_end,
    })
}

/// The note a tone refers to, if it still exists.
pub fn resolve_note(channel: &Channel, note: NoteRef) -> Option<&Note> {
    channel.pattern_at_bar(note.bar)?.notes.get(note.index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_song(bars: &[&[Note]]) -> Song {
        let mut song = Song::with_channels(1, 0, 0);
        song.set_bar_count(bars.len());
        for (bar, notes) in bars.iter().enumerate() {
            let mut pattern = Pattern::new();
            for note in notes.iter() {
                pattern.add_note(note.clone());
            }
            let number = song.channels[0].add_pattern(pattern);
            song.channels[0].set_bar(bar, number);
        }
        song
    }

    #[test]
    fn touching_notes_join_only_when_seamless() {
        let song = init_song(&[&[Note::new(40, 0, 4, 6), Note::new(42, 4, 8, 6)]]);
        let channel = &song.channels[0];
        let normal = note_context(&song, channel, 0, 5, 0, Transition::Normal).expect("note at part 5");
        assert_eq!(normal.note_ref, NoteRef { bar: 0, index: 1 });
        assert!(normal.prev.is_none());
        let slide = note_context(&song, channel, 0, 5, 0, Transition::Slide).expect("note at part 5");
        assert_eq!(slide.prev.map(|(r, _)| r), Some(NoteRef { bar: 0, index: 0 }));
        let first = note_context(&song, channel, 0, 0, 0, Transition::Interrupt).expect("note at part 0");
        assert_eq!(first.next.map(|(r, _)| r), Some(NoteRef { bar: 0, index: 1 }));
    }

    #[test]
    fn gaps_break_adjacency() {
        let song = init_song(&[&[Note::new(40, 0, 4, 6), Note::new(42, 5, 8, 6)]]);
        let ctx = note_context(&song, &song.channels[0], 0, 6, 0, Transition::Continue).expect("note at part 6");
        assert!(ctx.prev.is_none());
    }

    #[test]
    fn continued_note_forces_continue_across_bars() {
        let parts = Song::new().parts_per_bar();
        let mut carried = Note::new(40, 0, 8, 6);
        carried.continues_last_pattern = true;
        let song = init_song(&[&[Note::new(40, parts - 8, parts, 6)], &[carried]]);
        let channel = &song.channels[0];
        let ctx = note_context(&song, channel, 1, 0, 0, Transition::Normal).expect("note at bar start");
        assert!(ctx.force_continue_at_start);
        assert_eq!(ctx.prev.map(|(r, _)| r.bar), Some(0));
        let before = note_context(&song, channel, 0, parts - 1, 0, Transition::Normal).expect("last note");
        assert!(before.force_continue_at_end);
    }

    #[test]
    fn slide_in_pattern_stops_at_the_bar_line() {
        let parts = Song::new().parts_per_bar();
        let song = init_song(&[&[Note::new(40, parts - 8, parts, 6)], &[Note::new(45, 0, 8, 6)]]);
        let channel = &song.channels[0];
        let inside = note_context(&song, channel, 1, 0, 0, Transition::SlideInPattern).expect("note");
        assert!(inside.prev.is_none());
        let across = note_context(&song, channel, 1, 0, 0, Transition::Slide).expect("note");
        assert!(across.prev.is_some());
    }

    #[test]
    fn pattern_instruments_select_players() {
        let mut song = init_song(&[&[Note::new(40, 0, 8, 6)]]);
        song.pattern_instruments = true;
        song.channels[0].add_instrument(tb_ir::Instrument::of_type(tb_ir::InstrumentType::Chip, false));
        if let Some(pattern) = song.channels[0].pattern_mut(1) {
            pattern.instruments.clear();
            pattern.instruments.push(1);
        }
        let channel = &song.channels[0];
        assert_eq!(playing_instruments(&song, channel, 0).as_slice(), &[1]);
        assert!(note_context(&song, channel, 0, 0, 0, Transition::Normal).is_none());
        assert!(note_context(&song, channel, 0, 0, 1, Transition::Normal).is_some());
    }

    #[test]
    fn resolve_finds_the_note() {
        let song = init_song(&[&[Note::new(40, 0, 8, 6)]]);
        let note = resolve_note(&song.channels[0], NoteRef { bar: 0, index: 0 });
        assert_eq!(note.map(|n| n.pitches[0]), Some(40));
        assert!(resolve_note(&song.channels[0], NoteRef { bar: 0, index: 3 }).is_none());
    }
}
