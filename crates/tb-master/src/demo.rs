//! A short built-in song touching the main instrument types, effects and
//! a mod channel.

use tb_ir::config::{Chord, ChipWave, Transition, Vibrato};
use tb_ir::{
    EffectType, Instrument, InstrumentKind, InstrumentType, ModInstrument, ModSetting, ModSlot, Note, NotePin,
    Pattern, Song,
};

const BARS: usize = 4;
const LEAD: usize = 0;
const BASS: usize = 1;
const PAD: usize = 2;
const DRUMS: usize = 3;
const MODS: usize = 4;

/// Lead melody as `(pitch, start part, end part)` for each bar.
const MELODY: [&[(i32, u32, u32)]; 2] = [
    &[(24, 0, 4), (27, 4, 8), (31, 8, 12), (29, 12, 16), (27, 16, 24), (24, 24, 32)],
    &[(22, 0, 8), (24, 8, 12), (26, 12, 16), (27, 16, 20), (26, 20, 24), (22, 24, 32)],
];

/// Bass roots per bar.
const ROOTS: [i32; BARS] = [12, 8, 10, 7];

/// Pad chords per bar.
const CHORDS: [[i32; 3]; BARS] = [[24, 27, 31], [20, 24, 27], [22, 26, 29], [19, 22, 26]];

/// Build the demo song. It always passes [`Song::validate`].
pub fn demo_song() -> Song {
    let mut song = Song::with_channels(3, 1, 1);
    song.set_bar_count(BARS);
    song.set_tempo(120.0);
    song.loop_start = 0;
    song.loop_length = BARS;

    lead(&mut song);
    bass(&mut song);
    pad(&mut song);
    drums(&mut song);
    pan_sweep(&mut song);
    song
}

fn lead(song: &mut Song) {
    let channel = &mut song.channels[LEAD];
    let mut instrument = Instrument::of_type(InstrumentType::Chip, false);
    instrument.kind = InstrumentKind::Chip { wave: ChipWave::Sawtooth };
    instrument.vibrato = Vibrato::Delayed;
    instrument.transition = Transition::Slide;
    instrument.effects.insert(EffectType::Panning);
    instrument.effects.insert(EffectType::Echo);
    instrument.effects.insert(EffectType::Reverb);
    instrument.note_filter.add_point(tb_ir::FilterType::LowPass, 24.0, 7.0);
    channel.instruments[0] = instrument;

    for (bar, phrase) in MELODY.iter().cycle().take(BARS).enumerate() {
        let mut pattern = Pattern::new();
        for &(pitch, start, end) in phrase.iter() {
            pattern.add_note(Note::new(pitch, start, end, 5));
        }
        let number = channel.add_pattern(pattern);
        channel.set_bar(bar, number);
    }
}

fn bass(song: &mut Song) {
    let channel = &mut song.channels[BASS];
    channel.octave = 2;
    channel.instruments[0] = Instrument::of_type(InstrumentType::Fm, false);

    for (bar, &root) in ROOTS.iter().enumerate() {
        let mut pattern = Pattern::new();
        for beat in 0..8u32 {
            let pitch = if beat % 4 == 3 { root + 7 } else { root };
            pattern.add_note(Note::new(pitch, beat * 4, beat * 4 + 3, 6));
        }
        let number = channel.add_pattern(pattern);
        channel.set_bar(bar, number);
    }
}

fn pad(song: &mut Song) {
    let channel = &mut song.channels[PAD];
    let mut instrument = Instrument::of_type(InstrumentType::Harmonics, false);
    instrument.chord = Chord::Simultaneous;
    instrument.fade_in = 4;
    instrument.volume = -8;
    instrument.effects.insert(EffectType::Chorus);
    instrument.effects.insert(EffectType::Reverb);
    channel.instruments[0] = instrument;

    for (bar, chord) in CHORDS.iter().enumerate() {
        let mut pattern = Pattern::new();
        let pins = vec![NotePin::new(0, 0, 3), NotePin::new(16, 0, 5), NotePin::new(32, 0, 2)];
        pattern.add_note(Note::with_pins(chord, 0, 32, pins));
        let number = channel.add_pattern(pattern);
        channel.set_bar(bar, number);
    }
}

fn drums(song: &mut Song) {
    let channel = &mut song.channels[DRUMS];
    channel.instruments[0] = Instrument::of_type(InstrumentType::Drumset, true);

    let mut pattern = Pattern::new();
    for step in 0..16u32 {
        // Kick on the beat, hats in between, a snare on beats 3 and 7.
        let drum = match step % 4 {
            0 if step % 8 == 4 => 6,
            0 => 0,
            2 => 9,
            _ => continue,
        };
        pattern.add_note(Note::new(drum, step * 2, step * 2 + 1, 6));
    }
    let number = channel.add_pattern(pattern);
    for bar in 0..BARS {
        channel.set_bar(bar, number);
    }
}

/// Mod slot 0 sweeps the lead's pan from left to right over each bar pair.
fn pan_sweep(song: &mut Song) {
    let channel = &mut song.channels[MODS];
    let mut slots = [ModSlot::default(); tb_ir::MOD_COUNT];
    slots[0] = ModSlot::instrument(LEAD, ModInstrument::Index(0), ModSetting::Pan);
    channel.instruments[0] = Instrument::new(InstrumentKind::Mod { slots });

    let right = ModSetting::Pan.max_raw();
    for bar in 0..BARS {
        let (from, to) = if bar % 2 == 0 { (0, right / 2) } else { (right / 2, right) };
        let mut pattern = Pattern::new();
        pattern.add_note(Note::with_pins(&[0], 0, 32, vec![NotePin::new(0, 0, from), NotePin::new(32, 0, to)]));
        let number = channel.add_pattern(pattern);
        channel.set_bar(bar, number);
    }
}
