//! Values written by mod channels.
//!
//! Every tick the mod channels are scanned for sounding notes. On a mod
//! channel a note's pitch picks the slot of the mod instrument (pitch 0 is
//! slot 0) and its pin-interpolated size is the raw value for the slot's
//! setting. A value only exists while its mod note sounds; outside mod
//! notes the instrument's own settings apply.

use alloc::vec;
use alloc::vec::Vec;

use tb_ir::config::INSTRUMENT_COUNT_MAX;
use tb_ir::{ChannelKind, InstrumentKind, ModSetting, ModSlot, Song, MOD_COUNT, TICKS_PER_PART};

pub const MOD_SETTING_COUNT: usize = ModSetting::NoteFilterMorph as usize + 1;

/// A setting value at the start and end of the current tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModValue {
    pub start: f64,
    pub end: f64,
}

impl ModValue {
    pub const fn flat(value: f64) -> Self {
        Self { start: value, end: value }
    }

    pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self { start: f(self.start), end: f(self.end) }
    }
}

type SettingValues = [Option<ModValue>; MOD_SETTING_COUNT];

pub struct ModValues {
    song: SettingValues,
    /// `INSTRUMENT_COUNT_MAX` entries per channel.
    instruments: Vec<SettingValues>,
}

impl ModValues {
    pub fn new(channel_count: usize) -> Self {
        Self { song: [None; MOD_SETTING_COUNT], instruments: vec![[None; MOD_SETTING_COUNT]; channel_count * INSTRUMENT_COUNT_MAX] }
    }

    pub fn clear(&mut self) {
        self.song = [None; MOD_SETTING_COUNT];
        for values in self.instruments.iter_mut() {
            *values = [None; MOD_SETTING_COUNT];
        }
    }

    /// Write `value` to every target of `slot`.
    pub fn set(&mut self, slot: &ModSlot, value: ModValue) {
        let index = slot.setting as usize;
        if !slot.is_active() {
            return;
        }
        if slot.setting.is_song_level() {
            self.song[index] = Some(value);
            return;
        }
        let Some(channel) = slot.channel else {
            return;
        };
        for instrument in 0..INSTRUMENT_COUNT_MAX {
            if !slot.instrument.matches(instrument) {
                continue;
            }
            if let Some(values) = self.instruments.get_mut(channel * INSTRUMENT_COUNT_MAX + instrument) {
                values[index] = Some(value);
            }
        }
    }

    pub fn song_value(&self, setting: ModSetting) -> Option<ModValue> {
        self.song[setting as usize]
    }

    pub fn instrument_value(&self, channel: usize, instrument: usize, setting: ModSetting) -> Option<ModValue> {
        if instrument >= INSTRUMENT_COUNT_MAX {
            return None;
        }
        self.instruments.get(channel * INSTRUMENT_COUNT_MAX + instrument)?[setting as usize]
    }

    /// The values reaching one instrument.
    pub fn for_instrument(&self, channel: usize, instrument: usize) -> InstrumentMods<'_> {
        InstrumentMods { values: self, channel, instrument }
    }

    /// Recompute every value for tick `tick` of `bar`.
    pub fn compute(&mut self, song: &Song, bar: usize, tick: u64) {
        self.clear();
        let ticks_per_part = TICKS_PER_PART as f64;
        for channel in song.channels.iter().filter(|c| c.kind == ChannelKind::Mod) {
            let Some(pattern) = channel.pattern_at_bar(bar) else {
                continue;
            };
            for &instrument in pattern.instruments.iter() {
                let Some(InstrumentKind::Mod { slots }) = channel.instruments.get(instrument as usize).map(|i| &i.kind)
                else {
                    continue;
                };
                for note in pattern.notes.iter() {
                    let note_start = note.start as u64 * TICKS_PER_PART as u64;
                    let note_end = note.end as u64 * TICKS_PER_PART as u64;
                    if tick < note_start || tick >= note_end {
                        continue;
                    }
                    let part_start = (tick - note_start) as f64 / ticks_per_part;
                    let part_end = part_start + 1.0 / ticks_per_part;
                    let raw = ModValue { start: note.size_at_part(part_start), end: note.size_at_part(part_end) };
                    for &pitch in note.pitches.iter() {
                        let Ok(slot_index) = usize::try_from(pitch) else {
                            continue;
                        };
                        if slot_index >= MOD_COUNT {
                            continue;
                        }
                        let slot = slots[slot_index];
                        self.set(&slot, raw.map(|r| slot.setting.value_from_raw(r)));
                    }
                }
            }
        }
    }
}

/// Mod values as seen by one instrument.
#[derive(Clone, Copy)]
pub struct InstrumentMods<'a> {
    values: &'a ModValues,
    channel: usize,
    instrument: usize,
}

impl InstrumentMods<'_> {
    pub fn get(&self, setting: ModSetting) -> Option<ModValue> {
        self.values.instrument_value(self.channel, self.instrument, setting)
    }

    /// The mod value, or `setting` held flat across the tick.
    pub fn value_or(&self, setting: ModSetting, default: f64) -> ModValue {
        self.get(setting).unwrap_or(ModValue::flat(default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tb_ir::{Instrument, InstrumentType, ModInstrument, Note, Pattern};

    fn mod_song(slot: ModSlot, note: Note) -> Song {
        let mut song = Song::with_channels(1, 0, 1);
        song.set_bar_count(2);
        let mut instrument = Instrument::of_type(InstrumentType::Mod, false);
        if let InstrumentKind::Mod { slots } = &mut instrument.kind {
            slots[0] = slot;
        }
        let channel = &mut song.channels[1];
        channel.instruments = vec![instrument];
        let mut pattern = Pattern::new();
        pattern.add_note(note);
        let number = channel.add_pattern(pattern);
        channel.set_bar(0, number);
        song
    }

    #[test]
    fn song_level_value_sounds_with_its_note() {
        let song = mod_song(ModSlot::song(ModSetting::Tempo), Note::new(0, 0, 4, 20));
        let mut values = ModValues::new(song.channels.len());
        values.compute(&song, 0, 0);
        assert_eq!(values.song_value(ModSetting::Tempo), Some(ModValue::flat(50.0)));
        // Part 4 is past the note.
        values.compute(&song, 0, 4 * TICKS_PER_PART as u64);
        assert_eq!(values.song_value(ModSetting::Tempo), None);
    }

    #[test]
    fn instrument_value_reaches_matching_instruments() {
        let slot = ModSlot::instrument(0, ModInstrument::All, ModSetting::Reverb);
        let song = mod_song(slot, Note::new(0, 0, 8, 12));
        let mut values = ModValues::new(song.channels.len());
        values.compute(&song, 0, 3);
        assert_eq!(values.instrument_value(0, 0, ModSetting::Reverb), Some(ModValue::flat(12.0)));
        assert_eq!(values.instrument_value(0, 3, ModSetting::Reverb), Some(ModValue::flat(12.0)));
        assert_eq!(values.instrument_value(0, 0, ModSetting::Chorus), None);
        let mods = values.for_instrument(0, 3);
        assert_eq!(mods.value_or(ModSetting::Reverb, 0.0).start, 12.0);
        assert_eq!(mods.value_or(ModSetting::Chorus, 5.0), ModValue::flat(5.0));
    }

    #[test]
    fn pitch_outside_the_slots_is_ignored() {
        let slot = ModSlot::song(ModSetting::SongVolume);
        let song = mod_song(slot, Note::new(MOD_COUNT as i32, 0, 8, 50));
        let mut values = ModValues::new(song.channels.len());
        values.compute(&song, 0, 0);
        assert_eq!(values.song_value(ModSetting::SongVolume), None);
    }

    #[test]
    fn other_bars_have_no_values() {
        let song = mod_song(ModSlot::song(ModSetting::Tempo), Note::new(0, 0, 4, 20));
        let mut values = ModValues::new(song.channels.len());
        values.compute(&song, 1, 0);
        assert_eq!(values.song_value(ModSetting::Tempo), None);
    }
}
