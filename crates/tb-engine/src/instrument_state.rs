//! Runtime state of one instrument.
//!
//! An instrument owns the tones it has checked out of the shared pool, its
//! effect chain and a pair of scratch buffers the size of one block. Tones
//! follow the notes handed to [`InstrumentState::update_tones`]; when a note
//! ends they move to the released list and fade out there while the next
//! note starts on fresh tones.

use alloc::vec;
use alloc::vec::Vec;
use arrayvec::ArrayVec;

use tb_ir::config::{
    Chord, BITCRUSHER_FREQ_RANGE, BITCRUSHER_QUANTIZATION_RANGE, CHORUS_RANGE, DISTORTION_RANGE, ECHO_SUSTAIN_RANGE,
    GRANULAR_RANGE, MAX_CHORD_SIZE, PAN_MAX, REVERB_RANGE, RING_MOD_HZ_RANGE, RING_MOD_RANGE,
};
use tb_ir::{AutomationTarget, Channel, EffectSet, Instrument, InstrumentType, ModSetting, Note, TICKS_PER_PART};

use crate::channel::{resolve_note, NoteContext};
use crate::config::EngineConfig;
use crate::deque::Deque;
use crate::effects::{tail_samples, EffectChain, EffectLevels, EffectTick, Ramp};
use crate::mod_values::InstrumentMods;
use crate::synthesis::render_tone;
use crate::tone::{NoteRef, Tone};
use crate::tone_params::{compute_tone, effective_chord, effective_transition, release_ticks, ToneNotes, ToneTick};
use crate::tone_pool::{ToneKey, TonePool};
use crate::wave_tables::{InstrumentWaves, WaveTables};

/// Song-wide timing of the tick being computed.
#[derive(Clone, Copy, Debug)]
pub struct TickInfo {
    pub sample_rate: f64,
    pub seconds_per_tick: f64,
    pub samples_per_tick: f64,
    /// Whole samples this tick renders.
    pub tick_samples: usize,
    pub tick_in_bar: u64,
    pub bar_start_tick: i64,
    pub key_base_pitch: i32,
}

pub struct InstrumentState {
    /// Per-instrument tables (custom chip, harmonics, spectrum, drums).
    pub(crate) waves: InstrumentWaves,
    effects: EffectChain,
    effect_set: EffectSet,
    instrument_type: InstrumentType,
    noise_channel: bool,
    /// Tones playing the current note.
    active: ArrayVec<ToneKey, MAX_CHORD_SIZE>,
    /// Tones fading out, oldest first.
    released: Deque<ToneKey>,
    max_released: usize,
    /// Note the active tones belong to.
    active_note: Option<NoteRef>,
    /// Samples of effect tail still to render once all tones are gone.
    tail_samples: usize,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl InstrumentState {
    pub fn new(instrument: &Instrument, noise_channel: bool, config: &EngineConfig) -> Self {
        Self {
            waves: InstrumentWaves::for_kind(&instrument.kind, noise_channel),
            effects: EffectChain::new(instrument.effects, config.sample_rate_f64()),
            effect_set: instrument.effects,
            instrument_type: instrument.instrument_type(),
            noise_channel,
            active: ArrayVec::new(),
            released: Deque::with_capacity(config.max_tones_per_instrument),
            max_released: config.max_tones_per_instrument.max(1),
            active_note: None,
            tail_samples: 0,
            left: vec![0.0; config.block_size],
            right: vec![0.0; config.block_size],
        }
    }

    /// Whether this state can keep serving `instrument` after an edit.
    pub fn matches(&self, instrument: &Instrument) -> bool {
        self.instrument_type == instrument.instrument_type() && self.effect_set == instrument.effects
    }

    /// Rebuild the per-instrument tables after an edit.
    pub fn refresh_waves(&mut self, instrument: &Instrument) {
        self.waves = InstrumentWaves::for_kind(&instrument.kind, self.noise_channel);
    }

    pub fn tone_count(&self) -> usize {
        self.active.len() + self.released.len()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Tones playing the current note, one per chord pitch.
    pub fn active_tones(&self) -> &[ToneKey] {
        &self.active
    }

    /// Tones are sounding or effects are still ringing.
    pub fn is_awake(&self) -> bool {
        self.tone_count() > 0 || self.tail_samples > 0
    }

    // --- Tone lifecycle ---

    /// Follow the note `ctx` (or silence) on this tick.
    pub fn update_tones(
        &mut self,
        ctx: Option<&NoteContext<'_>>,
        instrument: &Instrument,
        tick_in_bar: u64,
        pool: &mut TonePool,
    ) {
        let Some(ctx) = ctx else {
            self.release_active(instrument, pool);
            return;
        };
        let chord = effective_chord(instrument);
        let total = if chord.single_tone() { 1 } else { ctx.note.pitches.len().clamp(1, MAX_CHORD_SIZE) };

        if self.active_note != Some(ctx.note_ref) {
            let transition = effective_transition(instrument);
            let joins = !self.active.is_empty()
                && (ctx.force_continue_at_start
                    || (transition.is_seamless() && ctx.prev.map(|(r, _)| r) == self.active_note));
            if joins {
                while self.active.len() > total {
                    if let Some(key) = self.active.pop() {
                        self.release_tone(key, instrument, pool);
                    }
                }
                for &key in self.active.iter() {
                    if let Some(tone) = pool.get_mut(key) {
                        tone.at_note_start = true;
                    }
                }
            } else {
                self.release_active(instrument, pool);
            }
            self.active_note = Some(ctx.note_ref);
        }

        let due = due_tone_count(chord, ctx.note, total, tick_in_bar);
        while self.active.len() < due {
            let key = pool.checkout();
            if self.active.try_push(key).is_err() {
                pool.release(key);
                break;
            }
        }

        for (i, &key) in self.active.iter().enumerate() {
            if let Some(tone) = pool.get_mut(key) {
                assign_note(tone, ctx, chord, instrument, i);
            }
        }
    }

    fn release_tone(&mut self, key: ToneKey, instrument: &Instrument, pool: &mut TonePool) {
        let Some(tone) = pool.get_mut(key) else {
            return;
        };
        tone.release(release_ticks(instrument));
        if tone.is_done() {
            pool.release(key);
            return;
        }
        if self.released.len() >= self.max_released {
            if let Some(oldest) = self.released.pop_front() {
                pool.release(oldest);
                #[cfg(feature = "tracing")]
                tracing::trace!("released tone stolen");
            }
        }
        self.released.push_back(key);
    }

    fn release_active(&mut self, instrument: &Instrument, pool: &mut TonePool) {
        while let Some(key) = self.active.pop() {
            self.release_tone(key, instrument, pool);
        }
        self.active_note = None;
    }

    /// Hand every tone back to the pool at once.
    pub fn release_all(&mut self, pool: &mut TonePool) {
        for key in self.active.drain(..) {
            pool.release(key);
        }
        while let Some(key) = self.released.pop_front() {
            pool.release(key);
        }
        self.active_note = None;
    }

    /// Silence the effect tails.
    pub fn clear_effect_state(&mut self) {
        self.effects.clear();
        self.tail_samples = 0;
    }

    // --- Tick ---

    /// Load every tone and the effect chain for the coming tick.
    pub fn compute(
        &mut self,
        channel: &Channel,
        instrument: &Instrument,
        info: &TickInfo,
        mods: InstrumentMods<'_>,
        tables: &WaveTables,
        pool: &mut TonePool,
    ) {
        for _ in 0..self.released.len() {
            let Some(key) = self.released.pop_front() else {
                break;
            };
            if pool.get(key).map_or(true, Tone::is_done) {
                pool.release(key);
            } else {
                self.released.push_back(key);
            }
        }

        let t = ToneTick {
            instrument,
            waves: &self.waves,
            tables,
            mods,
            noise_channel: self.noise_channel,
            key_base_pitch: info.key_base_pitch,
            sample_rate: info.sample_rate,
            seconds_per_tick: info.seconds_per_tick,
            tick_samples: info.tick_samples,
            tick_in_bar: info.tick_in_bar,
            bar_start_tick: info.bar_start_tick,
        };
        for &key in self.active.iter().chain(self.released.iter()) {
            let Some(tone) = pool.get_mut(key) else {
                continue;
            };
            let notes = ToneNotes {
                note: tone.note.and_then(|r| resolve_note(channel, r)),
                prev: tone.prev_note.and_then(|r| resolve_note(channel, r)),
                next: tone.next_note.and_then(|r| resolve_note(channel, r)),
            };
            compute_tone(tone, &notes, &t);
        }

        let lead = self.active.first().or_else(|| self.released.front()).and_then(|&key| pool.get(key));
        let levels = effect_levels(instrument, mods, lead);
        let tick = EffectTick {
            params: &instrument.effect_params,
            eq_filter: &instrument.eq_filter,
            levels,
            sample_rate: info.sample_rate,
            samples_per_tick: info.samples_per_tick,
            run_length: info.tick_samples,
        };
        self.effects.tick(&tick);
        if self.tone_count() > 0 {
            self.tail_samples = tail_samples(self.effect_set, &tick);
        }
    }

    /// Render `len` samples into the scratch buffers. Returns false when
    /// the instrument is silent and nothing was written.
    pub fn render(&mut self, len: usize, instrument: &Instrument, tables: &WaveTables, pool: &mut TonePool) -> bool {
        if !self.is_awake() {
            return false;
        }
        let len = len.min(self.left.len());
        let left = &mut self.left[..len];
        let right = &mut self.right[..len];
        left.fill(0.0);
        right.fill(0.0);
        for &key in self.active.iter().chain(self.released.iter()) {
            if let Some(tone) = pool.get_mut(key) {
                render_tone(tone, &instrument.kind, &self.waves, tables, left);
            }
        }
        self.effects.process(left, right);
        if self.tone_count() == 0 {
            self.tail_samples = self.tail_samples.saturating_sub(len);
        }
        true
    }

    /// The last rendered samples.
    pub fn output(&self, len: usize) -> (&[f32], &[f32]) {
        let len = len.min(self.left.len());
        (&self.left[..len], &self.right[..len])
    }
}

/// Tones a note wants by `tick_in_bar`. Strums add one pitch per strum step.
fn due_tone_count(chord: Chord, note: &Note, total: usize, tick_in_bar: u64) -> usize {
    let steps = chord.strum_parts() as u64 * TICKS_PER_PART as u64;
    if steps == 0 {
        return total;
    }
    let note_start = note.start as u64 * TICKS_PER_PART as u64;
    let into = tick_in_bar.saturating_sub(note_start);
    total.min(1 + (into / steps) as usize)
}

fn assign_note(tone: &mut Tone, ctx: &NoteContext<'_>, chord: Chord, instrument: &Instrument, index: usize) {
    let pitches = &ctx.note.pitches;
    tone.pitches.clear();
    tone.pitches.extend(pitches.iter().copied());
    tone.chord_size = pitches.len();
    let last = pitches.len().saturating_sub(1);
    match chord {
        Chord::Monophonic => tone.chord_index = instrument.mono_chord_tone.min(last),
        Chord::CustomInterval => tone.chord_index = 0,
        // The arpeggio clock picks the pitch.
        Chord::Arpeggio => tone.chord_index = tone.chord_index.min(last),
        Chord::Simultaneous | Chord::Strum => tone.chord_index = index.min(last),
    }
    tone.note = Some(ctx.note_ref);
    tone.prev_note = ctx.prev.map(|(r, _)| r);
    tone.next_note = ctx.next.map(|(r, _)| r);
    tone.force_continue_at_start = ctx.force_continue_at_start;
    tone.force_continue_at_end = ctx.force_continue_at_end;
}

fn normalized(value: f64, range: u8) -> f64 {
    (value / (range.max(2) - 1) as f64).clamp(0.0, 1.0)
}

/// One effect amount: the mod value or the instrument setting, normalized
/// and scaled by the instrument-level envelope.
fn level(mods: InstrumentMods<'_>, setting: ModSetting, value: u8, range: u8, env: (f64, f64)) -> Ramp {
    let v = mods.value_or(setting, value as f64);
    Ramp::new(normalized(v.start, range), normalized(v.end, range)).scaled(env.0, env.1)
}

fn effect_levels(instrument: &Instrument, mods: InstrumentMods<'_>, lead: Option<&Tone>) -> EffectLevels {
    let env = |target: AutomationTarget| {
        lead.map_or((1.0, 1.0), |tone| (tone.envelope.start_value(target, 0), tone.envelope.end_value(target, 0)))
    };
    let p = &instrument.effect_params;
    let pan = mods.value_or(ModSetting::Pan, p.pan as f64);
    let (pan0, pan1) = env(AutomationTarget::Panning);
    let centered = |value: f64, e: f64| (0.5 + (value / PAN_MAX as f64 - 0.5) * e).clamp(0.0, 1.0);
    EffectLevels {
        distortion: level(mods, ModSetting::Distortion, p.distortion, DISTORTION_RANGE, env(AutomationTarget::Distortion)),
        bitcrusher_freq: level(
            mods,
            ModSetting::BitcrusherFreq,
            p.bitcrusher_freq,
            BITCRUSHER_FREQ_RANGE,
            env(AutomationTarget::BitcrusherFrequency),
        ),
        bitcrusher_quantization: level(
            mods,
            ModSetting::BitcrusherQuantization,
            p.bitcrusher_quantization,
            BITCRUSHER_QUANTIZATION_RANGE,
            env(AutomationTarget::BitcrusherQuantization),
        ),
        ring_mod: level(mods, ModSetting::RingModulation, p.ring_mod, RING_MOD_RANGE, env(AutomationTarget::RingModulation)),
        // No mod setting drives the carrier pitch.
        ring_mod_hz: level(mods, ModSetting::None, p.ring_mod_hz, RING_MOD_HZ_RANGE, env(AutomationTarget::RingModulationHz)),
        granular: level(mods, ModSetting::Granular, p.granular, GRANULAR_RANGE, env(AutomationTarget::Granular)),
        pan: Ramp::new(centered(pan.start, pan0), centered(pan.end, pan1)),
        chorus: level(mods, ModSetting::Chorus, p.chorus, CHORUS_RANGE, env(AutomationTarget::Chorus)),
        echo_sustain: level(mods, ModSetting::EchoSustain, p.echo_sustain, ECHO_SUSTAIN_RANGE, env(AutomationTarget::EchoSustain)),
        reverb: level(mods, ModSetting::Reverb, p.reverb, REVERB_RANGE, env(AutomationTarget::Reverb)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::note_context;
    use crate::mod_values::ModValues;
    use tb_ir::config::Transition;
    use tb_ir::{EffectType, Pattern, Song};

    fn init_song(notes: &[tb_ir::Note], instrument: Instrument) -> Song {
        let mut song = Song::with_channels(1, 0, 0);
        song.set_bar_count(2);
        song.channels[0].instruments = vec![instrument];
        let mut pattern = Pattern::new();
        for note in notes {
            pattern.add_note(note.clone());
        }
        let number = song.channels[0].add_pattern(pattern);
        song.channels[0].set_bar(0, number);
        song
    }

    fn info(tick_in_bar: u64) -> TickInfo {
        TickInfo {
            sample_rate: 44100.0,
            seconds_per_tick: 0.01,
            samples_per_tick: 441.0,
            tick_samples: 441,
            tick_in_bar,
            bar_start_tick: 0,
            key_base_pitch: 12,
        }
    }

    /// Drive one instrument through `ticks` ticks of bar 0, returning the
    /// active tone count after each.
    fn run(song: &Song, state: &mut InstrumentState, pool: &mut TonePool, ticks: u64) -> Vec<usize> {
        let mods = ModValues::new(1);
        let tables = WaveTables::new(true);
        let channel = &song.channels[0];
        let instrument = &channel.instruments[0];
        let transition = effective_transition(instrument);
        let mut counts = Vec::new();
        for tick in 0..ticks {
            let part = (tick / TICKS_PER_PART as u64) as u32;
            let ctx = note_context(song, channel, 0, part, 0, transition);
            state.update_tones(ctx.as_ref(), instrument, tick, pool);
            state.compute(channel, instrument, &info(tick), mods.for_instrument(0, 0), &tables, pool);
            state.render(441, instrument, &tables, pool);
            counts.push(state.active_count());
        }
        counts
    }

    fn chord_note(pitches: &[i32], start: u32, end: u32) -> tb_ir::Note {
        let mut note = tb_ir::Note::new(pitches[0], start, end, 6);
        note.pitches.clear();
        note.pitches.extend(pitches.iter().copied());
        note
    }

    #[test]
    fn simultaneous_chord_plays_one_tone_per_pitch() {
        let song = init_song(&[chord_note(&[40, 44, 47], 0, 4)], Instrument::of_type(InstrumentType::Chip, false));
        let mut state = InstrumentState::new(&song.channels[0].instruments[0], false, &EngineConfig::default());
        let mut pool = TonePool::with_capacity(16);
        let counts = run(&song, &mut state, &mut pool, 4);
        assert_eq!(counts, [3, 3, 3, 3]);
        let (left, right) = state.output(441);
        assert!(left.iter().any(|&s| s != 0.0));
        assert_eq!(left, right);
    }

    #[test]
    fn strum_adds_a_pitch_each_part() {
        let mut instrument = Instrument::of_type(InstrumentType::Chip, false);
        instrument.chord = Chord::Strum;
        instrument.effects.insert(EffectType::Chord);
        let song = init_song(&[chord_note(&[40, 44, 47], 0, 8)], instrument);
        let mut state = InstrumentState::new(&song.channels[0].instruments[0], false, &EngineConfig::default());
        let mut pool = TonePool::with_capacity(16);
        let per_part = TICKS_PER_PART as u64;
        let counts = run(&song, &mut state, &mut pool, 3 * per_part + 1);
        assert_eq!(counts[0], 1);
        assert_eq!(counts[per_part as usize], 2);
        assert_eq!(counts[3 * per_part as usize], 3);
    }

    #[test]
    fn arpeggio_shares_one_tone() {
        let mut instrument = Instrument::of_type(InstrumentType::Chip, false);
        instrument.chord = Chord::Arpeggio;
        instrument.effects.insert(EffectType::Chord);
        let song = init_song(&[chord_note(&[40, 44, 47], 0, 4)], instrument);
        let mut state = InstrumentState::new(&song.channels[0].instruments[0], false, &EngineConfig::default());
        let mut pool = TonePool::with_capacity(16);
        assert_eq!(run(&song, &mut state, &mut pool, 2), [1, 1]);
    }

    #[test]
    fn note_end_moves_tones_to_release() {
        let mut instrument = Instrument::of_type(InstrumentType::Chip, false);
        instrument.fade_out = 5;
        let song = init_song(&[tb_ir::Note::new(40, 0, 1, 6)], instrument);
        let mut state = InstrumentState::new(&song.channels[0].instruments[0], false, &EngineConfig::default());
        let mut pool = TonePool::with_capacity(16);
        let per_part = TICKS_PER_PART as u64;
        let counts = run(&song, &mut state, &mut pool, per_part + 1);
        assert_eq!(counts[per_part as usize], 0);
        assert_eq!(state.tone_count(), 1);
        // Long after the fade every tone is back in the pool.
        let mods = ModValues::new(1);
        let tables = WaveTables::new(true);
        let channel = &song.channels[0];
        for tick in 0..20 {
            state.update_tones(None, &channel.instruments[0], 40 + tick, &mut pool);
            state.compute(channel, &channel.instruments[0], &info(40 + tick), mods.for_instrument(0, 0), &tables, &mut pool);
        }
        assert_eq!(state.tone_count(), 0);
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn seamless_transition_keeps_the_tone() {
        let mut instrument = Instrument::of_type(InstrumentType::Chip, false);
        instrument.transition = Transition::Interrupt;
        instrument.effects.insert(EffectType::Transition);
        let song = init_song(&[tb_ir::Note::new(40, 0, 1, 6), tb_ir::Note::new(42, 1, 2, 6)], instrument);
        let mut state = InstrumentState::new(&song.channels[0].instruments[0], false, &EngineConfig::default());
        let mut pool = TonePool::with_capacity(16);
        let per_part = TICKS_PER_PART as u64;
        run(&song, &mut state, &mut pool, per_part + 1);
        assert_eq!(state.tone_count(), 1);
        assert_eq!(pool.active_count(), 1);
    }

    #[test]
    fn normal_transition_retriggers() {
        let mut instrument = Instrument::of_type(InstrumentType::Chip, false);
        instrument.fade_out = 5;
        let song = init_song(&[tb_ir::Note::new(40, 0, 1, 6), tb_ir::Note::new(42, 1, 2, 6)], instrument);
        let mut state = InstrumentState::new(&song.channels[0].instruments[0], false, &EngineConfig::default());
        let mut pool = TonePool::with_capacity(16);
        let per_part = TICKS_PER_PART as u64;
        run(&song, &mut state, &mut pool, per_part + 1);
        assert_eq!(state.active_count(), 1);
        assert_eq!(state.tone_count(), 2);
    }

    #[test]
    fn released_tones_are_capped() {
        let mut instrument = Instrument::of_type(InstrumentType::Chip, false);
        instrument.fade_out = 9;
        let notes: Vec<_> = (0..6).map(|i| tb_ir::Note::new(40 + i as i32, i, i + 1, 6)).collect();
        let song = init_song(&notes, instrument);
        let config = EngineConfig { max_tones_per_instrument: 2, ..EngineConfig::default() };
        let mut state = InstrumentState::new(&song.channels[0].instruments[0], false, &config);
        let mut pool = TonePool::with_capacity(16);
        run(&song, &mut state, &mut pool, 6 * TICKS_PER_PART as u64);
        assert!(state.tone_count() <= 3);
        assert_eq!(pool.active_count(), state.tone_count());
    }

    #[test]
    fn reverb_rings_after_the_note() {
        let mut instrument = Instrument::of_type(InstrumentType::Chip, false);
        instrument.effects.insert(EffectType::Reverb);
        instrument.effect_params.reverb = REVERB_RANGE - 1;
        let song = init_song(&[tb_ir::Note::new(40, 0, 1, 6)], instrument);
        let mut state = InstrumentState::new(&song.channels[0].instruments[0], false, &EngineConfig::default());
        let mut pool = TonePool::with_capacity(16);
        run(&song, &mut state, &mut pool, 2 * TICKS_PER_PART as u64);
        assert_eq!(state.tone_count(), 0);
        assert!(state.is_awake());
        state.clear_effect_state();
        assert!(!state.is_awake());
    }

    #[test]
    fn matches_tracks_type_and_effects() {
        let instrument = Instrument::of_type(InstrumentType::Chip, false);
        let state = InstrumentState::new(&instrument, false, &EngineConfig::default());
        assert!(state.matches(&instrument));
        let mut edited = instrument.clone();
        edited.effects.insert(EffectType::Echo);
        assert!(!state.matches(&edited));
        assert!(!state.matches(&Instrument::of_type(InstrumentType::Fm, false)));
    }

    #[test]
    fn pan_follows_the_setting() {
        let mut instrument = Instrument::of_type(InstrumentType::Chip, false);
        instrument.effect_params.pan = PAN_MAX;
        let mods = ModValues::new(1);
        let levels = effect_levels(&instrument, mods.for_instrument(0, 0), None);
        assert_eq!(levels.pan, Ramp::flat(1.0));
        instrument.effect_params.reverb = REVERB_RANGE - 1;
        assert_eq!(effect_levels(&instrument, mods.for_instrument(0, 0), None).reverb, Ramp::flat(1.0));
    }
}
