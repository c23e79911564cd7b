//! Per-tick tone parameters.
//!
//! At the start of every tick each sounding tone is brought up to date:
//! envelopes are evaluated, pitch and loudness are resolved for the start
//! and end of the tick, and the oscillator, filter and string state is
//! loaded as start values plus per-sample deltas for the renderers.

use core::f64::consts::{FRAC_1_SQRT_2, PI, TAU};

use tb_ir::config::{
    fade_in_seconds, fade_out_ticks, instrument_volume_to_mult, operator_amplitude_curve, Chord, Transition,
    ALGORITHMS, ALGORITHMS_6OP, ARPEGGIO_SPEED_SCALE, CHIP_BASE_EXPRESSION, DRUMSET_BASE_EXPRESSION,
    DRUMSET_FADE_OUT_TICKS, DRUM_COUNT, FM_BASE_EXPRESSION, HARMONICS_BASE_EXPRESSION, NOISE_BASE_EXPRESSION,
    NOISE_CENTER_KEY, NOISE_INTERVAL, OPERATOR_CARRIER_INTERVAL, OPERATOR_FREQUENCIES,
    PICKED_STRING_BASE_EXPRESSION, PITCH_SHIFT_CENTER, PULSE_WIDTH_RANGE, PWM_BASE_EXPRESSION,
    SPECTRUM_BASE_EXPRESSION, SPECTRUM_BASE_PITCH, STRING_SUSTAIN_RANGE, SUPERSAW_BASE_EXPRESSION,
    SUPERSAW_DYNAMISM_MAX, SUPERSAW_SHAPE_MAX, SUPERSAW_SPREAD_MAX, SUPERSAW_VOICE_COUNT, TICKS_PER_ARPEGGIO,
};
use tb_ir::{
    AutomationTarget, EffectType, FilterCoefficients, FilterSettings, FilterType, Instrument, InstrumentKind,
    ModSetting, Note, Operator, FILTER_FREQ_MIN_HZ, TICKS_PER_PART,
};

use crate::dynamic_filter::DynamicBiquadFilter;
use crate::envelope_computer::{global_envelope_speed, ToneTiming};
use crate::frequency::{delta_scale, phase_delta, pitch_to_hz};
use crate::mod_values::InstrumentMods;
use crate::synthesis::{
    noise_table_delta, pluck, spectrum_table_delta, string_damping, string_loop_gain, MODULATOR_DEPTH,
    FEEDBACK_DEPTH, SUPERSAW_DETUNES,
};
use crate::tone::{Tone, ToneState, MAX_OSCILLATORS};
use crate::wave_tables::{InstrumentWaves, WaveTables};

/// Detune of the outermost supersaw voices at full spread.
pub const SUPERSAW_SPREAD_SEMITONES: f64 = 1.0;
/// Drum filter cutoff when the drum envelope is at 1.
pub const DRUM_FILTER_MAX_HZ: f64 = 8000.0;

/// Chord behaviour, `Simultaneous` unless the chord effect is on.
pub fn effective_chord(instrument: &Instrument) -> Chord {
    if instrument.effect_enabled(EffectType::Chord) {
        instrument.chord
    } else {
        Chord::Simultaneous
    }
}

/// Transition behaviour, `Normal` unless the transition effect is on.
pub fn effective_transition(instrument: &Instrument) -> Transition {
    if instrument.effect_enabled(EffectType::Transition) {
        instrument.transition
    } else {
        Transition::Normal
    }
}

/// Release length in ticks for the instrument's fade-out. Negative fades
/// happen inside the note, so their release is immediate.
pub fn release_ticks(instrument: &Instrument) -> f64 {
    let ticks = fade_out_setting(instrument);
    if ticks > 0 {
        ticks as f64
    } else {
        0.0
    }
}

fn fade_out_setting(instrument: &Instrument) -> i32 {
    if matches!(instrument.kind, InstrumentKind::Drumset { .. }) {
        DRUMSET_FADE_OUT_TICKS
    } else {
        fade_out_ticks(instrument.fade_out)
    }
}

/// Oscillators a tone of this instrument runs.
pub fn voice_count(instrument: &Instrument) -> usize {
    match &instrument.kind {
        InstrumentKind::Noise { .. } | InstrumentKind::Spectrum { .. } | InstrumentKind::Drumset { .. } => 1,
        InstrumentKind::Fm { .. } | InstrumentKind::Fm6Op { .. } => instrument.kind.operator_count(),
        InstrumentKind::Supersaw { .. } => SUPERSAW_VOICE_COUNT,
        InstrumentKind::Mod { .. } => 0,
        _ => {
            let unison = instrument.unison.settings().voices.clamp(1, 2);
            if effective_chord(instrument).custom_interval() {
                2
            } else {
                unison
            }
        }
    }
}

/// The notes a tone is tied to on this tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct ToneNotes<'a> {
    pub note: Option<&'a Note>,
    pub prev: Option<&'a Note>,
    pub next: Option<&'a Note>,
}

/// Tick-wide inputs shared by every tone of one instrument.
pub struct ToneTick<'a> {
    pub instrument: &'a Instrument,
    pub waves: &'a InstrumentWaves,
    pub tables: &'a WaveTables,
    pub mods: InstrumentMods<'a>,
    pub noise_channel: bool,
    pub key_base_pitch: i32,
    pub sample_rate: f64,
    pub seconds_per_tick: f64,
    /// Whole samples this tick renders.
    pub tick_samples: usize,
    /// Ticks from the bar start to this tick.
    pub tick_in_bar: u64,
    pub bar_start_tick: i64,
}

impl ToneTick<'_> {
    /// Pitch of a note key (pitch plus interval) on this channel.
    pub fn key_to_pitch(&self, key: f64) -> f64 {
        if !self.noise_channel {
            return self.key_base_pitch as f64 + key;
        }
        match &self.instrument.kind {
            InstrumentKind::Noise { wave } => {
                wave.base_pitch() as f64 + (key - NOISE_CENTER_KEY as f64) * NOISE_INTERVAL as f64
            }
            _ => SPECTRUM_BASE_PITCH as f64 + key * NOISE_INTERVAL as f64,
        }
    }

    fn env(&self, tone: &Tone, target: AutomationTarget, index: usize) -> (f64, f64) {
        (tone.envelope.start_value(target, index), tone.envelope.end_value(target, index))
    }

    fn samples(&self) -> f64 {
        self.tick_samples.max(1) as f64
    }
}

// --- Pitch ---

/// Chord pitch this tone plays from `pitches`.
fn chord_pitch(tone: &Tone, index: usize) -> f64 {
    let last = tone.pitches.len().saturating_sub(1);
    tone.pitches.get(index.min(last)).copied().unwrap_or(0) as f64
}

/// Interval of `note` at `tick` ticks into the bar, as (start, end).
fn note_intervals(note: &Note, tick_in_bar: u64) -> (f64, f64) {
    let ticks_per_part = TICKS_PER_PART as f64;
    let start = (tick_in_bar as f64 - note.start as f64 * ticks_per_part) / ticks_per_part;
    (note.interval_at_part(start), note.interval_at_part(start + 1.0 / ticks_per_part))
}

fn neighbour_key(note: &Note, chord_index: usize, at_end: bool) -> f64 {
    let last = note.pitches.len().saturating_sub(1);
    let pitch = note.pitches.get(chord_index.min(last)).copied().unwrap_or(0) as f64;
    let pin = if at_end { note.pins.last() } else { note.pins.first() };
    pitch + pin.map_or(0.0, |p| p.interval as f64)
}

/// Advance the arpeggio and pick the chord tone it lands on.
fn arpeggio_index(tone: &Tone, instrument: &Instrument) -> usize {
    let count = tone.pitches.len().max(1);
    let step = libm::floor(tone.arpeggio_time / TICKS_PER_ARPEGGIO as f64).max(0.0) as usize;
    if count == 2 && !instrument.fast_two_note_arpeggio {
        (step % 4) / 2
    } else {
        step % count
    }
}

fn vibrato_wave(periods: &[f64], time: f64) -> f64 {
    periods.iter().map(|&p| libm::sin(TAU * time / p)).sum()
}

// --- Tick update ---

/// Load `tone`'s parameters for the coming tick and advance its clocks.
pub fn compute_tone(tone: &mut Tone, notes: &ToneNotes<'_>, t: &ToneTick<'_>) {
    let instrument = t.instrument;
    let chord = effective_chord(instrument);
    let transition = effective_transition(instrument);
    let released = tone.state != ToneState::Active;
    let retrigger = tone.at_note_start && !tone.force_continue_at_start && !transition.continues();
    let pluck_now = tone.at_note_start && !tone.force_continue_at_start && !transition.is_seamless();

    if retrigger {
        tone.note_seconds = 0.0;
        tone.vibrato_time = 0.0;
        tone.arpeggio_time = 0.0;
    }
    if chord.arpeggiates() && tone.pitches.len() > 1 {
        tone.chord_index = arpeggio_index(tone, instrument);
    }
    if matches!(instrument.kind, InstrumentKind::Drumset { .. }) {
        tone.drum = (chord_pitch(tone, tone.chord_index).max(0.0) as usize).min(DRUM_COUNT - 1);
    }

    // Key pitch before envelopes; pitch envelopes read it.
    let (key_start, key_end) = match notes.note {
        Some(note) if !released => {
            let base = chord_pitch(tone, tone.chord_index);
            let (i0, i1) = note_intervals(note, t.tick_in_bar);
            (base + i0, base + i1)
        }
        _ => (f64::NAN, f64::NAN),
    };
    let (mut pitch_start, mut pitch_end) = if key_start.is_nan() {
        (tone.last_pitch, tone.last_pitch)
    } else {
        (t.key_to_pitch(key_start), t.key_to_pitch(key_end))
    };

    let envelope_speed = global_envelope_speed(t.mods.value_or(ModSetting::EnvelopeSpeed, instrument.envelope_speed as f64).start);
    let timing = ToneTiming {
        note: notes.note,
        prev_note: notes.prev,
        next_note: notes.next,
        tick_time_start: t.tick_in_bar as f64,
        bar_start_tick: t.bar_start_tick,
        at_note_start: tone.at_note_start,
        force_continue_at_start: tone.force_continue_at_start,
        force_continue_at_end: tone.force_continue_at_end,
        pitch: pitch_start,
    };
    tone.envelope.compute_envelopes(instrument, &timing, t.seconds_per_tick, envelope_speed);
    if let InstrumentKind::Drumset { drums } = &instrument.kind {
        tone.envelope.compute_drumset_envelopes(&drums[tone.drum.min(DRUM_COUNT - 1)]);
    }

    // Slides pull toward the neighbouring note's pitch.
    if transition.slides() && !released {
        let prev = tone.envelope.prev_slide;
        if let Some(note) = notes.prev {
            let neighbour = t.key_to_pitch(neighbour_key(note, tone.chord_index, true));
            if prev.active_start {
                pitch_start += (neighbour - pitch_start) * prev.ratio_start;
            }
            if prev.active_end {
                pitch_end += (neighbour - pitch_end) * prev.ratio_end;
            }
        }
        let next = tone.envelope.next_slide;
        if let Some(note) = notes.next {
            let neighbour = t.key_to_pitch(neighbour_key(note, tone.chord_index, false));
            if next.active_start {
                pitch_start += (neighbour - pitch_start) * next.ratio_start;
            }
            if next.active_end {
                pitch_end += (neighbour - pitch_end) * next.ratio_end;
            }
        }
    }
    tone.last_pitch = pitch_end;

    let (offset_start, offset_end) = pitch_offsets(tone, t);
    pitch_start += offset_start;
    pitch_end += offset_end;

    load_oscillators(tone, t, pitch_start, pitch_end, pluck_now);
    let filter_volume = load_note_filters(tone, t);
    load_drum_filter(tone, t);
    load_expression(tone, notes, t, filter_volume);

    let arpeggio_speed = t.mods.value_or(ModSetting::ArpeggioSpeed, instrument.arpeggio_speed as f64).start;
    let arpeggio_index = libm::round(arpeggio_speed).clamp(0.0, (ARPEGGIO_SPEED_SCALE.len() - 1) as f64) as usize;
    tone.arpeggio_time +=
        ARPEGGIO_SPEED_SCALE[arpeggio_index] * tone.envelope.start_value(AutomationTarget::ArpeggioSpeed, 0);
    tone.vibrato_time += t.seconds_per_tick * instrument.vibrato.speed();
    tone.note_seconds += t.seconds_per_tick;
    tone.at_note_start = false;
    tone.tick_sample = 0;
    tone.envelope.advance();

    if released {
        tone.release_ticks_remaining -= 1.0;
        if tone.release_ticks_remaining <= 0.0 {
            tone.state = ToneState::Done;
        }
    }
}

/// Vibrato, pitch shift and detune in semitones.
fn pitch_offsets(tone: &Tone, t: &ToneTick<'_>) -> (f64, f64) {
    let instrument = t.instrument;
    let mut start = 0.0;
    let mut end = 0.0;

    if instrument.effect_enabled(EffectType::Vibrato) {
        let depth = t.mods.value_or(ModSetting::VibratoDepth, instrument.vibrato.amplitude());
        let (env_start, env_end) = t.env(tone, AutomationTarget::VibratoDepth, 0);
        let delay_seconds = instrument.vibrato.delay_ticks() as f64 * t.seconds_per_tick;
        if tone.note_seconds >= delay_seconds {
            let periods = instrument.vibrato.kind().periods_seconds();
            let time_end = tone.vibrato_time + t.seconds_per_tick * instrument.vibrato.speed();
            start += vibrato_wave(periods, tone.vibrato_time) * depth.start * env_start;
            end += vibrato_wave(periods, time_end) * depth.end * env_end;
        }
    }

    if instrument.effect_enabled(EffectType::PitchShift) {
        let shift = t.mods.value_or(ModSetting::PitchShift, instrument.effect_params.pitch_shift as f64);
        let (env_start, env_end) = t.env(tone, AutomationTarget::PitchShift, 0);
        start += (shift.start - PITCH_SHIFT_CENTER as f64) * env_start;
        end += (shift.end - PITCH_SHIFT_CENTER as f64) * env_end;
    }

    if instrument.effect_enabled(EffectType::Detune) {
        let cents = t.mods.value_or(ModSetting::Detune, instrument.effect_params.detune as f64);
        let (env_start, env_end) = t.env(tone, AutomationTarget::Detune, 0);
        start += cents.start / 100.0 * env_start;
        end += cents.end / 100.0 * env_end;
    }

    (start, end)
}

// --- Oscillators ---

fn set_phase_delta(tone: &mut Tone, voice: usize, start: f64, end: f64, samples: usize) {
    tone.phase_deltas[voice] = start;
    tone.phase_delta_scales[voice] = delta_scale(start, end, samples);
}

/// Per-voice pitch offsets in semitones for unison instruments.
fn unison_offsets(tone: &Tone, t: &ToneTick<'_>) -> ([(f64, f64); 2], f64) {
    let unison = t.instrument.unison.settings();
    let (env_start, env_end) = t.env(tone, AutomationTarget::Unison, 0);
    let voice0 = ((unison.offset + unison.spread) * env_start, (unison.offset + unison.spread) * env_end);
    let voice1 = ((unison.offset - unison.spread) * env_start, (unison.offset - unison.spread) * env_end);
    ([voice0, voice1], unison.sign)
}

fn load_oscillators(tone: &mut Tone, t: &ToneTick<'_>, pitch_start: f64, pitch_end: f64, pluck_now: bool) {
    let instrument = t.instrument;
    let samples = t.tick_samples.max(1);
    let sr = t.sample_rate;
    tone.voices = voice_count(instrument).min(MAX_OSCILLATORS);

    match &instrument.kind {
        InstrumentKind::Noise { wave } => {
            let len = t.tables.noise(*wave).len();
            let start = noise_table_delta(pitch_start, wave.base_pitch(), len, sr);
            let end = noise_table_delta(pitch_end, wave.base_pitch(), len, sr);
            set_phase_delta(tone, 0, start, end, samples);
            tone.noise_filter = (pitch_to_hz(pitch_start) / sr * wave.pitch_filter_mult()).min(1.0);
        }
        InstrumentKind::Spectrum { .. } | InstrumentKind::Drumset { .. } => {
            let start = spectrum_table_delta(pitch_to_hz(pitch_start), sr);
            let end = spectrum_table_delta(pitch_to_hz(pitch_end), sr);
            set_phase_delta(tone, 0, start, end, samples);
            tone.noise_filter = 1.0;
        }
        InstrumentKind::Fm { algorithm, feedback_amplitude, operators, .. } => {
            let algorithm = &ALGORITHMS[(*algorithm).min(ALGORITHMS.len() - 1)];
            load_operators(tone, t, operators, algorithm.carrier_count, algorithm.associated_carrier, pitch_start, pitch_end);
            load_feedback(tone, t, *feedback_amplitude);
        }
        InstrumentKind::Fm6Op { algorithm, feedback_amplitude, operators, .. } => {
            let algorithm = &ALGORITHMS_6OP[(*algorithm).min(ALGORITHMS_6OP.len() - 1)];
            load_operators(tone, t, operators, algorithm.carrier_count, algorithm.associated_carrier, pitch_start, pitch_end);
            load_feedback(tone, t, *feedback_amplitude);
        }
        InstrumentKind::Supersaw { dynamism, spread, shape, pulse_width } => {
            let (spread_env_start, spread_env_end) = t.env(tone, AutomationTarget::SupersawSpread, 0);
            let spread = *spread as f64 / SUPERSAW_SPREAD_MAX as f64 * SUPERSAW_SPREAD_SEMITONES;
            for (v, detune) in SUPERSAW_DETUNES.iter().enumerate() {
                let start = phase_delta(pitch_to_hz(pitch_start + detune * spread * spread_env_start), sr);
                let end = phase_delta(pitch_to_hz(pitch_end + detune * spread * spread_env_end), sr);
                set_phase_delta(tone, v, start, end, samples);
            }
            let (d0, d1) = t.env(tone, AutomationTarget::SupersawDynamism, 0);
            let dynamism = *dynamism as f64 / SUPERSAW_DYNAMISM_MAX as f64;
            tone.supersaw_dynamism = dynamism * d0;
            tone.supersaw_dynamism_delta = (dynamism * d1 - dynamism * d0) / samples as f64;
            let (s0, s1) = t.env(tone, AutomationTarget::SupersawShape, 0);
            let shape = *shape as f64 / SUPERSAW_SHAPE_MAX as f64;
            tone.supersaw_shape = shape * s0;
            tone.supersaw_shape_delta = (shape * s1 - shape * s0) / samples as f64;
            load_pulse_width(tone, t, *pulse_width);
        }
        _ => {
            let (offsets, sign) = unison_offsets(tone, t);
            let custom_interval = effective_chord(instrument).custom_interval();
            for v in 0..tone.voices.min(2) {
                // A custom-interval chord plays its second pitch on voice 1.
                let shift = if custom_interval && v == 1 && tone.pitches.len() > 1 {
                    (chord_pitch(tone, 1) - chord_pitch(tone, 0)) * pitch_step(t)
                } else {
                    0.0
                };
                let start = phase_delta(pitch_to_hz(pitch_start + shift + offsets[v].0), sr);
                let end = phase_delta(pitch_to_hz(pitch_end + shift + offsets[v].1), sr);
                set_phase_delta(tone, v, start, end, samples);
            }
            tone.voice_signs[0] = 1.0;
            tone.voice_signs[1] = sign;

            match &instrument.kind {
                InstrumentKind::Pwm { pulse_width } => load_pulse_width(tone, t, *pulse_width),
                InstrumentKind::PickedString { string_sustain, .. } => {
                    load_strings(tone, t, *string_sustain, pluck_now);
                }
                _ => {}
            }
        }
    }
}

/// Semitones per key step on this channel.
fn pitch_step(t: &ToneTick<'_>) -> f64 {
    if t.noise_channel {
        NOISE_INTERVAL as f64
    } else {
        1.0
    }
}

fn load_operators(
    tone: &mut Tone,
    t: &ToneTick<'_>,
    operators: &[Operator],
    carrier_count: usize,
    associated_carrier: &[u8],
    pitch_start: f64,
    pitch_end: f64,
) {
    let samples = t.tick_samples.max(1);
    for (i, op) in operators.iter().enumerate().take(MAX_OSCILLATORS) {
        let freq = &OPERATOR_FREQUENCIES[op.frequency.min(OPERATOR_FREQUENCIES.len() - 1)];
        let carrier = associated_carrier.get(i).map_or(0, |&c| (c as usize).saturating_sub(1));
        let interval = OPERATOR_CARRIER_INTERVAL[carrier.min(OPERATOR_CARRIER_INTERVAL.len() - 1)];
        let (f0, f1) = t.env(tone, AutomationTarget::OperatorFrequency, i);
        let hz_start = pitch_to_hz(pitch_start + interval) * freq.mult * f0 + freq.hz_offset;
        let hz_end = pitch_to_hz(pitch_end + interval) * freq.mult * f1 + freq.hz_offset;
        let start = phase_delta(hz_start, t.sample_rate);
        let end = phase_delta(hz_end, t.sample_rate);
        set_phase_delta(tone, i, start, end, samples);

        let (a0, a1) = t.env(tone, AutomationTarget::OperatorAmplitude, i);
        let depth = if i < carrier_count { 1.0 } else { MODULATOR_DEPTH };
        let curve = operator_amplitude_curve(op.amplitude as f64) * freq.amplitude_sign * depth;
        tone.operator_expressions[i] = curve * a0;
        tone.operator_expression_deltas[i] = (curve * a1 - curve * a0) / samples as f64;
    }
}

fn load_feedback(tone: &mut Tone, t: &ToneTick<'_>, amplitude: u8) {
    let (f0, f1) = t.env(tone, AutomationTarget::FeedbackAmplitude, 0);
    let curve = operator_amplitude_curve(amplitude as f64) * FEEDBACK_DEPTH;
    tone.feedback_mult = curve * f0;
    tone.feedback_delta = (curve * f1 - curve * f0) / t.samples();
}

fn load_pulse_width(tone: &mut Tone, t: &ToneTick<'_>, setting: u8) {
    let setting = t.mods.value_or(ModSetting::PulseWidth, setting as f64);
    let (p0, p1) = t.env(tone, AutomationTarget::PulseWidth, 0);
    let scale = 1.0 / (PULSE_WIDTH_RANGE as f64 * 2.0);
    let start = (setting.start * scale * p0).clamp(0.0, 0.5);
    let end = (setting.end * scale * p1).clamp(0.0, 0.5);
    tone.pulse_width = start;
    tone.pulse_width_delta = (end - start) / t.samples();
}

fn load_strings(tone: &mut Tone, t: &ToneTick<'_>, sustain_setting: u8, pluck_now: bool) {
    let (s0, s1) = t.env(tone, AutomationTarget::StringSustain, 0);
    let sustain = sustain_setting as f64 / (STRING_SUSTAIN_RANGE - 1) as f64;
    let (sustain_start, sustain_end) = (sustain * s0, sustain * s1);
    for v in 0..tone.voices.min(2) {
        let delta = tone.phase_deltas[v];
        let period = if delta > 0.0 { 1.0 / delta } else { 2.0 };
        let end_delta = delta * libm::pow(tone.phase_delta_scales[v], t.tick_samples as f64);
        let end_period = if end_delta > 0.0 { 1.0 / end_delta } else { period };
        if pluck_now {
            if let Some(wave) = t.waves.integrated() {
                pluck(tone, v, wave, period);
            }
        }
        let loss_start = string_loop_gain(sustain_start, period, t.sample_rate);
        let loss_end = string_loop_gain(sustain_end, end_period, t.sample_rate);
        let string = &mut tone.strings[v];
        string.loss = loss_start;
        string.loss_delta = (loss_end - loss_start) / t.samples();
        string.damping = string_damping(sustain_start);
    }
}

// --- Filters ---

/// Load the note filter cascade. Returns its loudness correction.
fn load_note_filters(tone: &mut Tone, t: &ToneTick<'_>) -> f64 {
    let instrument = t.instrument;
    if !instrument.effect_enabled(EffectType::NoteFilter) || instrument.note_filter.is_empty() {
        tone.note_filters.clear();
        return 1.0;
    }
    let morph = t.mods.value_or(ModSetting::NoteFilterMorph, instrument.note_filter_morph);
    let start_settings = instrument.morphed_note_filter_at(morph.start);
    let end_settings = instrument.morphed_note_filter_at(morph.end);
    let end_settings: &FilterSettings =
        if start_settings.can_morph(&end_settings) { &end_settings } else { &start_settings };

    while tone.note_filters.len() > start_settings.len() {
        tone.note_filters.pop();
    }
    while tone.note_filters.len() < start_settings.len() {
        tone.note_filters.push(DynamicBiquadFilter::new());
    }

    let (all0, all1) = t.env(tone, AutomationTarget::NoteFilterAllFreqs, 0);
    let delta_rate = 1.0 / t.samples();
    let mut volume = 1.0;
    for (i, (a, b)) in start_settings.points.iter().zip(end_settings.points.iter()).enumerate() {
        let (f0, f1) = t.env(tone, AutomationTarget::NoteFilterFreq, i);
        let (g0, g1) = t.env(tone, AutomationTarget::NoteFilterGain, i);
        let start = a.to_coefficients(t.sample_rate, all0 * f0, g0);
        let end = b.to_coefficients(t.sample_rate, all1 * f1, g1);
        let multiplicative = a.kind != FilterType::Peak;
        tone.note_filters[i].load_coefficients_with_gradient(&start, &end, delta_rate, multiplicative);
        volume *= a.volume_compensation_mult();
    }
    volume
}

fn drum_filter_coefficients(envelope: f64, sample_rate: f64) -> FilterCoefficients {
    let hz = (envelope * DRUM_FILTER_MAX_HZ).max(FILTER_FREQ_MIN_HZ);
    let corner = (TAU * hz / sample_rate).min(PI * 0.999);
    FilterCoefficients::low_pass_2nd_order_butterworth(corner, FRAC_1_SQRT_2)
}

fn load_drum_filter(tone: &mut Tone, t: &ToneTick<'_>) {
    if !matches!(t.instrument.kind, InstrumentKind::Drumset { .. }) {
        tone.drum_filter = None;
        return;
    }
    let start = drum_filter_coefficients(tone.envelope.drum_start, t.sample_rate);
    let end = drum_filter_coefficients(tone.envelope.drum_end, t.sample_rate);
    let delta_rate = 1.0 / t.samples();
    tone.drum_filter
        .get_or_insert_with(DynamicBiquadFilter::new)
        .load_coefficients_with_gradient(&start, &end, delta_rate, true);
}

// --- Loudness ---

/// Loudness of the instrument type before envelopes.
pub fn base_expression(instrument: &Instrument) -> f64 {
    let unison = instrument.unison.settings().expression;
    match &instrument.kind {
        InstrumentKind::Chip { wave } => CHIP_BASE_EXPRESSION * wave.expression() * unison,
        InstrumentKind::CustomChipWave { .. } => CHIP_BASE_EXPRESSION * unison,
        InstrumentKind::Fm { .. } | InstrumentKind::Fm6Op { .. } => FM_BASE_EXPRESSION,
        InstrumentKind::Noise { wave } => NOISE_BASE_EXPRESSION * wave.expression(),
        InstrumentKind::Spectrum { .. } => SPECTRUM_BASE_EXPRESSION,
        InstrumentKind::Drumset { .. } => DRUMSET_BASE_EXPRESSION,
        InstrumentKind::Harmonics { .. } => HARMONICS_BASE_EXPRESSION * unison,
        InstrumentKind::Pwm { .. } => PWM_BASE_EXPRESSION * unison,
        InstrumentKind::Supersaw { .. } => SUPERSAW_BASE_EXPRESSION,
        InstrumentKind::PickedString { .. } => PICKED_STRING_BASE_EXPRESSION * unison,
        InstrumentKind::Mod { .. } => 0.0,
    }
}

fn volume_mult(volume: f64) -> f64 {
    instrument_volume_to_mult(libm::round(volume) as i32)
}

/// Fade-in and fade-out gain at the start and end of the tick.
fn fade_gains(tone: &Tone, notes: &ToneNotes<'_>, t: &ToneTick<'_>) -> (f64, f64) {
    let instrument = t.instrument;
    let mut start = 1.0;
    let mut end = 1.0;

    let fade_in = fade_in_seconds(instrument.fade_in);
    if fade_in > 0.0 {
        start *= (tone.note_seconds / fade_in).min(1.0);
        end *= ((tone.note_seconds + t.seconds_per_tick) / fade_in).min(1.0);
    }

    if tone.state == ToneState::Released {
        let total = tone.release_ticks_total.max(1.0);
        start *= (tone.release_ticks_remaining / total).clamp(0.0, 1.0);
        end *= ((tone.release_ticks_remaining - 1.0) / total).clamp(0.0, 1.0);
        return (start, end);
    }

    let fade_out = fade_out_setting(instrument);
    let joined = tone.force_continue_at_end || notes.next.is_some();
    if let (true, false, Some(note)) = (fade_out < 0, joined, notes.note) {
        let fade = (-fade_out) as f64;
        let remaining = (note.end as f64 * TICKS_PER_PART as f64 - t.tick_in_bar as f64).max(0.0);
        start *= (remaining / fade).min(1.0);
        end *= ((remaining - 1.0) / fade).clamp(0.0, 1.0);
    }
    (start, end)
}

fn load_expression(tone: &mut Tone, notes: &ToneNotes<'_>, t: &ToneTick<'_>, filter_volume: f64) {
    let instrument = t.instrument;
    let volume = t.mods.value_or(ModSetting::MixVolume, instrument.volume as f64);
    let (note0, note1) = t.env(tone, AutomationTarget::NoteVolume, 0);
    let (fade0, fade1) = fade_gains(tone, notes, t);
    let drum = if matches!(instrument.kind, InstrumentKind::Drumset { .. }) {
        tone.envelope.drum_volume_compensation
    } else {
        1.0
    };
    let base = base_expression(instrument) * filter_volume * drum;
    let start = base * volume_mult(volume.start) * note0 * fade0;
    let end = base * volume_mult(volume.end) * note1 * fade1;
    let start = if start.is_finite() { start } else { 0.0 };
    let end = if end.is_finite() { end } else { 0.0 };
    tone.expression = start;
    tone.expression_delta = (end - start) / t.samples();
}
