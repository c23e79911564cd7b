//! A sounding (or fading) note.
//!
//! Tones are recycled through the [`TonePool`](crate::tone_pool::TonePool);
//! everything a tone needs while rendering lives inline so a reused tone
//! never allocates. The one exception is the picked-string delay line,
//! which is sized the first time the tone plays a string.

use alloc::vec;
use alloc::vec::Vec;
use arrayvec::ArrayVec;
use tb_ir::config::MAX_CHORD_SIZE;
use tb_ir::FILTER_MAX_POINTS;

use crate::dynamic_filter::DynamicBiquadFilter;
use crate::envelope_computer::EnvelopeComputer;

/// Oscillators per tone: enough for a supersaw, an FM6 stack or two
/// unison voices.
pub const MAX_OSCILLATORS: usize = 7;

/// Identifies a note by where it sits in the song.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteRef {
    pub bar: usize,
    /// Index into the pattern's note list.
    pub index: usize,
}

/// Tone lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ToneState {
    /// Playing a note.
    #[default]
    Active,
    /// Note ended; fading out over the instrument's release.
    Released,
    /// Finished; the pool will reclaim it.
    Done,
}

/// Karplus-Strong delay line for one string voice.
#[derive(Clone, Debug, Default)]
pub struct StringVoice {
    pub(crate) buffer: Vec<f32>,
    pub(crate) write: usize,
    pub(crate) last: f64,
    pub(crate) loss: f64,
    pub(crate) loss_delta: f64,
    pub(crate) damping: f64,
}

impl StringVoice {
    /// Grow the delay line to hold at least `samples`. Only allocates
    /// when the line is too short.
    pub(crate) fn ensure_length(&mut self, samples: usize) {
        let size = (samples + 2).next_power_of_two();
        if self.buffer.len() < size {
            self.buffer = vec![0.0; size];
            self.write = 0;
        }
    }

    pub(crate) fn clear(&mut self) {
        self.buffer.iter_mut().for_each(|s| *s = 0.0);
        self.write = 0;
        self.last = 0.0;
    }
}

#[derive(Clone, Debug)]
pub struct Tone {
    pub state: ToneState,
    /// Chord pitches this tone plays (several for arpeggios and custom
    /// intervals, one otherwise).
    pub pitches: ArrayVec<i32, MAX_CHORD_SIZE>,
    /// Index of this tone's pitch in its chord, for simultaneous chords.
    pub chord_index: usize,
    pub chord_size: usize,
    pub note: Option<NoteRef>,
    pub prev_note: Option<NoteRef>,
    pub next_note: Option<NoteRef>,
    pub at_note_start: bool,
    pub force_continue_at_start: bool,
    pub force_continue_at_end: bool,
    /// Ticks left before the release finishes.
    pub release_ticks_remaining: f64,
    pub release_ticks_total: f64,
    /// Real seconds since the note started, for fade-in.
    pub note_seconds: f64,
    /// Arpeggio clock in ticks, scaled by the arpeggio speed.
    pub arpeggio_time: f64,
    /// Vibrato clock in seconds.
    pub vibrato_time: f64,
    /// Last resolved pitch, used as the released tone's pitch.
    pub last_pitch: f64,
    /// Chosen drum, for drumset instruments.
    pub drum: usize,

    pub envelope: EnvelopeComputer,

    // --- Render state, valid for the current tick ---
    pub(crate) voices: usize,
    pub(crate) phases: [f64; MAX_OSCILLATORS],
    pub(crate) phase_deltas: [f64; MAX_OSCILLATORS],
    pub(crate) phase_delta_scales: [f64; MAX_OSCILLATORS],
    pub(crate) integrals: [f64; MAX_OSCILLATORS],
    pub(crate) voice_signs: [f64; MAX_OSCILLATORS],
    pub(crate) expression: f64,
    pub(crate) expression_delta: f64,
    /// FM operator outputs from the previous sample.
    pub(crate) operator_outputs: [f64; MAX_OSCILLATORS],
    pub(crate) operator_expressions: [f64; MAX_OSCILLATORS],
    pub(crate) operator_expression_deltas: [f64; MAX_OSCILLATORS],
    pub(crate) feedback_mult: f64,
    pub(crate) feedback_delta: f64,
    /// Pulse width in cycles (PWM and supersaw).
    pub(crate) pulse_width: f64,
    pub(crate) pulse_width_delta: f64,
    pub(crate) supersaw_dynamism: f64,
    pub(crate) supersaw_dynamism_delta: f64,
    pub(crate) supersaw_shape: f64,
    pub(crate) supersaw_shape_delta: f64,
    /// One-pole state and coefficient of the noise pitch filter.
    pub(crate) noise_sample: f64,
    pub(crate) noise_filter: f64,
    pub(crate) note_filters: ArrayVec<DynamicBiquadFilter, FILTER_MAX_POINTS>,
    pub(crate) drum_filter: Option<DynamicBiquadFilter>,
    pub(crate) strings: [StringVoice; 2],
    /// Sample position inside the current tick.
    pub(crate) tick_sample: usize,
}

impl Default for Tone {
    fn default() -> Self {
        Self::new()
    }
}

impl Tone {
    pub fn new() -> Self {
        Self {
            state: ToneState::Active,
            pitches: ArrayVec::new(),
            chord_index: 0,
            chord_size: 1,
            note: None,
            prev_note: None,
            next_note: None,
            at_note_start: true,
            force_continue_at_start: false,
            force_continue_at_end: false,
            release_ticks_remaining: 0.0,
            release_ticks_total: 0.0,
            note_seconds: 0.0,
            arpeggio_time: 0.0,
            vibrato_time: 0.0,
            last_pitch: 0.0,
            drum: 0,
            envelope: EnvelopeComputer::new(),
            voices: 1,
            phases: [0.0; MAX_OSCILLATORS],
            phase_deltas: [0.0; MAX_OSCILLATORS],
            phase_delta_scales: [1.0; MAX_OSCILLATORS],
            integrals: [0.0; MAX_OSCILLATORS],
            voice_signs: [1.0; MAX_OSCILLATORS],
            expression: 0.0,
            expression_delta: 0.0,
            operator_outputs: [0.0; MAX_OSCILLATORS],
            operator_expressions: [0.0; MAX_OSCILLATORS],
            operator_expression_deltas: [0.0; MAX_OSCILLATORS],
            feedback_mult: 0.0,
            feedback_delta: 0.0,
            pulse_width: 0.0,
            pulse_width_delta: 0.0,
            supersaw_dynamism: 0.0,
            supersaw_dynamism_delta: 0.0,
            supersaw_shape: 0.0,
            supersaw_shape_delta: 0.0,
            noise_sample: 0.0,
            noise_filter: 1.0,
            note_filters: ArrayVec::new(),
            drum_filter: None,
            strings: [StringVoice::default(), StringVoice::default()],
            tick_sample: 0,
        }
    }

    /// Return to the freshly allocated state, keeping the string buffers.
    pub fn reset(&mut self) {
        let strings = core::mem::take(&mut self.strings);
        *self = Self::new();
        self.strings = strings;
        for string in self.strings.iter_mut() {
            string.clear();
        }
    }

    pub fn is_released(&self) -> bool {
        self.state == ToneState::Released
    }

    pub fn is_done(&self) -> bool {
        self.state == ToneState::Done
    }

    /// Start the release. A non-positive release ends the tone at once.
    pub fn release(&mut self, release_ticks: f64) {
        if self.state != ToneState::Active {
            return;
        }
        self.note = None;
        self.next_note = None;
        if release_ticks <= 0.0 {
            self.state = ToneState::Done;
        } else {
            self.state = ToneState::Released;
            self.release_ticks_total = release_ticks;
            self.release_ticks_remaining = release_ticks;
        }
    }

    /// Filter, scale and ramp one oscillator sample.
    #[inline]
    pub(crate) fn finish_sample(&mut self, wave: f64) -> f32 {
        let mut sample = wave;
        if let Some(filter) = self.drum_filter.as_mut() {
            sample = filter.process(sample);
        }
        for filter in self.note_filters.iter_mut() {
            sample = filter.process(sample);
        }
        let out = sample * self.expression;
        self.expression += self.expression_delta;
        out as f32
    }

    /// Step every oscillator's phase delta toward its end-of-tick value.
    #[inline]
    pub(crate) fn scale_phase_deltas(&mut self, count: usize) {
        for i in 0..count {
            self.phase_deltas[i] *= self.phase_delta_scales[i];
        }
    }

    /// Keep phases near zero so they don't lose precision.
    pub(crate) fn wrap_phases(&mut self) {
        for phase in self.phases.iter_mut() {
            *phase -= libm::floor(*phase);
        }
    }

    pub(crate) fn sanitize_filters(&mut self) {
        for filter in self.note_filters.iter_mut() {
            filter.sanitize();
        }
        if let Some(filter) = self.drum_filter.as_mut() {
            filter.sanitize();
        }
        if !self.noise_sample.is_finite() {
            self.noise_sample = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_with_positive_ticks_fades() {
        let mut tone = Tone::new();
        tone.note = Some(NoteRef { bar: 0, index: 0 });
        tone.release(12.0);
        assert!(tone.is_released());
        assert_eq!(tone.note, None);
        assert_eq!(tone.release_ticks_remaining, 12.0);
    }

    #[test]
    fn release_without_ticks_finishes() {
        let mut tone = Tone::new();
        tone.release(-6.0);
        assert!(tone.is_done());
    }

    #[test]
    fn reset_keeps_string_buffers() {
        let mut tone = Tone::new();
        tone.strings[0].ensure_length(300);
        tone.strings[0].buffer[3] = 0.5;
        tone.expression = 2.0;
        tone.reset();
        assert_eq!(tone.strings[0].buffer.len(), 512);
        assert!(tone.strings[0].buffer.iter().all(|&s| s == 0.0));
        assert_eq!(tone.expression, 0.0);
    }

    #[test]
    fn finish_sample_ramps_expression() {
        let mut tone = Tone::new();
        tone.expression = 1.0;
        tone.expression_delta = -0.25;
        assert_eq!(tone.finish_sample(0.5), 0.5);
        assert_eq!(tone.finish_sample(0.5), 0.375);
    }
}
