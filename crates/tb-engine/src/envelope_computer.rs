//! Per-tone envelope evaluation.
//!
//! Once per tick, every tone runs its instrument's envelope slots and
//! multiplies the results into one start/end pair per automation target.
//! Synthesis then ramps each parameter linearly from the start value to
//! the end value across the tick.
//!
//! Each slot keeps its own note clocks, advanced by the slot's speed times
//! the instrument's global envelope speed. Shape formulas therefore use an
//! intrinsic speed of 1; the per-slot rate is already in the clocks.

use tb_ir::config::{MAX_ENVELOPE_COUNT, NOTE_SIZE_MAX};
use tb_ir::{
    compute_index, AutomationTarget, DrumSettings, EnvelopeSettings, EnvelopeShape, Instrument, LfoWaveform,
    Note, RandomKind, ENVELOPE_COMPUTE_INDEX_COUNT, TICKS_PER_BEAT, TICKS_PER_PART,
};

use crate::hash::hash_fraction;

/// Ticks per bucket of the time-keyed random envelope.
pub const RANDOM_TIME_BUCKET_TICKS: f64 = 256.0;

/// Loudness curve of a note size.
pub fn note_size_to_volume_mult(size: f64) -> f64 {
    libm::pow(size.max(0.0) / NOTE_SIZE_MAX as f64, 1.5)
}

/// Global envelope speed multiplier for an instrument envelope speed setting.
pub fn global_envelope_speed(setting: f64) -> f64 {
    setting * setting / 144.0
}

// --- Inputs ---

/// Clock and note values one envelope is evaluated at.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EnvelopeInputs {
    /// Seconds since the note started, scaled by the slot speed.
    pub time: f64,
    /// Seconds since the note started, scaled by the global speed only.
    pub unscaled_time: f64,
    /// Ticks since the note started, scaled like `time`.
    pub ticks: f64,
    pub note_size: f64,
    pub pitch: f64,
    /// Absolute tick at which the current pin segment started.
    pub note_key: i64,
}

impl EnvelopeInputs {
    pub fn beats(&self) -> f64 {
        self.ticks / TICKS_PER_BEAT as f64
    }
}

/// Everything about a slot that shape evaluation needs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeParams {
    pub shape: EnvelopeShape,
    /// Intrinsic shape speed: 1 for slots, the preset speed for drums.
    pub speed: f64,
    /// The slot's own speed, already folded into the clocks.
    pub per_speed: f64,
    pub inverse: bool,
    pub lower: f64,
    pub upper: f64,
    pub steps: u8,
    pub seed: u8,
    pub pitch_start: i32,
    pub pitch_end: i32,
}

impl ShapeParams {
    pub fn from_settings(settings: &EnvelopeSettings) -> Self {
        Self {
            shape: settings.shape,
            speed: 1.0,
            per_speed: settings.speed,
            inverse: settings.inverse,
            lower: settings.lower_bound,
            upper: settings.upper_bound,
            steps: settings.steps,
            seed: settings.seed,
            pitch_start: settings.pitch_start,
            pitch_end: settings.pitch_end,
        }
    }

    /// Unit-range, non-inverted shape at a drum's preset speed.
    pub fn drum(drum: &DrumSettings) -> Self {
        Self {
            shape: drum.envelope,
            speed: drum.envelope_speed,
            per_speed: 1.0,
            inverse: false,
            lower: 0.0,
            upper: 1.0,
            steps: 2,
            seed: 0,
            pitch_start: 0,
            pitch_end: 0,
        }
    }
}

// --- Shapes ---

fn fract(x: f64) -> f64 {
    x - libm::floor(x)
}

fn lfo(waveform: LfoWaveform, beats: f64, speed: f64, steps: u8) -> f64 {
    let p = fract(beats * speed);
    let triangle = 1.0 - libm::fabs(1.0 - 2.0 * p);
    let divisions = steps.max(2) as f64;
    match waveform {
        LfoWaveform::Sine => 0.5 - 0.5 * libm::cos(core::f64::consts::TAU * p),
        LfoWaveform::Square => {
            if p < 0.5 {
                1.0
            } else {
                0.0
            }
        }
        LfoWaveform::Triangle => triangle,
        LfoWaveform::Sawtooth => p,
        LfoWaveform::Trapezoid => (2.0 * triangle - 0.5).clamp(0.0, 1.0),
        LfoWaveform::SteppedSaw => libm::floor(p * divisions) / (divisions - 1.0),
        LfoWaveform::SteppedTri => (libm::floor(triangle * divisions) / (divisions - 1.0)).min(1.0),
    }
}

/// Unit-range value of a pitch envelope: 0 at `pitch_start`, 1 at `pitch_end`.
pub fn compute_pitch_envelope(pitch_start: i32, pitch_end: i32, pitch: f64) -> f64 {
    let (start, end) = (pitch_start as f64, pitch_end as f64);
    if end == start {
        return if pitch >= start { 1.0 } else { 0.0 };
    }
    ((pitch - start) / (end - start)).clamp(0.0, 1.0)
}

fn quantized(seed: u8, steps: u8, key: i64) -> f64 {
    if steps <= 1 {
        return 1.0;
    }
    let steps = steps as f64;
    (libm::floor(hash_fraction(key, seed as u32) * steps) / (steps - 1.0)).min(1.0)
}

/// Unit-range value of a pseudorandom envelope.
pub fn compute_pseudorandom(kind: RandomKind, seed: u8, steps: u8, inputs: &EnvelopeInputs) -> f64 {
    match kind {
        RandomKind::Time => {
            let bucket = libm::floor(inputs.ticks / RANDOM_TIME_BUCKET_TICKS) as i64;
            quantized(seed, steps, bucket)
        }
        RandomKind::TimeSmooth => {
            let position = inputs.ticks / RANDOM_TIME_BUCKET_TICKS;
            let bucket = libm::floor(position);
            let a = quantized(seed, steps, bucket as i64);
            let b = quantized(seed, steps, bucket as i64 + 1);
            a + (b - a) * (position - bucket)
        }
        RandomKind::Pitch => quantized(seed, steps, libm::round(inputs.pitch) as i64),
        RandomKind::Note => quantized(seed, steps, inputs.note_key),
    }
}

/// Evaluate one envelope shape, mapped into the slot's bounds.
///
/// The result lies in `[lower, upper]` for every shape except punch,
/// which boosts into `[1 + lower, 1 + upper]`.
pub fn compute_envelope(params: &ShapeParams, inputs: &EnvelopeInputs) -> f64 {
    let (lower, upper) = (params.lower, params.upper);
    let range = upper - lower;
    let speed = params.speed;
    let time = inputs.time.max(0.0);
    let beats = inputs.beats();

    let unit = match params.shape {
        EnvelopeShape::None => 1.0,
        EnvelopeShape::NoteSize => note_size_to_volume_mult(inputs.note_size).min(1.0),
        EnvelopeShape::Pitch => compute_pitch_envelope(params.pitch_start, params.pitch_end, inputs.pitch),
        EnvelopeShape::Pseudorandom(kind) => compute_pseudorandom(kind, params.seed, params.steps, inputs),
        EnvelopeShape::Twang => 1.0 / (1.0 + time * speed),
        EnvelopeShape::Swell => 1.0 - 1.0 / (1.0 + time * speed),
        EnvelopeShape::Lfo(waveform) => lfo(waveform, beats, speed, params.steps),
        EnvelopeShape::Tremolo2 => {
            let cos = libm::cos(core::f64::consts::TAU * beats * speed);
            // Both directions stay in the upper half of the range.
            return if params.inverse {
                lower + (0.75 + 0.25 * cos) * range
            } else {
                lower + (0.75 - 0.25 * cos) * range
            };
        }
        EnvelopeShape::Punch => {
            let fall = inputs.unscaled_time.max(0.0) * 10.0;
            return if params.inverse {
                (1.0 + lower + fall).min(1.0 + upper)
            } else {
                (1.0 + upper - fall).max(1.0 + lower)
            };
        }
        EnvelopeShape::Flare => {
            let attack = 0.25 / libm::sqrt((speed * params.per_speed).max(1e-9));
            if time < attack {
                time / attack
            } else {
                1.0 / (1.0 + (time - attack) * speed)
            }
        }
        EnvelopeShape::Decay => libm::pow(2.0, -speed * time),
        EnvelopeShape::Blip => {
            let attack = 0.25 / libm::sqrt(speed.max(1e-9));
            if time < attack {
                1.0
            } else {
                0.0
            }
        }
        EnvelopeShape::Wibble => {
            let w = 0.5 - 0.5 * libm::cos(beats * speed);
            (1.0 / (1.0 + time * (speed - w / (1.5 / speed)))).clamp(0.0, 1.0)
        }
        EnvelopeShape::Linear => (1.0 - time / (16.0 / speed)).max(0.0),
        EnvelopeShape::Rise => (time / (16.0 / speed)).min(1.0),
        EnvelopeShape::Fall => libm::sqrt((1.0 - time / (16.0 / speed)).max(0.0)),
    };

    if params.inverse {
        upper - unit * range
    } else {
        lower + unit * range
    }
}

// --- Per-tone state ---

/// Where a tone stands relative to its note on the current tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct ToneTiming<'a> {
    /// The sounding note, `None` once the tone has been released.
    pub note: Option<&'a Note>,
    /// Adjacent notes, present only when the transition joins them.
    pub prev_note: Option<&'a Note>,
    pub next_note: Option<&'a Note>,
    /// Ticks from the start of the current bar to the start of this tick.
    pub tick_time_start: f64,
    /// Absolute tick of the current bar's first tick.
    pub bar_start_tick: i64,
    /// First tick of a new note on this tone.
    pub at_note_start: bool,
    /// Carries on from the previous bar's note without retriggering.
    pub force_continue_at_start: bool,
    /// Carries on into the next bar's note.
    pub force_continue_at_end: bool,
    /// Pitch the tone sounds at, for pitch envelopes and pitch-keyed randomness.
    pub pitch: f64,
}

/// Slot clocks. Index `MAX_ENVELOPE_COUNT` is the unscaled clock used by
/// punch and drum envelopes.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Clocks {
    seconds: [f64; MAX_ENVELOPE_COUNT + 1],
    ticks: [f64; MAX_ENVELOPE_COUNT + 1],
}

impl Default for Clocks {
    fn default() -> Self {
        Self { seconds: [0.0; MAX_ENVELOPE_COUNT + 1], ticks: [0.0; MAX_ENVELOPE_COUNT + 1] }
    }
}

const UNSCALED: usize = MAX_ENVELOPE_COUNT;

/// How strongly a neighbouring note pulls this tick's values.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SlideBlend {
    pub active_start: bool,
    pub active_end: bool,
    /// Weight of the neighbour: 0.5 at the note boundary, 0 at the edge of
    /// the slide window.
    pub ratio_start: f64,
    pub ratio_end: f64,
}

/// Envelope state of one tone.
#[derive(Clone, Debug)]
pub struct EnvelopeComputer {
    start: Clocks,
    end: Clocks,
    prev_start: Clocks,
    prev_end: Clocks,

    note_size_start: f64,
    note_size_end: f64,
    prev_note_size: f64,
    next_note_size: f64,
    note_key: i64,
    pitch: f64,

    /// Blend toward the previous note across a slide.
    pub prev_slide: SlideBlend,
    /// Blend toward the next note across a slide.
    pub next_slide: SlideBlend,

    pub envelope_starts: [f64; ENVELOPE_COMPUTE_INDEX_COUNT],
    pub envelope_ends: [f64; ENVELOPE_COMPUTE_INDEX_COUNT],
    pub drum_start: f64,
    pub drum_end: f64,
    /// Loudness correction for the drum's decaying low-pass.
    pub drum_volume_compensation: f64,
}

impl Default for EnvelopeComputer {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvelopeComputer {
    pub fn new() -> Self {
        Self {
            start: Clocks::default(),
            end: Clocks::default(),
            prev_start: Clocks::default(),
            prev_end: Clocks::default(),
            note_size_start: NOTE_SIZE_MAX as f64,
            note_size_end: NOTE_SIZE_MAX as f64,
            prev_note_size: NOTE_SIZE_MAX as f64,
            next_note_size: NOTE_SIZE_MAX as f64,
            note_key: 0,
            pitch: 0.0,
            prev_slide: SlideBlend::default(),
            next_slide: SlideBlend::default(),
            envelope_starts: [1.0; ENVELOPE_COMPUTE_INDEX_COUNT],
            envelope_ends: [1.0; ENVELOPE_COMPUTE_INDEX_COUNT],
            drum_start: 1.0,
            drum_end: 1.0,
            drum_volume_compensation: 1.0,
        }
    }

    /// Forget all clocks, as for a freshly allocated tone.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Seconds since the note started on the unscaled clock.
    pub fn note_seconds(&self) -> f64 {
        self.start.seconds[UNSCALED]
    }

    /// Ticks since the note started on the unscaled clock.
    pub fn note_ticks(&self) -> f64 {
        self.start.ticks[UNSCALED]
    }

    /// Interpolated note size at the start and end of the last tick.
    pub fn note_sizes(&self) -> (f64, f64) {
        (self.note_size_start, self.note_size_end)
    }

    /// Start value for `(target, index)` from the last computation.
    pub fn start_value(&self, target: AutomationTarget, index: usize) -> f64 {
        compute_index(target, index).map_or(1.0, |i| self.envelope_starts[i])
    }

    /// End value for `(target, index)` from the last computation.
    pub fn end_value(&self, target: AutomationTarget, index: usize) -> f64 {
        compute_index(target, index).map_or(1.0, |i| self.envelope_ends[i])
    }

    /// Evaluate every envelope slot for one tick and advance the clocks.
    ///
    /// `global_speed` is the instrument's envelope speed multiplier, see
    /// [`global_envelope_speed`].
    pub fn compute_envelopes(
        &mut self,
        instrument: &Instrument,
        timing: &ToneTiming<'_>,
        seconds_per_tick: f64,
        global_speed: f64,
    ) {
        if timing.at_note_start && !instrument.transition.continues() && !timing.force_continue_at_start {
            self.prev_start = self.start;
            self.prev_end = self.end;
            self.start = Clocks::default();
            self.prev_note_size = self.note_size_end;
        }

        self.step_clocks(instrument, seconds_per_tick, global_speed);
        self.pitch = timing.pitch;
        self.update_note_position(instrument, timing);

        self.envelope_starts = [1.0; ENVELOPE_COMPUTE_INDEX_COUNT];
        self.envelope_ends = [1.0; ENVELOPE_COMPUTE_INDEX_COUNT];

        let mut explicit_note_size = false;
        for (slot, settings) in instrument.envelopes.iter().enumerate() {
            // Any note size slot takes over from the implicit note volume one.
            if settings.shape == EnvelopeShape::NoteSize {
                explicit_note_size = true;
            }
            let index = settings.index as usize;
            if !instrument.supports_target(settings.target, index) {
                continue;
            }
            let Some(compute) = compute_index(settings.target, index) else {
                continue;
            };
            let params = ShapeParams::from_settings(settings);
            let (start, end) = self.evaluate(&params, slot);
            let end = if settings.discrete { start } else { end };
            self.envelope_starts[compute] *= start;
            self.envelope_ends[compute] *= end;
        }

        if !explicit_note_size {
            if let Some(compute) = compute_index(AutomationTarget::NoteVolume, 0) {
                let (start, end) = self.blended_note_sizes();
                self.envelope_starts[compute] *= note_size_to_volume_mult(start);
                self.envelope_ends[compute] *= note_size_to_volume_mult(end);
            }
        }
    }

    /// Evaluate a drum's own envelope on the unscaled clock.
    ///
    /// Call after [`compute_envelopes`](Self::compute_envelopes) for the
    /// same tick.
    pub fn compute_drumset_envelopes(&mut self, drum: &DrumSettings) {
        let params = ShapeParams::drum(drum);
        let (start, end) = self.evaluate(&params, UNSCALED);
        self.drum_start = start;
        self.drum_end = end;
        self.drum_volume_compensation = match drum.envelope {
            EnvelopeShape::Decay => 1.25 + 0.025 * drum.envelope_speed,
            EnvelopeShape::Twang => 1.0 + 0.02 * drum.envelope_speed,
            _ => 1.0,
        };
    }

    /// Move the end-of-tick clocks into the start slots for the next tick.
    pub fn advance(&mut self) {
        self.start = self.end;
        self.prev_start = self.prev_end;
    }

    fn step_clocks(&mut self, instrument: &Instrument, seconds_per_tick: f64, global_speed: f64) {
        let mut speeds = [1.0; MAX_ENVELOPE_COUNT + 1];
        for (slot, settings) in instrument.envelopes.iter().enumerate() {
            speeds[slot] = settings.speed * global_speed;
        }
        speeds[UNSCALED] = global_speed;
        for (i, &speed) in speeds.iter().enumerate() {
            self.end.seconds[i] = self.start.seconds[i] + seconds_per_tick * speed;
            self.end.ticks[i] = self.start.ticks[i] + speed;
            self.prev_end.seconds[i] = self.prev_start.seconds[i] + seconds_per_tick * speed;
            self.prev_end.ticks[i] = self.prev_start.ticks[i] + speed;
        }
    }

    fn update_note_position(&mut self, instrument: &Instrument, timing: &ToneTiming<'_>) {
        self.prev_slide = SlideBlend::default();
        self.next_slide = SlideBlend::default();

        let Some(note) = timing.note else {
            self.note_size_start = self.note_size_end;
            return;
        };

        let ticks_per_part = TICKS_PER_PART as f64;
        let note_start_tick = note.start as f64 * ticks_per_part;
        let note_end_tick = note.end as f64 * ticks_per_part;
        let tick_start = timing.tick_time_start;
        let tick_end = tick_start + 1.0;
        let length_parts = note.length() as f64;

        let part_start = ((tick_start - note_start_tick) / ticks_per_part).clamp(0.0, length_parts);
        let part_end = ((tick_end - note_start_tick) / ticks_per_part).clamp(0.0, length_parts);
        self.note_size_start = note.size_at_part(part_start);
        self.note_size_end = note.size_at_part(part_end);

        let segment = note.pin_segment_at(part_start);
        let pin_time = note.pins.get(segment).map_or(0, |p| p.time) as i64;
        self.note_key = timing.bar_start_tick + (note.start as i64 + pin_time) * TICKS_PER_PART as i64;

        if !instrument.transition.slides() {
            return;
        }
        let note_length_ticks = note_end_tick - note_start_tick;
        let slide_ticks = (note_length_ticks * 0.5).min(instrument.transition.slide_ticks() as f64);
        if slide_ticks <= 0.0 {
            return;
        }

        if let Some(prev) = timing.prev_note {
            if !timing.force_continue_at_start {
                self.prev_note_size = prev.pins.last().map_or(0.0, |p| p.size as f64);
                let since_start = tick_start - note_start_tick;
                if since_start < slide_ticks {
                    self.prev_slide.active_start = true;
                    self.prev_slide.ratio_start = 0.5 * (1.0 - since_start / slide_ticks);
                }
                let since_start = tick_end - note_start_tick;
                if since_start < slide_ticks {
                    self.prev_slide.active_end = true;
                    self.prev_slide.ratio_end = 0.5 * (1.0 - since_start / slide_ticks);
                }
            }
        }

        if let Some(next) = timing.next_note {
            if !timing.force_continue_at_end {
                self.next_note_size = next.pins.first().map_or(0.0, |p| p.size as f64);
                let until_end = note_end_tick - tick_start;
                if until_end < slide_ticks {
                    self.next_slide.active_start = true;
                    self.next_slide.ratio_start = 0.5 * (1.0 - until_end / slide_ticks);
                }
                let until_end = note_end_tick - tick_end;
                if until_end < slide_ticks {
                    self.next_slide.active_end = true;
                    self.next_slide.ratio_end = 0.5 * (1.0 - until_end / slide_ticks);
                }
            }
        }
    }

    fn inputs(&self, clocks: &Clocks, slot: usize, note_size: f64) -> EnvelopeInputs {
        EnvelopeInputs {
            time: clocks.seconds[slot],
            unscaled_time: clocks.seconds[UNSCALED],
            ticks: clocks.ticks[slot],
            note_size,
            pitch: self.pitch,
            note_key: self.note_key,
        }
    }

    /// Start and end value of one shape on clock `slot`, blended toward
    /// neighbouring notes inside a slide window.
    fn evaluate(&self, params: &ShapeParams, slot: usize) -> (f64, f64) {
        let mut start = compute_envelope(params, &self.inputs(&self.start, slot, self.note_size_start));
        let mut end = compute_envelope(params, &self.inputs(&self.end, slot, self.note_size_end));

        if self.prev_slide.active_start {
            let other = compute_envelope(params, &self.inputs(&self.prev_start, slot, self.prev_note_size));
            start += (other - start) * self.prev_slide.ratio_start;
        }
        if self.prev_slide.active_end {
            let other = compute_envelope(params, &self.inputs(&self.prev_end, slot, self.prev_note_size));
            end += (other - end) * self.prev_slide.ratio_end;
        }
        if self.next_slide.active_start {
            let other = compute_envelope(params, &self.inputs(&Clocks::default(), slot, self.next_note_size));
            start += (other - start) * self.next_slide.ratio_start;
        }
        if self.next_slide.active_end {
            let other = compute_envelope(params, &self.inputs(&Clocks::default(), slot, self.next_note_size));
            end += (other - end) * self.next_slide.ratio_end;
        }
        (start, end)
    }

    fn blended_note_sizes(&self) -> (f64, f64) {
        let mut start = self.note_size_start;
        let mut end = self.note_size_end;
        if self.prev_slide.active_start {
            start += (self.prev_note_size - start) * self.prev_slide.ratio_start;
        }
        if self.prev_slide.active_end {
            end += (self.prev_note_size - end) * self.prev_slide.ratio_end;
        }
        if self.next_slide.active_start {
            start += (self.next_note_size - start) * self.next_slide.ratio_start;
        }
        if self.next_slide.active_end {
            end += (self.next_note_size - end) * self.next_slide.ratio_end;
        }
        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tb_ir::config::Transition;
    use tb_ir::{InstrumentType, NotePin};

    const SHAPES: [EnvelopeShape; 22] = [
        EnvelopeShape::None,
        EnvelopeShape::NoteSize,
        EnvelopeShape::Pitch,
        EnvelopeShape::Pseudorandom(RandomKind::Time),
        EnvelopeShape::Pseudorandom(RandomKind::TimeSmooth),
        EnvelopeShape::Pseudorandom(RandomKind::Pitch),
        EnvelopeShape::Pseudorandom(RandomKind::Note),
        EnvelopeShape::Twang,
        EnvelopeShape::Swell,
        EnvelopeShape::Lfo(LfoWaveform::Sine),
        EnvelopeShape::Lfo(LfoWaveform::Square),
        EnvelopeShape::Lfo(LfoWaveform::Trapezoid),
        EnvelopeShape::Lfo(LfoWaveform::SteppedSaw),
        EnvelopeShape::Lfo(LfoWaveform::SteppedTri),
        EnvelopeShape::Tremolo2,
        EnvelopeShape::Flare,
        EnvelopeShape::Decay,
        EnvelopeShape::Blip,
        EnvelopeShape::Wibble,
        EnvelopeShape::Linear,
        EnvelopeShape::Rise,
        EnvelopeShape::Fall,
    ];

    fn params(shape: EnvelopeShape, lower: f64, upper: f64) -> ShapeParams {
        let settings = EnvelopeSettings::new(AutomationTarget::NoteVolume, 0, shape).with_bounds(lower, upper);
        let mut params = ShapeParams::from_settings(&settings);
        params.steps = 5;
        params
    }

    fn inputs_at(step: usize) -> EnvelopeInputs {
        let t = step as f64 * 0.037;
        EnvelopeInputs {
            time: t,
            unscaled_time: t,
            ticks: step as f64 * 7.0,
            note_size: (step % 7) as f64,
            pitch: (step * 5 % 108) as f64,
            note_key: step as i64 * 24,
        }
    }

    fn ticks(computer: &mut EnvelopeComputer, inst: &Instrument, timing: &ToneTiming<'_>, count: usize) {
        for _ in 0..count {
            computer.compute_envelopes(inst, timing, 0.01, 1.0);
            computer.advance();
        }
    }

    #[test]
    fn envelopes_stay_within_bounds() {
        for shape in SHAPES {
            let p = params(shape, 0.2, 0.7);
            for step in 0..400 {
                let v = compute_envelope(&p, &inputs_at(step));
                assert!((0.2 - 1e-9..=0.7 + 1e-9).contains(&v), "{shape:?} at {step}: {v}");
            }
        }
    }

    #[test]
    fn punch_boosts_above_unity() {
        let p = params(EnvelopeShape::Punch, 0.0, 0.5);
        let at = |t: f64| compute_envelope(&p, &EnvelopeInputs { unscaled_time: t, ..Default::default() });
        assert_eq!(at(0.0), 1.5);
        assert!((at(0.02) - 1.3).abs() < 1e-9);
        assert_eq!(at(1.0), 1.0);
        let mut inv = p;
        inv.inverse = true;
        assert_eq!(compute_envelope(&inv, &EnvelopeInputs::default()), 1.0);
    }

    #[test]
    fn inverse_reflects_within_bounds() {
        for shape in SHAPES {
            if shape == EnvelopeShape::Tremolo2 {
                continue;
            }
            let p = params(shape, 0.1, 0.9);
            let mut inv = p;
            inv.inverse = true;
            for step in 0..200 {
                let inputs = inputs_at(step);
                let sum = compute_envelope(&p, &inputs) + compute_envelope(&inv, &inputs);
                assert!((sum - 1.0).abs() < 1e-9, "{shape:?} at {step}: {sum}");
            }
        }
    }

    #[test]
    fn tremolo2_inverse_stays_in_upper_band() {
        let p = params(EnvelopeShape::Tremolo2, 0.0, 1.0);
        let mut inv = p;
        inv.inverse = true;
        for step in 0..100 {
            let inputs = EnvelopeInputs { ticks: step as f64 * 3.0, ..Default::default() };
            assert!(compute_envelope(&inv, &inputs) >= 0.5);
            assert!(compute_envelope(&p, &inputs) >= 0.5);
        }
    }

    #[test]
    fn decay_halves_after_one_second() {
        let p = params(EnvelopeShape::Decay, 0.0, 1.0);
        let v = compute_envelope(&p, &EnvelopeInputs { time: 1.0, ..Default::default() });
        assert!((v - 0.5).abs() < 1e-12);
    }

    #[test]
    fn lfo_starts_at_lower_bound() {
        let p = params(EnvelopeShape::Lfo(LfoWaveform::Sine), 0.25, 0.75);
        assert!((compute_envelope(&p, &EnvelopeInputs::default()) - 0.25).abs() < 1e-12);
        let half_beat = EnvelopeInputs { ticks: TICKS_PER_BEAT as f64 / 2.0, ..Default::default() };
        assert!((compute_envelope(&p, &half_beat) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn square_lfo_starts_high() {
        let p = params(EnvelopeShape::Lfo(LfoWaveform::Square), 0.0, 1.0);
        assert_eq!(compute_envelope(&p, &EnvelopeInputs::default()), 1.0);
    }

    #[test]
    fn pseudorandom_is_deterministic() {
        let inputs = EnvelopeInputs { ticks: 600.0, pitch: 60.0, note_key: 96, ..Default::default() };
        for kind in [RandomKind::Time, RandomKind::TimeSmooth, RandomKind::Pitch, RandomKind::Note] {
            assert_eq!(compute_pseudorandom(kind, 3, 12, &inputs), compute_pseudorandom(kind, 3, 12, &inputs));
        }
    }

    #[test]
    fn time_random_varies_across_buckets() {
        let values: Vec<f64> = (0..1000)
            .step_by(10)
            .map(|t| {
                let inputs = EnvelopeInputs { ticks: t as f64 * 4.0, ..Default::default() };
                compute_pseudorandom(RandomKind::Time, 2, 24, &inputs)
            })
            .collect();
        assert!(values.iter().any(|&v| v != values[0]));
        // Within one bucket the value holds.
        let a = EnvelopeInputs { ticks: 10.0, ..Default::default() };
        let b = EnvelopeInputs { ticks: 250.0, ..Default::default() };
        assert_eq!(compute_pseudorandom(RandomKind::Time, 2, 24, &a), compute_pseudorandom(RandomKind::Time, 2, 24, &b));
    }

    #[test]
    fn single_step_random_is_constant() {
        let inputs = EnvelopeInputs { ticks: 1234.0, ..Default::default() };
        assert_eq!(compute_pseudorandom(RandomKind::Time, 9, 1, &inputs), 1.0);
    }

    #[test]
    fn pitch_envelope_spans_range() {
        assert_eq!(compute_pitch_envelope(24, 72, 24.0), 0.0);
        assert_eq!(compute_pitch_envelope(24, 72, 48.0), 0.5);
        assert_eq!(compute_pitch_envelope(24, 72, 100.0), 1.0);
        assert_eq!(compute_pitch_envelope(60, 60, 59.0), 0.0);
    }

    #[test]
    fn note_size_drives_note_volume_by_default() {
        let inst = Instrument::of_type(InstrumentType::Chip, false);
        let note = Note::new(60, 0, 8, 3);
        let timing = ToneTiming { note: Some(&note), at_note_start: true, pitch: 60.0, ..Default::default() };
        let mut computer = EnvelopeComputer::new();
        computer.compute_envelopes(&inst, &timing, 0.01, 1.0);
        let expected = note_size_to_volume_mult(3.0);
        assert!((computer.start_value(AutomationTarget::NoteVolume, 0) - expected).abs() < 1e-12);
    }

    #[test]
    fn explicit_note_size_slot_replaces_implicit_one() {
        let mut inst = Instrument::of_type(InstrumentType::Chip, false);
        inst.add_envelope(
            EnvelopeSettings::new(AutomationTarget::NoteVolume, 0, EnvelopeShape::NoteSize).with_bounds(0.5, 1.0),
        );
        let note = Note::new(60, 0, 8, 6);
        let timing = ToneTiming { note: Some(&note), at_note_start: true, ..Default::default() };
        let mut computer = EnvelopeComputer::new();
        computer.compute_envelopes(&inst, &timing, 0.01, 1.0);
        assert!((computer.start_value(AutomationTarget::NoteVolume, 0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn note_size_slot_on_other_target_disables_implicit_volume() {
        let mut inst = Instrument::of_type(InstrumentType::Pwm, false);
        inst.add_envelope(EnvelopeSettings::new(AutomationTarget::PulseWidth, 0, EnvelopeShape::NoteSize));
        let note = Note::new(60, 0, 8, 2);
        let timing = ToneTiming { note: Some(&note), at_note_start: true, ..Default::default() };
        let mut computer = EnvelopeComputer::new();
        computer.compute_envelopes(&inst, &timing, 0.01, 1.0);
        assert_eq!(computer.start_value(AutomationTarget::NoteVolume, 0), 1.0);
        assert_eq!(computer.end_value(AutomationTarget::NoteVolume, 0), 1.0);
        let width = computer.start_value(AutomationTarget::PulseWidth, 0);
        assert!(width > 0.0 && width < 1.0);
    }

    #[test]
    fn unsupported_targets_are_skipped() {
        let mut inst = Instrument::of_type(InstrumentType::Chip, false);
        inst.add_envelope(EnvelopeSettings::new(AutomationTarget::OperatorAmplitude, 0, EnvelopeShape::Decay));
        let note = Note::new(60, 0, 8, 6);
        let timing = ToneTiming { note: Some(&note), ..Default::default() };
        let mut computer = EnvelopeComputer::new();
        ticks(&mut computer, &inst, &timing, 20);
        assert_eq!(computer.start_value(AutomationTarget::OperatorAmplitude, 0), 1.0);
    }

    #[test]
    fn discrete_slots_hold_for_the_tick() {
        let mut inst = Instrument::of_type(InstrumentType::Pwm, false);
        let mut env = EnvelopeSettings::new(AutomationTarget::PulseWidth, 0, EnvelopeShape::Decay);
        env.discrete = true;
        inst.add_envelope(env);
        let note = Note::new(60, 0, 8, 6);
        let timing = ToneTiming { note: Some(&note), ..Default::default() };
        let mut computer = EnvelopeComputer::new();
        ticks(&mut computer, &inst, &timing, 3);
        computer.compute_envelopes(&inst, &timing, 0.01, 1.0);
        assert_eq!(
            computer.start_value(AutomationTarget::PulseWidth, 0),
            computer.end_value(AutomationTarget::PulseWidth, 0)
        );
    }

    #[test]
    fn new_note_restarts_clocks_unless_continuing() {
        let mut inst = Instrument::of_type(InstrumentType::Chip, false);
        let note = Note::new(60, 0, 8, 6);
        let running = ToneTiming { note: Some(&note), ..Default::default() };
        let restart = ToneTiming { at_note_start: true, ..running };

        let mut computer = EnvelopeComputer::new();
        ticks(&mut computer, &inst, &running, 10);
        assert!(computer.note_ticks() > 9.0);
        ticks(&mut computer, &inst, &restart, 1);
        assert_eq!(computer.note_ticks(), 1.0);

        inst.transition = Transition::Continue;
        ticks(&mut computer, &inst, &running, 4);
        ticks(&mut computer, &inst, &restart, 1);
        assert_eq!(computer.note_ticks(), 6.0);
    }

    #[test]
    fn slot_speed_scales_its_clock() {
        let mut inst = Instrument::of_type(InstrumentType::Chip, false);
        inst.add_envelope(EnvelopeSettings::new(AutomationTarget::NoteVolume, 0, EnvelopeShape::Decay).with_speed(2.0));
        let note = Note::new(60, 0, 96, 6);
        let timing = ToneTiming { note: Some(&note), ..Default::default() };
        let mut computer = EnvelopeComputer::new();
        // 50 ticks at 0.01 s, doubled: one second on the slot clock.
        ticks(&mut computer, &inst, &timing, 50);
        computer.compute_envelopes(&inst, &timing, 0.01, 1.0);
        assert!((computer.start_value(AutomationTarget::NoteVolume, 0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn slides_meet_halfway_at_the_boundary() {
        let mut inst = Instrument::of_type(InstrumentType::Chip, false);
        inst.transition = Transition::Slide;
        let prev = Note::with_pins(&[60], 0, 8, vec![NotePin::new(0, 0, 6), NotePin::new(8, 0, 6)]);
        let note = Note::with_pins(&[64], 8, 16, vec![NotePin::new(0, 0, 2), NotePin::new(8, 0, 2)]);
        let timing = ToneTiming {
            note: Some(&note),
            prev_note: Some(&prev),
            tick_time_start: 16.0,
            at_note_start: true,
            ..Default::default()
        };
        let mut computer = EnvelopeComputer::new();
        computer.compute_envelopes(&inst, &timing, 0.01, 1.0);
        assert!((computer.prev_slide.ratio_start - 0.5).abs() < 1e-12);
        let (size, _) = computer.blended_note_sizes();
        assert!((size - 4.0).abs() < 1e-12);

        let later = ToneTiming { tick_time_start: 19.0, at_note_start: false, ..timing };
        computer.advance();
        computer.compute_envelopes(&inst, &later, 0.01, 1.0);
        assert!(!computer.prev_slide.active_start);
    }

    #[test]
    fn drum_envelope_uses_preset_speed() {
        let inst = Instrument::of_type(InstrumentType::Drumset, true);
        let drum = DrumSettings { envelope: EnvelopeShape::Decay, envelope_speed: 4.0, ..Default::default() };
        let note = Note::new(0, 0, 96, 6);
        let timing = ToneTiming { note: Some(&note), ..Default::default() };
        let mut computer = EnvelopeComputer::new();
        ticks(&mut computer, &inst, &timing, 25);
        computer.compute_envelopes(&inst, &timing, 0.01, 1.0);
        computer.compute_drumset_envelopes(&drum);
        // 0.25 s at speed 4 is one halving.
        assert!((computer.drum_start - 0.5).abs() < 1e-9);
        assert!((computer.drum_volume_compensation - 1.35).abs() < 1e-12);
    }
}
