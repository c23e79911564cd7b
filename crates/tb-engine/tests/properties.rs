//! Property-based tests for envelope evaluation, filter settings and the
//! tone deque.
//!
//! Uses proptest for randomized shapes, bounds, clocks and note layouts.

use std::collections::VecDeque;

use proptest::prelude::*;
use tb_engine::envelope_computer::{
    compute_envelope, compute_pseudorandom, note_size_to_volume_mult, EnvelopeComputer, EnvelopeInputs, ShapeParams,
    ToneTiming,
};
use tb_engine::Deque;
use tb_ir::config::{Transition, NOTE_SIZE_MAX};
use tb_ir::{
    AutomationTarget, EnvelopeSettings, EnvelopeShape, FilterControlPoint, FilterSettings, FilterType, Instrument,
    InstrumentType, LfoWaveform, Note, NotePin, RandomKind, FILTER_FREQ_RANGE, FILTER_GAIN_RANGE, TICKS_PER_BEAT,
    TICKS_PER_PART,
};

/// Every shape whose output stays inside its bounds.
const BOUNDED_SHAPES: [EnvelopeShape; 24] = [
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
    EnvelopeShape::Lfo(LfoWaveform::Triangle),
    EnvelopeShape::Lfo(LfoWaveform::Sawtooth),
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

/// Shapes for which inverting is an exact reflection inside the bounds.
const REFLECTING_SHAPES: [EnvelopeShape; 13] = [
    EnvelopeShape::None,
    EnvelopeShape::NoteSize,
    EnvelopeShape::Twang,
    EnvelopeShape::Swell,
    EnvelopeShape::Lfo(LfoWaveform::Sine),
    EnvelopeShape::Lfo(LfoWaveform::Square),
    EnvelopeShape::Lfo(LfoWaveform::Triangle),
    EnvelopeShape::Lfo(LfoWaveform::Sawtooth),
    EnvelopeShape::Decay,
    EnvelopeShape::Blip,
    EnvelopeShape::Linear,
    EnvelopeShape::Rise,
    EnvelopeShape::Fall,
];

const TOLERANCE: f64 = 1e-9;

fn shape_params(shape: EnvelopeShape, lower: f64, upper: f64, speed: f64, steps: u8, seed: u8) -> ShapeParams {
    ShapeParams {
        shape,
        speed,
        per_speed: 1.0,
        inverse: false,
        lower,
        upper,
        steps,
        seed,
        pitch_start: 0,
        pitch_end: 96,
    }
}

/// Ordered `(lower, upper)` pair inside the unit range.
fn bounds() -> impl Strategy<Value = (f64, f64)> {
    (0.0f64..=1.0, 0.0f64..=1.0).prop_map(|(a, b)| if a <= b { (a, b) } else { (b, a) })
}

fn inputs() -> impl Strategy<Value = EnvelopeInputs> {
    (0.0f64..60.0, 0.0f64..20_000.0, 0.0f64..=NOTE_SIZE_MAX as f64, 0.0f64..120.0, -100_000i64..100_000).prop_map(
        |(time, ticks, note_size, pitch, note_key)| EnvelopeInputs {
            time,
            unscaled_time: time,
            ticks,
            note_size,
            pitch,
            note_key,
        },
    )
}

fn filter_type() -> impl Strategy<Value = FilterType> {
    prop_oneof![Just(FilterType::LowPass), Just(FilterType::HighPass), Just(FilterType::Peak)]
}

fn filter_settings(kinds: &[FilterType]) -> FilterSettings {
    let mut filter = FilterSettings::new();
    for (i, &kind) in kinds.iter().enumerate() {
        filter.add_point(kind, (i * 5 % FILTER_FREQ_RANGE) as f64, (i * 3 % FILTER_GAIN_RANGE) as f64);
    }
    filter
}

/// Runs one tone across two touching notes and returns every tick's
/// note-volume `(start, end)` pair. `slot` adds an envelope on top of the
/// implicit note-size one.
fn slide_walk(first_size: u16, second_size: u16, parts: u32, slot: Option<EnvelopeSettings>) -> Vec<(f64, f64)> {
    let mut inst = Instrument::of_type(InstrumentType::Chip, false);
    inst.transition = Transition::Slide;
    if let Some(slot) = slot {
        inst.add_envelope(slot);
    }
    let first = Note::with_pins(&[60], 0, parts, vec![NotePin::new(0, 0, first_size), NotePin::new(parts, 0, first_size)]);
    let second = Note::with_pins(
        &[67],
        parts,
        parts * 2,
        vec![NotePin::new(0, 0, second_size), NotePin::new(parts, 0, second_size)],
    );
    let ticks_per_note = parts * TICKS_PER_PART;

    let mut computer = EnvelopeComputer::new();
    let mut values = Vec::new();
    for tick in 0..ticks_per_note * 2 {
        let on_second = tick >= ticks_per_note;
        let timing = ToneTiming {
            note: Some(if on_second { &second } else { &first }),
            prev_note: on_second.then_some(&first),
            next_note: (!on_second).then_some(&second),
            tick_time_start: tick as f64,
            at_note_start: tick == 0 || tick == ticks_per_note,
            pitch: 60.0,
            ..Default::default()
        };
        computer.compute_envelopes(&inst, &timing, 0.01, 1.0);
        values.push((
            computer.start_value(AutomationTarget::NoteVolume, 0),
            computer.end_value(AutomationTarget::NoteVolume, 0),
        ));
        computer.advance();
    }
    values
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// For any bounded shape, bounds pair and clock, the value lies in
    /// `[lower, upper]`.
    #[test]
    fn envelope_stays_within_bounds(
        shape in prop::sample::select(BOUNDED_SHAPES.to_vec()),
        (lower, upper) in bounds(),
        speed in 0.1f64..16.0,
        steps in 1u8..=24,
        seed in any::<u8>(),
        inverse in any::<bool>(),
        inputs in inputs(),
    ) {
        let mut params = shape_params(shape, lower, upper, speed, steps, seed);
        params.inverse = inverse;
        let value = compute_envelope(&params, &inputs);
        prop_assert!(
            value >= lower - TOLERANCE && value <= upper + TOLERANCE,
            "{:?} (inverse={}) gave {} outside [{}, {}]", shape, inverse, value, lower, upper
        );
    }

    /// Inverting a reflecting shape mirrors it about the middle of its bounds.
    #[test]
    fn inverse_is_a_reflection(
        shape in prop::sample::select(REFLECTING_SHAPES.to_vec()),
        (lower, upper) in bounds(),
        speed in 0.1f64..16.0,
        inputs in inputs(),
    ) {
        let params = shape_params(shape, lower, upper, speed, 2, 0);
        let inverted = ShapeParams { inverse: true, ..params };
        let sum = compute_envelope(&params, &inputs) + compute_envelope(&inverted, &inputs);
        prop_assert!((sum - (lower + upper)).abs() < TOLERANCE, "{:?}: {} != {}", shape, sum, lower + upper);
    }

    /// Tremolo2 keeps both directions in the upper half of the range, so it
    /// is not a reflection.
    #[test]
    fn tremolo2_inverse_keeps_upper_half(
        (lower, upper) in bounds(),
        inputs in inputs(),
    ) {
        let params = shape_params(EnvelopeShape::Tremolo2, lower, upper, 1.0, 2, 0);
        let inverted = ShapeParams { inverse: true, ..params };
        let middle = (lower + upper) / 2.0;
        prop_assert!(compute_envelope(&params, &inputs) >= middle - TOLERANCE);
        prop_assert!(compute_envelope(&inverted, &inputs) >= middle - TOLERANCE);
    }

    /// Punch boosts above unity and its inverse starts low instead of
    /// mirroring.
    #[test]
    fn punch_inverse_starts_at_the_lower_boost(
        (lower, upper) in bounds(),
        time in 0.0f64..1.0,
    ) {
        let params = shape_params(EnvelopeShape::Punch, lower, upper, 1.0, 2, 0);
        let inverted = ShapeParams { inverse: true, ..params };
        let inputs = EnvelopeInputs { unscaled_time: time, ..Default::default() };
        let value = compute_envelope(&params, &inputs);
        prop_assert!(value >= 1.0 + lower - TOLERANCE && value <= 1.0 + upper + TOLERANCE);
        prop_assert_eq!(compute_envelope(&inverted, &EnvelopeInputs::default()), 1.0 + lower);
    }

    /// The note-keyed random shape returns the same bucket for the same key.
    #[test]
    fn note_random_is_deterministic(
        seed in any::<u8>(),
        steps in 2u8..=24,
        note_key in any::<i64>(),
    ) {
        let inputs = EnvelopeInputs { note_key, ..Default::default() };
        let a = compute_pseudorandom(RandomKind::Note, seed, steps, &inputs);
        let b = compute_pseudorandom(RandomKind::Note, seed, steps, &inputs);
        prop_assert_eq!(a, b);
    }

    /// Across 1000 distinct note start ticks at least one bucket differs.
    #[test]
    fn note_random_varies_with_start_tick(
        seed in any::<u8>(),
        steps in 2u8..=24,
        first in -1_000_000i64..1_000_000,
    ) {
        let value_at = |note_key: i64| {
            compute_pseudorandom(RandomKind::Note, seed, steps, &EnvelopeInputs { note_key, ..Default::default() })
        };
        let reference = value_at(first);
        prop_assert!((first + 1..first + 1000).any(|key| value_at(key) != reference));
    }

    /// Frequency settings survive a trip through hertz.
    #[test]
    fn filter_frequency_round_trip(setting in 0.0f64..(FILTER_FREQ_RANGE - 1) as f64) {
        let hz = FilterControlPoint::hz_from_setting(setting);
        prop_assert!((FilterControlPoint::setting_from_hz(hz) - setting).abs() < 1e-9);
    }

    /// Every gain setting is recovered from its linear gain.
    #[test]
    fn filter_gain_round_trip(
        kind in filter_type(),
        gain in 0usize..FILTER_GAIN_RANGE,
        freq in 0usize..FILTER_FREQ_RANGE,
    ) {
        let point = FilterControlPoint::new(kind, freq as f64, gain as f64);
        let recovered = FilterControlPoint::rounded_setting_from_linear_gain(point.linear_gain(1.0));
        prop_assert_eq!(recovered, gain as f64);
    }

    /// Filters with different point types switch instead of blending.
    #[test]
    fn mismatched_filters_never_blend(
        kinds in prop::collection::vec(filter_type(), 1..=4),
        other_kinds in prop::collection::vec(filter_type(), 0..=4),
        pos in 0.0f64..2.0,
    ) {
        let a = filter_settings(&kinds);
        let mut b = filter_settings(&other_kinds);
        if a.can_morph(&b) {
            // Shift one type so the sequences differ.
            let kind = match b.points[0].kind {
                FilterType::LowPass => FilterType::HighPass,
                FilterType::HighPass => FilterType::Peak,
                FilterType::Peak => FilterType::LowPass,
            };
            b.points[0].kind = kind;
        }
        let mixed = FilterSettings::lerp(&a, &b, pos);
        if pos < 1.0 {
            prop_assert_eq!(mixed, a);
        } else {
            prop_assert_eq!(mixed, b);
        }
    }

    /// Sliding between two notes never jumps between consecutive ticks,
    /// including across the note boundary.
    #[test]
    fn slide_is_continuous(
        first_size in 0u16..=NOTE_SIZE_MAX,
        second_size in 0u16..=NOTE_SIZE_MAX,
        parts in 2u32..12,
    ) {
        let values = slide_walk(first_size, second_size, parts, None);
        for (tick, pair) in values.windows(2).enumerate() {
            let (_, end) = pair[0];
            let (start, _) = pair[1];
            prop_assert!((end - start).abs() < TOLERANCE, "jump after tick {}: {} -> {}", tick, end, start);
        }
        let boundary = (parts * TICKS_PER_PART) as usize;
        let halfway = note_size_to_volume_mult((first_size + second_size) as f64 / 2.0);
        prop_assert!((values[boundary].0 - halfway).abs() < TOLERANCE);
    }

    /// A time-driven slot blends the old note's clock into the new one, so
    /// a decay keeps sliding without a jump at the boundary.
    #[test]
    fn slide_with_decay_is_continuous(
        first_size in 1u16..=NOTE_SIZE_MAX,
        second_size in 1u16..=NOTE_SIZE_MAX,
        parts in 2u32..12,
        speed in 0.5f64..16.0,
        (lower, upper) in bounds(),
    ) {
        let decay = EnvelopeSettings::new(AutomationTarget::NoteVolume, 0, EnvelopeShape::Decay)
            .with_bounds(lower, upper)
            .with_speed(speed);
        let values = slide_walk(first_size, second_size, parts, Some(decay));
        for (tick, pair) in values.windows(2).enumerate() {
            let (_, end) = pair[0];
            let (start, _) = pair[1];
            prop_assert!((end - start).abs() < TOLERANCE, "jump after tick {}: {} -> {}", tick, end, start);
        }
        // Half of the restarted decay sits at its upper bound.
        let boundary = (parts * TICKS_PER_PART) as usize;
        let halfway = note_size_to_volume_mult((first_size + second_size) as f64 / 2.0);
        let (start, _) = values[boundary];
        prop_assert!(start >= halfway * (lower + upper) / 2.0 - TOLERANCE);
        prop_assert!(start <= halfway * upper + TOLERANCE);
    }

    /// A note-size slot on a fading note starts loud and ends silent.
    #[test]
    fn note_size_slot_follows_a_fade_out(parts in 1u32..16) {
        let mut inst = Instrument::of_type(InstrumentType::Chip, false);
        inst.add_envelope(
            EnvelopeSettings::new(AutomationTarget::NoteVolume, 0, EnvelopeShape::NoteSize).with_bounds(0.0, 1.0),
        );
        let note = Note::with_pins(&[60], 0, parts, vec![NotePin::new(0, 0, NOTE_SIZE_MAX), NotePin::new(parts, 0, 0)]);
        let mut computer = EnvelopeComputer::new();
        let ticks = parts * TICKS_PER_PART;
        for tick in 0..ticks {
            let timing = ToneTiming {
                note: Some(&note),
                tick_time_start: tick as f64,
                at_note_start: tick == 0,
                ..Default::default()
            };
            computer.compute_envelopes(&inst, &timing, 0.01, 1.0);
            if tick == 0 {
                prop_assert!((computer.start_value(AutomationTarget::NoteVolume, 0) - 1.0).abs() < TOLERANCE);
            }
            computer.advance();
        }
        prop_assert!(computer.end_value(AutomationTarget::NoteVolume, 0).abs() < TOLERANCE);
    }

    /// Decay halves once per `1 / speed` seconds.
    #[test]
    fn decay_halves_per_period(speed in 0.25f64..16.0) {
        let params = shape_params(EnvelopeShape::Decay, 0.0, 1.0, speed, 2, 0);
        prop_assert_eq!(compute_envelope(&params, &EnvelopeInputs::default()), 1.0);
        let one_period = EnvelopeInputs { time: 1.0 / speed, ..Default::default() };
        prop_assert!((compute_envelope(&params, &one_period) - 0.5).abs() < 1e-12);
    }

    /// A sine LFO starts at its lower bound and returns to it exactly after
    /// whole periods.
    #[test]
    fn sine_lfo_repeats_each_beat(
        (lower, upper) in bounds(),
        periods in 1u32..64,
    ) {
        let params = shape_params(EnvelopeShape::Lfo(LfoWaveform::Sine), lower, upper, 1.0, 2, 0);
        let at_zero = compute_envelope(&params, &EnvelopeInputs::default());
        prop_assert!((at_zero - lower).abs() < TOLERANCE);
        let later = EnvelopeInputs { ticks: (periods * TICKS_PER_BEAT) as f64, ..Default::default() };
        prop_assert_eq!(compute_envelope(&params, &later), at_zero);
    }

    /// The deque behaves like `VecDeque` under any mix of operations.
    #[test]
    fn deque_matches_vecdeque(ops in prop::collection::vec((0u8..5, any::<u16>()), 0..200)) {
        let mut deque = Deque::with_capacity(2);
        let mut model = VecDeque::new();
        for (op, value) in ops {
            match op {
                0 => {
                    deque.push_back(value);
                    model.push_back(value);
                }
                1 => {
                    deque.push_front(value);
                    model.push_front(value);
                }
                2 => prop_assert_eq!(deque.pop_front(), model.pop_front()),
                3 => prop_assert_eq!(deque.pop_back(), model.pop_back()),
                _ => {
                    let index = if model.is_empty() { 0 } else { value as usize % model.len() };
                    prop_assert_eq!(deque.remove(index), model.remove(index));
                }
            }
            prop_assert_eq!(deque.len(), model.len());
            prop_assert_eq!(deque.front(), model.front());
            prop_assert_eq!(deque.back(), model.back());
        }
        prop_assert!(deque.iter().eq(model.iter()));
    }
}
