//! Static configuration tables.
//!
//! Everything here is immutable, process-wide data. Tables that describe a
//! closed set of choices (transitions, chords, chip waves, ...) are enums
//! with `const fn` accessors so an out-of-range index can only appear at the
//! raw-value boundary.

// --- Song limits ---

pub const TEMPO_MIN: f64 = 30.0;
pub const TEMPO_MAX: f64 = 500.0;
pub const TEMPO_DEFAULT: f64 = 150.0;
pub const BEATS_PER_BAR_MIN: u32 = 1;
pub const BEATS_PER_BAR_MAX: u32 = 64;
pub const BAR_COUNT_MAX: usize = 1024;
pub const PITCH_CHANNEL_COUNT_MAX: usize = 40;
pub const NOISE_CHANNEL_COUNT_MAX: usize = 16;
pub const MOD_CHANNEL_COUNT_MAX: usize = 24;
pub const INSTRUMENT_COUNT_MAX: usize = 10;
pub const LAYERED_INSTRUMENT_COUNT_MAX: usize = 4;

// --- Notes ---

pub const PITCHES_PER_OCTAVE: i32 = 12;
/// Highest pitch a pitch channel can place (nine octaves).
pub const MAX_PITCH: i32 = 108;
pub const NOTE_SIZE_MAX: u16 = 6;
pub const MAX_CHORD_SIZE: usize = 9;
pub const DRUM_COUNT: usize = 12;
/// Semitones between adjacent keys on a noise channel.
pub const NOISE_INTERVAL: i32 = 6;
/// Noise-channel key that plays a noise table at its base pitch.
pub const NOISE_CENTER_KEY: i32 = 6;
/// Pitch of noise-channel key 0 for spectrum and drumset instruments.
pub const SPECTRUM_BASE_PITCH: i32 = 24;

// --- Envelopes ---

pub const MAX_ENVELOPE_COUNT: usize = 12;
pub const ENVELOPE_SPEED_MAX: u8 = 32;
pub const ENVELOPE_SPEED_DEFAULT: u8 = 12;
pub const PER_ENVELOPE_BOUND_MAX: f64 = 1.0;
pub const PER_ENVELOPE_SPEED_MAX: f64 = 256.0;
pub const RANDOM_ENVELOPE_STEPS_MAX: u8 = 24;
pub const RANDOM_ENVELOPE_SEED_MAX: u8 = 63;
pub const LFO_STEPS_MAX: u8 = 24;

// --- Instrument parameters ---

pub const VOLUME_RANGE: i32 = 50;
pub const VOLUME_LOG_SCALE: f64 = 0.1428;
pub const PAN_CENTER: i32 = 50;
pub const PAN_MAX: i32 = 100;
pub const PAN_DELAY_MAX: u8 = 20;
pub const PAN_DELAY_SECONDS_MAX: f64 = 0.001;
pub const FADE_IN_RANGE: u8 = 10;
pub const FADE_OUT_TICKS: [i32; 11] = [-24, -12, -6, -3, -1, 6, 12, 24, 48, 72, 96];
pub const FADE_OUT_NEUTRAL: usize = 4;
pub const DRUMSET_FADE_OUT_TICKS: i32 = 48;
pub const PULSE_WIDTH_RANGE: u8 = 50;
pub const PULSE_WIDTH_DEFAULT: u8 = 25;
pub const SUPERSAW_VOICE_COUNT: usize = 7;
pub const SUPERSAW_DYNAMISM_MAX: u8 = 6;
pub const SUPERSAW_SPREAD_MAX: u8 = 12;
pub const SUPERSAW_SHAPE_MAX: u8 = 6;
pub const STRING_SUSTAIN_RANGE: u8 = 15;
pub const PITCH_SHIFT_RANGE: i32 = 24;
pub const PITCH_SHIFT_CENTER: i32 = 12;
pub const DETUNE_MIN: i32 = -200;
pub const DETUNE_MAX: i32 = 200;
pub const ARPEGGIO_SPEED_DEFAULT: usize = 12;
pub const TICKS_PER_ARPEGGIO: u32 = 3;
pub const FILTER_MORPH_COUNT: usize = 10;

// --- Effects ---

pub const DISTORTION_RANGE: u8 = 8;
pub const BITCRUSHER_FREQ_RANGE: u8 = 14;
pub const BITCRUSHER_OCTAVE_STEP: f64 = 0.5;
pub const BITCRUSHER_QUANTIZATION_RANGE: u8 = 8;
pub const CHORUS_RANGE: u8 = 8;
pub const ECHO_SUSTAIN_RANGE: u8 = 8;
pub const ECHO_DELAY_RANGE: u8 = 24;
pub const ECHO_DELAY_STEP_TICKS: u32 = 4;
pub const ECHO_SHELF_HZ: f64 = 4000.0;
pub const ECHO_SHELF_GAIN: f64 = 0.707_106_781_186_547_6;
pub const REVERB_RANGE: u8 = 32;
pub const REVERB_SHELF_HZ: f64 = 8000.0;
pub const REVERB_SHELF_GAIN: f64 = 0.353_553_390_593_273_8;
pub const REVERB_DELAY_BUFFER_SIZE: usize = 16384;
pub const RING_MOD_RANGE: u8 = 8;
pub const RING_MOD_HZ_RANGE: u8 = 64;
pub const RING_MOD_MIN_HZ: f64 = 20.0;
pub const RING_MOD_MAX_HZ: f64 = 4000.0;
pub const GRANULAR_RANGE: u8 = 32;
pub const GRAIN_SIZE_MIN: u32 = 40;
pub const GRAIN_SIZE_MAX: u32 = 2000;
pub const GRAIN_SIZE_STEP: u32 = 40;
pub const GRAIN_RANGE_MAX: u32 = 1600;
pub const MAX_GRAIN_COUNT: usize = 8;

// --- Synthesis base levels ---

pub const CHIP_BASE_EXPRESSION: f64 = 0.033_75;
pub const FM_BASE_EXPRESSION: f64 = 0.03;
pub const NOISE_BASE_EXPRESSION: f64 = 0.19;
pub const SPECTRUM_BASE_EXPRESSION: f64 = 0.3;
pub const DRUMSET_BASE_EXPRESSION: f64 = 0.45;
pub const HARMONICS_BASE_EXPRESSION: f64 = 0.025;
pub const PWM_BASE_EXPRESSION: f64 = 0.047_25;
pub const SUPERSAW_BASE_EXPRESSION: f64 = 0.061_425;
pub const PICKED_STRING_BASE_EXPRESSION: f64 = 0.025;

// --- Wave table sizes ---

pub const CHIP_NOISE_LENGTH: usize = 1 << 15;
pub const SPECTRUM_NOISE_LENGTH: usize = 1 << 15;
pub const SPECTRUM_CONTROL_POINTS_PER_OCTAVE: usize = 7;
pub const SPECTRUM_CONTROL_POINTS: usize = 30;
pub const SPECTRUM_MAX: u8 = 7;
pub const HARMONICS_CONTROL_POINTS: usize = 28;
pub const HARMONICS_RENDERED: usize = 64;
pub const HARMONICS_MAX: u8 = 7;
pub const HARMONICS_WAVELENGTH: usize = 1 << 11;
pub const SINE_WAVE_LENGTH: usize = 1 << 8;
pub const CUSTOM_CHIP_WAVE_LENGTH: usize = 64;
pub const OPERATOR_COUNT: usize = 4;
pub const FM6_OPERATOR_COUNT: usize = 6;
pub const OPERATOR_AMPLITUDE_MAX: u8 = 15;
pub const UNISON_VOICES_MAX: usize = 2;

/// Convert an instrument volume setting into a linear multiplier.
///
/// The bottom of the range is silence rather than a very small gain.
pub fn instrument_volume_to_mult(volume: i32) -> f64 {
    if volume <= -VOLUME_RANGE / 2 {
        0.0
    } else {
        libm::pow(2.0, VOLUME_LOG_SCALE * volume as f64)
    }
}

/// Seconds of fade-in for a fade-in setting.
pub fn fade_in_seconds(setting: u8) -> f64 {
    let s = setting.min(FADE_IN_RANGE - 1) as f64;
    0.0125 * (0.95 * s + 0.05 * s * s)
}

/// Release ticks for a fade-out setting. Negative values cut the note early.
pub fn fade_out_ticks(setting: usize) -> i32 {
    FADE_OUT_TICKS[setting.min(FADE_OUT_TICKS.len() - 1)]
}

/// Curve applied to FM operator and feedback amplitude settings.
pub fn operator_amplitude_curve(amplitude: f64) -> f64 {
    (libm::pow(16.0, amplitude / OPERATOR_AMPLITUDE_MAX as f64) - 1.0) / 15.0
}

/// Arpeggio speed multipliers indexed by the arpeggio speed setting.
pub const ARPEGGIO_SPEED_SCALE: [f64; 51] = [
    0.0, 0.0625, 0.125, 0.2, 0.25, 1.0 / 3.0, 0.4, 0.5, 2.0 / 3.0, 0.75, 0.8, 0.9, 1.0, 1.0625,
    1.1, 1.2, 1.3, 1.4, 1.5, 1.6, 1.7, 1.8, 1.9, 2.0, 2.1, 2.2, 2.3, 2.4, 2.5, 2.6, 2.7, 2.8, 2.9,
    3.0, 3.1, 3.2, 3.3, 3.4, 3.5, 3.6, 3.7, 3.8, 3.9, 4.0, 4.15, 4.3, 4.5, 4.8, 5.0, 5.5, 6.0,
];

// --- Keys ---

/// Key names indexed by the song key setting. C is key 0.
pub const KEY_NAMES: [&str; 12] = ["C", "C♯", "D", "D♯", "E", "F", "F♯", "G", "G♯", "A", "A♯", "B"];

/// Pitch of the lowest tonic of a key, one octave above pitch 0.
pub const fn key_base_pitch(key: u8) -> i32 {
    12 + (key % 12) as i32
}

// --- Transitions ---

/// How consecutive notes join.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Transition {
    /// Every note restarts its envelopes.
    #[default]
    Normal,
    /// A touching note cuts the previous one without a gap.
    Interrupt,
    /// A touching note keeps the previous note's envelopes running.
    Continue,
    /// A touching note glides from the previous pitch.
    Slide,
    /// Like `Slide`, but never across pattern boundaries.
    SlideInPattern,
}

impl Transition {
    pub const ALL: [Transition; 5] = [
        Transition::Normal,
        Transition::Interrupt,
        Transition::Continue,
        Transition::Slide,
        Transition::SlideInPattern,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Transition::Normal => "normal",
            Transition::Interrupt => "interrupt",
            Transition::Continue => "continue",
            Transition::Slide => "slide",
            Transition::SlideInPattern => "slide in pattern",
        }
    }

    /// Touching notes reuse the same tone instead of retriggering.
    pub const fn is_seamless(self) -> bool {
        !matches!(self, Transition::Normal)
    }

    /// Envelope clocks carry over from the previous note.
    pub const fn continues(self) -> bool {
        matches!(self, Transition::Continue)
    }

    pub const fn slides(self) -> bool {
        matches!(self, Transition::Slide | Transition::SlideInPattern)
    }

    /// Ticks over which a slide blends into the next note.
    pub const fn slide_ticks(self) -> u32 {
        3
    }

    /// Adjacent notes are looked up across bar boundaries.
    pub const fn includes_adjacent_patterns(self) -> bool {
        !matches!(self, Transition::Normal | Transition::SlideInPattern)
    }
}

// --- Chords ---

/// How the pitches of a chord are played.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Chord {
    #[default]
    Simultaneous,
    Strum,
    Arpeggio,
    /// The first pitch is played and the others set unison offsets.
    CustomInterval,
    /// One selected chord tone sounds.
    Monophonic,
}

impl Chord {
    pub const ALL: [Chord; 5] =
        [Chord::Simultaneous, Chord::Strum, Chord::Arpeggio, Chord::CustomInterval, Chord::Monophonic];

    pub const fn name(self) -> &'static str {
        match self {
            Chord::Simultaneous => "simultaneous",
            Chord::Strum => "strum",
            Chord::Arpeggio => "arpeggio",
            Chord::CustomInterval => "custom interval",
            Chord::Monophonic => "monophonic",
        }
    }

    /// All chord pitches share one tone.
    pub const fn single_tone(self) -> bool {
        matches!(self, Chord::Arpeggio | Chord::CustomInterval | Chord::Monophonic)
    }

    pub const fn arpeggiates(self) -> bool {
        matches!(self, Chord::Arpeggio)
    }

    /// Parts between consecutive strummed pitches.
    pub const fn strum_parts(self) -> u32 {
        match self {
            Chord::Strum => 1,
            _ => 0,
        }
    }

    pub const fn custom_interval(self) -> bool {
        matches!(self, Chord::CustomInterval)
    }
}

// --- Vibrato ---

/// Periods (seconds) summed to build a vibrato waveform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VibratoType {
    Normal,
    Shaky,
}

impl VibratoType {
    pub const fn periods_seconds(self) -> &'static [f64] {
        match self {
            VibratoType::Normal => &[0.14],
            VibratoType::Shaky => &[0.11, 0.11 * 1.618, 0.11 * 3.0],
        }
    }
}

/// Vibrato presets plus a custom setting.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Vibrato {
    #[default]
    None,
    Light,
    Delayed,
    Heavy,
    Shaky,
    Custom { depth: f64, speed: f64, delay_ticks: u32, kind: VibratoType },
}

impl Vibrato {
    /// Vibrato depth in semitones.
    pub fn amplitude(self) -> f64 {
        match self {
            Vibrato::None => 0.0,
            Vibrato::Light => 0.15,
            Vibrato::Delayed => 0.3,
            Vibrato::Heavy => 0.45,
            Vibrato::Shaky => 0.1,
            Vibrato::Custom { depth, .. } => depth,
        }
    }

    /// Ticks after note start before the vibrato fades in.
    pub fn delay_ticks(self) -> u32 {
        match self {
            Vibrato::Delayed => 37,
            Vibrato::Custom { delay_ticks, .. } => delay_ticks,
            _ => 0,
        }
    }

    pub fn kind(self) -> VibratoType {
        match self {
            Vibrato::Shaky => VibratoType::Shaky,
            Vibrato::Custom { kind, .. } => kind,
            _ => VibratoType::Normal,
        }
    }

    /// Time multiplier applied to the vibrato clock.
    pub fn speed(self) -> f64 {
        match self {
            Vibrato::Custom { speed, .. } => speed,
            _ => 1.0,
        }
    }
}

// --- Unison ---

/// Detuned duplicate voices per tone.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnisonSettings {
    pub voices: usize,
    /// Detune between voices in semitones.
    pub spread: f64,
    /// Detune shared by all voices in semitones.
    pub offset: f64,
    pub expression: f64,
    /// Multiplier applied to the second voice.
    pub sign: f64,
}

/// Unison presets plus a custom setting.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Unison {
    #[default]
    None,
    Shimmer,
    Hum,
    HonkyTonk,
    Dissonant,
    Fifth,
    Octave,
    Bowed,
    Piano,
    Warbled,
    Custom(UnisonSettings),
}

impl Unison {
    pub const fn settings(self) -> UnisonSettings {
        const fn preset(voices: usize, spread: f64, offset: f64, expression: f64, sign: f64) -> UnisonSettings {
            UnisonSettings { voices, spread, offset, expression, sign }
        }
        match self {
            Unison::None => preset(1, 0.0, 0.0, 1.4, 1.0),
            Unison::Shimmer => preset(2, 0.018, 0.0, 0.8, 1.0),
            Unison::Hum => preset(2, 0.045, 0.0, 1.0, 1.0),
            Unison::HonkyTonk => preset(2, 0.09, 0.0, 1.0, 1.0),
            Unison::Dissonant => preset(2, 0.25, 0.0, 0.9, 1.0),
            Unison::Fifth => preset(2, 3.5, 3.5, 0.9, 1.0),
            Unison::Octave => preset(2, 6.0, 6.0, 0.8, 1.0),
            Unison::Bowed => preset(2, 0.02, 0.0, 1.0, -1.0),
            Unison::Piano => preset(2, 0.01, 0.0, 1.0, 0.7),
            Unison::Warbled => preset(2, 0.25, 0.05, 0.9, -0.8),
            Unison::Custom(settings) => settings,
        }
    }
}

// --- Chip waves ---

/// Built-in chip wavetables.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChipWave {
    Rounded,
    Triangle,
    #[default]
    Square,
    QuarterPulse,
    EighthPulse,
    Sawtooth,
    DoubleSaw,
    DoublePulse,
    Spiky,
}

impl ChipWave {
    pub const ALL: [ChipWave; 9] = [
        ChipWave::Rounded,
        ChipWave::Triangle,
        ChipWave::Square,
        ChipWave::QuarterPulse,
        ChipWave::EighthPulse,
        ChipWave::Sawtooth,
        ChipWave::DoubleSaw,
        ChipWave::DoublePulse,
        ChipWave::Spiky,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            ChipWave::Rounded => "rounded",
            ChipWave::Triangle => "triangle",
            ChipWave::Square => "square",
            ChipWave::QuarterPulse => "1/4 pulse",
            ChipWave::EighthPulse => "1/8 pulse",
            ChipWave::Sawtooth => "sawtooth",
            ChipWave::DoubleSaw => "double saw",
            ChipWave::DoublePulse => "double pulse",
            ChipWave::Spiky => "spiky",
        }
    }

    pub const fn expression(self) -> f64 {
        match self {
            ChipWave::Rounded => 0.94,
            ChipWave::Triangle => 1.0,
            ChipWave::Square | ChipWave::QuarterPulse | ChipWave::EighthPulse => 0.5,
            ChipWave::Sawtooth => 0.65,
            ChipWave::DoubleSaw => 0.5,
            ChipWave::DoublePulse | ChipWave::Spiky => 0.4,
        }
    }

    /// One period of the raw (uncentered) waveform.
    pub const fn samples(self) -> &'static [f64] {
        match self {
            ChipWave::Rounded => &ROUNDED_WAVE,
            ChipWave::Triangle => &TRIANGLE_WAVE,
            ChipWave::Square => &[1.0, -1.0],
            ChipWave::QuarterPulse => &[1.0, -1.0, -1.0, -1.0],
            ChipWave::EighthPulse => &[1.0, -1.0, -1.0, -1.0, -1.0, -1.0, -1.0, -1.0],
            ChipWave::Sawtooth => &SAWTOOTH_WAVE,
            ChipWave::DoubleSaw => &[
                0.0, -0.2, -0.4, -0.6, -0.8, -1.0, 1.0, -0.8, -0.6, -0.4, -0.2, 1.0, 0.8, 0.6, 0.4, 0.2,
            ],
            ChipWave::DoublePulse => &[
                1.0, 1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, -1.0,
            ],
            ChipWave::Spiky => &[1.0, -1.0, 1.0, -1.0, 1.0, 0.0],
        }
    }
}

const ROUNDED_WAVE: [f64; 42] = [
    0.0, 0.2, 0.4, 0.5, 0.6, 0.7, 0.8, 0.85, 0.9, 0.95, 1.0, 1.0, 0.95, 0.9, 0.85, 0.8, 0.7, 0.6,
    0.5, 0.4, 0.2, 0.0, -0.2, -0.4, -0.5, -0.6, -0.7, -0.8, -0.85, -0.9, -0.95, -1.0, -1.0, -0.95,
    -0.9, -0.85, -0.8, -0.7, -0.6, -0.5, -0.4, -0.2,
];

const TRIANGLE_WAVE: [f64; 32] = {
    let mut wave = [0.0; 32];
    let mut i = 0;
    while i < 8 {
        let v = (2 * i + 1) as f64 / 15.0;
        wave[i] = v;
        wave[15 - i] = v;
        wave[16 + i] = -v;
        wave[31 - i] = -v;
        i += 1;
    }
    wave
};

const SAWTOOTH_WAVE: [f64; 32] = {
    let mut wave = [0.0; 32];
    let mut i = 0;
    while i < 16 {
        let v = (2 * i + 1) as f64 / 31.0;
        wave[i] = v;
        wave[31 - i] = -v;
        i += 1;
    }
    wave
};

// --- Noise waves ---

/// Built-in noise tables for noise channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NoiseWave {
    #[default]
    Retro,
    White,
    Clang,
    Buzz,
    Hollow,
    Shine,
    Deep,
    Cutter,
    Metallic,
}

impl NoiseWave {
    pub const ALL: [NoiseWave; 9] = [
        NoiseWave::Retro,
        NoiseWave::White,
        NoiseWave::Clang,
        NoiseWave::Buzz,
        NoiseWave::Hollow,
        NoiseWave::Shine,
        NoiseWave::Deep,
        NoiseWave::Cutter,
        NoiseWave::Metallic,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            NoiseWave::Retro => "retro",
            NoiseWave::White => "white",
            NoiseWave::Clang => "clang",
            NoiseWave::Buzz => "buzz",
            NoiseWave::Hollow => "hollow",
            NoiseWave::Shine => "shine",
            NoiseWave::Deep => "deep",
            NoiseWave::Cutter => "cutter",
            NoiseWave::Metallic => "metallic",
        }
    }

    pub const fn expression(self) -> f64 {
        match self {
            NoiseWave::Retro => 0.25,
            NoiseWave::White => 1.0,
            NoiseWave::Clang => 0.4,
            NoiseWave::Buzz => 0.3,
            NoiseWave::Hollow => 1.5,
            NoiseWave::Shine => 1.0,
            NoiseWave::Deep => 1.5,
            NoiseWave::Cutter => 0.005,
            NoiseWave::Metallic => 1.0,
        }
    }

    /// Pitch at which the table plays back at its natural rate.
    pub const fn base_pitch(self) -> i32 {
        match self {
            NoiseWave::Hollow | NoiseWave::Cutter | NoiseWave::Metallic => 96,
            NoiseWave::Deep => 120,
            _ => 69,
        }
    }

    /// Scales the cutoff of the per-pitch low-pass applied to the table.
    pub const fn pitch_filter_mult(self) -> f64 {
        match self {
            NoiseWave::White => 8.0,
            NoiseWave::Hollow => 1.0,
            _ => 1024.0,
        }
    }

    /// Soft tables get smoothed rather than stepped interpolation.
    pub const fn is_soft(self) -> bool {
        matches!(self, NoiseWave::White | NoiseWave::Hollow | NoiseWave::Deep)
    }
}

// --- FM ---

/// Operator routing for an FM instrument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Algorithm {
    pub name: &'static str,
    /// Operators `0..carrier_count` are heard directly.
    pub carrier_count: usize,
    /// Carrier each operator ultimately feeds, 1-based.
    pub associated_carrier: &'static [u8],
    /// For each operator, the 1-based operators that modulate it.
    pub modulated_by: &'static [&'static [u8]],
}

pub const ALGORITHMS: [Algorithm; 13] = [
    Algorithm { name: "1←(2 3 4)", carrier_count: 1, associated_carrier: &[1, 1, 1, 1], modulated_by: &[&[2, 3, 4], &[], &[], &[]] },
    Algorithm { name: "1←(2 3←4)", carrier_count: 1, associated_carrier: &[1, 1, 1, 1], modulated_by: &[&[2, 3], &[], &[4], &[]] },
    Algorithm { name: "1←2←(3 4)", carrier_count: 1, associated_carrier: &[1, 1, 1, 1], modulated_by: &[&[2], &[3, 4], &[], &[]] },
    Algorithm { name: "1←(2 3)←4", carrier_count: 1, associated_carrier: &[1, 1, 1, 1], modulated_by: &[&[2, 3], &[4], &[4], &[]] },
    Algorithm { name: "1←2←3←4", carrier_count: 1, associated_carrier: &[1, 1, 1, 1], modulated_by: &[&[2], &[3], &[4], &[]] },
    Algorithm { name: "1←3 2←4", carrier_count: 2, associated_carrier: &[1, 2, 1, 2], modulated_by: &[&[3], &[4], &[], &[]] },
    Algorithm { name: "1 2←(3 4)", carrier_count: 2, associated_carrier: &[1, 2, 2, 2], modulated_by: &[&[], &[3, 4], &[], &[]] },
    Algorithm { name: "1 2←3←4", carrier_count: 2, associated_carrier: &[1, 2, 2, 2], modulated_by: &[&[], &[3], &[4], &[]] },
    Algorithm { name: "(1 2)←3←4", carrier_count: 2, associated_carrier: &[1, 2, 2, 2], modulated_by: &[&[3], &[3], &[4], &[]] },
    Algorithm { name: "(1 2)←(3 4)", carrier_count: 2, associated_carrier: &[1, 2, 2, 2], modulated_by: &[&[3, 4], &[3, 4], &[], &[]] },
    Algorithm { name: "1 2 3←4", carrier_count: 3, associated_carrier: &[1, 2, 3, 3], modulated_by: &[&[], &[], &[4], &[]] },
    Algorithm { name: "(1 2 3)←4", carrier_count: 3, associated_carrier: &[1, 2, 3, 3], modulated_by: &[&[4], &[4], &[4], &[]] },
    Algorithm { name: "1 2 3 4", carrier_count: 4, associated_carrier: &[1, 2, 3, 4], modulated_by: &[&[], &[], &[], &[]] },
];

pub const ALGORITHMS_6OP: [Algorithm; 6] = [
    Algorithm { name: "1←2←3←4←5←6", carrier_count: 1, associated_carrier: &[1, 1, 1, 1, 1, 1], modulated_by: &[&[2], &[3], &[4], &[5], &[6], &[]] },
    Algorithm { name: "1←(2 3 4 5 6)", carrier_count: 1, associated_carrier: &[1, 1, 1, 1, 1, 1], modulated_by: &[&[2, 3, 4, 5, 6], &[], &[], &[], &[], &[]] },
    Algorithm { name: "1←3←5 2←4←6", carrier_count: 2, associated_carrier: &[1, 2, 1, 2, 1, 2], modulated_by: &[&[3], &[4], &[5], &[6], &[], &[]] },
    Algorithm { name: "(1 2 3)←(4 5 6)", carrier_count: 3, associated_carrier: &[1, 2, 3, 1, 2, 3], modulated_by: &[&[4, 5, 6], &[4, 5, 6], &[4, 5, 6], &[], &[], &[]] },
    Algorithm { name: "1←4 2←5 3←6", carrier_count: 3, associated_carrier: &[1, 2, 3, 1, 2, 3], modulated_by: &[&[4], &[5], &[6], &[], &[], &[]] },
    Algorithm { name: "1 2 3 4 5 6", carrier_count: 6, associated_carrier: &[1, 2, 3, 4, 5, 6], modulated_by: &[&[], &[], &[], &[], &[], &[]] },
];

/// Feedback routing: for each operator, the 1-based operators fed back into it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Feedback {
    pub name: &'static str,
    pub indices: &'static [&'static [u8]],
}

pub const FEEDBACKS: [Feedback; 18] = [
    Feedback { name: "1⟲", indices: &[&[1], &[], &[], &[]] },
    Feedback { name: "2⟲", indices: &[&[], &[2], &[], &[]] },
    Feedback { name: "3⟲", indices: &[&[], &[], &[3], &[]] },
    Feedback { name: "4⟲", indices: &[&[], &[], &[], &[4]] },
    Feedback { name: "1⟲ 2⟲", indices: &[&[1], &[2], &[], &[]] },
    Feedback { name: "3⟲ 4⟲", indices: &[&[], &[], &[3], &[4]] },
    Feedback { name: "1⟲ 2⟲ 3⟲", indices: &[&[1], &[2], &[3], &[]] },
    Feedback { name: "2⟲ 3⟲ 4⟲", indices: &[&[], &[2], &[3], &[4]] },
    Feedback { name: "1⟲ 2⟲ 3⟲ 4⟲", indices: &[&[1], &[2], &[3], &[4]] },
    Feedback { name: "1→2", indices: &[&[], &[1], &[], &[]] },
    Feedback { name: "1→3", indices: &[&[], &[], &[1], &[]] },
    Feedback { name: "1→4", indices: &[&[], &[], &[], &[1]] },
    Feedback { name: "2→3", indices: &[&[], &[], &[2], &[]] },
    Feedback { name: "2→4", indices: &[&[], &[], &[], &[2]] },
    Feedback { name: "3→4", indices: &[&[], &[], &[], &[3]] },
    Feedback { name: "1→3 2→4", indices: &[&[], &[], &[1], &[2]] },
    Feedback { name: "1→4 2→3", indices: &[&[], &[], &[2], &[1]] },
    Feedback { name: "1→2→3→4", indices: &[&[], &[1], &[2], &[3]] },
];

pub const FEEDBACKS_6OP: [Feedback; 4] = [
    Feedback { name: "1⟲", indices: &[&[1], &[], &[], &[], &[], &[]] },
    Feedback { name: "6⟲", indices: &[&[], &[], &[], &[], &[], &[6]] },
    Feedback { name: "1⟲ 2⟲ 3⟲", indices: &[&[1], &[2], &[3], &[], &[], &[]] },
    Feedback { name: "1→2→3→4→5→6", indices: &[&[], &[1], &[2], &[3], &[4], &[5]] },
];

/// Frequency ratio of an FM operator relative to the note.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OperatorFrequency {
    pub name: &'static str,
    pub mult: f64,
    /// Fixed detune in Hz.
    pub hz_offset: f64,
    pub amplitude_sign: f64,
}

pub const OPERATOR_FREQUENCIES: [OperatorFrequency; 20] = [
    OperatorFrequency { name: "0.12×", mult: 0.125, hz_offset: 0.0, amplitude_sign: 1.0 },
    OperatorFrequency { name: "0.25×", mult: 0.25, hz_offset: 0.0, amplitude_sign: 1.0 },
    OperatorFrequency { name: "0.5×", mult: 0.5, hz_offset: 0.0, amplitude_sign: 1.0 },
    OperatorFrequency { name: "0.75×", mult: 0.75, hz_offset: 0.0, amplitude_sign: 1.0 },
    OperatorFrequency { name: "1×", mult: 1.0, hz_offset: 0.0, amplitude_sign: 1.0 },
    OperatorFrequency { name: "~1×", mult: 1.0, hz_offset: 1.5, amplitude_sign: -1.0 },
    OperatorFrequency { name: "2×", mult: 2.0, hz_offset: 0.0, amplitude_sign: 1.0 },
    OperatorFrequency { name: "~2×", mult: 2.0, hz_offset: -1.3, amplitude_sign: -1.0 },
    OperatorFrequency { name: "3×", mult: 3.0, hz_offset: 0.0, amplitude_sign: 1.0 },
    OperatorFrequency { name: "3.5×", mult: 3.5, hz_offset: -0.05, amplitude_sign: 1.0 },
    OperatorFrequency { name: "4×", mult: 4.0, hz_offset: 0.0, amplitude_sign: 1.0 },
    OperatorFrequency { name: "~4×", mult: 3.975, hz_offset: 0.0, amplitude_sign: -1.0 },
    OperatorFrequency { name: "5×", mult: 5.0, hz_offset: 0.0, amplitude_sign: 1.0 },
    OperatorFrequency { name: "6×", mult: 6.0, hz_offset: 0.0, amplitude_sign: 1.0 },
    OperatorFrequency { name: "7×", mult: 7.0, hz_offset: 0.0, amplitude_sign: 1.0 },
    OperatorFrequency { name: "8×", mult: 8.0, hz_offset: 0.0, amplitude_sign: 1.0 },
    OperatorFrequency { name: "9×", mult: 9.0, hz_offset: 0.0, amplitude_sign: 1.0 },
    OperatorFrequency { name: "11×", mult: 11.0, hz_offset: 0.0, amplitude_sign: 1.0 },
    OperatorFrequency { name: "13×", mult: 13.0, hz_offset: 0.0, amplitude_sign: 1.0 },
    OperatorFrequency { name: "16×", mult: 16.0, hz_offset: 0.0, amplitude_sign: 1.0 },
];

/// Index of the `1×` ratio.
pub const OPERATOR_FREQUENCY_UNITY: usize = 4;

/// Small per-carrier detune in semitones so stacked carriers don't phase-lock.
pub const OPERATOR_CARRIER_INTERVAL: [f64; 6] = [0.0, 0.04, -0.073, 0.091, 0.061, 0.024];
