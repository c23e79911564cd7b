//! Precomputed wave tables.
//!
//! [`WaveTables`] holds the tables every song shares: integrated chip
//! waves, noise tables and a sine table for FM. It is built once and
//! shared behind an `Arc`. [`InstrumentWaves`] holds the tables derived
//! from one instrument's own settings (custom chip wave, spectrum,
//! harmonics, drums); those are rebuilt whenever a song is loaded.

use alloc::vec;
use alloc::vec::Vec;

use tb_ir::config::{
    ChipWave, NoiseWave, CHIP_NOISE_LENGTH, CUSTOM_CHIP_WAVE_LENGTH, DRUM_COUNT, HARMONICS_CONTROL_POINTS,
    HARMONICS_MAX, HARMONICS_RENDERED, HARMONICS_WAVELENGTH, SINE_WAVE_LENGTH, SPECTRUM_CONTROL_POINTS,
    SPECTRUM_CONTROL_POINTS_PER_OCTAVE, SPECTRUM_MAX, SPECTRUM_NOISE_LENGTH,
};
use tb_ir::{HarmonicsWave, InstrumentKind, SpectrumWave};

use crate::fft::{normalize_peak, polar_bin, real_wave_from_bins, remove_dc};

/// Bin of a spectrum table that holds the fundamental of a pitched note.
pub const SPECTRUM_FUNDAMENTAL_BIN: usize = 32;

/// Small deterministic generator so tables are identical on every run.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TableRng(u32);

impl TableRng {
    pub(crate) const fn new(seed: u32) -> Self {
        Self(if seed == 0 { 0x9E37_79B9 } else { seed })
    }

    pub(crate) fn next_u32(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }

    /// Uniform in `[0, 1)`.
    pub(crate) fn next_f64(&mut self) -> f64 {
        self.next_u32() as f64 / 4_294_967_296.0
    }
}

// --- Integrated waves ---

/// A single-cycle wave stored with its running integral.
///
/// Playing the difference of the integral between two phases divided by
/// the phase step is a box filter over the step, which removes most of
/// the aliasing of naive table lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct IntegratedWave {
    /// Zero-mean samples.
    samples: Vec<f64>,
    /// `integral[i]` is the area under the wave before sample `i`.
    integral: Vec<f64>,
    /// Integrate the linearly interpolated wave instead of the stepped one.
    smooth: bool,
}

impl IntegratedWave {
    pub fn new(raw: &[f64], smooth: bool) -> Self {
        let mut samples: Vec<f64> = raw.to_vec();
        remove_dc(&mut samples);
        let len = samples.len();
        let mut integral = Vec::with_capacity(len + 1);
        let mut acc = 0.0;
        integral.push(0.0);
        for i in 0..len {
            let area = if smooth { (samples[i] + samples[(i + 1) % len]) * 0.5 } else { samples[i] };
            acc += area;
            integral.push(acc);
        }
        Self { samples, integral, smooth }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Integral at `phase` cycles, in sample units.
    #[inline]
    pub fn integral_at(&self, phase: f64) -> f64 {
        let len = self.samples.len();
        if len == 0 {
            return 0.0;
        }
        let wrapped = phase - libm::floor(phase);
        let x = wrapped * len as f64;
        let i = (x as usize).min(len - 1);
        let frac = x - i as f64;
        let a = self.samples[i];
        if self.smooth {
            let b = self.samples[(i + 1) % len];
            self.integral[i] + a * frac + (b - a) * frac * frac * 0.5
        } else {
            self.integral[i] + a * frac
        }
    }

    /// Average of the wave between two phases `delta` cycles apart.
    #[inline]
    pub fn average(&self, prev_integral: f64, integral: f64, delta: f64) -> f64 {
        let span = delta * self.samples.len() as f64;
        if span <= 1e-9 {
            return 0.0;
        }
        // The integral is periodic, so wrapped phases need no correction.
        (integral - prev_integral) / span
    }
}

// --- Shared tables ---

/// Tables shared by every song.
#[derive(Debug)]
pub struct WaveTables {
    chip: Vec<IntegratedWave>,
    noise: Vec<Vec<f32>>,
    /// `SINE_WAVE_LENGTH + 1` samples so lookups can read one past the end.
    sine: Vec<f64>,
}

impl WaveTables {
    pub fn new(smooth_chip_waves: bool) -> Self {
        let chip = ChipWave::ALL.iter().map(|w| IntegratedWave::new(w.samples(), smooth_chip_waves)).collect();
        let noise = NoiseWave::ALL.iter().map(|&w| generate_noise(w)).collect();
        let sine = (0..=SINE_WAVE_LENGTH)
            .map(|i| libm::sin(core::f64::consts::TAU * i as f64 / SINE_WAVE_LENGTH as f64))
            .collect();
        Self { chip, noise, sine }
    }

    pub fn chip(&self, wave: ChipWave) -> &IntegratedWave {
        &self.chip[wave as usize]
    }

    pub fn noise(&self, wave: NoiseWave) -> &[f32] {
        &self.noise[wave as usize]
    }

    /// Sine of `phase` cycles.
    #[inline]
    pub fn sine(&self, phase: f64) -> f64 {
        let wrapped = phase - libm::floor(phase);
        let x = wrapped * SINE_WAVE_LENGTH as f64;
        let i = (x as usize).min(SINE_WAVE_LENGTH - 1);
        let frac = x - i as f64;
        self.sine[i] + (self.sine[i + 1] - self.sine[i]) * frac
    }
}

/// Shift-register noise: each output bit is the low bit of the register.
fn lfsr_noise(tap: u32) -> Vec<f32> {
    let mut wave = vec![0.0f32; CHIP_NOISE_LENGTH];
    let mut register: u32 = 1;
    for sample in wave.iter_mut() {
        *sample = ((register & 1) as f32) * 2.0 - 1.0;
        let mut next = register >> 1;
        if ((register + next) & 1) == 1 {
            next += tap;
        }
        register = next;
    }
    wave
}

/// Noise shaped by a band of harmonics between two bins.
fn band_noise(low_bin: usize, high_bin: usize, seed: u32) -> Vec<f32> {
    let mut rng = TableRng::new(seed);
    let mut bins = vec![polar_bin(0.0, 0.0); high_bin + 1];
    for (k, bin) in bins.iter_mut().enumerate().skip(low_bin.max(1)) {
        let amplitude = 1.0 / libm::sqrt(k as f64);
        *bin = polar_bin(amplitude, rng.next_f64());
    }
    let mut wave = real_wave_from_bins(CHIP_NOISE_LENGTH, &bins);
    remove_dc(&mut wave);
    normalize_peak(&mut wave);
    wave.iter().map(|&s| s as f32).collect()
}

fn generate_noise(wave: NoiseWave) -> Vec<f32> {
    match wave {
        NoiseWave::Retro => lfsr_noise(1 << 14),
        NoiseWave::White => {
            let mut rng = TableRng::new(0x5EED_0001);
            (0..CHIP_NOISE_LENGTH).map(|_| (rng.next_f64() * 2.0 - 1.0) as f32).collect()
        }
        NoiseWave::Clang => lfsr_noise(2 << 14),
        NoiseWave::Buzz => lfsr_noise(10 << 2),
        NoiseWave::Hollow => band_noise(256, 2048, 0x5EED_0004),
        NoiseWave::Shine => lfsr_noise(11 << 2),
        NoiseWave::Deep => band_noise(16, 256, 0x5EED_0006),
        NoiseWave::Cutter => {
            let mut rng = TableRng::new(0x5EED_0007);
            let mut register: u32 = 1;
            (0..CHIP_NOISE_LENGTH)
                .map(|_| {
                    let level = ((register & 1) as f64 * 2.0 - 1.0) * 4.0 * (rng.next_f64() * 14.0 + 1.0);
                    let mut next = register >> 1;
                    if ((register + next) & 1) == 1 {
                        next += 15 << 2;
                    }
                    register = next;
                    level as f32
                })
                .collect()
        }
        NoiseWave::Metallic => lfsr_noise(3 << 13),
    }
}

// --- Instrument tables ---

/// Tables derived from one instrument's settings.
#[derive(Clone, Debug, Default)]
pub enum InstrumentWaves {
    #[default]
    None,
    CustomChip(IntegratedWave),
    Spectrum(Vec<f32>),
    Harmonics(IntegratedWave),
    Drumset(Vec<Vec<f32>>),
}

impl InstrumentWaves {
    /// Build whatever tables `kind` needs.
    pub fn for_kind(kind: &InstrumentKind, noise_channel: bool) -> Self {
        match kind {
            InstrumentKind::CustomChipWave { wave } => InstrumentWaves::CustomChip(custom_chip_wave(wave)),
            InstrumentKind::Spectrum { spectrum } => InstrumentWaves::Spectrum(spectrum_wave(spectrum, noise_channel)),
            InstrumentKind::Harmonics { harmonics } | InstrumentKind::PickedString { harmonics, .. } => {
                InstrumentWaves::Harmonics(harmonics_wave(harmonics))
            }
            InstrumentKind::Drumset { drums } => {
                InstrumentWaves::Drumset(drums.iter().map(|d| spectrum_wave(&d.spectrum, true)).collect())
            }
            _ => InstrumentWaves::None,
        }
    }

    pub fn integrated(&self) -> Option<&IntegratedWave> {
        match self {
            InstrumentWaves::CustomChip(w) | InstrumentWaves::Harmonics(w) => Some(w),
            _ => None,
        }
    }

    pub fn spectrum(&self) -> Option<&[f32]> {
        match self {
            InstrumentWaves::Spectrum(w) => Some(w),
            _ => None,
        }
    }

    pub fn drum(&self, index: usize) -> Option<&[f32]> {
        match self {
            InstrumentWaves::Drumset(drums) => drums.get(index.min(DRUM_COUNT - 1)).map(|d| d.as_slice()),
            _ => None,
        }
    }
}

/// Custom waves are drawn in `-24..=24`.
pub fn custom_chip_wave(wave: &[f32; CUSTOM_CHIP_WAVE_LENGTH]) -> IntegratedWave {
    let raw: Vec<f64> = wave.iter().map(|&s| s as f64 / 24.0).collect();
    IntegratedWave::new(&raw, false)
}

/// Noise table whose spectrum follows the control points.
///
/// Control point `i` sits `i / SPECTRUM_CONTROL_POINTS_PER_OCTAVE` octaves
/// above [`SPECTRUM_FUNDAMENTAL_BIN`]; bins between points interpolate.
/// Noise channels get random partial phases, pitched channels a fixed
/// phase per bin so notes have a stable attack.
pub fn spectrum_wave(spectrum: &SpectrumWave, noise_channel: bool) -> Vec<f32> {
    let mut rng = TableRng::new(if noise_channel { 0x5EED_1001 } else { 0x5EED_1002 });
    let top_octave = (SPECTRUM_CONTROL_POINTS - 1) as f64 / SPECTRUM_CONTROL_POINTS_PER_OCTAVE as f64;
    let top_bin = ((SPECTRUM_FUNDAMENTAL_BIN as f64 * libm::pow(2.0, top_octave)) as usize)
        .min(SPECTRUM_NOISE_LENGTH / 2 - 1);
    let mut bins = vec![polar_bin(0.0, 0.0); top_bin + 1];
    for (k, bin) in bins.iter_mut().enumerate().skip(SPECTRUM_FUNDAMENTAL_BIN) {
        let position =
            libm::log2(k as f64 / SPECTRUM_FUNDAMENTAL_BIN as f64) * SPECTRUM_CONTROL_POINTS_PER_OCTAVE as f64;
        let i = (position as usize).min(SPECTRUM_CONTROL_POINTS - 1);
        let frac = position - i as f64;
        let a = spectrum.spectrum[i] as f64 / SPECTRUM_MAX as f64;
        let b = spectrum.spectrum[(i + 1).min(SPECTRUM_CONTROL_POINTS - 1)] as f64 / SPECTRUM_MAX as f64;
        let level = a + (b - a) * frac;
        if level <= 0.0 {
            continue;
        }
        let amplitude = level * level / libm::sqrt(k as f64);
        let phase = if noise_channel { rng.next_f64() } else { (k % 7) as f64 / 7.0 };
        *bin = polar_bin(amplitude, phase);
    }
    let mut wave = real_wave_from_bins(SPECTRUM_NOISE_LENGTH, &bins);
    remove_dc(&mut wave);
    normalize_peak(&mut wave);
    wave.iter().map(|&s| s as f32).collect()
}

/// Amplitude of partial `n` (1-based). Partials past the control points
/// fade out linearly from the last point's level.
fn harmonic_amplitude(harmonics: &HarmonicsWave, n: usize) -> f64 {
    let level = if n <= HARMONICS_CONTROL_POINTS {
        harmonics.harmonics[n - 1] as f64
    } else {
        let last = harmonics.harmonics[HARMONICS_CONTROL_POINTS - 1] as f64;
        let fade = (HARMONICS_RENDERED - n) as f64 / (HARMONICS_RENDERED - HARMONICS_CONTROL_POINTS) as f64;
        last * fade
    };
    let a = level / HARMONICS_MAX as f64;
    a * a / libm::sqrt(n as f64)
}

pub fn harmonics_wave(harmonics: &HarmonicsWave) -> IntegratedWave {
    let mut rng = TableRng::new(0x5EED_2001);
    let mut bins = vec![polar_bin(0.0, 0.0); HARMONICS_RENDERED + 1];
    for (n, bin) in bins.iter_mut().enumerate().skip(1) {
        *bin = polar_bin(harmonic_amplitude(harmonics, n), rng.next_f64());
    }
    let mut wave = real_wave_from_bins(HARMONICS_WAVELENGTH, &bins);
    normalize_peak(&mut wave);
    IntegratedWave::new(&wave, false)
}
