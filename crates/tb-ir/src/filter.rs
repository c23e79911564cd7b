//! Note and EQ filter settings.
//!
//! A filter is an ordered list of control points, each realized as one
//! biquad section. Frequencies and gains are stored as *settings* on an
//! exponential grid; fractional settings appear after morphing.

use arrayvec::ArrayVec;
use core::f64::consts::PI;

use crate::envelope::EnvelopeShape;
use crate::error::IrError;
use crate::filtering::{FilterCoefficients, FrequencyResponse};

pub const FILTER_FREQ_STEP: f64 = 0.25;
pub const FILTER_FREQ_RANGE: usize = 34;
pub const FILTER_FREQ_REFERENCE_SETTING: f64 = 28.0;
pub const FILTER_FREQ_REFERENCE_HZ: f64 = 8000.0;
pub const FILTER_FREQ_MAX_HZ: f64 = 19_027.313_840_043_54; // 8000·2^(0.25·5)
pub const FILTER_FREQ_MIN_HZ: f64 = 8.0;
pub const FILTER_GAIN_RANGE: usize = 15;
pub const FILTER_GAIN_CENTER: f64 = 7.0;
pub const FILTER_GAIN_STEP: f64 = 0.5;
pub const FILTER_MAX_POINTS: usize = 8;

// Parameters of the one-knob filter older songs used.
const LEGACY_CUTOFF_MAX_HZ: f64 = 8000.0;
const LEGACY_FILTER_MAX: f64 = 0.95;
const LEGACY_MAX_RESONANCE: f64 = 0.95;
const LEGACY_CUTOFF_RANGE: u8 = 11;
const LEGACY_RESONANCE_RANGE: u8 = 8;
const LEGACY_SAMPLE_RATE: f64 = 48000.0;
const LEGACY_FIRST_ORDER_EXTRA_OCTAVES: f64 = 3.5;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FilterType {
    #[default]
    LowPass,
    HighPass,
    Peak,
}

impl TryFrom<u8> for FilterType {
    type Error = IrError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FilterType::LowPass),
            1 => Ok(FilterType::HighPass),
            2 => Ok(FilterType::Peak),
            other => Err(IrError::UnknownFilterType(other)),
        }
    }
}

/// One section of a filter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterControlPoint {
    pub kind: FilterType,
    /// Frequency setting, `0..FILTER_FREQ_RANGE`.
    pub freq: f64,
    /// Gain setting, `0..FILTER_GAIN_RANGE`.
    pub gain: f64,
}

impl FilterControlPoint {
    pub fn new(kind: FilterType, freq: f64, gain: f64) -> Self {
        Self { kind, freq, gain }
    }

    pub fn hz_from_setting(setting: f64) -> f64 {
        FILTER_FREQ_REFERENCE_HZ
            * libm::pow(2.0, (setting - FILTER_FREQ_REFERENCE_SETTING) * FILTER_FREQ_STEP)
    }

    pub fn setting_from_hz(hz: f64) -> f64 {
        libm::log2(hz / FILTER_FREQ_REFERENCE_HZ) / FILTER_FREQ_STEP + FILTER_FREQ_REFERENCE_SETTING
    }

    /// Nearest representable frequency setting.
    pub fn rounded_setting_from_hz(hz: f64) -> f64 {
        libm::round(Self::setting_from_hz(hz)).clamp(0.0, (FILTER_FREQ_RANGE - 1) as f64)
    }

    pub fn setting_from_linear_gain(linear_gain: f64) -> f64 {
        libm::log2(linear_gain) / FILTER_GAIN_STEP + FILTER_GAIN_CENTER
    }

    /// Nearest representable gain setting.
    pub fn rounded_setting_from_linear_gain(linear_gain: f64) -> f64 {
        libm::round(Self::setting_from_linear_gain(linear_gain)).clamp(0.0, (FILTER_GAIN_RANGE - 1) as f64)
    }

    pub fn hz(&self) -> f64 {
        Self::hz_from_setting(self.freq)
    }

    /// Linear gain of this point. `peak_mult` scales the distance from the
    /// type's neutral power: 0 for peaks, −0.5 (flat Butterworth) for passes.
    pub fn linear_gain(&self, peak_mult: f64) -> f64 {
        let power = (self.gain - FILTER_GAIN_CENTER) * FILTER_GAIN_STEP;
        let neutral = match self.kind {
            FilterType::Peak => 0.0,
            FilterType::LowPass | FilterType::HighPass => -0.5,
        };
        libm::pow(2.0, neutral + (power - neutral) * peak_mult)
    }

    /// Biquad for this point with its frequency scaled by `freq_mult`.
    pub fn to_coefficients(&self, sample_rate: f64, freq_mult: f64, peak_mult: f64) -> FilterCoefficients {
        let hz = (freq_mult * self.hz()).clamp(FILTER_FREQ_MIN_HZ, FILTER_FREQ_MAX_HZ);
        let corner = (2.0 * PI * hz / sample_rate).min(PI * 0.999_99);
        let gain = self.linear_gain(peak_mult);
        match self.kind {
            FilterType::LowPass => FilterCoefficients::low_pass_2nd_order_butterworth(corner, gain),
            FilterType::HighPass => FilterCoefficients::high_pass_2nd_order_butterworth(corner, gain),
            FilterType::Peak => FilterCoefficients::peak_2nd_order(corner, gain, 1.0),
        }
    }

    /// Empirical loudness correction for moving this point.
    pub fn volume_compensation_mult(&self) -> f64 {
        let octave = (self.freq - FILTER_FREQ_REFERENCE_SETTING) * FILTER_FREQ_STEP;
        let gain_pow = (self.gain - FILTER_GAIN_CENTER) * FILTER_GAIN_STEP;
        let exponent = match self.kind {
            FilterType::LowPass => {
                let freq_relative_to_8khz = libm::pow(2.0, octave) * FILTER_FREQ_REFERENCE_HZ / 8000.0;
                // Undo the warp of the old cutoff mapping.
                let warped_freq = (libm::sqrt(1.0 + 4.0 * freq_relative_to_8khz) - 1.0) / 2.0;
                let warped_octave = libm::log2(warped_freq);
                0.2 * (gain_pow + 1.0).max(0.0)
                    + (0.595 * warped_octave + 0.35 * (gain_pow + 1.0).min(0.0)).max(-3.0).min(0.0)
            }
            FilterType::HighPass => {
                0.125 * (gain_pow + 1.0).max(0.0)
                    + (0.3 * (-octave - libm::log2(FILTER_FREQ_REFERENCE_HZ / 125.0))
                        + 0.2 * (gain_pow + 1.0).min(0.0))
                    .min(0.0)
            }
            FilterType::Peak => {
                let distance_from_center = octave + libm::log2(FILTER_FREQ_REFERENCE_HZ / 2000.0);
                let d = distance_from_center / 3.0;
                let freq_loudness = libm::pow(1.0 / (1.0 + d * d), 2.0);
                0.125 * gain_pow.max(0.0) + 0.1 * freq_loudness * gain_pow.min(0.0)
            }
        };
        libm::pow(0.5, exponent)
    }
}

/// An ordered cascade of control points.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterSettings {
    pub points: ArrayVec<FilterControlPoint, FILTER_MAX_POINTS>,
}

impl FilterSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a point. Ignored once the filter is full.
    pub fn add_point(&mut self, kind: FilterType, freq: f64, gain: f64) {
        let _ = self.points.try_push(FilterControlPoint::new(kind, freq, gain));
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Two filters can interpolate when their point types line up exactly.
    pub fn can_morph(&self, other: &FilterSettings) -> bool {
        self.points.len() == other.points.len()
            && self.points.iter().zip(other.points.iter()).all(|(a, b)| a.kind == b.kind)
    }

    /// Blend two filters. Mismatched topologies switch from `a` to `b` at
    /// `pos >= 1` instead of producing a hybrid.
    pub fn lerp(a: &FilterSettings, b: &FilterSettings, pos: f64) -> FilterSettings {
        if !a.can_morph(b) {
            return if pos >= 1.0 { b.clone() } else { a.clone() };
        }
        let mut out = FilterSettings::new();
        for (pa, pb) in a.points.iter().zip(b.points.iter()) {
            out.points.push(FilterControlPoint {
                kind: pa.kind,
                freq: pa.freq + (pb.freq - pa.freq) * pos,
                gain: pa.gain + (pb.gain - pa.gain) * pos,
            });
        }
        out
    }

    /// Rebuild from the old cutoff/resonance/envelope model so old songs keep
    /// their sound. Settings are rounded onto the grid.
    pub fn convert_legacy_settings(&mut self, cutoff: u8, resonance: u8, envelope: EnvelopeShape) {
        self.clear();
        let resonant = resonance > 1;
        let first_order = resonance == 0;
        let cutoff_at_max = cutoff == LEGACY_CUTOFF_RANGE - 1;
        let env_decays = matches!(
            envelope,
            EnvelopeShape::Flare | EnvelopeShape::Twang | EnvelopeShape::Decay | EnvelopeShape::NoteSize
        );
        let legacy_radians = legacy_cutoff_radians(cutoff);

        if envelope == EnvelopeShape::None && !resonant && cutoff_at_max {
            // Flat response, no points needed.
        } else if first_order {
            let (freq, gain) = first_order_equivalent(legacy_radians, env_decays);
            self.add_point(FilterType::LowPass, freq, gain);
        } else {
            let intended_gain = legacy_intended_gain(resonance);
            let curved_radians = legacy_curved_radians(legacy_radians, intended_gain);
            let curved_hz = if env_decays {
                LEGACY_SAMPLE_RATE * curved_radians.min(legacy_radians * libm::pow(2.0, 0.25)) / (2.0 * PI)
            } else {
                LEGACY_SAMPLE_RATE * curved_radians / (2.0 * PI)
            };
            let freq = FilterControlPoint::rounded_setting_from_hz(curved_hz);
            let mut gain = if env_decays {
                intended_gain
            } else {
                let legacy = FilterCoefficients::low_pass_2nd_order_simplified(legacy_radians, intended_gain);
                FrequencyResponse::analyze(&legacy, curved_radians).magnitude()
            };
            if !resonant {
                gain = gain.min(core::f64::consts::FRAC_1_SQRT_2);
            }
            self.add_point(FilterType::LowPass, freq, FilterControlPoint::rounded_setting_from_linear_gain(gain));
        }
    }

    /// Variant used when the old model is driven directly by the synth:
    /// settings stay fractional and first order is opt-in.
    pub fn convert_legacy_settings_for_synth(&mut self, cutoff: f64, resonance: f64, allow_first_order: bool) {
        self.clear();
        let resonant = resonance > 1.0;
        let first_order = resonance == 0.0 && allow_first_order;
        let legacy_hz = LEGACY_CUTOFF_MAX_HZ * libm::pow(2.0, (cutoff - (LEGACY_CUTOFF_RANGE - 1) as f64) * 0.5);
        let legacy_radians = (2.0 * PI * legacy_hz / LEGACY_SAMPLE_RATE).min(legacy_max_radians());

        if first_order {
            let (freq, gain) = first_order_equivalent(legacy_radians, false);
            self.add_point(FilterType::LowPass, freq, gain);
        } else {
            let intended_gain = legacy_intended_gain_f(resonance);
            let curved_radians = legacy_curved_radians(legacy_radians, intended_gain);
            let curved_hz = LEGACY_SAMPLE_RATE * curved_radians / (2.0 * PI);
            let freq = FilterControlPoint::setting_from_hz(curved_hz);
            let legacy = FilterCoefficients::low_pass_2nd_order_simplified(legacy_radians, intended_gain);
            let mut gain = FrequencyResponse::analyze(&legacy, curved_radians).magnitude();
            if !resonant {
                gain = gain.min(core::f64::consts::FRAC_1_SQRT_2);
            }
            self.add_point(FilterType::LowPass, freq, FilterControlPoint::setting_from_linear_gain(gain));
        }
    }
}

fn legacy_max_radians() -> f64 {
    libm::asin(LEGACY_FILTER_MAX / 2.0) * 2.0
}

fn legacy_cutoff_radians(cutoff: u8) -> f64 {
    let hz = LEGACY_CUTOFF_MAX_HZ * libm::pow(2.0, (cutoff as f64 - (LEGACY_CUTOFF_RANGE - 1) as f64) * 0.5);
    (2.0 * PI * hz / LEGACY_SAMPLE_RATE).min(legacy_max_radians())
}

fn legacy_intended_gain(resonance: u8) -> f64 {
    legacy_intended_gain_f(resonance as f64)
}

fn legacy_intended_gain_f(resonance: f64) -> f64 {
    let span = (LEGACY_RESONANCE_RANGE - 2) as f64;
    0.5 / (1.0 - LEGACY_MAX_RESONANCE * libm::sqrt((resonance - 1.0).max(0.0) / span))
}

fn legacy_curved_radians(legacy_radians: f64, intended_gain: f64) -> f64 {
    let inverted_gain = 0.5 / intended_gain;
    let max_radians = 2.0 * PI * LEGACY_CUTOFF_MAX_HZ / LEGACY_SAMPLE_RATE;
    let freq_ratio = legacy_radians / max_radians;
    let target = legacy_radians * (freq_ratio * libm::pow(inverted_gain, 0.9) + 1.0);
    legacy_radians + (target - legacy_radians) * inverted_gain
}

/// A one-pole low-pass approximated by a second order one a few octaves up
/// with a matching gain. Returns rounded (freq, gain) settings.
fn first_order_equivalent(legacy_radians: f64, env_decays: bool) -> (f64, f64) {
    let extra = LEGACY_FIRST_ORDER_EXTRA_OCTAVES;
    let target = legacy_radians * libm::pow(2.0, extra);
    let curved = target / (1.0 + target / PI);
    let curved_hz = LEGACY_SAMPLE_RATE * curved / (2.0 * PI);
    let freq = FilterControlPoint::rounded_setting_from_hz(curved_hz);
    let final_radians = 2.0 * PI * FilterControlPoint::hz_from_setting(freq) / LEGACY_SAMPLE_RATE;
    let legacy = FilterCoefficients::low_pass_1st_order_simplified(legacy_radians);
    let response = FrequencyResponse::analyze(&legacy, final_radians).magnitude();
    let mut log_gain = libm::log2(response);
    log_gain = -extra + (log_gain + extra) * 0.82;
    if env_decays {
        log_gain = log_gain.min(-1.0);
    }
    let gain = FilterControlPoint::rounded_setting_from_linear_gain(libm::pow(2.0, log_gain));
    (freq, gain)
}
