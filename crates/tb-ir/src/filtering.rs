//! Biquad coefficient builders and frequency-response analysis.
//!
//! Coefficients use the normalized form where `a[0] == 1`:
//!
//! ```text
//! y[n] = b0·x[n] + b1·x[n-1] + b2·x[n-2] - a1·y[n-1] - a2·y[n-2]
//! ```
//!
//! Corner frequencies are given in radians per sample.

use core::f64::consts::PI;

/// Coefficients of a first or second order IIR section.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterCoefficients {
    pub a: [f64; 3],
    pub b: [f64; 3],
    /// 1 or 2. Unused trailing coefficients are zero.
    pub order: usize,
}

impl Default for FilterCoefficients {
    fn default() -> Self {
        Self::identity()
    }
}

impl FilterCoefficients {
    /// A pass-through section.
    pub const fn identity() -> Self {
        Self { a: [1.0, 0.0, 0.0], b: [1.0, 0.0, 0.0], order: 0 }
    }

    fn first_order(a1: f64, b0: f64, b1: f64) -> Self {
        Self { a: [1.0, a1, 0.0], b: [b0, b1, 0.0], order: 1 }
    }

    fn second_order(a1: f64, a2: f64, b0: f64, b1: f64, b2: f64) -> Self {
        Self { a: [1.0, a1, a2], b: [b0, b1, b2], order: 2 }
    }

    pub fn low_pass_1st_order_butterworth(corner_radians: f64) -> Self {
        let g = 1.0 / libm::tan(corner_radians * 0.5);
        let a0 = 1.0 + g;
        Self::first_order((1.0 - g) / a0, 1.0 / a0, 1.0 / a0)
    }

    /// Cheap one-pole low-pass, also the shape older songs were mixed with.
    pub fn low_pass_1st_order_simplified(corner_radians: f64) -> Self {
        let g = 2.0 * libm::sin(corner_radians * 0.5);
        Self::first_order(g - 1.0, g, 0.0)
    }

    pub fn high_pass_1st_order_butterworth(corner_radians: f64) -> Self {
        let g = 1.0 / libm::tan(corner_radians * 0.5);
        let a0 = 1.0 + g;
        Self::first_order((1.0 - g) / a0, g / a0, -g / a0)
    }

    /// First order high shelf: unity below the corner, `shelf_linear_gain` above.
    pub fn high_shelf_1st_order(corner_radians: f64, shelf_linear_gain: f64) -> Self {
        let tan = libm::tan(corner_radians * 0.5);
        let sqrt_gain = libm::sqrt(shelf_linear_gain);
        let g = (tan * sqrt_gain - 1.0) / (tan * sqrt_gain + 1.0);
        let b0 = (1.0 + g + shelf_linear_gain * (1.0 - g)) * 0.5;
        let b1 = (1.0 + g - shelf_linear_gain * (1.0 - g)) * 0.5;
        Self::first_order(g, b0, b1)
    }

    /// First order all-pass delaying the signal by a fraction of a sample.
    pub fn all_pass_1st_order_fractional_delay(delay: f64) -> Self {
        let g = (1.0 - delay) / (1.0 + delay);
        Self::first_order(g, g, 1.0)
    }

    /// Resonant low-pass. `peak_linear_gain` of `1/√2` is flat Butterworth.
    pub fn low_pass_2nd_order_butterworth(corner_radians: f64, peak_linear_gain: f64) -> Self {
        let alpha = libm::sin(corner_radians) / (2.0 * peak_linear_gain);
        let cos = libm::cos(corner_radians);
        let a0 = 1.0 + alpha;
        Self::second_order(
            -2.0 * cos / a0,
            (1.0 - alpha) / a0,
            (1.0 - cos) / (2.0 * a0),
            (1.0 - cos) / a0,
            (1.0 - cos) / (2.0 * a0),
        )
    }

    /// Two-pole low-pass with a feedback resonance term.
    pub fn low_pass_2nd_order_simplified(corner_radians: f64, peak_linear_gain: f64) -> Self {
        let g = 2.0 * libm::sin(corner_radians * 0.5);
        let resonance = 1.0 - 1.0 / (2.0 * peak_linear_gain);
        let feedback = resonance + resonance / (1.0 - g);
        let a1 = 2.0 * g + (g - 1.0) * g * feedback - 2.0;
        let a2 = (g - 1.0) * (g - g * feedback - 1.0);
        Self::second_order(a1, a2, g * g, 0.0, 0.0)
    }

    pub fn high_pass_2nd_order_butterworth(corner_radians: f64, peak_linear_gain: f64) -> Self {
        let alpha = libm::sin(corner_radians) / (2.0 * peak_linear_gain);
        let cos = libm::cos(corner_radians);
        let a0 = 1.0 + alpha;
        Self::second_order(
            -2.0 * cos / a0,
            (1.0 - alpha) / a0,
            (1.0 + cos) / (2.0 * a0),
            -(1.0 + cos) / a0,
            (1.0 + cos) / (2.0 * a0),
        )
    }

    /// Peaking EQ around the corner. `bandwidth_scale` widens the bell.
    pub fn peak_2nd_order(corner_radians: f64, peak_linear_gain: f64, bandwidth_scale: f64) -> Self {
        let sqrt_gain = libm::sqrt(peak_linear_gain);
        let bandwidth = bandwidth_scale * corner_radians
            / if sqrt_gain >= 1.0 { sqrt_gain } else { 1.0 / sqrt_gain };
        let alpha = libm::tan(bandwidth * 0.5);
        let a0 = 1.0 + alpha / sqrt_gain;
        let a1 = -2.0 * libm::cos(corner_radians) / a0;
        Self::second_order(
            a1,
            (1.0 - alpha / sqrt_gain) / a0,
            (1.0 + alpha * sqrt_gain) / a0,
            a1,
            (1.0 - alpha * sqrt_gain) / a0,
        )
    }
}

/// Complex response of a filter section at one frequency.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrequencyResponse {
    pub real: f64,
    pub imag: f64,
    denom: f64,
}

impl FrequencyResponse {
    /// Evaluate `H(e^{jω})` at `radians`.
    pub fn analyze(filter: &FilterCoefficients, radians: f64) -> Self {
        let n = filter.order + 1;
        // z^-k evaluated on the unit circle
        let mut z_real = [0.0; 3];
        let mut z_imag = [0.0; 3];
        for k in 0..n {
            z_real[k] = libm::cos(-(k as f64) * radians);
            z_imag[k] = libm::sin(-(k as f64) * radians);
        }
        let (mut num_real, mut num_imag) = (0.0, 0.0);
        let (mut den_real, mut den_imag) = (0.0, 0.0);
        for k in 0..n {
            num_real += filter.b[k] * z_real[k];
            num_imag += filter.b[k] * z_imag[k];
            den_real += filter.a[k] * z_real[k];
            den_imag += filter.a[k] * z_imag[k];
        }
        // num / den
        let denom = den_real * den_real + den_imag * den_imag;
        let real = num_real * den_real + num_imag * den_imag;
        let imag = num_imag * den_real - num_real * den_imag;
        Self { real, imag, denom }
    }

    pub fn magnitude(&self) -> f64 {
        libm::sqrt(self.real * self.real + self.imag * self.imag) / self.denom
    }

    pub fn angle(&self) -> f64 {
        libm::atan2(self.imag, self.real)
    }
}

/// Corner frequency in radians per sample, clamped below Nyquist.
pub fn hz_to_radians(hz: f64, sample_rate: f64) -> f64 {
    (2.0 * PI * hz / sample_rate).min(PI * 0.999_99)
}
