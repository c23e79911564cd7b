//! Inverse FFT helpers for building additive wave tables.
//!
//! Spectrum, drumset and harmonics instruments describe their timbre as a
//! set of partial amplitudes. These helpers turn a half spectrum into one
//! period of a real waveform.

use alloc::vec;
use alloc::vec::Vec;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// One period of a real signal of `length` samples whose positive
/// frequency bins are `bins` (bin `k` completes `k` cycles per period).
///
/// Bins at or above `length / 2` are ignored.
pub fn real_wave_from_bins(length: usize, bins: &[Complex<f64>]) -> Vec<f64> {
    if length == 0 {
        return Vec::new();
    }
    let mut buffer = vec![Complex::new(0.0, 0.0); length];
    for (k, &bin) in bins.iter().enumerate().take(length / 2).skip(1) {
        buffer[k] = bin;
        buffer[length - k] = bin.conj();
    }
    if let Some(&dc) = bins.first() {
        buffer[0] = Complex::new(dc.re, 0.0);
    }

    let mut planner = FftPlanner::<f64>::new();
    let inverse = planner.plan_fft_inverse(length);
    inverse.process(&mut buffer);
    buffer.iter().map(|c| c.re).collect()
}

/// Bin with the given magnitude and phase (in cycles).
pub fn polar_bin(amplitude: f64, phase_cycles: f64) -> Complex<f64> {
    let radians = core::f64::consts::TAU * phase_cycles;
    Complex::new(amplitude * libm::cos(radians), amplitude * libm::sin(radians))
}

/// Subtract the mean so the wave integrates to zero over one period.
pub fn remove_dc(wave: &mut [f64]) {
    if wave.is_empty() {
        return;
    }
    let mean = wave.iter().sum::<f64>() / wave.len() as f64;
    for sample in wave.iter_mut() {
        *sample -= mean;
    }
}

/// Scale so the largest magnitude is 1. Silent waves are left alone.
pub fn normalize_peak(wave: &mut [f64]) {
    let peak = wave.iter().fold(0.0f64, |m, &s| m.max(libm::fabs(s)));
    if peak > 0.0 {
        for sample in wave.iter_mut() {
            *sample /= peak;
        }
    }
}
