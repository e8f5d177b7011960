//! # Fast Fourier Transform (FFT) Module
//!
//! This module wraps RustFFT behind the packed half-spectrum layout used by the
//! pitch estimator, and builds the windowing and power-spectrum stages around it.
//!
//! ## Packed layout
//! A real array `a` of length `n` holds, after [`RealTransform::forward`]:
//! - `a[0]` = `R[0]` (DC, real only)
//! - `a[1]` = `R[n/2]` (Nyquist, real only)
//! - `a[2k]`, `a[2k + 1]` = `R[k]`, `I[k]` for `k = 1..n/2`
//!
//! where `R[k] = Σ a[j]·cos(2πjk/n)` and `I[k] = Σ a[j]·sin(2πjk/n)`.
//! [`RealTransform::inverse`] is unnormalized: `inverse(forward(x)) = (n/2)·x`.
//! The octave-correction thresholds in [`crate::pitch`] are calibrated against
//! exactly this scaling.
//!
//! ## Features
//! - Plans once, processes with a preallocated scratch buffer (no allocation per frame)
//! - Periodic Hann window pre-scaled to 16-bit full scale
//! - Power spectrum kept in the same packed layout for the inverse transform

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::{Error, Result};

/// Full-scale value of a signed 16-bit sample.
pub const SAMPLE_FULL_SCALE: f64 = 32767.0;

/// Builds a periodic Hann window of `size` points divided by `full_scale`.
///
/// Multiplying raw `i16` sample values by this window both tapers the frame
/// and normalizes it to the [-1, 1] range.
///
/// # Arguments
/// * `size` - Number of coefficients (the transform size)
/// * `full_scale` - Divisor applied to every coefficient
pub fn hann_window(size: usize, full_scale: f64) -> Box<[f64]> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / size as f64;
            (0.5 - 0.5 * phase.cos()) / full_scale
        })
        .collect()
}

/// Squared magnitude of a complex value given as parts.
#[inline]
pub fn power(re: f64, im: f64) -> f64 {
    re * re + im * im
}

/// Power of bin `k` of a packed spectrum.
///
/// For `k = 0` this combines the DC and Nyquist slots, matching how the
/// packed layout stores them side by side. Callers that probe real bins
/// stay within `1..n/2`.
#[inline]
pub fn bin_power(spectrum: &[f64], k: usize) -> f64 {
    power(spectrum[2 * k], spectrum[2 * k + 1])
}

/// Writes the power of every bin of `spectrum` into `out`, keeping the packed
/// layout. DC and Nyquist go to slots 0 and 1, every other bin's power lands
/// in its real slot with a zero imaginary slot.
///
/// # Panics
/// * If the two slices differ in length
pub fn packed_power_spectrum(spectrum: &[f64], out: &mut [f64]) {
    assert_eq!(spectrum.len(), out.len(), "spectrum and output lengths differ");
    out[0] = power(spectrum[0], 0.0);
    out[1] = power(spectrum[1], 0.0);
    for k in 1..spectrum.len() / 2 {
        out[2 * k] = bin_power(spectrum, k);
        out[2 * k + 1] = 0.0;
    }
}

/// Forward/inverse real DFT of a fixed power-of-two length, in place, over
/// the packed half-spectrum layout.
pub struct RealTransform {
    size: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl std::fmt::Debug for RealTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealTransform").field("size", &self.size).finish()
    }
}

impl RealTransform {
    /// Plans both directions for `size` points.
    ///
    /// # Returns
    /// * `Err(Error::InvalidTransformSize)` - If `size` is not a power of two >= 4
    pub fn new(size: usize) -> Result<Self> {
        if size < 4 || !size.is_power_of_two() {
            return Err(Error::InvalidTransformSize(size));
        }

        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        Ok(Self {
            size,
            forward,
            inverse,
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Replaces the real signal in `data` with its packed half-spectrum.
    ///
    /// # Panics
    /// * If `data.len()` differs from the planned size
    pub fn forward(&mut self, data: &mut [f64]) {
        assert_eq!(data.len(), self.size, "transform input has the wrong length");
        let half = self.size / 2;

        for (slot, &sample) in self.buffer.iter_mut().zip(data.iter()) {
            *slot = Complex::new(sample, 0.0);
        }
        self.forward.process_with_scratch(&mut self.buffer, &mut self.scratch);

        // RustFFT uses e^{-iθ}, so its imaginary part is -I[k].
        data[0] = self.buffer[0].re;
        data[1] = self.buffer[half].re;
        for k in 1..half {
            data[2 * k] = self.buffer[k].re;
            data[2 * k + 1] = -self.buffer[k].im;
        }
    }

    /// Replaces the packed half-spectrum in `data` with its unnormalized
    /// inverse transform.
    ///
    /// # Panics
    /// * If `data.len()` differs from the planned size
    pub fn inverse(&mut self, data: &mut [f64]) {
        assert_eq!(data.len(), self.size, "transform input has the wrong length");
        let n = self.size;
        let half = n / 2;

        // Rebuild the Hermitian full spectrum Y[k] = R[k] - i·I[k].
        self.buffer[0] = Complex::new(data[0], 0.0);
        self.buffer[half] = Complex::new(data[1], 0.0);
        for k in 1..half {
            let bin = Complex::new(data[2 * k], -data[2 * k + 1]);
            self.buffer[k] = bin;
            self.buffer[n - k] = bin.conj();
        }
        self.inverse.process_with_scratch(&mut self.buffer, &mut self.scratch);

        // The full inverse counts every interior bin twice; the packed
        // convention halves it.
        for (out, value) in data.iter_mut().zip(self.buffer.iter()) {
            *out = 0.5 * value.re;
        }
    }
}
