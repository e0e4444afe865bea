//! Real-input FFT helpers built on `realfft`.
//!
//! Each component that transforms owns an [`FftContext`]; the planner inside
//! caches plans per length, so repeated calls with the same size reuse them.

use crate::error::Result;
use realfft::RealFftPlanner;
use realfft::num_complex::Complex64;

pub struct FftContext {
    planner: RealFftPlanner<f64>,
}

impl std::fmt::Debug for FftContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftContext").finish_non_exhaustive()
    }
}

impl Default for FftContext {
    fn default() -> Self {
        Self::new()
    }
}

impl FftContext {
    pub fn new() -> Self {
        Self {
            planner: RealFftPlanner::new(),
        }
    }

    /// Forward transform of `input` zero padded or truncated to `n` samples.
    /// Returns `n / 2 + 1` complex bins.
    pub fn rfft(&mut self, input: &[f64], n: usize) -> Result<Vec<Complex64>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let plan = self.planner.plan_fft_forward(n);
        let mut buffer = plan.make_input_vec();
        let len = input.len().min(n);
        buffer[..len].copy_from_slice(&input[..len]);
        let mut spectrum = plan.make_output_vec();
        plan.process(&mut buffer, &mut spectrum)?;
        Ok(spectrum)
    }

    /// Normalised inverse transform producing `n` real samples.
    ///
    /// The spectrum is resized to `n / 2 + 1` bins; the imaginary parts of the
    /// DC bin and (for even `n`) the Nyquist bin are dropped since a real
    /// signal cannot carry them.
    pub fn irfft(&mut self, spectrum: &[Complex64], n: usize) -> Result<Vec<f64>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let plan = self.planner.plan_fft_inverse(n);
        let mut buffer = plan.make_input_vec();
        let len = spectrum.len().min(buffer.len());
        buffer[..len].copy_from_slice(&spectrum[..len]);
        buffer[0].im = 0.0;
        if n % 2 == 0 {
            let last = buffer.len() - 1;
            buffer[last].im = 0.0;
        }
        let mut out = plan.make_output_vec();
        plan.process(&mut buffer, &mut out)?;
        let scale = 1.0 / n as f64;
        out.iter_mut().for_each(|v| *v *= scale);
        Ok(out)
    }

    /// Linear convolution of two real signals through zero-padded FFTs of
    /// length `n`, which must be at least `a.len() + b.len() - 1`
    pub fn convolve(&mut self, a: &[f64], b: &[f64], n: usize) -> Result<Vec<f64>> {
        let fa = self.rfft(a, n)?;
        let fb = self.rfft(b, n)?;
        let product: Vec<Complex64> = fa.iter().zip(&fb).map(|(x, y)| x * y).collect();
        let mut out = self.irfft(&product, n)?;
        out.truncate((a.len() + b.len()).saturating_sub(1));
        Ok(out)
    }
}

/// Sample frequencies of a length-`n` real FFT with sample spacing `d`
pub fn rfftfreq(n: usize, d: f64) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let scale = 1.0 / (n as f64 * d);
    (0..=n / 2).map(|k| k as f64 * scale).collect()
}
