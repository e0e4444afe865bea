//! Bunch length and position estimators computed from a line density.
//!
//! All estimators return NaN instead of failing when the histogram cannot
//! support them (empty profile, a half-maximum crossing on the frame edge,
//! a profile that is not peaked).

use crate::constants::CFWHM;
use crate::math::{argmax, gradient, interp, trapezoid};

/// `(bp_rms, bl_rms)`: first moment and four times the rms width of the
/// trapezoid-normalised density
pub fn rms(bin_centers: &[f64], counts: &[f64], bin_width: f64) -> (f64, f64) {
    let norm = trapezoid(counts, bin_width);
    if !(norm > 0.0) {
        return (f64::NAN, f64::NAN);
    }
    let density: Vec<f64> = counts.iter().map(|c| c / norm).collect();
    let first: Vec<f64> = bin_centers.iter().zip(&density).map(|(t, d)| t * d).collect();
    let bp = trapezoid(&first, bin_width);
    let second: Vec<f64> = bin_centers
        .iter()
        .zip(&density)
        .map(|(t, d)| (t - bp) * (t - bp) * d)
        .collect();
    let bl = 4.0 * trapezoid(&second, bin_width).sqrt();
    (bp, bl)
}

/// `(bp_fwhm, bl_fwhm)` with linear interpolation of the half-height
/// crossings; `shift` lifts the baseline the half height is measured from
pub fn fwhm(bin_centers: &[f64], counts: &[f64], bin_width: f64, shift: f64) -> (f64, f64) {
    let n = counts.len();
    let Some(max_i) = argmax(counts) else {
        return (f64::NAN, f64::NAN);
    };
    let half = shift + 0.5 * (counts[max_i] - shift);
    let Some((first, last)) = half_crossings(counts, half) else {
        return (f64::NAN, f64::NAN);
    };
    if first == 0 || last == n - 1 {
        return (f64::NAN, f64::NAN);
    }

    let t1 = bin_centers[first]
        - (counts[first] - half) / (counts[first] - counts[first - 1]) * bin_width;
    let t2 = bin_centers[last]
        + (counts[last] - half) / (counts[last] - counts[last + 1]) * bin_width;
    ((t1 + t2) / 2.0, 4.0 * (t2 - t1) / CFWHM)
}

/// FWHM-based bunch length without interpolation, for quick monitoring
pub fn fast_fwhm(bin_centers: &[f64], counts: &[f64]) -> f64 {
    let Some(max_i) = argmax(counts) else {
        return f64::NAN;
    };
    if !(counts[max_i] > 0.0) {
        return f64::NAN;
    }
    match half_crossings(counts, 0.5 * counts[max_i]) {
        Some((first, last)) => CFWHM * (bin_centers[last] - bin_centers[first]),
        None => f64::NAN,
    }
}

/// First and last index whose value reaches `level`
fn half_crossings(counts: &[f64], level: f64) -> Option<(usize, usize)> {
    let first = counts.iter().position(|&c| c >= level)?;
    let last = counts.iter().rposition(|&c| c >= level)?;
    Some((first, last))
}

/// Parameters of `amplitude * exp(-(t - center)^2 / (2 sigma^2))`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GaussianParameters {
    pub amplitude: f64,
    pub center: f64,
    pub sigma: f64,
}

/// Least-squares Gaussian fit on the logarithm of the populated bins
/// (Caruana's method with Guo's `y^2` weights). `None` when fewer than
/// three bins are populated or the log-profile does not open downwards.
pub fn fit_gaussian(bin_centers: &[f64], counts: &[f64], bin_width: f64) -> Option<GaussianParameters> {
    let peak = argmax(counts)?;
    let reference = bin_centers[peak];

    // sums of w x^k for k = 0..4 and w x^k ln y for k = 0..2, with x in bins
    let mut s = [0.0; 5];
    let mut r = [0.0; 3];
    let mut populated = 0;
    for (&t, &y) in bin_centers.iter().zip(counts) {
        if !(y > 0.0) {
            continue;
        }
        populated += 1;
        let x = (t - reference) / bin_width;
        let w = y * y;
        let z = y.ln();
        let mut xk = 1.0;
        for (k, sk) in s.iter_mut().enumerate() {
            *sk += w * xk;
            if k < 3 {
                r[k] += w * xk * z;
            }
            xk *= x;
        }
    }
    if populated < 3 {
        return None;
    }

    let matrix = [[s[0], s[1], s[2]], [s[1], s[2], s[3]], [s[2], s[3], s[4]]];
    let [a, b, c] = solve3(matrix, r)?;
    if !(c < 0.0) {
        return None;
    }
    let sigma_bins = (-1.0 / (2.0 * c)).sqrt();
    let center_bins = -b / (2.0 * c);
    Some(GaussianParameters {
        amplitude: (a - b * b / (4.0 * c)).exp(),
        center: reference + center_bins * bin_width,
        sigma: sigma_bins * bin_width,
    })
}

fn solve3(m: [[f64; 3]; 3], rhs: [f64; 3]) -> Option<[f64; 3]> {
    let det = |m: &[[f64; 3]; 3]| {
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    };
    let d = det(&m);
    if d == 0.0 || !d.is_finite() {
        return None;
    }
    let mut out = [0.0; 3];
    for (col, slot) in out.iter_mut().enumerate() {
        let mut replaced = m;
        for row in 0..3 {
            replaced[row][col] = rhs[row];
        }
        *slot = det(&replaced) / d;
    }
    Some(out)
}

/// Differentiation schemes for the line density
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DerivativeMode {
    /// Central differences, one-sided at the ends
    Gradient,
    /// Forward differences interpolated back onto the bin centres
    Diff,
    /// Derivative-of-Gaussian filter (sigma of one bin, periodic boundary)
    Filter1d,
}

pub fn derivative(counts: &[f64], bin_centers: &[f64], bin_width: f64, mode: DerivativeMode) -> Vec<f64> {
    match mode {
        DerivativeMode::Gradient => gradient(counts, bin_width),
        DerivativeMode::Diff => {
            if counts.len() < 2 {
                return vec![0.0; counts.len()];
            }
            let diffs: Vec<f64> = counts.windows(2).map(|w| (w[1] - w[0]) / bin_width).collect();
            let mid: Vec<f64> = bin_centers[..bin_centers.len() - 1]
                .iter()
                .map(|c| c + 0.5 * bin_width)
                .collect();
            let first = diffs[0];
            let last = diffs[diffs.len() - 1];
            interp(bin_centers, &mid, &diffs, first, last)
        }
        DerivativeMode::Filter1d => gaussian_derivative_filter(counts)
            .into_iter()
            .map(|d| d / bin_width)
            .collect(),
    }
}

/// First-order Gaussian derivative filter with unit sigma, truncated at four
/// sigma, wrapping around the array ends
fn gaussian_derivative_filter(values: &[f64]) -> Vec<f64> {
    const RADIUS: i64 = 4;
    let n = values.len() as i64;
    if n == 0 {
        return Vec::new();
    }
    let phi: Vec<f64> = (-RADIUS..=RADIUS).map(|x| (-0.5 * (x * x) as f64).exp()).collect();
    let norm: f64 = phi.iter().sum();
    let kernel: Vec<(i64, f64)> = (-RADIUS..=RADIUS)
        .zip(&phi)
        .map(|(x, p)| (x, -(x as f64) * p / norm))
        .collect();

    (0..n)
        .map(|i| {
            kernel
                .iter()
                .map(|&(x, k)| k * values[(i - x).rem_euclid(n) as usize])
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::linspace;

    fn gaussian_counts(centers: &[f64], amplitude: f64, center: f64, sigma: f64) -> Vec<f64> {
        centers
            .iter()
            .map(|t| amplitude * (-(t - center).powi(2) / (2.0 * sigma * sigma)).exp())
            .collect()
    }

    #[test]
    fn test_rms_of_sampled_gaussian() {
        let centers = linspace(-10.0, 10.0, 201);
        let counts = gaussian_counts(&centers, 100.0, 0.5, 1.5);
        let (bp, bl) = rms(&centers, &counts, 0.1);
        assert!((bp - 0.5).abs() < 1e-6, "bp = {bp}");
        assert!((bl - 6.0).abs() < 1e-4, "bl = {bl}");
    }

    #[test]
    fn test_rms_empty_is_nan() {
        let (bp, bl) = rms(&[0.0, 1.0, 2.0], &[0.0; 3], 1.0);
        assert!(bp.is_nan() && bl.is_nan());
    }

    #[test]
    fn test_fwhm_of_sampled_gaussian() {
        let centers = linspace(-10.0, 10.0, 401);
        let counts = gaussian_counts(&centers, 1000.0, -1.0, 2.0);
        let (bp, bl) = fwhm(&centers, &counts, 0.05, 0.0);
        assert!((bp + 1.0).abs() < 1e-3, "bp = {bp}");
        assert!((bl - 8.0).abs() < 0.01, "bl = {bl}");
    }

    #[test]
    fn test_fwhm_edge_crossing_is_nan() {
        let centers = [0.0, 1.0, 2.0, 3.0];
        let (bp, bl) = fwhm(&centers, &[5.0, 4.0, 1.0, 0.0], 1.0, 0.0);
        assert!(bp.is_nan() && bl.is_nan());
        let (bp, bl) = fwhm(&centers, &[0.0, 1.0, 4.0, 5.0], 1.0, 0.0);
        assert!(bp.is_nan() && bl.is_nan());
    }

    #[test]
    fn test_fast_fwhm_uses_bin_centers() {
        let centers = [0.0, 1.0, 2.0, 3.0, 4.0];
        let width = fast_fwhm(&centers, &[0.0, 3.0, 4.0, 2.0, 0.0]);
        assert!((width - CFWHM * 2.0).abs() < 1e-12);
        assert!(fast_fwhm(&centers, &[0.0; 5]).is_nan());
    }

    #[test]
    fn test_gaussian_fit_recovers_parameters() {
        let centers = linspace(-5e-9, 5e-9, 100);
        let bin_width = centers[1] - centers[0];
        let counts = gaussian_counts(&centers, 250.0, 3e-10, 1.2e-9);
        let fit = fit_gaussian(&centers, &counts, bin_width).unwrap();
        assert!((fit.amplitude - 250.0).abs() < 1e-5);
        assert!((fit.center - 3e-10).abs() < 1e-17);
        assert!((fit.sigma - 1.2e-9).abs() < 1e-17);
    }

    #[test]
    fn test_gaussian_fit_rejects_unpeaked_profile() {
        let centers = [0.0, 1.0, 2.0];
        assert!(fit_gaussian(&centers, &[1.0, 0.0, 0.0], 1.0).is_none());
        assert!(fit_gaussian(&centers, &[2.0, 1.0, 2.0], 1.0).is_none());
    }

    #[test]
    fn test_derivatives_of_a_line() {
        let centers = linspace(0.0, 9.0, 10);
        let counts: Vec<f64> = centers.iter().map(|t| 3.0 * t).collect();
        for mode in [DerivativeMode::Gradient, DerivativeMode::Diff] {
            let d = derivative(&counts, &centers, 1.0, mode);
            assert!(d.iter().all(|v| (v - 3.0).abs() < 1e-12), "{mode:?}: {d:?}");
        }
    }

    #[test]
    fn test_filter1d_slope_in_the_interior() {
        let centers = linspace(0.0, 39.0, 40);
        let counts: Vec<f64> = centers.iter().map(|t| 2.0 * t).collect();
        let d = derivative(&counts, &centers, 0.5, DerivativeMode::Filter1d);
        // away from the wrapped ends the filter sees a straight line
        for v in &d[8..32] {
            assert!((v - 4.0).abs() < 1e-3, "{v}");
        }
    }
}
