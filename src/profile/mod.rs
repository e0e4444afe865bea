//! Beam profile: time-binned line density of the alive macroparticles, its
//! bunch length and position estimators and its spectrum.

pub mod histogram;
pub mod statistics;

use crate::beam::Beam;
use crate::error::{BeamError, Result};
use crate::fft::{FftContext, rfftfreq};
use crate::math::linspace;
use crate::parameters::RfParameters;
use realfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use statistics::{DerivativeMode, GaussianParameters};

/// How the profile window is chosen
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum CutOptions {
    /// Observed range of the alive particles, widened by 5% on each side
    Auto,
    /// `n_sigma` standard deviations wide, centred on the mean `dt`
    Sigma { n_sigma: f64 },
    /// Explicit bounds in seconds
    Seconds { left: f64, right: f64 },
    /// Explicit bounds in RF radians of the first harmonic
    Radians { left: f64, right: f64 },
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FitOption {
    #[default]
    None,
    Gaussian,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistogramMode {
    /// Integer counts per bin
    #[default]
    Counts,
    /// Linear weighting between the two nearest bin centres
    Smooth,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct ProfileOptions {
    pub n_slices: usize,
    pub cuts: CutOptions,
    pub fit: FitOption,
    pub histogram: HistogramMode,
    /// Tiles of the histogram reduction; `None` uses the rayon pool size
    pub n_workers: Option<usize>,
    /// Re-centre the window on the bunch every turn of a run
    pub track_cuts: bool,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            n_slices: 100,
            cuts: CutOptions::Auto,
            fit: FitOption::None,
            histogram: HistogramMode::Counts,
            n_workers: None,
            track_cuts: false,
        }
    }
}

#[derive(Debug)]
pub struct Profile {
    pub n_slices: usize,
    pub cut_left: f64,
    pub cut_right: f64,
    pub edges: Vec<f64>,
    pub bin_centers: Vec<f64>,
    /// Macroparticles per bin (fractional in smooth mode)
    pub n_macroparticles: Vec<f64>,
    pub bl_rms: f64,
    pub bp_rms: f64,
    pub bl_fwhm: f64,
    pub bp_fwhm: f64,
    pub bl_gauss: f64,
    pub bp_gauss: f64,
    /// Initial guess, replaced by the fitted values after each successful fit
    pub fit_parameters: GaussianParameters,
    pub spectrum_freq: Vec<f64>,
    pub spectrum: Vec<Complex64>,
    options: ProfileOptions,
    fft: FftContext,
}

impl Profile {
    /// Profile with the window chosen from the current beam. Radian cuts need
    /// the RF programme; use [`Profile::with_rf`] for those.
    pub fn new(options: ProfileOptions, beam: &Beam) -> Result<Self> {
        Self::build(options, beam, None)
    }

    /// Profile whose radian cuts are converted with the RF frequency of the
    /// first harmonic at `turn`
    pub fn with_rf(options: ProfileOptions, beam: &Beam, rf: &RfParameters, turn: usize) -> Result<Self> {
        Self::build(options, beam, Some((rf, turn)))
    }

    fn build(options: ProfileOptions, beam: &Beam, rf: Option<(&RfParameters, usize)>) -> Result<Self> {
        if options.n_slices < 2 {
            return Err(BeamError::InvalidParameter(format!(
                "a profile needs at least 2 slices, got {}",
                options.n_slices
            )));
        }
        let mut profile = Self {
            n_slices: options.n_slices,
            cut_left: 0.0,
            cut_right: 0.0,
            edges: Vec::new(),
            bin_centers: Vec::new(),
            n_macroparticles: vec![0.0; options.n_slices],
            bl_rms: f64::NAN,
            bp_rms: f64::NAN,
            bl_fwhm: f64::NAN,
            bp_fwhm: f64::NAN,
            bl_gauss: f64::NAN,
            bp_gauss: f64::NAN,
            fit_parameters: GaussianParameters {
                amplitude: 0.0,
                center: 0.0,
                sigma: 0.0,
            },
            spectrum_freq: Vec::new(),
            spectrum: Vec::new(),
            options,
            fft: FftContext::new(),
        };
        profile.set_cuts(beam, rf)?;
        profile.fit_parameters = GaussianParameters {
            amplitude: 0.0,
            center: 0.5 * (profile.cut_left + profile.cut_right),
            sigma: (profile.cut_right - profile.cut_left) / 4.0,
        };
        Ok(profile)
    }

    pub fn options(&self) -> &ProfileOptions {
        &self.options
    }

    pub fn bin_width(&self) -> f64 {
        (self.cut_right - self.cut_left) / self.n_slices as f64
    }

    /// Recompute the window and the bin grid
    pub fn set_cuts(&mut self, beam: &Beam, rf: Option<(&RfParameters, usize)>) -> Result<()> {
        let (left, right) = match self.options.cuts {
            CutOptions::Auto => {
                let (min, max) = alive_dt(beam).fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| {
                    (lo.min(t), hi.max(t))
                });
                let margin = 0.05 * (max - min);
                (min - margin, max + margin)
            }
            CutOptions::Sigma { n_sigma } => {
                let stats = beam.statistics();
                let half = 0.5 * n_sigma * stats.sigma_dt;
                (stats.mean_dt - half, stats.mean_dt + half)
            }
            CutOptions::Seconds { left, right } => (left, right),
            CutOptions::Radians { left, right } => {
                let (rf, turn) = rf.ok_or_else(|| {
                    BeamError::InvalidParameter(
                        "radian cuts need the RF parameters to convert to seconds".into(),
                    )
                })?;
                let omega = rf.omega_rf[0][turn];
                (left / omega, right / omega)
            }
        };

        if !(left.is_finite() && right.is_finite() && left < right) {
            return Err(BeamError::DegenerateRange { left, right });
        }

        self.cut_left = left;
        self.cut_right = right;
        self.edges = linspace(left, right, self.n_slices + 1);
        self.bin_centers = self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();
        debug!(cut_left = left, cut_right = right, n_slices = self.n_slices, "profile cuts set");
        Ok(())
    }

    /// Rebuild the histogram from the beam, then the Gaussian fit if enabled
    pub fn track(&mut self, beam: &Beam) {
        self.n_macroparticles = match self.options.histogram {
            HistogramMode::Counts => {
                let workers = self.options.n_workers.unwrap_or_else(rayon::current_num_threads);
                histogram::histogram(
                    &beam.dt,
                    &beam.id,
                    self.cut_left,
                    self.cut_right,
                    self.n_slices,
                    workers,
                )
            }
            HistogramMode::Smooth => self.slice_constant_space_histogram_smooth(beam),
        };
        if self.options.fit == FitOption::Gaussian {
            self.gaussian_fit();
        }
    }

    /// Fractional histogram with linear weighting between bin centres
    pub fn slice_constant_space_histogram_smooth(&self, beam: &Beam) -> Vec<f64> {
        histogram::smooth_histogram(&beam.dt, &beam.id, &self.bin_centers)
    }

    /// Move the frame so it stays centred on the bunch. The bin width does
    /// not change.
    pub fn track_cuts(&mut self, beam: &Beam) {
        let (sum, n) = alive_dt(beam).fold((0.0, 0usize), |(s, n), t| (s + t, n + 1));
        if n == 0 {
            return;
        }
        let shift = sum / n as f64 - 0.5 * (self.cut_left + self.cut_right);
        self.cut_left += shift;
        self.cut_right += shift;
        self.edges.iter_mut().for_each(|e| *e += shift);
        self.bin_centers.iter_mut().for_each(|c| *c += shift);
    }

    pub fn rms(&mut self) {
        let (bp, bl) = statistics::rms(&self.bin_centers, &self.n_macroparticles, self.bin_width());
        self.bp_rms = bp;
        self.bl_rms = bl;
    }

    pub fn fwhm(&mut self, shift: f64) {
        let (bp, bl) = statistics::fwhm(
            &self.bin_centers,
            &self.n_macroparticles,
            self.bin_width(),
            shift,
        );
        self.bp_fwhm = bp;
        self.bl_fwhm = bl;
    }

    pub fn fast_fwhm(&self) -> f64 {
        statistics::fast_fwhm(&self.bin_centers, &self.n_macroparticles)
    }

    /// Fit a Gaussian to the current histogram. On failure the lengths are
    /// NaN and the previous parameters are kept.
    pub fn gaussian_fit(&mut self) {
        match statistics::fit_gaussian(&self.bin_centers, &self.n_macroparticles, self.bin_width()) {
            Some(fit) => {
                self.fit_parameters = fit;
                self.bl_gauss = 4.0 * fit.sigma;
                self.bp_gauss = fit.center;
            }
            None => {
                self.bl_gauss = f64::NAN;
                self.bp_gauss = f64::NAN;
            }
        }
    }

    /// `(bin_centers, derivative of the line density)`
    pub fn beam_profile_derivative(&self, mode: DerivativeMode) -> (Vec<f64>, Vec<f64>) {
        let derivative = statistics::derivative(
            &self.n_macroparticles,
            &self.bin_centers,
            self.bin_width(),
            mode,
        );
        (self.bin_centers.clone(), derivative)
    }

    /// Frequencies (and unless `only_freq`, the spectrum) of the profile
    /// sampled over `n` points
    pub fn beam_spectrum_generation(&mut self, n: usize, only_freq: bool) -> Result<()> {
        self.spectrum_freq = rfftfreq(n, self.bin_width());
        if !only_freq {
            self.spectrum = self.fft.rfft(&self.n_macroparticles, n)?;
        }
        Ok(())
    }

    /// Sum of the histogram
    pub fn total(&self) -> f64 {
        self.n_macroparticles.iter().sum()
    }
}

fn alive_dt(beam: &Beam) -> impl Iterator<Item = f64> + '_ {
    beam.dt
        .iter()
        .zip(&beam.id)
        .filter(|(_, id)| **id != 0)
        .map(|(t, _)| *t)
}
