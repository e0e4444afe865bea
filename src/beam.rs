//! Macroparticle ensemble: longitudinal coordinates and loss bookkeeping

use crate::constants::PI;
use crate::error::{BeamError, Result};
use crate::parameters::RfParameters;
use crate::tracker::separatrix;
use rayon::prelude::*;
use tracing::debug;

/// Alive-only moments of the ensemble. NaN when no particle is alive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BeamStatistics {
    pub mean_dt: f64,
    pub mean_de: f64,
    pub sigma_dt: f64,
    pub sigma_de: f64,
    /// Longitudinal rms emittance, `pi * sigma_dE * sigma_dt` in eVs
    pub epsn_rms_l: f64,
    pub n_alive: usize,
    pub n_lost: usize,
}

/// Per-macroparticle arrays plus intensity scaling.
///
/// `dt`, `de` and `id` always share one length. A macroparticle is alive while
/// its `id` is nonzero; ids start at 1.
#[derive(Clone, Debug)]
pub struct Beam {
    /// Arrival time relative to the synchronous particle, in s
    pub dt: Vec<f64>,
    /// Energy offset relative to the synchronous particle, in eV
    pub de: Vec<f64>,
    pub id: Vec<usize>,
    pub intensity: f64,
    n_macroparticles: usize,
    ratio: f64,
}

impl Beam {
    /// Ensemble of `n_macroparticles` at the origin of phase space
    pub fn new(n_macroparticles: usize, intensity: f64) -> Result<Self> {
        Self::from_coordinates(
            vec![0.0; n_macroparticles],
            vec![0.0; n_macroparticles],
            intensity,
        )
    }

    pub fn from_coordinates(dt: Vec<f64>, de: Vec<f64>, intensity: f64) -> Result<Self> {
        if dt.is_empty() {
            return Err(BeamError::InvalidParameter(
                "a beam needs at least one macroparticle".into(),
            ));
        }
        if dt.len() != de.len() {
            return Err(BeamError::InvalidParameter(format!(
                "dt has {} entries but dE has {}",
                dt.len(),
                de.len()
            )));
        }
        if !(intensity > 0.0) {
            return Err(BeamError::InvalidParameter(format!(
                "intensity must be positive, got {intensity}"
            )));
        }
        let n = dt.len();
        Ok(Self {
            dt,
            de,
            id: (1..=n).collect(),
            intensity,
            n_macroparticles: n,
            ratio: intensity / n as f64,
        })
    }

    /// Number of macroparticles the beam was created with
    pub fn n_macroparticles(&self) -> usize {
        self.n_macroparticles
    }

    /// Real particles represented by one macroparticle.
    ///
    /// Fixed at construction: erased macroparticles do not change what the
    /// survivors stand for.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Current array length, alive or not
    pub fn len(&self) -> usize {
        self.dt.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dt.is_empty()
    }

    pub fn is_alive(&self, index: usize) -> bool {
        self.id[index] != 0
    }

    pub fn n_alive(&self) -> usize {
        self.id.iter().filter(|&&id| id != 0).count()
    }

    /// Macroparticles lost so far, marked or erased
    pub fn n_lost(&self) -> usize {
        self.n_macroparticles - self.n_alive()
    }

    pub fn statistics(&self) -> BeamStatistics {
        let n_alive = self.n_alive();
        let n_lost = self.n_macroparticles - n_alive;
        if n_alive == 0 {
            return BeamStatistics {
                mean_dt: f64::NAN,
                mean_de: f64::NAN,
                sigma_dt: f64::NAN,
                sigma_de: f64::NAN,
                epsn_rms_l: f64::NAN,
                n_alive,
                n_lost,
            };
        }

        let alive = || {
            self.dt
                .iter()
                .zip(&self.de)
                .zip(&self.id)
                .filter(|(_, id)| **id != 0)
                .map(|((dt, de), _)| (*dt, *de))
        };
        let n = n_alive as f64;
        let (sum_dt, sum_de) = alive().fold((0.0, 0.0), |(a, b), (dt, de)| (a + dt, b + de));
        let (mean_dt, mean_de) = (sum_dt / n, sum_de / n);
        let (var_dt, var_de) = alive().fold((0.0, 0.0), |(a, b), (dt, de)| {
            (a + (dt - mean_dt).powi(2), b + (de - mean_de).powi(2))
        });
        let sigma_dt = (var_dt / n).sqrt();
        let sigma_de = (var_de / n).sqrt();

        BeamStatistics {
            mean_dt,
            mean_de,
            sigma_dt,
            sigma_de,
            epsn_rms_l: PI * sigma_de * sigma_dt,
            n_alive,
            n_lost,
        }
    }

    /// Mark particles whose `dt` is outside `[dt_min, dt_max]` as lost.
    /// Returns how many were newly lost.
    pub fn losses_longitudinal_cut(&mut self, dt_min: f64, dt_max: f64) -> usize {
        let lost = mark_where(&mut self.id, &self.dt, |dt| dt < dt_min || dt > dt_max);
        debug!(lost, dt_min, dt_max, "longitudinal cut");
        lost
    }

    /// Mark particles whose `dE` is outside `[de_min, de_max]` as lost
    pub fn losses_energy_cut(&mut self, de_min: f64, de_max: f64) -> usize {
        let lost = mark_where(&mut self.id, &self.de, |de| de < de_min || de > de_max);
        debug!(lost, de_min, de_max, "energy cut");
        lost
    }

    /// Mark particles outside the separatrix of the first RF system at `turn`
    pub fn losses_separatrix(&mut self, rf: &RfParameters, turn: usize) -> usize {
        let inside = separatrix::is_in_separatrix(rf, turn, &self.dt, &self.de);
        let mut lost = 0;
        for (id, inside) in self.id.iter_mut().zip(inside) {
            if *id != 0 && !inside {
                *id = 0;
                lost += 1;
            }
        }
        debug!(lost, turn, "separatrix cut");
        lost
    }

    /// Physically drop every macroparticle for which `remove(dt, dE)` holds
    pub fn erase_where(&mut self, remove: impl Fn(f64, f64) -> bool) -> usize {
        let before = self.len();
        let keep: Vec<bool> = self
            .dt
            .iter()
            .zip(&self.de)
            .map(|(&dt, &de)| !remove(dt, de))
            .collect();
        let mut flags = keep.iter();
        self.dt.retain(|_| *flags.next().unwrap_or(&true));
        let mut flags = keep.iter();
        self.de.retain(|_| *flags.next().unwrap_or(&true));
        let mut flags = keep.iter();
        self.id.retain(|_| *flags.next().unwrap_or(&true));
        before - self.len()
    }

    /// Reorder all arrays by increasing `dt`
    pub fn sort_by_dt(&mut self) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| self.dt[a].total_cmp(&self.dt[b]));
        self.dt = order.iter().map(|&i| self.dt[i]).collect();
        self.de = order.iter().map(|&i| self.de[i]).collect();
        self.id = order.iter().map(|&i| self.id[i]).collect();
    }
}

fn mark_where(id: &mut [usize], values: &[f64], lost: impl Fn(f64) -> bool + Sync) -> usize {
    id.par_iter_mut()
        .zip(values.par_iter())
        .map(|(id, &v)| {
            if *id != 0 && lost(v) {
                *id = 0;
                1
            } else {
                0
            }
        })
        .sum()
}
