//! Ring geometry, momentum programme and the derived per-turn quantities

use crate::constants::{self, C, PI};
use crate::error::{BeamError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Particle {
    Proton,
    Electron,
    /// Rest mass in eV and charge in units of the elementary charge
    User { mass: f64, charge: f64 },
}

impl Particle {
    /// Rest mass in eV
    pub fn mass(&self) -> f64 {
        match self {
            Particle::Proton => constants::rest_energy_ev(constants::M_P),
            Particle::Electron => constants::rest_energy_ev(constants::M_E),
            Particle::User { mass, .. } => *mass,
        }
    }

    pub fn charge(&self) -> f64 {
        match self {
            Particle::Proton => 1.0,
            Particle::Electron => -1.0,
            Particle::User { charge, .. } => *charge,
        }
    }
}

/// Per-section, per-turn machine parameters.
///
/// Arrays indexed `[section][turn]` hold `n_turns + 1` values: the value at
/// turn `i` describes the start of turn `i`, so the last entry is the end of
/// the programme.
#[derive(Clone, Debug)]
pub struct RingParameters {
    pub n_turns: usize,
    pub n_sections: usize,
    pub ring_length: Vec<f64>,
    pub ring_circumference: f64,
    pub ring_radius: f64,
    /// Momentum compaction coefficients per section
    pub alpha: Vec<Vec<f64>>,
    /// Number of slip-factor terms used by the drift (1 to 3)
    pub alpha_order: usize,
    pub particle: Particle,
    pub mass: f64,
    pub charge: f64,
    /// Synchronous momentum in eV/c
    pub momentum: Vec<Vec<f64>>,
    pub beta: Vec<Vec<f64>>,
    pub gamma: Vec<Vec<f64>>,
    pub energy: Vec<Vec<f64>>,
    pub kin_energy: Vec<Vec<f64>>,
    pub eta_0: Vec<Vec<f64>>,
    pub eta_1: Vec<Vec<f64>>,
    pub eta_2: Vec<Vec<f64>>,
    pub t_rev: Vec<f64>,
    pub f_rev: Vec<f64>,
    pub omega_rev: Vec<f64>,
    /// Elapsed time at the start of each turn
    pub cycle_time: Vec<f64>,
}

impl RingParameters {
    pub fn new(
        n_turns: usize,
        ring_length: Vec<f64>,
        alpha: Vec<Vec<f64>>,
        alpha_order: usize,
        momentum: Vec<Vec<f64>>,
        particle: Particle,
    ) -> Result<Self> {
        let n_sections = ring_length.len();
        if n_sections == 0 {
            return Err(BeamError::InconsistentRing(
                "at least one ring section is required".into(),
            ));
        }
        if n_turns == 0 {
            return Err(BeamError::InconsistentRing("n_turns must be positive".into()));
        }
        if alpha.len() != n_sections || momentum.len() != n_sections {
            return Err(BeamError::InconsistentRing(format!(
                "{n_sections} section lengths but {} alpha rows and {} momentum rows",
                alpha.len(),
                momentum.len()
            )));
        }
        if let Some(bad) = ring_length.iter().find(|l| !(**l > 0.0)) {
            return Err(BeamError::InconsistentRing(format!(
                "section length must be positive, got {bad}"
            )));
        }
        let available = alpha.iter().map(Vec::len).min().unwrap_or(0);
        if alpha_order == 0 || alpha_order > 3 || alpha_order > available {
            return Err(BeamError::InvalidAlphaOrder {
                order: alpha_order,
                available,
            });
        }
        for (section, row) in momentum.iter().enumerate() {
            if row.len() != n_turns + 1 {
                return Err(BeamError::InconsistentRing(format!(
                    "momentum programme of section {section} has {} entries, expected {}",
                    row.len(),
                    n_turns + 1
                )));
            }
            if let Some(bad) = row.iter().find(|p| !(**p > 0.0)) {
                return Err(BeamError::InconsistentRing(format!(
                    "momentum must be positive, got {bad}"
                )));
            }
        }

        let mass = particle.mass();
        let charge = particle.charge();
        let ring_circumference: f64 = ring_length.iter().sum();
        let ring_radius = ring_circumference / (2.0 * PI);

        let per_section = |f: &dyn Fn(f64) -> f64| -> Vec<Vec<f64>> {
            momentum
                .iter()
                .map(|row| row.iter().map(|&p| f(p)).collect())
                .collect()
        };
        let mass_sq = mass * mass;
        let beta = per_section(&|p| (1.0 / (1.0 + mass_sq / (p * p))).sqrt());
        let gamma = per_section(&|p| (1.0 + p * p / mass_sq).sqrt());
        let energy = per_section(&|p| (mass_sq + p * p).sqrt());
        let kin_energy = per_section(&|p| (mass_sq + p * p).sqrt() - mass);

        let mut t_rev = vec![0.0; n_turns + 1];
        for (length, beta_row) in ring_length.iter().zip(&beta) {
            for (t, b) in t_rev.iter_mut().zip(beta_row) {
                *t += length / (C * b);
            }
        }
        let f_rev: Vec<f64> = t_rev.iter().map(|t| 1.0 / t).collect();
        let omega_rev: Vec<f64> = f_rev.iter().map(|f| 2.0 * PI * f).collect();
        let mut cycle_time = vec![0.0; n_turns];
        for i in 1..n_turns {
            cycle_time[i] = cycle_time[i - 1] + t_rev[i];
        }

        let mut ring = Self {
            n_turns,
            n_sections,
            ring_length,
            ring_circumference,
            ring_radius,
            alpha,
            alpha_order,
            particle,
            mass,
            charge,
            momentum,
            beta,
            gamma,
            energy,
            kin_energy,
            eta_0: Vec::new(),
            eta_1: Vec::new(),
            eta_2: Vec::new(),
            t_rev,
            f_rev,
            omega_rev,
            cycle_time,
        };
        ring.eta_generation();

        debug!(
            n_turns,
            n_sections,
            circumference = ring.ring_circumference,
            t_rev0 = ring.t_rev[0],
            "ring parameters ready"
        );
        Ok(ring)
    }

    /// Single section with a constant momentum over `n_turns`
    pub fn constant_momentum(
        n_turns: usize,
        circumference: f64,
        alpha: Vec<f64>,
        momentum: f64,
        particle: Particle,
    ) -> Result<Self> {
        let alpha_order = alpha.len().clamp(1, 3);
        Self::new(
            n_turns,
            vec![circumference],
            vec![alpha],
            alpha_order,
            vec![vec![momentum; n_turns + 1]],
            particle,
        )
    }

    /// Single section with a momentum ramp, linear from `p_start` to `p_end`
    pub fn linear_ramp(
        n_turns: usize,
        circumference: f64,
        alpha: Vec<f64>,
        p_start: f64,
        p_end: f64,
        particle: Particle,
    ) -> Result<Self> {
        let alpha_order = alpha.len().clamp(1, 3);
        Self::new(
            n_turns,
            vec![circumference],
            vec![alpha],
            alpha_order,
            vec![crate::math::linspace(p_start, p_end, n_turns + 1)],
            particle,
        )
    }

    fn eta_generation(&mut self) {
        let shape: Vec<Vec<f64>> = self.beta.iter().map(|row| vec![0.0; row.len()]).collect();
        self.eta_0 = shape.clone();
        self.eta_1 = shape.clone();
        self.eta_2 = shape;

        for s in 0..self.n_sections {
            let alpha = &self.alpha[s];
            let a0 = alpha[0];
            let a1 = alpha.get(1).copied().unwrap_or(0.0);
            let a2 = alpha.get(2).copied().unwrap_or(0.0);
            for j in 0..=self.n_turns {
                let beta_sq = self.beta[s][j] * self.beta[s][j];
                let gamma_sq = self.gamma[s][j] * self.gamma[s][j];
                let eta0 = a0 - 1.0 / gamma_sq;
                self.eta_0[s][j] = eta0;
                if self.alpha_order > 1 {
                    self.eta_1[s][j] = 3.0 * beta_sq / (2.0 * gamma_sq) + a1 - a0 * eta0;
                }
                if self.alpha_order > 2 {
                    self.eta_2[s][j] = -beta_sq * (5.0 * beta_sq - 1.0) / (2.0 * gamma_sq) + a2
                        - 2.0 * a0 * a1
                        + a1 / gamma_sq
                        + a0 * a0 * eta0
                        - 3.0 * beta_sq * a0 / (2.0 * gamma_sq);
                }
            }
        }
    }

    /// Effective slip factor for a particle with energy offset `de`
    pub fn eta_tracking(&self, section: usize, turn: usize, de: f64) -> f64 {
        let eta0 = self.eta_0[section][turn];
        if self.alpha_order == 1 {
            return eta0;
        }
        let delta = de / (self.beta[section][turn].powi(2) * self.energy[section][turn]);
        let mut eta = eta0 + self.eta_1[section][turn] * delta;
        if self.alpha_order > 2 {
            eta += self.eta_2[section][turn] * delta * delta;
        }
        eta
    }

    pub fn check_turn(&self, turn: usize) -> Result<()> {
        if turn > self.n_turns {
            return Err(BeamError::TurnOutOfRange {
                turn,
                n_turns: self.n_turns,
            });
        }
        Ok(())
    }
}
