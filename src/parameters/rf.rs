//! RF programmes of one ring section, with the per-turn lookup tables the
//! tracker reads

use super::ring::RingParameters;
use crate::constants::{C, PI};
use crate::error::{BeamError, Result};
use crate::math::{cum_trapezoid, linspace};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A per-turn programme: either one value for the whole run or one value per
/// turn boundary (`n_turns + 1` entries)
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum RfProgram {
    Constant(f64),
    PerTurn(Vec<f64>),
}

impl RfProgram {
    fn expand(&self, n_turns: usize, what: &str, system: usize) -> Result<Vec<f64>> {
        match self {
            RfProgram::Constant(v) => Ok(vec![*v; n_turns + 1]),
            RfProgram::PerTurn(values) if values.len() == n_turns + 1 => Ok(values.clone()),
            RfProgram::PerTurn(values) => Err(BeamError::InconsistentRfTables(format!(
                "{what} programme of RF system {system} has {} entries, expected {}",
                values.len(),
                n_turns + 1
            ))),
        }
    }
}

impl From<f64> for RfProgram {
    fn from(value: f64) -> Self {
        RfProgram::Constant(value)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RfSystem {
    pub harmonic: RfProgram,
    /// Peak voltage in V
    pub voltage: RfProgram,
    /// Phase offset in rad
    pub phi_rf: RfProgram,
}

impl RfSystem {
    pub fn constant(harmonic: f64, voltage: f64, phi_rf: f64) -> Self {
        Self {
            harmonic: harmonic.into(),
            voltage: voltage.into(),
            phi_rf: phi_rf.into(),
        }
    }
}

/// Which RF systems provide the synchronous energy gain
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AcceleratingSystems {
    /// Only the first system, computed from `asin(dE / qV)`
    #[default]
    AsSingle,
    /// All systems; the synchronous phase is the minimum of the potential well
    All,
    /// Only the first system, phase pinned to the stationary value
    First,
}

/// Additive corrections written by a phase loop or noise feedback.
///
/// `phase` and `omega` are given for the main harmonic and applied to system
/// `j` scaled by `h_j / h_0`. `noise_scale` multiplies the phase-noise table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RfCorrection {
    pub phase: f64,
    pub omega: f64,
    pub noise_scale: f64,
}

impl Default for RfCorrection {
    fn default() -> Self {
        Self {
            phase: 0.0,
            omega: 0.0,
            noise_scale: 1.0,
        }
    }
}

/// Effective parameters of one RF system at one turn
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RfHarmonic {
    /// Charge times voltage, i.e. the energy gain amplitude in eV
    pub voltage: f64,
    pub omega: f64,
    pub phi: f64,
}

#[derive(Clone, Debug)]
pub struct RfParameters {
    pub n_rf: usize,
    pub n_turns: usize,
    pub section_index: usize,
    /// Section length over ring circumference
    pub length_ratio: f64,
    pub ring_circumference: f64,
    pub charge: f64,
    pub alpha_order: usize,

    // section quantities copied from the ring, indexed by turn
    pub beta: Vec<f64>,
    pub energy: Vec<f64>,
    pub eta_0: Vec<f64>,
    pub eta_1: Vec<f64>,
    pub eta_2: Vec<f64>,
    pub t_rev: Vec<f64>,

    pub harmonic: Vec<Vec<f64>>,
    pub voltage: Vec<Vec<f64>>,
    pub phi_rf: Vec<Vec<f64>>,
    pub omega_rf_d: Vec<Vec<f64>>,
    pub omega_rf: Vec<Vec<f64>>,
    pub phi_noise: Option<Vec<Vec<f64>>>,

    /// Synchronous energy gain per turn, `energy[i + 1] - energy[i]`
    pub e_increment: Vec<f64>,
    pub phi_s: Vec<f64>,
    pub qs: Vec<f64>,
    pub omega_s0: Vec<f64>,
    pub t_rf: Vec<f64>,
}

impl RfParameters {
    pub fn new(
        ring: &RingParameters,
        section_index: usize,
        systems: &[RfSystem],
        accelerating: AcceleratingSystems,
    ) -> Result<Self> {
        if section_index >= ring.n_sections {
            return Err(BeamError::InconsistentRfTables(format!(
                "section {section_index} does not exist, ring has {} section(s)",
                ring.n_sections
            )));
        }
        if systems.is_empty() {
            return Err(BeamError::InconsistentRfTables(
                "at least one RF system is required".into(),
            ));
        }

        let n_turns = ring.n_turns;
        let mut harmonic = Vec::with_capacity(systems.len());
        let mut voltage = Vec::with_capacity(systems.len());
        let mut phi_rf = Vec::with_capacity(systems.len());
        for (j, system) in systems.iter().enumerate() {
            let h = system.harmonic.expand(n_turns, "harmonic", j)?;
            if let Some(bad) = h.iter().find(|v| !(**v > 0.0)) {
                return Err(BeamError::InconsistentRfTables(format!(
                    "harmonic of RF system {j} must be positive, got {bad}"
                )));
            }
            harmonic.push(h);
            voltage.push(system.voltage.expand(n_turns, "voltage", j)?);
            phi_rf.push(system.phi_rf.expand(n_turns, "phase", j)?);
        }

        let s = section_index;
        let beta = ring.beta[s].clone();
        let energy = ring.energy[s].clone();
        let omega_rf_d: Vec<Vec<f64>> = harmonic
            .iter()
            .map(|h| {
                h.iter()
                    .zip(&beta)
                    .map(|(h, b)| 2.0 * PI * b * C * h / ring.ring_circumference)
                    .collect()
            })
            .collect();
        let e_increment: Vec<f64> = energy.windows(2).map(|w| w[1] - w[0]).collect();

        let mut rf = Self {
            n_rf: systems.len(),
            n_turns,
            section_index,
            length_ratio: ring.ring_length[s] / ring.ring_circumference,
            ring_circumference: ring.ring_circumference,
            charge: ring.charge,
            alpha_order: ring.alpha_order,
            beta,
            energy,
            eta_0: ring.eta_0[s].clone(),
            eta_1: ring.eta_1[s].clone(),
            eta_2: ring.eta_2[s].clone(),
            t_rev: ring.t_rev.clone(),
            harmonic,
            voltage,
            phi_rf,
            omega_rf: omega_rf_d.clone(),
            omega_rf_d,
            phi_noise: None,
            e_increment,
            phi_s: Vec::new(),
            qs: Vec::new(),
            omega_s0: Vec::new(),
            t_rf: Vec::new(),
        };

        rf.phi_s = rf.calc_phi_s(accelerating);
        rf.qs = (0..=n_turns)
            .map(|i| {
                (rf.harmonic[0][i] * rf.charge * rf.voltage[0][i] * rf.eta_0[i] * rf.phi_s[i].cos()
                    / (2.0 * PI * rf.beta[i] * rf.beta[i] * rf.energy[i]))
                    .abs()
                    .sqrt()
            })
            .collect();
        rf.omega_s0 = rf
            .qs
            .iter()
            .zip(&ring.omega_rev)
            .map(|(q, w)| q * w)
            .collect();
        rf.t_rf = rf.omega_rf[0].iter().map(|w| 2.0 * PI / w).collect();
        Ok(rf)
    }

    /// Replace the design RF angular frequency with an explicit programme
    pub fn with_omega_rf(mut self, omega_rf: Vec<Vec<f64>>) -> Result<Self> {
        self.check_table_shape(&omega_rf, "omega_rf")?;
        self.t_rf = omega_rf[0].iter().map(|w| 2.0 * PI / w).collect();
        self.omega_rf = omega_rf;
        Ok(self)
    }

    /// Attach a per-system, per-turn phase-noise table added to `phi_rf`
    pub fn with_phase_noise(mut self, phi_noise: Vec<Vec<f64>>) -> Result<Self> {
        self.check_table_shape(&phi_noise, "phase noise")?;
        self.phi_noise = Some(phi_noise);
        Ok(self)
    }

    fn check_table_shape(&self, table: &[Vec<f64>], what: &str) -> Result<()> {
        if table.len() != self.n_rf || table.iter().any(|row| row.len() != self.n_turns + 1) {
            return Err(BeamError::InconsistentRfTables(format!(
                "{what} table must have {} rows of {} values",
                self.n_rf,
                self.n_turns + 1
            )));
        }
        Ok(())
    }

    /// Effective amplitude, angular frequency and phase of every RF system at
    /// `turn`, with noise and the correction slot applied
    pub fn harmonics_at(&self, turn: usize, correction: &RfCorrection) -> Vec<RfHarmonic> {
        let h0 = self.harmonic[0][turn];
        (0..self.n_rf)
            .map(|j| {
                let ratio = self.harmonic[j][turn] / h0;
                let noise = self
                    .phi_noise
                    .as_ref()
                    .map_or(0.0, |table| correction.noise_scale * table[j][turn]);
                RfHarmonic {
                    voltage: self.charge * self.voltage[j][turn],
                    omega: self.omega_rf[j][turn] + correction.omega * ratio,
                    phi: self.phi_rf[j][turn] + noise + correction.phase * ratio,
                }
            })
            .collect()
    }

    /// Slip factor seen by a particle with energy offset `de` at `turn`
    pub fn eta_tracking(&self, turn: usize, de: f64) -> f64 {
        let eta0 = self.eta_0[turn];
        if self.alpha_order == 1 {
            return eta0;
        }
        let delta = de / (self.beta[turn] * self.beta[turn] * self.energy[turn]);
        let mut eta = eta0 + self.eta_1[turn] * delta;
        if self.alpha_order > 2 {
            eta += self.eta_2[turn] * delta * delta;
        }
        eta
    }

    /// Synchronous phase per turn.
    ///
    /// Below transition an accelerating bucket sits in (0, pi/2); above
    /// transition in (pi/2, pi). The sign convention follows `phi_rf = 0`
    /// with a sine kick.
    fn calc_phi_s(&self, accelerating: AcceleratingSystems) -> Vec<f64> {
        let n_turns = self.n_turns;
        match accelerating {
            AcceleratingSystems::AsSingle => {
                let mut denergy = self.e_increment.clone();
                denergy.push(self.e_increment.last().copied().unwrap_or(0.0));

                let mut out: Vec<f64> = denergy
                    .iter()
                    .zip(&self.voltage[0])
                    .enumerate()
                    .map(|(i, (de, v))| {
                        let ratio = if *de == 0.0 { 0.0 } else { de / (self.charge * v) };
                        if !(-1.0..=1.0).contains(&ratio) {
                            warn!(
                                turn = i,
                                ratio, "acceleration not possible, momentum step too large for the voltage"
                            );
                        }
                        ratio.clamp(-1.0, 1.0).asin()
                    })
                    .collect();

                for (i, phi) in out.iter_mut().enumerate() {
                    let eta = if i < n_turns {
                        0.5 * (self.eta_0[i] + self.eta_0[i + 1])
                    } else {
                        self.eta_0[n_turns]
                    };
                    *phi = if eta > 0.0 { PI - *phi } else { PI + *phi };
                }
                out
            }
            AcceleratingSystems::All => self.phi_s_from_potential_well(),
            AcceleratingSystems::First => {
                let value = if self.eta_0[0] > 0.0 { PI } else { 0.0 };
                vec![value; n_turns + 1]
            }
        }
    }

    fn phi_s_from_potential_well(&self) -> Vec<f64> {
        const N_POINTS: usize = 1000;
        let n_turns = self.n_turns;
        let phase = linspace(-1.2 * PI, 1.2 * PI, N_POINTS);
        let dphi = phase[1] - phase[0];
        let offset: Vec<f64> = self
            .eta_0
            .iter()
            .map(|&eta| if eta > 0.0 { PI } else { 0.0 })
            .collect();

        let mut out = vec![0.0; n_turns + 1];
        for i in 0..n_turns {
            let h_min = (0..self.n_rf)
                .map(|k| self.harmonic[k][i])
                .fold(f64::INFINITY, f64::min);
            let mut total = vec![0.0; N_POINTS];
            for j in 0..self.n_rf {
                let ratio = self.harmonic[j][i + 1] / h_min;
                for (t, p) in total.iter_mut().zip(&phase) {
                    *t += self.voltage[j][i + 1]
                        * (ratio * (p + offset[i + 1]) + self.phi_rf[j][i + 1]).sin();
                }
            }
            let force: Vec<f64> = total
                .iter()
                .map(|v| v - self.e_increment[i] / self.charge)
                .collect();
            let sign = if offset[i] == 0.0 { 1.0 } else { -1.0 };
            let well = cum_trapezoid(&force, dphi, 0.0);
            let minimum = well
                .iter()
                .map(|w| sign * w)
                .enumerate()
                .fold((0, f64::INFINITY), |best, (k, w)| if w < best.1 { (k, w) } else { best })
                .0;
            out[i + 1] = phase[minimum] + offset[i + 1];
        }
        out[0] = out[1];
        out
    }
}
