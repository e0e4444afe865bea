//! Turn-by-turn longitudinal tracking through RF stations.
//!
//! A [`RingAndRfSection`] applies, once per turn, the RF energy kick of every
//! harmonic of its station followed by the drift to the next station. The
//! optional periodicity mode keeps every particle inside one revolution
//! frame `[0, t_rev)`; the optional interpolated mode samples the RF voltage
//! on the profile grid and applies it together with the induced voltage.

pub mod full_ring;
pub mod periodicity;
pub mod separatrix;
pub mod solver;

pub use full_ring::{FullRingAndRf, MainHarmonic, PotentialWell};
pub use periodicity::{FramePartition, ParticleSelection};
pub use solver::{Solver, SolverRegistry};

use crate::beam::Beam;
use crate::error::{BeamError, Result};
use crate::impedance::{InducedVoltageModel, linear_interp_kick};
use crate::parameters::{RfCorrection, RfHarmonic, RfParameters};
use crate::profile::Profile;
use periodicity::indices_below;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// What happens to particles outside the energy acceptance
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LossMode {
    /// Flag as lost (`id = 0`) and keep in the arrays
    #[default]
    Mark,
    /// Drop from the arrays
    Remove,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct TrackerOptions {
    pub solver: Solver,
    pub periodicity: bool,
    /// Energy acceptance in eV; no cut when unset
    pub de_max: Option<f64>,
    pub loss_mode: LossMode,
    /// Sample the RF voltage on the profile grid instead of per particle
    pub rf_kick_interp: bool,
}

/// Scalars the drift needs for one turn
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DriftParameters {
    pub solver: Solver,
    pub t_rev: f64,
    pub length_ratio: f64,
    pub alpha_order: usize,
    pub eta_0: f64,
    pub eta_1: f64,
    pub eta_2: f64,
    pub beta: f64,
    pub energy: f64,
}

/// `dE += acceleration_kick + sum_j V_j sin(omega_j dt + phi_j)`
pub fn kick_particles(dt: &[f64], de: &mut [f64], harmonics: &[RfHarmonic], acceleration_kick: f64) {
    de.par_iter_mut().zip(dt.par_iter()).for_each(|(e, &t)| {
        let mut kick = 0.0;
        for h in harmonics {
            kick += h.voltage * libm::sin(h.omega * t + h.phi);
        }
        *e += kick + acceleration_kick;
    });
}

/// Advance `dt` over one section
pub fn drift_particles(dt: &mut [f64], de: &[f64], p: &DriftParameters) {
    let period = p.t_rev * p.length_ratio;
    let coeff = 1.0 / (p.beta * p.beta * p.energy);
    match p.solver {
        Solver::Simple => {
            let slope = period * p.eta_0 * coeff;
            dt.par_iter_mut().zip(de.par_iter()).for_each(|(t, &e)| *t += slope * e);
        }
        Solver::Full => {
            let eta_0 = p.eta_0 * coeff;
            let eta_1 = p.eta_1 * coeff * coeff;
            let eta_2 = p.eta_2 * coeff * coeff * coeff;
            let order = p.alpha_order;
            dt.par_iter_mut().zip(de.par_iter()).for_each(|(t, &e)| {
                let mut slip = eta_0 * e;
                if order > 1 {
                    slip += eta_1 * e * e;
                }
                if order > 2 {
                    slip += eta_2 * e * e * e;
                }
                *t += period * (1.0 / (1.0 - slip) - 1.0);
            });
        }
    }
}

/// A particle behind the frame start would sit in no partition set and be
/// kicked by both passes of the periodic turn
fn check_frame_start(beam: &Beam) -> Result<()> {
    match beam
        .dt
        .iter()
        .zip(&beam.id)
        .position(|(t, id)| *id != 0 && *t < 0.0)
    {
        Some(index) => Err(BeamError::NegativeArrivalTime {
            index,
            dt: beam.dt[index],
        }),
        None => Ok(()),
    }
}

/// One RF station and the ring section that follows it
#[derive(Clone, Debug)]
pub struct RingAndRfSection {
    rf: RfParameters,
    options: TrackerOptions,
    correction: RfCorrection,
    counter: usize,
    partition: FramePartition,
}

impl RingAndRfSection {
    pub fn new(rf: RfParameters, mut options: TrackerOptions) -> Result<Self> {
        if options.periodicity && options.rf_kick_interp {
            return Err(BeamError::PeriodicityWithInterpolation);
        }
        if let Some(de_max) = options.de_max {
            if !(de_max > 0.0) {
                return Err(BeamError::InvalidParameter(format!(
                    "energy acceptance must be positive, got {de_max}"
                )));
            }
        }
        if rf.alpha_order > 1 && options.solver == Solver::Simple {
            info!(
                alpha_order = rf.alpha_order,
                "higher-order slip factors requested, switching to the full solver"
            );
            options.solver = Solver::Full;
        }
        debug!(
            section = rf.section_index,
            n_rf = rf.n_rf,
            solver = %options.solver,
            periodicity = options.periodicity,
            "tracker ready"
        );
        Ok(Self {
            rf,
            options,
            correction: RfCorrection::default(),
            counter: 0,
            partition: FramePartition::default(),
        })
    }

    pub fn rf(&self) -> &RfParameters {
        &self.rf
    }

    pub fn options(&self) -> &TrackerOptions {
        &self.options
    }

    pub fn solver(&self) -> Solver {
        self.options.solver
    }

    /// Turns tracked so far
    pub fn counter(&self) -> usize {
        self.counter
    }

    /// Correction applied to every subsequent kick until replaced
    pub fn set_correction(&mut self, correction: RfCorrection) {
        self.correction = correction;
    }

    pub fn correction(&self) -> &RfCorrection {
        &self.correction
    }

    /// Frame partition left by the last periodic turn
    pub fn partition(&self) -> &FramePartition {
        &self.partition
    }

    pub fn acceleration_kick(&self, turn: usize) -> f64 {
        -self.rf.e_increment[turn]
    }

    fn check_turn(&self, turn: usize) -> Result<()> {
        if turn >= self.rf.n_turns {
            return Err(BeamError::TurnOutOfRange {
                turn,
                n_turns: self.rf.n_turns,
            });
        }
        Ok(())
    }

    /// RF kick of `turn` on the selected particles
    pub fn kick(&self, beam: &mut Beam, selection: &ParticleSelection, turn: usize) {
        let harmonics = self.rf.harmonics_at(turn, &self.correction);
        let acceleration = self.acceleration_kick(turn);
        selection.apply(&mut beam.dt, &mut beam.de, |dt, de| {
            kick_particles(dt, de, &harmonics, acceleration)
        });
    }

    /// Drift of the selected particles with the parameters stored at `turn`.
    /// Tracking drifts with `turn + 1`, the end of the turn being tracked.
    pub fn drift(&self, beam: &mut Beam, selection: &ParticleSelection, turn: usize) {
        let params = self.drift_parameters(turn);
        selection.apply(&mut beam.dt, &mut beam.de, |dt, de| drift_particles(dt, de, &params));
    }

    pub fn drift_parameters(&self, turn: usize) -> DriftParameters {
        DriftParameters {
            solver: self.options.solver,
            t_rev: self.rf.t_rev[turn],
            length_ratio: self.rf.length_ratio,
            alpha_order: self.rf.alpha_order,
            eta_0: self.rf.eta_0[turn],
            eta_1: self.rf.eta_1[turn],
            eta_2: self.rf.eta_2[turn],
            beta: self.rf.beta[turn],
            energy: self.rf.energy[turn],
        }
    }

    /// Track one turn
    pub fn track(&mut self, beam: &mut Beam) -> Result<()> {
        let turn = self.counter;
        self.check_turn(turn)?;
        if self.options.rf_kick_interp {
            return Err(BeamError::InvalidParameter(
                "interpolated RF kicks need a profile, use track_interpolated".into(),
            ));
        }
        if self.options.periodicity {
            if turn == 0 {
                check_frame_start(beam)?;
            }
            self.track_periodic(beam, turn);
        } else {
            self.kick(beam, &ParticleSelection::All, turn);
            self.drift(beam, &ParticleSelection::All, turn + 1);
        }
        self.finish_turn(beam);
        Ok(())
    }

    fn track_periodic(&mut self, beam: &mut Beam, turn: usize) {
        let t_rev = self.rf.t_rev[turn + 1];
        let partition = FramePartition::split(&beam.dt, t_rev);
        for &i in &partition.right_outside {
            beam.dt[i] -= t_rev;
        }
        self.kick(beam, &ParticleSelection::All, turn);
        self.drift(beam, &ParticleSelection::All, turn + 1);

        let left_outside = indices_below(&beam.dt, 0.0);
        if !left_outside.is_empty() {
            for &i in &left_outside {
                beam.dt[i] += t_rev;
            }
            let selection = ParticleSelection::Subset(left_outside.clone());
            self.kick(beam, &selection, turn);
            self.drift(beam, &selection, turn + 1);
        }

        let next_t_rev = self.rf.t_rev[(turn + 2).min(self.rf.n_turns)];
        self.partition = FramePartition::split(&beam.dt, next_t_rev);
        debug!(
            turn,
            right_outside = partition.right_outside.len(),
            left_outside = left_outside.len(),
            "periodic frame resynchronised"
        );
        self.partition.left_outside = left_outside;
    }

    /// Track one turn with the RF voltage sampled on the profile grid, plus
    /// the induced voltage when given
    pub fn track_interpolated(
        &mut self,
        beam: &mut Beam,
        profile: &Profile,
        induced: Option<&dyn InducedVoltageModel>,
    ) -> Result<()> {
        if self.options.periodicity {
            return Err(BeamError::PeriodicityWithInterpolation);
        }
        let turn = self.counter;
        self.check_turn(turn)?;

        let mut voltage = self.rf_voltage_calculation(turn, profile);
        if let Some(induced) = induced {
            let charge = induced.charge();
            for (v, w) in voltage.iter_mut().zip(induced.induced_voltage()) {
                *v += charge * w;
            }
        }
        linear_interp_kick(
            &beam.dt,
            &mut beam.de,
            &voltage,
            &profile.bin_centers,
            self.acceleration_kick(turn),
        );
        self.drift(beam, &ParticleSelection::All, turn + 1);
        self.finish_turn(beam);
        Ok(())
    }

    /// Energy gain per bin centre from all RF systems at `turn`, charge
    /// included
    pub fn rf_voltage_calculation(&self, turn: usize, profile: &Profile) -> Vec<f64> {
        let harmonics = self.rf.harmonics_at(turn, &self.correction);
        profile
            .bin_centers
            .iter()
            .map(|&t| {
                harmonics
                    .iter()
                    .map(|h| h.voltage * libm::sin(h.omega * t + h.phi))
                    .sum()
            })
            .collect()
    }

    /// Apply the energy acceptance; returns the number of particles lost
    pub fn horizontal_cut(&self, beam: &mut Beam) -> usize {
        let Some(de_max) = self.options.de_max else {
            return 0;
        };
        match self.options.loss_mode {
            LossMode::Mark => beam.losses_energy_cut(-de_max, de_max),
            LossMode::Remove => beam.erase_where(|_, de| de < -de_max || de > de_max),
        }
    }

    fn finish_turn(&mut self, beam: &mut Beam) {
        let lost = self.horizontal_cut(beam);
        if lost > 0 {
            debug!(turn = self.counter, lost, "energy acceptance cut");
        }
        self.counter += 1;
    }
}
