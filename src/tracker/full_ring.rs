//! Whole-ring tracking through a sequence of RF stations

use super::RingAndRfSection;
use crate::beam::Beam;
use crate::constants::PI;
use crate::error::{BeamError, Result};
use crate::math::{cum_trapezoid, linspace};
use serde::{Deserialize, Serialize};

/// Which RF system sets the period of the potential-well grid
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MainHarmonic {
    #[default]
    LowestFrequency,
    /// Largest voltage, lowest frequency among ties
    HighestVoltage,
    /// An explicit RF angular frequency that must exist at that turn
    Omega(f64),
}

/// Total RF voltage and the potential well it forms over one RF period
#[derive(Clone, Debug, PartialEq)]
pub struct PotentialWell {
    pub time: Vec<f64>,
    pub total_voltage: Vec<f64>,
    /// Shifted so the deepest point is zero
    pub potential: Vec<f64>,
}

#[derive(Clone, Debug)]
pub struct FullRingAndRf {
    pub sections: Vec<RingAndRfSection>,
    pub ring_circumference: f64,
    pub ring_radius: f64,
}

impl FullRingAndRf {
    pub fn new(sections: Vec<RingAndRfSection>) -> Result<Self> {
        if sections.is_empty() {
            return Err(BeamError::InconsistentRing(
                "a full ring needs at least one RF section".into(),
            ));
        }
        let ring_circumference = sections
            .iter()
            .map(|s| s.rf().length_ratio * s.rf().ring_circumference)
            .sum::<f64>();
        Ok(Self {
            sections,
            ring_circumference,
            ring_radius: ring_circumference / (2.0 * PI),
        })
    }

    /// One turn: every section in order
    pub fn track(&mut self, beam: &mut Beam) -> Result<()> {
        for section in &mut self.sections {
            section.track(beam)?;
        }
        Ok(())
    }

    pub fn potential_well_generation(
        &self,
        turn: usize,
        n_points: usize,
        main_harmonic: MainHarmonic,
        dt_margin_percent: f64,
    ) -> Result<PotentialWell> {
        let first = self.sections[0].rf();
        if turn >= first.n_turns {
            return Err(BeamError::TurnOutOfRange {
                turn,
                n_turns: first.n_turns,
            });
        }
        if n_points < 2 {
            return Err(BeamError::InvalidParameter(format!(
                "a potential well needs at least 2 points, got {n_points}"
            )));
        }

        // (voltage, omega, phase) of every system in the ring
        let systems: Vec<(f64, f64, f64)> = self
            .sections
            .iter()
            .flat_map(|s| {
                let rf = s.rf();
                (0..rf.n_rf).map(move |j| (rf.voltage[j][turn], rf.omega_rf[j][turn], rf.phi_rf[j][turn]))
            })
            .collect();

        let main_omega = match main_harmonic {
            MainHarmonic::LowestFrequency => systems.iter().map(|s| s.1).fold(f64::INFINITY, f64::min),
            MainHarmonic::HighestVoltage => {
                let max_voltage = systems.iter().map(|s| s.0).fold(f64::NEG_INFINITY, f64::max);
                systems
                    .iter()
                    .filter(|s| s.0 == max_voltage)
                    .map(|s| s.1)
                    .fold(f64::INFINITY, f64::min)
            }
            MainHarmonic::Omega(omega) => {
                if !systems.iter().any(|s| s.1 == omega) {
                    return Err(BeamError::InvalidParameter(format!(
                        "no RF system runs at omega = {omega} rad/s on turn {turn}"
                    )));
                }
                omega
            }
        };

        let margin = dt_margin_percent * 2.0 * PI / main_omega;
        let time = linspace(-margin / 2.0, 2.0 * PI / main_omega + margin / 2.0, n_points);
        let total_voltage: Vec<f64> = time
            .iter()
            .map(|&t| {
                systems
                    .iter()
                    .map(|&(v, omega, phi)| v * libm::sin(omega * t + phi))
                    .sum()
            })
            .collect();

        let charge = first.charge;
        let eom_factor = first.eta_0[turn].signum() * charge / first.t_rev[turn];
        let synchronous = first.e_increment[turn] / charge.abs();
        let force: Vec<f64> = total_voltage
            .iter()
            .map(|v| eom_factor * (v - synchronous))
            .collect();
        let mut potential: Vec<f64> = cum_trapezoid(&force, time[1] - time[0], 0.0)
            .into_iter()
            .map(|p| -p)
            .collect();
        let min = potential.iter().copied().fold(0.0_f64, f64::min);
        potential.iter_mut().for_each(|p| *p -= min);

        Ok(PotentialWell {
            time,
            total_voltage,
            potential,
        })
    }
}
