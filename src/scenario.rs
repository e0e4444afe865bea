//! Builds the components of a run from a [`SimulationConfig`] and drives the
//! turn loop: induced voltage, then RF kick and drift, then a new histogram.

use crate::beam::{Beam, BeamStatistics};
use crate::config::{ImpedanceDomain, SimulationConfig};
use crate::distributions::{BigaussianOptions, bigaussian};
use crate::error::Result;
use crate::impedance::{
    ImpedanceSource, InducedVoltage, InducedVoltageFreq, InducedVoltageModel, InducedVoltageTime, Resonators,
    TotalInducedVoltage,
};
use crate::parameters::{RfParameters, RingParameters};
use crate::profile::Profile;
use crate::tracker::RingAndRfSection;
use tracing::{debug, info};

/// Bunch state at the end of a run
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunSummary {
    pub turns: usize,
    pub statistics: BeamStatistics,
    pub bunch_length_rms: f64,
    pub bunch_position_rms: f64,
}

#[derive(Debug)]
pub struct Simulation {
    pub ring: RingParameters,
    pub beam: Beam,
    pub profile: Profile,
    pub tracker: RingAndRfSection,
    pub induced: Option<TotalInducedVoltage>,
    n_turns: usize,
    report_every: usize,
}

impl Simulation {
    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        let n_turns = config.run.n_turns;
        let ring_config = &config.ring;
        let ring = match ring_config.momentum_end {
            Some(end) => RingParameters::linear_ramp(
                n_turns,
                ring_config.circumference,
                ring_config.alpha.clone(),
                ring_config.momentum,
                end,
                ring_config.particle,
            )?,
            None => RingParameters::constant_momentum(
                n_turns,
                ring_config.circumference,
                ring_config.alpha.clone(),
                ring_config.momentum,
                ring_config.particle,
            )?,
        };
        let rf = RfParameters::new(&ring, 0, &config.rf.systems, config.rf.accelerating)?;

        let mut beam = Beam::new(config.beam.n_macroparticles, config.beam.intensity)?;
        let bunch = BigaussianOptions {
            sigma_dt: config.beam.sigma_dt,
            sigma_de: config.beam.sigma_de,
            seed: config.beam.seed,
            reinsertion: config.beam.reinsertion,
        };
        bigaussian(&rf, &mut beam, &bunch)?;

        let mut profile = Profile::with_rf(config.profile, &beam, &rf, 0)?;
        profile.track(&beam);

        let induced = Self::build_impedance(config, &ring, &profile)?;
        let tracker = RingAndRfSection::new(rf, config.tracking.clone())?;
        info!(
            n_turns,
            n_macroparticles = beam.len(),
            n_slices = profile.n_slices,
            solver = %tracker.solver(),
            collective = induced.is_some(),
            "simulation ready"
        );
        Ok(Self {
            ring,
            beam,
            profile,
            tracker,
            induced,
            n_turns,
            report_every: config.run.report_every,
        })
    }

    fn build_impedance(
        config: &SimulationConfig,
        ring: &RingParameters,
        profile: &Profile,
    ) -> Result<Option<TotalInducedVoltage>> {
        let resonators = &config.impedance.resonators;
        if resonators.is_empty() {
            return Ok(None);
        }
        let source: ImpedanceSource = Resonators::new(
            resonators.iter().map(|r| r.r_s).collect(),
            resonators.iter().map(|r| r.frequency).collect(),
            resonators.iter().map(|r| r.q).collect(),
        )?
        .into();
        let engine: InducedVoltage = match config.impedance.domain {
            ImpedanceDomain::Time => {
                InducedVoltageTime::new(ring, profile, vec![source], config.impedance.method)?.into()
            }
            ImpedanceDomain::Frequency => {
                InducedVoltageFreq::new(ring, profile, vec![source], config.impedance.frequency)?.into()
            }
        };
        Ok(Some(TotalInducedVoltage::new(ring, profile, vec![engine])))
    }

    pub fn turn(&self) -> usize {
        self.tracker.counter()
    }

    /// Advance one turn
    pub fn step(&mut self) -> Result<()> {
        if let Some(induced) = self.induced.as_mut() {
            induced.set_turn(self.tracker.counter());
        }
        if self.tracker.options().rf_kick_interp {
            if let Some(induced) = self.induced.as_mut() {
                induced.induced_voltage_generation(&self.beam, &self.profile, 0)?;
            }
            let induced = self.induced.as_ref().map(|v| v as &dyn InducedVoltageModel);
            self.tracker.track_interpolated(&mut self.beam, &self.profile, induced)?;
        } else {
            if let Some(induced) = self.induced.as_mut() {
                induced.track(&mut self.beam, &self.profile)?;
            }
            self.tracker.track(&mut self.beam)?;
        }
        if self.profile.options().track_cuts {
            self.profile.track_cuts(&self.beam);
        }
        self.profile.track(&self.beam);
        Ok(())
    }

    /// Track every remaining turn
    pub fn run(&mut self) -> Result<RunSummary> {
        while self.turn() < self.n_turns {
            self.step()?;
            let turn = self.turn();
            if self.report_every > 0 && turn % self.report_every == 0 {
                self.report(turn);
            } else {
                debug!(turn, "turn complete");
            }
        }
        self.profile.rms();
        Ok(RunSummary {
            turns: self.turn(),
            statistics: self.beam.statistics(),
            bunch_length_rms: self.profile.bl_rms,
            bunch_position_rms: self.profile.bp_rms,
        })
    }

    fn report(&mut self, turn: usize) {
        self.profile.rms();
        let stats = self.beam.statistics();
        info!(
            turn,
            mean_dt = stats.mean_dt,
            sigma_dt = stats.sigma_dt,
            sigma_de = stats.sigma_de,
            bunch_length = self.profile.bl_rms,
            lost = stats.n_lost,
            "turn report"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResonatorConfig;

    fn small_config() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.run.n_turns = 20;
        config.run.report_every = 10;
        config.beam.n_macroparticles = 2000;
        config.profile.n_slices = 64;
        config
    }

    #[test]
    fn test_run_without_impedance() {
        let mut sim = Simulation::from_config(&small_config()).unwrap();
        assert!(sim.induced.is_none());
        let summary = sim.run().unwrap();
        assert_eq!(summary.turns, 20);
        assert_eq!(summary.statistics.n_alive, 2000);
        assert!(summary.bunch_length_rms > 0.0);
        assert!(sim.step().is_err());
    }

    #[test]
    fn test_run_with_resonator_in_both_domains() {
        for domain in [ImpedanceDomain::Time, ImpedanceDomain::Frequency] {
            let mut config = small_config();
            config.impedance.domain = domain;
            config.impedance.resonators.push(ResonatorConfig {
                r_s: 1e5,
                frequency: 1.2e9,
                q: 5.0,
            });
            let mut sim = Simulation::from_config(&config).unwrap();
            let summary = sim.run().unwrap();
            assert_eq!(summary.turns, 20);
            assert!(summary.statistics.mean_de.is_finite(), "{domain:?}");
        }
    }

    #[test]
    fn test_profile_window_follows_bunch() {
        let centre = |sim: &Simulation| 0.5 * (sim.profile.cut_left + sim.profile.cut_right);
        let mut config = small_config();
        let mut fixed = Simulation::from_config(&config).unwrap();
        config.profile.track_cuts = true;
        let mut following = Simulation::from_config(&config).unwrap();
        let start = centre(&following);

        for sim in [&mut fixed, &mut following] {
            sim.beam.dt.iter_mut().for_each(|t| *t += 0.2e-9);
            sim.step().unwrap();
        }
        assert_eq!(centre(&fixed), start);
        let mean_dt = following.beam.statistics().mean_dt;
        assert!((centre(&following) - mean_dt).abs() < 1e-18, "{} vs {mean_dt}", centre(&following));
    }

    #[test]
    fn test_interpolated_run() {
        let mut config = small_config();
        config.tracking.rf_kick_interp = true;
        config.impedance.resonators.push(ResonatorConfig {
            r_s: 1e5,
            frequency: 1.2e9,
            q: 5.0,
        });
        let mut sim = Simulation::from_config(&config).unwrap();
        let summary = sim.run().unwrap();
        assert_eq!(summary.turns, 20);
    }
}
