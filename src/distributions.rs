//! Initial bunch generation and analytic line-density shapes

use crate::beam::Beam;
use crate::constants::PI;
use crate::error::{BeamError, Result};
use crate::parameters::RfParameters;
use crate::tracker::separatrix;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const MAX_REINSERTION_ROUNDS: usize = 1000;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct BigaussianOptions {
    /// Rms bunch length in s
    pub sigma_dt: f64,
    /// Rms energy spread in eV; matched to the bucket when unset
    pub sigma_de: Option<f64>,
    pub seed: u64,
    /// Redraw particles until all lie inside the separatrix
    pub reinsertion: bool,
}

/// Energy spread matched to `sigma_dt` in a single-harmonic bucket at `turn`
pub fn matched_sigma_de(rf: &RfParameters, turn: usize, sigma_dt: f64) -> f64 {
    let phi_s = rf.phi_s[turn];
    let phi_b = rf.omega_rf[0][turn] * sigma_dt + phi_s;
    let voltage = rf.charge * rf.voltage[0][turn];
    (voltage * rf.energy[turn] * rf.beta[turn] * rf.beta[turn]
        * (phi_b.cos() - phi_s.cos() + (phi_b - phi_s) * phi_s.sin())
        / (PI * rf.harmonic[0][turn] * rf.eta_0[turn]))
        .abs()
        .sqrt()
}

/// Fill `beam` with a Gaussian bunch centred on the synchronous phase of the
/// first RF system at turn 0
pub fn bigaussian(rf: &RfParameters, beam: &mut Beam, options: &BigaussianOptions) -> Result<()> {
    if !(options.sigma_dt > 0.0) {
        return Err(BeamError::InvalidParameter(format!(
            "sigma_dt must be positive, got {}",
            options.sigma_dt
        )));
    }
    let sigma_dt = options.sigma_dt;
    let sigma_de = match options.sigma_de {
        Some(s) if s > 0.0 => s,
        Some(s) => {
            return Err(BeamError::InvalidParameter(format!(
                "sigma_dE must be positive, got {s}"
            )));
        }
        None => matched_sigma_de(rf, 0, sigma_dt),
    };

    let omega_rf = rf.omega_rf[0][0];
    let phase = rf.phi_s[0] - rf.phi_rf[0][0];
    let centre = if rf.eta_0[0] > 0.0 {
        phase / omega_rf
    } else {
        (phase - PI) / omega_rf
    };

    let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
    let draw = |rng: &mut ChaCha8Rng| -> (f64, f64) {
        let r_dt: f64 = rng.sample(StandardNormal);
        let r_de: f64 = rng.sample(StandardNormal);
        (sigma_dt * r_dt + centre, sigma_de * r_de)
    };
    for (dt, de) in beam.dt.iter_mut().zip(beam.de.iter_mut()) {
        (*dt, *de) = draw(&mut rng);
    }

    if options.reinsertion {
        let mut rounds = 0;
        loop {
            let inside = separatrix::is_in_separatrix(rf, 0, &beam.dt, &beam.de);
            let outside: Vec<usize> = (0..inside.len()).filter(|&i| !inside[i]).collect();
            if outside.is_empty() {
                break;
            }
            if rounds == MAX_REINSERTION_ROUNDS {
                warn!(
                    remaining = outside.len(),
                    "bunch does not fit the bucket, keeping particles outside the separatrix"
                );
                break;
            }
            for i in outside {
                (beam.dt[i], beam.de[i]) = draw(&mut rng);
            }
            rounds += 1;
        }
    }
    debug!(sigma_dt, sigma_de, centre, n = beam.len(), "bigaussian bunch generated");
    Ok(())
}

/// Analytic bunch shapes, parametrised as in the matched-distribution
/// literature
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum DistributionShape {
    Binomial { exponent: f64 },
    Waterbag,
    ParabolicAmplitude,
    ParabolicLine,
    Gaussian,
}

impl DistributionShape {
    fn exponent(&self) -> f64 {
        match self {
            DistributionShape::Binomial { exponent } => *exponent,
            DistributionShape::Waterbag => 0.0,
            DistributionShape::ParabolicAmplitude => 1.0,
            DistributionShape::ParabolicLine => 0.5,
            DistributionShape::Gaussian => f64::NAN,
        }
    }

    /// Phase-space density as a function of action, zero beyond `length`
    pub fn density(&self, action: &[f64], length: f64) -> Vec<f64> {
        action
            .iter()
            .map(|&j| match self {
                DistributionShape::Gaussian => (-2.0 * j / length).exp(),
                _ if j > length => 0.0,
                DistributionShape::Waterbag => 1.0,
                _ => (1.0 - j / length).powf(self.exponent()),
            })
            .collect()
    }

    /// Line density of a bunch of full length `bunch_length` centred on
    /// `position`. For the Gaussian shape `bunch_length` is four sigma.
    pub fn line_density(&self, time: &[f64], bunch_length: f64, position: f64) -> Vec<f64> {
        let half = bunch_length / 2.0;
        time.iter()
            .map(|&t| {
                let x = t - position;
                match self {
                    DistributionShape::Gaussian => {
                        let sigma = bunch_length / 4.0;
                        (-x * x / (2.0 * sigma * sigma)).exp()
                    }
                    _ if x.abs() > half => 0.0,
                    _ => (1.0 - (x / half).powi(2)).powf(self.exponent() + 0.5),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::{AcceleratingSystems, Particle, RfSystem, RingParameters};

    fn lhc_rf() -> RfParameters {
        let ring = RingParameters::constant_momentum(
            10,
            26_658.883,
            vec![1.0 / 55.759_505_f64.powi(2)],
            450e9,
            Particle::Proton,
        )
        .unwrap();
        RfParameters::new(&ring, 0, &[RfSystem::constant(35_640.0, 6e6, 0.0)], AcceleratingSystems::AsSingle)
            .unwrap()
    }

    fn options(seed: u64) -> BigaussianOptions {
        BigaussianOptions {
            sigma_dt: 0.25e-9,
            sigma_de: None,
            seed,
            reinsertion: false,
        }
    }

    #[test]
    fn test_bunch_centred_on_bucket() {
        let rf = lhc_rf();
        let mut beam = Beam::new(20_000, 1e11).unwrap();
        bigaussian(&rf, &mut beam, &options(7)).unwrap();
        let stats = beam.statistics();
        let centre = PI / rf.omega_rf[0][0];
        assert!((stats.mean_dt - centre).abs() < 0.05 * 0.25e-9);
        assert!((stats.sigma_dt / 0.25e-9 - 1.0).abs() < 0.03);
        let matched = matched_sigma_de(&rf, 0, 0.25e-9);
        assert!((stats.sigma_de / matched - 1.0).abs() < 0.03);
    }

    #[test]
    fn test_same_seed_same_bunch() {
        let rf = lhc_rf();
        let mut a = Beam::new(100, 1e11).unwrap();
        let mut b = Beam::new(100, 1e11).unwrap();
        bigaussian(&rf, &mut a, &options(42)).unwrap();
        bigaussian(&rf, &mut b, &options(42)).unwrap();
        assert_eq!(a.dt, b.dt);
        assert_eq!(a.de, b.de);
        bigaussian(&rf, &mut b, &options(43)).unwrap();
        assert_ne!(a.dt, b.dt);
    }

    #[test]
    fn test_reinsertion_keeps_bunch_inside() {
        let rf = lhc_rf();
        let mut beam = Beam::new(2000, 1e11).unwrap();
        let wide = BigaussianOptions {
            sigma_dt: 0.6e-9,
            reinsertion: true,
            ..options(3)
        };
        bigaussian(&rf, &mut beam, &wide).unwrap();
        let inside = separatrix::is_in_separatrix(&rf, 0, &beam.dt, &beam.de);
        assert!(inside.iter().all(|i| *i));
    }

    #[test]
    fn test_invalid_sigma_rejected() {
        let rf = lhc_rf();
        let mut beam = Beam::new(10, 1e11).unwrap();
        let bad = BigaussianOptions {
            sigma_de: Some(-1.0),
            ..options(1)
        };
        assert!(bigaussian(&rf, &mut beam, &bad).is_err());
    }

    #[test]
    fn test_shapes() {
        let time = [-2.0, -1.0, 0.0, 0.5, 1.0, 3.0];
        let parabolic = DistributionShape::ParabolicAmplitude.line_density(&time, 2.0, 0.0);
        assert_eq!(parabolic[0], 0.0);
        assert_eq!(parabolic[2], 1.0);
        assert!((parabolic[3] - 0.75_f64.powf(1.5)).abs() < 1e-12);
        assert_eq!(parabolic[5], 0.0);

        let waterbag = DistributionShape::Waterbag.density(&[0.0, 0.5, 2.0], 1.0);
        assert_eq!(waterbag, vec![1.0, 1.0, 0.0]);
        let gaussian = DistributionShape::Gaussian.density(&[0.0, 0.5], 1.0);
        assert!((gaussian[1] - (-1.0_f64).exp()).abs() < 1e-15);
        let binomial = DistributionShape::Binomial { exponent: 2.0 }.density(&[0.5], 1.0);
        assert!((binomial[0] - 0.25).abs() < 1e-15);
    }
}
