//! Fixtures shared by unit tests, integration tests and benches

use crate::beam::Beam;
use crate::distributions::{BigaussianOptions, bigaussian};
use crate::parameters::{AcceleratingSystems, Particle, RfParameters, RfSystem, RingParameters};
use crate::profile::{CutOptions, Profile, ProfileOptions};

/// LHC circumference in m
pub const LHC_CIRCUMFERENCE: f64 = 26_658.883;
/// LHC transition gamma
pub const LHC_GAMMA_T: f64 = 55.759_505;
pub const LHC_HARMONIC: f64 = 35_640.0;

/// LHC at injection momentum with constant energy for `n_turns`
pub fn lhc_ring(n_turns: usize) -> RingParameters {
    RingParameters::constant_momentum(
        n_turns,
        LHC_CIRCUMFERENCE,
        vec![1.0 / LHC_GAMMA_T.powi(2)],
        450e9,
        Particle::Proton,
    )
    .expect("LHC ring parameters are valid")
}

/// Single 400 MHz system at `voltage` volts, stationary bucket
pub fn lhc_rf(ring: &RingParameters, voltage: f64) -> RfParameters {
    RfParameters::new(
        ring,
        0,
        &[RfSystem::constant(LHC_HARMONIC, voltage, 0.0)],
        AcceleratingSystems::AsSingle,
    )
    .expect("LHC RF parameters are valid")
}

/// Matched Gaussian bunch of rms length `sigma_dt`
pub fn gaussian_beam(rf: &RfParameters, n_macroparticles: usize, sigma_dt: f64, seed: u64) -> Beam {
    let mut beam = Beam::new(n_macroparticles, 1e11).expect("positive particle count");
    bigaussian(
        rf,
        &mut beam,
        &BigaussianOptions {
            sigma_dt,
            sigma_de: None,
            seed,
            reinsertion: false,
        },
    )
    .expect("valid bunch options");
    beam
}

/// Profile over one RF bucket, already filled from `beam`
pub fn bucket_profile(beam: &Beam, rf: &RfParameters, n_slices: usize) -> Profile {
    let t_rf = 2.0 * crate::constants::PI / rf.omega_rf[0][0];
    let options = ProfileOptions {
        n_slices,
        cuts: CutOptions::Seconds {
            left: 0.0,
            right: t_rf,
        },
        ..ProfileOptions::default()
    };
    let mut profile = Profile::new(options, beam).expect("valid profile options");
    profile.track(beam);
    profile
}
