//! Integration tests for turn-by-turn tracking: identities, the fixed point
//! of a stationary bucket, periodicity and end-to-end runs

use beamdrift::BeamError;
use beamdrift::beam::Beam;
use beamdrift::config::SimulationConfig;
use beamdrift::scenario::Simulation;
use beamdrift::tracker::separatrix::{is_in_separatrix, separatrix_height};
use beamdrift::tracker::{RingAndRfSection, TrackerOptions};
use beamdrift::test_utils::{gaussian_beam, lhc_rf, lhc_ring};

#[test]
fn test_zero_voltage_and_zero_energy_is_identity() {
    let ring = lhc_ring(20);
    let rf = lhc_rf(&ring, 0.0);
    let mut tracker = RingAndRfSection::new(rf, TrackerOptions::default()).unwrap();
    let dt = vec![0.1e-9, 0.7e-9, 1.9e-9];
    let mut beam = Beam::from_coordinates(dt.clone(), vec![0.0; 3], 1e11).unwrap();
    for _ in 0..20 {
        tracker.track(&mut beam).unwrap();
    }
    assert_eq!(beam.dt, dt);
    assert_eq!(beam.de, vec![0.0; 3]);
    assert!(tracker.track(&mut beam).is_err());
}

#[test]
fn test_bucket_centre_is_a_fixed_point() {
    let ring = lhc_ring(200);
    let rf = lhc_rf(&ring, 6e6);
    let centre = std::f64::consts::PI / rf.omega_rf[0][0];
    let mut tracker = RingAndRfSection::new(rf, TrackerOptions::default()).unwrap();
    let mut beam = Beam::from_coordinates(vec![centre], vec![0.0], 1e11).unwrap();
    for _ in 0..200 {
        tracker.track(&mut beam).unwrap();
    }
    assert!((beam.dt[0] - centre).abs() < 1e-15);
    assert!(beam.de[0].abs() < 1e-3);
}

#[test]
fn test_bunch_stays_in_bucket() {
    let ring = lhc_ring(500);
    let rf = lhc_rf(&ring, 6e6);
    let mut beam = gaussian_beam(&rf, 2000, 0.15e-9, 21);
    let inside_before = is_in_separatrix(&rf, 0, &beam.dt, &beam.de);
    let mut tracker = RingAndRfSection::new(rf, TrackerOptions::default()).unwrap();
    for _ in 0..500 {
        tracker.track(&mut beam).unwrap();
    }
    let inside_after = is_in_separatrix(tracker.rf(), 500, &beam.dt, &beam.de);
    assert_eq!(inside_before, inside_after);

    let centre = std::f64::consts::PI / tracker.rf().omega_rf[0][0];
    let height = separatrix_height(tracker.rf(), 0, centre).unwrap();
    assert!(beam.de.iter().all(|e| e.abs() < height));
}

#[test]
fn test_periodic_turn_kicks_once_per_pass() {
    let ring = lhc_ring(3);
    let rf = lhc_rf(&ring, 6e6);
    let t_rev = rf.t_rev[1];
    let omega = rf.omega_rf[0][0];
    let phi = rf.phi_rf[0][0];
    let slope = t_rev * rf.length_ratio * rf.eta_0[1] / (rf.beta[1] * rf.beta[1] * rf.energy[1]);
    let kick = |t: f64| 6e6 * (omega * t + phi).sin();

    let options = TrackerOptions {
        periodicity: true,
        ..TrackerOptions::default()
    };
    let mut tracker = RingAndRfSection::new(rf, options).unwrap();
    // inside the frame, ahead of the frame, and one that drifts behind zero
    let dt = vec![0.4e-9, t_rev + 0.7e-9, 1e-11];
    let de = vec![0.0, 0.0, -3e8];
    let mut beam = Beam::from_coordinates(dt.clone(), de.clone(), 1e11).unwrap();
    tracker.track(&mut beam).unwrap();

    let inside_de = kick(dt[0]);
    assert!((beam.de[0] - inside_de).abs() < 1e-6 * 6e6);
    assert!((beam.dt[0] - (dt[0] + slope * inside_de)).abs() < 1e-20);

    let shifted = dt[1] - t_rev;
    let right_de = kick(shifted);
    assert!((beam.de[1] - right_de).abs() < 1e-6 * 6e6);
    assert!((beam.dt[1] - (shifted + slope * right_de)).abs() < 1e-20);

    // first pass at the original position, second pass one period later
    let de_first = de[2] + kick(dt[2]);
    let dt_first = dt[2] + slope * de_first;
    assert!(dt_first < 0.0);
    let dt_wrapped = dt_first + t_rev;
    let de_second = de_first + kick(dt_wrapped);
    assert!((beam.de[2] - de_second).abs() < 1e-6 * 6e6);
    assert!((beam.dt[2] - (dt_wrapped + slope * de_second)).abs() < 1e-17);

    assert!(beam.dt.iter().all(|t| *t >= 0.0 && *t < t_rev));
    assert_eq!(tracker.partition().left_outside, vec![2]);
    assert!(tracker.partition().right_outside.is_empty());
}

#[test]
fn test_periodic_tracking_rejects_bunch_behind_frame() {
    let ring = lhc_ring(3);
    let rf = lhc_rf(&ring, 6e6);
    let options = TrackerOptions {
        periodicity: true,
        ..TrackerOptions::default()
    };
    let mut tracker = RingAndRfSection::new(rf, options).unwrap();
    let mut beam = Beam::from_coordinates(vec![1e-9, -0.25e-9], vec![0.0, 0.0], 1e11).unwrap();
    let err = tracker.track(&mut beam).unwrap_err();
    assert!(matches!(err, BeamError::NegativeArrivalTime { index: 1, .. }), "{err}");
    assert_eq!(beam.de, vec![0.0, 0.0]);
}

#[test]
fn test_same_seed_reproduces_run() {
    let mut config = SimulationConfig::default();
    config.run.n_turns = 30;
    config.beam.n_macroparticles = 3000;
    config.profile.n_slices = 64;

    let run = |config: &SimulationConfig| {
        let mut simulation = Simulation::from_config(config).unwrap();
        let summary = simulation.run().unwrap();
        (summary, simulation.beam.dt.clone())
    };
    let (first, dt_first) = run(&config);
    let (second, dt_second) = run(&config);
    assert_eq!(first, second);
    assert_eq!(dt_first, dt_second);

    config.beam.seed += 1;
    let (_, dt_other) = run(&config);
    assert_ne!(dt_first, dt_other);
}
