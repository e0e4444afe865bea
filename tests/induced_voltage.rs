//! Integration tests for wake fields and the induced-voltage engines on a
//! realistic LHC bunch

use beamdrift::impedance::{
    ConvolutionMethod, FreqOptions, ImpedanceSource, InducedVoltage, InducedVoltageFreq, InducedVoltageModel,
    InducedVoltageTime, Intensity, Resonators, TotalInducedVoltage,
};
use beamdrift::test_utils::{bucket_profile, gaussian_beam, lhc_rf, lhc_ring};

fn broadband() -> Resonators {
    Resonators::new(vec![1e5], vec![1.2e9], vec![5.0]).unwrap()
}

#[test]
fn test_resonator_wake_at_origin() {
    let r_s = 3e5;
    let f_r = 800e6;
    let q = 2.5;
    let resonator = Resonators::new(vec![r_s], vec![f_r], vec![q]).unwrap();
    let alpha = 2.0 * std::f64::consts::PI * f_r / (2.0 * q);
    let wake = resonator.wake_calc(&[0.0]).unwrap();
    assert!((wake[0] / (alpha * r_s) - 1.0).abs() < 1e-12);
}

#[test]
fn test_direct_and_fft_convolution_agree_on_bunch() {
    let ring = lhc_ring(10);
    let rf = lhc_rf(&ring, 6e6);
    let beam = gaussian_beam(&rf, 20_000, 0.25e-9, 4);
    let profile = bucket_profile(&beam, &rf, 200);

    let mut voltages = Vec::new();
    for method in [ConvolutionMethod::Direct, ConvolutionMethod::Fft] {
        let source: ImpedanceSource = broadband().into();
        let mut engine = InducedVoltageTime::new(&ring, &profile, vec![source], method).unwrap();
        voltages.push(engine.induced_voltage_generation(&beam, &profile, 0).unwrap());
    }
    let scale = voltages[0].iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    assert!(scale > 0.0);
    for (a, b) in voltages[0].iter().zip(&voltages[1]) {
        assert!((a - b).abs() < 1e-9 * scale);
    }
}

#[test]
fn test_induced_voltage_decelerates_bunch_on_average() {
    let ring = lhc_ring(10);
    let rf = lhc_rf(&ring, 6e6);
    let mut beam = gaussian_beam(&rf, 20_000, 0.25e-9, 8);
    let profile = bucket_profile(&beam, &rf, 200);

    let source: ImpedanceSource = broadband().into();
    let engine: InducedVoltage = InducedVoltageFreq::new(&ring, &profile, vec![source], FreqOptions::default())
        .unwrap()
        .into();
    let mut total = TotalInducedVoltage::new(&ring, &profile, vec![engine]);
    let before = beam.statistics().mean_de;
    total.track(&mut beam, &profile).unwrap();
    assert!(beam.statistics().mean_de < before);
    assert_eq!(total.induced_voltage().len(), profile.n_slices);
}
