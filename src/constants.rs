//! Physical constants (CODATA 2014, matching common accelerator codes)

pub const C: f64 = 299_792_458.0;

/// Elementary charge in coulomb
pub const E: f64 = 1.602_176_620_8e-19;

/// Proton rest mass in kg
pub const M_P: f64 = 1.672_621_898e-27;

/// Electron rest mass in kg
pub const M_E: f64 = 9.109_383_56e-31;

pub const PI: f64 = std::f64::consts::PI;

/// Ratio between FWHM and sigma of a Gaussian, `2 sqrt(2 ln 2)`
pub const CFWHM: f64 = 2.354_820_045_030_949;

/// Rest energy in eV of a particle with mass `kg`
pub fn rest_energy_ev(kg: f64) -> f64 {
    kg * C * C / E
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cfwhm_matches_definition() {
        let expected = 2.0 * (2.0 * std::f64::consts::LN_2).sqrt();
        assert!((CFWHM - expected).abs() < 1e-15);
    }

    #[test]
    fn test_proton_rest_energy() {
        let mp = rest_energy_ev(M_P);
        assert!((mp - 938.272_081e6).abs() < 1e3, "proton rest energy was {mp}");
    }
}
