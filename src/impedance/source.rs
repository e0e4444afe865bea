//! Impedance sources: analytic resonator banks and tabulated models

use crate::constants::PI;
use crate::error::{BeamError, Result};
use crate::math::interp;
use realfft::num_complex::Complex64;

/// A wake-field source that can describe itself in either domain
pub trait Intensity {
    /// Wake function in V/C sampled at `time` (s)
    fn wake_calc(&self, time: &[f64]) -> Result<Vec<f64>>;

    /// Impedance in ohm sampled at `freq` (Hz)
    fn imped_calc(&self, freq: &[f64]) -> Result<Vec<Complex64>>;
}

/// Bank of parallel RLC resonators
#[derive(Clone, Debug, PartialEq)]
pub struct Resonators {
    pub r_s: Vec<f64>,
    pub frequency_r: Vec<f64>,
    pub q: Vec<f64>,
}

impl Resonators {
    pub fn new(r_s: Vec<f64>, frequency_r: Vec<f64>, q: Vec<f64>) -> Result<Self> {
        if r_s.is_empty() || r_s.len() != frequency_r.len() || r_s.len() != q.len() {
            return Err(BeamError::InvalidParameter(format!(
                "resonator tables must be non-empty and of equal length, got {}, {} and {}",
                r_s.len(),
                frequency_r.len(),
                q.len()
            )));
        }
        if let Some(bad) = frequency_r.iter().find(|f| !(**f > 0.0)) {
            return Err(BeamError::InvalidParameter(format!(
                "resonator frequency must be positive, got {bad}"
            )));
        }
        // the damped oscillation frequency is only real for Q > 1/2
        if let Some(bad) = q.iter().find(|q| !(**q > 0.5)) {
            return Err(BeamError::InvalidParameter(format!(
                "resonator quality factor must exceed 0.5, got {bad}"
            )));
        }
        Ok(Self { r_s, frequency_r, q })
    }

    pub fn len(&self) -> usize {
        self.r_s.len()
    }

    pub fn is_empty(&self) -> bool {
        self.r_s.is_empty()
    }

    fn resonators(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.r_s
            .iter()
            .zip(&self.frequency_r)
            .zip(&self.q)
            .map(|((r, f), q)| (*r, *f, *q))
    }
}

impl Intensity for Resonators {
    fn wake_calc(&self, time: &[f64]) -> Result<Vec<f64>> {
        let mut wake = vec![0.0; time.len()];
        for (r_s, f_r, q) in self.resonators() {
            let omega_r = 2.0 * PI * f_r;
            let alpha = omega_r / (2.0 * q);
            let omega_bar = (omega_r * omega_r - alpha * alpha).sqrt();
            for (w, &t) in wake.iter_mut().zip(time) {
                // causal: half weight at t = 0, nothing before
                let step = if t > 0.0 {
                    2.0
                } else if t == 0.0 {
                    1.0
                } else {
                    0.0
                };
                *w += step
                    * r_s
                    * alpha
                    * libm::exp(-alpha * t)
                    * (libm::cos(omega_bar * t) - alpha / omega_bar * libm::sin(omega_bar * t));
            }
        }
        Ok(wake)
    }

    fn imped_calc(&self, freq: &[f64]) -> Result<Vec<Complex64>> {
        let mut impedance = vec![Complex64::new(0.0, 0.0); freq.len()];
        for (r_s, f_r, q) in self.resonators() {
            for (z, &f) in impedance.iter_mut().zip(freq) {
                if f == 0.0 {
                    continue;
                }
                *z += Complex64::new(r_s, 0.0) / Complex64::new(1.0, q * (f / f_r - f_r / f));
            }
        }
        Ok(impedance)
    }
}

/// Tabulated wake or impedance, linearly interpolated and zero outside the table
#[derive(Clone, Debug, PartialEq)]
pub enum InputTable {
    Wake {
        time: Vec<f64>,
        wake: Vec<f64>,
    },
    Impedance {
        frequency: Vec<f64>,
        re: Vec<f64>,
        im: Vec<f64>,
    },
}

impl InputTable {
    pub fn wake(time: Vec<f64>, wake: Vec<f64>) -> Result<Self> {
        check_table(&time, &[wake.len()], "wake")?;
        Ok(InputTable::Wake { time, wake })
    }

    /// Impedance table; a `(0, 0, 0)` point is prepended when the table does
    /// not start at DC so interpolation towards zero frequency stays bounded
    pub fn impedance(mut frequency: Vec<f64>, mut re: Vec<f64>, mut im: Vec<f64>) -> Result<Self> {
        check_table(&frequency, &[re.len(), im.len()], "impedance")?;
        if frequency[0] != 0.0 {
            frequency.insert(0, 0.0);
            re.insert(0, 0.0);
            im.insert(0, 0.0);
        }
        Ok(InputTable::Impedance { frequency, re, im })
    }
}

fn check_table(axis: &[f64], columns: &[usize], what: &str) -> Result<()> {
    if axis.is_empty() || columns.iter().any(|&len| len != axis.len()) {
        return Err(BeamError::InvalidParameter(format!(
            "{what} table columns must be non-empty and of equal length"
        )));
    }
    if axis.windows(2).any(|w| !(w[1] > w[0])) {
        return Err(BeamError::InvalidParameter(format!(
            "{what} table abscissa must be strictly increasing"
        )));
    }
    Ok(())
}

impl Intensity for InputTable {
    fn wake_calc(&self, time: &[f64]) -> Result<Vec<f64>> {
        match self {
            InputTable::Wake { time: table, wake } => Ok(interp(time, table, wake, 0.0, 0.0)),
            InputTable::Impedance { .. } => Err(BeamError::MissingTable("wake")),
        }
    }

    fn imped_calc(&self, freq: &[f64]) -> Result<Vec<Complex64>> {
        match self {
            InputTable::Impedance { frequency, re, im } => {
                let re = interp(freq, frequency, re, 0.0, 0.0);
                let im = interp(freq, frequency, im, 0.0, 0.0);
                Ok(re.into_iter().zip(im).map(|(r, i)| Complex64::new(r, i)).collect())
            }
            InputTable::Wake { .. } => Err(BeamError::MissingTable("impedance")),
        }
    }
}

/// The closed set of sources the induced-voltage engines accept
#[derive(Clone, Debug, PartialEq)]
pub enum ImpedanceSource {
    Resonators(Resonators),
    InputTable(InputTable),
}

impl Intensity for ImpedanceSource {
    fn wake_calc(&self, time: &[f64]) -> Result<Vec<f64>> {
        match self {
            ImpedanceSource::Resonators(r) => r.wake_calc(time),
            ImpedanceSource::InputTable(t) => t.wake_calc(time),
        }
    }

    fn imped_calc(&self, freq: &[f64]) -> Result<Vec<Complex64>> {
        match self {
            ImpedanceSource::Resonators(r) => r.imped_calc(freq),
            ImpedanceSource::InputTable(t) => t.imped_calc(freq),
        }
    }
}

impl From<Resonators> for ImpedanceSource {
    fn from(value: Resonators) -> Self {
        ImpedanceSource::Resonators(value)
    }
}

impl From<InputTable> for ImpedanceSource {
    fn from(value: InputTable) -> Self {
        ImpedanceSource::InputTable(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single() -> Resonators {
        Resonators::new(vec![1e6], vec![1e9], vec![10.0]).unwrap()
    }

    #[test]
    fn test_wake_at_zero_is_alpha_r() {
        let res = single();
        let alpha = 2.0 * PI * 1e9 / 20.0;
        let wake = res.wake_calc(&[0.0]).unwrap();
        assert!((wake[0] - alpha * 1e6).abs() / (alpha * 1e6) < 1e-14);
    }

    #[test]
    fn test_wake_is_causal() {
        let wake = single().wake_calc(&[-1e-9, -1e-12]).unwrap();
        assert_eq!(wake, vec![0.0, 0.0]);
    }

    #[test]
    fn test_wake_just_after_zero_doubles() {
        let res = single();
        let wake = res.wake_calc(&[0.0, 1e-18]).unwrap();
        assert!((wake[1] / wake[0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_impedance_peak_is_shunt() {
        let res = Resonators::new(vec![1e6, 2e5], vec![1e9, 3e9], vec![1e4, 1e4]).unwrap();
        let z = res.imped_calc(&[0.0, 1e9, 3e9]).unwrap();
        assert_eq!(z[0], Complex64::new(0.0, 0.0));
        // the far resonator contributes a little at 1 GHz
        assert!((z[1].re - 1e6).abs() / 1e6 < 1e-3);
        assert!((z[2].re - 2e5).abs() / 2e5 < 1e-2);
    }

    #[test]
    fn test_impedance_symmetry() {
        let z = single().imped_calc(&[0.9e9, 1.0 / 0.9 * 1e9]).unwrap();
        // f/f_r - f_r/f flips sign under f -> f_r^2 / f
        assert!((z[0].re - z[1].re).abs() < 1e-6 * z[0].re);
        assert!((z[0].im + z[1].im).abs() < 1e-6 * z[0].re);
    }

    #[test]
    fn test_overdamped_resonator_rejected() {
        assert!(Resonators::new(vec![1.0], vec![1e9], vec![0.5]).is_err());
        assert!(Resonators::new(vec![1.0, 2.0], vec![1e9], vec![1.0]).is_err());
    }

    #[test]
    fn test_input_table_prepends_dc() {
        let table = InputTable::impedance(vec![1e6, 2e6], vec![10.0, 20.0], vec![-1.0, -2.0]).unwrap();
        let z = table.imped_calc(&[0.0, 0.5e6, 1.5e6, 3e6]).unwrap();
        assert_eq!(z[0], Complex64::new(0.0, 0.0));
        assert!((z[1].re - 5.0).abs() < 1e-12);
        assert!((z[2].im + 1.5).abs() < 1e-12);
        assert_eq!(z[3], Complex64::new(0.0, 0.0));
    }

    #[test]
    fn test_input_table_missing_capability() {
        let table = InputTable::wake(vec![0.0, 1e-9], vec![1.0, 0.0]).unwrap();
        assert!(matches!(
            table.imped_calc(&[0.0]),
            Err(BeamError::MissingTable("impedance"))
        ));
        let w = table.wake_calc(&[0.5e-9, 2e-9]).unwrap();
        assert!((w[0] - 0.5).abs() < 1e-12);
        assert_eq!(w[1], 0.0);
    }
}
