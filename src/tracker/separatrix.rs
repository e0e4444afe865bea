//! Single-harmonic Hamiltonian and separatrix test.

use crate::constants::{C, PI};
use crate::parameters::RfParameters;
use rayon::prelude::*;

/// Wrap a phase into `[0, 2 pi)`
pub fn phase_modulo_above_transition(phi: f64) -> f64 {
    phi - 2.0 * PI * (phi / (2.0 * PI)).floor()
}

/// Wrap a phase into `[-pi, pi)`
pub fn phase_modulo_below_transition(phi: f64) -> f64 {
    phi - 2.0 * PI * (phi / (2.0 * PI) + 0.5).floor()
}

fn wrap(phi: f64, eta_0: f64) -> f64 {
    if eta_0 > 0.0 {
        phase_modulo_above_transition(phi)
    } else {
        phase_modulo_below_transition(phi)
    }
}

/// Longitudinal Hamiltonian of the first RF system at `turn`, evaluated at
/// `(dt, dE)`
pub fn hamiltonian(rf: &RfParameters, turn: usize, dt: f64, de: f64) -> f64 {
    let beta = rf.beta[turn];
    let energy = rf.energy[turn];
    let eta_0 = rf.eta_0[turn];
    let voltage = rf.charge * rf.voltage[0][turn];
    let c1 = rf.eta_tracking(turn, de) * C * PI / (rf.ring_circumference * beta * energy);
    let c2 = C * beta * voltage / (rf.harmonic[0][turn] * rf.ring_circumference);

    let phi_s = wrap(rf.phi_s[turn], eta_0);
    let phi_b = wrap(rf.omega_rf[0][turn] * dt + rf.phi_rf[0][turn], eta_0);

    c1 * de * de
        + c2 * (libm::cos(phi_b) - libm::cos(phi_s) + (phi_b - phi_s) * libm::sin(phi_s))
}

/// Hamiltonian value on the separatrix, taken at the unstable fixed point
pub fn separatrix_hamiltonian(rf: &RfParameters, turn: usize) -> f64 {
    let dt_sep = (PI - rf.phi_s[turn] - rf.phi_rf[0][turn]) / rf.omega_rf[0][turn];
    hamiltonian(rf, turn, dt_sep, 0.0)
}

/// For every particle, whether it lies strictly inside the separatrix
pub fn is_in_separatrix(rf: &RfParameters, turn: usize, dt: &[f64], de: &[f64]) -> Vec<bool> {
    let h_sep = separatrix_hamiltonian(rf, turn).abs();
    dt.par_iter()
        .zip(de.par_iter())
        .map(|(&t, &e)| hamiltonian(rf, turn, t, e).abs() < h_sep)
        .collect()
}

/// Energy half-height of the separatrix at `dt`, `None` where the
/// separatrix does not reach
pub fn separatrix_height(rf: &RfParameters, turn: usize, dt: f64) -> Option<f64> {
    let h_sep = separatrix_hamiltonian(rf, turn);
    let potential = hamiltonian(rf, turn, dt, 0.0);
    let c1 = rf.eta_0[turn] * C * PI / (rf.ring_circumference * rf.beta[turn] * rf.energy[turn]);
    let de_sq = (h_sep - potential) / c1;
    (de_sq >= 0.0).then(|| de_sq.sqrt())
}
