//! Beamdrift library
//!
//! Longitudinal tracking of a macroparticle bunch through a synchrotron:
//! RF kicks and drifts, slice profiles, and the voltage the bunch induces on
//! itself through the machine impedance. The binary wires these together;
//! the library is what integration tests and benches drive.

pub mod beam;
pub mod cli;
pub mod config;
pub mod constants;
pub mod distributions;
pub mod error;
pub mod fft;
pub mod impedance;
pub mod math;
pub mod parameters;
pub mod profile;
pub mod scenario;
pub mod tracker;

// Test utilities are public for integration tests
pub mod test_utils;

pub use error::{BeamError, Result};
