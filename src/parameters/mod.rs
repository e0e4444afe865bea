//! Machine description consumed read-only by the tracking core

pub mod rf;
pub mod ring;

pub use rf::{AcceleratingSystems, RfCorrection, RfHarmonic, RfParameters, RfProgram, RfSystem};
pub use ring::{Particle, RingParameters};
