//! Collective effects: impedance sources, the induced-voltage engines built
//! on them, and the interpolated kick that applies a sampled voltage.

pub mod induced;
pub mod kick;
pub mod source;

pub use induced::{
    ConvolutionMethod, FreqOptions, FreqResolutionRounding, InducedVoltage, InducedVoltageFreq,
    InducedVoltageModel, InducedVoltageTime, TotalInducedVoltage,
};
pub use kick::linear_interp_kick;
pub use source::{ImpedanceSource, InputTable, Intensity, Resonators};
