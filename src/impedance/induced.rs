//! Induced-voltage engines.
//!
//! All engines turn the current histogram into a voltage aligned with the
//! profile's bin centres. They remember the grid they were prepared for and
//! refuse to run on a profile whose slice count or bin width has changed
//! until `reprocess` is called. A pure shift of the frame keeps the grid
//! valid since wakes only depend on relative time.

use super::kick::linear_interp_kick;
use super::source::{ImpedanceSource, Intensity};
use crate::beam::Beam;
use crate::constants::E;
use crate::error::{BeamError, Result};
use crate::fft::{FftContext, rfftfreq};
use crate::math::{convolve_full, interp, next_regular};
use crate::parameters::RingParameters;
use crate::profile::Profile;
use realfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Shared contract of every induced-voltage engine
pub trait InducedVoltageModel {
    /// Particle charge in units of e
    fn charge(&self) -> f64;

    /// Voltage of the last generation, one value per slice
    fn induced_voltage(&self) -> &[f64];

    /// Compute the voltage for the current histogram. With `length > 0` the
    /// returned copy is zero padded or truncated to `length`; the stored
    /// voltage always has one value per slice.
    fn induced_voltage_generation(&mut self, beam: &Beam, profile: &Profile, length: usize) -> Result<Vec<f64>>;

    /// Rebuild the grid-dependent caches for the profile's current grid
    fn reprocess(&mut self, profile: &Profile) -> Result<()>;

    /// Turn the next generation belongs to. Only engines with wake memory
    /// use it; regenerating within the same turn does not advance the memory.
    fn set_turn(&mut self, _turn: usize) {}

    /// Generate the voltage and apply `charge * V` to every macroparticle
    fn track(&mut self, beam: &mut Beam, profile: &Profile) -> Result<()> {
        self.induced_voltage_generation(beam, profile, 0)?;
        let charge = self.charge();
        let voltage: Vec<f64> = self.induced_voltage().iter().map(|v| charge * v).collect();
        linear_interp_kick(&beam.dt, &mut beam.de, &voltage, &profile.bin_centers, 0.0);
        Ok(())
    }
}

/// Slice count and bin width an engine was prepared for
#[derive(Clone, Copy, Debug, PartialEq)]
struct ProfileGrid {
    n_slices: usize,
    bin_width: f64,
}

impl ProfileGrid {
    fn of(profile: &Profile) -> Self {
        Self {
            n_slices: profile.n_slices,
            bin_width: profile.bin_width(),
        }
    }

    fn check(&self, profile: &Profile) -> Result<()> {
        let found = Self::of(profile);
        let same_width = (found.bin_width - self.bin_width).abs() <= 1e-9 * self.bin_width.abs();
        if found.n_slices != self.n_slices || !same_width {
            return Err(BeamError::StaleProfileGrid {
                expected_slices: self.n_slices,
                expected_width: self.bin_width,
                found_slices: found.n_slices,
                found_width: found.bin_width,
            });
        }
        Ok(())
    }
}

fn resized(voltage: &[f64], length: usize) -> Vec<f64> {
    let mut out = voltage.to_vec();
    if length > 0 {
        out.resize(length, 0.0);
    }
    out
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConvolutionMethod {
    /// O(n^2) sum, exact
    Direct,
    #[default]
    Fft,
}

/// Time-domain engine: convolution of the histogram with the total wake
#[derive(Debug)]
pub struct InducedVoltageTime {
    sources: Vec<ImpedanceSource>,
    method: ConvolutionMethod,
    charge: f64,
    pub time_array: Vec<f64>,
    pub total_wake: Vec<f64>,
    induced_voltage: Vec<f64>,
    grid: ProfileGrid,
    fft: FftContext,
}

impl InducedVoltageTime {
    pub fn new(
        ring: &RingParameters,
        profile: &Profile,
        sources: Vec<ImpedanceSource>,
        method: ConvolutionMethod,
    ) -> Result<Self> {
        if sources.is_empty() {
            return Err(BeamError::InvalidParameter(
                "an induced-voltage engine needs at least one source".into(),
            ));
        }
        let mut engine = Self {
            sources,
            method,
            charge: ring.charge,
            time_array: Vec::new(),
            total_wake: Vec::new(),
            induced_voltage: vec![0.0; profile.n_slices],
            grid: ProfileGrid::of(profile),
            fft: FftContext::new(),
        };
        engine.reprocess(profile)?;
        Ok(engine)
    }

    pub fn method(&self) -> ConvolutionMethod {
        self.method
    }

    fn sum_wakes(&self) -> Result<Vec<f64>> {
        let mut total = vec![0.0; self.time_array.len()];
        for source in &self.sources {
            for (t, w) in total.iter_mut().zip(source.wake_calc(&self.time_array)?) {
                *t += w;
            }
        }
        Ok(total)
    }
}

impl InducedVoltageModel for InducedVoltageTime {
    fn charge(&self) -> f64 {
        self.charge
    }

    fn induced_voltage(&self) -> &[f64] {
        &self.induced_voltage
    }

    fn reprocess(&mut self, profile: &Profile) -> Result<()> {
        let origin = profile.bin_centers[0];
        self.time_array = profile.bin_centers.iter().map(|t| t - origin).collect();
        self.total_wake = self.sum_wakes()?;
        self.grid = ProfileGrid::of(profile);
        self.induced_voltage = vec![0.0; profile.n_slices];
        debug!(n_slices = profile.n_slices, "time-domain wake rebuilt");
        Ok(())
    }

    fn induced_voltage_generation(&mut self, beam: &Beam, profile: &Profile, length: usize) -> Result<Vec<f64>> {
        self.grid.check(profile)?;
        let counts = &profile.n_macroparticles;
        let convolved = match self.method {
            ConvolutionMethod::Direct => convolve_full(counts, &self.total_wake),
            ConvolutionMethod::Fft => {
                let n_fft = next_regular(counts.len() + self.total_wake.len() - 1);
                self.fft.convolve(counts, &self.total_wake, n_fft)?
            }
        };
        let factor = -self.charge * E * beam.ratio();
        self.induced_voltage = convolved[..profile.n_slices]
            .iter()
            .map(|v| factor * v)
            .collect();
        Ok(resized(&self.induced_voltage, length))
    }
}

/// How a requested frequency resolution becomes a sample count
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FreqResolutionRounding {
    #[default]
    Round,
    Ceil,
    Floor,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
#[serde(default)]
pub struct FreqOptions {
    /// Requested spacing of the impedance grid in Hz
    pub frequency_resolution: Option<f64>,
    pub rounding: FreqResolutionRounding,
    /// Re-evaluate the impedance on every generation
    pub recalculate_impedance: bool,
    /// Keep the voltage of every source separately
    pub save_individual_voltages: bool,
    /// Turns of wake memory; `None` disables multi-turn memory
    pub multi_turn_memory: Option<usize>,
}

#[derive(Debug)]
struct TurnMemory {
    n_turns_memory: usize,
    n_fft: usize,
    frequency: Vec<f64>,
    impedance: Vec<Complex64>,
    time: Vec<f64>,
    /// Wakes of earlier turns, shifted into the frame of `turn`
    history: Vec<f64>,
    buffer: Vec<f64>,
    t_rev: Vec<f64>,
    turn: Option<usize>,
}

/// Frequency-domain engine: product of the profile spectrum with the total
/// impedance, optionally accumulating wakes over previous turns
#[derive(Debug)]
pub struct InducedVoltageFreq {
    sources: Vec<ImpedanceSource>,
    options: FreqOptions,
    charge: f64,
    pub n_fft: usize,
    pub freq: Vec<f64>,
    pub total_impedance: Vec<Complex64>,
    source_impedances: Vec<Vec<Complex64>>,
    /// Per-source voltages, filled when individual voltages are kept
    pub source_voltages: Vec<Vec<f64>>,
    induced_voltage: Vec<f64>,
    memory: Option<TurnMemory>,
    t_rev: Vec<f64>,
    turn: usize,
    grid: ProfileGrid,
    fft: FftContext,
}

impl InducedVoltageFreq {
    pub fn new(
        ring: &RingParameters,
        profile: &Profile,
        sources: Vec<ImpedanceSource>,
        options: FreqOptions,
    ) -> Result<Self> {
        if sources.is_empty() {
            return Err(BeamError::InvalidParameter(
                "an induced-voltage engine needs at least one source".into(),
            ));
        }
        if let Some(df) = options.frequency_resolution {
            if !(df > 0.0) {
                return Err(BeamError::InvalidParameter(format!(
                    "frequency resolution must be positive, got {df}"
                )));
            }
        }
        if options.save_individual_voltages && options.multi_turn_memory.is_some() {
            return Err(BeamError::InvalidParameter(
                "individual source voltages are not kept with multi-turn memory".into(),
            ));
        }
        let mut engine = Self {
            sources,
            options,
            charge: ring.charge,
            n_fft: 0,
            freq: Vec::new(),
            total_impedance: Vec::new(),
            source_impedances: Vec::new(),
            source_voltages: Vec::new(),
            induced_voltage: vec![0.0; profile.n_slices],
            memory: None,
            t_rev: ring.t_rev.clone(),
            turn: 0,
            grid: ProfileGrid::of(profile),
            fft: FftContext::new(),
        };
        engine.reprocess(profile)?;
        Ok(engine)
    }

    pub fn options(&self) -> &FreqOptions {
        &self.options
    }

    /// Frequency spacing actually used
    pub fn frequency_resolution(&self) -> f64 {
        self.freq.get(1).copied().unwrap_or(0.0)
    }

    fn sampling_length(&self, profile: &Profile) -> usize {
        let n_slices = profile.n_slices;
        let Some(df) = self.options.frequency_resolution else {
            return n_slices;
        };
        let raw = 1.0 / (df * profile.bin_width());
        let rounded = match self.options.rounding {
            FreqResolutionRounding::Round => raw.round(),
            FreqResolutionRounding::Ceil => raw.ceil(),
            FreqResolutionRounding::Floor => raw.floor(),
        };
        let n = next_regular(rounded.max(1.0) as usize);
        if n < n_slices {
            let floor = next_regular(n_slices);
            warn!(
                requested = df,
                n_fft = floor,
                "frequency resolution coarser than the profile allows, using {floor} samples"
            );
            return floor;
        }
        n
    }

    fn impedances(&self, freq: &[f64]) -> Result<Vec<Vec<Complex64>>> {
        self.sources.iter().map(|s| s.imped_calc(freq)).collect()
    }

    fn sum(impedances: &[Vec<Complex64>], len: usize) -> Vec<Complex64> {
        let mut total = vec![Complex64::new(0.0, 0.0); len];
        for z in impedances {
            for (t, v) in total.iter_mut().zip(z) {
                *t += v;
            }
        }
        total
    }

    /// `factor * irfft(Z * spectrum)`, first `keep` samples
    fn apply(
        fft: &mut FftContext,
        impedance: &[Complex64],
        spectrum: &[Complex64],
        n_fft: usize,
        keep: usize,
        factor: f64,
    ) -> Result<Vec<f64>> {
        let product: Vec<Complex64> = impedance.iter().zip(spectrum).map(|(z, s)| z * s).collect();
        let mut voltage = fft.irfft(&product, n_fft)?;
        voltage.truncate(keep);
        voltage.iter_mut().for_each(|v| *v *= factor);
        Ok(voltage)
    }

    /// Move the accumulated wake one revolution back when `turn` starts
    fn advance_memory(memory: &mut TurnMemory, turn: usize) {
        if memory.turn == Some(turn) {
            return;
        }
        if memory.turn.is_some() {
            let t_rev = memory.t_rev[turn.min(memory.t_rev.len().saturating_sub(1))];
            let shifted: Vec<f64> = memory.time.iter().map(|t| t + t_rev).collect();
            memory.history = interp(&shifted, &memory.time, &memory.buffer, 0.0, 0.0);
        }
        memory.turn = Some(turn);
    }
}

impl InducedVoltageModel for InducedVoltageFreq {
    fn charge(&self) -> f64 {
        self.charge
    }

    fn induced_voltage(&self) -> &[f64] {
        &self.induced_voltage
    }

    fn reprocess(&mut self, profile: &Profile) -> Result<()> {
        let bin_width = profile.bin_width();
        self.n_fft = self.sampling_length(profile);
        self.freq = rfftfreq(self.n_fft, bin_width);
        self.source_impedances = self.impedances(&self.freq)?;
        self.total_impedance = Self::sum(&self.source_impedances, self.freq.len());
        self.grid = ProfileGrid::of(profile);
        self.induced_voltage = vec![0.0; profile.n_slices];
        self.source_voltages.clear();

        self.memory = match self.options.multi_turn_memory {
            Some(n_turns_memory) => {
                let len_memory = (n_turns_memory + 1) * profile.n_slices;
                let n_fft = next_regular((n_turns_memory + 2) * profile.n_slices);
                let frequency = rfftfreq(n_fft, bin_width);
                let impedance = Self::sum(&self.impedances(&frequency)?, frequency.len());
                Some(TurnMemory {
                    n_turns_memory,
                    n_fft,
                    frequency,
                    impedance,
                    time: (0..len_memory).map(|k| k as f64 * bin_width).collect(),
                    history: vec![0.0; len_memory],
                    buffer: vec![0.0; len_memory],
                    t_rev: self.t_rev.clone(),
                    turn: None,
                })
            }
            None => None,
        };
        debug!(
            n_fft = self.n_fft,
            df = self.frequency_resolution(),
            memory_turns = self.memory.as_ref().map(|m| m.n_turns_memory),
            memory_n_fft = self.memory.as_ref().map(|m| m.n_fft),
            "frequency-domain impedance rebuilt"
        );
        Ok(())
    }

    fn set_turn(&mut self, turn: usize) {
        self.turn = turn;
    }

    fn induced_voltage_generation(&mut self, beam: &Beam, profile: &Profile, length: usize) -> Result<Vec<f64>> {
        self.grid.check(profile)?;
        let n_slices = profile.n_slices;
        // -q e N/n_mp * df * n_fft, which reduces to a division by the bin width
        let factor = -self.charge * E * beam.ratio() / profile.bin_width();

        if let Some(memory) = self.memory.as_mut() {
            if self.options.recalculate_impedance {
                let per_source: Result<Vec<_>> =
                    self.sources.iter().map(|s| s.imped_calc(&memory.frequency)).collect();
                memory.impedance = Self::sum(&per_source?, memory.frequency.len());
            }
            Self::advance_memory(memory, self.turn);
            let spectrum = self.fft.rfft(&profile.n_macroparticles, memory.n_fft)?;
            let turn_voltage = Self::apply(
                &mut self.fft,
                &memory.impedance,
                &spectrum,
                memory.n_fft,
                memory.buffer.len(),
                factor,
            )?;
            memory.buffer = memory.history.iter().zip(&turn_voltage).map(|(h, v)| h + v).collect();
            self.induced_voltage = memory.buffer[..n_slices].to_vec();
            let extended = if length > 0 {
                resized(&memory.buffer, length)
            } else {
                self.induced_voltage.clone()
            };
            return Ok(extended);
        }

        if self.options.recalculate_impedance {
            self.source_impedances = self.impedances(&self.freq)?;
            self.total_impedance = Self::sum(&self.source_impedances, self.freq.len());
        }
        let spectrum = self.fft.rfft(&profile.n_macroparticles, self.n_fft)?;
        let keep = n_slices.min(self.n_fft);

        let mut voltage = if self.options.save_individual_voltages {
            self.source_voltages = self
                .source_impedances
                .iter()
                .map(|z| Self::apply(&mut self.fft, z, &spectrum, self.n_fft, keep, factor))
                .collect::<Result<_>>()?;
            let mut total = vec![0.0; keep];
            for v in &self.source_voltages {
                for (t, x) in total.iter_mut().zip(v) {
                    *t += x;
                }
            }
            total
        } else {
            Self::apply(&mut self.fft, &self.total_impedance, &spectrum, self.n_fft, keep, factor)?
        };
        voltage.resize(n_slices, 0.0);
        self.induced_voltage = voltage;
        Ok(resized(&self.induced_voltage, length))
    }
}

/// The engines the aggregator can hold
#[derive(Debug)]
pub enum InducedVoltage {
    Time(InducedVoltageTime),
    Freq(InducedVoltageFreq),
}

impl InducedVoltageModel for InducedVoltage {
    fn charge(&self) -> f64 {
        match self {
            InducedVoltage::Time(v) => v.charge(),
            InducedVoltage::Freq(v) => v.charge(),
        }
    }

    fn induced_voltage(&self) -> &[f64] {
        match self {
            InducedVoltage::Time(v) => v.induced_voltage(),
            InducedVoltage::Freq(v) => v.induced_voltage(),
        }
    }

    fn induced_voltage_generation(&mut self, beam: &Beam, profile: &Profile, length: usize) -> Result<Vec<f64>> {
        match self {
            InducedVoltage::Time(v) => v.induced_voltage_generation(beam, profile, length),
            InducedVoltage::Freq(v) => v.induced_voltage_generation(beam, profile, length),
        }
    }

    fn reprocess(&mut self, profile: &Profile) -> Result<()> {
        match self {
            InducedVoltage::Time(v) => v.reprocess(profile),
            InducedVoltage::Freq(v) => v.reprocess(profile),
        }
    }

    fn set_turn(&mut self, turn: usize) {
        if let InducedVoltage::Freq(v) = self {
            v.set_turn(turn);
        }
    }
}

impl From<InducedVoltageTime> for InducedVoltage {
    fn from(value: InducedVoltageTime) -> Self {
        InducedVoltage::Time(value)
    }
}

impl From<InducedVoltageFreq> for InducedVoltage {
    fn from(value: InducedVoltageFreq) -> Self {
        InducedVoltage::Freq(value)
    }
}

/// Sum of several engines, applied to the beam as one kick
#[derive(Debug)]
pub struct TotalInducedVoltage {
    pub engines: Vec<InducedVoltage>,
    charge: f64,
    induced_voltage: Vec<f64>,
}

impl TotalInducedVoltage {
    pub fn new(ring: &RingParameters, profile: &Profile, engines: Vec<InducedVoltage>) -> Self {
        Self {
            engines,
            charge: ring.charge,
            induced_voltage: vec![0.0; profile.n_slices],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl InducedVoltageModel for TotalInducedVoltage {
    fn charge(&self) -> f64 {
        self.charge
    }

    fn induced_voltage(&self) -> &[f64] {
        &self.induced_voltage
    }

    fn induced_voltage_generation(&mut self, beam: &Beam, profile: &Profile, length: usize) -> Result<Vec<f64>> {
        let mut total = vec![0.0; if length > 0 { length } else { profile.n_slices }];
        for engine in &mut self.engines {
            let voltage = engine.induced_voltage_generation(beam, profile, length)?;
            for (t, v) in total.iter_mut().zip(&voltage) {
                *t += v;
            }
        }
        self.induced_voltage = resized(&total, profile.n_slices);
        self.induced_voltage.truncate(profile.n_slices);
        Ok(total)
    }

    fn reprocess(&mut self, profile: &Profile) -> Result<()> {
        for engine in &mut self.engines {
            engine.reprocess(profile)?;
        }
        self.induced_voltage = vec![0.0; profile.n_slices];
        Ok(())
    }

    fn set_turn(&mut self, turn: usize) {
        for engine in &mut self.engines {
            engine.set_turn(turn);
        }
    }
}
