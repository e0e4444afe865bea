//! Run configuration: machine, bunch, profile, impedance and tracking
//! settings, loaded from TOML with `BEAMDRIFT__*` environment overrides.

use crate::impedance::{ConvolutionMethod, FreqOptions};
use crate::parameters::{AcceleratingSystems, Particle, RfSystem};
use crate::profile::ProfileOptions;
use crate::tracker::TrackerOptions;
use config::{Config, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

const ENV_PREFIX: &str = "BEAMDRIFT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("could not serialise configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("could not write configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    pub ring: RingConfig,
    pub rf: RfConfig,
    pub beam: BeamConfig,
    pub profile: ProfileOptions,
    pub impedance: ImpedanceConfig,
    pub tracking: TrackerOptions,
    pub run: RunConfig,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RingConfig {
    /// Circumference in m
    pub circumference: f64,
    /// Momentum compaction coefficients, first order first
    pub alpha: Vec<f64>,
    /// Momentum at the first turn in eV/c
    pub momentum: f64,
    /// Momentum at the last turn; constant momentum when unset
    pub momentum_end: Option<f64>,
    pub particle: Particle,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            circumference: 26_658.883,
            alpha: vec![1.0 / 55.759_505_f64.powi(2)],
            momentum: 450e9,
            momentum_end: None,
            particle: Particle::Proton,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RfConfig {
    pub systems: Vec<RfSystem>,
    pub accelerating: AcceleratingSystems,
}

impl Default for RfConfig {
    fn default() -> Self {
        Self {
            systems: vec![RfSystem::constant(35_640.0, 6e6, 0.0)],
            accelerating: AcceleratingSystems::AsSingle,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BeamConfig {
    pub n_macroparticles: usize,
    /// Real particles in the bunch
    pub intensity: f64,
    /// Rms bunch length in s
    pub sigma_dt: f64,
    /// Rms energy spread in eV; matched to the bucket when unset
    pub sigma_de: Option<f64>,
    pub seed: u64,
    pub reinsertion: bool,
}

impl Default for BeamConfig {
    fn default() -> Self {
        Self {
            n_macroparticles: 50_000,
            intensity: 1e11,
            sigma_dt: 0.25e-9,
            sigma_de: None,
            seed: 1,
            reinsertion: true,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImpedanceDomain {
    Time,
    #[default]
    Frequency,
}

/// One resonator of the machine impedance model
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ResonatorConfig {
    /// Shunt impedance in ohm
    pub r_s: f64,
    /// Resonant frequency in Hz
    pub frequency: f64,
    pub q: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ImpedanceConfig {
    /// No collective effects when empty
    pub resonators: Vec<ResonatorConfig>,
    pub domain: ImpedanceDomain,
    pub method: ConvolutionMethod,
    pub frequency: FreqOptions,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    pub n_turns: usize,
    /// Log bunch statistics every this many turns; never when zero
    pub report_every: usize,
    /// Rayon worker threads; the rayon default when unset
    pub threads: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            n_turns: 1000,
            report_every: 100,
            threads: None,
        }
    }
}

impl SimulationConfig {
    fn builder() -> config::ConfigBuilder<config::builder::DefaultState> {
        Config::builder()
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
    }

    /// Read `path` and apply environment overrides
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings = Self::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(true))
            .add_source(Self::environment())
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Defaults plus environment overrides
    pub fn from_environment() -> Result<Self, ConfigError> {
        let settings = Self::builder().add_source(Self::environment()).build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Load configuration from a file, falling back to defaults if the file doesn't exist
    pub fn load_or_default(path: &str) -> Self {
        let path = Path::new(path);
        if !path.exists() {
            info!("Config file {} not found. Using defaults.", path.display());
            return Self::from_environment().unwrap_or_default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to parse config file {}: {}. Using defaults.", path.display(), e);
                Self::default()
            }
        }
    }

    /// Location of the per-user configuration file, if the platform has one
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "beamdrift", "beamdrift").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load the per-user configuration file when present, defaults otherwise
    pub fn load_from_user_config() -> Self {
        match Self::user_config_path() {
            Some(path) if path.exists() => {
                info!("Loading user configuration from {}", path.display());
                Self::load_or_default(&path.to_string_lossy())
            }
            _ => Self::from_environment().unwrap_or_else(|e| {
                warn!("Ignoring environment overrides: {e}");
                Self::default()
            }),
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings that cannot describe a run before anything is built
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if self.run.n_turns == 0 {
            return invalid("run.n_turns must be positive".into());
        }
        if !(self.ring.circumference > 0.0) {
            return invalid(format!(
                "ring.circumference must be positive, got {}",
                self.ring.circumference
            ));
        }
        if self.ring.alpha.is_empty() || self.ring.alpha.len() > 3 {
            return invalid(format!(
                "ring.alpha needs 1 to 3 coefficients, got {}",
                self.ring.alpha.len()
            ));
        }
        if self.rf.systems.is_empty() {
            return invalid("rf.systems must list at least one RF system".into());
        }
        if self.beam.n_macroparticles == 0 {
            return invalid("beam.n_macroparticles must be positive".into());
        }
        if self.profile.n_slices < 2 {
            return invalid(format!(
                "profile.n_slices must be at least 2, got {}",
                self.profile.n_slices
            ));
        }
        if self.tracking.periodicity && self.tracking.rf_kick_interp {
            return invalid("tracking.periodicity and tracking.rf_kick_interp are exclusive".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Solver;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("beamdrift-{}-{name}.toml", std::process::id()))
    }

    #[test]
    fn test_default_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_save_then_load() {
        let path = scratch_path("roundtrip");
        let mut config = SimulationConfig::default();
        config.run.n_turns = 42;
        config.tracking.solver = Solver::Full;
        config.impedance.resonators.push(ResonatorConfig {
            r_s: 1e6,
            frequency: 1.2e9,
            q: 3.0,
        });
        config.save(&path.to_string_lossy()).unwrap();
        let loaded = SimulationConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.run.n_turns, 42);
        assert_eq!(loaded.tracking.solver, Solver::Full);
        assert_eq!(loaded.impedance.resonators, config.impedance.resonators);
        assert_eq!(loaded.rf, config.rf);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let path = scratch_path("partial");
        std::fs::write(&path, "[beam]\nn_macroparticles = 1234\n\n[tracking]\nperiodicity = true\n").unwrap();
        let loaded = SimulationConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.beam.n_macroparticles, 1234);
        assert!(loaded.tracking.periodicity);
        assert_eq!(loaded.ring, RingConfig::default());
        assert_eq!(loaded.profile, ProfileOptions::default());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = SimulationConfig::load_or_default("/nonexistent/beamdrift.toml");
        assert_eq!(config.beam, BeamConfig::default());
    }

    #[test]
    fn test_validation_catches_bad_values() {
        let mut config = SimulationConfig::default();
        config.rf.systems.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = SimulationConfig::default();
        config.tracking.periodicity = true;
        config.tracking.rf_kick_interp = true;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.ring.alpha = vec![1e-3, 1e-4, 1e-5, 1e-6];
        assert!(config.validate().is_err());
    }
}
