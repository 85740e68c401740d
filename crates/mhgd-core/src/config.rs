//! # Configuration System
//!
//! YAML configuration for detector runs:
//!
//! - Detector constants (antennas, modulation, iterations, chain count)
//! - Initialization and learning-rate policy
//! - Inversion method and numeric guards
//! - Execution mode (rayon or sequential)
//! - Logging and BER sweep settings
//!
//! ## Configuration Search Path
//!
//! Configuration is loaded from the first file found:
//! 1. Path specified via `MHGD_CONFIG` environment variable
//! 2. `./mhgd.yaml` (current directory)
//! 3. `~/.config/mhgd/config.yaml` (user config)
//! 4. `/etc/mhgd/config.yaml` (system config)
//!
//! ## Example Configuration
//!
//! ```yaml
//! detector:
//!   num_antennas: 8
//!   modulation: qam16
//!   iterations: 10
//!   samplers: 4
//!   mmse_init: false
//!   inversion: ldl
//!
//! logging:
//!   level: debug
//!
//! sweep:
//!   snr_db: [5.0, 10.0, 15.0, 20.0, 25.0]
//!   trials: 200
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constellation::Modulation;
use crate::inverse::{InverseOptions, InversionMethod, DEFAULT_PIVOT_EPSILON, DEFAULT_SNAP_TOLERANCE};
use crate::observe::LogConfig;
use crate::types::MhgdError;

/// Error type for configuration operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Configuration file not found
    NotFound(String),
    /// Failed to read or write configuration file
    ReadError(String),
    /// Failed to parse configuration
    ParseError(String),
    /// Invalid configuration value
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(msg) => write!(f, "config not found: {}", msg),
            ConfigError::ReadError(msg) => write!(f, "failed to read config: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "failed to parse config: {}", msg),
            ConfigError::ValidationError(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for MhgdError {
    fn from(err: ConfigError) -> Self {
        MhgdError::InvalidConfig(err.to_string())
    }
}

/// How the sampling chains are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One rayon task per chain (sequential without the `parallel` feature)
    Parallel,
    /// Chains run one after another on the calling thread
    Sequential,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Parallel
    }
}

/// How each chain chooses its gradient learning rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningRatePolicy {
    /// Rayleigh quotient `Re(rᴴ·pmat·r) / ‖pmat·r‖²`, refreshed on accept
    Exact,
    /// Fixed `chain_number × 0.5` (1-based), no `pmat` needed
    ChainIndexed,
}

/// Detector constants for one deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Transmit (and receive) antennas, `Nt`
    pub num_antennas: usize,
    pub modulation: Modulation,
    /// Sampler iterations per chain, no early exit
    pub iterations: usize,
    /// Number of independent chains
    pub samplers: usize,
    /// Start every chain from the projected MMSE estimate
    pub mmse_init: bool,
    /// Use the chain-indexed learning rate instead of the Rayleigh quotient
    pub lr_approx: bool,
    pub inversion: InversionMethod,
    pub snap_tolerance: f64,
    pub pivot_epsilon: f64,
    pub execution: ExecutionMode,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            num_antennas: 8,
            modulation: Modulation::Qam16,
            iterations: 10,
            samplers: 4,
            mmse_init: false,
            lr_approx: false,
            inversion: InversionMethod::Ldl,
            snap_tolerance: DEFAULT_SNAP_TOLERANCE,
            pivot_epsilon: DEFAULT_PIVOT_EPSILON,
            execution: ExecutionMode::Parallel,
        }
    }
}

impl DetectorConfig {
    /// Validate the detector constants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_antennas == 0 {
            return Err(ConfigError::ValidationError(
                "num_antennas must be > 0".to_string(),
            ));
        }
        if self.iterations == 0 {
            return Err(ConfigError::ValidationError(
                "iterations must be > 0".to_string(),
            ));
        }
        if self.samplers == 0 {
            return Err(ConfigError::ValidationError(
                "samplers must be > 0".to_string(),
            ));
        }
        if !(self.snap_tolerance.is_finite() && self.snap_tolerance >= 0.0) {
            return Err(ConfigError::ValidationError(
                "snap_tolerance must be finite and >= 0".to_string(),
            ));
        }
        if !(self.pivot_epsilon.is_finite() && self.pivot_epsilon > 0.0) {
            return Err(ConfigError::ValidationError(
                "pivot_epsilon must be finite and > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn inverse_options(&self) -> InverseOptions {
        InverseOptions {
            method: self.inversion,
            snap_tolerance: self.snap_tolerance,
            pivot_epsilon: self.pivot_epsilon,
        }
    }

    pub fn learning_rate_policy(&self) -> LearningRatePolicy {
        if self.lr_approx {
            LearningRatePolicy::ChainIndexed
        } else {
            LearningRatePolicy::Exact
        }
    }

    /// Perturbation samples each chain consumes, `Nt · iterations`.
    pub fn perturbation_len(&self) -> usize {
        self.num_antennas * self.iterations
    }
}

/// BER sweep settings used by the simulation harness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// SNR points in dB
    pub snr_db: Vec<f64>,
    /// Detections per SNR point
    pub trials: usize,
    /// Base seed for channels, symbols, noise, chain seeds and tables
    pub seed: u64,
    /// Derive chain seeds from the clock instead of `seed`
    pub clock_seeds: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            snr_db: vec![5.0, 10.0, 15.0, 20.0, 25.0],
            trials: 100,
            seed: 0x4d48_4744,
            clock_seeds: false,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MhgdConfig {
    /// Configuration version
    pub version: String,
    pub detector: DetectorConfig,
    pub logging: LogConfig,
    pub sweep: SweepConfig,
}

impl Default for MhgdConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            detector: DetectorConfig::default(),
            logging: LogConfig::default(),
            sweep: SweepConfig::default(),
        }
    }
}

impl MhgdConfig {
    /// Load configuration from the default search path.
    ///
    /// Returns the default configuration if no file is found.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("MHGD_CONFIG") {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            return Self::load_from(&path);
        }

        for path in Self::config_search_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load and validate configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))
    }

    /// Configuration search paths after `MHGD_CONFIG`.
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./mhgd.yaml")];

        if let Some(dirs) = directories::ProjectDirs::from("", "", "mhgd") {
            paths.push(dirs.config_dir().join("config.yaml"));
        }

        paths.push(PathBuf::from("/etc/mhgd/config.yaml"));
        paths
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detector.validate()?;

        if self.sweep.trials == 0 {
            return Err(ConfigError::ValidationError(
                "sweep.trials must be > 0".to_string(),
            ));
        }
        if self.sweep.snr_db.iter().any(|snr| !snr.is_finite()) {
            return Err(ConfigError::ValidationError(
                "sweep.snr_db entries must be finite".to_string(),
            ));
        }

        Ok(())
    }

    /// Generate example configuration YAML.
    pub fn example_yaml() -> String {
        let config = Self {
            detector: DetectorConfig {
                num_antennas: 4,
                modulation: Modulation::Qpsk,
                inversion: InversionMethod::Cholesky,
                ..Default::default()
            },
            ..Default::default()
        };

        serde_yaml::to_string(&config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::LogLevel;

    #[test]
    fn test_default_config() {
        let config = MhgdConfig::default();
        assert_eq!(config.detector.num_antennas, 8);
        assert_eq!(config.detector.modulation, Modulation::Qam16);
        assert_eq!(config.detector.iterations, 10);
        assert_eq!(config.detector.samplers, 4);
        assert_eq!(config.detector.inversion, InversionMethod::Ldl);
        assert_eq!(config.sweep.snr_db, vec![5.0, 10.0, 15.0, 20.0, 25.0]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
detector:
  num_antennas: 16
  modulation: qam64
  iterations: 20
  samplers: 8
  mmse_init: true
  lr_approx: true
  inversion: cholesky
  execution: sequential

logging:
  level: trace
  format: json

sweep:
  snr_db: [0.0, 30.0]
  trials: 50
"#;

        let config = MhgdConfig::parse(yaml).unwrap();
        assert_eq!(config.detector.num_antennas, 16);
        assert_eq!(config.detector.modulation, Modulation::Qam64);
        assert_eq!(config.detector.iterations, 20);
        assert_eq!(config.detector.samplers, 8);
        assert!(config.detector.mmse_init);
        assert_eq!(
            config.detector.learning_rate_policy(),
            LearningRatePolicy::ChainIndexed
        );
        assert_eq!(config.detector.inversion, InversionMethod::Cholesky);
        assert_eq!(config.detector.execution, ExecutionMode::Sequential);
        assert_eq!(config.logging.level, LogLevel::Trace);
        assert_eq!(config.sweep.snr_db, vec![0.0, 30.0]);
        assert_eq!(config.sweep.trials, 50);
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
detector:
  modulation: qpsk
"#;

        let config = MhgdConfig::parse(yaml).unwrap();
        assert_eq!(config.detector.modulation, Modulation::Qpsk);
        // Defaults should be applied
        assert_eq!(config.detector.num_antennas, 8);
        assert_eq!(config.detector.snap_tolerance, 1e-6);
        assert_eq!(config.detector.pivot_epsilon, 1e-12);
        assert_eq!(config.detector.execution, ExecutionMode::Parallel);
    }

    #[test]
    fn test_parse_rejects_unknown_modulation() {
        let err = MhgdConfig::parse("detector:\n  modulation: qam256\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_validation() {
        let mut config = MhgdConfig::default();
        assert!(config.validate().is_ok());

        config.detector.samplers = 0;
        assert!(config.validate().is_err());

        config.detector.samplers = 4;
        config.detector.pivot_epsilon = 0.0;
        assert!(config.validate().is_err());

        config.detector.pivot_epsilon = 1e-12;
        config.detector.snap_tolerance = f64::NAN;
        assert!(config.validate().is_err());

        config.detector.snap_tolerance = 1e-6;
        config.sweep.trials = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_error_into_mhgd_error() {
        let err: MhgdError = ConfigError::ValidationError("iterations must be > 0".into()).into();
        assert!(matches!(err, MhgdError::InvalidConfig(msg) if msg.contains("iterations")));
    }

    #[test]
    fn test_example_yaml() {
        let yaml = MhgdConfig::example_yaml();
        assert!(yaml.contains("detector:"));
        assert!(yaml.contains("sweep:"));
        let parsed = MhgdConfig::parse(&yaml).unwrap();
        assert_eq!(parsed.detector.modulation, Modulation::Qpsk);
        assert_eq!(parsed.detector.inversion, InversionMethod::Cholesky);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("mhgd-config-{}.yaml", std::process::id()));
        let mut config = MhgdConfig::default();
        config.detector.iterations = 25;
        config.save(&path).unwrap();

        let loaded = MhgdConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_config_search_paths() {
        let paths = MhgdConfig::config_search_paths();
        assert!(!paths.is_empty());
        assert!(paths[0].ends_with("mhgd.yaml"));
        assert!(paths.last().unwrap().ends_with("config.yaml"));
    }

    #[test]
    fn test_perturbation_len() {
        let config = DetectorConfig {
            num_antennas: 8,
            iterations: 10,
            ..Default::default()
        };
        assert_eq!(config.perturbation_len(), 80);
    }
}
