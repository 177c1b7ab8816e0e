use crate::bootstrap::{BootstrapConfig, BootstrapError};
use crate::metrics::BinStrategy;
use crate::sequential::DEFAULT_CUTOFF;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_CALIBRATION_BINS: usize = 10;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize configuration to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Invalid bootstrap settings: {0}")]
    Bootstrap(#[from] BootstrapError),
    #[error("Cutoff must lie within [0, 1]; got {0}.")]
    InvalidCutoff(f64),
    #[error("Calibration curves need at least one bin.")]
    InvalidBinCount,
}

/// Settings for a full evaluation run. Every field has a default, so a
/// configuration file only needs to list what it changes.
///
/// ```toml
/// cutoff = 0.10
/// calibration_bins = 10
/// calibration_strategy = "quantile"
///
/// [bootstrap]
/// n_bootstraps = 2000
/// ci_level = 0.95
/// seed = 42
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Base-model probability at or above which a patient is routed to the
    /// high-risk model.
    pub cutoff: f64,
    pub calibration_bins: usize,
    pub calibration_strategy: BinStrategy,
    pub round_nri: bool,
    pub drop_intermediate: bool,
    pub bootstrap: BootstrapConfig,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            cutoff: DEFAULT_CUTOFF,
            calibration_bins: DEFAULT_CALIBRATION_BINS,
            calibration_strategy: BinStrategy::Uniform,
            round_nri: true,
            drop_intermediate: true,
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl EvaluationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bootstrap.validate()?;
        if !(0.0..=1.0).contains(&self.cutoff) {
            return Err(ConfigError::InvalidCutoff(self.cutoff));
        }
        if self.calibration_bins == 0 {
            return Err(ConfigError::InvalidBinCount);
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loads and validates a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&toml_string)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, tempdir};

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "calibration_strategy = \"quantile\"").unwrap();
        writeln!(file, "[bootstrap]").unwrap();
        writeln!(file, "seed = 7").unwrap();

        let config = EvaluationConfig::load(file.path()).unwrap();
        assert_eq!(config.calibration_strategy, BinStrategy::Quantile);
        assert_eq!(config.bootstrap.seed, 7);
        assert_eq!(config.bootstrap.n_bootstraps, 2000);
        assert_eq!(config.cutoff, 0.10);
        assert_eq!(config.calibration_bins, 10);
        assert!(config.round_nri);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("evaluation.toml");
        let config = EvaluationConfig {
            cutoff: 0.2,
            round_nri: false,
            ..EvaluationConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(EvaluationConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "cutoff = 1.5").unwrap();
        assert!(matches!(
            EvaluationConfig::load(file.path()),
            Err(ConfigError::InvalidCutoff(_))
        ));

        let config = EvaluationConfig {
            bootstrap: BootstrapConfig::default().with_ci_level(1.0),
            ..EvaluationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Bootstrap(BootstrapError::InvalidConfidenceLevel(_)))
        ));

        let mut bad_strategy = NamedTempFile::new().unwrap();
        writeln!(bad_strategy, "calibration_strategy = \"kmeans\"").unwrap();
        assert!(matches!(
            EvaluationConfig::load(bad_strategy.path()),
            Err(ConfigError::TomlParseError(_))
        ));
    }
}
