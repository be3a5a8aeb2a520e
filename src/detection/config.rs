//! Detection configuration

use serde::{Deserialize, Serialize};

use crate::error::{LogsiftError, Result};
use crate::feature_engineering::CharClassification;

/// Configuration for per-request anomaly detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Number of isolation trees built per request
    pub ensemble_size: usize,

    /// Rows drawn (without replacement) for each tree
    pub subsample_size: usize,

    /// Base seed; tree `i` is seeded with `seed + i`
    pub seed: u64,

    /// Fixed outlier proportion. `None` flags rows scoring above the 0.5 baseline.
    pub contamination: Option<f64>,

    /// Letter/digit classification used by the feature extractor
    pub classification: CharClassification,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            ensemble_size: 100,
            subsample_size: 256,
            seed: 42,
            contamination: None,
            classification: CharClassification::Unicode,
        }
    }
}

impl DetectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `LOGSIFT_*` environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ensemble_size: env_parse("LOGSIFT_ENSEMBLE_SIZE").unwrap_or(defaults.ensemble_size),
            subsample_size: env_parse("LOGSIFT_SUBSAMPLE_SIZE").unwrap_or(defaults.subsample_size),
            seed: env_parse("LOGSIFT_SEED").unwrap_or(defaults.seed),
            contamination: env_parse("LOGSIFT_CONTAMINATION").or(defaults.contamination),
            classification: match env_parse::<bool>("LOGSIFT_ASCII_ONLY") {
                Some(true) => CharClassification::Ascii,
                _ => defaults.classification,
            },
        }
    }

    pub fn with_ensemble_size(mut self, n: usize) -> Self {
        self.ensemble_size = n;
        self
    }

    pub fn with_subsample_size(mut self, n: usize) -> Self {
        self.subsample_size = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_contamination(mut self, contamination: Option<f64>) -> Self {
        self.contamination = contamination;
        self
    }

    pub fn with_classification(mut self, classification: CharClassification) -> Self {
        self.classification = classification;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.ensemble_size == 0 {
            return Err(LogsiftError::ConfigError(
                "ensemble_size must be at least 1".to_string(),
            ));
        }
        if self.subsample_size == 0 {
            return Err(LogsiftError::ConfigError(
                "subsample_size must be at least 1".to_string(),
            ));
        }
        if let Some(c) = self.contamination {
            if !(c > 0.0 && c <= 0.5) {
                return Err(LogsiftError::ConfigError(format!(
                    "contamination must be in (0, 0.5], got {}",
                    c
                )));
            }
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DetectorConfig::default();
        assert_eq!(config.ensemble_size, 100);
        assert_eq!(config.subsample_size, 256);
        assert_eq!(config.seed, 42);
        assert!(config.contamination.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(DetectorConfig::new().with_ensemble_size(0).validate().is_err());
        assert!(DetectorConfig::new().with_subsample_size(0).validate().is_err());
        assert!(DetectorConfig::new().with_contamination(Some(0.0)).validate().is_err());
        assert!(DetectorConfig::new().with_contamination(Some(0.7)).validate().is_err());
        assert!(DetectorConfig::new().with_contamination(Some(0.1)).validate().is_ok());
    }

    #[test]
    fn test_config_serde() {
        let config = DetectorConfig::new()
            .with_seed(7)
            .with_classification(CharClassification::Ascii);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"classification\":\"ascii\""));
        let back: DetectorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
