//! Analysis configuration

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};

/// Default epoch length in seconds (AASM standard epoch)
pub const DEFAULT_EPOCH_LENGTH_SEC: f64 = 30.0;

/// Settings shared by every analysis run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Duration of one epoch (seconds)
    #[serde(default = "default_epoch_length")]
    pub epoch_length_sec: f64,
}

fn default_epoch_length() -> f64 {
    DEFAULT_EPOCH_LENGTH_SEC
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            epoch_length_sec: DEFAULT_EPOCH_LENGTH_SEC,
        }
    }
}

impl AnalysisConfig {
    pub fn with_epoch_length(epoch_length_sec: f64) -> Result<Self, ComputeError> {
        let config = Self { epoch_length_sec };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.epoch_length_sec.is_finite() && self.epoch_length_sec > 0.0 {
            Ok(())
        } else {
            Err(ComputeError::InvalidEpochLength(self.epoch_length_sec))
        }
    }

    /// Epoch length in minutes
    pub fn epoch_length_min(&self) -> f64 {
        self.epoch_length_sec / 60.0
    }
}
