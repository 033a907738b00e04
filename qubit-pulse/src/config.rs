//! Typed qubit configuration, loaded from JSON.
//!
//! ```json
//! {
//!   "hardware": { "repetition_period": 20000, "drive_wait_time": 2000, "readout_time": 10000 },
//!   "qubit": {
//!     "drive": { "t_pi": 48.0, "f_sb": -0.1, "drive_frequency": 5.6 },
//!     "frequencies": { "f01": 5.5, "f12": 5.25 }
//!   },
//!   "calibration": {
//!     "fluxline": [
//!       { "frequency": 0.0, "response_dac": [1.0, 0.0], "response_input_sample": [1.0, 0.0] },
//!       { "frequency": 1.0, "response_dac": [0.9, -0.1], "response_input_sample": [1.0, 0.0] }
//!     ]
//!   }
//! }
//! ```
//!
//! Every field is optional and defaults to the value of the corresponding `Default` impl.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::awg::HardwareBufferSpec;
use crate::calibration::CalibrationTables;
use crate::qubit::QubitParameters;
use crate::WaveformError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] WaveformError),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QubitConfig {
    pub hardware: HardwareBufferSpec,
    pub qubit: QubitParameters,
    pub calibration: CalibrationTables,
}

impl QubitConfig {
    /// Parse and validate a configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.hardware.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded qubit configuration");
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
