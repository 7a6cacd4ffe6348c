//! Numeric settings shared by the three step primitives.
//!
//! The configuration is plain data so it can live in a TOML file next to the
//! problem it tunes:
//!
//! ```toml
//! finite_difference_step = 1e-8
//! cg_tolerance = 1e-12
//! cg_max_iterations = 8
//! degeneracy_tolerance = 2.220446049250313e-16
//! ```
//!
//! Every key is optional. Missing keys take their defaults, and a missing
//! `cg_max_iterations` means "twice the problem dimension".

use crate::curvature::{CurvatureOptions, DEFAULT_DEGENERACY_TOLERANCE};
use crate::direction::{DEFAULT_CG_TOLERANCE, DirectionOptions};
use crate::gradient::FINITE_DIFFERENCE_STEP;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading, saving or validating a [`StepConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML config: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Invalid value {value} for '{name}': {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StepConfig {
    /// Half-width of the central-difference stencil.
    pub finite_difference_step: f64,
    /// Relative residual at which the conjugate gradient solve stops.
    pub cg_tolerance: f64,
    /// Conjugate gradient iteration budget. `None` uses twice the dimension.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cg_max_iterations: Option<usize>,
    /// Relative threshold on `|sᵀy| / (‖s‖·‖y‖)` for a degenerate curvature pair.
    pub degeneracy_tolerance: f64,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            finite_difference_step: FINITE_DIFFERENCE_STEP,
            cg_tolerance: DEFAULT_CG_TOLERANCE,
            cg_max_iterations: None,
            degeneracy_tolerance: DEFAULT_DEGENERACY_TOLERANCE,
        }
    }
}

impl StepConfig {
    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Writes the configuration as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(text.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Rejects settings the primitives cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.finite_difference_step.is_finite() && self.finite_difference_step > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "finite_difference_step",
                value: self.finite_difference_step,
                reason: "must be positive and finite",
            });
        }
        if !(self.cg_tolerance.is_finite() && self.cg_tolerance > 0.0 && self.cg_tolerance < 1.0) {
            return Err(ConfigError::InvalidParameter {
                name: "cg_tolerance",
                value: self.cg_tolerance,
                reason: "must lie strictly between 0 and 1",
            });
        }
        if self.cg_max_iterations == Some(0) {
            return Err(ConfigError::InvalidParameter {
                name: "cg_max_iterations",
                value: 0.0,
                reason: "must allow at least one iteration",
            });
        }
        if !(self.degeneracy_tolerance.is_finite() && self.degeneracy_tolerance >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "degeneracy_tolerance",
                value: self.degeneracy_tolerance,
                reason: "must be non-negative and finite",
            });
        }
        Ok(())
    }

    pub fn direction_options(&self) -> DirectionOptions {
        DirectionOptions {
            tolerance: self.cg_tolerance,
            max_iterations: self.cg_max_iterations,
        }
    }

    pub fn curvature_options(&self) -> CurvatureOptions {
        CurvatureOptions {
            finite_difference_step: self.finite_difference_step,
            degeneracy_tolerance: self.degeneracy_tolerance,
        }
    }
}
