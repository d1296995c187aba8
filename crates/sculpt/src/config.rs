//! Surface settings, loadable from TOML.

use sculpt_math::Tolerance;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::surface::{MAX_SUBDIVS, MIN_SUBDIVS};

/// Errors from parsing or checking settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The TOML could not be parsed.
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings for one editable surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Subdivisions of the committed mesh.
    pub subdivs: usize,
    /// Subdivisions of the mesh shown while dragging.
    pub preview_subdivs: usize,
    /// Distance tolerance below which a mesh cell counts as planar.
    pub planar_tolerance: f64,
    /// Angle in radians below which two extruded side edges are merged.
    pub merge_angle: f64,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            subdivs: 8,
            preview_subdivs: 4,
            planar_tolerance: 1e-6,
            merge_angle: 1e-3,
        }
    }
}

impl SurfaceConfig {
    /// Parse and validate TOML. Missing keys keep their defaults.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("subdivs", self.subdivs),
            ("preview_subdivs", self.preview_subdivs),
        ] {
            if !(MIN_SUBDIVS..=MAX_SUBDIVS).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} = {value} outside {MIN_SUBDIVS}..={MAX_SUBDIVS}"
                )));
            }
        }
        if !(self.planar_tolerance.is_finite() && self.planar_tolerance > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "planar_tolerance = {} must be positive",
                self.planar_tolerance
            )));
        }
        if !(self.merge_angle.is_finite() && self.merge_angle >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "merge_angle = {} must not be negative",
                self.merge_angle
            )));
        }
        Ok(())
    }

    /// Tolerance for the quad-or-triangles decision.
    pub fn mesh_tolerance(&self) -> Tolerance {
        Tolerance {
            linear: self.planar_tolerance,
            ..Tolerance::DEFAULT
        }
    }

    /// Tolerance for matching extruded side edges.
    pub fn merge_tolerance(&self) -> Tolerance {
        Tolerance {
            angular: self.merge_angle,
            ..Tolerance::DEFAULT
        }
    }
}
