//! World configuration and its YAML loader.
//!
//! Presets live under a base directory so tuning can change without
//! recompiling.
//!
//! ## Directory Structure
//!
//! ```text
//! configs/
//! └── worlds/
//!     ├── default.yaml
//!     └── pool_table.yaml
//! ```
//!
//! Every field has a default, so a preset only needs to name what it
//! changes.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::body::MotionLimits;
use crate::collision::{Restitution, DEFAULT_CONTACT_CAPACITY};
use crate::types::{constants, Vec3};

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Config not found: {0}")]
    NotFound(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Numeric tuning consumed by a `PhysicsWorld`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub name: String,

    /// Gravitational acceleration (m/s²), Z up.
    pub gravity: Vec3,

    /// Ceiling on ball speed (m/s).
    pub max_linear_velocity: f64,

    /// Ceiling on spin rate (rad/s).
    pub max_angular_velocity: f64,

    pub max_angular_momentum: f64,

    /// Fraction of velocity removed per second by `update` drag.
    pub drag_coefficient: f64,

    /// Tracked bodies slower than this are snapped to rest (m/s).
    pub drag_activation_speed: f64,

    /// Longest integration slice (s). Larger steps are subdivided.
    pub min_substep: f64,

    /// Maximum simultaneous contacts per sub-step.
    pub contact_capacity: usize,

    pub sphere_plane_restitution: f64,
    pub sphere_sphere_restitution: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            gravity: Vec3::new(0.0, 0.0, -constants::GRAVITY),
            max_linear_velocity: 20.0,
            max_angular_velocity: 400.0,
            max_angular_momentum: 50.0,
            drag_coefficient: 0.3,
            drag_activation_speed: 0.2,
            min_substep: 1.0 / 240.0,
            contact_capacity: DEFAULT_CONTACT_CAPACITY,
            sphere_plane_restitution: crate::collision::SPHERE_PLANE_RESTITUTION,
            sphere_sphere_restitution: crate::collision::SPHERE_SPHERE_RESTITUTION,
        }
    }
}

impl WorldConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: WorldConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn limits(&self) -> MotionLimits {
        MotionLimits {
            max_linear_velocity: self.max_linear_velocity,
            max_angular_velocity: self.max_angular_velocity,
            max_angular_momentum: self.max_angular_momentum,
        }
    }

    pub fn restitution(&self) -> Restitution {
        Restitution {
            sphere_plane: self.sphere_plane_restitution,
            sphere_sphere: self.sphere_sphere_restitution,
        }
    }

    /// Replace every value `validate` would reject with its default.
    ///
    /// Used where a config arrives without going through the loader.
    pub fn sanitized(mut self) -> Self {
        let defaults = WorldConfig::default();

        if !self.gravity.is_finite() {
            warn!("gravity {:?} is not finite, using default", self.gravity);
            self.gravity = defaults.gravity;
        }

        let positive = [
            ("max_linear_velocity", &mut self.max_linear_velocity, defaults.max_linear_velocity),
            ("max_angular_velocity", &mut self.max_angular_velocity, defaults.max_angular_velocity),
            ("max_angular_momentum", &mut self.max_angular_momentum, defaults.max_angular_momentum),
            ("min_substep", &mut self.min_substep, defaults.min_substep),
        ];
        for (field, value, fallback) in positive {
            if !value.is_finite() || *value <= 0.0 {
                warn!("{} = {} is not positive, using {}", field, value, fallback);
                *value = fallback;
            }
        }

        let non_negative = [
            ("drag_coefficient", &mut self.drag_coefficient, defaults.drag_coefficient),
            (
                "drag_activation_speed",
                &mut self.drag_activation_speed,
                defaults.drag_activation_speed,
            ),
        ];
        for (field, value, fallback) in non_negative {
            if !value.is_finite() || *value < 0.0 {
                warn!("{} = {} is negative, using {}", field, value, fallback);
                *value = fallback;
            }
        }

        let coefficients = [
            (
                "sphere_plane_restitution",
                &mut self.sphere_plane_restitution,
                defaults.sphere_plane_restitution,
            ),
            (
                "sphere_sphere_restitution",
                &mut self.sphere_sphere_restitution,
                defaults.sphere_sphere_restitution,
            ),
        ];
        for (field, value, fallback) in coefficients {
            if !(0.0..=1.0).contains(&*value) {
                warn!("{} = {} is outside [0, 1], using {}", field, value, fallback);
                *value = fallback;
            }
        }

        if self.contact_capacity == 0 {
            warn!("contact_capacity is 0, using {}", defaults.contact_capacity);
            self.contact_capacity = defaults.contact_capacity;
        }

        self
    }

    /// Check every value is usable by the simulation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.gravity.is_finite() {
            return Err(ConfigError::Invalid("gravity must be finite".to_string()));
        }

        let positive = [
            ("max_linear_velocity", self.max_linear_velocity),
            ("max_angular_velocity", self.max_angular_velocity),
            ("max_angular_momentum", self.max_angular_momentum),
            ("min_substep", self.min_substep),
        ];
        for (field, value) in positive {
            if value.is_nan() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be positive, got {}",
                    field, value
                )));
            }
        }

        let non_negative = [
            ("drag_coefficient", self.drag_coefficient),
            ("drag_activation_speed", self.drag_activation_speed),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be finite and non-negative, got {}",
                    field, value
                )));
            }
        }

        let coefficients = [
            ("sphere_plane_restitution", self.sphere_plane_restitution),
            ("sphere_sphere_restitution", self.sphere_sphere_restitution),
        ];
        for (field, value) in coefficients {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be in [0, 1], got {}",
                    field, value
                )));
            }
        }

        if self.contact_capacity == 0 {
            return Err(ConfigError::Invalid(
                "contact_capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Preset loader with configurable base directory.
pub struct ConfigLoader {
    base_path: PathBuf,
}

impl ConfigLoader {
    /// Create a new loader with the given base path.
    ///
    /// The base path should contain a `worlds/` subdirectory.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Load a world preset by name (without .yaml extension).
    ///
    /// # Example
    /// ```ignore
    /// let loader = ConfigLoader::new("configs");
    /// let table = loader.load_world("pool_table")?;
    /// ```
    pub fn load_world(&self, name: &str) -> Result<WorldConfig, ConfigError> {
        let path = self.base_path.join("worlds").join(format!("{}.yaml", name));
        if !path.exists() {
            return Err(ConfigError::NotFound(name.to_string()));
        }
        let contents = fs::read_to_string(&path)?;
        WorldConfig::from_yaml_str(&contents).map_err(|err| {
            warn!("rejected world preset {}: {}", name, err);
            err
        })
    }

    /// List all available world presets.
    pub fn list_worlds(&self) -> Result<Vec<String>, ConfigError> {
        let path = self.base_path.join("worlds");
        if !path.exists() {
            return Ok(vec![]);
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&path)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if name.ends_with(".yaml") {
                names.push(name.trim_end_matches(".yaml").to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

// =============================================================================
// Tests
// =============================================================================
