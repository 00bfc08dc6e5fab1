//! Shared sculpt settings for Relief
//!
//! This crate provides the single source of truth for the scene-level sculpt
//! settings that are independent of any one brush: mirror and radial symmetry,
//! tiling, axis locks, mirror-modifier clipping and dynamic topology detail.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Mirror symmetry bit for the X axis
pub const SYMMETRY_X: u8 = 1;

/// Mirror symmetry bit for the Y axis
pub const SYMMETRY_Y: u8 = 2;

/// Mirror symmetry bit for the Z axis
pub const SYMMETRY_Z: u8 = 4;

/// Default mirror symmetry (X only, the usual character-sculpting setup)
pub const DEFAULT_SYMMETRY: u8 = SYMMETRY_X;

/// Default radial repeat count per axis (1 = no radial copies)
pub const DEFAULT_RADIAL_SYMMETRY: [u32; 3] = [1, 1, 1];

/// Default distance under which a clipped vertex snaps onto the mirror plane
pub const DEFAULT_CLIP_TOLERANCE: f32 = 0.001;

/// Default maximum gap bridged by fake neighbors (0 = disabled)
pub const DEFAULT_FAKE_NEIGHBOR_DISTANCE: f32 = 0.0;

/// Default dynamic topology detail size in object units
pub const DEFAULT_DETAIL_SIZE: f32 = 0.05;

/// Default minimum number of nodes handed to one worker
pub const DEFAULT_MIN_NODES_PER_TASK: usize = 1;

/// Default gravity strength (0 = no gravity pass)
pub const DEFAULT_GRAVITY_FACTOR: f32 = 0.0;

/// Default gravity "up" axis in object space, gravity pulls against it
pub const DEFAULT_GRAVITY_DIRECTION: [f32; 3] = [0.0, 0.0, 1.0];

/// Errors raised while loading settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Scene-level sculpt settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SculptSettings {
    /// Mirror symmetry bits, combination of `SYMMETRY_X/Y/Z`
    pub symmetry: u8,
    /// Radial repeat count around X, Y and Z
    pub radial_symmetry: [u32; 3],
    /// Scale brush strength down where mirrored copies overlap
    pub symmetry_feather: bool,
    /// Repeat the brush across the object bounds along these axes
    pub tile: [bool; 3],
    /// Tile spacing per axis
    pub tile_offset: [f32; 3],
    /// Axes whose coordinates are never changed by a stroke
    pub lock: [bool; 3],
    /// Axes on which vertices near the mirror plane are snapped onto it
    pub clip: [bool; 3],
    /// Snap distance per clipped axis
    pub clip_tolerance: [f32; 3],
    /// Maximum gap bridged between disconnected islands
    pub fake_neighbor_distance: f32,
    /// Subdivide dynamic-mesh edges longer than this
    pub detail_size: f32,
    /// Whether dynamic topology runs before each brush action
    pub dynamic_topology: bool,
    /// Minimum nodes per parallel task
    pub min_nodes_per_task: usize,
    /// Strength of the per-sample gravity pass
    pub gravity_factor: f32,
    /// Gravity "up" axis, displacement goes the opposite way
    pub gravity_direction: [f32; 3],
}

impl Default for SculptSettings {
    fn default() -> Self {
        Self {
            symmetry: DEFAULT_SYMMETRY,
            radial_symmetry: DEFAULT_RADIAL_SYMMETRY,
            symmetry_feather: false,
            tile: [false; 3],
            tile_offset: [1.0; 3],
            lock: [false; 3],
            clip: [false; 3],
            clip_tolerance: [DEFAULT_CLIP_TOLERANCE; 3],
            fake_neighbor_distance: DEFAULT_FAKE_NEIGHBOR_DISTANCE,
            detail_size: DEFAULT_DETAIL_SIZE,
            dynamic_topology: false,
            min_nodes_per_task: DEFAULT_MIN_NODES_PER_TASK,
            gravity_factor: DEFAULT_GRAVITY_FACTOR,
            gravity_direction: DEFAULT_GRAVITY_DIRECTION,
        }
    }
}

impl SculptSettings {
    /// Settings with all symmetry disabled
    pub fn without_symmetry() -> Self {
        Self {
            symmetry: 0,
            ..Default::default()
        }
    }

    /// Parse settings from JSON text, missing fields fall back to defaults
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Serialize to pretty JSON
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symmetry > (SYMMETRY_X | SYMMETRY_Y | SYMMETRY_Z) {
            return Err(ConfigError::Invalid {
                field: "symmetry",
                reason: format!("{} has bits outside XYZ", self.symmetry),
            });
        }
        if self.radial_symmetry.iter().any(|&n| n == 0) {
            return Err(ConfigError::Invalid {
                field: "radial_symmetry",
                reason: "repeat counts start at 1".to_string(),
            });
        }
        if self.detail_size <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "detail_size",
                reason: format!("{} must be positive", self.detail_size),
            });
        }
        if !(0.0..=1.0).contains(&self.gravity_factor) {
            return Err(ConfigError::Invalid {
                field: "gravity_factor",
                reason: format!("{} is outside 0..=1", self.gravity_factor),
            });
        }
        if self.min_nodes_per_task == 0 {
            return Err(ConfigError::Invalid {
                field: "min_nodes_per_task",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Whether the given mirror axis (0 = X) is enabled
    pub fn mirrors(&self, axis: usize) -> bool {
        self.symmetry & (1 << axis) != 0
    }

    /// Whether the gravity pass runs
    pub fn uses_gravity(&self) -> bool {
        self.gravity_factor != 0.0
    }

    /// Whether any fake-neighbor bridging is requested
    pub fn uses_fake_neighbors(&self) -> bool {
        self.fake_neighbor_distance > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = SculptSettings::default();
        assert_eq!(settings.symmetry, DEFAULT_SYMMETRY);
        assert_eq!(settings.radial_symmetry, DEFAULT_RADIAL_SYMMETRY);
        assert!(settings.mirrors(0));
        assert!(!settings.mirrors(1));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = SculptSettings::from_json_str(r#"{ "symmetry": 5 }"#).unwrap();
        assert_eq!(settings.symmetry, SYMMETRY_X | SYMMETRY_Z);
        assert_eq!(settings.detail_size, DEFAULT_DETAIL_SIZE);
    }

    #[test]
    fn test_invalid_radial_rejected() {
        let result = SculptSettings::from_json_str(r#"{ "radial_symmetry": [0, 1, 1] }"#);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "radial_symmetry",
                ..
            })
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let mut settings = SculptSettings::without_symmetry();
        settings.lock = [true, false, false];
        let text = settings.to_json_string().unwrap();
        let parsed = SculptSettings::from_json_str(&text).unwrap();
        assert_eq!(parsed, settings);
    }
}
