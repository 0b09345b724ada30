//! Configuration schema types for `cgrid.toml`
//!
//! Every section is optional; missing values fall back to the documented
//! initial grid (Combined Point, 1:4, blue, random offset, uncalibrated).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::color::GridColor;
use crate::consistency::MismatchPolicy;
use crate::models::{Calibration, GridDefinition, GridType, PlacementMode, Ratio};
use crate::xml::SchemaVersion;

/// Points across the image used when no area per point is configured (9x9).
pub const DEFAULT_POINT_COUNT: f64 = 81.0;

/// `[grid]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(rename = "type", default)]
    pub grid_type: GridType,
    /// Physical area per fine node; `None` means image area / 81
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_per_point: Option<f64>,
    #[serde(default)]
    pub ratio: Ratio,
    #[serde(default)]
    pub color: GridColor,
    #[serde(default)]
    pub placement: PlacementMode,
}

/// `[calibration]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default = "default_pixel_size")]
    pub pixel_width: f64,
    #[serde(default = "default_pixel_size")]
    pub pixel_height: f64,
    #[serde(default = "default_unit")]
    pub unit: String,
}

fn default_pixel_size() -> f64 {
    1.0
}

fn default_unit() -> String {
    "pixels".to_string()
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            pixel_width: default_pixel_size(),
            pixel_height: default_pixel_size(),
            unit: default_unit(),
        }
    }
}

impl CalibrationConfig {
    pub fn to_calibration(&self) -> Calibration {
        Calibration::new(self.pixel_width, self.pixel_height, self.unit.clone())
    }
}

/// `[random]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RandomConfig {
    /// Seed for random placement; unseeded runs draw from the OS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// `[consistency]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyConfig {
    #[serde(default)]
    pub policy: MismatchPolicy,
}

/// `[output]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Document layout written by `apply --xml` and `history export`
    #[serde(default)]
    pub schema: SchemaVersion,
    /// History file appended to on every apply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<PathBuf>,
}

/// Complete cgrid.toml configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CgridConfig {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub random: RandomConfig,
    #[serde(default)]
    pub consistency: ConsistencyConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "calibration.pixel_width")
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cgrid.toml: '{}' {}", self.field, self.message)
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

impl CgridConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut reject = |field: &str, message: &str| {
            errors.push(ConfigValidationError {
                field: field.to_string(),
                message: message.to_string(),
            })
        };

        if let Some(area) = self.grid.area_per_point {
            if !positive(area) {
                reject("grid.area_per_point", "must be a positive number");
            }
        }
        if !positive(self.calibration.pixel_width) {
            reject("calibration.pixel_width", "must be a positive number");
        }
        if !positive(self.calibration.pixel_height) {
            reject("calibration.pixel_height", "must be a positive number");
        }
        if self.calibration.unit.trim().is_empty() {
            reject("calibration.unit", "must be a non-empty string");
        }

        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Area per point to use on an image of the given physical area.
    pub fn effective_area_per_point(&self, image_area: f64) -> f64 {
        self.grid.area_per_point.unwrap_or(image_area / DEFAULT_POINT_COUNT)
    }

    /// Grid definition described by the `[grid]` section.
    pub fn definition(&self, image_area: f64) -> GridDefinition {
        GridDefinition::new(self.grid.grid_type, self.effective_area_per_point(image_area))
            .with_ratio(self.grid.ratio)
            .with_color(self.grid.color)
            .with_placement(self.grid.placement)
    }
}
