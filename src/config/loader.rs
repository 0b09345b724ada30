//! Configuration loading and discovery for `cgrid.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::CgridConfig;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::color::GridColor;
use crate::consistency::MismatchPolicy;
use crate::models::{GridType, PlacementMode, Ratio};
use crate::xml::SchemaVersion;

/// Name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "cgrid.toml";
/// Directory under the XDG config home holding the user-wide file.
pub const CONFIG_DIR_NAME: &str = "combined-grids";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse cgrid.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub grid_type: Option<GridType>,
    pub area_per_point: Option<f64>,
    pub ratio: Option<Ratio>,
    pub color: Option<GridColor>,
    pub placement: Option<PlacementMode>,
    pub pixel_width: Option<f64>,
    pub pixel_height: Option<f64>,
    pub unit: Option<String>,
    pub seed: Option<u64>,
    pub policy: Option<MismatchPolicy>,
    pub schema: Option<SchemaVersion>,
    pub history: Option<PathBuf>,
}

/// Find cgrid.toml by walking up from the current working directory.
///
/// Search order:
/// 1. Walk up from current directory looking for cgrid.toml
/// 2. Check XDG_CONFIG_HOME/combined-grids/cgrid.toml (or ~/.config/combined-grids/cgrid.toml)
pub fn find_config() -> Option<PathBuf> {
    if let Ok(cwd) = env::current_dir() {
        if let Some(path) = find_config_from(cwd) {
            return Some(path);
        }
    }

    find_xdg_config()
}

/// Find cgrid.toml in the XDG config directory.
pub fn find_xdg_config() -> Option<PathBuf> {
    let xdg_config = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
        .ok()?;

    let config_path = xdg_config.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
    if config_path.exists() {
        Some(config_path)
    } else {
        None
    }
}

/// Find cgrid.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from a cgrid.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses
/// [`find_config`] to locate one. With no file at all the defaults apply.
///
/// # Example
/// ```ignore
/// let config = load_config(None)?;
/// let config = load_config(Some(Path::new("lab/cgrid.toml")))?;
/// ```
pub fn load_config(path: Option<&Path>) -> Result<CgridConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => {
            log::debug!("loading config from {}", p.display());
            load_config_file(&p)
        }
        None => Ok(default_config()),
    }
}

fn load_config_file(path: &Path) -> Result<CgridConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let mut config: CgridConfig = toml::from_str(&contents)?;
    check(&config)?;

    // A relative history path is relative to the config file.
    if let Some(root) = path.parent() {
        config.output.history = config.output.history.take().map(|h| resolve_path(root, &h));
    }
    Ok(config)
}

fn check(config: &CgridConfig) -> Result<(), ConfigError> {
    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }
    Ok(())
}

/// Configuration used when no cgrid.toml is found.
pub fn default_config() -> CgridConfig {
    CgridConfig::default()
}

/// Merge CLI overrides into a configuration and re-validate it.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(
    config: &mut CgridConfig,
    overrides: &CliOverrides,
) -> Result<(), ConfigError> {
    if let Some(grid_type) = overrides.grid_type {
        config.grid.grid_type = grid_type;
    }
    if let Some(area) = overrides.area_per_point {
        config.grid.area_per_point = Some(area);
    }
    if let Some(ratio) = overrides.ratio {
        config.grid.ratio = ratio;
    }
    if let Some(color) = overrides.color {
        config.grid.color = color;
    }
    if let Some(placement) = overrides.placement {
        config.grid.placement = placement;
    }

    if let Some(width) = overrides.pixel_width {
        config.calibration.pixel_width = width;
    }
    if let Some(height) = overrides.pixel_height {
        config.calibration.pixel_height = height;
    }
    if let Some(ref unit) = overrides.unit {
        config.calibration.unit = unit.clone();
    }

    if let Some(seed) = overrides.seed {
        config.random.seed = Some(seed);
    }
    if let Some(policy) = overrides.policy {
        config.consistency.policy = policy;
    }
    if let Some(schema) = overrides.schema {
        config.output.schema = schema;
    }
    if let Some(ref history) = overrides.history {
        config.output.history = Some(history.clone());
    }

    check(config)
}

/// Resolve a path relative to the directory holding the config file.
pub fn resolve_path(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let config_path = dir.join(CONFIG_FILE_NAME);
        File::create(&config_path)
            .expect("should create config file")
            .write_all(contents.as_bytes())
            .expect("should write config content");
        config_path
    }

    #[test]
    fn test_find_config_in_current_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "[grid]\ntype = \"lines\"");

        let found = find_config_from(temp.path().to_path_buf());
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_in_parent_dir() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "");

        let subdir = temp.path().join("slides").join("2024");
        fs::create_dir_all(&subdir).expect("should create subdirectories");

        let found = find_config_from(subdir);
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_not_found() {
        let temp = TempDir::new().expect("should create temp dir");
        assert_eq!(find_config_from(temp.path().to_path_buf()), None);
    }

    #[test]
    #[serial]
    fn test_find_xdg_config() {
        let temp = TempDir::new().expect("should create temp dir");
        let dir = temp.path().join(CONFIG_DIR_NAME);
        fs::create_dir_all(&dir).expect("should create config dir");
        let config_path = write_config(&dir, "");

        let previous = env::var_os("XDG_CONFIG_HOME");
        env::set_var("XDG_CONFIG_HOME", temp.path());
        let found = find_xdg_config();
        match previous {
            Some(value) => env::set_var("XDG_CONFIG_HOME", value),
            None => env::remove_var("XDG_CONFIG_HOME"),
        }

        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_load_config_from_file() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(
            temp.path(),
            r#"
[grid]
type = "crosses"
area_per_point = 400.0

[calibration]
pixel_width = 0.5
pixel_height = 0.5
unit = "um"

[output]
history = "history.tsv"
"#,
        );

        let config = load_config(Some(&config_path)).expect("should load valid config");
        assert_eq!(config.grid.grid_type, GridType::Crosses);
        assert_eq!(config.grid.area_per_point, Some(400.0));
        assert_eq!(config.calibration.unit, "um");
        assert_eq!(config.output.history, Some(temp.path().join("history.tsv")));
    }

    #[test]
    fn test_load_config_missing_file_errors() {
        let temp = TempDir::new().expect("should create temp dir");
        let result = load_config(Some(&temp.path().join("nonexistent.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path = write_config(temp.path(), "this is not valid toml {{{");
        assert!(matches!(load_config(Some(&config_path)), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_validation_error() {
        let temp = TempDir::new().expect("should create temp dir");
        let config_path =
            write_config(temp.path(), "[calibration]\npixel_width = 0.0\npixel_height = -2.0\n");

        match load_config(Some(&config_path)) {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_cli_overrides_grid() {
        let mut config = default_config();
        let overrides = CliOverrides {
            grid_type: Some(GridType::Points),
            area_per_point: Some(64.0),
            ratio: Some(Ratio::OneToThirtySix),
            color: Some(GridColor::Yellow),
            placement: Some(PlacementMode::Manual),
            ..Default::default()
        };

        merge_cli_overrides(&mut config, &overrides).expect("overrides are valid");
        assert_eq!(config.grid.grid_type, GridType::Points);
        assert_eq!(config.grid.area_per_point, Some(64.0));
        assert_eq!(config.grid.ratio, Ratio::OneToThirtySix);
        assert_eq!(config.grid.color, GridColor::Yellow);
        assert_eq!(config.grid.placement, PlacementMode::Manual);
    }

    #[test]
    fn test_merge_cli_overrides_keep_unset_values() {
        let mut config = default_config();
        config.random.seed = Some(9);
        config.calibration.unit = "mm".to_string();
        let overrides = CliOverrides { schema: Some(SchemaVersion::V1), ..Default::default() };

        merge_cli_overrides(&mut config, &overrides).expect("overrides are valid");
        assert_eq!(config.output.schema, SchemaVersion::V1);
        assert_eq!(config.random.seed, Some(9));
        assert_eq!(config.calibration.unit, "mm");
    }

    #[test]
    fn test_merge_cli_overrides_revalidates() {
        let mut config = default_config();
        let overrides = CliOverrides { pixel_width: Some(-1.0), ..Default::default() };
        assert!(matches!(
            merge_cli_overrides(&mut config, &overrides),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_resolve_path() {
        let root = Path::new("/lab");
        assert_eq!(resolve_path(root, Path::new("/var/h.tsv")), PathBuf::from("/var/h.tsv"));
        assert_eq!(resolve_path(root, Path::new("h.tsv")), PathBuf::from("/lab/h.tsv"));
    }
}
