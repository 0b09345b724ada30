//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod apply;
mod history;
mod load;

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::color::GridColor;
use crate::config::{load_config, merge_cli_overrides, CgridConfig, CliOverrides};
use crate::consistency::MismatchPolicy;
use crate::models::{Calibration, GridType, ImageInfo, PlacementMode, Ratio};
use crate::xml::SchemaVersion;

pub use history::HistoryAction;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// cgrid - Calibrated stereology sampling grids
#[derive(Parser)]
#[command(name = "cgrid")]
#[command(about = "Overlay calibrated stereology sampling grids and replay them from saved documents")]
#[command(version)]
pub struct Cli {
    /// Path to cgrid.toml (default: discovered from the working directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Grid parameters; unset values come from cgrid.toml.
#[derive(Args, Debug, Clone, Default)]
pub struct GridArgs {
    /// Grid type (e.g. "combined-point", "double-lattice", "lines")
    #[arg(long = "type")]
    pub grid_type: Option<GridType>,

    /// Area per point in calibrated units squared (default: image area / 81)
    #[arg(long = "app")]
    pub area_per_point: Option<f64>,

    /// Fine to coarse ratio: 1:4, 1:9, 1:16, 1:25 or 1:36
    #[arg(long)]
    pub ratio: Option<Ratio>,

    /// Grid color name
    #[arg(long)]
    pub color: Option<GridColor>,

    /// Placement: random, fixed or manual
    #[arg(long)]
    pub placement: Option<PlacementMode>,

    /// Manual origin x in pixels (implies manual placement)
    #[arg(long)]
    pub xstart: Option<u32>,

    /// Manual origin y in pixels (implies manual placement)
    #[arg(long)]
    pub ystart: Option<u32>,

    /// Coarse node offset x (implies manual placement)
    #[arg(long)]
    pub xstart_coarse: Option<u32>,

    /// Coarse node offset y (implies manual placement)
    #[arg(long)]
    pub ystart_coarse: Option<u32>,
}

impl GridArgs {
    /// Whether any manual origin flag was given.
    pub fn has_manual_origin(&self) -> bool {
        self.xstart.is_some()
            || self.ystart.is_some()
            || self.xstart_coarse.is_some()
            || self.ystart_coarse.is_some()
    }
}

/// Image calibration; unset values come from cgrid.toml.
#[derive(Args, Debug, Clone, Default)]
pub struct CalibrationArgs {
    /// Pixel width in calibrated units
    #[arg(long)]
    pub pixel_width: Option<f64>,

    /// Pixel height in calibrated units
    #[arg(long)]
    pub pixel_height: Option<f64>,

    /// Calibration unit (e.g. "um")
    #[arg(long)]
    pub unit: Option<String>,

    /// Image title recorded with the grid (default: file name)
    #[arg(long)]
    pub title: Option<String>,
}

/// Rendered outputs.
#[derive(Args, Debug, Clone, Default)]
pub struct RenderArgs {
    /// Write the grid as SVG
    #[arg(long)]
    pub svg: Option<PathBuf>,

    /// Burn the grid into a copy of the image and save it as PNG
    #[arg(long)]
    pub png: Option<PathBuf>,

    /// Print applied grids as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a grid for an image and render it
    Apply {
        /// Image file (dimensions and title are read from it)
        image: PathBuf,

        #[command(flatten)]
        grid: GridArgs,

        #[command(flatten)]
        calibration: CalibrationArgs,

        #[command(flatten)]
        render: RenderArgs,

        /// Apply a separate grid to each of N slices
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        slices: Option<u32>,

        /// Seed for random placement
        #[arg(long)]
        seed: Option<u64>,

        /// Save the applied grids as an XML document (file or directory)
        #[arg(long)]
        xml: Option<PathBuf>,

        /// Document layout for --xml: 1 or 2
        #[arg(long)]
        schema: Option<SchemaVersion>,

        /// Append applied grids to this history file
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Reapply grids saved in an XML document to an image
    Load {
        /// Saved grid document
        document: PathBuf,

        /// Image file to apply the grids to
        image: PathBuf,

        /// Read a document that does not declare its layout as this version
        #[arg(long)]
        schema_version: Option<SchemaVersion>,

        /// Apply even if the document was saved for another image or unit
        #[arg(short, long)]
        yes: bool,

        /// What to do when the document does not match the image
        #[arg(long, value_enum)]
        policy: Option<MismatchPolicy>,

        #[command(flatten)]
        calibration: CalibrationArgs,

        #[command(flatten)]
        render: RenderArgs,

        /// Append applied grids to this history file
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Convert between history files and grid documents
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Apply {
            image,
            grid,
            calibration,
            render,
            slices,
            seed,
            xml,
            schema,
            history,
        } => {
            let overrides = CliOverrides {
                seed,
                schema,
                history,
                ..overrides_from(&grid, &calibration)
            };
            let config = match configure(config_path, &overrides) {
                Ok(config) => config,
                Err(code) => return code,
            };
            apply::run_apply(&config, &image, &grid, &calibration, &render, slices, xml.as_deref())
        }
        Commands::Load {
            document,
            image,
            schema_version,
            yes,
            policy,
            calibration,
            render,
            history,
        } => {
            let overrides = CliOverrides {
                policy,
                history,
                ..overrides_from(&GridArgs::default(), &calibration)
            };
            let config = match configure(config_path, &overrides) {
                Ok(config) => config,
                Err(code) => return code,
            };
            load::run_load(&config, &document, &image, schema_version, yes, &calibration, &render)
        }
        Commands::History { action } => {
            let config = match configure(config_path, &CliOverrides::default()) {
                Ok(config) => config,
                Err(code) => return code,
            };
            history::run_history(&config, action)
        }
    }
}

fn overrides_from(grid: &GridArgs, calibration: &CalibrationArgs) -> CliOverrides {
    CliOverrides {
        grid_type: grid.grid_type,
        area_per_point: grid.area_per_point,
        ratio: grid.ratio,
        color: grid.color,
        placement: grid.placement,
        pixel_width: calibration.pixel_width,
        pixel_height: calibration.pixel_height,
        unit: calibration.unit.clone(),
        ..Default::default()
    }
}

/// Load cgrid.toml and apply command-line overrides.
fn configure(path: Option<&Path>, overrides: &CliOverrides) -> Result<CgridConfig, ExitCode> {
    let mut config = load_config(path).map_err(|e| {
        eprintln!("Error: {}", e);
        ExitCode::from(EXIT_INVALID_ARGS)
    })?;
    merge_cli_overrides(&mut config, overrides).map_err(|e| {
        eprintln!("Error: {}", e);
        ExitCode::from(EXIT_INVALID_ARGS)
    })?;
    Ok(config)
}

/// Read image dimensions and attach the configured calibration.
fn open_image(
    path: &Path,
    calibration: Calibration,
    title: Option<&str>,
) -> Result<ImageInfo, ExitCode> {
    let mut info = ImageInfo::from_file(path, calibration).map_err(|e| {
        eprintln!("Error: Cannot read image '{}': {}", path.display(), e);
        ExitCode::from(EXIT_INVALID_ARGS)
    })?;
    if let Some(title) = title {
        info.title = title.to_string();
    }
    Ok(info)
}
