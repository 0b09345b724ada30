//! Apply command: resolve, render and record a grid

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::process::ExitCode;

use crate::batch::{apply_to_slices, SliceGrid};
use crate::config::CgridConfig;
use crate::history::{append_to_file, timestamp_now};
use crate::models::{GridRecord, ImageInfo, ImageSource, Offset, Slice};
use crate::output::{document_file_name, save_png, slice_output_path, write_text};
use crate::renderer::{RasterRenderer, Renderer, SvgRenderer};
use crate::xml;

use super::{open_image, CalibrationArgs, GridArgs, RenderArgs, EXIT_ERROR, EXIT_SUCCESS};

/// Execute the apply command
pub fn run_apply(
    config: &CgridConfig,
    image_path: &Path,
    grid: &GridArgs,
    calibration: &CalibrationArgs,
    render: &RenderArgs,
    slices: Option<u32>,
    xml_out: Option<&Path>,
) -> ExitCode {
    let info = match open_image(
        image_path,
        config.calibration.to_calibration(),
        calibration.title.as_deref(),
    ) {
        Ok(info) => info,
        Err(code) => return code,
    };

    let mut def = config.definition(info.physical_area());
    if grid.has_manual_origin() {
        def = def.with_manual_origin(
            Offset::new(grid.xstart.unwrap_or(0), grid.ystart.unwrap_or(0)),
            Offset::new(grid.xstart_coarse.unwrap_or(0), grid.ystart_coarse.unwrap_or(0)),
        );
    }

    let mut rng = match config.random.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let slice_list: Vec<Slice> = match slices {
        Some(n) => (1..=n).map(Slice::Index).collect(),
        None => Vec::new(),
    };

    let grids = match apply_to_slices(&def, &slice_list, &info, &mut rng) {
        Ok(grids) => grids,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let timestamp = timestamp_now();
    let records: Vec<GridRecord> =
        grids.iter().map(|g| g.record(&timestamp, info.title())).collect();

    if let Err(code) = finish(config, image_path, &info, &grids, &records, render) {
        return code;
    }

    if let Some(path) = xml_out {
        let path = if path.is_dir() {
            path.join(document_file_name(info.title()))
        } else {
            path.to_path_buf()
        };
        let document = match xml::encode(&records, config.output.schema) {
            Ok(document) => document,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        };
        if let Err(e) = write_text(&path, &document) {
            eprintln!("Error: Failed to save '{}': {}", path.display(), e);
            return ExitCode::from(EXIT_ERROR);
        }
        println!("Saved: {}", path.display());
    }

    ExitCode::from(EXIT_SUCCESS)
}

/// Render outputs, append history and print the applied grids.
///
/// Shared by `apply` and `load`.
pub(super) fn finish(
    config: &CgridConfig,
    image_path: &Path,
    info: &ImageInfo,
    grids: &[SliceGrid],
    records: &[GridRecord],
    render: &RenderArgs,
) -> Result<(), ExitCode> {
    let single = grids.len() == 1;

    if let Some(svg_path) = &render.svg {
        for grid in grids {
            let mut svg = SvgRenderer::new(info.width(), info.height());
            svg.render(&grid.segments, grid.resolved.color()).unwrap_or_else(|never| match never {});
            let path = slice_output_path(svg_path, grid.slice, single);
            if let Err(e) = write_text(&path, &svg.finish()) {
                eprintln!("Error: Failed to save '{}': {}", path.display(), e);
                return Err(ExitCode::from(EXIT_ERROR));
            }
            println!("Saved: {}", path.display());
        }
    }

    if let Some(png_path) = &render.png {
        let base = match image::open(image_path) {
            Ok(image) => image.to_rgba8(),
            Err(e) => {
                eprintln!("Error: Cannot decode image '{}': {}", image_path.display(), e);
                return Err(ExitCode::from(EXIT_ERROR));
            }
        };
        for grid in grids {
            let mut raster = RasterRenderer::new(base.clone());
            raster
                .render(&grid.segments, grid.resolved.color())
                .unwrap_or_else(|never| match never {});
            let path = slice_output_path(png_path, grid.slice, single);
            if let Err(e) = save_png(raster.image(), &path) {
                eprintln!("Error: Failed to save '{}': {}", path.display(), e);
                return Err(ExitCode::from(EXIT_ERROR));
            }
            println!("Saved: {}", path.display());
        }
    }

    if let Some(history_path) = &config.output.history {
        if let Err(e) = append_to_file(history_path, records) {
            eprintln!("Error: Failed to append history '{}': {}", history_path.display(), e);
            return Err(ExitCode::from(EXIT_ERROR));
        }
    }

    if render.json {
        match serde_json::to_string_pretty(records) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                return Err(ExitCode::from(EXIT_ERROR));
            }
        }
    } else {
        for grid in grids {
            print_summary(grid);
        }
    }
    Ok(())
}

fn print_summary(grid: &SliceGrid) {
    let resolved = &grid.resolved;
    let origin = resolved.origin();
    let coarse = resolved.coarse_origin();
    println!(
        "slice {}: {} ({}), tile {:.2} x {:.2} px, {} x {} nodes, origin ({}, {}), coarse ({}, {}), {} segments",
        grid.slice,
        resolved.grid_type(),
        resolved.definition().placement,
        resolved.tile_width(),
        resolved.tile_height(),
        resolved.lines_v(),
        resolved.lines_h(),
        origin.x,
        origin.y,
        coarse.x,
        coarse.y,
        grid.segments.len()
    );
}
