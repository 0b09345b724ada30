//! Parameter resolution: from a [`GridDefinition`] to a concrete [`ResolvedGrid`]
//!
//! Resolution validates the definition against the image size and
//! calibration, derives the tile size from the area per point, and picks the
//! grid origin according to the placement mode. Randomness always comes from
//! a caller-supplied [`RandomSource`], so the same seed reproduces the same
//! grid.

use log::debug;
use std::fmt;
use thiserror::Error;

use crate::models::{
    Calibration, CoarseRatio, GridDefinition, GridRecord, GridType, ImageSource, Offset,
    PlacementMode, ResolvedGrid,
};

/// Divisor applied to the pixel count of the image to get the base area floor.
pub const MIN_AREA_DIVISOR: f64 = 50_000.0;

/// A single rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldIssue {
    #[error("\"{0}\" too small")]
    FieldTooSmall(&'static str),
    #[error("\"{0}\" out of range")]
    FieldOutOfRange(&'static str),
}

/// All field problems found while resolving one definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    issues: Vec<FieldIssue>,
}

impl ValidationError {
    fn new(issues: Vec<FieldIssue>) -> Self {
        debug_assert!(!issues.is_empty());
        Self { issues }
    }

    pub fn issues(&self) -> &[FieldIssue] {
        &self.issues
    }

    pub fn contains(&self, issue: &FieldIssue) -> bool {
        self.issues.contains(issue)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.issues.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// Source of uniform draws for random placement.
pub trait RandomSource {
    /// Uniform draw from `[0, 1)`.
    fn next_unit(&mut self) -> f64;
    /// Uniform draw from `0..bound`; `bound` is never zero.
    fn next_below(&mut self, bound: u32) -> u32;
}

impl<R: rand::Rng + ?Sized> RandomSource for R {
    fn next_unit(&mut self) -> f64 {
        self.gen::<f64>()
    }

    fn next_below(&mut self, bound: u32) -> u32 {
        self.gen_range(0..bound)
    }
}

/// Smallest allowed pixel area per point for a grid type on an image.
///
/// ```
/// use combined_grids::models::GridType;
/// use combined_grids::resolve::min_area;
///
/// assert_eq!(min_area(GridType::Crosses, 300, 300), 144.0);
/// assert_eq!(min_area(GridType::Lines, 5000, 5000), 500.0);
/// ```
pub fn min_area(grid_type: GridType, image_width: u32, image_height: u32) -> f64 {
    let base = f64::from(image_width) * f64::from(image_height) / MIN_AREA_DIVISOR;
    base.max(grid_type.min_area_floor())
}

/// Number of fine nodes that fit along an axis starting at `origin`.
///
/// ```
/// use combined_grids::resolve::node_count;
///
/// assert_eq!(node_count(300, 5, 10.0), 30);
/// assert_eq!(node_count(100, 0, 25.0), 5);
/// ```
pub fn node_count(extent: u32, origin: u32, tile: f64) -> u32 {
    let n = ((f64::from(extent) - f64::from(origin)) / tile).floor() + 1.0;
    if n <= 0.0 {
        0
    } else {
        n as u32
    }
}

/// Resolve a definition against an image.
///
/// Field problems are collected and reported together.
pub fn resolve<R: RandomSource + ?Sized>(
    def: &GridDefinition,
    image_width: u32,
    image_height: u32,
    calibration: &Calibration,
    rng: &mut R,
) -> Result<ResolvedGrid, ValidationError> {
    let mut issues = Vec::new();

    if !calibration.is_valid() {
        issues.push(FieldIssue::FieldOutOfRange("calibration"));
        return Err(ValidationError::new(issues));
    }

    let floor = min_area(def.grid_type, image_width, image_height);
    let area_ok = !def.area_per_point.is_nan()
        && def.area_per_point / calibration.pixel_area() >= floor;
    if !area_ok {
        issues.push(FieldIssue::FieldTooSmall("areaPerPoint"));
    }

    let coarse_ratio = def.ratio.coarse_ratio();
    let (tile_width, tile_height) = tile_size(def.area_per_point, calibration);

    let (origin, coarse_origin) = match def.placement {
        PlacementMode::Random => {
            let origin = Offset::new(
                (rng.next_unit() * tile_width) as u32,
                (rng.next_unit() * tile_height) as u32,
            );
            let coarse =
                Offset::new(rng.next_below(coarse_ratio.x), rng.next_below(coarse_ratio.y));
            (origin, coarse)
        }
        PlacementMode::Fixed => {
            let origin = Offset::new(fixed_offset(tile_width), fixed_offset(tile_height));
            (origin, Offset::default())
        }
        PlacementMode::Manual => {
            let mut origin = def.origin;
            if def.grid_type == GridType::HorizontalLines {
                origin.x = 0;
            }
            // Tile sizes are meaningless when the area was rejected.
            let (limit_x, limit_y) =
                if area_ok { (tile_width, tile_height) } else { (f64::INFINITY, f64::INFINITY) };
            check_origins(
                def.grid_type,
                origin,
                def.coarse_origin,
                limit_x,
                limit_y,
                coarse_ratio,
                &mut issues,
            );
            (origin, def.coarse_origin)
        }
    };

    if !issues.is_empty() {
        debug!("rejected {} definition: {:?}", def.grid_type, issues);
        return Err(ValidationError::new(issues));
    }

    let mut definition = def.clone();
    definition.origin = origin;
    definition.coarse_origin = coarse_origin;
    Ok(assemble(definition, calibration, image_width, image_height))
}

/// Rebuild the grid a record describes on the image supplied by `source`.
///
/// The recorded origins and placement mode are used verbatim and the area
/// floor is not applied again, so a grid saved on one image can be laid over
/// any other. Calibration comes from the target image, never from the record;
/// the origins must still fall inside the tile it produces.
pub fn replay<S: ImageSource + ?Sized>(
    record: &GridRecord,
    source: &S,
) -> Result<ResolvedGrid, ValidationError> {
    let calibration = source.calibration();
    let mut issues = Vec::new();

    if !calibration.is_valid() {
        issues.push(FieldIssue::FieldOutOfRange("calibration"));
        return Err(ValidationError::new(issues));
    }
    if !(record.area_per_point > 0.0 && record.area_per_point.is_finite()) {
        issues.push(FieldIssue::FieldTooSmall("areaPerPoint"));
        return Err(ValidationError::new(issues));
    }

    let (tile_width, tile_height) = tile_size(record.area_per_point, &calibration);
    check_origins(
        record.grid_type,
        record.origin,
        record.coarse_origin,
        tile_width,
        tile_height,
        record.ratio.coarse_ratio(),
        &mut issues,
    );
    if !issues.is_empty() {
        debug!("rejected replay of {} record: {:?}", record.grid_type, issues);
        return Err(ValidationError::new(issues));
    }

    Ok(assemble(record.definition(), &calibration, source.width(), source.height()))
}

/// Tile size in pixels for a physical area per point.
fn tile_size(area_per_point: f64, calibration: &Calibration) -> (f64, f64) {
    let side = area_per_point.sqrt();
    (side / calibration.pixel_width, side / calibration.pixel_height)
}

/// Centre of a tile rounded to a pixel, kept strictly inside the tile.
fn fixed_offset(tile: f64) -> u32 {
    let centre = (tile / 2.0 + 0.5) as u32;
    let last = (tile.ceil() as u32).saturating_sub(1);
    centre.min(last)
}

fn check_origins(
    grid_type: GridType,
    origin: Offset,
    coarse_origin: Offset,
    tile_width: f64,
    tile_height: f64,
    coarse_ratio: CoarseRatio,
    issues: &mut Vec<FieldIssue>,
) {
    if f64::from(origin.x) >= tile_width || f64::from(origin.y) >= tile_height {
        issues.push(FieldIssue::FieldOutOfRange("origin"));
    }
    if grid_type.has_coarse_grid()
        && (coarse_origin.x >= coarse_ratio.x || coarse_origin.y >= coarse_ratio.y)
    {
        issues.push(FieldIssue::FieldOutOfRange("coarseOrigin"));
    }
}

/// Build the resolved grid for a definition whose origins are final.
fn assemble(
    definition: GridDefinition,
    calibration: &Calibration,
    image_width: u32,
    image_height: u32,
) -> ResolvedGrid {
    let (tile_width, tile_height) = tile_size(definition.area_per_point, calibration);
    let origin = definition.origin;
    let lines_v = node_count(image_width, origin.x, tile_width);
    let lines_h = node_count(image_height, origin.y, tile_height);
    let coarse_ratio = definition.ratio.coarse_ratio();

    let grid = ResolvedGrid {
        definition,
        unit: calibration.unit.clone(),
        tile_width,
        tile_height,
        lines_v,
        lines_h,
        coarse_ratio,
    };
    debug_assert!(invariants_hold(&grid), "resolved grid breaks its invariants: {:?}", grid);
    debug!(
        "resolved {} grid: tile {:.3}x{:.3}px, origin ({}, {}), {}x{} nodes",
        grid.grid_type(),
        tile_width,
        tile_height,
        origin.x,
        origin.y,
        lines_v,
        lines_h
    );
    grid
}

fn invariants_hold(grid: &ResolvedGrid) -> bool {
    let origin = grid.origin();
    let coarse = grid.coarse_origin();
    let CoarseRatio { x: rx, y: ry } = grid.coarse_ratio();
    let coarse_ok = !grid.grid_type().has_coarse_grid() || (coarse.x < rx && coarse.y < ry);
    grid.tile_width > 0.0
        && grid.tile_height > 0.0
        && f64::from(origin.x) < grid.tile_width
        && f64::from(origin.y) < grid.tile_height
        && coarse_ok
}
