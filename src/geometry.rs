//! Vector geometry for the six grid types
//!
//! [`generate`] turns a [`ResolvedGrid`] into path segments in image pixel
//! coordinates. Marker sizes are fixed design constants; changing any of them
//! changes how previously saved grids look when reapplied.

use serde::{Deserialize, Serialize};

use crate::models::{GridType, ResolvedGrid};

/// Half length of a fine-node cross.
pub const CROSS_ARM: f64 = 5.0;
/// Near and far offsets of the corner ticks drawn for `Points`.
pub const POINT_TICK_NEAR: f64 = 1.0;
pub const POINT_TICK_FAR: f64 = 2.0;
/// Half size of the square tick ring around a coarse combined point.
pub const COARSE_POINT_SIZE: f64 = 10.0;
pub const COARSE_POINT_ARM: f64 = COARSE_POINT_SIZE / 2.0;
/// Radius of the coarse-node arc on a double lattice.
pub const LATTICE_RADIUS: f64 = 14.0;
/// Control-point distance for a quarter circle of unit radius.
pub const KAPPA: f64 = 0.5522847498;

/// A position in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// One drawable piece of a grid path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PathSegment {
    Line { from: Point, to: Point },
    Cubic { from: Point, ctrl1: Point, ctrl2: Point, to: Point },
}

impl PathSegment {
    pub fn line(from: Point, to: Point) -> Self {
        PathSegment::Line { from, to }
    }

    pub fn start(&self) -> Point {
        match *self {
            PathSegment::Line { from, .. } | PathSegment::Cubic { from, .. } => from,
        }
    }

    pub fn end(&self) -> Point {
        match *self {
            PathSegment::Line { to, .. } | PathSegment::Cubic { to, .. } => to,
        }
    }
}

/// Generate the path segments for a resolved grid on an image of the given size.
///
/// The result depends only on the arguments, so calling it again yields the
/// same sequence.
pub fn generate(grid: &ResolvedGrid, image_width: u32, image_height: u32) -> Vec<PathSegment> {
    let mut path = Vec::new();
    let width = f64::from(image_width);
    let height = f64::from(image_height);

    match grid.grid_type() {
        GridType::Lines => {
            vertical_lines(grid, height, &mut path);
            horizontal_lines(grid, width, &mut path);
        }
        GridType::HorizontalLines => horizontal_lines(grid, width, &mut path),
        GridType::Crosses => {
            for_each_node(grid, |_, _, center| cross(center, &mut path));
        }
        GridType::Points => {
            for_each_node(grid, |_, _, center| corner_ticks(center, &mut path));
        }
        GridType::CombinedPoint => {
            for_each_node(grid, |h, v, center| {
                cross(center, &mut path);
                if grid.is_coarse_node(h, v) {
                    coarse_ring(coarse_center(grid, center), &mut path);
                }
            });
        }
        GridType::DoubleLattice => {
            vertical_lines(grid, height, &mut path);
            horizontal_lines(grid, width, &mut path);
            for_each_node(grid, |h, v, center| {
                if grid.is_coarse_node(h, v) {
                    lattice_arc(coarse_center(grid, center), &mut path);
                }
            });
        }
    }

    path
}

/// Centers of every coarse marker, in drawing order.
pub fn coarse_centers(grid: &ResolvedGrid) -> Vec<Point> {
    let mut centers = Vec::new();
    if grid.grid_type().has_coarse_grid() {
        for_each_node(grid, |h, v, center| {
            if grid.is_coarse_node(h, v) {
                centers.push(coarse_center(grid, center));
            }
        });
    }
    centers
}

/// Visit fine nodes column by column.
fn for_each_node(grid: &ResolvedGrid, mut visit: impl FnMut(u32, u32, Point)) {
    let origin = grid.origin();
    for h in 0..grid.lines_v() {
        for v in 0..grid.lines_h() {
            let x = f64::from(origin.x) + f64::from(h) * grid.tile_width();
            let y = f64::from(origin.y) + f64::from(v) * grid.tile_height();
            visit(h, v, Point::new(x, y));
        }
    }
}

fn coarse_center(grid: &ResolvedGrid, node: Point) -> Point {
    let coarse = grid.coarse_origin();
    node.offset(
        f64::from(coarse.x) * grid.tile_width(),
        f64::from(coarse.y) * grid.tile_height(),
    )
}

fn vertical_lines(grid: &ResolvedGrid, height: f64, path: &mut Vec<PathSegment>) {
    for i in 0..grid.lines_v() {
        let x = f64::from(grid.origin().x) + f64::from(i) * grid.tile_width();
        path.push(PathSegment::line(Point::new(x, 0.0), Point::new(x, height)));
    }
}

fn horizontal_lines(grid: &ResolvedGrid, width: f64, path: &mut Vec<PathSegment>) {
    for i in 0..grid.lines_h() {
        let y = f64::from(grid.origin().y) + f64::from(i) * grid.tile_height();
        path.push(PathSegment::line(Point::new(0.0, y), Point::new(width, y)));
    }
}

fn cross(c: Point, path: &mut Vec<PathSegment>) {
    path.push(PathSegment::line(c.offset(-CROSS_ARM, 0.0), c.offset(CROSS_ARM, 0.0)));
    path.push(PathSegment::line(c.offset(0.0, -CROSS_ARM), c.offset(0.0, CROSS_ARM)));
}

fn corner_ticks(c: Point, path: &mut Vec<PathSegment>) {
    let (near, far) = (POINT_TICK_NEAR, POINT_TICK_FAR);
    path.push(PathSegment::line(c.offset(-far, -near), c.offset(-far, near)));
    path.push(PathSegment::line(c.offset(far, -near), c.offset(far, near)));
    path.push(PathSegment::line(c.offset(-near, -far), c.offset(near, -far)));
    path.push(PathSegment::line(c.offset(-near, far), c.offset(near, far)));
}

// The right and top ticks are half length; saved grids were drawn that way.
fn coarse_ring(c: Point, path: &mut Vec<PathSegment>) {
    let (size, arm) = (COARSE_POINT_SIZE, COARSE_POINT_ARM);
    path.push(PathSegment::line(c.offset(-size, -arm), c.offset(-size, arm)));
    path.push(PathSegment::line(c.offset(size, 0.0), c.offset(size, arm)));
    path.push(PathSegment::line(c.offset(-arm, -size), c.offset(0.0, -size)));
    path.push(PathSegment::line(c.offset(-arm, size), c.offset(arm, size)));
}

/// Three quarter-circle cubics from the top, counter-clockwise to the right.
fn lattice_arc(c: Point, path: &mut Vec<PathSegment>) {
    let r = LATTICE_RADIUS;
    let k = LATTICE_RADIUS * KAPPA;
    path.push(PathSegment::Cubic {
        from: c.offset(0.0, -r),
        ctrl1: c.offset(-k, -r),
        ctrl2: c.offset(-r, -k),
        to: c.offset(-r, 0.0),
    });
    path.push(PathSegment::Cubic {
        from: c.offset(-r, 0.0),
        ctrl1: c.offset(-r, k),
        ctrl2: c.offset(-k, r),
        to: c.offset(0.0, r),
    });
    path.push(PathSegment::Cubic {
        from: c.offset(0.0, r),
        ctrl1: c.offset(k, r),
        ctrl2: c.offset(r, k),
        to: c.offset(r, 0.0),
    });
}
