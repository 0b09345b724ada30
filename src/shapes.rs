//! Rasterization of grid path segments into integer pixel coordinates.
//!
//! Lines use Bresenham's algorithm; cubic segments are flattened into a fixed
//! number of straight pieces first.

use std::collections::HashSet;

use crate::geometry::{PathSegment, Point};

/// Number of straight pieces a cubic segment is split into.
pub const CUBIC_PIECES: usize = 16;

/// Rasterize a line using Bresenham's line algorithm.
///
/// Returns all pixels that form a line between two points.
///
/// # Examples
///
/// ```
/// use combined_grids::shapes::rasterize_line;
///
/// let pixels = rasterize_line((0, 0), (3, 3));
/// assert_eq!(pixels.len(), 4);
/// assert!(pixels.contains(&(0, 0)));
/// assert!(pixels.contains(&(3, 3)));
/// ```
pub fn rasterize_line(p0: (i32, i32), p1: (i32, i32)) -> HashSet<(i32, i32)> {
    let mut pixels = HashSet::new();

    let (mut x0, mut y0) = p0;
    let (x1, y1) = p1;

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        pixels.insert((x0, y0));

        if x0 == x1 && y0 == y1 {
            break;
        }

        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }

    pixels
}

/// Evaluate a cubic Bézier at `t` in `[0, 1]`.
pub fn cubic_point(from: Point, ctrl1: Point, ctrl2: Point, to: Point, t: f64) -> Point {
    let u = 1.0 - t;
    let a = u * u * u;
    let b = 3.0 * u * u * t;
    let c = 3.0 * u * t * t;
    let d = t * t * t;
    Point::new(
        a * from.x + b * ctrl1.x + c * ctrl2.x + d * to.x,
        a * from.y + b * ctrl1.y + c * ctrl2.y + d * to.y,
    )
}

/// Split a cubic into `pieces` chords; the result has `pieces + 1` points and
/// starts and ends exactly on the curve's endpoints.
pub fn flatten_cubic(from: Point, ctrl1: Point, ctrl2: Point, to: Point, pieces: usize) -> Vec<Point> {
    let pieces = pieces.max(1);
    let mut points = Vec::with_capacity(pieces + 1);
    points.push(from);
    for i in 1..pieces {
        let t = i as f64 / pieces as f64;
        points.push(cubic_point(from, ctrl1, ctrl2, to, t));
    }
    points.push(to);
    points
}

/// Rasterize one path segment. Coordinates are rounded to the nearest pixel.
///
/// ```
/// use combined_grids::geometry::{PathSegment, Point};
/// use combined_grids::shapes::rasterize_segment;
///
/// let seg = PathSegment::line(Point::new(0.0, 2.0), Point::new(4.0, 2.0));
/// assert_eq!(rasterize_segment(&seg).len(), 5);
/// ```
pub fn rasterize_segment(segment: &PathSegment) -> HashSet<(i32, i32)> {
    match *segment {
        PathSegment::Line { from, to } => rasterize_line(pixel(from), pixel(to)),
        PathSegment::Cubic { from, ctrl1, ctrl2, to } => {
            let points = flatten_cubic(from, ctrl1, ctrl2, to, CUBIC_PIECES);
            let mut pixels = HashSet::new();
            for pair in points.windows(2) {
                pixels.extend(rasterize_line(pixel(pair[0]), pixel(pair[1])));
            }
            pixels
        }
    }
}

fn pixel(p: Point) -> (i32, i32) {
    (p.x.round() as i32, p.y.round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rasterize_line_horizontal() {
        let pixels = rasterize_line((0, 0), (4, 0));
        assert_eq!(pixels.len(), 5);
        for x in 0..=4 {
            assert!(pixels.contains(&(x, 0)));
        }
    }

    #[test]
    fn test_rasterize_line_vertical() {
        let pixels = rasterize_line((2, 0), (2, 3));
        assert_eq!(pixels.len(), 4);
        for y in 0..=3 {
            assert!(pixels.contains(&(2, y)));
        }
    }

    #[test]
    fn test_rasterize_line_reverse() {
        assert_eq!(rasterize_line((3, 3), (0, 0)), rasterize_line((0, 0), (3, 3)));
    }

    #[test]
    fn test_rasterize_line_single_point() {
        let pixels = rasterize_line((5, 5), (5, 5));
        assert_eq!(pixels.len(), 1);
        assert!(pixels.contains(&(5, 5)));
    }

    #[test]
    fn test_cubic_endpoints_and_midpoint() {
        let from = Point::new(0.0, 0.0);
        let to = Point::new(30.0, 0.0);
        let c1 = Point::new(10.0, 0.0);
        let c2 = Point::new(20.0, 0.0);
        assert_eq!(cubic_point(from, c1, c2, to, 0.0), from);
        assert_eq!(cubic_point(from, c1, c2, to, 1.0), to);
        assert_eq!(cubic_point(from, c1, c2, to, 0.5), Point::new(15.0, 0.0));
    }

    #[test]
    fn test_flatten_cubic_piece_count() {
        let from = Point::new(0.0, -14.0);
        let to = Point::new(-14.0, 0.0);
        let points = flatten_cubic(from, Point::new(-7.7, -14.0), Point::new(-14.0, -7.7), to, 8);
        assert_eq!(points.len(), 9);
        assert_eq!(points[0], from);
        assert_eq!(points[8], to);
    }

    #[test]
    fn test_rasterize_quarter_arc_stays_near_radius() {
        let k = 14.0 * crate::geometry::KAPPA;
        let seg = PathSegment::Cubic {
            from: Point::new(0.0, -14.0),
            ctrl1: Point::new(-k, -14.0),
            ctrl2: Point::new(-14.0, -k),
            to: Point::new(-14.0, 0.0),
        };
        let pixels = rasterize_segment(&seg);
        assert!(pixels.contains(&(0, -14)));
        assert!(pixels.contains(&(-14, 0)));
        for (x, y) in pixels {
            let r = ((x * x + y * y) as f64).sqrt();
            assert!((r - 14.0).abs() < 1.5, "pixel ({}, {}) at radius {}", x, y, r);
        }
    }
}
