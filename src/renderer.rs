//! Renderer collaborators for generated grid geometry
//!
//! The engine never draws. It hands path segments and a color to a
//! [`Renderer`]; this module ships three: an in-memory [`Overlay`] of named
//! layers, an SVG writer and a raster burner for PNG output.

use image::{Rgba, RgbaImage};
use std::convert::Infallible;
use std::fmt::Write as _;

use crate::color::GridColor;
use crate::geometry::PathSegment;
use crate::shapes::rasterize_segment;

/// Name of the overlay layer that holds the grid.
pub const GRID_LAYER: &str = "grid";

/// Receives generated geometry.
pub trait Renderer {
    type Error;

    fn render(&mut self, segments: &[PathSegment], color: GridColor) -> Result<(), Self::Error>;
}

/// A named set of segments drawn in one color.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub color: GridColor,
    pub segments: Vec<PathSegment>,
}

/// Ordered named layers over an image.
///
/// Rendering a grid replaces only the [`GRID_LAYER`] entry; every other
/// layer is left as it was.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    layers: Vec<Layer>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer, replacing any existing layer of the same name.
    pub fn add(&mut self, layer: Layer) {
        self.remove(&layer.name);
        self.layers.push(layer);
    }

    /// Remove a layer by name, returning it if present.
    pub fn remove(&mut self, name: &str) -> Option<Layer> {
        let index = self.layers.iter().position(|l| l.name == name)?;
        Some(self.layers.remove(index))
    }

    pub fn set_grid(&mut self, segments: Vec<PathSegment>, color: GridColor) {
        self.add(Layer { name: GRID_LAYER.to_string(), color, segments });
    }

    pub fn remove_grid(&mut self) -> Option<Layer> {
        self.remove(GRID_LAYER)
    }

    pub fn grid(&self) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == GRID_LAYER)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Replay every layer, in order, into another renderer.
    pub fn draw_into<R: Renderer>(&self, renderer: &mut R) -> Result<(), R::Error> {
        for layer in &self.layers {
            renderer.render(&layer.segments, layer.color)?;
        }
        Ok(())
    }
}

impl Renderer for Overlay {
    type Error = Infallible;

    fn render(&mut self, segments: &[PathSegment], color: GridColor) -> Result<(), Self::Error> {
        self.set_grid(segments.to_vec(), color);
        Ok(())
    }
}

/// Accumulates `<path>` elements for an SVG document.
#[derive(Debug, Clone)]
pub struct SvgRenderer {
    width: u32,
    height: u32,
    paths: Vec<String>,
}

impl SvgRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, paths: Vec::new() }
    }

    /// The complete SVG document.
    pub fn finish(&self) -> String {
        let mut svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n",
            w = self.width,
            h = self.height
        );
        for path in &self.paths {
            svg.push_str("  ");
            svg.push_str(path);
            svg.push('\n');
        }
        svg.push_str("</svg>\n");
        svg
    }
}

impl Renderer for SvgRenderer {
    type Error = Infallible;

    fn render(&mut self, segments: &[PathSegment], color: GridColor) -> Result<(), Self::Error> {
        if segments.is_empty() {
            return Ok(());
        }
        let mut d = String::new();
        for segment in segments {
            // Writing to a String cannot fail.
            let _ = match *segment {
                PathSegment::Line { from, to } => {
                    write!(d, "M{} {} L{} {} ", from.x, from.y, to.x, to.y)
                }
                PathSegment::Cubic { from, ctrl1, ctrl2, to } => write!(
                    d,
                    "M{} {} C{} {} {} {} {} {} ",
                    from.x, from.y, ctrl1.x, ctrl1.y, ctrl2.x, ctrl2.y, to.x, to.y
                ),
            };
        }
        self.paths.push(format!(
            "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1\"/>",
            d.trim_end(),
            color.css()
        ));
        Ok(())
    }
}

/// Burns segments into an RGBA image; pixels outside the image are dropped.
#[derive(Debug, Clone)]
pub struct RasterRenderer {
    image: RgbaImage,
}

impl RasterRenderer {
    /// Draw over an existing image.
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Draw onto a transparent canvas.
    pub fn blank(width: u32, height: u32) -> Self {
        Self { image: RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0])) }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

impl Renderer for RasterRenderer {
    type Error = Infallible;

    fn render(&mut self, segments: &[PathSegment], color: GridColor) -> Result<(), Self::Error> {
        let rgba = color.rgba();
        let (width, height) = self.image.dimensions();
        for segment in segments {
            for (x, y) in rasterize_segment(segment) {
                if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
                    self.image.put_pixel(x as u32, y as u32, rgba);
                }
            }
        }
        Ok(())
    }
}
