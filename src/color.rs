//! Display colors for grid overlays
//!
//! The engine treats a grid's color as an opaque tag. Only renderers look at
//! the RGBA value behind it.

use image::Rgba;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::UnknownName;

/// One of the nine named overlay colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GridColor {
    Red,
    Green,
    #[default]
    Blue,
    Magenta,
    Cyan,
    Yellow,
    Orange,
    Black,
    White,
}

impl GridColor {
    /// All colors in the order they are offered to users.
    pub const ALL: [GridColor; 9] = [
        GridColor::Red,
        GridColor::Green,
        GridColor::Blue,
        GridColor::Magenta,
        GridColor::Cyan,
        GridColor::Yellow,
        GridColor::Orange,
        GridColor::Black,
        GridColor::White,
    ];

    /// Persisted name, e.g. `"Magenta"`.
    pub fn name(self) -> &'static str {
        match self {
            GridColor::Red => "Red",
            GridColor::Green => "Green",
            GridColor::Blue => "Blue",
            GridColor::Magenta => "Magenta",
            GridColor::Cyan => "Cyan",
            GridColor::Yellow => "Yellow",
            GridColor::Orange => "Orange",
            GridColor::Black => "Black",
            GridColor::White => "White",
        }
    }

    /// Opaque RGBA value used when burning the grid into a raster.
    ///
    /// ```
    /// use combined_grids::color::GridColor;
    ///
    /// assert_eq!(GridColor::Orange.rgba(), image::Rgba([255, 200, 0, 255]));
    /// ```
    pub fn rgba(self) -> Rgba<u8> {
        match self {
            GridColor::Red => Rgba([255, 0, 0, 255]),
            GridColor::Green => Rgba([0, 255, 0, 255]),
            GridColor::Blue => Rgba([0, 0, 255, 255]),
            GridColor::Magenta => Rgba([255, 0, 255, 255]),
            GridColor::Cyan => Rgba([0, 255, 255, 255]),
            GridColor::Yellow => Rgba([255, 255, 0, 255]),
            GridColor::Orange => Rgba([255, 200, 0, 255]),
            GridColor::Black => Rgba([0, 0, 0, 255]),
            GridColor::White => Rgba([255, 255, 255, 255]),
        }
    }

    /// CSS form for vector output, e.g. `rgb(255,0,255)`.
    pub fn css(self) -> String {
        let Rgba([r, g, b, _]) = self.rgba();
        format!("rgb({},{},{})", r, g, b)
    }
}

impl fmt::Display for GridColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GridColor {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        GridColor::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownName::new("color", s))
    }
}
