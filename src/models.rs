//! Data models for sampling grids (definitions, calibration, resolved grids, records)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::color::GridColor;

/// A persisted or user-supplied name did not match any known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownName {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownName {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self { kind, value: value.into() }
    }
}

/// The six supported grid layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GridType {
    Lines,
    HorizontalLines,
    Crosses,
    Points,
    #[default]
    CombinedPoint,
    DoubleLattice,
}

impl GridType {
    pub const ALL: [GridType; 6] = [
        GridType::CombinedPoint,
        GridType::DoubleLattice,
        GridType::Lines,
        GridType::HorizontalLines,
        GridType::Crosses,
        GridType::Points,
    ];

    /// Persisted name, e.g. `"Double Lattice"`.
    pub fn name(self) -> &'static str {
        match self {
            GridType::Lines => "Lines",
            GridType::HorizontalLines => "Horizontal Lines",
            GridType::Crosses => "Crosses",
            GridType::Points => "Points",
            GridType::CombinedPoint => "Combined Point",
            GridType::DoubleLattice => "Double Lattice",
        }
    }

    /// Whether this type marks a coarse sub-lattice.
    pub fn has_coarse_grid(self) -> bool {
        matches!(self, GridType::CombinedPoint | GridType::DoubleLattice)
    }

    /// Absolute lower bound on pixel area per point, `((half_extent + 1) * 2)^2`
    /// of the largest marker this type draws.
    pub fn min_area_floor(self) -> f64 {
        match self {
            GridType::Crosses => 144.0,
            GridType::CombinedPoint => 484.0,
            GridType::DoubleLattice => 900.0,
            GridType::Lines | GridType::HorizontalLines | GridType::Points => 16.0,
        }
    }
}

impl fmt::Display for GridType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GridType {
    type Err = UnknownName;

    /// Accepts the persisted name (`"Combined Point"`) or its kebab form
    /// (`"combined-point"`), ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', " ");
        GridType::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| UnknownName::new("grid type", s))
    }
}

/// Fine to coarse density ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum Ratio {
    #[default]
    OneToFour,
    OneToNine,
    OneToSixteen,
    OneToTwentyFive,
    OneToThirtySix,
}

impl Ratio {
    pub const ALL: [Ratio; 5] = [
        Ratio::OneToFour,
        Ratio::OneToNine,
        Ratio::OneToSixteen,
        Ratio::OneToTwentyFive,
        Ratio::OneToThirtySix,
    ];

    /// Fine nodes per coarse node along each axis.
    pub fn step(self) -> u32 {
        match self {
            Ratio::OneToFour => 2,
            Ratio::OneToNine => 3,
            Ratio::OneToSixteen => 4,
            Ratio::OneToTwentyFive => 5,
            Ratio::OneToThirtySix => 6,
        }
    }

    pub fn coarse_ratio(self) -> CoarseRatio {
        CoarseRatio { x: self.step(), y: self.step() }
    }

    pub fn label(self) -> &'static str {
        match self {
            Ratio::OneToFour => "1:4",
            Ratio::OneToNine => "1:9",
            Ratio::OneToSixteen => "1:16",
            Ratio::OneToTwentyFive => "1:25",
            Ratio::OneToThirtySix => "1:36",
        }
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Ratio {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ratio::ALL
            .into_iter()
            .find(|r| r.label() == trimmed)
            .ok_or_else(|| UnknownName::new("ratio", s))
    }
}

impl TryFrom<String> for Ratio {
    type Error = UnknownName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Ratio> for String {
    fn from(ratio: Ratio) -> Self {
        ratio.label().to_string()
    }
}

/// Integer pair `(n, n)` derived from a [`Ratio`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoarseRatio {
    pub x: u32,
    pub y: u32,
}

/// How the first fine node and the coarse offset are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PlacementMode {
    #[default]
    Random,
    Fixed,
    Manual,
}

impl PlacementMode {
    pub const ALL: [PlacementMode; 3] =
        [PlacementMode::Random, PlacementMode::Fixed, PlacementMode::Manual];

    /// Persisted name, e.g. `"Random Offset"`.
    pub fn name(self) -> &'static str {
        match self {
            PlacementMode::Random => "Random Offset",
            PlacementMode::Fixed => "Fixed Position",
            PlacementMode::Manual => "Manual Input",
        }
    }
}

impl fmt::Display for PlacementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PlacementMode {
    type Err = UnknownName;

    /// Accepts the persisted name or the short form (`random`, `fixed`, `manual`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        PlacementMode::ALL
            .into_iter()
            .find(|m| {
                m.name().eq_ignore_ascii_case(trimmed)
                    || m.name()
                        .split(' ')
                        .next()
                        .is_some_and(|short| short.eq_ignore_ascii_case(trimmed))
            })
            .ok_or_else(|| UnknownName::new("placement mode", s))
    }
}

/// Non-negative integer offset, used both for pixel origins and for node
/// offsets inside a coarse cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Offset {
    pub x: u32,
    pub y: u32,
}

impl Offset {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Which image slice a grid applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Slice {
    /// Applies to every slice; persisted as `"All"`.
    #[default]
    All,
    Index(u32),
}

impl Slice {
    pub const ALL_SENTINEL: &'static str = "All";

    /// `None` for [`Slice::All`].
    pub fn index(self) -> Option<u32> {
        match self {
            Slice::All => None,
            Slice::Index(i) => Some(i),
        }
    }
}

impl From<Option<u32>> for Slice {
    fn from(index: Option<u32>) -> Self {
        index.map_or(Slice::All, Slice::Index)
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slice::All => f.write_str(Self::ALL_SENTINEL),
            Slice::Index(i) => write!(f, "{}", i),
        }
    }
}

impl FromStr for Slice {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed == Self::ALL_SENTINEL {
            return Ok(Slice::All);
        }
        trimmed.parse::<u32>().map(Slice::Index).map_err(|_| UnknownName::new("slice", s))
    }
}

/// Physical size of one pixel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub unit: String,
}

impl Default for Calibration {
    fn default() -> Self {
        Self { pixel_width: 1.0, pixel_height: 1.0, unit: "pixels".to_string() }
    }
}

impl Calibration {
    pub fn new(pixel_width: f64, pixel_height: f64, unit: impl Into<String>) -> Self {
        Self { pixel_width, pixel_height, unit: unit.into() }
    }

    /// Physical area covered by a single pixel.
    pub fn pixel_area(&self) -> f64 {
        self.pixel_width * self.pixel_height
    }

    /// True when both pixel dimensions are finite and positive.
    pub fn is_valid(&self) -> bool {
        self.pixel_width.is_finite()
            && self.pixel_height.is_finite()
            && self.pixel_width > 0.0
            && self.pixel_height > 0.0
    }
}

/// Declarative grid parameters, as entered by a user or loaded from a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDefinition {
    pub grid_type: GridType,
    /// Physical area (calibrated units squared) per fine node.
    pub area_per_point: f64,
    pub ratio: Ratio,
    pub placement: PlacementMode,
    /// Pixel offset of the first fine node; read only under manual placement.
    pub origin: Offset,
    /// Node offset inside a coarse cell; read only under manual placement.
    pub coarse_origin: Offset,
    pub color: GridColor,
    pub slice: Slice,
}

impl GridDefinition {
    pub fn new(grid_type: GridType, area_per_point: f64) -> Self {
        Self {
            grid_type,
            area_per_point,
            ratio: Ratio::default(),
            placement: PlacementMode::default(),
            origin: Offset::default(),
            coarse_origin: Offset::default(),
            color: GridColor::default(),
            slice: Slice::default(),
        }
    }

    pub fn with_ratio(mut self, ratio: Ratio) -> Self {
        self.ratio = ratio;
        self
    }

    pub fn with_placement(mut self, placement: PlacementMode) -> Self {
        self.placement = placement;
        self
    }

    /// Switch to manual placement at the given offsets.
    pub fn with_manual_origin(mut self, origin: Offset, coarse_origin: Offset) -> Self {
        self.placement = PlacementMode::Manual;
        self.origin = origin;
        self.coarse_origin = coarse_origin;
        self
    }

    pub fn with_color(mut self, color: GridColor) -> Self {
        self.color = color;
        self
    }

    pub fn with_slice(mut self, slice: Slice) -> Self {
        self.slice = slice;
        self
    }
}

/// A grid definition reduced to concrete geometry for one image.
///
/// Only [`crate::resolve`] constructs these, and only once every invariant
/// holds: positive tile sizes, `origin < tile`, `coarse_origin < coarse_ratio`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedGrid {
    pub(crate) definition: GridDefinition,
    pub(crate) unit: String,
    pub(crate) tile_width: f64,
    pub(crate) tile_height: f64,
    pub(crate) lines_v: u32,
    pub(crate) lines_h: u32,
    pub(crate) coarse_ratio: CoarseRatio,
}

impl ResolvedGrid {
    /// The definition with `origin` and `coarse_origin` replaced by the
    /// concrete values.
    pub fn definition(&self) -> &GridDefinition {
        &self.definition
    }

    pub fn grid_type(&self) -> GridType {
        self.definition.grid_type
    }

    pub fn color(&self) -> GridColor {
        self.definition.color
    }

    pub fn slice(&self) -> Slice {
        self.definition.slice
    }

    pub fn origin(&self) -> Offset {
        self.definition.origin
    }

    pub fn coarse_origin(&self) -> Offset {
        self.definition.coarse_origin
    }

    pub fn coarse_ratio(&self) -> CoarseRatio {
        self.coarse_ratio
    }

    /// Unit of the calibration the grid was resolved against.
    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn tile_width(&self) -> f64 {
        self.tile_width
    }

    pub fn tile_height(&self) -> f64 {
        self.tile_height
    }

    /// Number of fine-node columns.
    pub fn lines_v(&self) -> u32 {
        self.lines_v
    }

    /// Number of fine-node rows.
    pub fn lines_h(&self) -> u32 {
        self.lines_h
    }

    /// Coarse-node predicate over fine-node indices.
    pub fn is_coarse_node(&self, h: u32, v: u32) -> bool {
        h % self.coarse_ratio.x == 0 && v % self.coarse_ratio.y == 0
    }
}

/// Sampling frame block carried alongside a grid set. Values are kept as
/// strings and written back exactly as read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SamplingFrame {
    pub left: String,
    pub right: String,
    pub top: String,
    pub bottom: String,
    pub prohibited_color: String,
    pub acceptance_color: String,
    pub acceptance_type: String,
}

impl SamplingFrame {
    /// Field values in persisted order.
    pub fn values(&self) -> [&str; 7] {
        [
            &self.left,
            &self.right,
            &self.top,
            &self.bottom,
            &self.prohibited_color,
            &self.acceptance_color,
            &self.acceptance_type,
        ]
    }

    /// Build from values in persisted order.
    pub fn from_values(values: [String; 7]) -> Self {
        let [left, right, top, bottom, prohibited_color, acceptance_color, acceptance_type] =
            values;
        Self { left, right, top, bottom, prohibited_color, acceptance_color, acceptance_type }
    }
}

/// The persisted unit: one applied grid on one slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRecord {
    pub timestamp: String,
    pub image_title: String,
    pub slice: Slice,
    pub grid_type: GridType,
    pub area_per_point: f64,
    pub unit: String,
    pub ratio: Ratio,
    pub color: GridColor,
    pub placement: PlacementMode,
    pub origin: Offset,
    pub coarse_origin: Offset,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sampling_frame: Option<SamplingFrame>,
}

impl GridRecord {
    /// Capture a resolved grid for persistence.
    pub fn from_resolved(
        grid: &ResolvedGrid,
        timestamp: impl Into<String>,
        image_title: impl Into<String>,
    ) -> Self {
        let def = grid.definition();
        Self {
            timestamp: timestamp.into(),
            image_title: image_title.into(),
            slice: def.slice,
            grid_type: def.grid_type,
            area_per_point: def.area_per_point,
            unit: grid.unit.clone(),
            ratio: def.ratio,
            color: def.color,
            placement: def.placement,
            origin: def.origin,
            coarse_origin: def.coarse_origin,
            sampling_frame: None,
        }
    }

    pub fn with_sampling_frame(mut self, frame: SamplingFrame) -> Self {
        self.sampling_frame = Some(frame);
        self
    }

    /// First grid-set field on which two records differ, if any.
    ///
    /// Records that agree on every grid-set field differ only in slice and
    /// origins, and can be stored in one document.
    pub fn grid_set_difference(&self, other: &GridRecord) -> Option<&'static str> {
        if self.timestamp != other.timestamp {
            Some("timestamp")
        } else if self.image_title != other.image_title {
            Some("image title")
        } else if self.grid_type != other.grid_type {
            Some("grid type")
        } else if self.area_per_point.to_bits() != other.area_per_point.to_bits() {
            Some("area per point")
        } else if self.unit != other.unit {
            Some("unit")
        } else if self.ratio != other.ratio {
            Some("ratio")
        } else if self.color != other.color {
            Some("color")
        } else if self.placement != other.placement {
            Some("placement")
        } else if self.sampling_frame != other.sampling_frame {
            Some("sampling frame")
        } else {
            None
        }
    }

    /// The definition this record was produced from, with its concrete origins.
    pub fn definition(&self) -> GridDefinition {
        GridDefinition {
            grid_type: self.grid_type,
            area_per_point: self.area_per_point,
            ratio: self.ratio,
            placement: self.placement,
            origin: self.origin,
            coarse_origin: self.coarse_origin,
            color: self.color,
            slice: self.slice,
        }
    }
}

/// Collaborator supplying image dimensions, calibration and title.
pub trait ImageSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn calibration(&self) -> Calibration;
    fn title(&self) -> &str;
}

/// Plain-value [`ImageSource`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub calibration: Calibration,
    pub title: String,
}

impl ImageInfo {
    pub fn new(width: u32, height: u32, title: impl Into<String>) -> Self {
        Self { width, height, calibration: Calibration::default(), title: title.into() }
    }

    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = calibration;
        self
    }

    /// Read dimensions from an image file; the title is the file name.
    pub fn from_file(
        path: &std::path::Path,
        calibration: Calibration,
    ) -> Result<Self, image::ImageError> {
        let (width, height) = image::image_dimensions(path)?;
        let title = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { width, height, calibration, title })
    }

    /// Physical image area in calibrated units squared.
    pub fn physical_area(&self) -> f64 {
        f64::from(self.width) * f64::from(self.height) * self.calibration.pixel_area()
    }
}

impl ImageSource for ImageInfo {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn calibration(&self) -> Calibration {
        self.calibration.clone()
    }

    fn title(&self) -> &str {
        &self.title
    }
}
