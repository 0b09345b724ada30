//! Append-only log of applied grids, exchanged as tab-separated text
//!
//! Every successful apply adds one row per slice. The log can be written as
//! TSV, read back, and converted to and from the XML record model.

use log::debug;
use std::io;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

use crate::models::{GridRecord, GridType, Offset, Ratio, SamplingFrame};
use crate::output::{append_rows, OutputError};
use crate::xml::{self, EncodeError, SchemaVersion};

/// chrono format for the date column: `yyyy/MM/dd HH:mm:ss`.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Column names for every row.
pub const BASE_COLUMNS: [&str; 13] = [
    "Date",
    "Image",
    "Slice",
    "GridType",
    "AreaPerPoint",
    "Unit",
    "Ratio",
    "Color",
    "Location",
    "xstart",
    "ystart",
    "xstartCoarse",
    "ystartCoarse",
];

/// Optional sampling-frame margin columns.
pub const FRAME_COLUMNS: [&str; 7] = [
    "left",
    "right",
    "top",
    "bottom",
    "prohibitedColor",
    "acceptanceColor",
    "acceptanceType",
];

const AREA_SUFFIX: &str = "^2";
const RATIO_PREFIX: char = '\'';

/// Error type for reading history text.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HistoryError {
    #[error("history has no header row")]
    MissingHeader,
    #[error("line {line}: expected {} or {} columns, found {found}", BASE_COLUMNS.len(), BASE_COLUMNS.len() + FRAME_COLUMNS.len())]
    ColumnCount { line: usize, found: usize },
    #[error("line {line}: invalid {column} value '{value}'")]
    InvalidValue { line: usize, column: &'static str, value: String },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Current local time in the history date format.
pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Header row, with or without the sampling-frame columns.
pub fn header(with_frame: bool) -> String {
    let mut columns: Vec<&str> = BASE_COLUMNS.to_vec();
    if with_frame {
        columns.extend(FRAME_COLUMNS);
    }
    columns.join("\t")
}

/// Free text with tabs and line breaks replaced by spaces, so it stays in
/// one cell.
fn cell(text: &str) -> String {
    text.replace(|c: char| matches!(c, '\t' | '\r' | '\n'), " ")
}

/// Format one record as a row.
///
/// Fields that do not apply to the record's grid type are written as empty
/// columns: `xstart` for horizontal lines, and ratio plus coarse origins for
/// types without a coarse grid.
pub fn format_row(record: &GridRecord) -> String {
    let coarse = record.grid_type.has_coarse_grid();
    let optional = |applies: bool, value: String| if applies { value } else { String::new() };

    let mut columns = vec![
        cell(&record.timestamp),
        cell(&record.image_title),
        record.slice.to_string(),
        record.grid_type.name().to_string(),
        record.area_per_point.to_string(),
        format!("{}{}", cell(&record.unit), AREA_SUFFIX),
        optional(coarse, format!("{}{}", RATIO_PREFIX, record.ratio.label())),
        record.color.name().to_string(),
        record.placement.name().to_string(),
        optional(record.grid_type != GridType::HorizontalLines, record.origin.x.to_string()),
        record.origin.y.to_string(),
        optional(coarse, record.coarse_origin.x.to_string()),
        optional(coarse, record.coarse_origin.y.to_string()),
    ];
    if let Some(frame) = &record.sampling_frame {
        columns.extend(frame.values().into_iter().map(cell));
    }
    columns.join("\t")
}

/// Parse one data row. `line` is the 1-based line number used in errors.
pub fn parse_row(line: usize, row: &str) -> Result<GridRecord, HistoryError> {
    let columns: Vec<&str> = row.split('\t').collect();
    let has_frame = match columns.len() {
        n if n == BASE_COLUMNS.len() => false,
        n if n == BASE_COLUMNS.len() + FRAME_COLUMNS.len() => true,
        found => return Err(HistoryError::ColumnCount { line, found }),
    };

    let field = |index: usize| -> (&'static str, &str) { (BASE_COLUMNS[index], columns[index]) };
    let invalid = |(column, value): (&'static str, &str)| HistoryError::InvalidValue {
        line,
        column,
        value: value.to_string(),
    };
    let required = |index: usize| {
        let (column, value) = field(index);
        value.trim().parse::<u32>().map_err(|_| invalid((column, value)))
    };
    let optional = |index: usize| {
        let (_, value) = field(index);
        if value.trim().is_empty() {
            Ok(0)
        } else {
            required(index)
        }
    };

    let grid_type: GridType = columns[3].parse().map_err(|_| invalid(field(3)))?;
    let area_per_point: f64 = columns[4].trim().parse().map_err(|_| invalid(field(4)))?;
    let unit = columns[5].strip_suffix(AREA_SUFFIX).unwrap_or(columns[5]).to_string();
    let ratio_text = columns[6].trim().trim_start_matches(RATIO_PREFIX);
    let ratio = if ratio_text.is_empty() {
        Ratio::default()
    } else {
        ratio_text.parse().map_err(|_| invalid(field(6)))?
    };

    let sampling_frame = if has_frame {
        let values: [String; 7] =
            std::array::from_fn(|i| columns[BASE_COLUMNS.len() + i].to_string());
        Some(SamplingFrame::from_values(values))
    } else {
        None
    };

    Ok(GridRecord {
        timestamp: columns[0].to_string(),
        image_title: columns[1].to_string(),
        slice: columns[2].parse().map_err(|_| invalid(field(2)))?,
        grid_type,
        area_per_point,
        unit,
        ratio,
        color: columns[7].parse().map_err(|_| invalid(field(7)))?,
        placement: columns[8].parse().map_err(|_| invalid(field(8)))?,
        origin: Offset::new(optional(9)?, required(10)?),
        coarse_origin: Offset::new(optional(11)?, optional(12)?),
        sampling_frame,
    })
}

fn is_header(row: &str) -> bool {
    row.split('\t').next() == Some(BASE_COLUMNS[0])
}

/// Ordered, append-only list of applied grid records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryLog {
    records: Vec<GridRecord>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-import records, e.g. decoded from a document.
    pub fn from_records(records: Vec<GridRecord>) -> Self {
        Self { records }
    }

    pub fn append(&mut self, record: GridRecord) {
        debug!(
            "history: {} on '{}' slice {}",
            record.grid_type, record.image_title, record.slice
        );
        self.records.push(record);
    }

    pub fn records(&self) -> &[GridRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn has_sampling_frame(&self) -> bool {
        self.records.iter().any(|r| r.sampling_frame.is_some())
    }

    /// Data rows without a header.
    pub fn rows(&self) -> Vec<String> {
        self.records.iter().map(format_row).collect()
    }

    /// Full TSV text: header plus one row per record.
    pub fn to_tsv(&self) -> String {
        let mut text = header(self.has_sampling_frame());
        text.push('\n');
        for row in self.rows() {
            text.push_str(&row);
            text.push('\n');
        }
        text
    }

    /// Parse TSV text. Blank lines and repeated header rows are skipped.
    pub fn from_tsv(text: &str) -> Result<Self, HistoryError> {
        let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
        match lines.next() {
            Some((_, first)) if is_header(first) => {}
            _ => return Err(HistoryError::MissingHeader),
        }
        let mut log = Self::new();
        for (index, row) in lines {
            if is_header(row) {
                continue;
            }
            log.records.push(parse_row(index + 1, row)?);
        }
        Ok(log)
    }

    /// Read a history file.
    pub fn load(path: &Path) -> Result<Self, HistoryError> {
        Self::from_tsv(&std::fs::read_to_string(path)?)
    }

    /// Contiguous runs of records that share one grid set.
    pub fn batches(&self) -> Vec<&[GridRecord]> {
        let mut batches = Vec::new();
        let mut start = 0;
        for i in 1..=self.records.len() {
            let boundary = i == self.records.len()
                || self.records[i].grid_set_difference(&self.records[start]).is_some();
            if boundary {
                batches.push(&self.records[start..i]);
                start = i;
            }
        }
        batches
    }

    /// The most recent batch, or an empty slice for an empty log.
    pub fn latest_batch(&self) -> &[GridRecord] {
        self.batches().pop().unwrap_or(&[])
    }

    /// Encode the most recent batch as a document.
    pub fn to_document(&self, schema: SchemaVersion) -> Result<String, EncodeError> {
        xml::encode(self.latest_batch(), schema)
    }
}

/// Append rows for `records` to a history file, writing the header if the
/// file is new.
pub fn append_to_file(path: &Path, records: &[GridRecord]) -> Result<(), OutputError> {
    let with_frame = records.iter().any(|r| r.sampling_frame.is_some());
    let rows: Vec<String> = records.iter().map(format_row).collect();
    append_rows(path, &header(with_frame), &rows)
}

/// History log shared between producers. Appends are serialised, so rows keep
/// the order in which `append` calls acquire the lock.
#[derive(Debug, Default)]
pub struct SharedHistory {
    inner: Mutex<HistoryLog>,
}

impl SharedHistory {
    pub fn new(log: HistoryLog) -> Self {
        Self { inner: Mutex::new(log) }
    }

    pub fn append(&self, record: GridRecord) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).append(record);
    }

    /// Append several records without interleaving with other producers.
    pub fn append_all(&self, records: impl IntoIterator<Item = GridRecord>) {
        let mut log = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        for record in records {
            log.append(record);
        }
    }

    pub fn snapshot(&self) -> HistoryLog {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn into_inner(self) -> HistoryLog {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}
