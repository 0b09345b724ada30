//! File output: PNG overlays, text documents and output path generation

use image::RgbaImage;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::consistency::strip_counter_prefix;
use crate::models::Slice;

/// Error type for output operations
#[derive(Debug, Error)]
pub enum OutputError {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Image encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

fn ensure_parent(path: &Path) -> Result<(), io::Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Save an RGBA image to a PNG file, creating parent directories.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), OutputError> {
    ensure_parent(path)?;
    image.save(path)?;
    Ok(())
}

/// Write a text document (XML, SVG, TSV), creating parent directories.
pub fn write_text(path: &Path, contents: &str) -> Result<(), OutputError> {
    ensure_parent(path)?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Append rows to a text file, writing `header` first when the file is new
/// or empty.
pub fn append_rows(path: &Path, header: &str, rows: &[String]) -> Result<(), OutputError> {
    use std::io::Write;

    ensure_parent(path)?;
    let needs_header = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    if needs_header {
        writeln!(file, "{}", header)?;
    }
    for row in rows {
        writeln!(file, "{}", row)?;
    }
    Ok(())
}

/// Suggested file name for a saved grid document: `grid_<title>.xml`.
///
/// ```
/// use combined_grids::output::document_file_name;
///
/// assert_eq!(document_file_name("Counter Window - lung.tif"), "grid_lung.tif.xml");
/// ```
pub fn document_file_name(image_title: &str) -> String {
    format!("grid_{}.xml", strip_counter_prefix(image_title))
}

/// Output path for one slice of a rendered grid.
///
/// A single slice writes to `output` as given. With several slices each file
/// gets a `_z<slice>` suffix before the extension (`_zAll` for the all-slices
/// sentinel).
pub fn slice_output_path(output: &Path, slice: Slice, is_single_slice: bool) -> PathBuf {
    if is_single_slice {
        return output.to_path_buf();
    }
    let stem = output.file_stem().and_then(|s| s.to_str()).unwrap_or("grid");
    let file_name = match output.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}_z{}.{}", stem, slice, ext),
        None => format!("{}_z{}", stem, slice),
    };
    let parent = output.parent().unwrap_or(Path::new(""));
    if parent.as_os_str().is_empty() {
        PathBuf::from(file_name)
    } else {
        parent.join(file_name)
    }
}
