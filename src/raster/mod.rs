//! Raster file I/O.
//!
//! This module provides:
//! - **ASCII grids**: ESRI ASCII grid read/write, the format used for the
//!   drainage (LDD) map and editable model grids
//! - **GeoTIFF**: georeferenced raster reading via the pure Rust `tiff`
//!   crate - no system dependencies required
//!
//! All formats decode into the same in-memory [`RasterData`] carrying the
//! cell values, the grid transform, and the nodata sentinel.

mod ascii;
mod geotiff;

use std::path::Path;

use ndarray::Array2;
use thiserror::Error;

use crate::grid::GridTransform;

pub use ascii::{read_ascii_grid, write_ascii_grid};
pub use geotiff::read_geotiff;

/// Error type for raster operations.
#[derive(Debug, Error)]
pub enum RasterError {
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error with line number (ASCII grids)
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// TIFF decoding error
    #[error("TIFF error: {0}")]
    Tiff(String),

    /// Missing or invalid georeferencing tags
    #[error("Missing geotransform: {0}")]
    MissingGeotransform(String),

    /// Extension not handled by any codec
    #[error("Unsupported raster format {extension:?} (supported: .asc, .tif, .tiff)")]
    UnsupportedFormat { extension: String },

    /// The ASCII grid format only supports square cells
    #[error("Cannot write non-square cells ({dx} x {dy}) to an ASCII grid")]
    NonSquareCells { dx: f64, dy: f64 },
}

impl From<tiff::TiffError> for RasterError {
    fn from(e: tiff::TiffError) -> Self {
        RasterError::Tiff(e.to_string())
    }
}

/// An in-memory raster: cell values plus georeferencing.
#[derive(Debug, Clone)]
pub struct RasterData {
    /// Cell values, row 0 at the northern edge
    pub data: Array2<f64>,
    /// Affine transform of the grid
    pub transform: GridTransform,
    /// No-data sentinel
    pub nodata: f64,
}

impl RasterData {
    /// (rows, cols) of the raster.
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Check whether a value is the nodata sentinel.
    pub fn is_nodata(&self, value: f64) -> bool {
        value.is_nan() || (self.nodata.is_finite() && value == self.nodata)
    }
}

/// Open a raster file, dispatching on the file extension.
///
/// `default_nodata` is used when the file itself does not declare a
/// nodata value.
pub fn open(path: &Path, default_nodata: f64) -> Result<RasterData, RasterError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match extension.as_str() {
        "asc" => read_ascii_grid(path, default_nodata),
        "tif" | "tiff" => read_geotiff(path, default_nodata),
        _ => Err(RasterError::UnsupportedFormat { extension }),
    }
}
