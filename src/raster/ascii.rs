//! ESRI ASCII grid codec.
//!
//! The editable grid format of this adapter: a short header followed by
//! whitespace-separated cell values, northern row first. Integer-coded
//! grids (flow directions, masks) round-trip losslessly because the writer
//! emits integral values without a fractional part.
//!
//! # File Format
//!
//! ```text
//! ncols 4
//! nrows 3
//! xllcorner 0.0
//! yllcorner 0.0
//! cellsize 0.5
//! nodata_value 255
//! 2 2 2 255
//! 6 5 4 255
//! 8 8 8 255
//! ```
//!
//! The `nodata_value` line is optional; header keys are case-insensitive.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use ndarray::Array2;

use super::{RasterData, RasterError};
use crate::grid::GridTransform;

fn parse_err(line: usize, message: impl Into<String>) -> RasterError {
    RasterError::Parse {
        line,
        message: message.into(),
    }
}

/// Read an ESRI ASCII grid file.
///
/// `default_nodata` is used when the header has no `nodata_value` line.
pub fn read_ascii_grid(path: &Path, default_nodata: f64) -> Result<RasterData, RasterError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut ncols: Option<usize> = None;
    let mut nrows: Option<usize> = None;
    let mut xllcorner: Option<f64> = None;
    let mut yllcorner: Option<f64> = None;
    let mut cellsize: Option<f64> = None;
    let mut nodata = default_nodata;

    let mut values: Vec<f64> = Vec::new();
    let mut in_header = true;

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if in_header {
            let mut parts = line.split_whitespace();
            let key = parts.next().unwrap_or("").to_ascii_lowercase();
            let is_header_key = matches!(
                key.as_str(),
                "ncols" | "nrows" | "xllcorner" | "yllcorner" | "cellsize" | "nodata_value"
            );
            if is_header_key {
                let value = parts
                    .next()
                    .ok_or_else(|| parse_err(line_num + 1, format!("Missing value for {}", key)))?;
                match key.as_str() {
                    "ncols" => {
                        ncols = Some(value.parse().map_err(|_| {
                            parse_err(line_num + 1, "Invalid ncols value")
                        })?)
                    }
                    "nrows" => {
                        nrows = Some(value.parse().map_err(|_| {
                            parse_err(line_num + 1, "Invalid nrows value")
                        })?)
                    }
                    "xllcorner" => {
                        xllcorner = Some(value.parse().map_err(|_| {
                            parse_err(line_num + 1, "Invalid xllcorner value")
                        })?)
                    }
                    "yllcorner" => {
                        yllcorner = Some(value.parse().map_err(|_| {
                            parse_err(line_num + 1, "Invalid yllcorner value")
                        })?)
                    }
                    "cellsize" => {
                        cellsize = Some(value.parse().map_err(|_| {
                            parse_err(line_num + 1, "Invalid cellsize value")
                        })?)
                    }
                    "nodata_value" => {
                        nodata = value.parse().map_err(|_| {
                            parse_err(line_num + 1, "Invalid nodata_value value")
                        })?
                    }
                    _ => unreachable!(),
                }
                continue;
            }
            in_header = false;
        }

        for token in line.split_whitespace() {
            let v: f64 = token
                .parse()
                .map_err(|_| parse_err(line_num + 1, format!("Invalid cell value {:?}", token)))?;
            values.push(v);
        }
    }

    let ncols = ncols.ok_or_else(|| parse_err(1, "Missing ncols header"))?;
    let nrows = nrows.ok_or_else(|| parse_err(1, "Missing nrows header"))?;
    let xllcorner = xllcorner.ok_or_else(|| parse_err(1, "Missing xllcorner header"))?;
    let yllcorner = yllcorner.ok_or_else(|| parse_err(1, "Missing yllcorner header"))?;
    let cellsize = cellsize.ok_or_else(|| parse_err(1, "Missing cellsize header"))?;

    if values.len() != nrows * ncols {
        return Err(parse_err(
            1,
            format!(
                "Expected {} cell values, found {}",
                nrows * ncols,
                values.len()
            ),
        ));
    }

    let data = Array2::from_shape_vec((nrows, ncols), values)
        .expect("shape checked against value count");

    // yllcorner is the southern edge; the transform origin is the northern one
    let transform = GridTransform::new(
        xllcorner,
        yllcorner + nrows as f64 * cellsize,
        cellsize,
        cellsize,
    );

    Ok(RasterData {
        data,
        transform,
        nodata,
    })
}

/// Write an ESRI ASCII grid file.
///
/// Requires square cells (`dx == dy`); integral values are written without
/// a fractional part so integer grids survive a read-back bit for bit.
pub fn write_ascii_grid(path: &Path, raster: &RasterData) -> Result<(), RasterError> {
    let (nrows, ncols) = raster.shape();
    let t = raster.transform;
    if t.dx != t.dy {
        return Err(RasterError::NonSquareCells { dx: t.dx, dy: t.dy });
    }
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "ncols {}", ncols)?;
    writeln!(writer, "nrows {}", nrows)?;
    writeln!(writer, "xllcorner {}", t.x_origin)?;
    writeln!(writer, "yllcorner {}", t.y_origin - nrows as f64 * t.dy)?;
    writeln!(writer, "cellsize {}", t.dx)?;
    writeln!(writer, "nodata_value {}", format_cell(raster.nodata))?;

    for row in raster.data.rows() {
        let mut first = true;
        for &v in row {
            if !first {
                write!(writer, " ")?;
            }
            write!(writer, "{}", format_cell(v))?;
            first = false;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

fn format_cell(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}
