//! Disparity buffers as produced by the matcher, and the TIFF interchange
//! file they travel through.

use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::debug;
use ndarray::Array2;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::ColorType;

use crate::error::{Error, Result};

/// Marker the matcher writes for pixels without a valid match.
pub const NO_MATCH: f32 = 99999.0;

/// Single-channel disparity in the matcher's convention: stored values are
/// the negated geometric disparity and `±NO_MATCH` marks missing matches.
///
/// Indexed `(row, col)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DisparityMap {
    data: Array2<f32>,
}

/// Largest integer magnitude an `f32` holds exactly.
const MAX_EXACT_INT: u64 = 1 << 24;

fn widen<T: Copy>(values: Vec<T>, f: impl Fn(T) -> f32) -> Vec<f32> {
    values.into_iter().map(f).collect()
}

/// Widens wide integer samples, rejecting any that would be rounded.
fn widen_exact<T: Copy + Display>(
    values: Vec<T>,
    to_i64: impl Fn(T) -> Option<i64>,
) -> Result<Vec<f32>> {
    values
        .into_iter()
        .map(|x| match to_i64(x) {
            Some(v) if v.unsigned_abs() <= MAX_EXACT_INT => Ok(v as f32),
            _ => Err(Error::UnsupportedFormat(format!(
                "sample {} is not exactly representable as f32",
                x
            ))),
        })
        .collect()
}

impl DisparityMap {
    pub fn from_array(data: Array2<f32>) -> Self {
        Self { data }
    }

    pub fn from_vec(width: usize, height: usize, values: Vec<f32>) -> Result<Self> {
        let data = Array2::from_shape_vec((height, width), values).map_err(|e| {
            Error::InvalidInput(format!("{}x{} disparity buffer: {}", width, height, e))
        })?;
        Ok(Self { data })
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            data: Array2::from_elem((height, width), value),
        }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[(y, x)]
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn into_inner(self) -> Array2<f32> {
        self.data
    }

    /// Reads a single-channel TIFF of any integer or float sample type.
    ///
    /// 32 and 64-bit integer samples must lie within ±2^24 so they convert
    /// to `f32` exactly; anything larger fails with
    /// [`Error::UnsupportedFormat`]. `f64` samples are rounded to nearest.
    pub fn read_tiff(path: &Path) -> Result<Self> {
        let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
        let (width, height) = decoder.dimensions()?;
        match decoder.colortype()? {
            ColorType::Gray(_) => {}
            other => {
                return Err(Error::UnsupportedFormat(format!(
                    "{}: expected a single channel, found {:?}",
                    path.display(),
                    other
                )))
            }
        }
        let values = match decoder.read_image()? {
            DecodingResult::U8(v) => widen(v, f32::from),
            DecodingResult::U16(v) => widen(v, f32::from),
            DecodingResult::U32(v) => widen_exact(v, |x| Some(i64::from(x)))?,
            DecodingResult::U64(v) => widen_exact(v, |x| i64::try_from(x).ok())?,
            DecodingResult::I8(v) => widen(v, f32::from),
            DecodingResult::I16(v) => widen(v, f32::from),
            DecodingResult::I32(v) => widen_exact(v, |x| Some(i64::from(x)))?,
            DecodingResult::I64(v) => widen_exact(v, Some)?,
            DecodingResult::F32(v) => v,
            DecodingResult::F64(v) => widen(v, |x| x as f32),
        };
        debug!("read {}x{} disparity from {}", width, height, path.display());
        Self::from_vec(width as usize, height as usize, values)
    }

    /// Writes the map as a 32-bit float single-channel TIFF.
    pub fn write_tiff(&self, path: &Path) -> Result<()> {
        let values: Vec<f32> = self.data.iter().copied().collect();
        let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;
        encoder.write_image::<colortype::Gray32Float>(
            self.width() as u32,
            self.height() as u32,
            &values,
        )?;
        Ok(())
    }

    /// Nearest-neighbour resize by `rate` (0.5 halves both dimensions).
    ///
    /// Pass the same rate to the reprojection functions so pixel indices are
    /// mapped back to the calibration resolution.
    pub fn downsample(&self, rate: f64) -> Result<Self> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(Error::InvalidInput(format!(
                "downsample rate must be positive, got {}",
                rate
            )));
        }
        let (rows, cols) = self.data.dim();
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidInput("cannot downsample an empty map".into()));
        }
        let out_rows = ((rows as f64 * rate).round() as usize).max(1);
        let out_cols = ((cols as f64 * rate).round() as usize).max(1);
        let data = Array2::from_shape_fn((out_rows, out_cols), |(i, j)| {
            let si = ((i as f64 / rate).floor() as usize).min(rows - 1);
            let sj = ((j as f64 / rate).floor() as usize).min(cols - 1);
            self.data[(si, sj)]
        });
        Ok(Self { data })
    }
}
