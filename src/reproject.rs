//! Disparity to depth reprojection.
//!
//! Matcher output goes through two separate passes:
//!
//! 1. [`invert_and_mask_disparity`] flips the matcher's sign convention and
//!    builds the invalid-pixel masks (reconstructed point at or behind the
//!    camera, or the `NO_MATCH` marker). Masked pixels are filled with the
//!    nearest valid extreme so later divisions stay finite.
//! 2. [`reproject_to_3d`] triangulates every pixel with the Q matrix.
//!
//! [`depth_from_disparity`] and [`colorize_disparity`] compose the two and
//! blank every masked pixel in their output.

use image::RgbImage;
use log::info;
use ndarray::{Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::colormap::apply_jet;
use crate::disparity::{DisparityMap, NO_MATCH};
use crate::error::{Error, Result};
use crate::visualize::scale_disparity;

/// 4x4 reprojection matrix from stereo calibration, row-major.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReprojectionMatrix(pub [[f64; 4]; 4]);

impl ReprojectionMatrix {
    pub fn new(rows: [[f64; 4]; 4]) -> Self {
        Self(rows)
    }

    pub fn from_row_slice(values: &[f64]) -> Result<Self> {
        if values.len() != 16 {
            return Err(Error::InvalidInput(format!(
                "Q matrix needs 16 values, got {}",
                values.len()
            )));
        }
        let mut rows = [[0.0; 4]; 4];
        for (i, row) in rows.iter_mut().enumerate() {
            row.copy_from_slice(&values[i * 4..i * 4 + 4]);
        }
        Ok(Self(rows))
    }

    /// Q[2][3], focal length scaled into the z numerator.
    pub fn wz(&self) -> f64 {
        self.0[2][3]
    }

    pub fn q03(&self) -> f64 {
        self.0[0][3]
    }

    pub fn q13(&self) -> f64 {
        self.0[1][3]
    }

    pub fn q32(&self) -> f64 {
        self.0[3][2]
    }

    pub fn q33(&self) -> f64 {
        self.0[3][3]
    }

    /// Homogeneous scale for a (geometric) disparity.
    pub fn w(&self, disparity: f64) -> f64 {
        disparity * self.q32() + self.q33()
    }
}

/// Pixels excluded from every output.
#[derive(Debug, Clone, PartialEq)]
pub struct DisparityMask {
    /// `w <= 0`: the point would lie at or behind the camera.
    pub behind_camera: Array2<bool>,
    /// Matcher found no correspondence.
    pub no_match: Array2<bool>,
}

impl DisparityMask {
    pub fn is_invalid(&self, row: usize, col: usize) -> bool {
        self.behind_camera[(row, col)] || self.no_match[(row, col)]
    }

    pub fn valid_count(&self) -> usize {
        self.behind_camera
            .iter()
            .zip(self.no_match.iter())
            .filter(|&(behind, missing)| !*behind && !*missing)
            .count()
    }
}

/// Output of [`invert_and_mask_disparity`].
#[derive(Debug, Clone)]
pub struct CleanedDisparity {
    /// Geometric disparity; masked pixels hold a valid extreme.
    pub values: Array2<f32>,
    pub mask: DisparityMask,
    /// Min and max over valid non-zero disparities.
    pub range: Option<(f32, f32)>,
}

/// Three-channel (x, y, z) buffer, indexed `(row, col, channel)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    data: Array3<f32>,
}

impl DepthMap {
    pub fn width(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    pub fn height(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn get(&self, x: usize, y: usize) -> [f32; 3] {
        [
            self.data[(y, x, 0)],
            self.data[(y, x, 1)],
            self.data[(y, x, 2)],
        ]
    }

    pub fn z(&self) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(2), 2)
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn into_inner(self) -> Array3<f32> {
        self.data
    }
}

/// Depth plus the z range over non-blanked pixels.
#[derive(Debug, Clone)]
pub struct DepthResult {
    pub depth: DepthMap,
    /// `None` when no pixel survived masking.
    pub range: Option<(f32, f32)>,
}

fn min_max(values: impl Iterator<Item = f32>) -> Option<(f32, f32)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

fn check_rate(downsample_rate: f64) -> Result<()> {
    if downsample_rate.is_finite() && downsample_rate > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "downsample rate must be positive, got {}",
            downsample_rate
        )))
    }
}

/// Negates the matcher's disparity and masks pixels that cannot be
/// triangulated.
///
/// A pixel is `no_match` when the stored value is `±NO_MATCH` or not finite,
/// otherwise `behind_camera` when `w <= 0`. Behind-camera pixels are filled
/// with the minimum valid disparity and no-match pixels with the maximum.
/// Zero disparities stay valid but are left out of the range. With no usable
/// pixel at all both fills fall back to `0.0` and `range` is `None`.
pub fn invert_and_mask_disparity(raw: &DisparityMap, q: &ReprojectionMatrix) -> CleanedDisparity {
    let mut values = raw.data().mapv(|d| -d);
    let no_match = values.mapv(|d| !d.is_finite() || d.abs() == NO_MATCH);
    let behind_camera = Array2::from_shape_fn(values.dim(), |idx| {
        !no_match[idx] && q.w(f64::from(values[idx])) <= 0.0
    });

    let range = min_max(
        values
            .indexed_iter()
            .filter(|&(idx, &d)| !no_match[idx] && !behind_camera[idx] && d != 0.0)
            .map(|(_, &d)| d),
    );
    let (fill_low, fill_high) = range.unwrap_or((0.0, 0.0));
    for (idx, d) in values.indexed_iter_mut() {
        if no_match[idx] {
            *d = fill_high;
        } else if behind_camera[idx] {
            *d = fill_low;
        }
    }

    CleanedDisparity {
        values,
        mask: DisparityMask {
            behind_camera,
            no_match,
        },
        range,
    }
}

/// Triangulates every pixel of a geometric disparity buffer.
///
/// `downsample_rate` is the scale applied to the disparity relative to the
/// calibration resolution (0.5 for half size); pixel indices are divided by
/// it before entering the formula.
pub fn reproject_to_3d(
    disparity: &Array2<f32>,
    q: &ReprojectionMatrix,
    downsample_rate: f64,
) -> Result<DepthMap> {
    check_rate(downsample_rate)?;
    let (rows, cols) = disparity.dim();
    let mut data = Array3::<f32>::zeros((rows, cols, 3));
    for i in 0..rows {
        for j in 0..cols {
            let w = q.w(f64::from(disparity[(i, j)]));
            let x = (j as f64 / downsample_rate + q.q03()) / w;
            let y = (i as f64 / downsample_rate + q.q13()) / w;
            let z = q.wz() / w;
            data[(i, j, 0)] = x as f32;
            data[(i, j, 1)] = y as f32;
            data[(i, j, 2)] = z as f32;
        }
    }
    Ok(DepthMap { data })
}

/// Metric (x, y, z) for every pixel of the matcher's raw disparity, with
/// masked pixels set to (0, 0, 0).
pub fn depth_from_disparity(
    raw: &DisparityMap,
    q: &ReprojectionMatrix,
    downsample_rate: f64,
) -> Result<DepthResult> {
    let cleaned = invert_and_mask_disparity(raw, q);
    let mut depth = reproject_to_3d(&cleaned.values, q, downsample_rate)?;

    let (rows, cols) = cleaned.values.dim();
    for i in 0..rows {
        for j in 0..cols {
            if cleaned.mask.is_invalid(i, j) {
                depth.data[(i, j, 0)] = 0.0;
                depth.data[(i, j, 1)] = 0.0;
                depth.data[(i, j, 2)] = 0.0;
            }
        }
    }

    let range = min_max(
        depth
            .z()
            .iter()
            .copied()
            .filter(|z| *z != 0.0 && z.is_finite()),
    );
    match range {
        Some((near, far)) => info!("depth range: {}m, {}m", near, far),
        None => info!("depth range: no valid pixels"),
    }
    Ok(DepthResult { depth, range })
}

/// Jet visualization of the matcher's raw disparity with masked pixels black.
///
/// Valid disparities are min-max normalized to 8 bits first. A buffer whose
/// valid disparities are all equal has no contrast to show and comes back
/// entirely black.
///
/// Unlike [`depth_from_disparity`] this takes no downsample rate: colors
/// depend only on disparity values, never on pixel positions, so a
/// downsampled map is colorized as is.
pub fn colorize_disparity(raw: &DisparityMap, q: &ReprojectionMatrix) -> RgbImage {
    let cleaned = invert_and_mask_disparity(raw, q);
    let (rows, cols) = cleaned.values.dim();
    let mut out = RgbImage::new(cols as u32, rows as u32);

    let valid = min_max(
        cleaned
            .values
            .indexed_iter()
            .filter(|&((i, j), _)| !cleaned.mask.is_invalid(i, j))
            .map(|(_, &d)| d),
    );
    match valid {
        Some((lo, hi)) if hi > lo => {}
        _ => return out,
    }

    let colored = apply_jet(&scale_disparity(&cleaned.values));
    for (x, y, pixel) in colored.enumerate_pixels() {
        if !cleaned.mask.is_invalid(y as usize, x as usize) {
            out.put_pixel(x, y, *pixel);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use ndarray::arr2;

    fn simple_q(q32: f64, q33: f64, wz: f64) -> ReprojectionMatrix {
        ReprojectionMatrix([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, wz],
            [0.0, 0.0, q32, q33],
        ])
    }

    #[test]
    fn matrix_accessors() {
        let q = ReprojectionMatrix::from_row_slice(&[
            1.0, 0.0, 0.0, -320.0, //
            0.0, 1.0, 0.0, -240.0, //
            0.0, 0.0, 0.0, 700.0, //
            0.0, 0.0, 8.33, 0.0,
        ])
        .unwrap();
        assert_eq!(q.q03(), -320.0);
        assert_eq!(q.q13(), -240.0);
        assert_eq!(q.wz(), 700.0);
        assert_eq!(q.q32(), 8.33);
        assert_eq!(q.q33(), 0.0);
        assert!(ReprojectionMatrix::from_row_slice(&[0.0; 15]).is_err());
    }

    #[test]
    fn constant_disparity_gives_exact_depth() {
        let q = simple_q(0.0, 1.0, 10.0);
        let raw = DisparityMap::filled(4, 3, -5.0);

        let cleaned = invert_and_mask_disparity(&raw, &q);
        assert!(cleaned.values.iter().all(|&d| d == 5.0));
        assert_eq!(cleaned.mask.valid_count(), 12);

        let result = depth_from_disparity(&raw, &q, 1.0).unwrap();
        assert!(result.depth.z().iter().all(|&z| z == 10.0));
        assert_eq!(result.range, Some((10.0, 10.0)));
        // x = (j + q03) / w with q03 = 0 and w = 1
        assert_eq!(result.depth.get(3, 2), [3.0, 2.0, 10.0]);
    }

    #[test]
    fn no_match_everywhere_blanks_output() {
        let q = simple_q(1.0, 0.0, 100.0);
        for &value in &[NO_MATCH, -NO_MATCH] {
            let raw = DisparityMap::filled(3, 2, value);
            let cleaned = invert_and_mask_disparity(&raw, &q);
            assert_eq!(cleaned.mask.valid_count(), 0);
            assert_eq!(cleaned.range, None);

            let result = depth_from_disparity(&raw, &q, 1.0).unwrap();
            assert!(result.depth.data().iter().all(|&v| v == 0.0));
            assert_eq!(result.range, None);
        }
    }

    #[test]
    fn behind_camera_and_no_match_are_filled_then_blanked() {
        // w = d, so true disparity -2 lies behind the camera
        let q = simple_q(1.0, 0.0, 100.0);
        let raw = DisparityMap::from_array(arr2(&[[-4.0, 2.0], [-NO_MATCH, -10.0]]));

        let cleaned = invert_and_mask_disparity(&raw, &q);
        assert_eq!(cleaned.range, Some((4.0, 10.0)));
        assert!(cleaned.mask.behind_camera[(0, 1)]);
        assert!(cleaned.mask.no_match[(1, 0)]);
        assert_eq!(cleaned.values[(0, 1)], 4.0);
        assert_eq!(cleaned.values[(1, 0)], 10.0);

        let result = depth_from_disparity(&raw, &q, 1.0).unwrap();
        assert_eq!(result.depth.get(1, 0), [0.0, 0.0, 0.0]);
        assert_eq!(result.depth.get(0, 1), [0.0, 0.0, 0.0]);
        assert_eq!(result.depth.get(0, 0)[2], 25.0);
        assert_eq!(result.depth.get(1, 1)[2], 10.0);
        assert_eq!(result.range, Some((10.0, 25.0)));
    }

    #[test]
    fn downsample_rate_scales_pixel_indices() {
        let q = ReprojectionMatrix([
            [1.0, 0.0, 0.0, -4.0],
            [0.0, 1.0, 0.0, -2.0],
            [0.0, 0.0, 0.0, 50.0],
            [0.0, 0.0, 0.5, 0.0],
        ]);
        // w = 0.5 * 4 = 2
        let cleaned = Array2::from_elem((3, 3), 4.0f32);
        let full = reproject_to_3d(&cleaned, &q, 1.0).unwrap();
        let half = reproject_to_3d(&cleaned, &q, 0.5).unwrap();

        assert_eq!(full.get(2, 1), [(2.0 - 4.0) / 2.0, (1.0 - 2.0) / 2.0, 25.0]);
        assert_eq!(half.get(2, 1), [(4.0 - 4.0) / 2.0, (2.0 - 2.0) / 2.0, 25.0]);
        assert!(reproject_to_3d(&cleaned, &q, 0.0).is_err());
        assert!(reproject_to_3d(&cleaned, &q, -1.0).is_err());
    }

    #[test]
    fn constant_disparity_colorizes_black() {
        let q = simple_q(0.0, 1.0, 10.0);
        let rgb = colorize_disparity(&DisparityMap::filled(5, 4, -7.0), &q);
        assert_eq!(rgb.dimensions(), (5, 4));
        assert!(rgb.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn colorize_blacks_out_masked_pixels() {
        let q = simple_q(1.0, 0.0, 100.0);
        let raw = DisparityMap::from_array(arr2(&[[-4.0, 2.0], [-NO_MATCH, -10.0]]));
        let rgb = colorize_disparity(&raw, &q);

        assert_eq!(*rgb.get_pixel(1, 0), Rgb([0, 0, 0]));
        assert_eq!(*rgb.get_pixel(0, 1), Rgb([0, 0, 0]));
        // lowest valid disparity maps to the cold end, highest to the hot end
        assert_eq!(*rgb.get_pixel(0, 0), crate::colormap::jet(0));
        assert_eq!(*rgb.get_pixel(1, 1), crate::colormap::jet(255));
    }
}
