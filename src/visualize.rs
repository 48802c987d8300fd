//! Display helpers: 8-bit normalization and aspect-preserving resize.

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma, Pixel};
use ndarray::Array2;

use crate::error::{Error, Result};

/// Min-max normalizes `values` into `0..=255`.
///
/// A constant buffer (max == min) yields an all-zero image.
pub fn scale_disparity(values: &Array2<f32>) -> GrayImage {
    let (rows, cols) = values.dim();
    let mut out = GrayImage::new(cols as u32, rows as u32);
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = max - min;
    if !(span.is_finite() && span > 0.0) {
        return out;
    }
    let alpha = 255.0 / span;
    let beta = -min * alpha;
    for ((i, j), &v) in values.indexed_iter() {
        let scaled = (v * alpha + beta).abs().round().min(255.0);
        out.put_pixel(j as u32, i as u32, Luma([scaled as u8]));
    }
    out
}

/// Resizes to the given width or height, deriving the other dimension from
/// the aspect ratio. With neither set the image is returned unchanged.
/// Setting both is rejected.
pub fn resize_to_height_or_width<P>(
    image: &ImageBuffer<P, Vec<P::Subpixel>>,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<ImageBuffer<P, Vec<P::Subpixel>>>
where
    P: Pixel + 'static,
    P::Subpixel: 'static,
{
    let (w, h) = image.dimensions();
    let (new_w, new_h) = match (width, height) {
        (None, None) => return Ok(image.clone()),
        (Some(_), Some(_)) => {
            return Err(Error::InvalidInput(
                "resize takes a target width or a target height, not both".into(),
            ))
        }
        (Some(0), None) | (None, Some(0)) => {
            return Err(Error::InvalidInput("resize target must be non-zero".into()))
        }
        _ if w == 0 || h == 0 => {
            return Err(Error::InvalidInput("cannot resize an empty image".into()))
        }
        (None, Some(target)) => {
            let scaled = (f64::from(w) * f64::from(target) / f64::from(h)).round();
            ((scaled as u32).max(1), target)
        }
        (Some(target), None) => {
            let scaled = (f64::from(h) * f64::from(target) / f64::from(w)).round();
            (target, (scaled as u32).max(1))
        }
    };
    Ok(imageops::resize(image, new_w, new_h, FilterType::Triangle))
}
