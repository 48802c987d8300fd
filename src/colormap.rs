use image::{GrayImage, Rgb, RgbImage};

/// Jet colour for an 8-bit intensity: dark blue at 0 through cyan, yellow
/// and red to dark red at 255.
pub fn jet(value: u8) -> Rgb<u8> {
    let t = f32::from(value) / 255.0;
    let channel = |offset: f32| {
        let c = (1.5 - (4.0 * t - offset).abs()).max(0.0).min(1.0);
        (c * 255.0).round() as u8
    };
    Rgb([channel(3.0), channel(2.0), channel(1.0)])
}

/// Maps every pixel of `gray` through [`jet`].
pub fn apply_jet(gray: &GrayImage) -> RgbImage {
    let lut: Vec<Rgb<u8>> = (0..=255u8).map(jet).collect();
    let mut out = RgbImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        out.put_pixel(x, y, lut[pixel[0] as usize]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_dark_blue_and_dark_red() {
        assert_eq!(jet(0), Rgb([0, 0, 128]));
        assert_eq!(jet(255), Rgb([128, 0, 0]));
    }

    #[test]
    fn midpoint_is_green_dominant() {
        let Rgb([r, g, b]) = jet(128);
        assert_eq!(g, 255);
        assert!(r > 100 && b > 100);
    }

    #[test]
    fn no_intensity_maps_to_black() {
        assert!((0..=255u8).all(|v| jet(v) != Rgb([0, 0, 0])));
    }

    #[test]
    fn apply_keeps_dimensions() {
        let gray = GrayImage::from_raw(2, 1, vec![0, 255]).unwrap();
        let rgb = apply_jet(&gray);
        assert_eq!(rgb.dimensions(), (2, 1));
        assert_eq!(*rgb.get_pixel(1, 0), Rgb([128, 0, 0]));
    }
}
