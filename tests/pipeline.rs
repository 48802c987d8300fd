mod common;

use image::{GrayImage, Luma, Rgb};
use ndarray::Array2;
use sgm_pipe::{
    colorize_disparity, depth_from_disparity, resize_to_height_or_width, DisparityMap,
    ReprojectionMatrix, NO_MATCH,
};

use common::{matcher_producing, session_with};

// f = 100 px, baseline 0.1 m, principal point (4, 3)
fn calibration() -> ReprojectionMatrix {
    ReprojectionMatrix::new([
        [1.0, 0.0, 0.0, -4.0],
        [0.0, 1.0, 0.0, -3.0],
        [0.0, 0.0, 0.0, 100.0],
        [0.0, 0.0, 10.0, 0.0],
    ])
}

/// Fronto-parallel plane at 1 m (disparity 10) and 2 m (disparity 5), with
/// one unmatched pixel and one pixel whose positive raw disparity would put
/// it behind the camera.
fn two_planes() -> DisparityMap {
    let data = Array2::from_shape_fn((6, 8), |(i, j)| match (i, j) {
        (0, 0) => NO_MATCH,
        (5, 7) => 4.0,
        (_, j) if j < 4 => -10.0,
        _ => -5.0,
    });
    DisparityMap::from_array(data)
}

#[test]
fn matched_pair_reprojects_to_planes() {
    let work = tempfile::tempdir().unwrap();
    let (matcher, _log) = matcher_producing(two_planes());
    let mut session = session_with(matcher, work.path()).unwrap();

    let frame = GrayImage::from_pixel(8, 6, Luma([90]));
    let disparity = session.match_rectified_pair(&frame, &frame).unwrap();
    session.close().unwrap();

    let result = depth_from_disparity(&disparity, &calibration(), 1.0).unwrap();
    let depth = &result.depth;
    assert_eq!((depth.width(), depth.height()), (8, 6));

    let near = depth.get(1, 2);
    assert!((near[2] - 1.0).abs() < 1e-6);
    assert!((near[0] - (1.0 - 4.0) / 100.0).abs() < 1e-6);
    assert!((near[1] - (2.0 - 3.0) / 100.0).abs() < 1e-6);
    let far = depth.get(6, 4);
    assert!((far[2] - 2.0).abs() < 1e-6);

    assert_eq!(depth.get(0, 0), [0.0, 0.0, 0.0]);
    assert_eq!(depth.get(7, 5), [0.0, 0.0, 0.0]);
    let (lo, hi) = result.range.unwrap();
    assert!((lo - 1.0).abs() < 1e-6 && (hi - 2.0).abs() < 1e-6);
}

#[test]
fn downsampled_depth_keeps_full_resolution_geometry() {
    let disparity = two_planes();
    let half = disparity.downsample(0.5).unwrap();
    assert_eq!((half.width(), half.height()), (4, 3));

    let result = depth_from_disparity(&half, &calibration(), 0.5).unwrap();
    // half-res pixel (1, 1) sits at full-res (2, 2) on the near plane
    let p = result.depth.get(1, 1);
    assert!((p[2] - 1.0).abs() < 1e-6);
    assert!((p[0] - (2.0 - 4.0) / 100.0).abs() < 1e-6);
}

#[test]
fn colormap_preview_masks_invalid_pixels() {
    let colormap = colorize_disparity(&two_planes(), &calibration());
    assert_eq!(colormap.dimensions(), (8, 6));
    assert_eq!(*colormap.get_pixel(0, 0), Rgb([0, 0, 0]));
    assert_eq!(*colormap.get_pixel(7, 5), Rgb([0, 0, 0]));
    // nearer plane has the larger disparity and the hotter color
    assert_ne!(colormap.get_pixel(1, 1), colormap.get_pixel(6, 1));
    assert_ne!(*colormap.get_pixel(1, 1), Rgb([0, 0, 0]));

    let preview = resize_to_height_or_width(&colormap, None, Some(12)).unwrap();
    assert_eq!(preview.dimensions(), (16, 12));
}

#[test]
fn colormap_of_downsampled_map_matches_full_resolution() {
    let full = colorize_disparity(&two_planes(), &calibration());
    let half = colorize_disparity(&two_planes().downsample(0.5).unwrap(), &calibration());
    assert_eq!(half.dimensions(), (4, 3));
    for (x, y, pixel) in half.enumerate_pixels() {
        assert_eq!(pixel, full.get_pixel(x * 2, y * 2));
    }
}
