//! Matches a rectified stereo pair with the I3DR matcher and writes a jet
//! disparity preview plus an ASCII point cloud.
//!
//! ```text
//! cargo run --example match_pair -- <config.json> <left.png> <right.png> <q.json> [out_dir]
//! ```
//!
//! `q.json` holds the 4x4 reprojection matrix as nested arrays.

use std::env;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use log::{error, info};
use sgm_pipe::{
    colorize_disparity, depth_from_disparity, resize_to_height_or_width, MatchingSession,
    ReprojectionMatrix, SessionConfig,
};

const DOWNSAMPLE_RATE: f64 = 0.5;
const PREVIEW_HEIGHT: u32 = 640;

fn run(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let config = SessionConfig::from_json_file(Path::new(&args[1]))?;
    let left = image::open(&args[2])?.to_luma8();
    let right = image::open(&args[3])?.to_luma8();
    let q: ReprojectionMatrix = serde_json::from_str(&fs::read_to_string(&args[4])?)?;
    let out_dir = args.get(5).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&out_dir)?;

    let mut session = MatchingSession::initialize(&config)?;
    session.set_disparity_range(3264)?;
    session.enable_interpolation(false)?;

    info!("matching {}x{} pair", left.width(), left.height());
    let disparity = session.match_rectified_pair(&left, &right)?;
    session.close()?;

    let disparity = disparity.downsample(DOWNSAMPLE_RATE)?;

    let colormap = colorize_disparity(&disparity, &q);
    let preview = resize_to_height_or_width(&colormap, None, Some(PREVIEW_HEIGHT))?;
    preview.save(out_dir.join("disparity_jet.png"))?;

    let result = depth_from_disparity(&disparity, &q, DOWNSAMPLE_RATE)?;
    let depth = &result.depth;
    let shade = image::imageops::resize(
        &left,
        depth.width() as u32,
        depth.height() as u32,
        image::imageops::FilterType::Nearest,
    );

    let mut ply = BufWriter::new(File::create(out_dir.join("cloud.ply"))?);
    writeln!(ply, "ply\nformat ascii 1.0")?;
    writeln!(ply, "element vertex {}", depth.width() * depth.height())?;
    writeln!(ply, "property float x\nproperty float y\nproperty float z")?;
    writeln!(ply, "property uchar red\nproperty uchar green\nproperty uchar blue")?;
    writeln!(ply, "end_header")?;
    for (x, y, pixel) in shade.enumerate_pixels() {
        let [px, py, pz] = depth.get(x as usize, y as usize);
        let image::Luma([g]) = *pixel;
        writeln!(ply, "{} {} {} {} {} {}", px, py, pz, g, g, g)?;
    }
    ply.flush()?;
    Ok(())
}

pub fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    if args.len() < 5 {
        eprintln!(
            "usage: {} <config.json> <left.png> <right.png> <q.json> [out_dir]",
            args[0]
        );
        process::exit(2);
    }
    if let Err(err) = run(&args) {
        error!("{}", err);
        process::exit(1);
    }
}
