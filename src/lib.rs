//! Bridge to the I3DR semi-global matcher running as a child process, plus
//! reprojection of its disparity output to depth.
//!
//! ```no_run
//! use sgm_pipe::{depth_from_disparity, MatchingSession, ReprojectionMatrix, SessionConfig};
//!
//! # fn main() -> sgm_pipe::Result<()> {
//! let config = SessionConfig::default().with_matcher_dir("/opt/i3drsgm");
//! let mut session = MatchingSession::initialize(&config)?;
//! session.set_disparity_range(3264)?;
//! session.enable_interpolation(false)?;
//!
//! let left = image::open("left_rect.png")?.to_luma8();
//! let right = image::open("right_rect.png")?.to_luma8();
//! let disparity = session.match_rectified_pair(&left, &right)?;
//! session.close()?;
//!
//! let q = ReprojectionMatrix::new([
//!     [1.0, 0.0, 0.0, -1224.0],
//!     [0.0, 1.0, 0.0, -1024.0],
//!     [0.0, 0.0, 0.0, 3570.0],
//!     [0.0, 0.0, 8.33, 0.0],
//! ]);
//! let depth = depth_from_disparity(&disparity, &q, 1.0)?;
//! println!("{:?}", depth.range);
//! # Ok(())
//! # }
//! ```

pub mod colormap;
pub mod config;
pub mod controller;
pub mod disparity;
pub mod error;
pub mod params;
pub mod process;
pub mod protocol;
pub mod reproject;
pub mod session;
pub mod visualize;

pub use config::SessionConfig;
pub use controller::{ApiController, ControllerState};
pub use disparity::{DisparityMap, NO_MATCH};
pub use error::{Error, Result};
pub use params::{MatcherParameters, ParamValue, Parameter};
pub use process::{ChildProcess, LineTransport};
pub use protocol::ProtocolLine;
pub use reproject::{
    colorize_disparity, depth_from_disparity, invert_and_mask_disparity, reproject_to_3d,
    CleanedDisparity, DepthMap, DepthResult, DisparityMask, ReprojectionMatrix,
};
pub use session::{CalibrationFiles, MatchingSession};
pub use visualize::{resize_to_height_or_width, scale_disparity};
