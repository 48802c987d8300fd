use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::controller::ControllerState;

/// Errors surfaced by the matcher bridge and the reprojection helpers.
#[derive(Debug, Error)]
pub enum Error {
    /// The matcher executable could not be found or started.
    #[error("failed to launch matcher `{}`: {source}", path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The pipe protocol broke down (stream closed, write failed, missing pipe).
    #[error("matcher protocol failure: {0}")]
    Protocol(String),
    /// The matcher answered with an `ERROR,` payload. The message is kept verbatim.
    #[error("request rejected by matcher: {0}")]
    RequestRejected(String),
    /// Parameter name outside the supported set. Rejected without contacting the matcher.
    #[error("unknown matcher parameter: {0}")]
    InvalidParameter(String),
    #[error("invalid value `{value}` for parameter {parameter}")]
    InvalidValue { parameter: &'static str, value: String },
    /// A request was attempted while the controller could not accept one.
    #[error("matcher controller is not ready (state: {0:?})")]
    NotReady(ControllerState),
    #[error("license file error: {0}")]
    License(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unsupported disparity format: {0}")]
    UnsupportedFormat(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("tiff error: {0}")]
    Tiff(#[from] tiff::TiffError),
    #[error("failed to parse config: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error leaves the controller unusable for further requests.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Launch { .. } | Error::Protocol(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
