//! Session configuration.
//!
//! ```json
//! {
//!   "matcher_dir": "/opt/i3drsgm",
//!   "work_dir": "/tmp/sgm-pipe",
//!   "license_file": "/home/me/licenses/i3drsgm.lic",
//!   "parameters": {
//!     "min_disparity": 0,
//!     "disparity_range": 3264,
//!     "interpolation": false
//!   }
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::params::MatcherParameters;

#[cfg(windows)]
pub const EXECUTABLE_NAME: &str = "I3DRSGMApp.exe";
#[cfg(not(windows))]
pub const EXECUTABLE_NAME: &str = "I3DRSGMApp";

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("sgm-pipe")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory holding the matcher executable. Searched on `PATH` when unset.
    #[serde(default)]
    pub matcher_dir: Option<PathBuf>,
    /// Full executable path, takes precedence over `matcher_dir`.
    #[serde(default)]
    pub executable: Option<PathBuf>,
    /// Staging directory for input images and the disparity result. Must not
    /// be shared between concurrent sessions.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Copied next to the executable before launch.
    #[serde(default)]
    pub license_file: Option<PathBuf>,
    #[serde(default)]
    pub parameters: MatcherParameters,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            matcher_dir: None,
            executable: None,
            work_dir: default_work_dir(),
            license_file: None,
            parameters: MatcherParameters::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn with_matcher_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.matcher_dir = Some(dir.into());
        self
    }

    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self
    }

    pub fn with_license_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.license_file = Some(path.into());
        self
    }

    pub fn with_parameters(mut self, parameters: MatcherParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Locates the matcher: explicit path, then `matcher_dir`, then `PATH`.
    pub fn resolve_executable(&self) -> Result<PathBuf> {
        let candidate = match (&self.executable, &self.matcher_dir) {
            (Some(path), _) => path.clone(),
            (None, Some(dir)) => dir.join(EXECUTABLE_NAME),
            (None, None) => {
                return which::which(EXECUTABLE_NAME).map_err(|e| Error::Launch {
                    path: PathBuf::from(EXECUTABLE_NAME),
                    source: io::Error::new(io::ErrorKind::NotFound, e.to_string()),
                })
            }
        };
        if candidate.is_file() {
            Ok(candidate)
        } else {
            Err(Error::Launch {
                path: candidate,
                source: io::Error::new(io::ErrorKind::NotFound, "matcher executable not found"),
            })
        }
    }
}
