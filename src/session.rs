//! High-level matching session over an [`ApiController`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::GrayImage;
use log::{debug, info, warn};

use crate::config::SessionConfig;
use crate::controller::ApiController;
use crate::disparity::DisparityMap;
use crate::error::{Error, Result};
use crate::params::{MatcherParameters, ParamValue, Parameter};
use crate::process::{ChildProcess, LineTransport};
use crate::protocol::{self, CMD_INIT};

/// Fixed file names inside the working directory. The matcher writes its
/// result to `DISPARITY_FILE`; the names are part of its file contract.
pub const LEFT_IMAGE_FILE: &str = "left_tmp.png";
pub const RIGHT_IMAGE_FILE: &str = "right_tmp.png";
pub const DISPARITY_FILE: &str = "disparity.tif";

/// Calibration files for matcher-side rectification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationFiles {
    pub left: PathBuf,
    pub right: PathBuf,
}

/// An initialized matcher plus its working directory.
///
/// A session only exists once `INIT` has succeeded. Dropping it terminates
/// the matcher; [`close`](MatchingSession::close) does the same and reports
/// errors.
pub struct MatchingSession<T: LineTransport = ChildProcess> {
    controller: ApiController<T>,
    work_dir: PathBuf,
}

impl MatchingSession<ChildProcess> {
    /// Stages the license, launches the matcher, sends `INIT` and applies the
    /// configured parameters.
    pub fn initialize(config: &SessionConfig) -> Result<Self> {
        let executable = config.resolve_executable()?;
        if let Some(license) = &config.license_file {
            stage_license(license, &executable)?;
        }
        let controller = ApiController::spawn(&executable)?;
        let mut session = Self::from_controller(controller, &config.work_dir)?;
        session.apply_parameters(&config.parameters)?;
        Ok(session)
    }
}

impl<T: LineTransport> MatchingSession<T> {
    /// Sends `INIT` over an already started controller. On failure the
    /// controller is dropped, which terminates the matcher.
    pub fn from_controller(mut controller: ApiController<T>, work_dir: &Path) -> Result<Self> {
        check_path(work_dir)?;
        fs::create_dir_all(work_dir)?;
        let response = controller.request(CMD_INIT)?;
        info!("matcher initialized: {}", response);
        Ok(Self {
            controller,
            work_dir: work_dir.to_path_buf(),
        })
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn controller(&self) -> &ApiController<T> {
        &self.controller
    }

    /// Location the matcher writes its disparity result to.
    pub fn disparity_path(&self) -> PathBuf {
        self.work_dir.join(DISPARITY_FILE)
    }

    /// Sets a parameter by wire name (`SET_WINDOW_SIZE`) or alias
    /// (`window_size`). Unknown names are rejected before anything is sent.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<ParamValue>) -> Result<()> {
        let param = Parameter::from_name(name)?;
        self.set(param, value.into())
    }

    pub fn set(&mut self, param: Parameter, value: ParamValue) -> Result<()> {
        let command = param.encode(value)?;
        self.controller.request(&command)?;
        debug!("{} = {}", param, value);
        Ok(())
    }

    pub fn set_min_disparity(&mut self, value: i64) -> Result<()> {
        self.set(Parameter::MinDisparity, ParamValue::Int(value))
    }

    pub fn set_disparity_range(&mut self, value: i64) -> Result<()> {
        self.set(Parameter::DisparityRange, ParamValue::Int(value))
    }

    pub fn set_window_size(&mut self, value: i64) -> Result<()> {
        self.set(Parameter::WindowSize, ParamValue::Int(value))
    }

    pub fn set_pyramid_level(&mut self, value: i64) -> Result<()> {
        self.set(Parameter::PyramidLevel, ParamValue::Int(value))
    }

    pub fn enable_interpolation(&mut self, enable: bool) -> Result<()> {
        self.set(Parameter::Interpolation, ParamValue::Bool(enable))
    }

    pub fn apply_parameters(&mut self, parameters: &MatcherParameters) -> Result<()> {
        for (param, value) in parameters.to_requests() {
            self.set(param, value)?;
        }
        Ok(())
    }

    /// Runs `FORWARD_MATCH` on image files and returns the disparity path.
    ///
    /// With `calibration` the matcher rectifies the pair itself; otherwise the
    /// inputs must already be rectified.
    pub fn match_files(
        &mut self,
        left: &Path,
        right: &Path,
        calibration: Option<&CalibrationFiles>,
    ) -> Result<PathBuf> {
        // fail before touching the work dir
        self.ensure_usable()?;
        let work_dir = check_path(&self.work_dir)?;
        let left = check_path(left)?;
        let right = check_path(right)?;
        let command = match calibration {
            None => protocol::forward_match(left, right, work_dir),
            Some(cal) => protocol::forward_match_rectify(
                left,
                right,
                check_path(&cal.left)?,
                check_path(&cal.right)?,
                work_dir,
            ),
        };

        let disparity_path = self.disparity_path();
        match fs::remove_file(&disparity_path) {
            Ok(()) => debug!("removed stale {}", disparity_path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        self.controller.request(&command)?;
        Ok(disparity_path)
    }

    /// Matches a rectified pair and reads back the disparity.
    pub fn match_rectified_pair(
        &mut self,
        left: &GrayImage,
        right: &GrayImage,
    ) -> Result<DisparityMap> {
        self.match_staged(left, right, None)
    }

    /// Matches an unrectified pair, letting the matcher rectify it with the
    /// given calibration files.
    pub fn match_pair_with_calibration(
        &mut self,
        left: &GrayImage,
        right: &GrayImage,
        calibration: &CalibrationFiles,
    ) -> Result<DisparityMap> {
        self.match_staged(left, right, Some(calibration))
    }

    fn match_staged(
        &mut self,
        left: &GrayImage,
        right: &GrayImage,
        calibration: Option<&CalibrationFiles>,
    ) -> Result<DisparityMap> {
        if left.dimensions() != right.dimensions() {
            return Err(Error::InvalidInput(format!(
                "image sizes differ: {:?} vs {:?}",
                left.dimensions(),
                right.dimensions()
            )));
        }
        self.ensure_usable()?;
        let left_path = self.work_dir.join(LEFT_IMAGE_FILE);
        let right_path = self.work_dir.join(RIGHT_IMAGE_FILE);
        left.save(&left_path)?;
        right.save(&right_path)?;

        let disparity_path = self.match_files(&left_path, &right_path, calibration)?;
        self.read_disparity_file(&disparity_path)
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.controller.is_usable() {
            Ok(())
        } else {
            Err(Error::NotReady(self.controller.state()))
        }
    }

    /// Reads the disparity the last successful match left in the work dir.
    pub fn read_disparity(&self) -> Result<DisparityMap> {
        self.read_disparity_file(&self.disparity_path())
    }

    fn read_disparity_file(&self, path: &Path) -> Result<DisparityMap> {
        if !path.is_file() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "matcher reported success but {} is missing",
                    path.display()
                ),
            )));
        }
        DisparityMap::read_tiff(path)
    }

    /// Terminates the matcher.
    pub fn close(mut self) -> Result<()> {
        self.controller.close()
    }
}

/// Copies the license file into the executable's directory.
pub fn stage_license(license: &Path, executable: &Path) -> Result<PathBuf> {
    if !license.exists() {
        return Err(Error::License(format!(
            "{} does not exist",
            license.display()
        )));
    }
    if !license.is_file() {
        return Err(Error::License(format!(
            "{} is not a regular file",
            license.display()
        )));
    }
    let file_name = license
        .file_name()
        .ok_or_else(|| Error::License(format!("{} has no file name", license.display())))?;
    let install_dir = executable
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let target = install_dir.join(file_name);
    fs::copy(license, &target)?;
    info!("staged license {} -> {}", license.display(), target.display());
    Ok(target)
}

fn check_path(path: &Path) -> Result<&str> {
    match path.to_str() {
        Some(s) if protocol::check_field(s) => Ok(s),
        _ => {
            warn!("path cannot be sent to the matcher: {}", path.display());
            Err(Error::InvalidInput(format!(
                "path must be valid UTF-8 without commas or line breaks: {}",
                path.display()
            )))
        }
    }
}
