//! Matcher parameters and their wire encoding.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Parameters the matcher accepts through `SET_*` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parameter {
    MinDisparity,
    DisparityRange,
    Interpolation,
    WindowSize,
    PyramidLevel,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Int,
    Flag,
}

struct ParamSpec {
    param: Parameter,
    command: &'static str,
    alias: &'static str,
    kind: ValueKind,
}

static PARAMS: [ParamSpec; 5] = [
    ParamSpec {
        param: Parameter::MinDisparity,
        command: "SET_MIN_DISPARITY",
        alias: "min_disparity",
        kind: ValueKind::Int,
    },
    ParamSpec {
        param: Parameter::DisparityRange,
        command: "SET_DISPARITY_RANGE",
        alias: "disparity_range",
        kind: ValueKind::Int,
    },
    ParamSpec {
        param: Parameter::Interpolation,
        command: "SET_INTERPOLATION",
        alias: "interpolation",
        kind: ValueKind::Flag,
    },
    ParamSpec {
        param: Parameter::WindowSize,
        command: "SET_WINDOW_SIZE",
        alias: "window_size",
        kind: ValueKind::Int,
    },
    ParamSpec {
        param: Parameter::PyramidLevel,
        command: "SET_PYRAMID_LEVEL",
        alias: "pyramid_level",
        kind: ValueKind::Int,
    },
];

impl Parameter {
    pub const ALL: [Parameter; 5] = [
        Parameter::MinDisparity,
        Parameter::DisparityRange,
        Parameter::Interpolation,
        Parameter::WindowSize,
        Parameter::PyramidLevel,
    ];

    fn spec(self) -> &'static ParamSpec {
        // PARAMS is indexed in declaration order
        &PARAMS[self as usize]
    }

    /// Command word sent on the wire, e.g. `SET_MIN_DISPARITY`.
    pub fn command(self) -> &'static str {
        self.spec().command
    }

    /// Resolves either the wire command (`SET_WINDOW_SIZE`) or the snake-case
    /// alias (`window_size`).
    pub fn from_name(name: &str) -> Result<Self> {
        let name = name.trim();
        PARAMS
            .iter()
            .find(|spec| spec.command == name || spec.alias.eq_ignore_ascii_case(name))
            .map(|spec| spec.param)
            .ok_or_else(|| Error::InvalidParameter(name.to_string()))
    }

    /// Builds the `NAME,value` request line, validating the value first.
    pub fn encode(self, value: ParamValue) -> Result<String> {
        let wire = match (self.spec().kind, value) {
            (ValueKind::Int, ParamValue::Int(v)) => v.to_string(),
            (ValueKind::Flag, ParamValue::Bool(b)) => (if b { "1" } else { "0" }).to_string(),
            (ValueKind::Flag, ParamValue::Int(v)) if v == 0 || v == 1 => v.to_string(),
            (_, other) => {
                return Err(Error::InvalidValue {
                    parameter: self.command(),
                    value: other.to_string(),
                })
            }
        };
        Ok(format!("{},{}", self.command(), wire))
    }
}

impl FromStr for Parameter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Parameter::from_name(s)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

/// Value carried by a parameter request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamValue {
    Int(i64),
    Bool(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(i64::from(v))
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(i64::from(v))
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

/// Initial parameter values applied right after `INIT`. Unset fields keep
/// the matcher's own defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherParameters {
    pub min_disparity: Option<i64>,
    pub disparity_range: Option<i64>,
    pub window_size: Option<i64>,
    pub pyramid_level: Option<i64>,
    pub interpolation: Option<bool>,
}

impl MatcherParameters {
    /// Set values in application order.
    pub fn to_requests(&self) -> Vec<(Parameter, ParamValue)> {
        let ints = [
            (Parameter::MinDisparity, self.min_disparity),
            (Parameter::DisparityRange, self.disparity_range),
            (Parameter::WindowSize, self.window_size),
            (Parameter::PyramidLevel, self.pyramid_level),
        ];
        let mut requests: Vec<(Parameter, ParamValue)> = ints
            .iter()
            .filter_map(|&(param, value)| value.map(|v| (param, ParamValue::Int(v))))
            .collect();
        if let Some(enable) = self.interpolation {
            requests.push((Parameter::Interpolation, ParamValue::Bool(enable)));
        }
        requests
    }
}
