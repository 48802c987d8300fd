//! Line protocol spoken by the matcher in `api` mode.
//!
//! The matcher interleaves free-form diagnostic output with exactly two kinds
//! of meaningful lines on stdout:
//!
//! ```text
//! API_READY                      the matcher accepts the next command
//! API_RESPONSE:<payload>         result of the last command
//! API_RESPONSE:ERROR,<message>   the last command failed
//! ```
//!
//! Commands are comma separated and newline terminated. Requests and
//! responses strictly alternate; a command may only be written after the
//! matcher has announced `API_READY`.

/// Argument selecting the pipe API mode of the matcher executable.
pub const API_MODE_ARG: &str = "api";
pub const READY_SENTINEL: &str = "API_READY";
pub const RESPONSE_MARKER: &str = "API_RESPONSE:";
pub const ERROR_TAG: &str = "ERROR,";

pub const CMD_INIT: &str = "INIT";
pub const CMD_FORWARD_MATCH: &str = "FORWARD_MATCH";

/// Classification of a single stdout read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolLine {
    Ready,
    ResponseOk(String),
    ResponseError(String),
    /// Diagnostic output, never forwarded to the caller.
    Unclassified(String),
    /// End of stream: the matcher exited or closed stdout.
    StreamClosed,
}

impl ProtocolLine {
    /// Classifies one raw line, `None` meaning the read returned nothing.
    pub fn classify(line: Option<&str>) -> Self {
        let line = match line {
            Some(line) => line,
            None => return ProtocolLine::StreamClosed,
        };
        let content = line.trim_end_matches(|c| c == '\r' || c == '\n');
        if content == READY_SENTINEL {
            return ProtocolLine::Ready;
        }
        match content.strip_prefix(RESPONSE_MARKER) {
            Some(payload) => match payload.strip_prefix(ERROR_TAG) {
                Some(message) => ProtocolLine::ResponseError(message.trim_end().to_string()),
                None => ProtocolLine::ResponseOk(payload.trim_end().to_string()),
            },
            None => ProtocolLine::Unclassified(content.to_string()),
        }
    }
}

/// Rejects fields that would corrupt a comma separated command line.
pub fn check_field(field: &str) -> bool {
    !field.is_empty() && !field.contains(|c| c == ',' || c == '\r' || c == '\n')
}

/// `FORWARD_MATCH,<left>,<right>,<workDir>`
pub fn forward_match(left: &str, right: &str, work_dir: &str) -> String {
    format!("{},{},{},{}", CMD_FORWARD_MATCH, left, right, work_dir)
}

/// `FORWARD_MATCH,<left>,<right>,<leftCal>,<rightCal>,<workDir>,0`: the
/// matcher rectifies the pair itself using the two calibration files.
pub fn forward_match_rectify(
    left: &str,
    right: &str,
    left_cal: &str,
    right_cal: &str,
    work_dir: &str,
) -> String {
    format!(
        "{},{},{},{},{},{},0",
        CMD_FORWARD_MATCH, left, right, left_cal, right_cal, work_dir
    )
}
