//! Line format of the worker log.
//!
//! The worker writes one log line per event into `<log_dir>/<app>.log`, or
//! onto standard error when `log_to_stderr` is set. The format is chosen with
//! `--log-format`, `TXPROC_LOG_FORMAT` or `log_format` in the TOML file and
//! parses case-insensitively.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How each worker log line is rendered.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per line with event fields flattened, for log shippers.
    Json,
    /// Timestamp, level, target and message on a single line.
    #[default]
    Compact,
}

/// Error returned when `log_format` names neither `json` nor `compact`.
pub type LogFormatParseError = strum::ParseError;
