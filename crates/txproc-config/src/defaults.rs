use camino::Utf8Path;

use crate::logging::LogFormat;

/// Directory holding log files and local socket files.
pub const DEFAULT_LOG_DIR: &str = "/var/log/txProc";

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log directory.
#[must_use]
pub fn default_log_dir() -> &'static Utf8Path {
    Utf8Path::new(DEFAULT_LOG_DIR)
}

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}
