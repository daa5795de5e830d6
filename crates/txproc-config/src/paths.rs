//! Socket path derivation and directory preparation.

use std::fs::DirBuilder;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Broker-side socket paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoints {
    /// Datagram socket path.
    pub datagram: Utf8PathBuf,
    /// Stream socket path.
    pub stream: Utf8PathBuf,
}

/// Process-local paths the application binds before dialling the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSocketPaths {
    /// Local datagram socket path.
    pub datagram: Utf8PathBuf,
    /// Local stream socket path.
    pub stream: Utf8PathBuf,
}

impl LocalSocketPaths {
    /// Derives `<dir>/<app>[.<pid>].sock` and `<dir>/<app>[.<pid>]stream.sock`.
    #[must_use]
    pub fn derive(dir: &Utf8Path, app_name: &str, pid: Option<u32>) -> Self {
        let stem = match pid {
            Some(pid) => format!("{app_name}.{pid}"),
            None => app_name.to_owned(),
        };
        Self {
            datagram: dir.join(format!("{stem}.sock")),
            stream: dir.join(format!("{stem}stream.sock")),
        }
    }

    /// Ensures the directory holding both sockets exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingParent`] for a bare file name and
    /// [`ConfigError::CreateDirectory`] when the directory cannot be created.
    pub fn prepare_filesystem(&self) -> Result<(), ConfigError> {
        let Some(parent) = self
            .datagram
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
        else {
            return Err(ConfigError::MissingParent {
                path: self.datagram.clone(),
            });
        };
        prepare_directory(parent)
    }
}

/// Creates `dir` and its ancestors with owner-only permissions.
///
/// # Errors
///
/// Returns [`ConfigError::CreateDirectory`] when creation fails for any reason
/// other than the directory already existing.
pub fn prepare_directory(dir: &Utf8Path) -> Result<(), ConfigError> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }

    if let Err(source) = builder.create(dir.as_std_path())
        && source.kind() != std::io::ErrorKind::AlreadyExists
    {
        return Err(ConfigError::CreateDirectory {
            path: dir.to_path_buf(),
            source,
        });
    }
    Ok(())
}

/// Errors raised while interpreting configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Only one of the two broker socket paths was configured.
    #[error("broker configuration is incomplete: {missing} is not set")]
    IncompleteBroker {
        /// Name of the missing setting.
        missing: &'static str,
    },
    /// A socket path had no parent directory.
    #[error("socket path '{path}' has no parent directory")]
    MissingParent {
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// Creating a directory failed.
    #[error("failed to create directory '{path}': {source}")]
    CreateDirectory {
        /// Directory being created.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}
