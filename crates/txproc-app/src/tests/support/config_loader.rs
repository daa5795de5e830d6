//! Configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;
use txproc_config::Config;

use crate::bootstrap::ConfigLoader;

/// Loader that points the log directory at a temporary directory.
pub struct TestConfigLoader {
    dir: TempDir,
    broker: Option<(Utf8PathBuf, Utf8PathBuf)>,
    append_pid: bool,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temporary directory"),
            broker: None,
            append_pid: false,
        }
    }

    /// Temporary directory backing this loader.
    pub fn root(&self) -> &Utf8Path {
        Utf8Path::from_path(self.dir.path()).expect("temporary directory path was not valid UTF-8")
    }

    /// Log directory handed out in the configuration.
    pub fn log_dir(&self) -> Utf8PathBuf {
        self.root().join("logs")
    }

    /// Configures both broker paths.
    pub fn with_broker(mut self, datagram: Utf8PathBuf, stream: Utf8PathBuf) -> Self {
        self.broker = Some((datagram, stream));
        self
    }

    /// Configures only the datagram broker path.
    pub fn with_datagram_only(mut self) -> Self {
        let datagram = self.root().join("broker.dgram");
        self.broker = Some((datagram, Utf8PathBuf::new()));
        self
    }

    /// Suffixes local socket names with the process id.
    pub fn with_pid_suffix(mut self) -> Self {
        self.append_pid = true;
        self
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let (broker_datagram_path, broker_stream_path) = match &self.broker {
            Some((datagram, stream)) => (
                Some(datagram.clone()),
                (!stream.as_str().is_empty()).then(|| stream.clone()),
            ),
            None => (None, None),
        };
        Ok(Config {
            log_dir: Some(self.log_dir()),
            broker_datagram_path,
            broker_stream_path,
            append_pid: self.append_pid,
            ..Config::default()
        })
    }
}

/// Loader that intentionally fails by pointing at malformed TOML.
pub struct FailingConfigLoader {
    dir: TempDir,
}

impl FailingConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temporary directory");
        std::fs::write(dir.path().join("broken.toml"), "log_filter = [unterminated")
            .expect("failed to write malformed configuration");
        Self { dir }
    }
}

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("txproc-app"),
            OsString::from("--config-path"),
            self.dir.path().join("broken.toml").into_os_string(),
        ];
        Config::load_from_iter(args)
    }
}
