//! Storing events in files.

use std::fs;
use std::path::Path;

use super::{ParseMode, decode};
use crate::error::PersistError;
use crate::event::Event;

impl Event {
    /// Writes the encoded frame to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Encode`] when the event cannot be encoded and
    /// [`PersistError::Io`] when the file cannot be written.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let frame = self.encode()?;
        let target = path.as_ref();
        fs::write(target, frame).map_err(|source| PersistError::Io {
            path: target.to_path_buf(),
            source,
        })
    }

    /// Loads an event previously stored with [`Event::write_to_file`].
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Io`] when the file cannot be read and
    /// [`PersistError::Decode`] when it does not hold exactly one frame.
    pub fn read_from_file(path: impl AsRef<Path>, mode: ParseMode) -> Result<Self, PersistError> {
        let source_path = path.as_ref();
        let frame = fs::read(source_path).map_err(|source| PersistError::Io {
            path: source_path.to_path_buf(),
            source,
        })?;
        Ok(decode(&frame, mode)?)
    }
}
