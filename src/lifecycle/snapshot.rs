//! JSON snapshots written while the lifecycle scenario runs.

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Snapshot of the local-SSD instance after it was resumed.
pub const LOCAL_SSD_SNAPSHOT: &str = "local_ssd_instance.json";
/// Snapshot of the plain instance after it was restarted.
pub const NO_LOCAL_SSD_SNAPSHOT: &str = "no_local_ssd_instance.json";
/// Snapshot of every instance in every zone.
pub const LISTING_SNAPSHOT: &str = "list_instances.json";

/// Errors raised while persisting a snapshot.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SnapshotError {
    /// Raised when the value cannot be rendered as JSON.
    #[error("failed to serialise snapshot `{file}`: {message}")]
    Serialize {
        /// Snapshot file name.
        file: String,
        /// Serializer message.
        message: String,
    },
    /// Raised when the file cannot be written.
    #[error("failed to write snapshot `{path}`: {message}")]
    Write {
        /// Destination path.
        path: String,
        /// Underlying I/O message.
        message: String,
    },
}

/// Destination for snapshot files.
pub trait SnapshotWriter: Send + Sync {
    /// Stores `contents` under `file_name`, replacing any previous version.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Write`] when the contents cannot be stored.
    fn write(&self, file_name: &str, contents: &str) -> Result<(), SnapshotError>;
}

/// Writes snapshots as files inside a directory, creating it when missing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DirectorySnapshotWriter {
    dir: Utf8PathBuf,
}

impl DirectorySnapshotWriter {
    /// Creates a writer targeting `dir`.
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the target directory.
    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }
}

impl SnapshotWriter for DirectorySnapshotWriter {
    fn write(&self, file_name: &str, contents: &str) -> Result<(), SnapshotError> {
        let path = self.dir.join(file_name);
        crate::fs::write(&path, contents).map_err(|err| SnapshotError::Write {
            path: path.to_string(),
            message: err.to_string(),
        })
    }
}
