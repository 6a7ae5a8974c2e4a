use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline error taxonomy.
///
/// `Config` and `Io` abort a stage before any output is written. `Geometry`
/// is raised per feature; batch loops skip the offending feature, log it
/// and keep going.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing/malformed configuration field or unregistered CRS code.
    #[error("configuration error: {0}")]
    Config(String),

    /// Degenerate segment or ring, unsnappable point, untriangulatable cap.
    #[error("geometry error: {0}")]
    Geometry(String),

    /// Unreadable input or unwritable output, reported with its path.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Error::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
