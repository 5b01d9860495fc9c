//! Watch-directory error primitives.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for watch-directory operations.
#[derive(Debug, Error)]
pub enum WatchDirError {
    /// The configured directory could not be read.
    #[error("watch directory unavailable")]
    DirectoryUnavailable {
        /// The configured path.
        path: PathBuf,
        /// Underlying IO failure.
        #[source]
        source: io::Error,
    },
}

/// Convenience alias for watch-directory results.
pub type WatchDirResult<T> = Result<T, WatchDirError>;
