#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Debounced directory ingestion.
//!
//! Dropping a file into the watch directory does not mean it is complete:
//! browsers and other tools write in bursts. A candidate is only handed over
//! for ingestion once its mtime has been quiet for the full quiescence
//! window, checked by a shared once-per-second poll that only runs while
//! candidates are tracked.

/// Watch-directory error primitives.
pub mod error;
/// Candidate tracking and the poll loop.
pub mod watcher;

pub use error::{WatchDirError, WatchDirResult};
pub use watcher::{WatchDir, WatchDirCommand, WatchDirHandle, spawn};
