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

//! Engine-agnostic torrent domain model for the swarmview pipeline.
//!
//! The types in this crate describe one tracked torrent as the pipeline sees
//! it: the raw record read from the external engine ([`TorrentFields`]), the
//! per-torrent cached snapshot that diffs consecutive refreshes
//! ([`TorrentSnapshot`]), and the interfaces through which the engine is
//! queried, commanded, and listened to.

/// Engine-facing interfaces and the asynchronous command payload.
pub mod engine;
/// Domain value types shared across the workspace.
pub mod model;
/// Per-torrent cached snapshot and refresh diffing.
pub mod snapshot;

pub use engine::{CommandRequest, CommandSink, EngineNotice, EngineView, Tag};
pub use model::{
    Activity, ChangeFlags, ErrorKind, Percents, Priority, TorrentFields, TorrentId,
};
pub use snapshot::TorrentSnapshot;
