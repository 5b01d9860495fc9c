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

//! Reactive torrent collection: the observable store, the sort and filter
//! transforms with their change-classification tables, the composed visible
//! projection, and the cursor-based list adapter.
//!
//! Everything here is single-threaded by design; concurrency stops at the
//! session boundary one crate up.

/// Cursor/stamp bridge between positional storage and persistent handles.
pub mod adapter;
/// Collection error primitives.
pub mod error;
/// Pluggable visibility predicate with strictness classification.
pub mod filter;
/// Pluggable comparator with resort-avoidance classification.
pub mod sorter;
/// Ordered, observable torrent store.
pub mod store;
/// Composed sort+filter projection over the store.
pub mod view;

pub use adapter::{Cursor, ListAdapter};
pub use error::{CollectionError, CollectionResult};
pub use filter::{ActivityGroup, FilterChange, TorrentFilter};
pub use sorter::{SortChange, SortMode, TorrentSorter};
pub use store::{EntitiesChanged, Splice, SubscriptionId, TorrentStore};
pub use view::{TorrentListView, ViewEvent};
