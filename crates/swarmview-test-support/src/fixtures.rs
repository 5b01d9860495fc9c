//! Deterministic torrent record fixtures.

use swarmview_core::{TorrentFields, TorrentId, TorrentSnapshot};

/// A stopped, healthy torrent record distinguished only by `name`.
///
/// Everything else is deterministic so tests can refresh against the same
/// record and rely on an empty change set.
#[must_use]
pub fn fields(name: &str) -> TorrentFields {
    TorrentFields {
        name: name.to_string(),
        file_count: 1,
        first_file_name: name.to_string(),
        has_metadata: true,
        total_size: 1 << 20,
        size_when_done: 1 << 20,
        left_until_done: 1 << 20,
        trackers: vec!["https://tracker.example.net/announce".to_string()],
        ..TorrentFields::default()
    }
}

/// Snapshot of a [`fields`] record under the given identity.
#[must_use]
pub fn snapshot(id: i64, name: &str) -> TorrentSnapshot {
    TorrentSnapshot::new(TorrentId(id), &fields(name))
}
