//! Core torrent domain types shared across the workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

mod flags;
mod percents;

pub use flags::ChangeFlags;
pub use percents::Percents;

/// Stable integer identity assigned to a torrent by the external engine.
///
/// Identities are unique for the lifetime of an engine session and are never
/// reused, which is what lets the collection keep its entries ordered by
/// identity and binary-search them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct TorrentId(pub i64);

impl Display for TorrentId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, formatter)
    }
}

/// Lifecycle activity reported by the engine for a torrent.
///
/// The variant order mirrors the engine's numeric state progression; the
/// derived ordering is what "sort by state" relies on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    /// Paused, or never started.
    #[default]
    Stopped,
    /// Waiting in the verification queue.
    QueuedToVerify,
    /// Checking local data against the metainfo.
    Verifying,
    /// Waiting in the download queue.
    QueuedToDownload,
    /// Actively downloading payload data.
    Downloading,
    /// Waiting in the seed queue.
    QueuedToSeed,
    /// Complete and uploading to peers.
    Seeding,
}

/// Error classification attached to a torrent by the engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No error condition.
    #[default]
    Ok,
    /// The tracker returned a warning.
    TrackerWarning,
    /// The tracker returned an error.
    TrackerError,
    /// A local problem (disk, permissions) stopped the torrent.
    LocalError,
}

/// Bandwidth priority assigned to a torrent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Throttled below normal torrents.
    Low,
    /// Default priority level.
    #[default]
    Normal,
    /// Preferred over normal torrents.
    High,
}

/// Structured record read from the engine for one torrent during a refresh.
///
/// Fractional progress fields are raw fractions in `0.0..=1.0`; the snapshot
/// converts them to [`Percents`] so equality is exact across refreshes.
/// `ratio` may be [`f32::INFINITY`] when data was uploaded against a zero
/// download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentFields {
    /// Display name, or the metainfo hash before metadata arrives.
    pub name: String,
    /// Piece upload speed in KB/s.
    pub speed_up_kbps: f32,
    /// Piece download speed in KB/s.
    pub speed_down_kbps: f32,
    /// Peers we are uploading to.
    pub peers_getting_from_us: u16,
    /// Peers we are downloading from.
    pub peers_sending_to_us: u16,
    /// Webseeds we are downloading from.
    pub webseeds_sending_to_us: u16,
    /// Total connected peers.
    pub peers_connected: u16,
    /// Verification progress fraction.
    pub recheck_progress: f32,
    /// Current lifecycle activity.
    pub activity: Activity,
    /// Download progress fraction against the selected set.
    pub percent_done: f32,
    /// Download progress fraction against the whole payload.
    pub percent_complete: f32,
    /// Metadata download progress fraction (magnet bootstrap).
    pub metadata_percent_complete: f32,
    /// Seed-ratio goal progress fraction.
    pub seed_ratio_percent_done: f32,
    /// Whether the torrent finished its selected set and stopped.
    pub finished: bool,
    /// Bandwidth priority.
    pub priority: Priority,
    /// Position in the engine's queue.
    pub queue_position: u64,
    /// Announce URLs of the configured trackers.
    pub trackers: Vec<String>,
    /// Error classification.
    pub error_kind: ErrorKind,
    /// Human-readable error detail, empty when `error_kind` is `Ok`.
    pub error_message: String,
    /// Estimated seconds until completion; `None` when unknown.
    pub eta_seconds: Option<i64>,
    /// When the torrent was added to the engine.
    pub added_date: DateTime<Utc>,
    /// Total payload size in bytes.
    pub total_size: u64,
    /// Bytes wanted once the selected set completes.
    pub size_when_done: u64,
    /// Bytes still missing from the selected set.
    pub left_until_done: u64,
    /// Bytes downloaded and verified.
    pub have_valid: u64,
    /// Bytes downloaded but not yet verified.
    pub have_unchecked: u64,
    /// Bytes uploaded over the torrent's lifetime.
    pub uploaded_ever: u64,
    /// Upload/download ratio; may be infinite.
    pub ratio: f32,
    /// Seed-ratio stop threshold when one is configured.
    pub seed_ratio_limit: Option<f32>,
    /// Whether the engine considers transfer stalled.
    pub stalled: bool,
    /// Whether metainfo is available yet.
    pub has_metadata: bool,
    /// Number of files in the payload.
    pub file_count: u32,
    /// Relative path of the first payload file; empty before metadata.
    pub first_file_name: String,
}

impl Default for TorrentFields {
    fn default() -> Self {
        Self {
            name: String::new(),
            speed_up_kbps: 0.0,
            speed_down_kbps: 0.0,
            peers_getting_from_us: 0,
            peers_sending_to_us: 0,
            webseeds_sending_to_us: 0,
            peers_connected: 0,
            recheck_progress: 0.0,
            activity: Activity::Stopped,
            percent_done: 0.0,
            percent_complete: 0.0,
            metadata_percent_complete: 0.0,
            seed_ratio_percent_done: 0.0,
            finished: false,
            priority: Priority::Normal,
            queue_position: 0,
            trackers: Vec::new(),
            error_kind: ErrorKind::Ok,
            error_message: String::new(),
            eta_seconds: None,
            added_date: DateTime::UNIX_EPOCH,
            total_size: 0,
            size_when_done: 0,
            left_until_done: 0,
            have_valid: 0,
            have_unchecked: 0,
            uploaded_ever: 0,
            ratio: 0.0,
            seed_ratio_limit: None,
            stalled: false,
            has_metadata: false,
            file_count: 0,
            first_file_name: String::new(),
        }
    }
}
