//! Per-torrent cached snapshot and refresh diffing.

use crate::model::{
    Activity, ChangeFlags, ErrorKind, Percents, Priority, TorrentFields, TorrentId,
};
use chrono::{DateTime, Utc};

/// Mime type reported for multi-file payloads.
const DIRECTORY_MIME_TYPE: &str = "inode/directory";
/// Mime type reported when nothing better is known.
const UNKNOWN_MIME_TYPE: &str = "application/octet-stream";

/// Epsilon for float-backed attributes (speeds, ratios).
const F32_EPSILON: f32 = 0.01;

fn update<T: PartialEq>(slot: &mut T, value: T, flag: ChangeFlags, changes: &mut ChangeFlags) {
    if *slot != value {
        *slot = value;
        changes.insert(flag);
    }
}

fn update_f32(slot: &mut f32, value: f32, flag: ChangeFlags, changes: &mut ChangeFlags) {
    if (*slot - value).abs() >= F32_EPSILON {
        *slot = value;
        changes.insert(flag);
    }
}

fn update_str(slot: &mut String, value: &str, flag: ChangeFlags, changes: &mut ChangeFlags) {
    if slot != value {
        slot.clear();
        slot.push_str(value);
        changes.insert(flag);
    }
}

/// Shift-xor hash over the configured announce URLs.
///
/// Only inequality matters: the tracker list is re-derived when the hash
/// moves, so collisions cost a missed notification, not a wrong one.
fn trackers_hash(trackers: &[String]) -> u64 {
    let mut hash = 0_u64;
    for announce in trackers {
        for byte in announce.bytes() {
            hash = (hash << 4) ^ (hash >> 28) ^ u64::from(byte);
        }
    }
    hash
}

fn host_from_url(url: &str) -> Option<String> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?']).next().unwrap_or(rest);
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = host.split(':').next().unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

fn tracker_hosts(trackers: &[String]) -> Vec<String> {
    let mut hosts: Vec<String> = trackers.iter().filter_map(|url| host_from_url(url)).collect();
    hosts.sort_unstable();
    hosts.dedup();
    hosts
}

fn mime_for_filename(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext) {
        Some("mkv") => "video/x-matroska",
        Some("mp4") => "video/mp4",
        Some("avi") => "video/x-msvideo",
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("iso") => "application/x-iso9660-image",
        Some("zip") => "application/zip",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        _ => UNKNOWN_MIME_TYPE,
    }
}

fn mime_type(fields: &TorrentFields) -> &'static str {
    if fields.file_count == 0 {
        UNKNOWN_MIME_TYPE
    } else if fields.file_count > 1 || fields.first_file_name.contains('/') {
        DIRECTORY_MIME_TYPE
    } else {
        mime_for_filename(&fields.first_file_name)
    }
}

/// Last-known attribute values of one engine torrent.
///
/// [`TorrentSnapshot::refresh`] overwrites the cache from a freshly read
/// [`TorrentFields`] record and reports exactly which attribute groups moved,
/// so a refresh that changed nothing costs the pipeline nothing downstream.
#[derive(Debug, Clone)]
pub struct TorrentSnapshot {
    id: TorrentId,

    name: String,
    name_collated: String,
    mime_type: &'static str,

    have_unchecked: u64,
    have_valid: u64,
    left_until_done: u64,
    size_when_done: u64,
    total_size: u64,
    uploaded_ever: u64,

    queue_position: u64,
    added_date: DateTime<Utc>,
    eta_seconds: Option<i64>,
    activity: Activity,

    trackers_hash: u64,
    tracker_hosts: Vec<String>,

    active_peer_count: u32,
    active_peers_down: u32,
    active_peers_up: u16,
    error_kind: ErrorKind,
    error_message: String,

    activity_percent_done: Percents,
    metadata_percent_complete: Percents,
    percent_complete: Percents,
    percent_done: Percents,
    recheck_progress: Percents,
    seed_ratio_percent_done: Percents,

    peers_connected: u16,
    peers_getting_from_us: u16,
    peers_sending_to_us: u16,
    webseeds_sending_to_us: u16,

    ratio: f32,
    seed_ratio: f32,
    speed_down: f32,
    speed_up: f32,

    priority: Priority,

    active: bool,
    finished: bool,
    has_metadata: bool,
    has_seed_ratio: bool,
    stalled: bool,
}

impl TorrentSnapshot {
    /// Build a snapshot for a newly reported torrent from its first record.
    #[must_use]
    pub fn new(id: TorrentId, fields: &TorrentFields) -> Self {
        let mut snapshot = Self {
            id,
            name: String::new(),
            name_collated: String::new(),
            mime_type: UNKNOWN_MIME_TYPE,
            have_unchecked: 0,
            have_valid: 0,
            left_until_done: 0,
            size_when_done: 0,
            total_size: 0,
            uploaded_ever: 0,
            queue_position: 0,
            added_date: DateTime::UNIX_EPOCH,
            eta_seconds: None,
            activity: Activity::Stopped,
            trackers_hash: 0,
            tracker_hosts: Vec::new(),
            active_peer_count: 0,
            active_peers_down: 0,
            active_peers_up: 0,
            error_kind: ErrorKind::Ok,
            error_message: String::new(),
            activity_percent_done: Percents::ZERO,
            metadata_percent_complete: Percents::ZERO,
            percent_complete: Percents::ZERO,
            percent_done: Percents::ZERO,
            recheck_progress: Percents::ZERO,
            seed_ratio_percent_done: Percents::ZERO,
            peers_connected: 0,
            peers_getting_from_us: 0,
            peers_sending_to_us: 0,
            webseeds_sending_to_us: 0,
            ratio: 0.0,
            seed_ratio: 0.0,
            speed_down: 0.0,
            speed_up: 0.0,
            priority: Priority::Normal,
            active: false,
            finished: false,
            has_metadata: false,
            has_seed_ratio: false,
            stalled: false,
        };
        let _ = snapshot.refresh(fields);
        snapshot
    }

    /// Overwrite the cache from a fresh engine record.
    ///
    /// Returns the union of every attribute-group bit whose backing value
    /// differs from the previous refresh; an empty result means callers must
    /// not notify downstream.
    pub fn refresh(&mut self, fields: &TorrentFields) -> ChangeFlags {
        let mut changes = ChangeFlags::empty();

        update_str(&mut self.name, &fields.name, ChangeFlags::NAME, &mut changes);
        update_f32(
            &mut self.speed_up,
            fields.speed_up_kbps,
            ChangeFlags::SPEED_UP,
            &mut changes,
        );
        update_f32(
            &mut self.speed_down,
            fields.speed_down_kbps,
            ChangeFlags::SPEED_DOWN,
            &mut changes,
        );
        update(
            &mut self.active_peers_up,
            fields.peers_getting_from_us,
            ChangeFlags::ACTIVE_PEERS_UP,
            &mut changes,
        );
        update(
            &mut self.active_peers_down,
            u32::from(fields.peers_sending_to_us) + u32::from(fields.webseeds_sending_to_us),
            ChangeFlags::ACTIVE_PEERS_DOWN,
            &mut changes,
        );
        update(
            &mut self.recheck_progress,
            Percents::from_fraction(fields.recheck_progress),
            ChangeFlags::RECHECK_PROGRESS,
            &mut changes,
        );
        update(
            &mut self.active,
            fields.peers_sending_to_us > 0
                || fields.peers_getting_from_us > 0
                || fields.activity == Activity::Verifying,
            ChangeFlags::ACTIVE,
            &mut changes,
        );
        update(
            &mut self.activity,
            fields.activity,
            ChangeFlags::ACTIVITY,
            &mut changes,
        );

        let has_seed_ratio = fields.seed_ratio_limit.is_some();
        let activity_fraction = if fields.activity == Activity::Seeding && has_seed_ratio {
            fields.seed_ratio_percent_done
        } else {
            fields.percent_done
        };
        update(
            &mut self.activity_percent_done,
            Percents::from_fraction(activity_fraction),
            ChangeFlags::PERCENT_DONE,
            &mut changes,
        );
        update(
            &mut self.finished,
            fields.finished,
            ChangeFlags::FINISHED,
            &mut changes,
        );
        update(
            &mut self.priority,
            fields.priority,
            ChangeFlags::PRIORITY,
            &mut changes,
        );
        update(
            &mut self.queue_position,
            fields.queue_position,
            ChangeFlags::QUEUE_POSITION,
            &mut changes,
        );
        update(
            &mut self.trackers_hash,
            trackers_hash(&fields.trackers),
            ChangeFlags::TRACKERS,
            &mut changes,
        );
        if changes.contains(ChangeFlags::TRACKERS) {
            self.tracker_hosts = tracker_hosts(&fields.trackers);
        }
        update(
            &mut self.error_kind,
            fields.error_kind,
            ChangeFlags::ERROR_CODE,
            &mut changes,
        );
        update_str(
            &mut self.error_message,
            &fields.error_message,
            ChangeFlags::ERROR_MESSAGE,
            &mut changes,
        );
        update(
            &mut self.active_peer_count,
            u32::from(fields.peers_sending_to_us)
                + u32::from(fields.peers_getting_from_us)
                + u32::from(fields.webseeds_sending_to_us),
            ChangeFlags::ACTIVE_PEER_COUNT,
            &mut changes,
        );
        update(
            &mut self.mime_type,
            mime_type(fields),
            ChangeFlags::MIME_TYPE,
            &mut changes,
        );
        update(
            &mut self.has_metadata,
            fields.has_metadata,
            ChangeFlags::HAS_METADATA,
            &mut changes,
        );
        update(
            &mut self.stalled,
            fields.stalled,
            ChangeFlags::STALLED,
            &mut changes,
        );
        update_f32(
            &mut self.ratio,
            fields.ratio,
            ChangeFlags::RATIO,
            &mut changes,
        );

        update(
            &mut self.added_date,
            fields.added_date,
            ChangeFlags::ADDED_DATE,
            &mut changes,
        );
        update(
            &mut self.eta_seconds,
            fields.eta_seconds,
            ChangeFlags::ETA,
            &mut changes,
        );
        update(
            &mut self.percent_complete,
            Percents::from_fraction(fields.percent_complete),
            ChangeFlags::PERCENT_COMPLETE,
            &mut changes,
        );
        update(
            &mut self.seed_ratio_percent_done,
            Percents::from_fraction(fields.seed_ratio_percent_done),
            ChangeFlags::SEED_RATIO_PERCENT_DONE,
            &mut changes,
        );
        update(
            &mut self.total_size,
            fields.total_size,
            ChangeFlags::TOTAL_SIZE,
            &mut changes,
        );

        update(
            &mut self.has_seed_ratio,
            has_seed_ratio,
            ChangeFlags::LONG_PROGRESS,
            &mut changes,
        );
        update(
            &mut self.have_unchecked,
            fields.have_unchecked,
            ChangeFlags::LONG_PROGRESS,
            &mut changes,
        );
        update(
            &mut self.have_valid,
            fields.have_valid,
            ChangeFlags::LONG_PROGRESS,
            &mut changes,
        );
        update(
            &mut self.left_until_done,
            fields.left_until_done,
            ChangeFlags::LONG_PROGRESS,
            &mut changes,
        );
        update(
            &mut self.percent_done,
            Percents::from_fraction(fields.percent_done),
            ChangeFlags::LONG_PROGRESS,
            &mut changes,
        );
        update_f32(
            &mut self.seed_ratio,
            fields.seed_ratio_limit.unwrap_or(0.0),
            ChangeFlags::LONG_PROGRESS,
            &mut changes,
        );
        update(
            &mut self.size_when_done,
            fields.size_when_done,
            ChangeFlags::LONG_PROGRESS,
            &mut changes,
        );
        update(
            &mut self.uploaded_ever,
            fields.uploaded_ever,
            ChangeFlags::LONG_PROGRESS,
            &mut changes,
        );

        update(
            &mut self.metadata_percent_complete,
            Percents::from_fraction(fields.metadata_percent_complete),
            ChangeFlags::LONG_STATUS,
            &mut changes,
        );
        update(
            &mut self.peers_connected,
            fields.peers_connected,
            ChangeFlags::LONG_STATUS,
            &mut changes,
        );
        update(
            &mut self.peers_getting_from_us,
            fields.peers_getting_from_us,
            ChangeFlags::LONG_STATUS,
            &mut changes,
        );
        update(
            &mut self.peers_sending_to_us,
            fields.peers_sending_to_us,
            ChangeFlags::LONG_STATUS,
            &mut changes,
        );
        update(
            &mut self.webseeds_sending_to_us,
            fields.webseeds_sending_to_us,
            ChangeFlags::LONG_STATUS,
            &mut changes,
        );

        if changes.contains(ChangeFlags::NAME) {
            // identity keeps the collated key unique for equal names
            self.name_collated = format!("{}\t{}", self.name.to_lowercase(), self.id);
        }

        changes
    }

    /// Engine-assigned identity.
    #[must_use]
    pub const fn id(&self) -> TorrentId {
        self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercased, identity-suffixed sort key for name ordering.
    #[must_use]
    pub fn name_collated(&self) -> &str {
        &self.name_collated
    }

    /// Derived payload mime type.
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// Current lifecycle activity.
    #[must_use]
    pub const fn activity(&self) -> Activity {
        self.activity
    }

    /// Whether the torrent is transferring or verifying.
    #[must_use]
    pub const fn active(&self) -> bool {
        self.active
    }

    /// Whether the torrent finished its selected set and stopped.
    #[must_use]
    pub const fn finished(&self) -> bool {
        self.finished
    }

    /// Whether the torrent reacts to transfer controls at all.
    #[must_use]
    pub fn sensitive(&self) -> bool {
        self.activity != Activity::Stopped
    }

    /// Error classification.
    #[must_use]
    pub const fn error_kind(&self) -> ErrorKind {
        self.error_kind
    }

    /// Error detail text.
    #[must_use]
    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    /// Position in the engine's queue.
    #[must_use]
    pub const fn queue_position(&self) -> u64 {
        self.queue_position
    }

    /// Hash of the configured announce URLs.
    #[must_use]
    pub const fn trackers_hash(&self) -> u64 {
        self.trackers_hash
    }

    /// Sorted, deduplicated tracker host names.
    #[must_use]
    pub fn tracker_hosts(&self) -> &[String] {
        &self.tracker_hosts
    }

    /// Upload speed in KB/s.
    #[must_use]
    pub const fn speed_up(&self) -> f32 {
        self.speed_up
    }

    /// Download speed in KB/s.
    #[must_use]
    pub const fn speed_down(&self) -> f32 {
        self.speed_down
    }

    /// Total count of actively transferring peers.
    #[must_use]
    pub const fn active_peer_count(&self) -> u32 {
        self.active_peer_count
    }

    /// Count of peers and webseeds we download from.
    #[must_use]
    pub const fn active_peers_down(&self) -> u32 {
        self.active_peers_down
    }

    /// Count of peers we upload to.
    #[must_use]
    pub const fn active_peers_up(&self) -> u16 {
        self.active_peers_up
    }

    /// Share ratio; may be infinite.
    #[must_use]
    pub const fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Estimated seconds until completion; `None` when unknown.
    #[must_use]
    pub const fn eta_seconds(&self) -> Option<i64> {
        self.eta_seconds
    }

    /// When the torrent was added to the engine.
    #[must_use]
    pub const fn added_date(&self) -> DateTime<Utc> {
        self.added_date
    }

    /// Total payload size in bytes.
    #[must_use]
    pub const fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Whole-payload completion percentage.
    #[must_use]
    pub const fn percent_complete(&self) -> Percents {
        self.percent_complete
    }

    /// Seed-ratio goal progress percentage.
    #[must_use]
    pub const fn seed_ratio_percent_done(&self) -> Percents {
        self.seed_ratio_percent_done
    }

    /// Activity-aware completion percentage.
    #[must_use]
    pub const fn percent_done(&self) -> Percents {
        self.activity_percent_done
    }

    /// Verification progress percentage.
    #[must_use]
    pub const fn recheck_progress(&self) -> Percents {
        self.recheck_progress
    }

    /// Bandwidth priority.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Whether the engine considers transfer stalled.
    #[must_use]
    pub const fn stalled(&self) -> bool {
        self.stalled
    }

    /// Whether metainfo is available yet.
    #[must_use]
    pub const fn has_metadata(&self) -> bool {
        self.has_metadata
    }
}
