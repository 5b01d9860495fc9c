//! Per-refresh attribute change bitset.

use bitflags::bitflags;

bitflags! {
    /// Which attribute groups of a torrent changed during the latest refresh.
    ///
    /// Each refresh of a [`crate::TorrentSnapshot`] reports exactly the bits
    /// whose backing values differ from the previous refresh. Downstream
    /// transforms intersect these with the attribute sets their current
    /// strategy reads to decide whether any recomputation is needed at all.
    ///
    /// `LONG_PROGRESS` and `LONG_STATUS` are grouped bits covering the
    /// attribute clusters that only feed the detail renderers; they let a
    /// refresh of those fields mark a row dirty without a dedicated bit per
    /// byte counter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChangeFlags: u32 {
        /// Display name (and therefore the collated sort key).
        const NAME = 1 << 0;
        /// Upload speed.
        const SPEED_UP = 1 << 1;
        /// Download speed.
        const SPEED_DOWN = 1 << 2;
        /// Count of peers we upload to.
        const ACTIVE_PEERS_UP = 1 << 3;
        /// Count of peers and webseeds we download from.
        const ACTIVE_PEERS_DOWN = 1 << 4;
        /// Verification progress.
        const RECHECK_PROGRESS = 1 << 5;
        /// Derived "transferring or verifying" bit.
        const ACTIVE = 1 << 6;
        /// Lifecycle activity.
        const ACTIVITY = 1 << 7;
        /// Activity-aware completion percentage.
        const PERCENT_DONE = 1 << 8;
        /// Finished flag.
        const FINISHED = 1 << 9;
        /// Bandwidth priority.
        const PRIORITY = 1 << 10;
        /// Queue position.
        const QUEUE_POSITION = 1 << 11;
        /// Tracker configuration hash.
        const TRACKERS = 1 << 12;
        /// Error classification.
        const ERROR_CODE = 1 << 13;
        /// Error detail text.
        const ERROR_MESSAGE = 1 << 14;
        /// Total count of actively transferring peers.
        const ACTIVE_PEER_COUNT = 1 << 15;
        /// Derived payload mime type.
        const MIME_TYPE = 1 << 16;
        /// Metadata availability.
        const HAS_METADATA = 1 << 17;
        /// Stalled flag.
        const STALLED = 1 << 18;
        /// Share ratio.
        const RATIO = 1 << 19;
        /// Added date.
        const ADDED_DATE = 1 << 20;
        /// Estimated time remaining.
        const ETA = 1 << 21;
        /// Whole-payload completion percentage.
        const PERCENT_COMPLETE = 1 << 22;
        /// Seed-ratio goal progress.
        const SEED_RATIO_PERCENT_DONE = 1 << 23;
        /// Total payload size.
        const TOTAL_SIZE = 1 << 24;
        /// Byte counters feeding the long progress text.
        const LONG_PROGRESS = 1 << 25;
        /// Peer counters feeding the long status text.
        const LONG_STATUS = 1 << 26;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_union_and_intersect() {
        let changed = ChangeFlags::NAME | ChangeFlags::SPEED_UP;
        assert!(changed.intersects(ChangeFlags::SPEED_UP | ChangeFlags::SPEED_DOWN));
        assert!(!changed.intersects(ChangeFlags::RATIO));
        assert!(ChangeFlags::empty().is_empty());
    }
}
