//! Pluggable visibility predicate with strictness classification.

use swarmview_core::{Activity, ChangeFlags, ErrorKind, TorrentSnapshot};

/// Activity-state filter axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActivityGroup {
    /// No restriction.
    #[default]
    All,
    /// Transferring with at least one peer, or verifying.
    Active,
    /// Downloading or queued to download.
    Downloading,
    /// Seeding or queued to seed.
    Seeding,
    /// Stopped.
    Paused,
    /// Finished the selected set.
    Finished,
    /// Verifying or queued to verify.
    Verifying,
    /// Carrying an error condition.
    Error,
}

impl ActivityGroup {
    /// Resolve a persisted preference key; unknown keys show everything.
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        match key {
            "show-active" => Self::Active,
            "show-downloading" => Self::Downloading,
            "show-seeding" => Self::Seeding,
            "show-paused" => Self::Paused,
            "show-finished" => Self::Finished,
            "show-verifying" => Self::Verifying,
            "show-error" => Self::Error,
            _ => Self::All,
        }
    }

    /// The persisted preference key for this group.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::All => "show-all",
            Self::Active => "show-active",
            Self::Downloading => "show-downloading",
            Self::Seeding => "show-seeding",
            Self::Paused => "show-paused",
            Self::Finished => "show-finished",
            Self::Verifying => "show-verifying",
            Self::Error => "show-error",
        }
    }

    /// Whether `snapshot` belongs to this activity group.
    #[must_use]
    pub fn matches(self, snapshot: &TorrentSnapshot) -> bool {
        match self {
            Self::All => true,
            Self::Active => {
                snapshot.active_peer_count() > 0 || snapshot.activity() == Activity::Verifying
            }
            Self::Downloading => matches!(
                snapshot.activity(),
                Activity::Downloading | Activity::QueuedToDownload
            ),
            Self::Seeding => matches!(
                snapshot.activity(),
                Activity::Seeding | Activity::QueuedToSeed
            ),
            Self::Paused => snapshot.activity() == Activity::Stopped,
            Self::Finished => snapshot.finished(),
            Self::Verifying => matches!(
                snapshot.activity(),
                Activity::Verifying | Activity::QueuedToVerify
            ),
            Self::Error => snapshot.error_kind() != ErrorKind::Ok,
        }
    }
}

/// How a predicate reselection relates to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterChange {
    /// Unrelated criterion; the whole collection must be re-tested.
    Different,
    /// The new predicate accepts a subset of what the old one accepted;
    /// only currently visible items need re-testing.
    MoreStrict,
    /// The new predicate accepts a superset; only currently hidden items
    /// need re-testing.
    LessStrict,
}

/// Composed visibility predicate over three axes: activity group, tracker
/// host, and a free-text needle matched against the lowercased name.
///
/// Each setter structurally compares the new criterion against the old one
/// and reports a [`FilterChange`] so consumers can avoid re-testing the
/// whole collection.
#[derive(Debug, Clone, Default)]
pub struct TorrentFilter {
    activity: ActivityGroup,
    tracker_host: Option<String>,
    text: String,
}

impl TorrentFilter {
    /// Filter that shows everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current activity-group restriction.
    #[must_use]
    pub const fn activity(&self) -> ActivityGroup {
        self.activity
    }

    /// Current tracker-host restriction.
    #[must_use]
    pub fn tracker_host(&self) -> Option<&str> {
        self.tracker_host.as_deref()
    }

    /// Current free-text needle (already lowercased).
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Restrict (or unrestrict) the activity axis.
    pub fn set_activity(&mut self, group: ActivityGroup) -> Option<FilterChange> {
        if self.activity == group {
            return None;
        }
        let change = if self.activity == ActivityGroup::All {
            FilterChange::MoreStrict
        } else if group == ActivityGroup::All {
            FilterChange::LessStrict
        } else {
            FilterChange::Different
        };
        self.activity = group;
        Some(change)
    }

    /// Restrict (or unrestrict) the tracker-host axis.
    pub fn set_tracker_host(&mut self, host: Option<String>) -> Option<FilterChange> {
        let host = host.map(|value| value.to_lowercase());
        if self.tracker_host == host {
            return None;
        }
        let change = match (&self.tracker_host, &host) {
            (None, Some(_)) => FilterChange::MoreStrict,
            (Some(_), None) => FilterChange::LessStrict,
            _ => FilterChange::Different,
        };
        self.tracker_host = host;
        Some(change)
    }

    /// Replace the free-text needle.
    ///
    /// A needle that extends the old one can only shrink the visible set; a
    /// needle that is a substring of the old one can only grow it.
    pub fn set_text(&mut self, text: &str) -> Option<FilterChange> {
        let text = text.trim().to_lowercase();
        if self.text == text {
            return None;
        }
        let change = if text.contains(&self.text) {
            FilterChange::MoreStrict
        } else if self.text.contains(&text) {
            FilterChange::LessStrict
        } else {
            FilterChange::Different
        };
        self.text = text;
        Some(change)
    }

    /// Test one snapshot against the composed predicate.
    #[must_use]
    pub fn matches(&self, snapshot: &TorrentSnapshot) -> bool {
        self.activity.matches(snapshot)
            && self.matches_tracker(snapshot)
            && self.matches_text(snapshot)
    }

    /// O(1) shortcut: the composed predicate provably accepts everything.
    #[must_use]
    pub fn matches_all(&self) -> bool {
        self.activity == ActivityGroup::All && self.tracker_host.is_none() && self.text.is_empty()
    }

    /// O(1) shortcut: the composed predicate provably rejects everything.
    ///
    /// Opportunistic, not exhaustive: no axis combination can prove
    /// emptiness structurally (a non-empty needle may still match every
    /// name), so this currently always declines.
    #[must_use]
    pub const fn matches_none(&self) -> bool {
        false
    }

    /// The attribute groups the currently active axes read.
    #[must_use]
    pub fn relevant_flags(&self) -> ChangeFlags {
        let mut flags = ChangeFlags::empty();
        if self.activity != ActivityGroup::All {
            flags.insert(
                ChangeFlags::ACTIVE
                    | ChangeFlags::ACTIVITY
                    | ChangeFlags::ERROR_CODE
                    | ChangeFlags::FINISHED
                    | ChangeFlags::ACTIVE_PEER_COUNT,
            );
        }
        if self.tracker_host.is_some() {
            flags.insert(ChangeFlags::TRACKERS);
        }
        if !self.text.is_empty() {
            flags.insert(ChangeFlags::NAME);
        }
        flags
    }

    /// Whether a refresh with these change flags can alter visibility.
    #[must_use]
    pub fn handle_changes(&self, flags: ChangeFlags) -> bool {
        flags.intersects(self.relevant_flags())
    }

    fn matches_tracker(&self, snapshot: &TorrentSnapshot) -> bool {
        self.tracker_host.as_ref().is_none_or(|host| {
            snapshot
                .tracker_hosts()
                .iter()
                .any(|candidate| candidate == host)
        })
    }

    fn matches_text(&self, snapshot: &TorrentSnapshot) -> bool {
        self.text.is_empty() || snapshot.name().to_lowercase().contains(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmview_core::{TorrentFields, TorrentId};
    use swarmview_test_support::fields;

    fn snapshot_with(id: i64, mutate: impl FnOnce(&mut TorrentFields)) -> TorrentSnapshot {
        let mut record = fields(&format!("torrent-{id}"));
        mutate(&mut record);
        TorrentSnapshot::new(TorrentId(id), &record)
    }

    #[test]
    fn activity_axis_classifies_against_show_all() {
        let mut filter = TorrentFilter::new();
        assert_eq!(
            filter.set_activity(ActivityGroup::Seeding),
            Some(FilterChange::MoreStrict)
        );
        assert_eq!(
            filter.set_activity(ActivityGroup::Paused),
            Some(FilterChange::Different)
        );
        assert_eq!(
            filter.set_activity(ActivityGroup::All),
            Some(FilterChange::LessStrict)
        );
        assert_eq!(filter.set_activity(ActivityGroup::All), None);
    }

    #[test]
    fn text_axis_classifies_by_containment() {
        let mut filter = TorrentFilter::new();
        assert_eq!(filter.set_text("deb"), Some(FilterChange::MoreStrict));
        assert_eq!(filter.set_text("debian"), Some(FilterChange::MoreStrict));
        assert_eq!(filter.set_text("deb"), Some(FilterChange::LessStrict));
        assert_eq!(filter.set_text("ubuntu"), Some(FilterChange::Different));
        assert_eq!(filter.set_text(""), Some(FilterChange::LessStrict));
    }

    #[test]
    fn tracker_axis_classifies_against_no_restriction() {
        let mut filter = TorrentFilter::new();
        assert_eq!(
            filter.set_tracker_host(Some("tracker.example.net".to_string())),
            Some(FilterChange::MoreStrict)
        );
        assert_eq!(
            filter.set_tracker_host(Some("other.example.org".to_string())),
            Some(FilterChange::Different)
        );
        assert_eq!(filter.set_tracker_host(None), Some(FilterChange::LessStrict));
    }

    #[test]
    fn composed_predicate_tests_every_axis() {
        let mut filter = TorrentFilter::new();
        filter.set_activity(ActivityGroup::Downloading);
        filter.set_text("debian");

        let matching = snapshot_with(1, |record| {
            record.name = "debian-netinst".to_string();
            record.activity = Activity::Downloading;
        });
        let wrong_name = snapshot_with(2, |record| {
            record.name = "ubuntu-live".to_string();
            record.activity = Activity::Downloading;
        });
        let wrong_state = snapshot_with(3, |record| {
            record.name = "debian-dvd".to_string();
            record.activity = Activity::Stopped;
        });

        assert!(filter.matches(&matching));
        assert!(!filter.matches(&wrong_name));
        assert!(!filter.matches(&wrong_state));
    }

    #[test]
    fn trivial_predicate_matches_all() {
        let mut filter = TorrentFilter::new();
        assert!(filter.matches_all());
        assert!(!filter.matches_none());
        filter.set_text("x");
        assert!(!filter.matches_all());
    }

    #[test]
    fn irrelevant_changes_do_not_request_a_refilter() {
        let mut filter = TorrentFilter::new();
        assert!(!filter.handle_changes(ChangeFlags::all()));

        filter.set_activity(ActivityGroup::Error);
        assert!(filter.handle_changes(ChangeFlags::ERROR_CODE));
        assert!(!filter.handle_changes(ChangeFlags::SPEED_UP | ChangeFlags::RATIO));

        filter.set_activity(ActivityGroup::All);
        filter.set_tracker_host(Some("tracker.example.net".to_string()));
        assert!(filter.handle_changes(ChangeFlags::TRACKERS));
        assert!(!filter.handle_changes(ChangeFlags::NAME));
    }

    #[test]
    fn error_group_matches_on_error_kind() {
        let filter = {
            let mut filter = TorrentFilter::new();
            filter.set_activity(ActivityGroup::Error);
            filter
        };
        let broken = snapshot_with(1, |record| {
            record.error_kind = ErrorKind::LocalError;
            record.error_message = "disk full".to_string();
        });
        let healthy = snapshot_with(2, |_| {});
        assert!(filter.matches(&broken));
        assert!(!filter.matches(&healthy));
    }
}
