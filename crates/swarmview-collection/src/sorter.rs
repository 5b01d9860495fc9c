//! Pluggable torrent comparator with resort-avoidance classification.

use std::cmp::Ordering;
use swarmview_core::{ChangeFlags, TorrentSnapshot};

/// Ordering criteria selectable by the user, keyed by the persisted
/// preference strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortMode {
    /// By current transfer activity (speeds, then peers, then queue).
    Activity,
    /// By added date, newest first.
    Age,
    /// By collated name.
    #[default]
    Name,
    /// By completion, most complete first.
    Progress,
    /// By queue position.
    Queue,
    /// By share ratio, highest first.
    Ratio,
    /// By total payload size, largest first.
    Size,
    /// By lifecycle state.
    State,
    /// By estimated time remaining.
    TimeLeft,
}

impl SortMode {
    /// Resolve a persisted preference key; unknown keys fall back to `Name`.
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        match key {
            "sort-by-activity" => Self::Activity,
            "sort-by-age" => Self::Age,
            "sort-by-progress" => Self::Progress,
            "sort-by-queue" => Self::Queue,
            "sort-by-ratio" => Self::Ratio,
            "sort-by-size" => Self::Size,
            "sort-by-state" => Self::State,
            "sort-by-time-left" => Self::TimeLeft,
            _ => Self::Name,
        }
    }

    /// The persisted preference key for this mode.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Activity => "sort-by-activity",
            Self::Age => "sort-by-age",
            Self::Name => "sort-by-name",
            Self::Progress => "sort-by-progress",
            Self::Queue => "sort-by-queue",
            Self::Ratio => "sort-by-ratio",
            Self::Size => "sort-by-size",
            Self::State => "sort-by-state",
            Self::TimeLeft => "sort-by-time-left",
        }
    }

    /// The attribute groups this mode's comparator reads.
    ///
    /// A refresh whose change set misses this entirely cannot reorder the
    /// list, so the resort is skipped outright.
    #[must_use]
    pub const fn relevant_flags(self) -> ChangeFlags {
        match self {
            Self::Activity => ChangeFlags::ACTIVE_PEER_COUNT
                .union(ChangeFlags::QUEUE_POSITION)
                .union(ChangeFlags::SPEED_DOWN)
                .union(ChangeFlags::SPEED_UP),
            Self::Age => ChangeFlags::ADDED_DATE.union(ChangeFlags::NAME),
            Self::Name => ChangeFlags::NAME,
            Self::Progress => ChangeFlags::PERCENT_COMPLETE
                .union(ChangeFlags::QUEUE_POSITION)
                .union(ChangeFlags::RATIO)
                .union(ChangeFlags::SEED_RATIO_PERCENT_DONE),
            Self::Queue => ChangeFlags::QUEUE_POSITION,
            Self::Ratio => ChangeFlags::QUEUE_POSITION.union(ChangeFlags::RATIO),
            Self::Size => ChangeFlags::NAME.union(ChangeFlags::TOTAL_SIZE),
            Self::State => ChangeFlags::ACTIVITY.union(ChangeFlags::QUEUE_POSITION),
            Self::TimeLeft => ChangeFlags::ETA.union(ChangeFlags::NAME),
        }
    }
}

/// How a strategy reselection relates to the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortChange {
    /// Unrelated criteria; downstream must re-sort from scratch.
    Different,
    /// Same criteria, reversed; downstream may simply reverse the order.
    Inverted,
}

fn compare_ratio(lhs: f32, rhs: f32) -> Ordering {
    match (lhs.is_infinite(), rhs.is_infinite()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => lhs.total_cmp(&rhs),
    }
}

fn compare_eta(lhs: Option<i64>, rhs: Option<i64>) -> Ordering {
    match (lhs, rhs) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        // soonest-to-finish first
        (Some(lhs), Some(rhs)) => lhs.cmp(&rhs).reverse(),
    }
}

fn by_name(lhs: &TorrentSnapshot, rhs: &TorrentSnapshot) -> Ordering {
    lhs.name_collated().cmp(rhs.name_collated())
}

fn by_queue(lhs: &TorrentSnapshot, rhs: &TorrentSnapshot) -> Ordering {
    lhs.queue_position().cmp(&rhs.queue_position())
}

fn by_ratio(lhs: &TorrentSnapshot, rhs: &TorrentSnapshot) -> Ordering {
    compare_ratio(lhs.ratio(), rhs.ratio())
        .reverse()
        .then_with(|| by_queue(lhs, rhs))
}

fn by_activity(lhs: &TorrentSnapshot, rhs: &TorrentSnapshot) -> Ordering {
    let lhs_speed = lhs.speed_up() + lhs.speed_down();
    let rhs_speed = rhs.speed_up() + rhs.speed_down();
    lhs_speed
        .total_cmp(&rhs_speed)
        .reverse()
        .then_with(|| lhs.active_peer_count().cmp(&rhs.active_peer_count()).reverse())
        .then_with(|| by_queue(lhs, rhs))
}

fn by_age(lhs: &TorrentSnapshot, rhs: &TorrentSnapshot) -> Ordering {
    lhs.added_date()
        .cmp(&rhs.added_date())
        .reverse()
        .then_with(|| by_name(lhs, rhs))
}

fn by_size(lhs: &TorrentSnapshot, rhs: &TorrentSnapshot) -> Ordering {
    lhs.total_size()
        .cmp(&rhs.total_size())
        .reverse()
        .then_with(|| by_name(lhs, rhs))
}

fn by_progress(lhs: &TorrentSnapshot, rhs: &TorrentSnapshot) -> Ordering {
    lhs.percent_complete()
        .cmp(&rhs.percent_complete())
        .reverse()
        .then_with(|| {
            lhs.seed_ratio_percent_done()
                .cmp(&rhs.seed_ratio_percent_done())
                .reverse()
        })
        .then_with(|| by_ratio(lhs, rhs))
}

fn by_eta(lhs: &TorrentSnapshot, rhs: &TorrentSnapshot) -> Ordering {
    compare_eta(lhs.eta_seconds(), rhs.eta_seconds()).then_with(|| by_name(lhs, rhs))
}

fn by_state(lhs: &TorrentSnapshot, rhs: &TorrentSnapshot) -> Ordering {
    lhs.activity()
        .cmp(&rhs.activity())
        .reverse()
        .then_with(|| by_queue(lhs, rhs))
}

/// Comparator strategy wrapping the store's ordering.
///
/// Reselecting the comparator is classified so downstream can pick the
/// cheapest reaction: [`SortChange::Inverted`] means the existing order can
/// be reversed in place; [`SortChange::Different`] forces a full re-sort.
#[derive(Debug, Clone, Default)]
pub struct TorrentSorter {
    mode: SortMode,
    reversed: bool,
}

impl TorrentSorter {
    /// Sorter with the default mode (by name, ascending).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently selected mode.
    #[must_use]
    pub const fn mode(&self) -> SortMode {
        self.mode
    }

    /// Whether the order is reversed.
    #[must_use]
    pub const fn reversed(&self) -> bool {
        self.reversed
    }

    /// Select a new ordering criteria.
    ///
    /// Returns `None` when nothing changed, otherwise the classification for
    /// downstream reprocessing.
    pub fn set_mode(&mut self, mode: SortMode) -> Option<SortChange> {
        if self.mode == mode {
            return None;
        }
        self.mode = mode;
        Some(SortChange::Different)
    }

    /// Flip or restore the order direction.
    pub fn set_reversed(&mut self, reversed: bool) -> Option<SortChange> {
        if self.reversed == reversed {
            return None;
        }
        self.reversed = reversed;
        Some(SortChange::Inverted)
    }

    /// Compare two snapshots under the current strategy.
    ///
    /// Identity is always the final tiebreak, so the induced order is strict
    /// and total and re-sorts are reproducible.
    #[must_use]
    pub fn compare(&self, lhs: &TorrentSnapshot, rhs: &TorrentSnapshot) -> Ordering {
        let base = match self.mode {
            SortMode::Activity => by_activity(lhs, rhs),
            SortMode::Age => by_age(lhs, rhs),
            SortMode::Name => by_name(lhs, rhs),
            SortMode::Progress => by_progress(lhs, rhs),
            SortMode::Queue => by_queue(lhs, rhs),
            SortMode::Ratio => by_ratio(lhs, rhs),
            SortMode::Size => by_size(lhs, rhs),
            SortMode::State => by_state(lhs, rhs),
            SortMode::TimeLeft => by_eta(lhs, rhs),
        };
        let ordering = base.then_with(|| lhs.id().cmp(&rhs.id()));
        if self.reversed {
            ordering.reverse()
        } else {
            ordering
        }
    }

    /// Whether a refresh with these change flags can reorder the list.
    #[must_use]
    pub const fn handle_changes(&self, flags: ChangeFlags) -> bool {
        flags.intersects(self.mode.relevant_flags())
    }
}
