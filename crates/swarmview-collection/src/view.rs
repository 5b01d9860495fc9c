//! Composed sort+filter projection over the store.

use crate::filter::{ActivityGroup, FilterChange, TorrentFilter};
use crate::sorter::{SortChange, SortMode, TorrentSorter};
use crate::store::{EntitiesChanged, TorrentStore};
use std::cmp::Ordering;
use std::collections::HashSet;
use swarmview_core::{TorrentId, TorrentSnapshot};

/// One visible-list mutation reported to the adapter and the renderer.
///
/// Splices carry the inserted identities so a consumer can mirror the list
/// without re-reading it: events in a batch describe successive states, and
/// only the identities captured at emission time replay correctly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    /// `removed` entries at `position` were replaced by `added`.
    Spliced {
        /// First affected visible position.
        position: usize,
        /// Number of entries removed.
        removed: usize,
        /// Identities inserted at that position.
        added: Vec<TorrentId>,
    },
    /// The entry at `position` mutated in place.
    ItemChanged {
        /// Affected visible position.
        position: usize,
    },
}

/// The visible projection: store entries that pass the filter, ordered by
/// the sorter.
///
/// Every mutation entry point returns the [`ViewEvent`]s it produced, in
/// application order, so the caller can forward them to the list adapter and
/// the renderer without either of them recomputing anything.
#[derive(Default)]
pub struct TorrentListView {
    sorter: TorrentSorter,
    filter: TorrentFilter,
    visible: Vec<TorrentId>,
}

impl TorrentListView {
    /// Empty view with default sort (name) and filter (show all).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Visible identities in presentation order.
    #[must_use]
    pub fn visible(&self) -> &[TorrentId] {
        &self.visible
    }

    /// Number of visible entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.visible.len()
    }

    /// Whether nothing is visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    /// Identity at visible `position`, if any.
    #[must_use]
    pub fn id_at(&self, position: usize) -> Option<TorrentId> {
        self.visible.get(position).copied()
    }

    /// Visible position of `id`; `None` when hidden or unknown.
    #[must_use]
    pub fn position_of(&self, id: TorrentId) -> Option<usize> {
        self.visible.iter().position(|candidate| *candidate == id)
    }

    /// Currently installed sorter.
    #[must_use]
    pub const fn sorter(&self) -> &TorrentSorter {
        &self.sorter
    }

    /// Currently installed filter.
    #[must_use]
    pub const fn filter(&self) -> &TorrentFilter {
        &self.filter
    }

    /// Recompute the projection from scratch.
    pub fn rebuild(&mut self, store: &TorrentStore) -> Vec<ViewEvent> {
        let removed = self.visible.len();
        self.visible = self.projected(store);
        if removed == 0 && self.visible.is_empty() {
            Vec::new()
        } else {
            vec![ViewEvent::Spliced {
                position: 0,
                removed,
                added: self.visible.clone(),
            }]
        }
    }

    /// React to one entity entering the store.
    pub fn on_inserted(&mut self, store: &TorrentStore, id: TorrentId) -> Vec<ViewEvent> {
        let Some(snapshot) = store.snapshot(id) else {
            return Vec::new();
        };
        if !self.filter.matches(snapshot) {
            return Vec::new();
        }
        let position = self.insertion_position(store, snapshot);
        self.visible.insert(position, id);
        vec![ViewEvent::Spliced {
            position,
            removed: 0,
            added: vec![id],
        }]
    }

    /// React to one entity leaving the store.
    pub fn on_removed(&mut self, id: TorrentId) -> Vec<ViewEvent> {
        let Some(position) = self.position_of(id) else {
            return Vec::new();
        };
        self.visible.remove(position);
        vec![ViewEvent::Spliced {
            position,
            removed: 1,
            added: Vec::new(),
        }]
    }

    /// React to one batched refresh notification.
    ///
    /// The change flags are matched against the sorter's and the filter's
    /// attribute tables first; a refresh that touched nothing either of them
    /// reads costs neither a re-sort nor a re-test. Visibility is only
    /// re-tested for the identities that actually changed.
    pub fn on_entities_changed(
        &mut self,
        store: &TorrentStore,
        changed: &EntitiesChanged,
    ) -> Vec<ViewEvent> {
        if changed.is_empty() {
            return Vec::new();
        }

        let mut events = Vec::new();

        if self.filter.handle_changes(changed.flags) {
            for &id in &changed.ids {
                let now_visible = store
                    .snapshot(id)
                    .is_some_and(|snapshot| self.filter.matches(snapshot));
                match (self.position_of(id), now_visible) {
                    (Some(position), false) => {
                        self.visible.remove(position);
                        events.push(ViewEvent::Spliced {
                            position,
                            removed: 1,
                            added: Vec::new(),
                        });
                    }
                    (None, true) => {
                        if let Some(snapshot) = store.snapshot(id) {
                            let position = self.insertion_position(store, snapshot);
                            self.visible.insert(position, id);
                            events.push(ViewEvent::Spliced {
                                position,
                                removed: 0,
                                added: vec![id],
                            });
                        }
                    }
                    _ => {}
                }
            }
        }

        if self.sorter.handle_changes(changed.flags)
            && let Some(event) = self.resort(store)
        {
            events.push(event);
        }

        for &id in &changed.ids {
            if let Some(position) = self.position_of(id) {
                events.push(ViewEvent::ItemChanged { position });
            }
        }

        events
    }

    /// Install a new sort mode.
    pub fn set_sort_mode(&mut self, store: &TorrentStore, mode: SortMode) -> Vec<ViewEvent> {
        match self.sorter.set_mode(mode) {
            None => Vec::new(),
            Some(SortChange::Inverted) => self.invert(),
            Some(SortChange::Different) => self.resort(store).into_iter().collect(),
        }
    }

    /// Flip or restore the sort direction.
    ///
    /// An inverted reselection reverses the existing order in place without
    /// evaluating the comparator on any pair.
    pub fn set_sort_reversed(&mut self, reversed: bool) -> Vec<ViewEvent> {
        match self.sorter.set_reversed(reversed) {
            None => Vec::new(),
            Some(_) => self.invert(),
        }
    }

    /// Restrict (or unrestrict) the filter's activity axis.
    pub fn set_activity_filter(
        &mut self,
        store: &TorrentStore,
        group: ActivityGroup,
    ) -> Vec<ViewEvent> {
        let change = self.filter.set_activity(group);
        self.apply_filter_change(store, change)
    }

    /// Restrict (or unrestrict) the filter's tracker axis.
    pub fn set_tracker_filter(
        &mut self,
        store: &TorrentStore,
        host: Option<String>,
    ) -> Vec<ViewEvent> {
        let change = self.filter.set_tracker_host(host);
        self.apply_filter_change(store, change)
    }

    /// Replace the filter's free-text needle.
    pub fn set_text_filter(&mut self, store: &TorrentStore, text: &str) -> Vec<ViewEvent> {
        let change = self.filter.set_text(text);
        self.apply_filter_change(store, change)
    }

    fn apply_filter_change(
        &mut self,
        store: &TorrentStore,
        change: Option<FilterChange>,
    ) -> Vec<ViewEvent> {
        match change {
            None => Vec::new(),
            // Only currently visible entries can drop out.
            Some(FilterChange::MoreStrict) => {
                let mut events = Vec::new();
                for position in (0..self.visible.len()).rev() {
                    let id = self.visible[position];
                    let keep = store
                        .snapshot(id)
                        .is_some_and(|snapshot| self.filter.matches(snapshot));
                    if !keep {
                        self.visible.remove(position);
                        events.push(ViewEvent::Spliced {
                            position,
                            removed: 1,
                            added: Vec::new(),
                        });
                    }
                }
                events
            }
            // Only currently hidden entries can appear.
            Some(FilterChange::LessStrict) => {
                let shown: HashSet<TorrentId> = self.visible.iter().copied().collect();
                let hidden: Vec<TorrentId> = store
                    .iter()
                    .map(TorrentSnapshot::id)
                    .filter(|id| !shown.contains(id))
                    .collect();
                let mut events = Vec::new();
                for id in hidden {
                    let Some(snapshot) = store.snapshot(id) else {
                        continue;
                    };
                    if self.filter.matches(snapshot) {
                        let position = self.insertion_position(store, snapshot);
                        self.visible.insert(position, id);
                        events.push(ViewEvent::Spliced {
                            position,
                            removed: 0,
                            added: vec![id],
                        });
                    }
                }
                events
            }
            Some(FilterChange::Different) => self.rebuild(store),
        }
    }

    fn projected(&self, store: &TorrentStore) -> Vec<TorrentId> {
        let mut snapshots: Vec<&TorrentSnapshot> = store
            .iter()
            .filter(|snapshot| self.filter.matches(snapshot))
            .collect();
        snapshots.sort_by(|lhs, rhs| self.sorter.compare(lhs, rhs));
        snapshots.iter().map(|snapshot| snapshot.id()).collect()
    }

    fn insertion_position(&self, store: &TorrentStore, snapshot: &TorrentSnapshot) -> usize {
        self.visible.partition_point(|&id| {
            store
                .snapshot(id)
                .is_some_and(|other| self.sorter.compare(other, snapshot) == Ordering::Less)
        })
    }

    /// Stable re-sort; reports one splice covering the dirty range only.
    fn resort(&mut self, store: &TorrentStore) -> Option<ViewEvent> {
        let next = self.projected(store);
        debug_assert_eq!(next.len(), self.visible.len());
        let first = self
            .visible
            .iter()
            .zip(&next)
            .position(|(old, new)| old != new)?;
        let last = self
            .visible
            .iter()
            .zip(&next)
            .rposition(|(old, new)| old != new)
            .unwrap_or(first);
        self.visible = next;
        Some(ViewEvent::Spliced {
            position: first,
            removed: last - first + 1,
            added: self.visible[first..=last].to_vec(),
        })
    }

    fn invert(&mut self) -> Vec<ViewEvent> {
        if self.visible.len() < 2 {
            return Vec::new();
        }
        self.visible.reverse();
        vec![ViewEvent::Spliced {
            position: 0,
            removed: self.visible.len(),
            added: self.visible.clone(),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmview_core::{Activity, TorrentFields, TorrentSnapshot};
    use swarmview_test_support::fields;

    fn store_with(records: Vec<(i64, TorrentFields)>) -> TorrentStore {
        let mut store = TorrentStore::new();
        for (id, record) in records {
            store
                .insert_sorted(TorrentSnapshot::new(TorrentId(id), &record))
                .expect("insert");
        }
        store
    }

    fn record(name: &str, mutate: impl FnOnce(&mut TorrentFields)) -> TorrentFields {
        let mut record = fields(name);
        mutate(&mut record);
        record
    }

    fn ids(raw: &[i64]) -> Vec<TorrentId> {
        raw.iter().copied().map(TorrentId).collect()
    }

    #[test]
    fn rebuild_projects_filtered_and_sorted() {
        let store = store_with(vec![
            (1, record("omega", |r| r.activity = Activity::Seeding)),
            (2, record("alpha", |r| r.activity = Activity::Downloading)),
            (3, record("midway", |r| r.activity = Activity::Downloading)),
        ]);

        let mut view = TorrentListView::new();
        let events = view.rebuild(&store);
        assert_eq!(
            events,
            [ViewEvent::Spliced {
                position: 0,
                removed: 0,
                added: ids(&[2, 3, 1]),
            }]
        );
        assert_eq!(view.visible(), ids(&[2, 3, 1]).as_slice());

        view.set_activity_filter(&store, ActivityGroup::Downloading);
        assert_eq!(view.visible(), ids(&[2, 3]).as_slice());
    }

    #[test]
    fn inverted_reselection_reverses_without_resorting() {
        let store = store_with(vec![
            (1, record("alpha", |_| {})),
            (2, record("beta", |_| {})),
            (3, record("gamma", |_| {})),
        ]);
        let mut view = TorrentListView::new();
        view.rebuild(&store);
        let forward: Vec<TorrentId> = view.visible().to_vec();

        let events = view.set_sort_reversed(true);
        assert_eq!(
            events,
            [ViewEvent::Spliced {
                position: 0,
                removed: 3,
                added: ids(&[3, 2, 1]),
            }]
        );
        let mut expected = forward;
        expected.reverse();
        assert_eq!(view.visible(), expected.as_slice());
    }

    #[test]
    fn irrelevant_refresh_produces_item_changes_only() {
        let mut store = store_with(vec![
            (1, record("alpha", |_| {})),
            (2, record("beta", |_| {})),
        ]);
        let mut view = TorrentListView::new();
        view.rebuild(&store);

        // error message changes do not feed the name comparator
        let changed = store.refresh_all(|id| {
            let mut updated = record(if id.0 == 1 { "alpha" } else { "beta" }, |_| {});
            if id.0 == 2 {
                updated.error_message = "tracker warning".to_string();
            }
            Some(updated)
        });
        let events = view.on_entities_changed(&store, &changed);
        assert_eq!(events, [ViewEvent::ItemChanged { position: 1 }]);
    }

    #[test]
    fn relevant_refresh_resorts_the_dirty_range_only() {
        let mut store = store_with(vec![
            (1, record("alpha", |_| {})),
            (2, record("beta", |_| {})),
            (3, record("zeta", |_| {})),
        ]);
        let mut view = TorrentListView::new();
        view.rebuild(&store);

        // rename beta past zeta; alpha stays put
        let changed = store.refresh_all(|id| {
            Some(match id.0 {
                1 => record("alpha", |_| {}),
                2 => record("zzz-renamed", |_| {}),
                _ => record("zeta", |_| {}),
            })
        });
        let events = view.on_entities_changed(&store, &changed);
        assert_eq!(
            events,
            [
                ViewEvent::Spliced {
                    position: 1,
                    removed: 2,
                    added: ids(&[3, 2]),
                },
                ViewEvent::ItemChanged { position: 2 },
            ]
        );
        assert_eq!(view.visible(), ids(&[1, 3, 2]).as_slice());
    }

    #[test]
    fn more_strict_filter_only_removes_visible_entries() {
        let store = store_with(vec![
            (1, record("debian-netinst", |_| {})),
            (2, record("ubuntu-live", |_| {})),
            (3, record("debian-dvd", |_| {})),
        ]);
        let mut view = TorrentListView::new();
        view.rebuild(&store);

        let before: HashSet<TorrentId> = view.visible().iter().copied().collect();
        let events = view.set_text_filter(&store, "debian");
        let after: HashSet<TorrentId> = view.visible().iter().copied().collect();

        assert!(after.is_subset(&before));
        assert_eq!(view.len(), 2);
        assert!(events.iter().all(|event| matches!(
            event,
            ViewEvent::Spliced { removed: 1, added, .. } if added.is_empty()
        )));
    }

    #[test]
    fn less_strict_filter_only_adds_hidden_entries() {
        let store = store_with(vec![
            (1, record("debian-netinst", |_| {})),
            (2, record("ubuntu-live", |_| {})),
            (3, record("debian-dvd", |_| {})),
        ]);
        let mut view = TorrentListView::new();
        view.rebuild(&store);
        view.set_text_filter(&store, "debian-netinst");
        assert_eq!(view.len(), 1);

        let before: HashSet<TorrentId> = view.visible().iter().copied().collect();
        let events = view.set_text_filter(&store, "debian");
        let after: HashSet<TorrentId> = view.visible().iter().copied().collect();

        assert!(before.is_subset(&after));
        assert_eq!(view.len(), 2);
        assert!(events.iter().all(|event| matches!(
            event,
            ViewEvent::Spliced { removed: 0, added, .. } if added.len() == 1
        )));
    }

    #[test]
    fn insert_and_remove_keep_comparator_order() {
        let store = store_with(vec![
            (1, record("alpha", |_| {})),
            (3, record("gamma", |_| {})),
        ]);
        let mut view = TorrentListView::new();
        view.rebuild(&store);

        let mut grown = store_with(vec![
            (1, record("alpha", |_| {})),
            (2, record("beta", |_| {})),
            (3, record("gamma", |_| {})),
        ]);
        let events = view.on_inserted(&grown, TorrentId(2));
        assert_eq!(
            events,
            [ViewEvent::Spliced {
                position: 1,
                removed: 0,
                added: ids(&[2]),
            }]
        );

        let position = grown.position_of(TorrentId(2)).expect("position");
        grown.remove_at(position).expect("remove");
        let events = view.on_removed(TorrentId(2));
        assert_eq!(
            events,
            [ViewEvent::Spliced {
                position: 1,
                removed: 1,
                added: Vec::new(),
            }]
        );
    }
}
