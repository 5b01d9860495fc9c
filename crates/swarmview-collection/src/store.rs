//! Ordered, observable torrent store.

use crate::error::{CollectionError, CollectionResult};
use swarmview_core::{ChangeFlags, TorrentFields, TorrentId, TorrentSnapshot};

/// One structural mutation of the store: `removed` entries at `position`
/// were replaced by `added` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Splice {
    /// First affected position.
    pub position: usize,
    /// Number of entries removed at that position.
    pub removed: usize,
    /// Number of entries inserted at that position.
    pub added: usize,
}

/// Batched outcome of one refresh pass: which identities changed and the
/// union of their change flags.
///
/// One refresh emits exactly one of these, never one notification per field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntitiesChanged {
    /// Identities whose snapshot reported a non-empty change set.
    pub ids: Vec<TorrentId>,
    /// Union of every reported change bit.
    pub flags: ChangeFlags,
}

impl EntitiesChanged {
    /// Whether the refresh changed anything at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Handle for removing a previously registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type StructuralObserver = Box<dyn FnMut(Splice) + Send>;
type ChangeObserver = Box<dyn FnMut(&EntitiesChanged) + Send>;

/// Ordered, randomly indexable container of torrent snapshots.
///
/// The store exclusively owns entity lifetime: snapshots enter through
/// [`TorrentStore::insert_sorted`] or [`TorrentStore::splice`] and leave
/// through [`TorrentStore::remove_at`]. Entries are kept ascending by
/// identity so identity lookups can binary-search, and every structural
/// mutation is reported to observers as a single [`Splice`].
#[derive(Default)]
pub struct TorrentStore {
    entries: Vec<TorrentSnapshot>,
    next_subscription: u64,
    structural: Vec<(SubscriptionId, StructuralObserver)>,
    changed: Vec<(SubscriptionId, ChangeObserver)>,
}

impl TorrentStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entity at `position`, if any.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&TorrentSnapshot> {
        self.entries.get(position)
    }

    /// Entity with identity `id`, if present.
    #[must_use]
    pub fn snapshot(&self, id: TorrentId) -> Option<&TorrentSnapshot> {
        self.position_of(id).map(|position| &self.entries[position])
    }

    /// Position of identity `id`; `None` is an expected outcome.
    #[must_use]
    pub fn position_of(&self, id: TorrentId) -> Option<usize> {
        self.entries
            .binary_search_by(|entry| entry.id().cmp(&id))
            .ok()
    }

    /// Iterate the stored entities in identity order.
    pub fn iter(&self) -> impl Iterator<Item = &TorrentSnapshot> {
        self.entries.iter()
    }

    /// Insert a snapshot at its identity-ordered position.
    ///
    /// # Errors
    ///
    /// Fails with [`CollectionError::DuplicateIdentity`] when the identity is
    /// already stored; duplicates indicate a broken invariant upstream.
    pub fn insert_sorted(&mut self, snapshot: TorrentSnapshot) -> CollectionResult<usize> {
        let id = snapshot.id();
        match self.entries.binary_search_by(|entry| entry.id().cmp(&id)) {
            Ok(_) => Err(CollectionError::DuplicateIdentity { id }),
            Err(position) => {
                self.entries.insert(position, snapshot);
                self.emit_splice(Splice {
                    position,
                    removed: 0,
                    added: 1,
                });
                Ok(position)
            }
        }
    }

    /// Remove and return the entity at `position`.
    ///
    /// # Errors
    ///
    /// Fails with [`CollectionError::PositionOutOfBounds`] when `position`
    /// does not name a live slot. Positions are only valid within the
    /// generation they were resolved in; removing by a stale position is a
    /// programming error, not a recoverable condition.
    pub fn remove_at(&mut self, position: usize) -> CollectionResult<TorrentSnapshot> {
        if position >= self.entries.len() {
            return Err(CollectionError::PositionOutOfBounds {
                position,
                len: self.entries.len(),
            });
        }
        let snapshot = self.entries.remove(position);
        self.emit_splice(Splice {
            position,
            removed: 1,
            added: 0,
        });
        Ok(snapshot)
    }

    /// Atomically replace `removed` entries at `position` with `items`.
    ///
    /// Used for bulk loads: `splice(0, len(), items)` swaps the whole
    /// contents in one structural notification.
    ///
    /// # Errors
    ///
    /// Fails with [`CollectionError::PositionOutOfBounds`] when the removed
    /// range does not exist, and with [`CollectionError::UnorderedSplice`]
    /// when the result would no longer be strictly ascending by identity.
    /// The store is left untouched on error.
    pub fn splice(
        &mut self,
        position: usize,
        removed: usize,
        items: Vec<TorrentSnapshot>,
    ) -> CollectionResult<Splice> {
        let len = self.entries.len();
        if position + removed > len {
            return Err(CollectionError::PositionOutOfBounds { position, len });
        }

        for window in items.windows(2) {
            if window[0].id() >= window[1].id() {
                return Err(CollectionError::UnorderedSplice {
                    id: window[1].id(),
                });
            }
        }
        if let (Some(first), Some(previous)) =
            (items.first(), position.checked_sub(1).map(|p| &self.entries[p]))
            && previous.id() >= first.id()
        {
            return Err(CollectionError::UnorderedSplice { id: first.id() });
        }
        if let (Some(last), Some(next)) = (items.last(), self.entries.get(position + removed))
            && last.id() >= next.id()
        {
            return Err(CollectionError::UnorderedSplice { id: next.id() });
        }

        let added = items.len();
        let _ = self.entries.splice(position..position + removed, items);
        let splice = Splice {
            position,
            removed,
            added,
        };
        self.emit_splice(splice);
        Ok(splice)
    }

    /// Refresh every stored entity from the engine and collect the changes.
    ///
    /// `fetch` reads the current record for one identity; `None` skips the
    /// entity (it is about to be removed by a pending notice). The pass
    /// always completes over the whole store before anything is reported, so
    /// observers never see a partially refreshed state, and an empty outcome
    /// is not reported at all.
    pub fn refresh_all<F>(&mut self, mut fetch: F) -> EntitiesChanged
    where
        F: FnMut(TorrentId) -> Option<TorrentFields>,
    {
        let mut outcome = EntitiesChanged::default();
        for entry in &mut self.entries {
            let Some(fields) = fetch(entry.id()) else {
                continue;
            };
            let changes = entry.refresh(&fields);
            if !changes.is_empty() {
                outcome.ids.push(entry.id());
                outcome.flags.insert(changes);
            }
        }
        if !outcome.is_empty() {
            self.emit_changed(&outcome);
        }
        outcome
    }

    /// Refresh a single entity from a known mutation, outside the regular
    /// refresh cadence.
    ///
    /// Emits the same batched notification shape as [`TorrentStore::refresh_all`]
    /// with a single-identity set. Returns `None` when the identity is
    /// unknown or nothing changed.
    pub fn refresh_entity(
        &mut self,
        id: TorrentId,
        fields: &TorrentFields,
    ) -> Option<EntitiesChanged> {
        let position = self.position_of(id)?;
        let changes = self.entries[position].refresh(fields);
        if changes.is_empty() {
            return None;
        }
        let outcome = EntitiesChanged {
            ids: vec![id],
            flags: changes,
        };
        self.emit_changed(&outcome);
        Some(outcome)
    }

    /// Register an observer for structural mutations.
    pub fn subscribe_structural<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(Splice) + Send + 'static,
    {
        let id = self.next_subscription_id();
        self.structural.push((id, Box::new(observer)));
        id
    }

    /// Register an observer for batched entity-change notifications.
    pub fn subscribe_changed<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&EntitiesChanged) + Send + 'static,
    {
        let id = self.next_subscription_id();
        self.changed.push((id, Box::new(observer)));
        id
    }

    /// Drop a previously registered observer; unknown handles are ignored.
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.structural.retain(|(handle, _)| *handle != id);
        self.changed.retain(|(handle, _)| *handle != id);
    }

    fn next_subscription_id(&mut self) -> SubscriptionId {
        self.next_subscription += 1;
        SubscriptionId(self.next_subscription)
    }

    fn emit_splice(&mut self, splice: Splice) {
        for (_, observer) in &mut self.structural {
            observer(splice);
        }
    }

    fn emit_changed(&mut self, outcome: &EntitiesChanged) {
        for (_, observer) in &mut self.changed {
            observer(outcome);
        }
    }
}
