//! Cursor/stamp bridge between positional storage and persistent handles.

use crate::error::{CollectionError, CollectionResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use swarmview_core::TorrentId;

static NEXT_STAMP: AtomicU64 = AtomicU64::new(1);

/// Position-independent handle into a [`ListAdapter`].
///
/// A cursor stays valid across individual inserts and removals; it dies en
/// masse when the adapter it came from is replaced (the stamp changes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cursor {
    stamp: u64,
    id: TorrentId,
}

impl Cursor {
    /// Identity this cursor points at.
    #[must_use]
    pub const fn id(&self) -> TorrentId {
        self.id
    }
}

/// Bridges the positional visible list to consumers that want persistent,
/// invalidatable cursors.
///
/// Keeps an identity→position index that is adjusted incrementally on every
/// splice — one pass over the affected suffix, not a full rebuild — and a
/// generation stamp minted at construction so cursors from a replaced
/// adapter are rejected instead of silently misresolved.
#[derive(Debug)]
pub struct ListAdapter {
    stamp: u64,
    items: Vec<TorrentId>,
    positions: HashMap<TorrentId, usize>,
}

impl ListAdapter {
    /// Empty adapter with a fresh generation stamp.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stamp: NEXT_STAMP.fetch_add(1, Ordering::Relaxed),
            items: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// This adapter's generation stamp.
    #[must_use]
    pub const fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Number of adapted entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the adapter is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Identity at `position`, if any.
    #[must_use]
    pub fn id_at(&self, position: usize) -> Option<TorrentId> {
        self.items.get(position).copied()
    }

    /// Position of `id`; `None` is an expected outcome (the entity may have
    /// just been removed by a concurrent notification).
    #[must_use]
    pub fn position_of(&self, id: TorrentId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Apply one structural mutation of the adapted list.
    ///
    /// # Errors
    ///
    /// Fails with [`CollectionError::PositionOutOfBounds`] when the removed
    /// range does not exist and with [`CollectionError::DuplicateIdentity`]
    /// when an added identity is already adapted elsewhere; both indicate a
    /// broken invariant upstream and leave the adapter untouched.
    pub fn apply_splice(
        &mut self,
        position: usize,
        removed: usize,
        added: &[TorrentId],
    ) -> CollectionResult<()> {
        if position + removed > self.items.len() {
            return Err(CollectionError::PositionOutOfBounds {
                position,
                len: self.items.len(),
            });
        }
        for id in added {
            let occupied = self
                .positions
                .get(id)
                .is_some_and(|&at| at < position || at >= position + removed);
            if occupied {
                return Err(CollectionError::DuplicateIdentity { id: *id });
            }
        }

        for id in &self.items[position..position + removed] {
            self.positions.remove(id);
        }
        let _ = self
            .items
            .splice(position..position + removed, added.iter().copied());

        // one pass over the affected suffix keeps the index consistent
        for (index, id) in self.items.iter().enumerate().skip(position) {
            self.positions.insert(*id, index);
        }
        Ok(())
    }

    /// Mint a cursor for the entry at `position`.
    #[must_use]
    pub fn from_position(&self, position: usize) -> Option<Cursor> {
        self.items.get(position).map(|&id| Cursor {
            stamp: self.stamp,
            id,
        })
    }

    /// Resolve a cursor back to its current position.
    ///
    /// # Errors
    ///
    /// Fails with [`CollectionError::StaleCursor`] when the cursor was
    /// minted by a different adapter generation. An absent identity is
    /// `Ok(None)`, not an error.
    pub fn to_position(&self, cursor: Cursor) -> CollectionResult<Option<usize>> {
        self.check_stamp(cursor)?;
        Ok(self.position_of(cursor.id))
    }

    /// Step a cursor to the next entry.
    ///
    /// # Errors
    ///
    /// Fails with [`CollectionError::StaleCursor`] on a stamp mismatch.
    /// `Ok(None)` means the cursor's entry vanished or was last.
    pub fn advance(&self, cursor: Cursor) -> CollectionResult<Option<Cursor>> {
        self.check_stamp(cursor)?;
        let next = self
            .position_of(cursor.id)
            .and_then(|position| self.from_position(position + 1));
        Ok(next)
    }

    const fn check_stamp(&self, cursor: Cursor) -> CollectionResult<()> {
        if cursor.stamp == self.stamp {
            Ok(())
        } else {
            Err(CollectionError::StaleCursor {
                cursor_stamp: cursor.stamp,
                adapter_stamp: self.stamp,
            })
        }
    }
}

impl Default for ListAdapter {
    fn default() -> Self {
        Self::new()
    }
}
