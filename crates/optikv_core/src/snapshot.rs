//! Point-in-time snapshots.

use crate::config::SnapshotBinding;
use crate::types::{DatabaseId, SequenceNumber, SnapshotId};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Lifecycle state of a [`Snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    /// Registered with its database; reads may be anchored to it.
    Live,
    /// Released; the handle is a sentinel and must not be used for reads.
    Released,
}

/// An immutable marker of the committed state at one sequence number.
///
/// Created by `new_snapshot` and released through the **same** database
/// with `release_snapshot`. While live it pins every version it can see.
#[derive(Debug)]
pub struct Snapshot {
    id: SnapshotId,
    sequence: SequenceNumber,
    owner: DatabaseId,
    state: SnapshotState,
}

impl Snapshot {
    pub(crate) fn live(id: SnapshotId, sequence: SequenceNumber, owner: DatabaseId) -> Self {
        Self {
            id,
            sequence,
            owner,
            state: SnapshotState::Live,
        }
    }

    /// A snapshot that was never registered (handed out by a closed database).
    pub(crate) fn released(owner: DatabaseId) -> Self {
        Self {
            id: SnapshotId(0),
            sequence: SequenceNumber::default(),
            owner,
            state: SnapshotState::Released,
        }
    }

    /// Returns the snapshot id.
    #[must_use]
    pub fn id(&self) -> SnapshotId {
        self.id
    }

    /// Returns the sequence the snapshot observes.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SnapshotState {
        self.state
    }

    /// Returns true once released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.state == SnapshotState::Released
    }

    /// Id of the database that created the snapshot.
    #[must_use]
    pub fn owner(&self) -> DatabaseId {
        self.owner
    }

    pub(crate) fn binding(&self) -> SnapshotBinding {
        SnapshotBinding {
            id: self.id,
            sequence: self.sequence,
            owner: self.owner,
        }
    }

    pub(crate) fn mark_released(&mut self) {
        self.state = SnapshotState::Released;
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        if self.state == SnapshotState::Live {
            tracing::warn!(
                snapshot = %self.id,
                database = %self.owner,
                "snapshot dropped without release; it stays pinned until the database closes"
            );
        }
    }
}

/// Registry of live snapshots for one database.
#[derive(Debug, Default)]
pub(crate) struct SnapshotList {
    inner: Mutex<SnapshotListInner>,
}

#[derive(Debug, Default)]
struct SnapshotListInner {
    next_id: u64,
    live: BTreeMap<SnapshotId, SequenceNumber>,
}

impl SnapshotList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a snapshot at `sequence` and returns its id.
    pub(crate) fn insert(&self, sequence: SequenceNumber) -> SnapshotId {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = SnapshotId(inner.next_id);
        inner.live.insert(id, sequence);
        id
    }

    /// Unregisters a snapshot. Returns false if it was not live.
    pub(crate) fn remove(&self, id: SnapshotId) -> bool {
        self.inner.lock().live.remove(&id).is_some()
    }

    pub(crate) fn contains(&self, id: SnapshotId) -> bool {
        self.inner.lock().live.contains_key(&id)
    }

    /// Oldest sequence any live snapshot observes.
    pub(crate) fn oldest(&self) -> Option<SequenceNumber> {
        self.inner.lock().live.values().min().copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().live.len()
    }

    /// Forgets every snapshot. Used at close.
    pub(crate) fn clear(&self) {
        self.inner.lock().live.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_tracks_oldest_live_sequence() {
        let list = SnapshotList::new();
        assert_eq!(list.oldest(), None);

        let a = list.insert(SequenceNumber::new(7));
        let b = list.insert(SequenceNumber::new(3));
        let c = list.insert(SequenceNumber::new(9));
        assert_eq!(list.len(), 3);
        assert_eq!(list.oldest(), Some(SequenceNumber::new(3)));

        assert!(list.remove(b));
        assert_eq!(list.oldest(), Some(SequenceNumber::new(7)));
        assert!(!list.remove(b));

        assert!(list.contains(a));
        list.clear();
        assert!(!list.contains(c));
    }

    #[test]
    fn snapshot_state_transitions_once() {
        let owner = DatabaseId::allocate();
        let mut snapshot = Snapshot::live(SnapshotId(1), SequenceNumber::new(4), owner);
        assert_eq!(snapshot.state(), SnapshotState::Live);
        assert_eq!(snapshot.sequence(), SequenceNumber::new(4));

        snapshot.mark_released();
        assert!(snapshot.is_released());
    }

    #[test]
    fn released_placeholder_is_not_live() {
        let snapshot = Snapshot::released(DatabaseId::allocate());
        assert!(snapshot.is_released());
    }
}
