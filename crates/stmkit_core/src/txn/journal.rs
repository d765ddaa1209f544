//! Per-attempt transaction journal.

use crate::tref::TRef;
use crate::txn::entry::{Entry, EntryOps};
use crate::types::{TRefId, TxnId};
use crate::wake::WakeHandle;
use std::collections::BTreeMap;
use std::fmt;

/// Every ref touched by one transaction attempt, with its [`Entry`].
///
/// The first access to a ref creates its entry; later accesses in the same
/// attempt reuse it. Nothing in the journal is visible to other transactions
/// until the commit protocol applies it.
#[derive(Default)]
pub struct Journal {
    entries: BTreeMap<TRefId, Box<dyn EntryOps>>,
}

impl Journal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `tref`, creating it on first access.
    pub fn touch<A>(&mut self, tref: &TRef<A>) -> &mut Entry<A>
    where
        A: Clone + Send + Sync + 'static,
    {
        self.entries
            .entry(tref.id())
            .or_insert_with(|| Box::new(Entry::new(tref.clone())) as Box<dyn EntryOps>)
            .as_any_mut()
            .downcast_mut::<Entry<A>>()
            .expect("journal entries are keyed by their ref's id")
    }

    /// Returns true if `tref` has been touched in this attempt.
    #[must_use]
    pub fn contains<A>(&self, tref: &TRef<A>) -> bool {
        self.entries.contains_key(&tref.id())
    }

    /// Returns the number of touched refs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no ref has been touched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if any entry carries a pending write.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.entries.values().any(|e| e.is_changed())
    }

    /// True if every touched ref still holds the version this attempt read.
    pub(crate) fn is_valid(&self) -> bool {
        self.entries.values().all(|e| e.is_valid())
    }

    /// Applies every pending write. Commit lock must be held.
    pub(crate) fn commit(&self) {
        for entry in self.entries.values() {
            entry.commit();
        }
    }

    /// Resets every entry to its ref's current version for a new attempt.
    pub(crate) fn refresh(&mut self) {
        for entry in self.entries.values_mut() {
            entry.refresh();
        }
    }

    pub(crate) fn register(&self, txn_id: TxnId, callback: &WakeHandle) {
        for entry in self.entries.values() {
            entry.register(txn_id, WakeHandle::clone(callback));
        }
    }

    pub(crate) fn unregister(&self, txn_id: TxnId) {
        for entry in self.entries.values() {
            entry.unregister(txn_id);
        }
    }

    /// Removes and returns the wake callbacks of all touched refs.
    pub(crate) fn drain_waiters(&self) -> Vec<WakeHandle> {
        let mut waiters = Vec::new();
        for entry in self.entries.values() {
            entry.drain_waiters(&mut waiters);
        }
        waiters
    }

    /// Copies the journal so a branch can be rolled back.
    pub(crate) fn checkpoint(&self) -> Journal {
        Journal {
            entries: self
                .entries
                .iter()
                .map(|(id, entry)| (*id, entry.clone_box()))
                .collect(),
        }
    }

    /// Restores writes recorded at `checkpoint`.
    ///
    /// Refs first touched after the checkpoint stay in the journal as plain
    /// reads, so the attempt still depends on what the abandoned branch saw.
    pub(crate) fn rollback(&mut self, mut checkpoint: Journal) {
        for (id, entry) in self.entries.iter_mut() {
            match checkpoint.entries.remove(id) {
                Some(saved) => *entry = saved,
                None => entry.discard_write(),
            }
        }
    }
}

impl fmt::Debug for Journal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Journal")
            .field("refs", &self.entries.keys().collect::<Vec<_>>())
            .field("changed", &self.has_changes())
            .finish()
    }
}
