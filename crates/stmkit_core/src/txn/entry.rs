//! Journal entries.

use crate::tref::TRef;
use crate::types::TxnId;
use crate::versioned::Versioned;
use crate::wake::WakeHandle;
use std::any::Any;
use std::sync::Arc;

/// One attempt's view of one ref.
///
/// Records the version observed when the ref was first touched and the
/// tentative value the attempt wants to commit. The ref itself is untouched
/// until commit.
pub struct Entry<A> {
    tref: TRef<A>,
    expected: Arc<Versioned<A>>,
    new_value: A,
    changed: bool,
}

impl<A> Entry<A>
where
    A: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(tref: TRef<A>) -> Self {
        let expected = tref.versioned();
        let new_value = expected.value().clone();
        Self {
            tref,
            expected,
            new_value,
            changed: false,
        }
    }

    /// Returns the value as seen by this attempt.
    pub fn read(&self) -> A {
        self.new_value.clone()
    }

    /// Records a tentative write.
    pub fn write(&mut self, value: A) {
        self.new_value = value;
        self.changed = true;
    }

    /// Re-reads the ref's committed version, discarding pending writes.
    pub fn refresh(&mut self) {
        self.expected = self.tref.versioned();
        self.new_value = self.expected.value().clone();
        self.changed = false;
    }

    /// Returns true if this attempt wrote to the ref.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Returns the ref this entry tracks.
    pub fn tref(&self) -> &TRef<A> {
        &self.tref
    }
}

/// Type-erased entry operations used by the journal and commit protocol.
pub(crate) trait EntryOps: Send + Sync {
    /// True while the ref still holds the version this entry observed.
    fn is_valid(&self) -> bool;

    fn is_changed(&self) -> bool;

    /// Installs the pending value as a new version. Commit lock must be held.
    fn commit(&self);

    fn refresh(&mut self);

    /// Drops the pending write but keeps the observed version.
    fn discard_write(&mut self);

    fn register(&self, txn_id: TxnId, callback: WakeHandle);

    fn unregister(&self, txn_id: TxnId);

    fn drain_waiters(&self, out: &mut Vec<WakeHandle>);

    fn clone_box(&self) -> Box<dyn EntryOps>;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<A> EntryOps for Entry<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn is_valid(&self) -> bool {
        Versioned::same(&self.tref.versioned(), &self.expected)
    }

    fn is_changed(&self) -> bool {
        self.changed
    }

    fn commit(&self) {
        if self.changed {
            self.tref.install(Versioned::new(self.new_value.clone()));
        }
    }

    fn refresh(&mut self) {
        Entry::refresh(self);
    }

    fn discard_write(&mut self) {
        self.new_value = self.expected.value().clone();
        self.changed = false;
    }

    fn register(&self, txn_id: TxnId, callback: WakeHandle) {
        self.tref.add_waiter(txn_id, callback);
    }

    fn unregister(&self, txn_id: TxnId) {
        self.tref.remove_waiter(txn_id);
    }

    fn drain_waiters(&self, out: &mut Vec<WakeHandle>) {
        self.tref.drain_waiters(out);
    }

    fn clone_box(&self) -> Box<dyn EntryOps> {
        Box::new(Entry {
            tref: self.tref.clone(),
            expected: Arc::clone(&self.expected),
            new_value: self.new_value.clone(),
            changed: self.changed,
        })
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
