//! Transactional references.
//!
//! A `TRef` owns one committed [`Versioned`] snapshot plus the wake-up
//! callbacks of transactions suspended on it. All reads and writes go through
//! the journal of the running transaction; the committed slot only changes
//! inside the commit critical section.

use crate::stm::Stm;
use crate::types::{TRefId, TxnId};
use crate::versioned::Versioned;
use crate::wake::WakeHandle;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

struct TRefInner<A> {
    id: TRefId,
    /// Committed version. Replaced only while the commit lock is held.
    versioned: Mutex<Arc<Versioned<A>>>,
    /// Suspended transactions waiting for this ref to change.
    waiters: Mutex<BTreeMap<TxnId, WakeHandle>>,
}

/// A transactional reference cell.
///
/// Cloning a `TRef` produces another handle to the same cell.
pub struct TRef<A> {
    inner: Arc<TRefInner<A>>,
}

impl<A> TRef<A> {
    /// Returns the ref's identifier.
    #[must_use]
    pub fn id(&self) -> TRefId {
        self.inner.id
    }

    pub(crate) fn versioned(&self) -> Arc<Versioned<A>> {
        Arc::clone(&self.inner.versioned.lock())
    }

    pub(crate) fn install(&self, versioned: Arc<Versioned<A>>) {
        *self.inner.versioned.lock() = versioned;
    }

    pub(crate) fn add_waiter(&self, txn_id: TxnId, callback: WakeHandle) {
        self.inner.waiters.lock().insert(txn_id, callback);
    }

    pub(crate) fn remove_waiter(&self, txn_id: TxnId) {
        self.inner.waiters.lock().remove(&txn_id);
    }

    pub(crate) fn drain_waiters(&self, out: &mut Vec<WakeHandle>) {
        let mut waiters = self.inner.waiters.lock();
        out.extend(std::mem::take(&mut *waiters).into_values());
    }

    /// Returns the number of suspended transactions registered on this ref.
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.inner.waiters.lock().len()
    }
}

impl<A> TRef<A>
where
    A: Clone + Send + Sync + 'static,
{
    /// Allocates a new ref holding `value`.
    pub fn new(value: A) -> Self {
        Self {
            inner: Arc::new(TRefInner {
                id: TRefId::next(),
                versioned: Mutex::new(Versioned::new(value)),
                waiters: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    /// Allocates a new ref as part of a transaction.
    ///
    /// Every attempt allocates a fresh ref; only the one from the committed
    /// attempt is observed.
    pub fn make<E: 'static, R: 'static>(value: A) -> Stm<TRef<A>, E, R> {
        Stm::sync(move || TRef::new(value.clone()))
    }

    /// Reads the ref.
    pub fn get<E: 'static, R: 'static>(&self) -> Stm<A, E, R> {
        let tref = self.clone();
        Stm::journal(move |journal, _| journal.touch(&tref).read())
    }

    /// Writes `value` to the ref.
    pub fn set<E: 'static, R: 'static>(&self, value: A) -> Stm<(), E, R> {
        let tref = self.clone();
        Stm::journal(move |journal, _| journal.touch(&tref).write(value.clone()))
    }

    /// Reads and writes the ref in one journal access.
    ///
    /// `f` receives the current value and returns the result together with
    /// the next value.
    pub fn modify<B, E, R, F>(&self, f: F) -> Stm<B, E, R>
    where
        B: 'static,
        E: 'static,
        R: 'static,
        F: Fn(A) -> (B, A) + Send + Sync + 'static,
    {
        let tref = self.clone();
        Stm::journal(move |journal, _| {
            let entry = journal.touch(&tref);
            let (result, next) = f(entry.read());
            entry.write(next);
            result
        })
    }

    /// Like [`modify`](Self::modify), but only writes when `f` matches.
    ///
    /// A non-matching call still records the read, so the transaction is
    /// validated against the value it inspected. Returns `default` when `f`
    /// does not match.
    pub fn modify_some<B, E, R, F>(&self, default: B, f: F) -> Stm<B, E, R>
    where
        B: Clone + Send + Sync + 'static,
        E: 'static,
        R: 'static,
        F: Fn(&A) -> Option<(B, A)> + Send + Sync + 'static,
    {
        let tref = self.clone();
        Stm::journal(move |journal, _| {
            let entry = journal.touch(&tref);
            match f(&entry.read()) {
                Some((result, next)) => {
                    entry.write(next);
                    result
                }
                None => default.clone(),
            }
        })
    }

    /// Replaces the value with `f(value)`.
    pub fn update<E, R, F>(&self, f: F) -> Stm<(), E, R>
    where
        E: 'static,
        R: 'static,
        F: Fn(A) -> A + Send + Sync + 'static,
    {
        self.modify(move |a| ((), f(a)))
    }

    /// Replaces the value when `f` matches; otherwise only records the read.
    pub fn update_some<E, R, F>(&self, f: F) -> Stm<(), E, R>
    where
        E: 'static,
        R: 'static,
        F: Fn(&A) -> Option<A> + Send + Sync + 'static,
    {
        self.modify_some((), move |a| f(a).map(|next| ((), next)))
    }

    /// Replaces the value with `f(value)` and returns the new value.
    pub fn update_and_get<E, R, F>(&self, f: F) -> Stm<A, E, R>
    where
        E: 'static,
        R: 'static,
        F: Fn(A) -> A + Send + Sync + 'static,
    {
        self.modify(move |a| {
            let next = f(a);
            (next.clone(), next)
        })
    }

    /// Replaces the value with `f(value)` and returns the old value.
    pub fn get_and_update<E, R, F>(&self, f: F) -> Stm<A, E, R>
    where
        E: 'static,
        R: 'static,
        F: Fn(A) -> A + Send + Sync + 'static,
    {
        self.modify(move |a| (a.clone(), f(a)))
    }

    /// Writes `value` and returns the old value.
    pub fn get_and_set<E: 'static, R: 'static>(&self, value: A) -> Stm<A, E, R> {
        self.modify(move |a| (a, value.clone()))
    }
}

impl<A> Clone for TRef<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A> PartialEq for TRef<A> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<A> Eq for TRef<A> {}

impl<A: fmt::Debug> fmt::Debug for TRef<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TRef")
            .field("id", &self.inner.id)
            .field("value", self.versioned().value())
            .field("waiters", &self.waiter_count())
            .finish()
    }
}
