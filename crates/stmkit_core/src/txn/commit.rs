//! Commit protocol.
//!
//! Optimistic concurrency with one process-wide critical section:
//!
//! 1. Evaluate the body against the journal. No ref is mutated.
//! 2. Take the commit lock and validate every entry by version identity.
//! 3. Stale journal: release the lock and evaluate again.
//! 4. `Retry`: register a wake callback on every touched ref and suspend.
//! 5. Any other outcome: apply pending writes, drain the waiters of every
//!    touched ref, release the lock, then fire the drained callbacks.

use crate::error::{Cause, Exit};
use crate::runtime::Runtime;
use crate::stm::{Stm, TExit};
use crate::txn::Journal;
use crate::types::{FiberId, TxnId};
use crate::wake::{Signal, WakeHandle};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Serializes validation and application of every commit in the process.
static COMMIT_LOCK: Mutex<()> = Mutex::new(());

/// Result of one pass through the commit protocol.
pub(crate) enum TryCommit<A, E> {
    /// The transaction reached a terminal outcome.
    Done(Exit<A, E>),
    /// The transaction retried and is registered on its refs.
    Suspend(Parked),
}

/// Registration left behind by a suspended transaction.
#[derive(Debug)]
pub(crate) struct Parked {
    pub(crate) txn_id: TxnId,
    pub(crate) signal: Arc<Signal>,
}

/// Per-transaction bookkeeping that survives suspensions.
///
/// Only stale-journal re-runs count as conflicts; re-running after a wake-up
/// does not.
#[derive(Debug, Default)]
pub(crate) struct Attempts {
    conflicts: u32,
    warned: bool,
}

/// Runs attempts until the transaction finishes or suspends.
///
/// `journal` is reused across attempts; entries left from a previous attempt
/// are refreshed to the refs' current versions before the body runs again.
pub(crate) fn try_commit<A, E, R>(
    stm: &Stm<A, E, R>,
    env: &R,
    fiber_id: FiberId,
    journal: &mut Journal,
    runtime: &Runtime,
    attempts: &mut Attempts,
) -> TryCommit<A, E>
where
    A: 'static,
    E: 'static,
    R: 'static,
{
    let config = runtime.config();
    let stats = runtime.stats();

    loop {
        journal.refresh();
        let txn_id = TxnId::next();
        stats.record_attempt();

        let exit = stm.evaluate(journal, txn_id, fiber_id, env, config.catch_panics);

        let guard = COMMIT_LOCK.lock();
        if !journal.is_valid() {
            drop(guard);
            stats.record_conflict();
            attempts.conflicts = attempts.conflicts.saturating_add(1);
            if attempts.conflicts >= config.contention_warn_threshold && !attempts.warned {
                attempts.warned = true;
                warn!(
                    fiber = %fiber_id,
                    conflicts = attempts.conflicts,
                    refs = journal.len(),
                    "transaction is highly contended"
                );
            }
            trace!(txn = %txn_id, "journal went stale, re-running");
            continue;
        }

        let exit = match exit {
            TExit::Retry => {
                let signal = Signal::new();
                let callback: WakeHandle = signal.clone();
                journal.register(txn_id, &callback);
                drop(guard);
                stats.record_suspension();
                debug!(txn = %txn_id, fiber = %fiber_id, refs = journal.len(), "transaction suspended");
                return TryCommit::Suspend(Parked { txn_id, signal });
            }
            TExit::Succeed(value) => Ok(value),
            TExit::Fail(error) => Err(Cause::Fail(error)),
            TExit::Die(defect) => Err(Cause::Die(defect)),
            TExit::Interrupt(by) => Err(Cause::Interrupt(by)),
        };

        if journal.has_changes() {
            journal.commit();
        }
        let waiters = journal.drain_waiters();
        drop(guard);

        stats.record_commit();
        if let Err(Cause::Die(defect)) = &exit {
            stats.record_defect();
            debug!(txn = %txn_id, %defect, "transaction died");
        }
        trace!(txn = %txn_id, woken = waiters.len(), "transaction committed");
        for waiter in waiters {
            waiter.wake();
        }
        return TryCommit::Done(exit);
    }
}

/// Removes a suspended transaction's registrations from every ref it touched.
///
/// Idempotent; registrations already drained by a commit are skipped.
pub(crate) fn unregister(journal: &Journal, txn_id: TxnId) {
    let _guard = COMMIT_LOCK.lock();
    journal.unregister(txn_id);
}
