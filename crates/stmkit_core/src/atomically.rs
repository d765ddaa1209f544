//! Commit drivers.
//!
//! [`Atomically`] runs the commit protocol for one transaction on one fiber.
//! Awaited, it parks the task on a retry; through
//! [`Fiber::commit_blocking`] it parks the thread instead. Both park on the
//! same signal, which is fired by a commit to a touched ref or by an
//! interruption of the fiber.

use crate::error::{Cause, Exit};
use crate::fiber::Fiber;
use crate::runtime::Runtime;
use crate::stm::Stm;
use crate::txn::commit::{self, Attempts, Parked, TryCommit};
use crate::txn::Journal;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::trace;

/// Future returned by [`Fiber::commit`] and [`Stm::commit`].
///
/// Resolves to the transaction's [`Exit`]. Dropping the future while it is
/// suspended withdraws its registrations from every ref it was waiting on.
#[must_use = "transactions do nothing unless awaited"]
pub struct Atomically<A, E> {
    fiber: Fiber,
    stm: Stm<A, E>,
    journal: Journal,
    parked: Option<Parked>,
    attempts: Attempts,
}

impl<A, E> Atomically<A, E>
where
    A: 'static,
    E: 'static,
{
    pub(crate) fn new(fiber: Fiber, stm: Stm<A, E>) -> Self {
        Self {
            fiber,
            stm,
            journal: Journal::new(),
            parked: None,
            attempts: Attempts::default(),
        }
    }

    /// Runs attempts until the transaction ends or parks.
    fn step(&mut self) -> Option<Exit<A, E>> {
        match commit::try_commit(
            &self.stm,
            &(),
            self.fiber.id(),
            &mut self.journal,
            self.fiber.runtime(),
            &mut self.attempts,
        ) {
            TryCommit::Done(exit) => Some(exit),
            TryCommit::Suspend(parked) => {
                self.fiber.listen(parked.txn_id, &parked.signal);
                self.parked = Some(parked);
                None
            }
        }
    }

    /// Returns the interruption cause if the fiber was interrupted.
    fn check_interrupt(&mut self) -> Option<Exit<A, E>> {
        let by = self.fiber.interrupted_by()?;
        self.leave_parked();
        self.fiber.runtime().stats().record_interrupt();
        trace!(fiber = %self.fiber.id(), by = %by, "transaction interrupted");
        Some(Err(Cause::Interrupt(by)))
    }

    fn resume(&mut self) {
        self.leave_parked();
        self.fiber.runtime().stats().record_wakeup();
    }

    /// Blocks the current thread until the transaction ends.
    pub(crate) fn wait(mut self) -> Exit<A, E> {
        loop {
            if let Some(exit) = self.check_interrupt() {
                return exit;
            }
            if let Some(parked) = &self.parked {
                parked.signal.wait();
                if self.fiber.interrupted_by().is_none() {
                    self.resume();
                }
                continue;
            }
            if let Some(exit) = self.step() {
                return exit;
            }
        }
    }
}

impl<A, E> Atomically<A, E> {
    fn leave_parked(&mut self) {
        if let Some(parked) = self.parked.take() {
            commit::unregister(&self.journal, parked.txn_id);
            self.fiber.unlisten(parked.txn_id);
        }
    }
}

impl<A, E> Future for Atomically<A, E>
where
    A: 'static,
    E: 'static,
{
    type Output = Exit<A, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        loop {
            if let Some(exit) = this.check_interrupt() {
                return Poll::Ready(exit);
            }
            if let Some(parked) = &this.parked {
                if !parked.signal.poll_fired(cx.waker()) {
                    return Poll::Pending;
                }
                if this.fiber.interrupted_by().is_none() {
                    this.resume();
                }
                continue;
            }
            if let Some(exit) = this.step() {
                return Poll::Ready(exit);
            }
        }
    }
}

impl<A, E> Drop for Atomically<A, E> {
    fn drop(&mut self) {
        self.leave_parked();
    }
}

impl<A, E> std::fmt::Debug for Atomically<A, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Atomically")
            .field("fiber", &self.fiber.id())
            .field("journal", &self.journal)
            .field("parked", &self.parked.is_some())
            .finish()
    }
}

impl<A, E> Stm<A, E>
where
    A: 'static,
    E: 'static,
{
    /// Commits on a fresh fiber of the global runtime.
    pub fn commit(self) -> Atomically<A, E> {
        Runtime::global().fiber().commit(self)
    }

    /// Commits on a fresh fiber of the global runtime, blocking the thread
    /// while the transaction retries.
    pub fn commit_blocking(self) -> Exit<A, E> {
        Runtime::global().fiber().commit_blocking(self)
    }
}
