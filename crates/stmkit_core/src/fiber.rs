//! Fibers: the executions that commit transactions.
//!
//! A [`Fiber`] owns an identity and an interruption flag. Interrupting a fiber
//! through its [`FiberHandle`] ends a transaction parked on a retry; a running
//! attempt is never stopped half-way, it is checked before evaluation and while
//! parked.

use crate::atomically::Atomically;
use crate::error::Exit;
use crate::runtime::Runtime;
use crate::stm::Stm;
use crate::types::{FiberId, TxnId};
use crate::wake::Signal;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct InterruptState {
    interrupted_by: Option<FiberId>,
    /// Signals of the transactions parked on this fiber, by attempt.
    listeners: BTreeMap<TxnId, Arc<Signal>>,
}

/// An execution context able to commit transactions.
#[derive(Clone)]
pub struct Fiber {
    id: FiberId,
    runtime: Runtime,
    interrupt: Arc<Mutex<InterruptState>>,
}

impl Fiber {
    pub(crate) fn new(runtime: Runtime) -> Self {
        Self {
            id: FiberId::next(),
            runtime,
            interrupt: Arc::new(Mutex::new(InterruptState::default())),
        }
    }

    /// Returns the fiber's identifier.
    pub fn id(&self) -> FiberId {
        self.id
    }

    /// Returns the runtime the fiber belongs to.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Returns a handle other executions can use to interrupt this fiber.
    pub fn handle(&self) -> FiberHandle {
        FiberHandle {
            id: self.id,
            interrupt: Arc::clone(&self.interrupt),
        }
    }

    /// Returns the fiber that interrupted this one, if any.
    pub fn interrupted_by(&self) -> Option<FiberId> {
        self.interrupt.lock().interrupted_by
    }

    /// Commits `stm` on this fiber, suspending the task while it retries.
    pub fn commit<A, E>(&self, stm: Stm<A, E>) -> Atomically<A, E>
    where
        A: 'static,
        E: 'static,
    {
        Atomically::new(self.clone(), stm)
    }

    /// Commits `stm` on this fiber, blocking the thread while it retries.
    pub fn commit_blocking<A, E>(&self, stm: Stm<A, E>) -> Exit<A, E>
    where
        A: 'static,
        E: 'static,
    {
        Atomically::new(self.clone(), stm).wait()
    }

    /// Routes a future interruption to the signal of parked attempt `txn_id`.
    ///
    /// Fires the signal at once if the fiber is already interrupted.
    pub(crate) fn listen(&self, txn_id: TxnId, signal: &Arc<Signal>) {
        let fire = {
            let mut state = self.interrupt.lock();
            if state.interrupted_by.is_some() {
                true
            } else {
                state.listeners.insert(txn_id, Arc::clone(signal));
                false
            }
        };
        if fire {
            signal.fire();
        }
    }

    pub(crate) fn unlisten(&self, txn_id: TxnId) {
        self.interrupt.lock().listeners.remove(&txn_id);
    }
}

impl std::fmt::Debug for Fiber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fiber")
            .field("id", &self.id)
            .field("interrupted_by", &self.interrupted_by())
            .finish()
    }
}

/// Cloneable handle used to interrupt a [`Fiber`].
#[derive(Clone)]
pub struct FiberHandle {
    id: FiberId,
    interrupt: Arc<Mutex<InterruptState>>,
}

impl FiberHandle {
    /// Returns the id of the fiber this handle controls.
    pub fn id(&self) -> FiberId {
        self.id
    }

    /// Interrupts the fiber on behalf of `by`.
    ///
    /// The first interruption wins; later calls are ignored. Every
    /// transaction parked on the fiber is woken and completes with
    /// [`Cause::Interrupt`](crate::Cause::Interrupt).
    pub fn interrupt(&self, by: FiberId) {
        let listeners = {
            let mut state = self.interrupt.lock();
            if state.interrupted_by.is_some() {
                return;
            }
            state.interrupted_by = Some(by);
            std::mem::take(&mut state.listeners)
        };
        debug!(fiber = %self.id, by = %by, parked = listeners.len(), "fiber interrupted");
        for signal in listeners.into_values() {
            signal.fire();
        }
    }
}

impl std::fmt::Debug for FiberHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FiberHandle").field("id", &self.id).finish()
    }
}
