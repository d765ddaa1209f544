//! Evaluation context handed to transaction bodies.

use crate::txn::Journal;
use crate::types::{FiberId, TxnId};

/// The running attempt as seen from inside a transaction body.
///
/// Gives raw access to the attempt's journal, its transaction id, the fiber
/// running it and the injected environment.
pub struct Txn<'a, R> {
    pub(crate) journal: &'a mut Journal,
    pub(crate) txn_id: TxnId,
    pub(crate) fiber_id: FiberId,
    pub(crate) env: &'a R,
}

impl<'a, R> Txn<'a, R> {
    /// Returns the attempt's journal.
    pub fn journal(&mut self) -> &mut Journal {
        self.journal
    }

    /// Returns the id of the running attempt.
    pub fn txn_id(&self) -> TxnId {
        self.txn_id
    }

    /// Returns the fiber running the transaction.
    pub fn fiber_id(&self) -> FiberId {
        self.fiber_id
    }

    /// Returns the injected environment.
    pub fn env(&self) -> &R {
        self.env
    }

    /// Runs `f` against this attempt with a different environment.
    pub(crate) fn with_env<R2, T>(&mut self, env: &R2, f: impl FnOnce(&mut Txn<'_, R2>) -> T) -> T {
        let mut inner = Txn {
            journal: &mut *self.journal,
            txn_id: self.txn_id,
            fiber_id: self.fiber_id,
            env,
        };
        f(&mut inner)
    }
}
