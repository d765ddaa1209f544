//! Composable transaction descriptions.
//!
//! A [`Stm`] value describes a transaction; it does nothing until committed.
//! Committing evaluates the description against a fresh journal, possibly
//! many times, so bodies must be free of side effects outside their refs.
//!
//! # Example
//!
//! ```rust,ignore
//! use stmkit_core::{Stm, TRef};
//!
//! let from = TRef::new(100);
//! let to = TRef::new(0);
//!
//! let transfer: Stm<(), &str> = from.get().flat_map({
//!     let (from, to) = (from.clone(), to.clone());
//!     move |balance| {
//!         if balance < 50 {
//!             return Stm::fail("insufficient funds");
//!         }
//!         from.set(balance - 50).zip_right(to.update(|n| n + 50))
//!     }
//! });
//! ```

mod context;
mod exit;

pub use context::Txn;
pub use exit::TExit;

use crate::error::Defect;
use crate::txn::Journal;
use crate::types::{FiberId, TxnId};
use std::convert::Infallible;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

type Body<A, E, R> = dyn Fn(&mut Txn<'_, R>) -> TExit<A, E> + Send + Sync;

/// A transaction producing `A`, failing with `E`, and reading an
/// environment `R`.
///
/// Descriptions are immutable and cheap to clone.
pub struct Stm<A, E = Infallible, R = ()> {
    body: Arc<Body<A, E, R>>,
}

impl<A, E, R> Clone for Stm<A, E, R> {
    fn clone(&self) -> Self {
        Self {
            body: Arc::clone(&self.body),
        }
    }
}

impl<A, E, R> fmt::Debug for Stm<A, E, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stm").finish_non_exhaustive()
    }
}

impl<A, E, R> Stm<A, E, R>
where
    A: 'static,
    E: 'static,
    R: 'static,
{
    /// Builds a transaction from a function of the raw attempt context.
    ///
    /// This is the escape hatch the ref operations are written with.
    pub fn with_txn<F>(f: F) -> Self
    where
        F: Fn(&mut Txn<'_, R>) -> TExit<A, E> + Send + Sync + 'static,
    {
        Self { body: Arc::new(f) }
    }

    /// Builds a transaction from the attempt's journal and transaction id.
    pub fn journal<F>(f: F) -> Self
    where
        F: Fn(&mut Journal, TxnId) -> A + Send + Sync + 'static,
    {
        Self::with_txn(move |tx| TExit::Succeed(f(&mut *tx.journal, tx.txn_id)))
    }

    /// Succeeds with `value`.
    pub fn succeed(value: A) -> Self
    where
        A: Clone + Send + Sync,
    {
        Self::with_txn(move |_| TExit::Succeed(value.clone()))
    }

    /// Succeeds with the result of `f`, evaluated on every attempt.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn() -> A + Send + Sync + 'static,
    {
        Self::with_txn(move |_| TExit::Succeed(f()))
    }

    /// Fails with `error`.
    pub fn fail(error: E) -> Self
    where
        E: Clone + Send + Sync,
    {
        Self::with_txn(move |_| TExit::Fail(error.clone()))
    }

    /// Fails with the error produced by `f`.
    pub fn fail_with<F>(f: F) -> Self
    where
        F: Fn() -> E + Send + Sync + 'static,
    {
        Self::with_txn(move |_| TExit::Fail(f()))
    }

    /// Dies with `defect`.
    pub fn die(defect: Defect) -> Self {
        Self::with_txn(move |_| TExit::Die(defect.clone()))
    }

    /// Dies with a defect carrying `message`.
    pub fn die_message(message: impl Into<String>) -> Self {
        Self::die(Defect::new(message))
    }

    /// Aborts the attempt and waits until a touched ref changes.
    pub fn retry() -> Self {
        Self::with_txn(|_| TExit::Retry)
    }

    /// Interrupts the fiber running the transaction.
    pub fn interrupt() -> Self {
        Self::with_txn(|tx| TExit::Interrupt(tx.fiber_id))
    }

    /// Defers building the description until it is evaluated.
    pub fn suspend<F>(f: F) -> Self
    where
        F: Fn() -> Stm<A, E, R> + Send + Sync + 'static,
    {
        Self::with_txn(move |tx| (f().body)(tx))
    }

    /// Lifts a `Result` into a transaction.
    pub fn from_result(result: Result<A, E>) -> Self
    where
        A: Clone + Send + Sync,
        E: Clone + Send + Sync,
    {
        Self::with_txn(move |_| result.clone().into())
    }

    /// Succeeds with a value derived from the environment.
    pub fn access<F>(f: F) -> Self
    where
        F: Fn(&R) -> A + Send + Sync + 'static,
    {
        Self::with_txn(move |tx| TExit::Succeed(f(tx.env)))
    }

    /// Maps the success value.
    pub fn map<B, F>(self, f: F) -> Stm<B, E, R>
    where
        B: 'static,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        let body = self.body;
        Stm::with_txn(move |tx| body(tx).map(|a| f(a)))
    }

    /// Replaces the success value with `value`.
    pub fn as_<B>(self, value: B) -> Stm<B, E, R>
    where
        B: Clone + Send + Sync + 'static,
    {
        self.map(move |_| value.clone())
    }

    /// Maps the typed failure.
    pub fn map_err<E2, F>(self, f: F) -> Stm<A, E2, R>
    where
        E2: 'static,
        F: Fn(E) -> E2 + Send + Sync + 'static,
    {
        let body = self.body;
        Stm::with_txn(move |tx| body(tx).map_err(|e| f(e)))
    }

    /// Sequences a transaction computed from this one's value.
    pub fn flat_map<B, F>(self, f: F) -> Stm<B, E, R>
    where
        B: 'static,
        F: Fn(A) -> Stm<B, E, R> + Send + Sync + 'static,
    {
        let body = self.body;
        Stm::with_txn(move |tx| match body(tx).into_result() {
            Ok(a) => (f(a).body)(tx),
            Err(exit) => exit,
        })
    }

    /// Runs both transactions in order and combines their values.
    pub fn zip_with<B, C, F>(self, that: Stm<B, E, R>, f: F) -> Stm<C, E, R>
    where
        B: 'static,
        C: 'static,
        F: Fn(A, B) -> C + Send + Sync + 'static,
    {
        let left = self.body;
        let right = that.body;
        Stm::with_txn(move |tx| match left(tx).into_result() {
            Ok(a) => right(tx).map(|b| f(a, b)),
            Err(exit) => exit,
        })
    }

    /// Runs both transactions in order and pairs their values.
    pub fn zip<B: 'static>(self, that: Stm<B, E, R>) -> Stm<(A, B), E, R> {
        self.zip_with(that, |a, b| (a, b))
    }

    /// Runs both transactions in order, keeping the second value.
    pub fn zip_right<B: 'static>(self, that: Stm<B, E, R>) -> Stm<B, E, R> {
        self.zip_with(that, |_, b| b)
    }

    /// Runs both transactions in order, keeping the first value.
    pub fn zip_left<B: 'static>(self, that: Stm<B, E, R>) -> Stm<A, E, R> {
        self.zip_with(that, |a, _| a)
    }

    /// Recovers from a typed failure.
    ///
    /// Writes made before the failure stay in the journal.
    pub fn catch_all<E2, F>(self, f: F) -> Stm<A, E2, R>
    where
        E2: 'static,
        F: Fn(E) -> Stm<A, E2, R> + Send + Sync + 'static,
    {
        let body = self.body;
        Stm::with_txn(move |tx| match body(tx) {
            TExit::Fail(e) => (f(e).body)(tx),
            TExit::Succeed(a) => TExit::Succeed(a),
            TExit::Die(d) => TExit::Die(d),
            TExit::Interrupt(by) => TExit::Interrupt(by),
            TExit::Retry => TExit::Retry,
        })
    }

    /// Runs `that` if this transaction fails with a typed error.
    pub fn or_else<E2: 'static>(self, that: Stm<A, E2, R>) -> Stm<A, E2, R> {
        self.catch_all(move |_| that.clone())
    }

    /// Runs `that` if this transaction retries.
    ///
    /// The writes of the retrying branch are rolled back; its reads are kept,
    /// so if `that` retries too the transaction waits on both branches.
    pub fn or_try(self, that: Stm<A, E, R>) -> Stm<A, E, R> {
        let left = self.body;
        let right = that.body;
        Stm::with_txn(move |tx| {
            let checkpoint = tx.journal.checkpoint();
            match left(tx) {
                TExit::Retry => {
                    tx.journal.rollback(checkpoint);
                    right(tx)
                }
                other => other,
            }
        })
    }

    /// Handles both the typed failure and the success value.
    pub fn fold<B, E2, F, G>(self, on_failure: F, on_success: G) -> Stm<B, E2, R>
    where
        B: 'static,
        E2: 'static,
        F: Fn(E) -> B + Send + Sync + 'static,
        G: Fn(A) -> B + Send + Sync + 'static,
    {
        let body = self.body;
        Stm::with_txn(move |tx| match body(tx) {
            TExit::Succeed(a) => TExit::Succeed(on_success(a)),
            TExit::Fail(e) => TExit::Succeed(on_failure(e)),
            TExit::Die(d) => TExit::Die(d),
            TExit::Interrupt(by) => TExit::Interrupt(by),
            TExit::Retry => TExit::Retry,
        })
    }

    /// Surfaces the typed failure as a value.
    pub fn either<E2: 'static>(self) -> Stm<Result<A, E>, E2, R> {
        self.fold(|e| Err(e), |a| Ok(a))
    }

    /// Supplies the environment, producing a transaction that needs none
    /// of its own.
    pub fn provide<R0: 'static>(self, env: R) -> Stm<A, E, R0>
    where
        R: Send + Sync,
    {
        let body = self.body;
        Stm::with_txn(move |tx: &mut Txn<'_, R0>| tx.with_env(&env, |inner| body(inner)))
    }

    /// Evaluates the body once against `journal`.
    pub(crate) fn evaluate(
        &self,
        journal: &mut Journal,
        txn_id: TxnId,
        fiber_id: FiberId,
        env: &R,
        catch_panics: bool,
    ) -> TExit<A, E> {
        let mut txn = Txn {
            journal,
            txn_id,
            fiber_id,
            env,
        };
        if !catch_panics {
            return (self.body)(&mut txn);
        }
        match panic::catch_unwind(AssertUnwindSafe(|| (self.body)(&mut txn))) {
            Ok(exit) => exit,
            Err(payload) => TExit::Die(Defect::from_panic(payload)),
        }
    }
}

impl<E, R> Stm<(), E, R>
where
    E: 'static,
    R: 'static,
{
    /// Succeeds with `()`.
    pub fn unit() -> Self {
        Self::with_txn(|_| TExit::Succeed(()))
    }

    /// Retries unless `condition` holds.
    pub fn check(condition: bool) -> Self {
        if condition {
            Self::unit()
        } else {
            Self::retry()
        }
    }
}

impl<E, R> Stm<R, E, R>
where
    E: 'static,
    R: Clone + 'static,
{
    /// Succeeds with a copy of the environment.
    pub fn environment() -> Self {
        Self::access(|env: &R| env.clone())
    }
}

impl<B, E, R> Stm<Vec<B>, E, R>
where
    B: 'static,
    E: 'static,
    R: 'static,
{
    /// Runs `f` for every item in order and collects the values.
    ///
    /// Stops at the first outcome that is not a success.
    pub fn for_each<T, F>(items: Vec<T>, f: F) -> Self
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(T) -> Stm<B, E, R> + Send + Sync + 'static,
    {
        Self::with_txn(move |tx| {
            let mut values = Vec::with_capacity(items.len());
            for item in &items {
                match (f(item.clone()).body)(tx).into_result() {
                    Ok(value) => values.push(value),
                    Err(exit) => return exit,
                }
            }
            TExit::Succeed(values)
        })
    }
}
