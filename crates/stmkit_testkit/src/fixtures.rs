//! Test fixtures and transaction helpers.
//!
//! Provides tracing setup, a bank-account fixture and helpers for observing
//! how often a transaction body runs.

use stmkit_core::{Stm, TRef};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Installs a test-friendly tracing subscriber.
///
/// Honors `RUST_LOG` and defaults to `warn`. Safe to call from every test;
/// only the first call installs the subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// A transfer asked for more than the source account holds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("account {account} holds {balance}, cannot transfer {amount}")]
pub struct InsufficientFunds {
    /// Source account index.
    pub account: usize,
    /// Balance observed by the transaction.
    pub balance: i64,
    /// Requested amount.
    pub amount: i64,
}

/// A fixed set of accounts, one ref per balance.
#[derive(Debug, Clone)]
pub struct Accounts {
    balances: Vec<TRef<i64>>,
}

impl Accounts {
    /// Creates `count` accounts holding `initial` each.
    pub fn new(count: usize, initial: i64) -> Self {
        Self {
            balances: (0..count).map(|_| TRef::new(initial)).collect(),
        }
    }

    /// Returns the number of accounts.
    pub fn len(&self) -> usize {
        self.balances.len()
    }

    /// Returns true if there are no accounts.
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// Returns the ref holding account `index`.
    pub fn account(&self, index: usize) -> &TRef<i64> {
        &self.balances[index]
    }

    /// Moves `amount` from `from` to `to`, failing when `from` is short.
    pub fn transfer(&self, from: usize, to: usize, amount: i64) -> Stm<(), InsufficientFunds> {
        let source = self.balances[from].clone();
        let target = self.balances[to].clone();
        let balance: Stm<i64, InsufficientFunds> = source.get();
        balance.flat_map(move |balance| {
            if balance < amount {
                return Stm::fail(InsufficientFunds {
                    account: from,
                    balance,
                    amount,
                });
            }
            source
                .set(balance - amount)
                .zip_right(target.update(move |n| n + amount))
        })
    }

    /// Moves `amount` from `from` to `to`, waiting until `from` can cover it.
    pub fn transfer_when_funded(&self, from: usize, to: usize, amount: i64) -> Stm<()> {
        let source = self.balances[from].clone();
        let target = self.balances[to].clone();
        let balance: Stm<i64> = source.get();
        balance.flat_map(move |balance| {
            if balance < amount {
                return Stm::retry();
            }
            source
                .set(balance - amount)
                .zip_right(target.update(move |n| n + amount))
        })
    }

    /// Reads every balance in one transaction.
    pub fn balances<E: 'static>(&self) -> Stm<Vec<i64>, E> {
        Stm::for_each(self.balances.clone(), |account: TRef<i64>| account.get())
    }

    /// Sums every balance in one transaction.
    pub fn total<E: 'static>(&self) -> Stm<i64, E> {
        self.balances().map(|balances| balances.iter().sum())
    }
}

/// Counts evaluations of transaction bodies.
///
/// Every attempt of a wrapped transaction bumps the counter, including
/// attempts that are discarded or retried.
#[derive(Debug, Clone, Default)]
pub struct AttemptCounter {
    count: Arc<AtomicUsize>,
}

impl AttemptCounter {
    /// Creates a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `stm` with a counting step in front of it.
    pub fn wrap<A: 'static, E: 'static>(&self, stm: Stm<A, E>) -> Stm<A, E> {
        let count = Arc::clone(&self.count);
        Stm::sync(move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
        .zip_right(stm)
    }

    /// Returns the number of evaluations so far.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

/// Runs `f` on its own thread and returns its value if it finishes within
/// `timeout`.
///
/// A thread that does not finish is left running; use this only to detect
/// hangs in tests.
pub fn terminates<T, F>(timeout: Duration, f: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(timeout).ok()
}

/// Spins until `condition` holds or `timeout` passes. Returns whether it held.
pub fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::yield_now();
    }
    condition()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stmkit_core::Cause;

    #[test]
    fn transfer_moves_funds() {
        let accounts = Accounts::new(2, 100);
        accounts.transfer(0, 1, 40).commit_blocking().unwrap();

        let balances: Stm<Vec<i64>> = accounts.balances();
        assert_eq!(balances.commit_blocking(), Ok(vec![60, 140]));
    }

    #[test]
    fn transfer_fails_without_writing() {
        let accounts = Accounts::new(2, 10);
        let result = accounts.transfer(0, 1, 50).commit_blocking();
        assert_eq!(
            result,
            Err(Cause::Fail(InsufficientFunds {
                account: 0,
                balance: 10,
                amount: 50,
            }))
        );
        let total: Stm<i64> = accounts.total();
        assert_eq!(total.commit_blocking(), Ok(20));
    }

    #[test]
    fn self_transfer_is_a_no_op() {
        let accounts = Accounts::new(1, 10);
        accounts.transfer(0, 0, 10).commit_blocking().unwrap();
        let balances: Stm<Vec<i64>> = accounts.balances();
        assert_eq!(balances.commit_blocking(), Ok(vec![10]));
    }

    #[test]
    fn attempt_counter_counts_each_evaluation() {
        let counter = AttemptCounter::new();
        let stm: Stm<i32> = counter.wrap(Stm::succeed(1));
        stm.clone().commit_blocking().unwrap();
        stm.commit_blocking().unwrap();
        assert_eq!(counter.count(), 2);
    }

    #[test]
    fn terminates_reports_hangs() {
        assert_eq!(terminates(Duration::from_secs(5), || 7), Some(7));
        let hung = terminates(Duration::from_millis(20), || {
            thread::sleep(Duration::from_secs(1));
        });
        assert!(hung.is_none());
    }

    #[test]
    fn eventually_polls_condition() {
        let mut calls = 0;
        assert!(eventually(Duration::from_secs(1), || {
            calls += 1;
            calls > 3
        }));
    }
}
