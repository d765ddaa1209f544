//! Stress tests for stmkit.
//!
//! These runners hammer shared refs from many OS threads and report how the
//! transactions fared.

use crate::fixtures::Accounts;
use stmkit_core::{Runtime, Semaphore, Stm, TRef};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a one-line summary of the run under `name`.
    pub fn print_summary(&self, name: &str) {
        println!(
            "{name}: {}/{} committed, {} failed in {:?} ({:.0} txn/s)",
            self.successful_ops, self.total_ops, self.failed_ops, self.duration, self.ops_per_second
        );
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations to perform across all threads.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Largest amount moved by one transfer.
    pub max_amount: i64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            max_amount: 50,
        }
    }
}

fn run_threads<F>(config: &StressConfig, op: F) -> StressTestResult
where
    F: Fn(usize, usize) -> bool + Send + Sync + 'static,
{
    let op = Arc::new(op);
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let threads = config.threads.max(1);
    let ops_per_thread = config.operations / threads;

    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let op = Arc::clone(&op);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);

            thread::spawn(move || {
                for i in 0..ops_per_thread {
                    if op(t, i) {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Increments `counter` once per operation from every thread.
pub fn stress_concurrent_increments(
    runtime: &Runtime,
    counter: &TRef<i64>,
    config: &StressConfig,
) -> StressTestResult {
    let runtime = runtime.clone();
    let counter = counter.clone();
    run_threads(config, move |_, _| {
        let increment: Stm<()> = counter.update(|n| n + 1);
        runtime.fiber().commit_blocking(increment).is_ok()
    })
}

/// Runs transfers between pseudo-randomly chosen accounts.
///
/// Transfers that find the source short fail with a typed error and count
/// as failed operations; they must leave every balance untouched.
pub fn stress_random_transfers(
    runtime: &Runtime,
    accounts: &Accounts,
    config: &StressConfig,
) -> StressTestResult {
    let runtime = runtime.clone();
    let accounts = accounts.clone();
    let max_amount = config.max_amount.max(1);
    run_threads(config, move |t, i| {
        let n = accounts.len();
        let from = (t * 7 + i * 13) % n;
        let to = (t * 11 + i * 5 + 1) % n;
        let amount = ((t + i * 31) as i64 % max_amount) + 1;
        runtime
            .fiber()
            .commit_blocking(accounts.transfer(from, to, amount))
            .is_ok()
    })
}

/// Acquires and releases permits of `semaphore` from every thread.
///
/// An operation fails if, while holding its permit, the thread observes more
/// concurrent holders than the semaphore's capacity.
pub fn stress_semaphore_churn(
    runtime: &Runtime,
    semaphore: &Semaphore,
    config: &StressConfig,
) -> StressTestResult {
    let runtime = runtime.clone();
    let semaphore = semaphore.clone();
    let holders = Arc::new(AtomicUsize::new(0));
    run_threads(config, move |_, _| {
        let fiber = runtime.fiber();
        let acquire: Stm<()> = semaphore.acquire();
        if fiber.commit_blocking(acquire).is_err() {
            return false;
        }
        let inside = holders.fetch_add(1, Ordering::SeqCst) + 1;
        thread::yield_now();
        holders.fetch_sub(1, Ordering::SeqCst);
        let release: Stm<()> = semaphore.release();
        fiber.commit_blocking(release).is_ok() && inside <= semaphore.capacity()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> StressConfig {
        StressConfig {
            operations: 2_000,
            threads: 4,
            ..Default::default()
        }
    }

    #[test]
    fn test_concurrent_increments() {
        let runtime = Runtime::default();
        let counter = TRef::new(0);
        let result = stress_concurrent_increments(&runtime, &counter, &small());
        result.print_summary("concurrent increments");

        assert_eq!(result.failed_ops, 0);
        let value: Stm<i64> = counter.get();
        assert_eq!(value.commit_blocking(), Ok(2_000));
        assert_eq!(runtime.stats().commits(), 2_000);
    }

    #[test]
    fn test_random_transfers_preserve_total() {
        let runtime = Runtime::default();
        let accounts = Accounts::new(8, 100);
        let result = stress_random_transfers(&runtime, &accounts, &small());
        result.print_summary("random transfers");

        assert_eq!(result.total_ops, 2_000);
        let total: Stm<i64> = accounts.total();
        assert_eq!(total.commit_blocking(), Ok(800));
        let balances: Stm<Vec<i64>> = accounts.balances();
        assert!(balances.commit_blocking().unwrap().iter().all(|b| *b >= 0));
    }

    #[test]
    fn test_semaphore_churn() {
        let runtime = Runtime::default();
        let semaphore = Semaphore::new(2);
        let config = StressConfig {
            operations: 1_000,
            threads: 6,
            ..Default::default()
        };
        let result = stress_semaphore_churn(&runtime, &semaphore, &config);
        result.print_summary("semaphore churn");

        assert_eq!(result.failed_ops, 0);
        let available: Stm<usize> = semaphore.available();
        assert_eq!(available.commit_blocking(), Ok(2));
    }
}
