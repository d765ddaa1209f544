//! Runtime statistics.
//!
//! Counters describing how transactions behave under contention.
//!
//! # Usage
//!
//! ```rust,ignore
//! use stmkit_core::Runtime;
//!
//! let runtime = Runtime::global();
//! // Run transactions...
//! let stats = runtime.stats().snapshot();
//! println!("Commits: {}", stats.commits);
//! println!("Conflicts: {}", stats.conflicts);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Transaction statistics for one runtime.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct StmStats {
    /// Body evaluations, including re-executions.
    attempts: AtomicU64,
    /// Attempts that reached a terminal outcome.
    commits: AtomicU64,
    /// Attempts discarded because the journal went stale.
    conflicts: AtomicU64,
    /// Attempts that parked after an explicit retry.
    suspensions: AtomicU64,
    /// Parked transactions resumed by another commit.
    wakeups: AtomicU64,
    /// Transactions ended by interruption while parked.
    interrupts: AtomicU64,
    /// Committed outcomes that were defects.
    defects: AtomicU64,
}

impl StmStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_suspension(&self) {
        self.suspensions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_wakeup(&self) {
        self.wakeups.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_interrupt(&self) {
        self.interrupts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_defect(&self) {
        self.defects.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of body evaluations.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Returns the number of terminal commits.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Returns the number of validation failures.
    ///
    /// A high ratio of conflicts to commits means transactions are
    /// fighting over the same refs.
    pub fn conflicts(&self) -> u64 {
        self.conflicts.load(Ordering::Relaxed)
    }

    /// Returns the number of suspensions.
    pub fn suspensions(&self) -> u64 {
        self.suspensions.load(Ordering::Relaxed)
    }

    /// Returns the number of wake-ups.
    pub fn wakeups(&self) -> u64 {
        self.wakeups.load(Ordering::Relaxed)
    }

    /// Returns the number of interruptions.
    pub fn interrupts(&self) -> u64 {
        self.interrupts.load(Ordering::Relaxed)
    }

    /// Returns the number of committed defects.
    pub fn defects(&self) -> u64 {
        self.defects.load(Ordering::Relaxed)
    }

    /// Takes a plain copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            attempts: self.attempts(),
            commits: self.commits(),
            conflicts: self.conflicts(),
            suspensions: self.suspensions(),
            wakeups: self.wakeups(),
            interrupts: self.interrupts(),
            defects: self.defects(),
        }
    }
}

/// Point-in-time copy of [`StmStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Body evaluations.
    pub attempts: u64,
    /// Terminal commits.
    pub commits: u64,
    /// Validation failures.
    pub conflicts: u64,
    /// Suspensions after retry.
    pub suspensions: u64,
    /// Wake-ups.
    pub wakeups: u64,
    /// Interruptions.
    pub interrupts: u64,
    /// Committed defects.
    pub defects: u64,
}
