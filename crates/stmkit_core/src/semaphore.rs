//! Transactional semaphore.
//!
//! The whole semaphore is one [`TRef`] holding the available permit count.
//! Acquiring more permits than are available retries, so the caller parks
//! until a release commits; every waiter then re-checks its own request.

use crate::error::Exit;
use crate::fiber::Fiber;
use crate::runtime::Runtime;
use crate::stm::Stm;
use crate::tref::TRef;
use std::convert::Infallible;
use std::future::Future;
use tracing::warn;

/// A counting semaphore built on a transactional ref.
///
/// ```rust,ignore
/// use stmkit_core::{Runtime, Semaphore};
///
/// let semaphore = Semaphore::new(4);
/// let fiber = Runtime::global().fiber();
/// let answer = semaphore.with_permits(&fiber, 2, async { 42 }).await?;
/// ```
#[derive(Clone, Debug)]
pub struct Semaphore {
    permits: TRef<usize>,
    capacity: usize,
}

impl Semaphore {
    /// Creates a semaphore with `capacity` available permits.
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: TRef::new(capacity),
            capacity,
        }
    }

    /// Creates a semaphore as part of a transaction.
    pub fn make<E: 'static, R: 'static>(capacity: usize) -> Stm<Semaphore, E, R> {
        Stm::sync(move || Semaphore::new(capacity))
    }

    /// Returns the number of permits the semaphore was created with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Takes `n` permits, retrying until that many are available.
    ///
    /// Asking for more than [`capacity`](Self::capacity) retries until the
    /// caller is interrupted.
    pub fn acquire_n<E: 'static, R: 'static>(&self, n: usize) -> Stm<(), E, R> {
        let permits = self.permits.clone();
        self.permits.get().flat_map(move |available| {
            if available >= n {
                permits.set(available - n)
            } else {
                Stm::retry()
            }
        })
    }

    /// Returns `n` permits.
    ///
    /// The count is not clamped to [`capacity`](Self::capacity); releasing
    /// permits that were never acquired raises it and logs a warning.
    pub fn release_n<E: 'static, R: 'static>(&self, n: usize) -> Stm<(), E, R> {
        let capacity = self.capacity;
        self.permits.update(move |available| {
            let released = available.saturating_add(n);
            if released > capacity {
                warn!(available, released = n, capacity, "semaphore released above capacity");
            }
            released
        })
    }

    /// Takes one permit.
    pub fn acquire<E: 'static, R: 'static>(&self) -> Stm<(), E, R> {
        self.acquire_n(1)
    }

    /// Returns one permit.
    pub fn release<E: 'static, R: 'static>(&self) -> Stm<(), E, R> {
        self.release_n(1)
    }

    /// Reads the number of available permits.
    pub fn available<E: 'static, R: 'static>(&self) -> Stm<usize, E, R> {
        self.permits.get()
    }

    /// Acquires `n` permits on `fiber`, returning a guard that gives them
    /// back when dropped.
    ///
    /// Fails only if the fiber is interrupted while waiting; nothing is
    /// acquired in that case.
    pub async fn acquire_permits(
        &self,
        fiber: &Fiber,
        n: usize,
    ) -> Exit<SemaphorePermit, Infallible> {
        let acquire: Stm<()> = self.acquire_n(n);
        fiber.commit(acquire).await?;
        Ok(SemaphorePermit {
            semaphore: self.clone(),
            permits: n,
            runtime: fiber.runtime().clone(),
        })
    }

    /// Runs `action` while holding `n` permits.
    ///
    /// The permits are released however `action` ends, including when the
    /// returned future is dropped or `action` panics.
    pub async fn with_permits<F>(
        &self,
        fiber: &Fiber,
        n: usize,
        action: F,
    ) -> Exit<F::Output, Infallible>
    where
        F: Future,
    {
        let permit = self.acquire_permits(fiber, n).await?;
        let output = action.await;
        drop(permit);
        Ok(output)
    }
}

/// Permits held from a [`Semaphore`]; released on drop.
#[derive(Debug)]
#[must_use = "permits are released as soon as the guard is dropped"]
pub struct SemaphorePermit {
    semaphore: Semaphore,
    permits: usize,
    runtime: Runtime,
}

impl SemaphorePermit {
    /// Returns the number of permits held.
    pub fn permits(&self) -> usize {
        self.permits
    }
}

impl Drop for SemaphorePermit {
    fn drop(&mut self) {
        // A fresh fiber cannot have been interrupted, and releasing never
        // retries, so this commit neither parks nor fails.
        let release: Stm<()> = self.semaphore.release_n(self.permits);
        if let Err(cause) = self.runtime.fiber().commit_blocking(release) {
            warn!(permits = self.permits, %cause, "failed to release semaphore permits");
        }
    }
}
