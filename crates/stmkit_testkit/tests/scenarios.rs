//! Cross-module scenarios for the STM engine.

use proptest::prelude::*;
use stmkit_core::{Cause, FiberId, Runtime, Semaphore, Stm, TRef};
use stmkit_testkit::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn available(semaphore: &Semaphore) -> usize {
    let stm: Stm<usize> = semaphore.available();
    stm.commit_blocking().unwrap()
}

async fn until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition never held");
}

// ============================================================================
// Atomicity and isolation
// ============================================================================

#[test]
fn readers_never_see_partial_transfers() {
    init_tracing();
    let accounts = Accounts::new(2, 1_000);
    let done = Arc::new(AtomicBool::new(false));

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let accounts = accounts.clone();
            thread::spawn(move || {
                for i in 0..500 {
                    let (from, to) = if (t + i) % 2 == 0 { (0, 1) } else { (1, 0) };
                    let _ = accounts.transfer(from, to, 7).commit_blocking();
                }
            })
        })
        .collect();

    let reader = {
        let accounts = accounts.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut reads = 0;
            while !done.load(Ordering::SeqCst) {
                let total: Stm<i64> = accounts.total();
                assert_eq!(total.commit_blocking(), Ok(2_000));
                reads += 1;
            }
            reads
        })
    };

    for writer in writers {
        writer.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);
    assert!(reader.join().unwrap() > 0);
}

#[test]
fn uncontended_transaction_commits_on_first_attempt() {
    let runtime = Runtime::default();
    let accounts = Accounts::new(3, 10);
    let counter = AttemptCounter::new();

    let stm = counter.wrap(accounts.transfer(0, 2, 5));
    runtime.fiber().commit_blocking(stm).unwrap();

    assert_eq!(counter.count(), 1);
    assert_eq!(runtime.stats().conflicts(), 0);
    assert_eq!(runtime.stats().attempts(), 1);
}

#[test]
fn stale_failure_is_discarded_and_retried() {
    let runtime = Runtime::default();
    let r = TRef::new(0);
    let counter = AttemptCounter::new();

    let stm: Stm<i32, &str> = {
        let r = r.clone();
        let counter = counter.clone();
        r.clone().get().flat_map(move |n| {
            if counter.count() == 1 {
                // Another thread commits while this attempt is still running.
                let writer = r.clone();
                thread::spawn(move || {
                    let write: Stm<()> = writer.set(1);
                    write.commit_blocking().unwrap();
                })
                .join()
                .unwrap();
            }
            if n == 0 {
                Stm::fail("saw zero")
            } else {
                Stm::succeed(n)
            }
        })
    };

    let result = runtime.fiber().commit_blocking(counter.wrap(stm));
    assert_eq!(result, Ok(1));
    assert_eq!(counter.count(), 2);
    assert_eq!(runtime.stats().conflicts(), 1);
}

// ============================================================================
// Lost updates
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn hundred_concurrent_modifies_yield_hundred() {
    let runtime = Runtime::default();
    let r = TRef::new(0);

    let tasks: Vec<_> = (0..100)
        .map(|_| {
            let modify: Stm<i32> = r.modify(|n| (n, n + 1));
            tokio::spawn(runtime.fiber().commit(modify))
        })
        .collect();

    let mut seen = Vec::new();
    for task in tasks {
        seen.push(task.await.unwrap().unwrap());
    }
    seen.sort_unstable();

    let value: Stm<i32> = r.get();
    assert_eq!(value.commit().await, Ok(100));
    assert_eq!(seen, (0..100).collect::<Vec<_>>());
}

// ============================================================================
// Retry, liveness and interruption
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fail_surfaces_at_once_and_retry_suspends() {
    let runtime = Runtime::default();
    let counter = AttemptCounter::new();

    let fail: Stm<(), &str> = counter.wrap(Stm::fail("e"));
    assert_eq!(runtime.fiber().commit(fail).await, Err(Cause::Fail("e")));
    assert_eq!(counter.count(), 1);

    let retry: Stm<()> = Stm::retry();
    let fiber = runtime.fiber();
    let handle = fiber.handle();
    let task = tokio::spawn(fiber.commit(retry));
    until(|| runtime.stats().suspensions() == 1).await;
    assert!(!task.is_finished());

    let by = FiberId::next();
    handle.interrupt(by);
    assert_eq!(task.await.unwrap(), Err(Cause::Interrupt(by)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn suspended_transaction_reruns_after_write() {
    let runtime = Runtime::default();
    let r = TRef::new(0);
    let counter = AttemptCounter::new();

    let waiting: Stm<i32> = counter.wrap(r.get().flat_map(|n| Stm::check(n >= 10).as_(n)));
    let task = tokio::spawn(runtime.fiber().commit(waiting));
    until(|| r.waiter_count() == 1).await;
    assert_eq!(counter.count(), 1);

    // A write that keeps the condition false still re-runs the body.
    let write: Stm<()> = r.set(5);
    runtime.fiber().commit(write).await.unwrap();
    until(|| counter.count() >= 2 && r.waiter_count() == 1).await;
    assert!(!task.is_finished());

    let write: Stm<()> = r.set(10);
    runtime.fiber().commit(write).await.unwrap();
    assert_eq!(task.await.unwrap(), Ok(10));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn or_try_waits_on_both_branches() {
    let runtime = Runtime::default();
    let left = TRef::new(false);
    let right = TRef::new(false);

    let stm: Stm<&str> = {
        let ready = |r: &TRef<bool>, tag: &'static str| -> Stm<&'static str> {
            r.get().flat_map(move |ok| Stm::check(ok).as_(tag))
        };
        ready(&left, "left").or_try(ready(&right, "right"))
    };
    let task = tokio::spawn(runtime.fiber().commit(stm));
    until(|| left.waiter_count() == 1 && right.waiter_count() == 1).await;

    let write: Stm<()> = right.set(true);
    runtime.fiber().commit(write).await.unwrap();
    assert_eq!(task.await.unwrap(), Ok("right"));
    assert_eq!(left.waiter_count(), 0);
}

#[test]
fn blocked_thread_is_released_by_funding() {
    let runtime = Runtime::default();
    let accounts = Accounts::new(2, 0);

    let waiter = {
        let fiber = runtime.fiber();
        let stm = accounts.transfer_when_funded(0, 1, 50);
        thread::spawn(move || fiber.commit_blocking(stm))
    };
    assert!(eventually(Duration::from_secs(10), || {
        accounts.account(0).waiter_count() == 1
    }));

    let deposit: Stm<()> = accounts.account(0).update(|n| n + 80);
    runtime.fiber().commit_blocking(deposit).unwrap();

    let joined = terminates(Duration::from_secs(10), move || waiter.join().unwrap());
    assert_eq!(joined, Some(Ok(())));
    let balances: Stm<Vec<i64>> = accounts.balances();
    assert_eq!(balances.commit_blocking(), Ok(vec![30, 50]));
}

// ============================================================================
// Semaphore
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn semaphore_hands_one_permit_to_one_waiter() {
    let runtime = Runtime::default();
    let semaphore = Semaphore::new(4);

    let holders: Vec<_> = (0..4)
        .map(|_| {
            let acquire: Stm<()> = semaphore.acquire_n(1);
            tokio::spawn(runtime.fiber().commit(acquire))
        })
        .collect();
    for holder in holders {
        assert_eq!(holder.await.unwrap(), Ok(()));
    }
    assert_eq!(available(&semaphore), 0);

    let blocked: Vec<_> = (0..2)
        .map(|_| {
            let acquire: Stm<()> = semaphore.acquire_n(1);
            tokio::spawn(runtime.fiber().commit(acquire))
        })
        .collect();
    until(|| runtime.stats().suspensions() >= 2).await;
    assert!(blocked.iter().all(|task| !task.is_finished()));

    let release: Stm<()> = semaphore.release_n(1);
    runtime.fiber().commit(release).await.unwrap();
    until(|| blocked.iter().any(|task| task.is_finished())).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(blocked.iter().filter(|task| task.is_finished()).count(), 1);
    assert_eq!(available(&semaphore), 0);

    let release: Stm<()> = semaphore.release_n(1);
    runtime.fiber().commit(release).await.unwrap();
    for task in blocked {
        assert_eq!(task.await.unwrap(), Ok(()));
    }
    assert_eq!(available(&semaphore), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn interrupted_acquire_is_not_retriggered() {
    init_tracing();
    let runtime = Runtime::default();
    let semaphore = Semaphore::new(4);
    let counter = AttemptCounter::new();

    let fiber = runtime.fiber();
    let handle = fiber.handle();
    let acquire: Stm<()> = counter.wrap(semaphore.acquire_n(5));
    let task = tokio::spawn(fiber.commit(acquire));
    until(|| runtime.stats().suspensions() == 1).await;

    let by = FiberId::next();
    handle.interrupt(by);
    assert_eq!(task.await.unwrap(), Err(Cause::Interrupt(by)));
    assert_eq!(available(&semaphore), 4);

    let attempts = counter.count();
    let release: Stm<()> = semaphore.release_n(1);
    runtime.fiber().commit(release).await.unwrap();
    let acquire: Stm<()> = semaphore.acquire_n(1);
    runtime.fiber().commit(acquire).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(counter.count(), attempts);
    assert_eq!(available(&semaphore), 4);
    assert_eq!(runtime.stats().interrupts(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn with_permits_bounds_concurrency() {
    let runtime = Runtime::default();
    let semaphore = Semaphore::new(3);
    let inside = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let peak = Arc::new(std::sync::atomic::AtomicUsize::new(0));

    let tasks: Vec<_> = (0..12)
        .map(|_| {
            let semaphore = semaphore.clone();
            let fiber = runtime.fiber();
            let inside = Arc::clone(&inside);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                semaphore
                    .with_permits(&fiber, 1, async {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap(), Ok(()));
    }
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(available(&semaphore), 3);
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn concurrent_transfers_preserve_total(transfers in transfers_strategy(4, 60, 40)) {
        let accounts = Accounts::new(4, 50);
        let chunks: Vec<Vec<Transfer>> = transfers.chunks(10).map(|c| c.to_vec()).collect();

        let handles: Vec<_> = chunks
            .into_iter()
            .map(|chunk| {
                let accounts = accounts.clone();
                thread::spawn(move || {
                    for t in chunk {
                        let _ = accounts.transfer(t.from, t.to, t.amount).commit_blocking();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let balances: Stm<Vec<i64>> = accounts.balances();
        let balances = balances.commit_blocking().unwrap();
        prop_assert_eq!(balances.iter().sum::<i64>(), 200);
        prop_assert!(balances.iter().all(|b| *b >= 0));
    }

    #[test]
    fn semaphore_stays_within_bounds(requests in permits_strategy(4, 12)) {
        let semaphore = Semaphore::new(4);
        let fiber = Runtime::default().fiber();
        for n in requests {
            let acquire: Stm<()> = semaphore.acquire_n(n);
            fiber.commit_blocking(acquire).unwrap();
            let now = available(&semaphore);
            prop_assert!(now <= 4);
            prop_assert_eq!(now, 4 - n);
            let release: Stm<()> = semaphore.release_n(n);
            fiber.commit_blocking(release).unwrap();
        }
        prop_assert_eq!(available(&semaphore), 4);
    }
}
