//! Wake-up callbacks for suspended transactions.
//!
//! A transaction that retries registers a callback on every ref it touched.
//! The next commit that touches one of those refs drains and fires the
//! callbacks after leaving the commit critical section.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::task::Waker;

/// A continuation fired when a ref a suspended transaction depends on changes.
///
/// Implementations must be idempotent: a callback registered on several refs
/// may be fired more than once. Firing must only schedule the suspended
/// execution, never run it inline.
pub trait WakeCallback: Send + Sync {
    /// Signals the suspended transaction that it should re-run.
    fn wake(&self);
}

/// Shared handle to a wake callback.
pub type WakeHandle = Arc<dyn WakeCallback>;

/// One-shot park/unpark signal used by the commit loops.
///
/// Serves both parking styles: async tasks store their `Waker`, blocking
/// threads wait on the condition variable.
#[derive(Debug, Default)]
pub(crate) struct Signal {
    state: Mutex<SignalState>,
    condvar: Condvar,
}

#[derive(Debug, Default)]
struct SignalState {
    fired: bool,
    waker: Option<Waker>,
}

impl Signal {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fires the signal. Later calls are no-ops.
    pub(crate) fn fire(&self) {
        let waker = {
            let mut state = self.state.lock();
            if state.fired {
                return;
            }
            state.fired = true;
            state.waker.take()
        };
        self.condvar.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Returns true once fired; otherwise stores `waker` for the firing side.
    pub(crate) fn poll_fired(&self, waker: &Waker) -> bool {
        let mut state = self.state.lock();
        if state.fired {
            return true;
        }
        match &state.waker {
            Some(current) if current.will_wake(waker) => {}
            _ => state.waker = Some(waker.clone()),
        }
        false
    }

    /// Blocks the current thread until the signal fires.
    pub(crate) fn wait(&self) {
        let mut state = self.state.lock();
        while !state.fired {
            self.condvar.wait(&mut state);
        }
    }

    #[cfg(test)]
    pub(crate) fn is_fired(&self) -> bool {
        self.state.lock().fired
    }
}

impl WakeCallback for Signal {
    fn wake(&self) {
        self.fire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::Wake;
    use std::thread;
    use std::time::Duration;

    struct CountingWaker(AtomicUsize);

    impl Wake for CountingWaker {
        fn wake(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn fire_is_idempotent() {
        let counter = Arc::new(CountingWaker(AtomicUsize::new(0)));
        let waker = Waker::from(Arc::clone(&counter));
        let signal = Signal::new();

        assert!(!signal.poll_fired(&waker));
        signal.fire();
        signal.fire();

        assert!(signal.is_fired());
        assert!(signal.poll_fired(&waker));
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wait_returns_after_fire_from_other_thread() {
        let signal = Signal::new();
        let remote = Arc::clone(&signal);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            WakeCallback::wake(&*remote);
        });

        signal.wait();
        assert!(signal.is_fired());
        handle.join().unwrap();
    }
}
