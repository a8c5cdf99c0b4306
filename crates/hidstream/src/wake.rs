//! External wake signal used to cancel a blocked read.
//!
//! The signal is independent of data readiness. Raising it wakes any wait
//! that observes it, and the observing wait consumes it (auto-reset), so the
//! next read starts clean. Platform waitables that block outside this
//! process's condition variables (e.g. in `poll(2)`) subscribe with a wake
//! hook and translate the call into something their poll can see.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Callback invoked every time the signal is raised.
pub type WakeHook = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`WakeSignal::add_hook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

#[derive(Default)]
struct WakeState {
    raised: bool,
    next_hook: u64,
    hooks: Vec<(HookId, WakeHook)>,
}

#[derive(Default)]
struct WakeInner {
    state: Mutex<WakeState>,
    cond: Condvar,
}

/// Cloneable, thread-safe cancellation flag.
#[derive(Clone, Default)]
pub struct WakeSignal {
    inner: Arc<WakeInner>,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal and run every registered hook.
    pub fn set(&self) {
        let hooks: Vec<WakeHook> = {
            let mut state = self.inner.state.lock();
            state.raised = true;
            state.hooks.iter().map(|(_, hook)| Arc::clone(hook)).collect()
        };
        self.inner.cond.notify_all();

        // Hooks run without the lock held so they may call back into us.
        for hook in hooks {
            hook();
        }
    }

    pub fn clear(&self) {
        self.inner.state.lock().raised = false;
    }

    pub fn is_set(&self) -> bool {
        self.inner.state.lock().raised
    }

    /// Consume the signal, returning whether it was raised.
    pub fn take(&self) -> bool {
        std::mem::replace(&mut self.inner.state.lock().raised, false)
    }

    /// Block until the signal is raised or `timeout` elapses.
    ///
    /// Returns `true` (and consumes the signal) if it was raised.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut state = self.inner.state.lock();
        while !state.raised {
            match (timeout, deadline) {
                (None, _) => self.inner.cond.wait(&mut state),
                (Some(_), Some(deadline)) => {
                    if self.inner.cond.wait_until(&mut state, deadline).timed_out() {
                        break;
                    }
                }
                // Timeout too large to represent: treat as unbounded.
                (Some(_), None) => self.inner.cond.wait(&mut state),
            }
        }
        std::mem::replace(&mut state.raised, false)
    }

    /// Register a callback run on every [`set`](Self::set).
    pub fn add_hook(&self, hook: impl Fn() + Send + Sync + 'static) -> HookId {
        let mut state = self.inner.state.lock();
        let id = HookId(state.next_hook);
        state.next_hook = state.next_hook.wrapping_add(1);
        state.hooks.push((id, Arc::new(hook)));
        id
    }

    /// Remove a hook. Returns `false` if it was already gone.
    pub fn remove_hook(&self, id: HookId) -> bool {
        let mut state = self.inner.state.lock();
        let before = state.hooks.len();
        state.hooks.retain(|(hook_id, _)| *hook_id != id);
        state.hooks.len() != before
    }

    pub fn hook_count(&self) -> usize {
        self.inner.state.lock().hooks.len()
    }

    /// Whether both handles refer to the same underlying signal.
    pub fn same_signal(&self, other: &WakeSignal) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for WakeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("WakeSignal")
            .field("raised", &state.raised)
            .field("hooks", &state.hooks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_set_take_clear() {
        let signal = WakeSignal::new();
        assert!(!signal.is_set());

        signal.set();
        assert!(signal.is_set());
        assert!(signal.take());
        assert!(!signal.take());

        signal.set();
        signal.clear();
        assert!(!signal.is_set());
    }

    #[test]
    fn test_wait_times_out() {
        let signal = WakeSignal::new();
        let start = Instant::now();
        assert!(!signal.wait(Some(Duration::from_millis(20))));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_wait_woken_from_other_thread() {
        let signal = WakeSignal::new();
        let remote = signal.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.set();
        });

        assert!(signal.wait(None));
        // Consumed by the wait.
        assert!(!signal.is_set());
        assert!(handle.join().is_ok());
    }

    #[test]
    fn test_hooks_run_on_set() {
        let signal = WakeSignal::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = signal.add_hook(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(signal.hook_count(), 1);

        signal.set();
        signal.set();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(signal.remove_hook(id));
        assert!(!signal.remove_hook(id));
        signal.set();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clones_share_state() {
        let signal = WakeSignal::new();
        let clone = signal.clone();
        assert!(signal.same_signal(&clone));
        assert!(!signal.same_signal(&WakeSignal::new()));

        clone.set();
        assert!(signal.take());
    }
}
