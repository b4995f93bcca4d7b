//! Cross-thread handshake between the coldboot walk and the uevent listener.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Result of waiting for replayed arrivals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The listener reported that the expected arrivals were handled.
    Satisfied,
    /// The bound elapsed before the listener signalled.
    TimedOut,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ArrivalState {
    expected: usize,
    arrived: usize,
    armed: bool,
    released: bool,
}

impl ArrivalState {
    const fn satisfied(&self) -> bool {
        self.armed && self.expected > 0 && self.arrived >= self.expected
    }
}

/// Snapshot of the counter, used for logging.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArrivalSnapshot {
    /// Trigger files counted by the dry walk.
    pub expected: usize,
    /// Arrivals recorded by the listener.
    pub arrived: usize,
    /// Whether the waiter has been released.
    pub released: bool,
}

/// Records how many device arrivals the coldboot replay should produce and
/// lets the main thread block until the listener has seen them.
///
/// The dry walk raises the expectation one trigger file at a time and then
/// arms the counter, fixing the expectation. The listener thread records
/// arrivals as it handles them; once armed, the waiter is released when the
/// arrivals reach a non-zero expectation, or explicitly via
/// [`ArrivalCounter::release`]. Arrivals recorded before arming are counted
/// but never release the waiter on their own. Any number of threads may signal; exactly one
/// thread is expected to wait.
#[derive(Debug, Default)]
pub struct ArrivalCounter {
    state: Mutex<ArrivalState>,
    released: Condvar,
}

impl ArrivalCounter {
    /// Builds a counter with nothing expected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ArrivalState> {
        // The state is plain integers; a panicking signaler cannot leave it
        // half-written, so poisoning is not fatal.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clears the expectation, the recorded arrivals, arming and any release.
    pub fn reset(&self) {
        *self.lock() = ArrivalState::default();
    }

    /// Raises the expectation by one trigger file.
    pub fn expect_one(&self) {
        self.lock().expected += 1;
    }

    /// Records one handled arrival.
    ///
    /// Returns `true` when this call released the waiter.
    pub fn record_arrival(&self) -> bool {
        let mut state = self.lock();
        state.arrived += 1;
        self.release_if_satisfied(&mut state)
    }

    /// Fixes the expectation once the dry walk is complete.
    ///
    /// Arrivals recorded while the expectation was still rising are kept and
    /// re-checked here. Returns `true` when arming released the waiter.
    pub fn arm(&self) -> bool {
        let mut state = self.lock();
        state.armed = true;
        self.release_if_satisfied(&mut state)
    }

    fn release_if_satisfied(&self, state: &mut ArrivalState) -> bool {
        if state.released || !state.satisfied() {
            return false;
        }
        state.released = true;
        self.released.notify_all();
        true
    }

    /// Releases the waiter regardless of the recorded arrivals.
    pub fn release(&self) {
        let mut state = self.lock();
        state.released = true;
        self.released.notify_all();
    }

    /// Current expectation, arrivals and release flag.
    #[must_use]
    pub fn snapshot(&self) -> ArrivalSnapshot {
        let state = *self.lock();
        ArrivalSnapshot {
            expected: state.expected,
            arrived: state.arrived,
            released: state.released,
        }
    }

    /// Blocks until released or until `timeout` elapses.
    ///
    /// A timeout too large to express as an instant waits without a
    /// deadline.
    pub fn wait_until_satisfied(&self, timeout: Duration) -> WaitOutcome {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.lock();
        while !state.released {
            let Some(deadline) = deadline else {
                state = self
                    .released
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
                continue;
            };
            let now = Instant::now();
            if now >= deadline {
                return WaitOutcome::TimedOut;
            }
            let (guard, _) = self
                .released
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
        WaitOutcome::Satisfied
    }
}
