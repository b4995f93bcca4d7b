//! Coldboot replay of device arrivals that happened before the daemon started.
//!
//! The kernel announces a block device once, when it appears. Devices present
//! before the daemon started are rediscovered by writing `add` into each
//! device's `uevent` file, which makes the kernel emit the arrival again for
//! the uevent listener to pick up.
//!
//! The replay runs in two passes over the same tree. The dry pass
//! ([`ReplayMode::CountOnly`]) records how many arrivals to expect in the
//! [`ArrivalCounter`]; the live pass ([`ReplayMode::Trigger`]) fires the
//! triggers. The main thread then waits, bounded by a timeout, for the
//! listener to report that it handled that many arrivals. Arrivals unrelated
//! to the replay can still be counted by the listener, so the wait is a
//! best-effort barrier and the timeout is what keeps startup moving.

use std::path::Path;
use std::time::Duration;

mod counter;
mod replay;

pub use counter::{ArrivalCounter, ArrivalSnapshot, WaitOutcome};
pub use replay::{ADD_DIRECTIVE, ReplayMode, ReplaySummary, TRIGGER_FILE, replay};

pub(crate) const COLDBOOT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::coldboot");

/// Combined result of the dry pass, the live pass and the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColdbootReport {
    /// Tally of the counting pass.
    pub counted: ReplaySummary,
    /// Tally of the triggering pass.
    pub triggered: ReplaySummary,
    /// How the arrival wait ended.
    pub outcome: WaitOutcome,
    /// Counter state when the wait returned.
    pub arrivals: ArrivalSnapshot,
}

/// Runs the full coldboot handshake over `root`.
///
/// The counter is reset first, so the listener must already hold a handle to
/// it. The dry pass completes, and the counter is armed, before any trigger is
/// written; arrivals the listener reports during the dry pass cannot release
/// the wait early.
pub fn run_coldboot(root: &Path, counter: &ArrivalCounter, timeout: Duration) -> ColdbootReport {
    counter.reset();
    let counted = replay(root, ReplayMode::CountOnly, counter);
    counter.arm();
    let triggered = replay(root, ReplayMode::Trigger, counter);
    let outcome = counter.wait_until_satisfied(timeout);
    ColdbootReport {
        counted,
        triggered,
        outcome,
        arrivals: counter.snapshot(),
    }
}
