//! Recursive replay of `uevent` trigger files under a sysfs class tree.

use std::fs::{self, OpenOptions, ReadDir};
use std::io::Write;
use std::path::Path;

use tracing::debug;

use super::COLDBOOT_TARGET;
use super::counter::ArrivalCounter;

/// Name of the per-device file that re-emits an arrival when written.
pub const TRIGGER_FILE: &str = "uevent";

/// Directive written to trigger files during the live pass.
pub const ADD_DIRECTIVE: &[u8; 4] = b"add\n";

/// Behaviour of a single replay walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayMode {
    /// Count trigger files into the arrival counter without writing them.
    CountOnly,
    /// Write the add directive into every trigger file.
    Trigger,
}

/// Tally of one walk.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Directories opened, the root included.
    pub visited: usize,
    /// Directories exposing a writable trigger file.
    pub triggers_found: usize,
    /// Trigger files written successfully (live pass only).
    pub triggers_written: usize,
    /// Trigger writes that failed and were skipped (live pass only).
    pub write_failures: usize,
}

/// Walks `root` depth-first and counts or fires every trigger file found.
///
/// A root that cannot be opened yields an empty summary: a missing device
/// class is normal on some hardware. Entries whose names start with `.` are
/// skipped. Directly below the root every entry is opened as a directory,
/// which follows the class symlinks into the device hierarchy; deeper down
/// only real directories are descended, so symlinks inside a device are never
/// followed. Write and open failures are ignored and the walk carries on with
/// the remaining entries.
pub fn replay(root: &Path, mode: ReplayMode, counter: &ArrivalCounter) -> ReplaySummary {
    let mut walk = Walk {
        mode,
        counter,
        summary: ReplaySummary::default(),
    };
    match fs::read_dir(root) {
        Ok(entries) => walk.visit(root, entries, 0),
        Err(error) => {
            debug!(
                target: COLDBOOT_TARGET,
                root = %root.display(),
                error = %error,
                "replay root unavailable; nothing to replay"
            );
        }
    }
    walk.summary
}

struct Walk<'a> {
    mode: ReplayMode,
    counter: &'a ArrivalCounter,
    summary: ReplaySummary,
}

impl Walk<'_> {
    fn visit(&mut self, dir: &Path, entries: ReadDir, depth: usize) {
        self.summary.visited += 1;
        self.act_on_trigger(dir);

        for entry in entries.flatten() {
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            if depth > 0 && !entry.file_type().is_ok_and(|kind| kind.is_dir()) {
                continue;
            }
            let path = entry.path();
            let Ok(children) = fs::read_dir(&path) else {
                continue;
            };
            self.visit(&path, children, depth + 1);
        }
    }

    fn act_on_trigger(&mut self, dir: &Path) {
        let path = dir.join(TRIGGER_FILE);
        let Ok(mut trigger) = OpenOptions::new().write(true).open(&path) else {
            return;
        };
        self.summary.triggers_found += 1;
        match self.mode {
            ReplayMode::CountOnly => self.counter.expect_one(),
            ReplayMode::Trigger => match trigger.write_all(ADD_DIRECTIVE) {
                Ok(()) => self.summary.triggers_written += 1,
                Err(error) => {
                    self.summary.write_failures += 1;
                    debug!(
                        target: COLDBOOT_TARGET,
                        trigger = %path.display(),
                        error = %error,
                        "trigger write failed"
                    );
                }
            },
        }
    }
}
