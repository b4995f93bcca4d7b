//! Test double for [`HealthReporter`] that records lifecycle events.

use std::sync::Mutex;

use camino::Utf8Path;

use vold_config::Config;

use crate::bootstrap::BootstrapError;
use crate::coldboot::{ColdbootReport, WaitOutcome};
use crate::health::HealthReporter;
use crate::subsystems::{BootFixupError, SubsystemKind, SubsystemStartError};
use crate::volume::VolumeTableError;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    SubsystemStarting(SubsystemKind),
    SubsystemReady(SubsystemKind),
    SubsystemFailed {
        kind: SubsystemKind,
        message: String,
    },
    VolumeTableLoaded(usize),
    VolumeTableFailed(String),
    ColdbootFinished(WaitOutcome),
    BootFixupsApplied,
    BootFixupsFailed,
    StartupCompleted,
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn subsystem_starting(&self, kind: SubsystemKind) {
        self.record(HealthEvent::SubsystemStarting(kind));
    }

    fn subsystem_ready(&self, kind: SubsystemKind) {
        self.record(HealthEvent::SubsystemReady(kind));
    }

    fn subsystem_failed(&self, error: &SubsystemStartError) {
        self.record(HealthEvent::SubsystemFailed {
            kind: error.kind,
            message: error.message().to_owned(),
        });
    }

    fn volume_table_loaded(&self, _path: &Utf8Path, registered: usize) {
        self.record(HealthEvent::VolumeTableLoaded(registered));
    }

    fn volume_table_failed(&self, _path: &Utf8Path, error: &VolumeTableError) {
        self.record(HealthEvent::VolumeTableFailed(error.to_string()));
    }

    fn coldboot_finished(&self, report: &ColdbootReport) {
        self.record(HealthEvent::ColdbootFinished(report.outcome));
    }

    fn boot_fixups_applied(&self) {
        self.record(HealthEvent::BootFixupsApplied);
    }

    fn boot_fixups_failed(&self, _error: &BootFixupError) {
        self.record(HealthEvent::BootFixupsFailed);
    }

    fn startup_completed(&self) {
        self.record(HealthEvent::StartupCompleted);
    }
}
