//! Structured health reporting for daemon lifecycle events.

use std::sync::Arc;

use camino::Utf8Path;

use vold_config::Config;

use crate::bootstrap::BootstrapError;
use crate::coldboot::{ColdbootReport, WaitOutcome};
use crate::subsystems::{BootFixupError, SubsystemKind, SubsystemStartError};
use crate::volume::VolumeTableError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after configuration and telemetry are ready.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked before a subsystem is started.
    fn subsystem_starting(&self, kind: SubsystemKind);

    /// Invoked after a subsystem starts successfully.
    fn subsystem_ready(&self, kind: SubsystemKind);

    /// Invoked when a subsystem fails to start.
    fn subsystem_failed(&self, error: &SubsystemStartError);

    /// Invoked after the volume table has been processed.
    fn volume_table_loaded(&self, path: &Utf8Path, registered: usize);

    /// Invoked when the volume table could not be fully processed.
    fn volume_table_failed(&self, path: &Utf8Path, error: &VolumeTableError);

    /// Invoked when the coldboot replay and its wait have finished.
    fn coldboot_finished(&self, report: &ColdbootReport);

    /// Invoked after post-coldboot fixups succeed.
    fn boot_fixups_applied(&self);

    /// Invoked when post-coldboot fixups fail.
    fn boot_fixups_failed(&self, error: &BootFixupError);

    /// Invoked once every startup stage has run.
    fn startup_completed(&self);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn subsystem_starting(&self, kind: SubsystemKind) {
        (**self).subsystem_starting(kind);
    }

    fn subsystem_ready(&self, kind: SubsystemKind) {
        (**self).subsystem_ready(kind);
    }

    fn subsystem_failed(&self, error: &SubsystemStartError) {
        (**self).subsystem_failed(error);
    }

    fn volume_table_loaded(&self, path: &Utf8Path, registered: usize) {
        (**self).volume_table_loaded(path, registered);
    }

    fn volume_table_failed(&self, path: &Utf8Path, error: &VolumeTableError) {
        (**self).volume_table_failed(path, error);
    }

    fn coldboot_finished(&self, report: &ColdbootReport) {
        (**self).coldboot_finished(report);
    }

    fn boot_fixups_applied(&self) {
        (**self).boot_fixups_applied();
    }

    fn boot_fixups_failed(&self, error: &BootFixupError) {
        (**self).boot_fixups_failed(error);
    }

    fn startup_completed(&self) {
        (**self).startup_completed();
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            fstab = %config.fstab_location(),
            sysfs_block_root = %config.sysfs_block_root(),
            socket = %config.command_socket(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn subsystem_starting(&self, kind: SubsystemKind) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "subsystem_starting",
            subsystem = %kind,
            "starting subsystem"
        );
    }

    fn subsystem_ready(&self, kind: SubsystemKind) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "subsystem_ready",
            subsystem = %kind,
            "subsystem ready"
        );
    }

    fn subsystem_failed(&self, error: &SubsystemStartError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "subsystem_failed",
            subsystem = %error.kind,
            message = %error.message(),
            error = ?error,
            "subsystem failed to start"
        );
    }

    fn volume_table_loaded(&self, path: &Utf8Path, registered: usize) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "volume_table_loaded",
            path = %path,
            registered,
            "volume table loaded"
        );
    }

    fn volume_table_failed(&self, path: &Utf8Path, error: &VolumeTableError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "volume_table_failed",
            path = %path,
            error = %error,
            "error reading volume table; continuing anyway"
        );
    }

    fn coldboot_finished(&self, report: &ColdbootReport) {
        match report.outcome {
            WaitOutcome::Satisfied => tracing::info!(
                target: HEALTH_TARGET,
                event = "coldboot_finished",
                expected = report.arrivals.expected,
                arrived = report.arrivals.arrived,
                written = report.triggered.triggers_written,
                "coldboot complete"
            ),
            WaitOutcome::TimedOut => tracing::warn!(
                target: HEALTH_TARGET,
                event = "coldboot_timed_out",
                expected = report.arrivals.expected,
                arrived = report.arrivals.arrived,
                written = report.triggered.triggers_written,
                write_failures = report.triggered.write_failures,
                "timed out waiting for coldboot arrivals; continuing"
            ),
        }
    }

    fn boot_fixups_applied(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "boot_fixups_applied",
            "post-boot fixups applied"
        );
    }

    fn boot_fixups_failed(&self, error: &BootFixupError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "boot_fixups_failed",
            error = %error,
            "post-boot fixups failed"
        );
    }

    fn startup_completed(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "startup_completed",
            "daemon startup completed"
        );
    }
}
