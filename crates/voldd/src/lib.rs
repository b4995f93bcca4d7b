//! Storage volume daemon: boot-time device discovery.
//!
//! `voldd` registers the storage volumes described by the device's volume
//! table and discovers the block devices backing them. Devices that appeared
//! before the daemon started are rediscovered by a coldboot replay: every
//! `uevent` trigger under the block device class tree is counted, then fired,
//! and startup waits (bounded) for the uevent listener to report the
//! resulting arrivals before the command socket is opened.
//!
//! Startup runs in a fixed order, described in [`startup`]. Each stage is
//! surfaced through a [`HealthReporter`], and every collaborator the sequence
//! drives is an explicit value implementing one of the traits in
//! [`subsystems`], so tests can substitute any of them.

mod bootstrap;
pub mod coldboot;
pub mod fstab;
mod health;
mod manager;
mod process;
pub mod startup;
pub mod subsystems;
mod telemetry;
mod transport;
pub mod uevent;
pub mod volume;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use manager::{StoragePaths, VolumeManager};
pub use process::{IdleSupervisor, LaunchError, SystemSubsystems, run_daemon};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::CommandListener;

#[cfg(test)]
mod tests;
