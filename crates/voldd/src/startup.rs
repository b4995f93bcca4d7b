//! Ordered startup of the daemon's subsystems.
//!
//! The sequence is fixed:
//!
//! 1. start the volume registry;
//! 2. load the volume table into it;
//! 3. start the uevent listener;
//! 4. replay coldboot arrivals and wait for them, bounded by the configured
//!    timeout;
//! 5. apply post-boot fixups;
//! 6. start the command server.
//!
//! Subsystem start failures abort startup. A bad volume table, a coldboot
//! timeout and failed fixups are reported and startup carries on.

use std::sync::Arc;

use vold_config::Config;

use crate::bootstrap::Daemon;
use crate::coldboot::{ArrivalCounter, ColdbootReport, run_coldboot};
use crate::fstab::Fstab;
use crate::health::HealthReporter;
use crate::subsystems::{
    CommandServer, EventListener, SubsystemKind, SubsystemStartError, VolumeRegistry,
};
use crate::volume::{VolumeTableError, load_volume_table};

/// Subsystems driven by the startup sequence.
pub struct Collaborators<L, C> {
    /// Registry receiving the managed volumes.
    pub registry: Arc<dyn VolumeRegistry>,
    /// Listener that signals `counter` as arrivals are handled.
    pub listener: L,
    /// Server started once coldboot has settled.
    pub server: C,
    /// Handshake shared between the coldboot replay and the listener.
    pub counter: Arc<ArrivalCounter>,
}

/// Builds the subsystems for a resolved configuration.
pub trait SubsystemProvider {
    /// Uevent listener implementation.
    type Listener: EventListener;
    /// Command server implementation.
    type Server: CommandServer;

    /// Assembles fresh, unstarted subsystems.
    fn assemble(&self, config: &Config) -> Collaborators<Self::Listener, Self::Server>;
}

/// Outcome of a completed startup sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupReport {
    /// Volumes registered from the table, or `None` when loading failed.
    pub volumes_registered: Option<usize>,
    /// Coldboot replay tallies and wait outcome.
    pub coldboot: ColdbootReport,
    /// Whether post-boot fixups succeeded.
    pub fixups_applied: bool,
}

/// Runs every startup stage in order against `collaborators`.
pub fn start_services<L, C>(
    daemon: &Daemon,
    collaborators: &mut Collaborators<L, C>,
) -> Result<StartupReport, SubsystemStartError>
where
    L: EventListener,
    C: CommandServer,
{
    let config = daemon.config();
    let reporter = daemon.reporter();
    let Collaborators {
        registry,
        listener,
        server,
        counter,
    } = collaborators;

    start_subsystem(reporter, SubsystemKind::VolumeRegistry, || registry.start())?;

    let volumes_registered = load_table(config, &**registry, reporter);

    start_subsystem(reporter, SubsystemKind::EventListener, || {
        listener.start(Arc::clone(counter))
    })?;

    let coldboot = run_coldboot(
        config.sysfs_block_root().as_std_path(),
        counter,
        config.coldboot_timeout(),
    );
    reporter.coldboot_finished(&coldboot);

    let fixups_applied = match registry.apply_boot_fixups() {
        Ok(()) => {
            reporter.boot_fixups_applied();
            true
        }
        Err(error) => {
            reporter.boot_fixups_failed(&error);
            false
        }
    };

    start_subsystem(reporter, SubsystemKind::CommandServer, || {
        server.start_listener()
    })?;

    reporter.startup_completed();
    Ok(StartupReport {
        volumes_registered,
        coldboot,
        fixups_applied,
    })
}

fn start_subsystem(
    reporter: &dyn HealthReporter,
    kind: SubsystemKind,
    start: impl FnOnce() -> Result<(), SubsystemStartError>,
) -> Result<(), SubsystemStartError> {
    reporter.subsystem_starting(kind);
    match start() {
        Ok(()) => {
            reporter.subsystem_ready(kind);
            Ok(())
        }
        Err(error) => {
            reporter.subsystem_failed(&error);
            Err(error)
        }
    }
}

fn load_table(
    config: &Config,
    registry: &dyn VolumeRegistry,
    reporter: &dyn HealthReporter,
) -> Option<usize> {
    let path = config.fstab_location();
    let loaded = Fstab::read(path.as_std_path())
        .map_err(VolumeTableError::from)
        .and_then(|fstab| load_volume_table(fstab.entries(), registry));
    match loaded {
        Ok(registered) => {
            reporter.volume_table_loaded(&path, registered);
            Some(registered)
        }
        Err(error) => {
            reporter.volume_table_failed(&path, &error);
            None
        }
    }
}
