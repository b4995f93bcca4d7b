//! Wires the production collaborators and drives the daemon lifecycle.

use std::sync::Arc;

use tracing::info;

use vold_config::Config;

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::coldboot::ArrivalCounter;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::manager::VolumeManager;
use crate::startup::{Collaborators, SubsystemProvider, start_services};
use crate::subsystems::Supervisor;
use crate::transport::CommandListener;
use crate::uevent::NetlinkEventListener;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::supervisor::IdleSupervisor;

/// Provider assembling the kernel-facing subsystems.
///
/// A single [`VolumeManager`] backs the registry, receives the listener's
/// block events and answers command socket queries.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSubsystems;

impl SubsystemProvider for SystemSubsystems {
    type Listener = NetlinkEventListener;
    type Server = CommandListener;

    fn assemble(&self, config: &Config) -> Collaborators<Self::Listener, Self::Server> {
        let manager = Arc::new(VolumeManager::new(config));
        Collaborators {
            registry: manager.clone(),
            listener: NetlinkEventListener::new(manager.clone()),
            server: CommandListener::new(config.command_socket(), manager),
            counter: Arc::new(ArrivalCounter::new()),
        }
    }
}

/// Collaborators required to launch the daemon.
pub(crate) struct LaunchPlan<L, P, S> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) provider: P,
    pub(crate) supervisor: S,
}

/// Runs the daemon using the production collaborators.
///
/// Only returns on a fatal startup failure.
pub fn run_daemon() -> Result<(), LaunchError> {
    run_daemon_with(LaunchPlan {
        loader: SystemConfigLoader,
        reporter: Arc::new(StructuredHealthReporter::new()),
        provider: SystemSubsystems,
        supervisor: IdleSupervisor,
    })
}

/// Runs the daemon with injected collaborators.
pub(crate) fn run_daemon_with<L, P, S>(plan: LaunchPlan<L, P, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    P: SubsystemProvider,
    S: Supervisor,
{
    let LaunchPlan {
        loader,
        reporter,
        provider,
        supervisor,
    } = plan;

    let daemon = bootstrap_with(&loader, reporter)?;
    let mut collaborators = provider.assemble(daemon.config());
    let report = start_services(&daemon, &mut collaborators)?;
    info!(
        target: PROCESS_TARGET,
        volumes = report.volumes_registered.unwrap_or(0),
        outcome = ?report.coldboot.outcome,
        fixups_applied = report.fixups_applied,
        "daemon running"
    );

    // The collaborators own the background threads; keep them alive while
    // supervising.
    supervisor.supervise();
    drop(collaborators);
    info!(target: PROCESS_TARGET, "supervision ended");
    Ok(())
}
