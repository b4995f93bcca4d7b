//! BDD test world: a device tree, recording collaborators and the outcome of
//! one daemon launch.

use std::cell::RefCell;
use std::sync::Arc;

use ortho_config::OrthoError;

use vold_config::Config;

use crate::bootstrap::ConfigLoader;
use crate::process::LaunchError;
use crate::process::launch::{LaunchPlan, run_daemon_with};

use super::config_loader::{FailingConfigLoader, TestConfigLoader};
use super::device_tree::DeviceTree;
use super::reporter::RecordingHealthReporter;
use super::subsystems::{ListenerMode, RecordingSupervisor, Stage, TestSubsystems};

const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Scenario world shared across BDD steps.
pub struct StartupWorld {
    pub tree: DeviceTree,
    pub reporter: Arc<RecordingHealthReporter>,
    pub subsystems: TestSubsystems,
    coldboot_timeout_secs: u64,
    failing_loader: bool,
    outcome: Option<Result<(), LaunchError>>,
}

impl StartupWorld {
    /// Builds a world with an empty device tree and cooperative subsystems.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tree: DeviceTree::new(),
            reporter: Arc::new(RecordingHealthReporter::default()),
            subsystems: TestSubsystems::new(Vec::new()),
            coldboot_timeout_secs: DEFAULT_TIMEOUT_SECS,
            failing_loader: false,
            outcome: None,
        }
    }

    /// Adds a block device with a single partition.
    pub fn add_block_device(&mut self, name: &str) {
        self.tree.add_block_device(name);
        self.subsystems.set_triggers(self.tree.triggers());
    }

    /// Stops the listener from reporting arrivals and shortens the wait.
    pub fn silence_listener(&mut self, timeout_secs: u64) {
        self.subsystems.set_listener_mode(ListenerMode::Silent);
        self.coldboot_timeout_secs = timeout_secs;
    }

    /// Installs a loader that always fails.
    pub fn use_failing_loader(&mut self) {
        self.failing_loader = true;
    }

    /// Launches the daemon once with the recording collaborators.
    pub fn launch(&mut self) {
        if self.outcome.is_some() {
            return;
        }
        let loader: Box<dyn ConfigLoader> = if self.failing_loader {
            Box::new(FailingConfigLoader)
        } else {
            Box::new(TestConfigLoader::new(
                self.tree.config(self.coldboot_timeout_secs),
            ))
        };
        let supervisor = RecordingSupervisor::new(self.subsystems.journal());
        let result = run_daemon_with(LaunchPlan {
            loader: BoxedLoader(loader),
            reporter: self.reporter.clone(),
            provider: self.subsystems.clone(),
            supervisor,
        });
        self.outcome = Some(result);
    }

    /// Result of the launch, if it ran.
    #[must_use]
    pub fn outcome(&self) -> Option<&Result<(), LaunchError>> {
        self.outcome.as_ref()
    }

    /// Stages recorded by the collaborators.
    #[must_use]
    pub fn stages(&self) -> Vec<Stage> {
        self.subsystems.journal().stages()
    }
}

impl Default for StartupWorld {
    fn default() -> Self {
        Self::new()
    }
}

struct BoxedLoader(Box<dyn ConfigLoader>);

impl ConfigLoader for BoxedLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        self.0.load()
    }
}

/// Fixture helper for BDD steps.
#[must_use]
pub fn world() -> RefCell<StartupWorld> {
    RefCell::new(StartupWorld::new())
}
