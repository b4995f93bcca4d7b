//! Recording collaborators for the startup sequence.
//!
//! Every collaborator appends to a shared [`Journal`] so scenarios can assert
//! on the order in which the sequence drove them.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use vold_config::Config;

use crate::coldboot::ArrivalCounter;
use crate::startup::{Collaborators, SubsystemProvider};
use crate::subsystems::{
    BootFixupError, CommandServer, EventListener, SubsystemKind, SubsystemStartError, Supervisor,
    VolumeRegistry,
};
use crate::volume::{Volume, VolumeInfo};

use super::device_tree::count_fired;

const LISTENER_DEADLINE: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Collaborator activity in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    RegistryStarted,
    VolumeAdded(String),
    ListenerStarted,
    FixupsApplied { fired: usize },
    ServerStarted,
    Supervised,
}

/// Shared, append-only record of collaborator activity.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Stage>>>);

impl Journal {
    fn push(&self, stage: Stage) {
        self.0.lock().expect("journal mutex poisoned").push(stage);
    }

    /// Copy of the recorded stages.
    #[must_use]
    pub fn stages(&self) -> Vec<Stage> {
        self.0.lock().expect("journal mutex poisoned").clone()
    }
}

/// How the fake listener reacts to fired triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerMode {
    /// Records one arrival per fired trigger.
    KeepsUp,
    /// Never records an arrival.
    Silent,
}

/// Provider handing out recording collaborators.
#[derive(Debug, Clone)]
pub struct TestSubsystems {
    journal: Journal,
    failures: Arc<Mutex<HashSet<SubsystemKind>>>,
    fail_fixups: Arc<AtomicBool>,
    mode: ListenerMode,
    triggers: Vec<PathBuf>,
}

impl TestSubsystems {
    /// Builds a provider whose listener watches `triggers`.
    #[must_use]
    pub fn new(triggers: Vec<PathBuf>) -> Self {
        Self {
            journal: Journal::default(),
            failures: Arc::default(),
            fail_fixups: Arc::default(),
            mode: ListenerMode::KeepsUp,
            triggers,
        }
    }

    /// Shared journal.
    #[must_use]
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    /// Makes the given subsystem fail to start.
    pub fn fail_on(&self, kind: SubsystemKind) {
        self.failures
            .lock()
            .expect("failure set mutex poisoned")
            .insert(kind);
    }

    /// Makes post-boot fixups fail.
    pub fn fail_fixups(&self) {
        self.fail_fixups.store(true, Ordering::SeqCst);
    }

    /// Selects the listener behaviour.
    pub fn set_listener_mode(&mut self, mode: ListenerMode) {
        self.mode = mode;
    }

    /// Replaces the watched trigger files.
    pub fn set_triggers(&mut self, triggers: Vec<PathBuf>) {
        self.triggers = triggers;
    }

    fn check(&self, kind: SubsystemKind) -> Result<(), SubsystemStartError> {
        let failures = self.failures.lock().expect("failure set mutex poisoned");
        if failures.contains(&kind) {
            return Err(SubsystemStartError::new(kind, "intentional test failure"));
        }
        Ok(())
    }
}

impl SubsystemProvider for TestSubsystems {
    type Listener = FakeListener;
    type Server = FakeServer;

    fn assemble(&self, _config: &Config) -> Collaborators<FakeListener, FakeServer> {
        Collaborators {
            registry: Arc::new(RecordingRegistry {
                provider: self.clone(),
                volumes: Mutex::new(Vec::new()),
            }),
            listener: FakeListener {
                provider: self.clone(),
            },
            server: FakeServer {
                provider: self.clone(),
            },
            counter: Arc::new(ArrivalCounter::new()),
        }
    }
}

/// Registry recording starts, additions and fixups.
pub struct RecordingRegistry {
    provider: TestSubsystems,
    volumes: Mutex<Vec<Volume>>,
}

impl VolumeRegistry for RecordingRegistry {
    fn start(&self) -> Result<(), SubsystemStartError> {
        self.provider.check(SubsystemKind::VolumeRegistry)?;
        self.provider.journal.push(Stage::RegistryStarted);
        Ok(())
    }

    fn add_volume(&self, volume: Volume) {
        self.provider
            .journal
            .push(Stage::VolumeAdded(volume.label().to_owned()));
        self.volumes
            .lock()
            .expect("registry mutex poisoned")
            .push(volume);
    }

    fn volumes(&self) -> Vec<VolumeInfo> {
        self.volumes
            .lock()
            .expect("registry mutex poisoned")
            .iter()
            .map(Volume::info)
            .collect()
    }

    fn apply_boot_fixups(&self) -> Result<(), BootFixupError> {
        if self.provider.fail_fixups.load(Ordering::SeqCst) {
            return Err(BootFixupError::with_source(
                "intentional test failure",
                std::io::Error::other("disk full"),
            ));
        }
        let fired = count_fired(&self.provider.triggers);
        self.provider.journal.push(Stage::FixupsApplied { fired });
        Ok(())
    }
}

/// Listener standing in for the kernel: fired triggers become arrivals.
pub struct FakeListener {
    provider: TestSubsystems,
}

impl EventListener for FakeListener {
    fn start(&mut self, counter: Arc<ArrivalCounter>) -> Result<(), SubsystemStartError> {
        self.provider.check(SubsystemKind::EventListener)?;
        self.provider.journal.push(Stage::ListenerStarted);
        if self.provider.mode == ListenerMode::Silent {
            return Ok(());
        }
        let triggers = self.provider.triggers.clone();
        thread::spawn(move || {
            let deadline = Instant::now() + LISTENER_DEADLINE;
            let mut seen = 0;
            while seen < triggers.len() && Instant::now() < deadline {
                let fired = count_fired(&triggers);
                for _ in seen..fired {
                    counter.record_arrival();
                }
                seen = seen.max(fired);
                thread::sleep(POLL_INTERVAL);
            }
        });
        Ok(())
    }
}

/// Command server recording its start.
pub struct FakeServer {
    provider: TestSubsystems,
}

impl CommandServer for FakeServer {
    fn start_listener(&mut self) -> Result<(), SubsystemStartError> {
        self.provider.check(SubsystemKind::CommandServer)?;
        self.provider.journal.push(Stage::ServerStarted);
        Ok(())
    }
}

/// Supervisor that returns immediately.
pub struct RecordingSupervisor {
    journal: Journal,
}

impl RecordingSupervisor {
    #[must_use]
    pub fn new(journal: Journal) -> Self {
        Self { journal }
    }
}

impl Supervisor for RecordingSupervisor {
    fn supervise(&self) {
        self.journal.push(Stage::Supervised);
    }
}
