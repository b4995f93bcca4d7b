//! Test harness utilities for the startup behavioural suite.

mod config_loader;
mod device_tree;
mod reporter;
mod subsystems;
mod world;

pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use device_tree::DeviceTree;
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use subsystems::{RecordingSupervisor, Stage, TestSubsystems};
pub use world::{StartupWorld, world};
