//! Defines the unified error surface for daemon launch.

use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::subsystems::SubsystemStartError;

/// Fatal errors that stop the daemon during startup.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration or telemetry could not be set up.
    #[error("daemon bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[source]
        source: BootstrapError,
    },
    /// A required subsystem failed to start.
    #[error("daemon startup failed: {source}")]
    Subsystem {
        /// Underlying subsystem error.
        #[source]
        source: SubsystemStartError,
    },
}

impl From<BootstrapError> for LaunchError {
    fn from(source: BootstrapError) -> Self {
        Self::Bootstrap { source }
    }
}

impl From<SubsystemStartError> for LaunchError {
    fn from(source: SubsystemStartError) -> Self {
        Self::Subsystem { source }
    }
}
