//! Collaborator interfaces driven by the startup sequence.
//!
//! The daemon is assembled from a handful of long-lived subsystems: the
//! volume registry, the uevent listener and the command server. Each is an
//! explicitly constructed value handed to the startup sequence, so tests can
//! replace any of them independently.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::coldboot::ArrivalCounter;
use crate::volume::{Volume, VolumeInfo};

/// Subsystems whose startup is fatal when it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubsystemKind {
    /// The process-wide volume registry.
    VolumeRegistry,
    /// The kernel uevent listener.
    EventListener,
    /// The client command listener.
    CommandServer,
}

impl fmt::Display for SubsystemKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::VolumeRegistry => "volume_registry",
            Self::EventListener => "event_listener",
            Self::CommandServer => "command_server",
        };
        formatter.write_str(label)
    }
}

/// Error returned when parsing a subsystem kind fails.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported subsystem kind: {0}")]
pub struct SubsystemKindParseError(String);

impl SubsystemKindParseError {
    /// Returns the offending value that could not be parsed.
    #[must_use]
    pub fn value(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for SubsystemKind {
    type Err = SubsystemKindParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace(' ', "_").as_str() {
            "volume_registry" => Ok(Self::VolumeRegistry),
            "event_listener" => Ok(Self::EventListener),
            "command_server" => Ok(Self::CommandServer),
            other => Err(SubsystemKindParseError(other.to_owned())),
        }
    }
}

/// Errors surfaced when a subsystem fails to start.
#[derive(Debug, Error)]
#[error("{kind} failed to start: {message}")]
pub struct SubsystemStartError {
    /// Subsystem that failed.
    pub kind: SubsystemKind,
    message: String,
    /// Optional source error reported by the implementation.
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SubsystemStartError {
    /// Builds an error without an underlying source.
    #[must_use]
    pub fn new(kind: SubsystemKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error that wraps an underlying source.
    #[must_use]
    pub fn with_source(
        kind: SubsystemKind,
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Human-readable message describing the failure.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// Error raised by post-coldboot volume fixups. Never fatal.
#[derive(Debug, Error)]
#[error("post-boot fixups failed: {message}")]
pub struct BootFixupError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BootFixupError {
    /// Builds an error that wraps an underlying source.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Human-readable message describing the failure.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// Process-wide registry owning every managed volume.
pub trait VolumeRegistry: Send + Sync {
    /// Prepares the registry. Must run before volumes are added.
    fn start(&self) -> Result<(), SubsystemStartError>;

    /// Takes ownership of a volume for the rest of the process lifetime.
    fn add_volume(&self, volume: Volume);

    /// Describes the registered volumes.
    fn volumes(&self) -> Vec<VolumeInfo>;

    /// Applies the fixups that follow coldboot, such as publishing storage
    /// paths.
    fn apply_boot_fixups(&self) -> Result<(), BootFixupError>;
}

impl<T> VolumeRegistry for Arc<T>
where
    T: VolumeRegistry + ?Sized,
{
    fn start(&self) -> Result<(), SubsystemStartError> {
        (**self).start()
    }

    fn add_volume(&self, volume: Volume) {
        (**self).add_volume(volume);
    }

    fn volumes(&self) -> Vec<VolumeInfo> {
        (**self).volumes()
    }

    fn apply_boot_fixups(&self) -> Result<(), BootFixupError> {
        (**self).apply_boot_fixups()
    }
}

/// Receives device arrivals from the kernel and signals the coldboot counter.
pub trait EventListener {
    /// Starts delivering events on a background thread.
    ///
    /// The listener records each handled block device arrival on `counter`.
    fn start(&mut self, counter: Arc<ArrivalCounter>) -> Result<(), SubsystemStartError>;
}

/// Accepts client commands once coldboot has settled.
pub trait CommandServer {
    /// Starts accepting clients on a background thread.
    fn start_listener(&mut self) -> Result<(), SubsystemStartError>;
}

/// Keeps the main thread occupied once startup has completed.
pub trait Supervisor {
    /// Blocks for the lifetime of the daemon. Production implementations
    /// never return.
    fn supervise(&self);
}
