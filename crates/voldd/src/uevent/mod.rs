//! Kernel uevent datagrams and the listener that consumes them.
//!
//! A kernel uevent is a NUL-separated datagram. The first record is the
//! `<action>@<devpath>` header, followed by `KEY=VALUE` parameters:
//!
//! ```text
//! add@/devices/platform/msdc.1/mmc_host/mmc1/mmc1:0001/block/mmcblk1\0
//! ACTION=add\0DEVPATH=/devices/...\0SUBSYSTEM=block\0MAJOR=179\0MINOR=32\0DEVTYPE=disk\0
//! ```
//!
//! Messages rebroadcast by udev start with a `libudev` magic record and are
//! not parsed.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

mod listener;

pub use listener::{NetlinkEventListener, NetlinkSocket, UeventSource};

pub(crate) const UEVENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::uevent");

const LIBUDEV_MAGIC: &[u8] = b"libudev";

/// Subsystem carried by block device uevents.
pub const BLOCK_SUBSYSTEM: &str = "block";

/// Errors raised while parsing a uevent datagram.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UeventParseError {
    /// The datagram was empty.
    #[error("empty uevent datagram")]
    Empty,
    /// The datagram was rebroadcast by udev rather than sent by the kernel.
    #[error("uevent datagram originates from libudev")]
    Libudev,
    /// The header lacked the `<action>@<devpath>` form.
    #[error("malformed uevent header '{header}'")]
    MalformedHeader {
        /// Offending header text.
        header: String,
    },
    /// A datagram record was not valid UTF-8.
    #[error("uevent record is not valid UTF-8")]
    InvalidUtf8,
}

/// Action announced by a uevent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UeventAction {
    /// A device appeared.
    Add,
    /// A device went away.
    Remove,
    /// A device changed, such as media insertion.
    Change,
    /// A device was renamed or reparented.
    Move,
    /// A device came online.
    Online,
    /// A device went offline.
    Offline,
    /// Any other action reported by the kernel.
    Other(String),
}

impl UeventAction {
    fn parse(value: &str) -> Self {
        match value {
            "add" => Self::Add,
            "remove" => Self::Remove,
            "change" => Self::Change,
            "move" => Self::Move,
            "online" => Self::Online,
            "offline" => Self::Offline,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for UeventAction {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => formatter.write_str("add"),
            Self::Remove => formatter.write_str("remove"),
            Self::Change => formatter.write_str("change"),
            Self::Move => formatter.write_str("move"),
            Self::Online => formatter.write_str("online"),
            Self::Offline => formatter.write_str("offline"),
            Self::Other(action) => formatter.write_str(action),
        }
    }
}

/// A parsed kernel uevent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uevent {
    action: UeventAction,
    devpath: String,
    params: BTreeMap<String, String>,
}

impl Uevent {
    /// Parses a raw datagram.
    pub fn parse(datagram: &[u8]) -> Result<Self, UeventParseError> {
        if datagram.starts_with(LIBUDEV_MAGIC) {
            return Err(UeventParseError::Libudev);
        }
        let mut records = datagram
            .split(|byte| *byte == 0)
            .filter(|record| !record.is_empty());
        let header = records.next().ok_or(UeventParseError::Empty)?;
        let header = std::str::from_utf8(header).map_err(|_| UeventParseError::InvalidUtf8)?;
        let Some((action, devpath)) = header.split_once('@') else {
            return Err(UeventParseError::MalformedHeader {
                header: header.to_owned(),
            });
        };
        if action.is_empty() || devpath.is_empty() {
            return Err(UeventParseError::MalformedHeader {
                header: header.to_owned(),
            });
        }

        let mut params = BTreeMap::new();
        for record in records {
            let record = std::str::from_utf8(record).map_err(|_| UeventParseError::InvalidUtf8)?;
            if let Some((key, value)) = record.split_once('=') {
                params.insert(key.to_owned(), value.to_owned());
            }
        }

        Ok(Self {
            action: UeventAction::parse(action),
            devpath: devpath.to_owned(),
            params,
        })
    }

    /// Announced action.
    #[must_use]
    pub fn action(&self) -> &UeventAction {
        &self.action
    }

    /// Kernel devpath, relative to the sysfs mount.
    #[must_use]
    pub fn devpath(&self) -> &str {
        &self.devpath
    }

    /// Raw parameter lookup.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// `SUBSYSTEM` parameter.
    #[must_use]
    pub fn subsystem(&self) -> Option<&str> {
        self.param("SUBSYSTEM")
    }

    /// `DEVTYPE` parameter, `disk` or `partition` for block devices.
    #[must_use]
    pub fn devtype(&self) -> Option<&str> {
        self.param("DEVTYPE")
    }

    /// `MAJOR` parameter.
    #[must_use]
    pub fn major(&self) -> Option<u32> {
        self.param("MAJOR").and_then(|value| value.parse().ok())
    }

    /// `MINOR` parameter.
    #[must_use]
    pub fn minor(&self) -> Option<u32> {
        self.param("MINOR").and_then(|value| value.parse().ok())
    }

    /// `PARTN` parameter, present on partitions.
    #[must_use]
    pub fn partition_number(&self) -> Option<u32> {
        self.param("PARTN").and_then(|value| value.parse().ok())
    }

    /// Whether the event concerns the block subsystem.
    #[must_use]
    pub fn is_block(&self) -> bool {
        self.subsystem() == Some(BLOCK_SUBSYSTEM)
    }
}

/// Receives block device events decoded by the listener.
pub trait BlockEventHandler: Send + Sync {
    /// Handles one block event. Returns `true` when a managed volume claimed
    /// the device.
    fn handle_block_event(&self, event: &Uevent) -> bool;
}
