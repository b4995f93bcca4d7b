//! In-memory representation of managed storage volumes.

use bitflags::bitflags;
use serde::Serialize;
use thiserror::Error;

use crate::fstab::{FstabEntry, Partition};

mod table;

pub use table::{EMULATION_FS_TYPE, VolumeTableError, derive_flags, load_volume_table};

const STORAGE_ROOT: &str = "/storage";
const AUTO_MOUNT_POINT: &str = "auto";

bitflags! {
    /// Capabilities derived from a volume's table entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VolumeFlags: u32 {
        /// The medium cannot be removed from the device.
        const NON_REMOVABLE = 1 << 0;
        /// The volume may carry encrypted contents.
        const ENCRYPTABLE = 1 << 1;
        /// The volume backs removable storage without emulation on top.
        const PROVIDES_REMOVABLE_STORAGE_EMULATION = 1 << 2;
    }
}

/// Errors raised while assembling a volume.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VolumeError {
    /// The entry is not marked as managed by this daemon.
    #[error("entry for '{device}' is not managed by this daemon")]
    Unmanaged {
        /// Backing device of the entry.
        device: String,
    },
    /// The backing path was empty.
    #[error("volume '{label}' was given an empty device path")]
    EmptyPath {
        /// Volume label.
        label: String,
    },
    /// The backing path was not absolute.
    #[error("volume '{label}' device path '{path}' is not absolute")]
    RelativePath {
        /// Volume label.
        label: String,
        /// Rejected path.
        path: String,
    },
    /// The backing path was already registered on this volume.
    #[error("volume '{label}' already tracks device path '{path}'")]
    DuplicatePath {
        /// Volume label.
        label: String,
        /// Rejected path.
        path: String,
    },
}

/// Whether a block node is a whole disk or one of its partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Whole disk.
    Disk,
    /// Partition of a disk.
    Partition,
}

/// Block device node announced for one of a volume's backing paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockNode {
    /// Kernel devpath of the node.
    pub devpath: String,
    /// Device major number.
    pub major: u32,
    /// Device minor number.
    pub minor: u32,
    /// Disk or partition.
    pub kind: BlockKind,
}

/// A storage volume managed by the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    label: String,
    mount_point: String,
    fs_type: String,
    partition: Partition,
    flags: VolumeFlags,
    paths: Vec<String>,
    nodes: Vec<BlockNode>,
}

impl Volume {
    /// Builds a volume from a managed table entry.
    ///
    /// Managed entries normally use `auto` as their mount point, which
    /// resolves to `/storage/<label>`.
    pub fn from_entry(entry: &FstabEntry, flags: VolumeFlags) -> Result<Self, VolumeError> {
        let (Some(label), Some(partition)) = (entry.label(), entry.partition()) else {
            return Err(VolumeError::Unmanaged {
                device: entry.blk_device().to_owned(),
            });
        };
        let mount_point = if entry.mount_point() == AUTO_MOUNT_POINT {
            format!("{STORAGE_ROOT}/{label}")
        } else {
            entry.mount_point().to_owned()
        };
        Ok(Self {
            label: label.to_owned(),
            mount_point,
            fs_type: entry.fs_type().to_owned(),
            partition: partition.clone(),
            flags,
            paths: Vec::new(),
            nodes: Vec::new(),
        })
    }

    /// Registers a sysfs devpath prefix whose devices belong to this volume.
    pub fn add_path(&mut self, path: &str) -> Result<(), VolumeError> {
        if path.is_empty() {
            return Err(VolumeError::EmptyPath {
                label: self.label.clone(),
            });
        }
        if !path.starts_with('/') {
            return Err(VolumeError::RelativePath {
                label: self.label.clone(),
                path: path.to_owned(),
            });
        }
        if self.paths.iter().any(|known| known == path) {
            return Err(VolumeError::DuplicatePath {
                label: self.label.clone(),
                path: path.to_owned(),
            });
        }
        self.paths.push(path.to_owned());
        Ok(())
    }

    /// Returns `true` when `devpath` lives under one of the backing paths.
    #[must_use]
    pub fn handles_devpath(&self, devpath: &str) -> bool {
        self.paths.iter().any(|path| devpath.starts_with(path.as_str()))
    }

    /// Records a block node; a node with the same numbers is replaced.
    pub fn attach_node(&mut self, node: BlockNode) {
        self.nodes
            .retain(|known| (known.major, known.minor) != (node.major, node.minor));
        self.nodes.push(node);
    }

    /// Forgets a block node. Returns `true` when one was removed.
    pub fn detach_node(&mut self, major: u32, minor: u32) -> bool {
        let before = self.nodes.len();
        self.nodes
            .retain(|known| (known.major, known.minor) != (major, minor));
        self.nodes.len() != before
    }

    /// Volume label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Resolved mount point.
    #[must_use]
    pub fn mount_point(&self) -> &str {
        &self.mount_point
    }

    /// Filesystem type from the table.
    #[must_use]
    pub fn fs_type(&self) -> &str {
        &self.fs_type
    }

    /// Partition selector from the table.
    #[must_use]
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Capability flags.
    #[must_use]
    pub fn flags(&self) -> VolumeFlags {
        self.flags
    }

    /// Backing devpath prefixes.
    #[must_use]
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Block nodes currently attached.
    #[must_use]
    pub fn nodes(&self) -> &[BlockNode] {
        &self.nodes
    }

    /// Serialisable view of the volume.
    #[must_use]
    pub fn info(&self) -> VolumeInfo {
        VolumeInfo {
            label: self.label.clone(),
            mount_point: self.mount_point.clone(),
            fs_type: self.fs_type.clone(),
            partition: self.partition.to_string(),
            flags: self
                .flags
                .iter_names()
                .map(|(name, _)| name.to_ascii_lowercase())
                .collect(),
            paths: self.paths.clone(),
            nodes: self.nodes.clone(),
        }
    }
}

/// Serialisable description of a volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeInfo {
    /// Volume label.
    pub label: String,
    /// Resolved mount point.
    pub mount_point: String,
    /// Filesystem type.
    pub fs_type: String,
    /// Partition selector.
    pub partition: String,
    /// Lower-case flag names.
    pub flags: Vec<String>,
    /// Backing devpath prefixes.
    pub paths: Vec<String>,
    /// Attached block nodes.
    pub nodes: Vec<BlockNode>,
}
