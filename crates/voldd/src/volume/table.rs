//! Materialises volumes from the managed entries of the volume table.

use thiserror::Error;
use tracing::info;

use crate::fstab::{FstabEntry, FstabError};
use crate::subsystems::VolumeRegistry;

use super::{Volume, VolumeError, VolumeFlags};

const TABLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::volume");

/// Filesystem type that may provide removable storage emulation.
pub const EMULATION_FS_TYPE: &str = "vfat";

/// Errors raised while loading the volume table.
#[derive(Debug, Error)]
pub enum VolumeTableError {
    /// The table could not be read or parsed.
    #[error("failed to read volume table: {source}")]
    Table {
        /// Underlying table error.
        #[source]
        source: FstabError,
    },
    /// A managed entry could not be turned into a volume.
    #[error("failed to build volume for '{device}' ({registered} registered before): {source}")]
    Volume {
        /// Backing device of the entry.
        device: String,
        /// Volumes registered before the failure.
        registered: usize,
        /// Underlying volume error.
        #[source]
        source: VolumeError,
    },
    /// Adding the backing device path failed.
    #[error(
        "failed to add devpath {path} to volume {label} ({registered} registered before): {source}"
    )]
    DevicePath {
        /// Volume label.
        label: String,
        /// Rejected devpath.
        path: String,
        /// Volumes registered before the failure.
        registered: usize,
        /// Underlying volume error.
        #[source]
        source: VolumeError,
    },
}

impl From<FstabError> for VolumeTableError {
    fn from(source: FstabError) -> Self {
        Self::Table { source }
    }
}

/// Derives capability flags for a managed entry.
///
/// Removable storage emulation is only offered by `vfat` volumes that have no
/// emulated storage layered on top; the type comparison is exact.
#[must_use]
pub fn derive_flags(entry: &FstabEntry) -> VolumeFlags {
    let mut flags = VolumeFlags::empty();
    if entry.is_nonremovable() {
        flags |= VolumeFlags::NON_REMOVABLE;
    }
    if entry.is_encryptable() {
        flags |= VolumeFlags::ENCRYPTABLE;
    }
    if entry.is_noemulatedsd() && entry.fs_type() == EMULATION_FS_TYPE {
        flags |= VolumeFlags::PROVIDES_REMOVABLE_STORAGE_EMULATION;
    }
    flags
}

/// Registers one volume per managed entry of `entries`.
///
/// Unmanaged entries are skipped. The first failure stops the loop: entries
/// after it are not examined and volumes registered before it stay
/// registered. Returns the number of volumes registered.
pub fn load_volume_table<'a, I>(
    entries: I,
    registry: &dyn VolumeRegistry,
) -> Result<usize, VolumeTableError>
where
    I: IntoIterator<Item = &'a FstabEntry>,
{
    let mut registered = 0;
    for entry in entries.into_iter().filter(|entry| entry.is_vold_managed()) {
        let flags = derive_flags(entry);
        let mut volume =
            Volume::from_entry(entry, flags).map_err(|source| VolumeTableError::Volume {
                device: entry.blk_device().to_owned(),
                registered,
                source,
            })?;

        info!(
            target: TABLE_TARGET,
            label = volume.label(),
            mount_point = volume.mount_point(),
            partition = %volume.partition(),
            device = entry.blk_device(),
            flags = flags.bits(),
            "volume table entry"
        );

        volume
            .add_path(entry.blk_device())
            .map_err(|source| VolumeTableError::DevicePath {
                label: volume.label().to_owned(),
                path: entry.blk_device().to_owned(),
                registered,
                source,
            })?;

        registry.add_volume(volume);
        registered += 1;
    }
    Ok(registered)
}
