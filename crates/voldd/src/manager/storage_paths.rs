//! Storage paths published once coldboot has settled.

use serde::{Deserialize, Serialize};

use crate::volume::{Volume, VolumeFlags};

/// Mount points of the primary internal and external volumes.
///
/// The internal path belongs to the first non-removable volume in table
/// order, the external path to the first removable one. Either is absent when
/// no such volume is registered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePaths {
    /// Mount point of the built-in storage volume.
    pub internal_sd_path: Option<String>,
    /// Mount point of the removable storage volume.
    pub external_sd_path: Option<String>,
}

impl StoragePaths {
    /// Derives the paths from volumes in registration order.
    #[must_use]
    pub fn from_volumes(volumes: &[Volume]) -> Self {
        let mount_point = |removable: bool| {
            volumes
                .iter()
                .find(|volume| volume.flags().contains(VolumeFlags::NON_REMOVABLE) != removable)
                .map(|volume| volume.mount_point().to_owned())
        };
        Self {
            internal_sd_path: mount_point(false),
            external_sd_path: mount_point(true),
        }
    }
}
