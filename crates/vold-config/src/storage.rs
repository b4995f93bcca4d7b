//! Storage flavours and the volume table each one reads.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Storage flavour of the device, selecting which volume table is read.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StorageVariant {
    /// eMMC-backed storage using the plain `fstab` table.
    Emmc,
    /// NAND flash exposing a FAT partition.
    FatOnNand,
    /// Raw NAND flash.
    Nand,
    /// Emulated hardware; the table is named after the hardware.
    Emulator,
}

impl StorageVariant {
    /// Table name for this flavour.
    ///
    /// The emulator table is absolute; every other name is relative to the
    /// configured table directory.
    #[must_use]
    pub fn table_name(self, hardware: &str) -> Utf8PathBuf {
        match self {
            Self::Emmc => Utf8PathBuf::from("fstab"),
            Self::FatOnNand => Utf8PathBuf::from("fstab.fat.nand"),
            Self::Nand => Utf8PathBuf::from("fstab.nand"),
            Self::Emulator => Utf8PathBuf::from(format!("/fstab.{hardware}")),
        }
    }
}

/// Errors encountered while parsing a [`StorageVariant`] from text.
pub type StorageVariantParseError = strum::ParseError;
