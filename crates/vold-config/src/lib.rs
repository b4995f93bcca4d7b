//! Shared configuration for the storage volume daemon.
//!
//! Values are layered by [`ortho_config`]: command-line flags override
//! `VOLD_*` environment variables, which override an optional TOML file,
//! which in turn overrides the built-in defaults in [`defaults`]. The daemon
//! takes no positional arguments; everything it needs to locate the volume
//! table, the sysfs device tree and its runtime artefacts is described here.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub mod defaults;
mod logging;
mod runtime;
mod socket;
mod storage;

pub use defaults::{
    DEFAULT_COLDBOOT_TIMEOUT_SECS, DEFAULT_LOG_FILTER, default_block_device_dir,
    default_command_socket, default_fstab_dir, default_hardware, default_log_filter,
    default_log_format, default_runtime_dir, default_storage_variant, default_sysfs_block_root,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use runtime::{RuntimePaths, RuntimePathsError};
pub use socket::{SocketPreparationError, prepare_socket_directory};
pub use storage::{StorageVariant, StorageVariantParseError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "VOLD")]
pub struct Config {
    /// Explicit volume table path. Overrides the variant-derived name.
    #[serde(default)]
    pub fstab_path: Option<Utf8PathBuf>,
    /// Directory against which relative volume table names resolve.
    #[ortho_config(default = defaults::default_fstab_dir())]
    pub fstab_dir: Utf8PathBuf,
    /// Storage flavour selecting the volume table name.
    #[ortho_config(default = defaults::default_storage_variant())]
    pub storage_variant: StorageVariant,
    /// Hardware name used by the emulator table (`fstab.<hardware>`).
    #[ortho_config(default = defaults::default_hardware())]
    pub hardware: String,
    /// Root of the block device class tree replayed at coldboot.
    #[ortho_config(default = defaults::default_sysfs_block_root())]
    pub sysfs_block_root: Utf8PathBuf,
    /// Directory holding block device nodes created for managed volumes.
    #[ortho_config(default = defaults::default_block_device_dir())]
    pub block_device_dir: Utf8PathBuf,
    /// Unix socket on which the command listener accepts clients.
    #[ortho_config(default = defaults::default_command_socket())]
    pub command_socket: Utf8PathBuf,
    /// Directory receiving runtime snapshots such as storage paths.
    #[ortho_config(default = defaults::default_runtime_dir())]
    pub runtime_dir: Utf8PathBuf,
    /// Upper bound, in seconds, on the coldboot arrival wait.
    #[ortho_config(default = DEFAULT_COLDBOOT_TIMEOUT_SECS)]
    pub coldboot_timeout_secs: u64,
    /// `tracing` filter expression.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Output format for log records.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fstab_path: None,
            fstab_dir: default_fstab_dir(),
            storage_variant: default_storage_variant(),
            hardware: default_hardware(),
            sysfs_block_root: default_sysfs_block_root(),
            block_device_dir: default_block_device_dir(),
            command_socket: default_command_socket(),
            runtime_dir: default_runtime_dir(),
            coldboot_timeout_secs: DEFAULT_COLDBOOT_TIMEOUT_SECS,
            log_filter: defaults::default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Location of the volume table this daemon manages.
    ///
    /// An explicit `fstab_path` wins. Otherwise the storage variant picks the
    /// table name, and relative names are joined onto `fstab_dir`.
    #[must_use]
    pub fn fstab_location(&self) -> Utf8PathBuf {
        if let Some(path) = &self.fstab_path {
            return path.clone();
        }
        let name = self.storage_variant.table_name(&self.hardware);
        if name.is_absolute() {
            name
        } else {
            self.fstab_dir.join(name)
        }
    }

    /// Root of the device tree walked during coldboot.
    #[must_use]
    pub fn sysfs_block_root(&self) -> &Utf8Path {
        self.sysfs_block_root.as_path()
    }

    /// Directory for managed block device nodes.
    #[must_use]
    pub fn block_device_dir(&self) -> &Utf8Path {
        self.block_device_dir.as_path()
    }

    /// Command listener socket path.
    #[must_use]
    pub fn command_socket(&self) -> &Utf8Path {
        self.command_socket.as_path()
    }

    /// Bound applied to the coldboot arrival wait.
    #[must_use]
    pub fn coldboot_timeout(&self) -> Duration {
        Duration::from_secs(self.coldboot_timeout_secs)
    }

    /// Configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Configured log format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
