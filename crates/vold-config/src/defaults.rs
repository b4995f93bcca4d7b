//! Built-in configuration defaults.

use camino::Utf8PathBuf;

use crate::logging::LogFormat;
use crate::storage::StorageVariant;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Seconds the coldboot handshake waits for replayed arrivals.
pub const DEFAULT_COLDBOOT_TIMEOUT_SECS: u64 = 5;

/// Default log filter expression used by the daemon.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the daemon.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Directory holding the volume table when its name is relative.
#[must_use]
pub fn default_fstab_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("/")
}

/// Storage flavour assumed when none is configured.
#[must_use]
pub fn default_storage_variant() -> StorageVariant {
    StorageVariant::Emmc
}

/// Hardware name consulted by the emulator table.
#[must_use]
pub fn default_hardware() -> String {
    String::from("goldfish")
}

/// Block device class tree replayed at coldboot.
#[must_use]
pub fn default_sysfs_block_root() -> Utf8PathBuf {
    Utf8PathBuf::from("/sys/block")
}

/// Directory for device nodes of managed volumes.
#[must_use]
pub fn default_block_device_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("/dev/block/vold")
}

/// Command listener socket.
#[must_use]
pub fn default_command_socket() -> Utf8PathBuf {
    Utf8PathBuf::from("/dev/socket/vold")
}

/// Runtime snapshot directory.
#[must_use]
pub fn default_runtime_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("/run/vold")
}
