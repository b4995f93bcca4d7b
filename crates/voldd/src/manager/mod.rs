//! In-memory volume registry used by the running daemon.
//!
//! [`VolumeManager`] owns every volume registered from the volume table and
//! tracks the block nodes the uevent listener reports for their backing
//! paths. After coldboot it publishes the resulting storage paths to the
//! runtime directory.

use std::fs::DirBuilder;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use vold_config::{Config, RuntimePaths};

use crate::subsystems::{BootFixupError, SubsystemKind, SubsystemStartError, VolumeRegistry};
use crate::uevent::{BlockEventHandler, Uevent, UeventAction};
use crate::volume::{BlockKind, BlockNode, Volume, VolumeInfo};

mod files;
mod storage_paths;

pub use storage_paths::StoragePaths;

const MANAGER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::manager");
const BLOCK_DEVICE_DIR_MODE: u32 = 0o755;

/// Process-wide registry of managed volumes.
#[derive(Debug)]
pub struct VolumeManager {
    block_device_dir: PathBuf,
    config: Config,
    volumes: Mutex<Vec<Volume>>,
}

impl VolumeManager {
    /// Builds an empty registry from the daemon configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            block_device_dir: config.block_device_dir().as_std_path().to_path_buf(),
            config: config.clone(),
            volumes: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Volume>> {
        self.volumes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Storage paths derived from the volumes registered so far.
    #[must_use]
    pub fn storage_paths(&self) -> StoragePaths {
        StoragePaths::from_volumes(&self.lock())
    }
}

impl VolumeRegistry for VolumeManager {
    fn start(&self) -> Result<(), SubsystemStartError> {
        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(BLOCK_DEVICE_DIR_MODE);
        }
        builder.create(&self.block_device_dir).map_err(|source| {
            SubsystemStartError::with_source(
                SubsystemKind::VolumeRegistry,
                format!(
                    "failed to create block device directory '{}'",
                    self.block_device_dir.display()
                ),
                source,
            )
        })?;
        debug!(
            target: MANAGER_TARGET,
            block_device_dir = %self.block_device_dir.display(),
            "volume registry ready"
        );
        Ok(())
    }

    fn add_volume(&self, volume: Volume) {
        debug!(
            target: MANAGER_TARGET,
            label = volume.label(),
            mount_point = volume.mount_point(),
            "volume registered"
        );
        self.lock().push(volume);
    }

    fn volumes(&self) -> Vec<VolumeInfo> {
        self.lock().iter().map(Volume::info).collect()
    }

    fn apply_boot_fixups(&self) -> Result<(), BootFixupError> {
        let paths = self.storage_paths();
        let runtime = RuntimePaths::from_config(&self.config)
            .map_err(|source| BootFixupError::with_source("runtime directory unavailable", source))?;
        let payload = serde_json::to_vec_pretty(&paths)
            .map_err(|source| BootFixupError::with_source("failed to encode storage paths", source))?;
        files::atomic_write(runtime.storage_paths(), &payload).map_err(|source| {
            BootFixupError::with_source(
                format!("failed to write '{}'", runtime.storage_paths().display()),
                source,
            )
        })?;
        info!(
            target: MANAGER_TARGET,
            internal = paths.internal_sd_path.as_deref().unwrap_or(""),
            external = paths.external_sd_path.as_deref().unwrap_or(""),
            "storage paths published"
        );
        Ok(())
    }
}

impl BlockEventHandler for VolumeManager {
    fn handle_block_event(&self, event: &Uevent) -> bool {
        let mut volumes = self.lock();
        let Some(volume) = volumes
            .iter_mut()
            .find(|volume| volume.handles_devpath(event.devpath()))
        else {
            return false;
        };
        let (Some(major), Some(minor)) = (event.major(), event.minor()) else {
            return true;
        };

        match event.action() {
            UeventAction::Add | UeventAction::Change => {
                let kind = if event.devtype() == Some("partition") {
                    BlockKind::Partition
                } else {
                    BlockKind::Disk
                };
                volume.attach_node(BlockNode {
                    devpath: event.devpath().to_owned(),
                    major,
                    minor,
                    kind,
                });
            }
            UeventAction::Remove => {
                volume.detach_node(major, minor);
            }
            _ => {}
        }
        debug!(
            target: MANAGER_TARGET,
            label = volume.label(),
            action = %event.action(),
            major,
            minor,
            "block node updated"
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;
    use crate::fstab::Fstab;
    use crate::volume::load_volume_table;

    const TABLE: &str = "\
/devices/platform/msdc.0/mmc_host auto vfat defaults voldmanaged=sdcard0:auto,nonremovable
/devices/platform/msdc.1/mmc_host auto vfat defaults voldmanaged=sdcard1:auto
";

    struct Harness {
        _temp: TempDir,
        manager: VolumeManager,
        block_dir: PathBuf,
        runtime_dir: PathBuf,
    }

    fn utf8(path: PathBuf) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(path).expect("utf8 temp path")
    }

    #[fixture]
    fn harness() -> Harness {
        let temp = TempDir::new().expect("temp dir");
        let block_dir = temp.path().join("dev").join("block").join("vold");
        let runtime_dir = temp.path().join("run").join("vold");
        let config = Config {
            block_device_dir: utf8(block_dir.clone()),
            runtime_dir: utf8(runtime_dir.clone()),
            ..Config::default()
        };
        let manager = VolumeManager::new(&config);
        let fstab = Fstab::parse(TABLE).expect("table should parse");
        load_volume_table(fstab.entries(), &manager).expect("table should load");
        Harness {
            _temp: temp,
            manager,
            block_dir,
            runtime_dir,
        }
    }

    fn event(datagram: &[u8]) -> Uevent {
        Uevent::parse(datagram).expect("datagram should parse")
    }

    #[rstest]
    fn start_creates_block_device_directory(harness: Harness) {
        harness.manager.start().expect("start should succeed");
        assert!(harness.block_dir.is_dir());
        harness.manager.start().expect("restart should be idempotent");
    }

    #[rstest]
    fn start_fails_when_directory_is_blocked(harness: Harness) {
        let parent = harness.block_dir.parent().expect("parent").to_path_buf();
        fs::create_dir_all(parent.parent().expect("grandparent")).expect("create dev");
        fs::write(&parent, b"not a directory").expect("block the path");
        let error = harness.manager.start().expect_err("start should fail");
        assert_eq!(error.kind, SubsystemKind::VolumeRegistry);
    }

    #[rstest]
    fn block_events_attach_to_matching_volume(harness: Harness) {
        let claimed = harness.manager.handle_block_event(&event(
            b"add@/devices/platform/msdc.1/mmc_host/mmc1/mmc1:0001/block/mmcblk1\0\
SUBSYSTEM=block\0MAJOR=179\0MINOR=32\0DEVTYPE=disk\0",
        ));
        assert!(claimed);
        let volumes = harness.manager.volumes();
        assert!(volumes[0].nodes.is_empty());
        assert_eq!(volumes[1].nodes.len(), 1);
        assert_eq!(volumes[1].nodes[0].kind, BlockKind::Disk);

        harness.manager.handle_block_event(&event(
            b"remove@/devices/platform/msdc.1/mmc_host/mmc1/mmc1:0001/block/mmcblk1\0\
SUBSYSTEM=block\0MAJOR=179\0MINOR=32\0",
        ));
        assert!(harness.manager.volumes()[1].nodes.is_empty());
    }

    #[rstest]
    fn unrelated_devices_are_not_claimed(harness: Harness) {
        let claimed = harness.manager.handle_block_event(&event(
            b"add@/devices/virtual/block/loop0\0SUBSYSTEM=block\0MAJOR=7\0MINOR=0\0",
        ));
        assert!(!claimed);
    }

    #[rstest]
    fn boot_fixups_publish_storage_paths(harness: Harness) {
        harness
            .manager
            .apply_boot_fixups()
            .expect("fixups should succeed");
        let raw = fs::read(harness.runtime_dir.join("storage_paths.json"))
            .expect("snapshot should exist");
        let paths: StoragePaths = serde_json::from_slice(&raw).expect("snapshot should decode");
        assert_eq!(paths.internal_sd_path.as_deref(), Some("/storage/sdcard0"));
        assert_eq!(paths.external_sd_path.as_deref(), Some("/storage/sdcard1"));
    }
}
