//! Temporary filesystem laid out like a booted device.
//!
//! Block devices live under `sys/devices/.../block/<name>` with a class link
//! at `sys/block/<name>`, mirroring sysfs. The volume table, runtime
//! directory, block node directory and command socket all sit under the same
//! temporary root.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use tempfile::TempDir;

use vold_config::Config;

use crate::coldboot::TRIGGER_FILE;

/// Synthetic device filesystem.
pub struct DeviceTree {
    root: TempDir,
    triggers: Vec<PathBuf>,
}

impl DeviceTree {
    /// Creates an empty tree with a `sys/block` class directory and an `etc`
    /// directory for the volume table.
    #[must_use]
    pub fn new() -> Self {
        let root = TempDir::new().expect("failed to create device tree root");
        fs::create_dir_all(root.path().join("sys").join("block")).expect("create class dir");
        fs::create_dir_all(root.path().join("etc")).expect("create etc dir");
        Self {
            root,
            triggers: Vec::new(),
        }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    fn utf8(&self, relative: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.path(relative)).expect("temporary path was not UTF-8")
    }

    /// Adds a block device with one partition; both expose triggers.
    pub fn add_block_device(&mut self, name: &str) {
        let device = self
            .path("sys/devices/platform")
            .join(name)
            .join("block")
            .join(name);
        let partition = device.join(format!("{name}p1"));
        fs::create_dir_all(&partition).expect("create device dirs");
        for dir in [&device, &partition] {
            let trigger = dir.join(TRIGGER_FILE);
            File::create(&trigger).expect("create trigger");
            self.triggers.push(trigger);
        }
        std::os::unix::fs::symlink(&device, self.path("sys/block").join(name))
            .expect("create class link");
    }

    /// Writes the volume table.
    pub fn write_table(&self, contents: &str) {
        let table = self.path("etc/fstab.test");
        if let Some(parent) = table.parent() {
            fs::create_dir_all(parent).expect("create table dir");
        }
        fs::write(table, contents).expect("write volume table");
    }

    /// Trigger files created so far.
    #[must_use]
    pub fn triggers(&self) -> Vec<PathBuf> {
        self.triggers.clone()
    }

    /// Counts triggers that have been fired.
    #[must_use]
    pub fn fired_triggers(&self) -> usize {
        count_fired(&self.triggers)
    }

    /// Path to the storage path snapshot.
    #[must_use]
    pub fn storage_paths_file(&self) -> PathBuf {
        self.path("run/vold/storage_paths.json")
    }

    /// Configuration pointing every path into the tree.
    #[must_use]
    pub fn config(&self, coldboot_timeout_secs: u64) -> Config {
        Config {
            fstab_path: Some(self.utf8("etc/fstab.test")),
            sysfs_block_root: self.utf8("sys/block"),
            block_device_dir: self.utf8("dev/block/vold"),
            command_socket: self.utf8("dev/socket/vold"),
            runtime_dir: self.utf8("run/vold"),
            coldboot_timeout_secs,
            ..Config::default()
        }
    }
}

impl Default for DeviceTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts trigger files holding the add directive.
#[must_use]
pub fn count_fired(triggers: &[PathBuf]) -> usize {
    triggers.iter().filter(|trigger| is_fired(trigger)).count()
}

fn is_fired(trigger: &Path) -> bool {
    fs::read(trigger).is_ok_and(|contents| contents == b"add\n")
}
