//! Derives runtime artefact paths written by the daemon.
//!
//! The runtime directory houses the storage path snapshot published after
//! coldboot. Clients reading the snapshot and the daemon writing it agree on
//! the layout through this type.

use std::fs::DirBuilder;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::Config;

const STORAGE_PATHS_FILE: &str = "storage_paths.json";

/// Canonical paths for runtime artefacts written by the daemon.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    runtime_dir: PathBuf,
    storage_paths: PathBuf,
}

impl RuntimePaths {
    /// Derives runtime paths from the configuration, creating the directory.
    pub fn from_config(config: &Config) -> Result<Self, RuntimePathsError> {
        let runtime_dir = config.runtime_dir.as_std_path().to_path_buf();
        if runtime_dir.as_os_str().is_empty() {
            return Err(RuntimePathsError::EmptyRuntimeDirectory);
        }
        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o755);
        }
        builder
            .create(&runtime_dir)
            .map_err(|source| RuntimePathsError::RuntimeDirectory {
                path: runtime_dir.clone(),
                source,
            })?;
        Ok(Self {
            storage_paths: runtime_dir.join(STORAGE_PATHS_FILE),
            runtime_dir,
        })
    }

    /// Directory holding runtime artefacts.
    #[must_use]
    pub fn runtime_dir(&self) -> &Path {
        self.runtime_dir.as_path()
    }

    /// Path to the storage path snapshot.
    #[must_use]
    pub fn storage_paths(&self) -> &Path {
        self.storage_paths.as_path()
    }
}

/// Errors raised while deriving daemon runtime paths.
#[derive(Debug, Error)]
pub enum RuntimePathsError {
    /// The runtime directory was configured as an empty path.
    #[error("runtime directory must not be empty")]
    EmptyRuntimeDirectory,
    /// Creating the runtime directory failed.
    #[error("failed to prepare runtime directory '{path}': {source}")]
    RuntimeDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    #[test]
    fn creates_runtime_directory_and_snapshot_path() {
        let temp = tempfile::tempdir().expect("temp dir");
        let runtime = temp.path().join("run").join("vold");
        let config = Config {
            runtime_dir: Utf8PathBuf::from_path_buf(runtime.clone()).expect("utf8 path"),
            ..Config::default()
        };
        let paths = RuntimePaths::from_config(&config).expect("paths should derive");
        assert!(runtime.is_dir());
        assert!(paths.storage_paths().ends_with("storage_paths.json"));
        assert_eq!(paths.runtime_dir(), runtime.as_path());
    }

    #[test]
    fn rejects_empty_runtime_directory() {
        let config = Config {
            runtime_dir: Utf8PathBuf::new(),
            ..Config::default()
        };
        let error = RuntimePaths::from_config(&config).expect_err("empty path should fail");
        assert!(matches!(error, RuntimePathsError::EmptyRuntimeDirectory));
    }
}
