//! Parser for the static volume table.
//!
//! Each non-comment line has five whitespace-separated fields:
//!
//! ```text
//! <blk_device> <mount_point> <fs_type> <mnt_flags> <fs_mgr_flags>
//! ```
//!
//! Only the comma-separated `fs_mgr_flags` column matters to this daemon.
//! `voldmanaged=<label>:<partition>` marks an entry as ours; `nonremovable`,
//! `encryptable[=<location>]` and `noemulatedsd` describe its capabilities.
//! Unrecognised flags are kept verbatim.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while reading or parsing a volume table.
#[derive(Debug, Error)]
pub enum FstabError {
    /// The table could not be read.
    #[error("failed to read volume table '{path}': {source}")]
    Read {
        /// Table path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// A line had fewer than five fields.
    #[error("line {line}: expected 5 fields, found {found}")]
    MissingFields {
        /// One-based line number.
        line: usize,
        /// Number of fields present.
        found: usize,
    },
    /// A `voldmanaged` flag lacked its `<label>:<partition>` value, or the
    /// partition number was invalid.
    #[error("line {line}: malformed voldmanaged flag '{flag}'")]
    MalformedVoldManaged {
        /// One-based line number.
        line: usize,
        /// Offending flag text.
        flag: String,
    },
}

/// Partition selector of a managed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Partition {
    /// Let the daemon pick the partition (`auto`).
    Auto,
    /// A numbered partition.
    Number(u32),
    /// A vendor-specific partition name such as `emmc@fat`.
    Named(String),
}

impl Partition {
    /// Values starting with a digit or sign must be a valid partition number;
    /// anything else that is not `auto` is a vendor name.
    fn parse(value: &str) -> Option<Self> {
        if value.is_empty() {
            return None;
        }
        if value == "auto" {
            return Some(Self::Auto);
        }
        let numeric = value
            .chars()
            .next()
            .is_some_and(|first| first.is_ascii_digit() || first == '-' || first == '+');
        if numeric {
            return value.parse::<u32>().ok().map(Self::Number);
        }
        Some(Self::Named(value.to_owned()))
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => formatter.write_str("auto"),
            Self::Number(number) => write!(formatter, "{number}"),
            Self::Named(name) => formatter.write_str(name),
        }
    }
}

/// Value of the `voldmanaged` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoldManaged {
    /// Volume label.
    pub label: String,
    /// Partition selector.
    pub partition: Partition,
}

/// Parsed `fs_mgr_flags` column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FsMgrFlags {
    /// Present when the entry is managed by this daemon.
    pub vold_managed: Option<VoldManaged>,
    /// The medium cannot be removed.
    pub nonremovable: bool,
    /// Encryption metadata location, or an empty string for a bare flag.
    pub encryptable: Option<String>,
    /// No emulated storage sits on top of this volume.
    pub noemulatedsd: bool,
    /// Flags this daemon does not interpret.
    pub other: Vec<String>,
}

impl FsMgrFlags {
    fn parse(column: &str, line: usize) -> Result<Self, FstabError> {
        let mut flags = Self::default();
        for flag in column.split(',').filter(|flag| !flag.is_empty()) {
            match flag.split_once('=') {
                Some(("voldmanaged", value)) => {
                    let Some((label, partition)) = value.split_once(':') else {
                        return Err(FstabError::MalformedVoldManaged {
                            line,
                            flag: flag.to_owned(),
                        });
                    };
                    let partition = Partition::parse(partition).filter(|_| !label.is_empty());
                    let Some(partition) = partition else {
                        return Err(FstabError::MalformedVoldManaged {
                            line,
                            flag: flag.to_owned(),
                        });
                    };
                    flags.vold_managed = Some(VoldManaged {
                        label: label.to_owned(),
                        partition,
                    });
                }
                Some(("encryptable", location)) => flags.encryptable = Some(location.to_owned()),
                None if flag == "voldmanaged" => {
                    return Err(FstabError::MalformedVoldManaged {
                        line,
                        flag: flag.to_owned(),
                    });
                }
                None if flag == "encryptable" => flags.encryptable = Some(String::new()),
                None if flag == "nonremovable" => flags.nonremovable = true,
                None if flag == "noemulatedsd" => flags.noemulatedsd = true,
                _ => flags.other.push(flag.to_owned()),
            }
        }
        Ok(flags)
    }
}

/// One record of the volume table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FstabEntry {
    blk_device: String,
    mount_point: String,
    fs_type: String,
    mount_options: String,
    flags: FsMgrFlags,
}

impl FstabEntry {
    /// Backing device path (a sysfs devpath for managed entries).
    #[must_use]
    pub fn blk_device(&self) -> &str {
        &self.blk_device
    }

    /// Mount point column, `auto` for most managed entries.
    #[must_use]
    pub fn mount_point(&self) -> &str {
        &self.mount_point
    }

    /// Filesystem type.
    #[must_use]
    pub fn fs_type(&self) -> &str {
        &self.fs_type
    }

    /// Raw mount flags and options column.
    #[must_use]
    pub fn mount_options(&self) -> &str {
        &self.mount_options
    }

    /// Parsed fs_mgr flags.
    #[must_use]
    pub fn flags(&self) -> &FsMgrFlags {
        &self.flags
    }

    /// Whether this daemon manages the entry.
    #[must_use]
    pub fn is_vold_managed(&self) -> bool {
        self.flags.vold_managed.is_some()
    }

    /// Whether the medium is non-removable.
    #[must_use]
    pub fn is_nonremovable(&self) -> bool {
        self.flags.nonremovable
    }

    /// Whether the volume may be encrypted.
    #[must_use]
    pub fn is_encryptable(&self) -> bool {
        self.flags.encryptable.is_some()
    }

    /// Whether no emulated storage is layered on this volume.
    #[must_use]
    pub fn is_noemulatedsd(&self) -> bool {
        self.flags.noemulatedsd
    }

    /// Volume label of a managed entry.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.flags
            .vold_managed
            .as_ref()
            .map(|managed| managed.label.as_str())
    }

    /// Partition selector of a managed entry.
    #[must_use]
    pub fn partition(&self) -> Option<&Partition> {
        self.flags
            .vold_managed
            .as_ref()
            .map(|managed| &managed.partition)
    }
}

/// A parsed volume table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fstab {
    entries: Vec<FstabEntry>,
}

impl Fstab {
    /// Reads and parses the table at `path`.
    pub fn read(path: &Path) -> Result<Self, FstabError> {
        let contents = fs::read_to_string(path).map_err(|source| FstabError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parses table text.
    pub fn parse(contents: &str) -> Result<Self, FstabError> {
        let mut entries = Vec::new();
        for (index, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [blk_device, mount_point, fs_type, mount_options, fs_mgr, ..] = fields.as_slice()
            else {
                return Err(FstabError::MissingFields {
                    line: index + 1,
                    found: fields.len(),
                });
            };
            entries.push(FstabEntry {
                blk_device: (*blk_device).to_owned(),
                mount_point: (*mount_point).to_owned(),
                fs_type: (*fs_type).to_owned(),
                mount_options: (*mount_options).to_owned(),
                flags: FsMgrFlags::parse(fs_mgr, index + 1)?,
            });
        }
        Ok(Self { entries })
    }

    /// Entries in table order.
    #[must_use]
    pub fn entries(&self) -> &[FstabEntry] {
        &self.entries
    }
}
