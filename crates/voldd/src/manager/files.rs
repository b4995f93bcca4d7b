use std::io::{self, Write};
use std::path::Path;

use tempfile::Builder;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Replaces `path` with `contents` in one rename.
///
/// The payload is synced before the rename so readers see either the old
/// snapshot or the complete new one.
pub(super) fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let directory = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            "snapshot path has no parent directory",
        )
    })?;

    let prefix = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("voldd");
    let mut builder = Builder::new();
    builder.prefix(prefix);
    #[cfg(unix)]
    {
        use std::fs::Permissions;
        // Clients read the snapshot; only the daemon writes it.
        builder.permissions(Permissions::from_mode(0o644));
    }

    let mut staged = builder.tempfile_in(directory)?;
    staged.write_all(contents)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|error| error.error)?;
    Ok(())
}
