//! Filesystem primitives for swapping a patched file in and its backup out.
//!
//! Every mutation the engine performs goes through [`swap_in`] or
//! [`restore`]; both leave the target present on any single failure they can
//! observe. Patched content is written through a same-directory tempfile
//! that is fsynced and renamed over the target.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to move {} to backup {}: {source}", from.display(), to.display())]
    Backup {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write patched {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove patched {}: {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to restore backup {} to {}: {source}", from.display(), to.display())]
    Restore {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Move `target` to `backup`, then write `content` at `target`.
///
/// If the write fails the backup is moved back, so the target is only ever
/// missing if that rollback fails too.
pub fn swap_in(target: &Path, backup: &Path, content: &[u8]) -> Result<(), PatchError> {
    let permissions = fs::metadata(target)
        .map_err(|source| PatchError::Read {
            path: target.to_path_buf(),
            source,
        })?
        .permissions();

    swap_with(target, backup, |path| atomic_write(path, content, Some(permissions)))
}

fn swap_with<F>(target: &Path, backup: &Path, write: F) -> Result<(), PatchError>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    fs::rename(target, backup).map_err(|source| PatchError::Backup {
        from: target.to_path_buf(),
        to: backup.to_path_buf(),
        source,
    })?;

    if let Err(source) = write(target) {
        if let Err(rollback) = fs::rename(backup, target) {
            tracing::error!(
                target_path = %target.display(),
                backup = %backup.display(),
                error = %rollback,
                "could not move backup back after failed write"
            );
        }
        return Err(PatchError::Write {
            path: target.to_path_buf(),
            source,
        });
    }

    Ok(())
}

/// Replace `target` with `backup`. A missing `target` is not an error.
pub fn restore(backup: &Path, target: &Path) -> Result<(), PatchError> {
    if !backup.exists() {
        return Err(PatchError::Restore {
            from: backup.to_path_buf(),
            to: target.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, "backup not found"),
        });
    }

    match fs::remove_file(target) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(target_path = %target.display(), "patched file missing, restoring backup anyway");
        }
        Err(source) => {
            return Err(PatchError::Remove {
                path: target.to_path_buf(),
                source,
            })
        }
    }

    fs::rename(backup, target).map_err(|source| PatchError::Restore {
        from: backup.to_path_buf(),
        to: target.to_path_buf(),
        source,
    })
}

/// Write through a tempfile in the same directory: write, fsync, rename.
fn atomic_write(
    path: &Path,
    content: &[u8],
    permissions: Option<fs::Permissions>,
) -> io::Result<()> {
    // Same directory keeps the final rename on one filesystem.
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent directory"))?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    if let Some(permissions) = permissions {
        temp.as_file().set_permissions(permissions)?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
