//! Filesystem operations used by the sandbox.
//!
//! All tree manipulation goes through [`TreeOps`]. Platform differences live
//! under `cfg` inside [`NativeFs`]; the retry policy for directory removal is
//! [`retry_transient`], shared by every platform.

use std::{
    fs, io,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extra attempts after the first failed removal.
pub const RM_RETRY_COUNT: u32 = 5;

/// Base delay; attempt `n` sleeps `RM_RETRY_DELAY * n * n`.
pub const RM_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Random characters appended to a unique directory prefix.
const UNIQUE_SUFFIX_LEN: usize = 6;

/// Tree-level filesystem capability used by the sandbox.
pub trait TreeOps {
    /// Creates a fresh, private (0700 on unix) directory `<root>/<prefix>XXXXXX`.
    fn make_unique_dir(&self, root: &Path, prefix: &str) -> io::Result<PathBuf>;

    /// Recursively copies `source` to `dest` with `cp -R` placement rules:
    /// when `dest` already exists, the copy lands in `dest/<source name>`,
    /// which must not exist yet. Returns the path actually written.
    fn copy_tree(&self, source: &Path, dest: &Path) -> io::Result<PathBuf>;

    /// Forcibly removes `path` and everything below it. A missing path is
    /// not an error.
    fn remove_tree(&self, path: &Path) -> io::Result<()>;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFs;

impl TreeOps for NativeFs {
    fn make_unique_dir(&self, root: &Path, prefix: &str) -> io::Result<PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .rand_bytes(UNIQUE_SUFFIX_LEN)
            .tempdir_in(root)?;
        // The sandbox outlives this call; `remove_tree` deletes it.
        Ok(dir.into_path())
    }

    fn copy_tree(&self, source: &Path, dest: &Path) -> io::Result<PathBuf> {
        let source_meta = fs::metadata(source)?;

        let target = if dest.exists() {
            let name = source.file_name().ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("'{}' has no final component", source.display()),
                )
            })?;
            dest.join(name)
        } else {
            dest.to_path_buf()
        };

        if target.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("'{}' already exists", target.display()),
            ));
        }

        if !source_meta.is_dir() {
            fs::copy(source, &target)?;
            return Ok(target);
        }

        for entry in WalkDir::new(source) {
            let entry = entry.map_err(io::Error::from)?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            let out = target.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir(&out)?;
            } else {
                fs::copy(entry.path(), &out)?;
            }
        }
        debug!(from = %source.display(), to = %target.display(), "copied tree");
        Ok(target)
    }

    fn remove_tree(&self, path: &Path) -> io::Result<()> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        if meta.is_dir() {
            for entry in WalkDir::new(path).contents_first(true) {
                let entry = entry.map_err(io::Error::from)?;
                if entry.file_type().is_dir() {
                    retry_transient(entry.path(), || fs::remove_dir(entry.path()))?;
                } else {
                    remove_file(entry.path())?;
                }
            }
        } else {
            remove_file(path)?;
        }

        #[cfg(windows)]
        wait_until_gone(path)?;

        debug!(path = %path.display(), "removed tree");
        Ok(())
    }
}

/// Runs `op`, retrying with quadratic backoff while it fails because a
/// directory is still reported non-empty (a handle on a just-deleted child
/// has not been released yet). Other errors are returned immediately.
pub fn retry_transient<T>(path: &Path, mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    let mut attempt: u32 = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if is_transient(&e) && attempt <= RM_RETRY_COUNT => {
                attempt += 1;
                let delay = RM_RETRY_DELAY * attempt * attempt;
                warn!(
                    path = %path.display(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "directory not empty yet, retrying removal"
                );
                thread::sleep(delay);
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_transient(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::DirectoryNotEmpty
}

#[cfg(not(windows))]
fn remove_file(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

// Read-only files cannot be deleted on Windows until the attribute is cleared.
#[cfg(windows)]
fn remove_file(path: &Path) -> io::Result<()> {
    let mut permissions = fs::symlink_metadata(path)?.permissions();
    if permissions.readonly() {
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
        fs::set_permissions(path, permissions)?;
    }
    fs::remove_file(path)
}

// Deletion on Windows is only scheduled; wait until the path is really gone.
#[cfg(windows)]
fn wait_until_gone(path: &Path) -> io::Result<()> {
    let mut attempt: u32 = 1;
    loop {
        match fs::symlink_metadata(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            _ if attempt > RM_RETRY_COUNT => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("'{}' still exists after removal", path.display()),
                ))
            }
            _ => {
                thread::sleep(RM_RETRY_DELAY * attempt * attempt);
                attempt += 1;
            }
        }
    }
}
