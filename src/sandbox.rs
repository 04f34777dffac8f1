//! The per-run sandbox directory.
//!
//! One uniquely named temporary directory per run. It is created lazily on
//! the first [`Sandbox::enter`], becomes the working directory for every test,
//! and is removed by [`Sandbox::exit`] at the end of the run.

use std::{
    env,
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::errors::ClarError;
use crate::fs::{NativeFs, TreeOps};

/// Name prefix of every sandbox directory.
pub const SANDBOX_PREFIX: &str = "clar_tmp_";

/// Environment variables consulted, in order, for a temporary root.
pub const TMP_ENV_VARS: [&str; 4] = ["TMPDIR", "TMP", "TEMP", "USERPROFILE"];

/// Owner of the sandbox directory and of the fixture root it copies from.
pub struct Sandbox {
    path: Option<PathBuf>,
    previous_dir: Option<PathBuf>,
    fixture_root: Option<PathBuf>,
    tmp_root: Option<PathBuf>,
    fs: Box<dyn TreeOps>,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Sandbox {
    pub fn new(fixture_root: Option<PathBuf>) -> Self {
        Self {
            path: None,
            previous_dir: None,
            fixture_root,
            tmp_root: None,
            fs: Box::new(NativeFs),
        }
    }

    /// Creates the sandbox under `root` instead of searching for a temp root.
    pub fn with_tmp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.tmp_root = Some(root.into());
        self
    }

    pub fn with_fs(mut self, fs: Box<dyn TreeOps>) -> Self {
        self.fs = fs;
        self
    }

    /// The sandbox directory, once established.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn fixture_root(&self) -> Option<&Path> {
        self.fixture_root.as_deref()
    }

    /// Creates the sandbox directory if this run does not have one yet.
    pub fn establish(&mut self) -> Result<&Path, ClarError> {
        if self.path.is_none() {
            let root = match &self.tmp_root {
                Some(root) => root.clone(),
                None => find_tmp_root(|var| env::var_os(var)).ok_or_else(|| {
                    ClarError::sandbox("no writable temporary directory found")
                })?,
            };
            let root = fs::canonicalize(&root).map_err(|e| {
                ClarError::sandbox_io("cannot resolve temporary root", &root, e)
            })?;
            let path = self.fs.make_unique_dir(&root, SANDBOX_PREFIX).map_err(|e| {
                ClarError::sandbox_io("cannot create sandbox directory", &root, e)
            })?;
            debug!(path = %path.display(), "created sandbox");
            self.path = Some(path);
        }

        match self.path.as_deref() {
            Some(path) => Ok(path),
            None => Err(ClarError::sandbox("sandbox path was not established")),
        }
    }

    /// Establishes the sandbox and makes it the working directory.
    pub fn enter(&mut self) -> Result<(), ClarError> {
        let path = self.establish()?.to_path_buf();

        if self.previous_dir.is_none() {
            self.previous_dir = env::current_dir().ok();
        }
        env::set_current_dir(&path)
            .map_err(|e| ClarError::sandbox_io("cannot enter sandbox directory", &path, e))?;
        debug!(path = %path.display(), "entered sandbox");
        Ok(())
    }

    /// Leaves the sandbox and removes it with everything inside.
    ///
    /// Leftover temporary state is a defect of the run, so removal failures
    /// are returned rather than ignored.
    pub fn exit(&mut self) -> Result<(), ClarError> {
        let Some(path) = self.path.take() else {
            return Ok(());
        };

        if let Some(previous) = self.previous_dir.take() {
            if let Err(e) = env::set_current_dir(&previous) {
                warn!(dir = %previous.display(), error = %e, "cannot return to previous directory");
                if let Some(parent) = path.parent() {
                    let _ = env::set_current_dir(parent);
                }
            }
        }

        self.fs
            .remove_tree(&path)
            .map_err(|e| ClarError::sandbox_io("Failed to cleanup the sandbox", &path, e))?;
        debug!(path = %path.display(), "removed sandbox");
        Ok(())
    }

    /// Removes everything inside the sandbox, keeping the directory itself.
    pub fn reset(&mut self) -> std::io::Result<()> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        for entry in fs::read_dir(path)? {
            self.fs.remove_tree(&entry?.path())?;
        }
        Ok(())
    }

    /// Location of fixture `name` under the fixture root.
    pub fn fixture_path(&self, name: &str) -> std::io::Result<PathBuf> {
        let root = self.fixture_root.as_deref().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no fixture root configured")
        })?;
        Ok(root.join(relative_name(name)))
    }

    /// Copies fixture `name` into the sandbox; returns where it landed.
    pub fn copy_fixture(&self, name: &str) -> std::io::Result<PathBuf> {
        let source = self.fixture_path(name)?;
        let sandbox = self.require_path()?;
        let copied = self.fs.copy_tree(&source, sandbox)?;
        debug!(fixture = name, to = %copied.display(), "copied fixture into sandbox");
        Ok(copied)
    }

    /// Removes `name` from the sandbox. Missing entries are fine.
    pub fn remove_fixture(&self, name: &str) -> std::io::Result<()> {
        let sandbox = self.require_path()?;
        self.fs.remove_tree(&sandbox.join(relative_name(name)))
    }

    fn require_path(&self) -> std::io::Result<&Path> {
        self.path.as_deref().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "sandbox not established")
        })
    }
}

/// Picks the first usable temporary root: the [`TMP_ENV_VARS`] in order, then
/// the platform default, then the current directory.
pub fn find_tmp_root(lookup: impl Fn(&str) -> Option<OsString>) -> Option<PathBuf> {
    TMP_ENV_VARS
        .iter()
        .filter_map(|var| lookup(var).map(PathBuf::from))
        .chain([env::temp_dir(), PathBuf::from(".")])
        .find(|candidate| is_valid_tmp_path(candidate))
}

// Permission bits ignore ownership and ACLs: writability means an anonymous
// file can be created there.
fn is_valid_tmp_path(path: &Path) -> bool {
    let is_dir = fs::metadata(path).map(|meta| meta.is_dir()).unwrap_or(false);
    if !is_dir {
        return false;
    }
    match tempfile::tempfile_in(path) {
        Ok(_) => true,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "temporary root not writable");
            false
        }
    }
}

// Fixture names are always relative to their root.
fn relative_name(name: &str) -> &str {
    name.trim_start_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tmp_root_prefers_the_first_valid_env_var() {
        let good = tempfile::tempdir().unwrap();
        let good_path = good.path().to_path_buf();
        let found = find_tmp_root(|var| match var {
            "TMPDIR" => Some(OsString::from("/definitely/not/here")),
            "TMP" => Some(good_path.clone().into_os_string()),
            _ => None,
        });
        assert_eq!(found, Some(good_path));
    }

    #[test]
    fn tmp_root_skips_plain_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        fs::write(&file, "").unwrap();
        let found = find_tmp_root(|var| (var == "TMPDIR").then(|| file.clone().into_os_string()));
        assert_ne!(found, Some(file));
        assert!(found.is_some());
    }

    #[cfg(unix)]
    #[test]
    fn tmp_root_skips_directories_it_cannot_write() {
        use std::os::unix::fs::PermissionsExt;

        let locked = tempfile::tempdir().unwrap();
        let good = tempfile::tempdir().unwrap();
        fs::set_permissions(locked.path(), fs::Permissions::from_mode(0o555)).unwrap();

        // Privileged users write through permission bits; nothing to check then.
        if fs::write(locked.path().join("canary"), "").is_ok() {
            fs::set_permissions(locked.path(), fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let locked_path = locked.path().to_path_buf();
        let good_path = good.path().to_path_buf();
        let found = find_tmp_root(|var| match var {
            "TMPDIR" => Some(locked_path.clone().into_os_string()),
            "TMP" => Some(good_path.clone().into_os_string()),
            _ => None,
        });
        fs::set_permissions(locked.path(), fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(found, Some(good_path));
    }

    #[test]
    fn establish_is_lazy_and_stable() {
        let root = tempfile::tempdir().unwrap();
        let mut sandbox = Sandbox::new(None).with_tmp_root(root.path());
        assert!(sandbox.path().is_none());

        let first = sandbox.establish().unwrap().to_path_buf();
        let second = sandbox.establish().unwrap().to_path_buf();
        assert_eq!(first, second);
        assert!(first.is_dir());
        assert!(first
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(SANDBOX_PREFIX));

        sandbox.exit().unwrap();
        assert!(!first.exists());
        assert!(sandbox.path().is_none());
    }

    #[test]
    fn establish_fails_on_a_missing_root() {
        let root = tempfile::tempdir().unwrap();
        let mut sandbox = Sandbox::new(None).with_tmp_root(root.path().join("gone"));
        let err = sandbox.establish().unwrap_err();
        assert!(matches!(err, ClarError::Sandbox { .. }));
    }

    #[test]
    fn fixtures_copy_in_and_clean_up() {
        let fixtures = tempfile::tempdir().unwrap();
        fs::create_dir_all(fixtures.path().join("repo/objects")).unwrap();
        fs::write(fixtures.path().join("repo/HEAD"), "ref: main").unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let mut sandbox =
            Sandbox::new(Some(fixtures.path().to_path_buf())).with_tmp_root(tmp.path());
        let root = sandbox.establish().unwrap().to_path_buf();

        let copied = sandbox.copy_fixture("/repo").unwrap();
        assert_eq!(copied, root.join("repo"));
        assert!(root.join("repo/objects").is_dir());
        assert_eq!(fs::read_to_string(root.join("repo/HEAD")).unwrap(), "ref: main");

        sandbox.remove_fixture("repo").unwrap();
        assert!(!root.join("repo").exists());
        sandbox.remove_fixture("repo").unwrap();

        sandbox.exit().unwrap();
    }

    #[test]
    fn reset_empties_but_keeps_the_sandbox() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sandbox = Sandbox::new(None).with_tmp_root(tmp.path());
        let root = sandbox.establish().unwrap().to_path_buf();
        fs::create_dir(root.join("dir")).unwrap();
        fs::write(root.join("file"), "x").unwrap();

        sandbox.reset().unwrap();
        assert!(root.is_dir());
        assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
        sandbox.exit().unwrap();
    }

    struct StuckFs;

    impl TreeOps for StuckFs {
        fn make_unique_dir(&self, root: &Path, prefix: &str) -> std::io::Result<PathBuf> {
            NativeFs.make_unique_dir(root, prefix)
        }

        fn copy_tree(&self, source: &Path, dest: &Path) -> std::io::Result<PathBuf> {
            NativeFs.copy_tree(source, dest)
        }

        fn remove_tree(&self, _path: &Path) -> std::io::Result<()> {
            Err(std::io::ErrorKind::DirectoryNotEmpty.into())
        }
    }

    #[test]
    fn failed_removal_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sandbox = Sandbox::new(None)
            .with_tmp_root(tmp.path())
            .with_fs(Box::new(StuckFs));
        let path = sandbox.establish().unwrap().to_path_buf();

        let err = sandbox.exit().unwrap_err();
        assert!(matches!(err, ClarError::Sandbox { path: Some(ref p), .. } if *p == path));
        NativeFs.remove_tree(&path).unwrap();
    }

    #[test]
    fn fixture_ops_need_a_root_and_a_sandbox() {
        let sandbox = Sandbox::new(None);
        assert!(sandbox.fixture_path("x").is_err());
        assert!(sandbox.remove_fixture("x").is_err());
    }
}
