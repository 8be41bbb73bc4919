//! Chest directory operations on the local filesystem.
//!
//! A [`ChestDirectory`] is a plain directory holding one `<key><extension>`
//! file per chest. Everything here is synchronous and uses `std::fs`; callers
//! are expected to chunk their work into small increments themselves.

use crate::error::{ErrorKind, Result};
use crate::models::{FileInfo, TreeScan};
use crate::path::validate_key;
use exn::ResultExt;
use std::collections::BinaryHeap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

/// A directory of chest files sharing one file extension.
///
/// Construction never touches the filesystem; the directory may not exist
/// (yet, or any more).
///
/// # Examples
///
/// ```no_run
/// use chest_storage::ChestDirectory;
///
/// # fn example() -> chest_storage::error::Result<()> {
/// let chests = ChestDirectory::new("/srv/minecraft/chests/world", ".dat");
/// for key in chests.list_keys(50, |_| false)? {
///     println!("{}", chests.file_path(&key)?.display());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChestDirectory {
    path: PathBuf,
    extension: String,
}
impl ChestDirectory {
    pub fn new(path: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self { path: path.into(), extension: extension.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(self.path.try_exists().map_err(|e| ErrorKind::from_io(e, &self.path))?)
    }

    /// Create the directory, including any missing parents.
    pub fn create(&self) -> Result<()> {
        Ok(fs::create_dir_all(&self.path).map_err(|e| ErrorKind::from_io(e, &self.path))?)
    }

    /// Absolute location of the chest file for `key`.
    pub fn file_path(&self, key: &str) -> Result<PathBuf> {
        let key = validate_key(key)?;
        Ok(self.path.join(format!("{key}{}", self.extension)))
    }

    /// List up to `max` keys: names of the files in this directory ending in
    /// the extension, with the extension stripped.
    ///
    /// The directory is read once, keeping only the `max` smallest keys in
    /// memory.
    ///
    /// Keys for which `skip` returns `true` are dropped *before* the cap is
    /// applied, so a caller that skips everything it cannot handle always
    /// sees the rest of the directory. The result is sorted, which makes
    /// repeated calls deterministic for a given directory state.
    ///
    /// # Notes
    /// - A directory that doesn't exist lists as empty, not as an error.
    /// - `max == 0` returns immediately without reading the directory.
    /// - Sub-directories and names that aren't valid keys are ignored.
    pub fn list_keys(&self, max: usize, skip: impl Fn(&str) -> bool) -> Result<Vec<String>> {
        if max == 0 {
            return Ok(Vec::new());
        }
        let entries = match fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => exn::bail!(ErrorKind::from_io(err, &self.path)),
        };

        // Max-heap holding the `max` smallest keys seen so far, so memory is
        // bounded by the batch size rather than the directory size.
        let mut keys = BinaryHeap::with_capacity(max.saturating_add(1).min(1024));
        for entry in entries {
            let entry = entry.map_err(|e| ErrorKind::from_io(e, &self.path))?;
            let Some(key) = self.key_of(&entry.file_name()) else {
                continue;
            };
            if keys.len() == max && keys.peek().is_some_and(|largest| &key >= largest) {
                continue;
            }
            if skip(key.as_str()) {
                continue;
            }
            let file_type = entry.file_type().map_err(|e| ErrorKind::from_io(e, entry.path()))?;
            if file_type.is_dir() {
                continue;
            }
            keys.push(key);
            if keys.len() > max {
                keys.pop();
            }
        }
        let keys = keys.into_sorted_vec();
        Ok(keys)
    }

    /// Move the file for `key` in this directory to `new_key` in `target`,
    /// returning what now lives at the destination.
    pub fn move_to(&self, key: &str, target: &ChestDirectory, new_key: &str) -> Result<FileInfo> {
        let from = self.file_path(key)?;
        let to = target.file_path(new_key)?;
        let info = stat(&from).or_raise(|| ErrorKind::Move { from: from.clone(), to: to.clone() })?;
        move_file(&from, &to)?;
        // A rename keeps size and modification time.
        Ok(FileInfo { path: to, ..info })
    }

    /// Recursively list everything below this directory without following
    /// symlinks. A missing directory scans as empty.
    pub fn scan_tree(&self) -> Result<TreeScan> {
        let mut scan = TreeScan::default();
        let mut stack = vec![self.path.clone()];
        while let Some(current) = stack.pop() {
            let entries = match fs::read_dir(&current) {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound && current == self.path => {
                    return Ok(scan);
                },
                Err(err) => exn::bail!(ErrorKind::from_io(err, &current)),
            };
            scan.directories.push(current.clone());
            for entry in entries {
                let entry = entry.map_err(|e| ErrorKind::from_io(e, &current))?;
                let path = entry.path();
                let file_type = entry.file_type().map_err(|e| ErrorKind::from_io(e, &path))?;
                if file_type.is_dir() {
                    stack.push(path);
                } else {
                    scan.files.push(path);
                }
            }
        }
        Ok(scan)
    }

    /// Delete this directory and every directory below it, provided not a
    /// single file exists anywhere in the tree.
    ///
    /// Only empty directories are ever removed (deepest first), so a file
    /// appearing between the scan and the removal makes this fail rather than
    /// lose the file.
    pub fn remove_empty_tree(&self) -> Result<()> {
        let scan = self.scan_tree()?;
        if !scan.is_empty() {
            exn::bail!(ErrorKind::NotEmpty(self.path.clone()));
        }
        // Directories are recorded parents-first; reversing removes children
        // before the directory containing them.
        for directory in scan.directories.iter().rev() {
            fs::remove_dir(directory).or_raise(|| ErrorKind::NotEmpty(directory.clone()))?;
        }
        Ok(())
    }

    /// Rename the whole directory to `to`, which must not exist yet.
    pub fn rename_dir(&self, to: impl AsRef<Path>) -> Result<ChestDirectory> {
        let to = to.as_ref();
        move_file(&self.path, to)?;
        Ok(ChestDirectory::new(to, self.extension.clone()))
    }

    /// Strip the extension from a directory entry name, if it is one of ours.
    fn key_of(&self, file_name: &OsStr) -> Option<String> {
        let key = file_name.to_str()?.strip_suffix(self.extension.as_str())?;
        validate_key(key).ok()
    }
}

/// Rename `from` to `to`, refusing when `to` already exists.
///
/// The existence check and the rename are separate steps, so a file created
/// at `to` by another process in between is still replaced. The rename itself
/// is a single `rename(2)`: it keeps the file's contents and last modified
/// time, and is atomic within one filesystem. Moves across
/// filesystems fail instead of falling back to copying. Every failure is
/// reported as [`ErrorKind::Move`] naming both paths, with the cause attached
/// underneath.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    let failed = || ErrorKind::Move { from: from.to_path_buf(), to: to.to_path_buf() };
    if to.try_exists().or_raise(failed)? {
        let exists = exn::Exn::from(ErrorKind::AlreadyExists(to.to_path_buf()));
        return Err(exists.raise(failed()));
    }
    fs::rename(from, to).or_raise(failed)?;
    tracing::trace!(from = %from.display(), to = %to.display(), "Moved");
    Ok(())
}

/// Read metadata for a single file.
pub fn stat(path: impl AsRef<Path>) -> Result<FileInfo> {
    let path = path.as_ref();
    let metadata = fs::metadata(path).map_err(|e| ErrorKind::from_io(e, path))?;
    let modified = metadata.modified().map_err(ErrorKind::Io)?.into();
    Ok(FileInfo::new(path, metadata.len(), modified))
}
