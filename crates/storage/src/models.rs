//! Storage models.

use std::path::PathBuf;
use time::OffsetDateTime;

/// File metadata for a single chest file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Absolute path of the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
}
impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: OffsetDateTime) -> Self {
        Self { path: path.into(), size, modified }
    }
}

/// Everything found underneath a directory by
/// [`ChestDirectory::scan_tree()`](crate::ChestDirectory::scan_tree).
///
/// Directories are listed parents-first; anything that is not a directory
/// (regular files, symlinks, sockets, ...) counts as a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeScan {
    pub files: Vec<PathBuf>,
    pub directories: Vec<PathBuf>,
}
impl TreeScan {
    /// `true` when the tree contains directories only.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
