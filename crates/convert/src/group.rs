//! World groups and where their chests live on disk.
//!
//! ```text
//! <legacy_root>/<group>/<name><ext>                 before conversion
//! <chest_root>/<group>/<uuid><ext>                  after conversion
//! <legacy_root>/<group>_NOT_CONVERTED/...           whatever could not be converted
//! ```

use crate::error::{ErrorKind, Result};
use crate::owner::SpecialChestNames;
use chest_storage::{ChestDirectory, validate_key};
use derive_more::Display;
use exn::ResultExt;
use std::path::PathBuf;

/// A named partition of chest storage. Every world group has its own
/// directory in both layouts and is converted independently.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorldGroup(String);
impl WorldGroup {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let name = validate_key(&name).or_raise(|| ErrorKind::InvalidName(name.clone()))?;
        Ok(Self(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// The storage roots and naming rules shared by every world group.
///
/// Passed explicitly to each backend so that conversions of different world
/// groups (or different test directories) never share hidden state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChestLayout {
    legacy_root: PathBuf,
    chest_root: PathBuf,
    extension: String,
    special_names: SpecialChestNames,
}
impl ChestLayout {
    pub const DEFAULT_EXTENSION: &'static str = ".dat";
    pub const QUARANTINE_SUFFIX: &'static str = "_NOT_CONVERTED";

    pub fn new(legacy_root: impl Into<PathBuf>, chest_root: impl Into<PathBuf>) -> Self {
        Self {
            legacy_root: legacy_root.into(),
            chest_root: chest_root.into(),
            extension: Self::DEFAULT_EXTENSION.to_string(),
            special_names: SpecialChestNames::default(),
        }
    }

    /// Use a different chest file extension. Leading dots are optional, so
    /// `"nbt"` and `".nbt"` are the same thing.
    pub fn with_extension(mut self, extension: impl AsRef<str>) -> Result<Self> {
        let trimmed = extension.as_ref().trim().trim_start_matches('.');
        if trimmed.is_empty() {
            exn::bail!(ErrorKind::InvalidName(extension.as_ref().to_string()));
        }
        let extension = format!(".{trimmed}");
        // Must be usable as the tail of a file name on its own.
        validate_key(&extension).or_raise(|| ErrorKind::InvalidName(extension.clone()))?;
        self.extension = extension;
        Ok(self)
    }

    pub fn with_special_names(mut self, special_names: SpecialChestNames) -> Self {
        self.special_names = special_names;
        self
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn special_names(&self) -> &SpecialChestNames {
        &self.special_names
    }

    /// Name-keyed chests of `group`.
    pub fn legacy_dir(&self, group: &WorldGroup) -> ChestDirectory {
        ChestDirectory::new(self.legacy_root.join(group.name()), self.extension.clone())
    }

    /// UUID-keyed chests of `group`.
    pub fn chest_dir(&self, group: &WorldGroup) -> ChestDirectory {
        ChestDirectory::new(self.chest_root.join(group.name()), self.extension.clone())
    }

    /// Where the legacy directory of `group` goes when it still holds files
    /// after conversion.
    pub fn quarantine_dir(&self, group: &WorldGroup) -> PathBuf {
        self.legacy_root.join(format!("{}{}", group.name(), Self::QUARANTINE_SUFFIX))
    }
}
