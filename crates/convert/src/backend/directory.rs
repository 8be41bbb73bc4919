//! Conversion of chests stored as one file per owner in a directory per
//! world group.

use crate::backend::{CleanupOutcome, ConversionBackend};
use crate::error::{ErrorKind, Result};
use crate::group::{ChestLayout, WorldGroup};
use crate::owner::{ChestOwner, SpecialChest, SpecialChestNames};
use chest_storage::ChestDirectory;
use chest_storage::error::ErrorKind as StorageErrorKind;
use exn::ResultExt;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use tracing::instrument;
use uuid::Uuid;

/// Moves `<legacy_root>/<group>/<name><ext>` to
/// `<chest_root>/<group>/<uuid><ext>`.
///
/// # Examples
///
/// ```no_run
/// use chest_convert::{ChestLayout, ConversionContext, DirectoryBackend, WorldGroup};
/// use std::collections::HashMap;
/// use std::num::NonZeroUsize;
/// use uuid::Uuid;
///
/// # fn example() -> chest_convert::error::Result<()> {
/// let layout = ChestLayout::new("/srv/plugin/chests", "/srv/plugin/chests-uuid");
/// let backend = DirectoryBackend::new(&layout, WorldGroup::new("world")?);
/// let uuids = HashMap::from([("Notch".to_string(), Uuid::from_u128(0x069a79f4_44e9_4726_a5be_fca90e38aaf5))]);
/// let mut conversion = ConversionContext::new(backend, uuids, NonZeroUsize::new(50).unwrap());
/// conversion.run_to_completion()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryBackend {
    group: WorldGroup,
    legacy: ChestDirectory,
    chests: ChestDirectory,
    quarantine: PathBuf,
    special_names: SpecialChestNames,
}
impl DirectoryBackend {
    pub fn new(layout: &ChestLayout, group: WorldGroup) -> Self {
        Self {
            legacy: layout.legacy_dir(&group),
            chests: layout.chest_dir(&group),
            quarantine: layout.quarantine_dir(&group),
            special_names: layout.special_names().clone(),
            group,
        }
    }

    pub fn group(&self) -> &WorldGroup {
        &self.group
    }

    pub fn legacy_dir(&self) -> &ChestDirectory {
        &self.legacy
    }

    pub fn chest_dir(&self) -> &ChestDirectory {
        &self.chests
    }

    /// Move a special chest over to the new directory under its (unchanged)
    /// reserved name. Returns `false` if there was no such chest.
    ///
    /// # Errors
    /// [`ErrorKind::InvalidUsage`] for player chests, which are only ever
    /// moved by [`convert_files()`](ConversionBackend::convert_files).
    pub fn move_special_chest(&self, owner: &ChestOwner) -> Result<bool> {
        let Some(special) = owner.as_special() else {
            exn::bail!(ErrorKind::InvalidUsage(format!("{owner} does not own a special chest")));
        };
        let name = owner.save_file_name(&self.special_names);
        let from = self.legacy.file_path(&name).or_raise(|| ErrorKind::Storage)?;
        if !from.try_exists().or_raise(|| ErrorKind::Storage)? {
            return Ok(false);
        }
        let moved = self.legacy.move_to(&name, &self.chests, &name).or_raise(|| ErrorKind::Storage)?;
        tracing::info!(group = %self.group, chest = %special, path = %moved.path.display(), "Moved special chest");
        Ok(true)
    }
}

impl ConversionBackend for DirectoryBackend {
    #[instrument(skip_all, fields(group = %self.group))]
    fn startup(&mut self) -> Result<()> {
        // Unused world groups might never have had a legacy directory.
        if !self.legacy.exists().or_raise(|| ErrorKind::Startup)? {
            tracing::debug!(path = %self.legacy.path().display(), "No legacy chests to convert");
            return Ok(());
        }
        self.chests.create().or_raise(|| ErrorKind::Startup)?;
        for special in SpecialChest::ALL {
            self.move_special_chest(&ChestOwner::Special(special)).or_raise(|| ErrorKind::Startup)?;
        }
        Ok(())
    }

    fn get_batch(&self, max_entries: usize, exclude: &HashSet<String>) -> Result<Vec<String>> {
        let skip = |key: &str| exclude.contains(key) || self.special_names.is_reserved(key);
        self.legacy.list_keys(max_entries, skip).or_raise(|| ErrorKind::Listing)
    }

    #[instrument(skip_all, fields(group = %self.group, batch = batch.len()))]
    fn convert_files(&mut self, batch: &BTreeMap<String, Uuid>) -> Result<()> {
        for (name, uuid) in batch {
            if self.special_names.is_reserved(name) {
                exn::bail!(ErrorKind::InvalidUsage(format!("special chest {name:?} cannot be converted to a UUID")));
            }
            let owner = ChestOwner::player(name, *uuid);
            let new_name = owner.save_file_name(&self.special_names);
            let moved = self.legacy.move_to(name, &self.chests, &new_name).or_raise(|| ErrorKind::Convert)?;
            tracing::debug!(player = %name, %uuid, modified = %moved.modified, size = moved.size, "Converted chest");
        }
        Ok(())
    }

    #[instrument(skip_all, fields(group = %self.group))]
    fn cleanup(&mut self) -> Result<CleanupOutcome> {
        if !self.legacy.exists().or_raise(|| ErrorKind::Cleanup)? {
            return Ok(CleanupOutcome::NothingToClean);
        }

        let reason = match self.legacy.remove_empty_tree() {
            Ok(()) => {
                tracing::info!(path = %self.legacy.path().display(), "Removed empty legacy chest directory");
                return Ok(CleanupOutcome::Removed);
            },
            Err(e) => e,
        };
        let reason: &StorageErrorKind = &reason;
        tracing::warn!(%reason, "Some chest files could not be converted to UUIDs");

        match self.legacy.rename_dir(&self.quarantine) {
            Ok(quarantine) => {
                tracing::info!(
                    path = %quarantine.path().display(),
                    "Chest files that were not converted have been moved"
                );
                Ok(CleanupOutcome::Quarantined(quarantine.path().to_path_buf()))
            },
            Err(e) => {
                let error: &StorageErrorKind = &e;
                tracing::warn!(
                    path = %self.legacy.path().display(),
                    %error,
                    "Chest files that were not converted are still in the legacy directory"
                );
                Ok(CleanupOutcome::LeftInPlace(self.legacy.path().to_path_buf()))
            },
        }
    }
}
