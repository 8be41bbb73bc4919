//! Conversion backends.
//!
//! A [`ConversionBackend`] knows how one particular storage layout is
//! converted; the [`ConversionContext`](crate::ConversionContext) only decides
//! *when* each of its four operations runs. The backend is picked once, when
//! the context for a world group is created.

mod directory;

pub use self::directory::DirectoryBackend;
use crate::error::Result;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use uuid::Uuid;

/// How the legacy storage of a world group was left behind by
/// [`ConversionBackend::cleanup()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// There never was any legacy storage for this world group.
    NothingToClean,
    /// Everything was converted and the legacy storage has been deleted.
    Removed,
    /// Something was left behind, and has been moved to this location.
    Quarantined(PathBuf),
    /// Something was left behind and couldn't be moved out of the way; it is
    /// still at this location.
    LeftInPlace(PathBuf),
}

/// The storage-specific half of a conversion.
///
/// Operations are called strictly in the order `startup`, then any number of
/// `get_batch`/`convert_files` pairs, then `cleanup`, and never concurrently
/// for the same world group.
pub trait ConversionBackend {
    /// Prepare the new storage and carry over the special chests.
    ///
    /// Must be a no-op when there's no legacy storage, and must be safe to
    /// run again after an interrupted conversion.
    fn startup(&mut self) -> Result<()>;

    /// Up to `max_entries` legacy player names still waiting to be converted,
    /// never including any name in `exclude`. An empty batch means there's
    /// nothing left. Must not modify storage.
    fn get_batch(&self, max_entries: usize, exclude: &HashSet<String>) -> Result<Vec<String>>;

    /// Convert every chest in `batch` (player name to UUID). Stops at the
    /// first failure; chests converted before it stay converted.
    fn convert_files(&mut self, batch: &BTreeMap<String, Uuid>) -> Result<()>;

    /// Get rid of the legacy storage without ever deleting a chest that
    /// wasn't converted.
    fn cleanup(&mut self) -> Result<CleanupOutcome>;
}
