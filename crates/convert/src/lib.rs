//! Migrates chest files from name-keyed to UUID-keyed storage while the
//! owning server keeps running.
//!
//! Every [`WorldGroup`] is converted on its own by a [`ConversionContext`],
//! which the host advances in small batches on its own schedule. The storage
//! specifics live behind [`ConversionBackend`]; [`DirectoryBackend`] handles
//! the one-file-per-chest directory layout.

pub mod backend;
mod context;
pub mod error;
mod group;
mod owner;
pub mod resolve;

pub use crate::backend::{CleanupOutcome, ConversionBackend, DirectoryBackend};
pub use crate::context::{ConversionContext, ConversionState, ConversionStats, Step};
pub use crate::group::{ChestLayout, WorldGroup};
pub use crate::owner::{ChestOwner, SpecialChest, SpecialChestNames};
pub use crate::resolve::{UnresolvedPolicy, UuidResolver};
