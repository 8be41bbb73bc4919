//! Configuration for chest conversions.
//!
//! Values are merged from (lowest to highest priority):
//!
//! 1. built-in defaults,
//! 2. a TOML file ([`Config::default_path()`] unless told otherwise),
//! 3. environment variables prefixed with `CHEST_` (e.g. `CHEST_BATCH_SIZE=50`).
//!
//! ```toml
//! legacy_root = "/srv/minecraft/plugins/BetterEnderChest/chests"
//! chest_root = "/srv/minecraft/plugins/BetterEnderChest/chests-uuid"
//! batch_size = 50
//! on_unresolved = "skip"
//! world_groups = ["default", "creative"]
//! ```
//!
//! The loaded [`Config`] is only a bag of values: it is turned into explicit
//! [`ChestLayout`]s, [`WorldGroup`]s and [`ConversionContext`]s, one per world
//! group, so nothing downstream reads configuration on its own.

pub mod error;

use crate::error::{ErrorKind, Result};
use chest_convert::{
    ChestLayout, ConversionContext, DirectoryBackend, SpecialChestNames, UnresolvedPolicy, UuidResolver, WorldGroup,
};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Prefix of the environment variables read by [`Config::load()`].
pub const ENV_PREFIX: &str = "CHEST_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory containing one name-keyed sub-directory per world group.
    pub legacy_root: PathBuf,
    /// Directory containing one UUID-keyed sub-directory per world group.
    pub chest_root: PathBuf,
    /// Chest file extension, with or without the leading dot.
    pub extension: String,
    /// Maximum number of chests moved per step.
    pub batch_size: usize,
    pub public_chest: String,
    pub default_chest: String,
    pub on_unresolved: UnresolvedPolicy,
    pub world_groups: Vec<String>,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            legacy_root: PathBuf::from("chests"),
            chest_root: PathBuf::from("chests-uuid"),
            extension: ChestLayout::DEFAULT_EXTENSION.to_string(),
            batch_size: 100,
            public_chest: SpecialChestNames::DEFAULT_PUBLIC.to_string(),
            default_chest: SpecialChestNames::DEFAULT_DEFAULT.to_string(),
            on_unresolved: UnresolvedPolicy::Skip,
            world_groups: vec!["default".to_string()],
        }
    }
}

impl Config {
    /// Platform-specific location of the configuration file, e.g.
    /// `~/.config/chest/chest.toml` on Linux.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "chest").map(|dirs| dirs.config_dir().join("chest.toml"))
    }

    /// The merged configuration sources, before extraction.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file.map(Path::to_path_buf).or_else(Self::default_path) {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load the configuration from `file` (or the default location) and the
    /// environment. A missing file is not an error.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let config: Config = Self::figment(file).extract().or_raise(|| ErrorKind::Load)?;
        tracing::debug!(
            legacy_root = %config.legacy_root.display(),
            chest_root = %config.chest_root.display(),
            batch_size = config.batch_size,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn layout(&self) -> Result<ChestLayout> {
        let special_names = SpecialChestNames::new(&self.public_chest, &self.default_chest)
            .or_raise(|| ErrorKind::Invalid("public_chest/default_chest"))?;
        let layout = ChestLayout::new(&self.legacy_root, &self.chest_root)
            .with_extension(&self.extension)
            .or_raise(|| ErrorKind::Invalid("extension"))?;
        Ok(layout.with_special_names(special_names))
    }

    /// A batch size of zero would never convert anything, so it is rejected.
    pub fn batch_size(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.batch_size).ok_or_raise(|| ErrorKind::Invalid("batch_size"))
    }

    pub fn world_groups(&self) -> Result<Vec<WorldGroup>> {
        self.world_groups
            .iter()
            .map(|name| WorldGroup::new(name).or_raise(|| ErrorKind::Invalid("world_groups")))
            .collect()
    }

    /// One ready-to-run conversion per configured world group.
    ///
    /// Contexts share nothing but the resolver and can be advanced in any
    /// order or interleaving.
    pub fn contexts<R: UuidResolver + Clone>(
        &self,
        resolver: R,
    ) -> Result<Vec<ConversionContext<DirectoryBackend, R>>> {
        let layout = self.layout()?;
        let batch_size = self.batch_size()?;
        let policy = self.on_unresolved;
        Ok(self
            .world_groups()?
            .into_iter()
            .map(|group| {
                let backend = DirectoryBackend::new(&layout, group);
                ConversionContext::new(backend, resolver.clone(), batch_size).with_policy(policy)
            })
            .collect())
    }
}
