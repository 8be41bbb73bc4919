//! Chest owners and the reserved names of the special chests.

use crate::error::{ErrorKind, Result};
use chest_storage::validate_key;
use derive_more::Display;
use exn::ResultExt;
use uuid::Uuid;

/// The chests that don't belong to any player.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialChest {
    /// Shared by everybody in a world group.
    #[display("public chest")]
    Public,
    /// Template handed out to players without a chest of their own.
    #[display("default chest")]
    Default,
}
impl SpecialChest {
    pub const ALL: [SpecialChest; 2] = [SpecialChest::Public, SpecialChest::Default];
}

/// Whose chest a file belongs to.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash)]
pub enum ChestOwner {
    /// A player, saved under their name in the legacy layout and under their
    /// UUID in the new one.
    #[display("{name}")]
    Player { name: String, uuid: Uuid },
    /// Saved under the same reserved name in both layouts.
    #[display("{_0}")]
    Special(SpecialChest),
}
impl ChestOwner {
    pub fn player(name: impl Into<String>, uuid: Uuid) -> Self {
        Self::Player { name: name.into(), uuid }
    }

    pub fn is_special(&self) -> bool {
        matches!(self, Self::Special(_))
    }

    pub fn as_special(&self) -> Option<SpecialChest> {
        match self {
            Self::Special(special) => Some(*special),
            Self::Player { .. } => None,
        }
    }

    /// File name (without extension) of this owner's chest in the new layout.
    pub fn save_file_name<'a>(&self, names: &'a SpecialChestNames) -> std::borrow::Cow<'a, str> {
        match self {
            Self::Player { uuid, .. } => uuid.hyphenated().to_string().into(),
            Self::Special(special) => names.name_of(*special).into(),
        }
    }
}

/// The reserved file names of the [`SpecialChest`]s.
///
/// Neither name may be readable as a UUID, which guarantees that a converted
/// player chest can never land on top of a special chest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialChestNames {
    public: String,
    default: String,
}
impl SpecialChestNames {
    pub const DEFAULT_PUBLIC: &'static str = "--publicchest";
    pub const DEFAULT_DEFAULT: &'static str = "--defaultchest";

    pub fn new(public: impl Into<String>, default: impl Into<String>) -> Result<Self> {
        let public = Self::check(public.into())?;
        let default = Self::check(default.into())?;
        if public.eq_ignore_ascii_case(&default) {
            exn::bail!(ErrorKind::InvalidName(default));
        }
        Ok(Self { public, default })
    }

    pub fn name_of(&self, special: SpecialChest) -> &str {
        match special {
            SpecialChest::Public => &self.public,
            SpecialChest::Default => &self.default,
        }
    }

    /// Whether `key` is the file name of one of the special chests.
    pub fn is_reserved(&self, key: &str) -> bool {
        SpecialChest::ALL.iter().any(|special| self.name_of(*special) == key)
    }

    fn check(name: String) -> Result<String> {
        let name = validate_key(&name).or_raise(|| ErrorKind::InvalidName(name.clone()))?;
        // Covers every textual form the uuid crate understands (hyphenated,
        // simple, braced, URN) in any letter case.
        if Uuid::parse_str(&name).is_ok() {
            exn::bail!(ErrorKind::InvalidName(name));
        }
        Ok(name)
    }
}
impl Default for SpecialChestNames {
    fn default() -> Self {
        Self {
            public: Self::DEFAULT_PUBLIC.to_string(),
            default: Self::DEFAULT_DEFAULT.to_string(),
        }
    }
}
