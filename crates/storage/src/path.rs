//! Storage key validation.
//!
//! Keys end up as file and directory names, so they must never be able to
//! point anywhere other than directly inside the directory they are joined
//! onto.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a storage key (player name, UUID text, reserved chest name or
/// world group name).
///
/// A valid key is exactly one normal path component: no separators, no `.`
/// or `..`, not empty, and no null bytes.
///
/// # Examples
///
/// ```
/// use chest_storage::validate_key;
/// assert!(validate_key("Notch").is_ok());
/// assert!(validate_key("--publicchest").is_ok());
/// assert!(validate_key("world_nether").is_ok());
/// assert!(validate_key("../etc").is_err());
/// assert!(validate_key("a/b").is_err());
/// assert!(validate_key("").is_err());
/// assert!(validate_key("a\0b").is_err());
/// ```
pub fn validate_key(key: impl AsRef<str>) -> Result<String> {
    let key = key.as_ref();
    let invalid = || ErrorKind::InvalidPath(PathBuf::from(key));
    if key.is_empty() || key.contains('\0') || key.contains('/') || key.contains('\\') {
        exn::bail!(invalid());
    }
    let mut components = Path::new(key).components();
    // Null bytes pass through Path::components() on Unix but cause
    // truncation in C-based syscalls, hence the explicit check above.
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(key.to_string()),
        _ => exn::bail!(invalid()),
    }
}
