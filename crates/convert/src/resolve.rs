//! Looking up player UUIDs.
//!
//! The engine never computes UUIDs itself; whoever drives the conversion
//! supplies a [`UuidResolver`] (a cache, a web API client, a fixture map in
//! tests) and decides what happens to names it can't resolve through an
//! [`UnresolvedPolicy`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use uuid::Uuid;

/// Resolves legacy player names to UUIDs.
pub trait UuidResolver {
    /// UUID of the player called `name`, or `None` if there is no such
    /// player (or it can't be found out right now).
    fn resolve(&self, name: &str) -> Option<Uuid>;

    /// Resolve a whole batch at once. Unresolved names are simply missing
    /// from the returned map.
    ///
    /// The default implementation calls [`resolve()`](Self::resolve) once per
    /// name; implementations backed by a remote service should override it
    /// with a single bulk lookup.
    fn resolve_all(&self, names: &[String]) -> BTreeMap<String, Uuid> {
        names.iter().filter_map(|name| self.resolve(name).map(|uuid| (name.clone(), uuid))).collect()
    }
}

impl<S: BuildHasher> UuidResolver for HashMap<String, Uuid, S> {
    fn resolve(&self, name: &str) -> Option<Uuid> {
        self.get(name).copied()
    }
}

impl UuidResolver for BTreeMap<String, Uuid> {
    fn resolve(&self, name: &str) -> Option<Uuid> {
        self.get(name).copied()
    }
}

impl<R: UuidResolver + ?Sized> UuidResolver for &R {
    fn resolve(&self, name: &str) -> Option<Uuid> {
        (**self).resolve(name)
    }

    fn resolve_all(&self, names: &[String]) -> BTreeMap<String, Uuid> {
        (**self).resolve_all(names)
    }
}

/// A [`UuidResolver`] backed by a closure, see [`from_fn()`].
#[derive(Clone)]
pub struct FnResolver<F>(F);

/// Wrap a closure as a [`UuidResolver`].
///
/// ```
/// use chest_convert::resolve::{UuidResolver, from_fn};
/// use uuid::Uuid;
///
/// let resolver = from_fn(|name: &str| (name == "Notch").then(|| Uuid::from_u128(1)));
/// assert_eq!(resolver.resolve("Notch"), Some(Uuid::from_u128(1)));
/// assert_eq!(resolver.resolve("Herobrine"), None);
/// ```
pub fn from_fn<F: Fn(&str) -> Option<Uuid>>(f: F) -> FnResolver<F> {
    FnResolver(f)
}

impl<F: Fn(&str) -> Option<Uuid>> UuidResolver for FnResolver<F> {
    fn resolve(&self, name: &str) -> Option<Uuid> {
        (self.0)(name)
    }
}

/// What to do with a legacy chest whose owner has no known UUID.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedPolicy {
    /// Leave the chest where it is for the rest of the run; cleanup will
    /// quarantine it together with anything else left behind.
    #[default]
    Skip,
    /// Fail the conversion of the whole world group.
    Abort,
}
