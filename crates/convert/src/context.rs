//! The conversion of a single world group, one small step at a time.
//!
//! A [`ConversionContext`] never loops or sleeps on its own. The host calls
//! [`advance()`](ConversionContext::advance) whenever it has time to spare,
//! and each call performs exactly one bounded piece of work:
//!
//! ```text
//! NotStarted ──startup──▶ Converting ──batch──▶ Converting ──empty batch──▶ CleaningUp ──cleanup──▶ Done
//!      │                      │                                                 │
//!      └──────────────────────┴───────────────── error ─────────────────────────┴──▶ Failed
//! ```
//!
//! Stopping half-way is always safe: a fresh context for the same world group
//! picks up wherever the previous one left off.

use crate::backend::{CleanupOutcome, ConversionBackend};
use crate::error::{ErrorKind, Result};
use crate::resolve::{UnresolvedPolicy, UuidResolver};
use std::collections::HashSet;
use std::num::NonZeroUsize;

/// Where a [`ConversionContext`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionState {
    NotStarted,
    /// Only observable if the backend's startup panicked.
    Starting,
    Converting,
    CleaningUp,
    Done,
    Failed,
}

/// Result of a single [`advance()`](ConversionContext::advance).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Call `advance()` again.
    MoreWork,
    /// The world group is converted; further calls do nothing.
    Done,
}

/// Running totals for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionStats {
    /// Number of non-empty batches handed to the backend.
    pub batches: usize,
    /// Chests converted to UUIDs.
    pub converted: usize,
    /// Chests left alone because their owner's UUID is unknown.
    pub skipped: usize,
    /// Set once cleanup has run.
    pub cleanup: Option<CleanupOutcome>,
}

/// Drives a [`ConversionBackend`] through the conversion of one world group.
pub struct ConversionContext<B, R> {
    backend: B,
    resolver: R,
    batch_size: NonZeroUsize,
    policy: UnresolvedPolicy,
    state: ConversionState,
    skipped: HashSet<String>,
    stats: ConversionStats,
}
impl<B: ConversionBackend, R: UuidResolver> ConversionContext<B, R> {
    /// `batch_size` bounds the number of chests moved by a single
    /// [`advance()`](Self::advance).
    pub fn new(backend: B, resolver: R, batch_size: NonZeroUsize) -> Self {
        Self {
            backend,
            resolver,
            batch_size,
            policy: UnresolvedPolicy::default(),
            state: ConversionState::NotStarted,
            skipped: HashSet::new(),
            stats: ConversionStats::default(),
        }
    }

    pub fn with_policy(mut self, policy: UnresolvedPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> ConversionState {
        self.state
    }

    pub fn stats(&self) -> &ConversionStats {
        &self.stats
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Player names skipped so far because no UUID was found for them.
    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.skipped.iter().map(String::as_str)
    }

    /// Perform the next piece of work.
    ///
    /// # Errors
    /// Any error is fatal for this context: it moves to
    /// [`ConversionState::Failed`] and every later call returns
    /// [`ErrorKind::AlreadyFailed`] without touching storage. Work committed
    /// by earlier steps is kept; run a new context to try again.
    pub fn advance(&mut self) -> Result<Step> {
        let result = match self.state {
            ConversionState::Done => return Ok(Step::Done),
            ConversionState::Failed => exn::bail!(ErrorKind::AlreadyFailed),
            ConversionState::NotStarted | ConversionState::Starting => self.start(),
            ConversionState::Converting => self.convert_next_batch(),
            ConversionState::CleaningUp => self.clean_up(),
        };
        if result.is_err() {
            self.state = ConversionState::Failed;
        }
        result
    }

    /// Call [`advance()`](Self::advance) until the conversion is done.
    pub fn run_to_completion(&mut self) -> Result<&ConversionStats> {
        while self.advance()? == Step::MoreWork {}
        Ok(&self.stats)
    }

    fn start(&mut self) -> Result<Step> {
        self.state = ConversionState::Starting;
        self.backend.startup()?;
        self.state = ConversionState::Converting;
        Ok(Step::MoreWork)
    }

    fn convert_next_batch(&mut self) -> Result<Step> {
        let names = self.backend.get_batch(self.batch_size.get(), &self.skipped)?;
        if names.is_empty() {
            tracing::info!(
                converted = self.stats.converted,
                skipped = self.stats.skipped,
                "No chests left to convert"
            );
            self.state = ConversionState::CleaningUp;
            return Ok(Step::MoreWork);
        }

        let batch = self.resolver.resolve_all(&names);
        for name in names.into_iter().filter(|name| !batch.contains_key(name)) {
            match self.policy {
                UnresolvedPolicy::Abort => exn::bail!(ErrorKind::Unresolved(name)),
                UnresolvedPolicy::Skip => {
                    tracing::warn!(player = %name, "No UUID found for player; chest will not be converted");
                    self.skipped.insert(name);
                    self.stats.skipped += 1;
                },
            }
        }
        if !batch.is_empty() {
            self.backend.convert_files(&batch)?;
            self.stats.batches += 1;
            self.stats.converted += batch.len();
            tracing::info!(batch = batch.len(), converted = self.stats.converted, "Converted batch of chests");
        }
        Ok(Step::MoreWork)
    }

    fn clean_up(&mut self) -> Result<Step> {
        let outcome = self.backend.cleanup()?;
        self.stats.cleanup = Some(outcome);
        self.state = ConversionState::Done;
        Ok(Step::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DirectoryBackend;
    use crate::group::{ChestLayout, WorldGroup};
    use crate::owner::SpecialChestNames;
    use crate::resolve::from_fn;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::collections::{BTreeMap, HashMap};
    use std::fs::{self, File};
    use std::path::Path;
    use std::time::{Duration, SystemTime};
    use uuid::Uuid;

    const ALICE: &str = "11111111-1111-1111-1111-111111111111";
    const BOB: &str = "22222222-2222-2222-2222-222222222222";

    fn layout(root: &Path) -> ChestLayout {
        ChestLayout::new(root.join("legacy"), root.join("chests"))
    }

    fn backend(root: &Path) -> DirectoryBackend {
        DirectoryBackend::new(&layout(root), WorldGroup::new("world").unwrap())
    }

    fn batch_size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn write(dir: &Path, name: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), name.as_bytes()).unwrap();
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> =
            fs::read_dir(dir).unwrap().map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned()).collect();
        names.sort();
        names
    }

    /// Wraps a backend and records every call made to it.
    struct Recording<B> {
        inner: B,
        batches: RefCell<Vec<Vec<String>>>,
        cleanups: usize,
    }
    impl<B> Recording<B> {
        fn new(inner: B) -> Self {
            Self { inner, batches: RefCell::new(Vec::new()), cleanups: 0 }
        }
    }
    impl<B: ConversionBackend> ConversionBackend for Recording<B> {
        fn startup(&mut self) -> Result<()> {
            self.inner.startup()
        }

        fn get_batch(&self, max_entries: usize, exclude: &HashSet<String>) -> Result<Vec<String>> {
            let batch = self.inner.get_batch(max_entries, exclude)?;
            self.batches.borrow_mut().push(batch.clone());
            Ok(batch)
        }

        fn convert_files(&mut self, batch: &BTreeMap<String, Uuid>) -> Result<()> {
            self.inner.convert_files(batch)
        }

        fn cleanup(&mut self) -> Result<CleanupOutcome> {
            self.cleanups += 1;
            self.inner.cleanup()
        }
    }

    #[test]
    fn test_two_players_and_public_chest() {
        let temp_dir = tempfile::tempdir().unwrap();
        let layout = layout(temp_dir.path()).with_special_names(SpecialChestNames::new("public", "default").unwrap());
        let legacy = temp_dir.path().join("legacy/world");
        for name in ["alice.dat", "bob.dat", "public.dat"] {
            write(&legacy, name);
        }
        let uuids = HashMap::from([
            ("alice".to_string(), Uuid::parse_str(ALICE).unwrap()),
            ("bob".to_string(), Uuid::parse_str(BOB).unwrap()),
        ]);

        let backend = DirectoryBackend::new(&layout, WorldGroup::new("world").unwrap());
        let mut conversion = ConversionContext::new(backend, uuids, batch_size(10));
        let stats = conversion.run_to_completion().unwrap().clone();

        assert_eq!(conversion.state(), ConversionState::Done);
        assert_eq!(stats.converted, 2);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.cleanup, Some(CleanupOutcome::Removed));
        let chests = temp_dir.path().join("chests/world");
        assert_eq!(file_names(&chests), vec![format!("{ALICE}.dat"), format!("{BOB}.dat"), "public.dat".to_string()]);
        assert_eq!(fs::read(chests.join(format!("{ALICE}.dat"))).unwrap(), b"alice.dat");
        assert_eq!(fs::read(chests.join("public.dat")).unwrap(), b"public.dat");
        assert!(!legacy.exists());
    }

    #[test]
    fn test_steps_one_increment_at_a_time() {
        let temp_dir = tempfile::tempdir().unwrap();
        let legacy = temp_dir.path().join("legacy/world");
        for name in ["a.dat", "b.dat", "c.dat"] {
            write(&legacy, name);
        }
        let resolver = from_fn(|name: &str| Some(Uuid::from_u128(name.as_bytes()[0] as u128)));
        let mut conversion = ConversionContext::new(backend(temp_dir.path()), resolver, batch_size(2));

        assert_eq!(conversion.state(), ConversionState::NotStarted);
        assert_eq!(conversion.advance().unwrap(), Step::MoreWork);
        assert_eq!(conversion.state(), ConversionState::Converting);
        assert_eq!(conversion.advance().unwrap(), Step::MoreWork);
        assert_eq!(file_names(&legacy), vec!["c.dat".to_string()]);
        assert_eq!(conversion.advance().unwrap(), Step::MoreWork);
        assert!(file_names(&legacy).is_empty());
        // The empty batch only switches over to cleanup.
        assert_eq!(conversion.advance().unwrap(), Step::MoreWork);
        assert_eq!(conversion.state(), ConversionState::CleaningUp);
        assert!(legacy.exists());
        assert_eq!(conversion.advance().unwrap(), Step::Done);
        assert_eq!(conversion.state(), ConversionState::Done);
        assert!(!legacy.exists());
        // Done is final.
        assert_eq!(conversion.advance().unwrap(), Step::Done);
        assert_eq!(conversion.stats().batches, 2);
        assert_eq!(conversion.stats().converted, 3);
    }

    #[test]
    fn test_missing_legacy_directory_changes_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let resolver: HashMap<String, Uuid> = HashMap::new();
        let mut conversion = ConversionContext::new(backend(temp_dir.path()), resolver, batch_size(5));
        let stats = conversion.run_to_completion().unwrap();
        assert_eq!(stats.converted, 0);
        assert_eq!(stats.cleanup, Some(CleanupOutcome::NothingToClean));
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_modified_times_survive_conversion() {
        let temp_dir = tempfile::tempdir().unwrap();
        let legacy = temp_dir.path().join("legacy/world");
        let mut expected = BTreeMap::new();
        for (i, name) in ["alice", "bob", "carol", "dave"].into_iter().enumerate() {
            write(&legacy, &format!("{name}.dat"));
            let modified = SystemTime::UNIX_EPOCH + Duration::from_secs(1_300_000_000 + i as u64 * 86_400);
            File::options().write(true).open(legacy.join(format!("{name}.dat"))).unwrap().set_modified(modified).unwrap();
            expected.insert(Uuid::from_u128(i as u128 + 1), modified);
        }
        let resolver = from_fn(|name: &str| {
            let position = ["alice", "bob", "carol", "dave"].iter().position(|n| *n == name)?;
            Some(Uuid::from_u128(position as u128 + 1))
        });
        let mut conversion = ConversionContext::new(backend(temp_dir.path()), resolver, batch_size(3));
        conversion.run_to_completion().unwrap();

        let chests = temp_dir.path().join("chests/world");
        for (uuid, modified) in expected {
            let path = chests.join(format!("{}.dat", uuid.hyphenated()));
            assert_eq!(fs::metadata(path).unwrap().modified().unwrap(), modified);
        }
    }

    #[test]
    fn test_stray_file_is_quarantined() {
        let temp_dir = tempfile::tempdir().unwrap();
        let legacy = temp_dir.path().join("legacy/world");
        write(&legacy, "alice.dat");
        write(&legacy, "stray.txt");
        let uuids = HashMap::from([("alice".to_string(), Uuid::parse_str(ALICE).unwrap())]);
        let mut conversion = ConversionContext::new(backend(temp_dir.path()), uuids, batch_size(1));
        let stats = conversion.run_to_completion().unwrap();

        let quarantine = temp_dir.path().join("legacy/world_NOT_CONVERTED");
        assert_eq!(stats.cleanup, Some(CleanupOutcome::Quarantined(quarantine.clone())));
        assert!(!legacy.exists());
        assert_eq!(file_names(&quarantine), vec!["stray.txt".to_string()]);
        assert!(temp_dir.path().join(format!("chests/world/{ALICE}.dat")).exists());
    }

    #[test]
    fn test_unresolved_players_are_skipped_and_quarantined() {
        let temp_dir = tempfile::tempdir().unwrap();
        let legacy = temp_dir.path().join("legacy/world");
        for name in ["alice.dat", "ghost.dat", "phantom.dat"] {
            write(&legacy, name);
        }
        let uuids = HashMap::from([("alice".to_string(), Uuid::parse_str(ALICE).unwrap())]);
        // A batch size of one makes the unknown players fill whole batches.
        let mut conversion = ConversionContext::new(backend(temp_dir.path()), uuids, batch_size(1));
        let stats = conversion.run_to_completion().unwrap().clone();

        assert_eq!(stats.converted, 1);
        assert_eq!(stats.skipped, 2);
        let mut skipped: Vec<_> = conversion.skipped().collect();
        skipped.sort();
        assert_eq!(skipped, vec!["ghost", "phantom"]);
        let quarantine = temp_dir.path().join("legacy/world_NOT_CONVERTED");
        assert_eq!(file_names(&quarantine), vec!["ghost.dat".to_string(), "phantom.dat".to_string()]);
    }

    #[test]
    fn test_unresolved_player_aborts() {
        let temp_dir = tempfile::tempdir().unwrap();
        let legacy = temp_dir.path().join("legacy/world");
        write(&legacy, "ghost.dat");
        let uuids: HashMap<String, Uuid> = HashMap::new();
        let mut conversion =
            ConversionContext::new(backend(temp_dir.path()), uuids, batch_size(1)).with_policy(UnresolvedPolicy::Abort);
        assert_eq!(conversion.advance().unwrap(), Step::MoreWork);
        let err = conversion.advance().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unresolved(name) if name == "ghost"));
        assert_eq!(conversion.state(), ConversionState::Failed);
        assert!(legacy.join("ghost.dat").exists());
    }

    #[test]
    fn test_failed_batch_stops_everything() {
        let temp_dir = tempfile::tempdir().unwrap();
        let legacy = temp_dir.path().join("legacy/world");
        for name in ["alice.dat", "bob.dat", "carol.dat", "dave.dat"] {
            write(&legacy, name);
        }
        // Bob's destination is already taken.
        write(&temp_dir.path().join("chests/world"), &format!("{BOB}.dat"));
        let resolver = from_fn(|name: &str| match name {
            "alice" => Uuid::parse_str(ALICE).ok(),
            "bob" => Uuid::parse_str(BOB).ok(),
            "carol" => Some(Uuid::from_u128(3)),
            "dave" => Some(Uuid::from_u128(4)),
            _ => None,
        });
        let mut conversion = ConversionContext::new(Recording::new(backend(temp_dir.path())), resolver, batch_size(2));

        assert_eq!(conversion.advance().unwrap(), Step::MoreWork);
        let err = conversion.advance().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Convert));
        assert_eq!(conversion.state(), ConversionState::Failed);

        let again = conversion.advance().unwrap_err();
        assert!(matches!(&*again, ErrorKind::AlreadyFailed));
        assert!(matches!(&*conversion.run_to_completion().unwrap_err(), ErrorKind::AlreadyFailed));

        let recording = conversion.backend();
        assert_eq!(recording.batches.borrow().len(), 1);
        assert_eq!(recording.cleanups, 0);
        // Alice was moved before Bob failed, the rest never got a turn.
        assert_eq!(file_names(&legacy), vec!["bob.dat".to_string(), "carol.dat".to_string(), "dave.dat".to_string()]);
    }

    #[test]
    fn test_restart_after_interruption() {
        let temp_dir = tempfile::tempdir().unwrap();
        let legacy = temp_dir.path().join("legacy/world");
        for name in ["a.dat", "b.dat", "c.dat", "d.dat", "--publicchest.dat"] {
            write(&legacy, name);
        }
        let resolver = from_fn(|name: &str| Some(Uuid::from_u128(name.as_bytes()[0] as u128)));

        // The host gives up after the first batch.
        let mut first = ConversionContext::new(backend(temp_dir.path()), &resolver, batch_size(2));
        first.advance().unwrap();
        first.advance().unwrap();
        drop(first);
        assert_eq!(file_names(&legacy), vec!["c.dat".to_string(), "d.dat".to_string()]);

        let mut second = ConversionContext::new(backend(temp_dir.path()), &resolver, batch_size(2));
        let stats = second.run_to_completion().unwrap();
        assert_eq!(stats.converted, 2);
        assert_eq!(stats.cleanup, Some(CleanupOutcome::Removed));
        assert_eq!(file_names(&temp_dir.path().join("chests/world")).len(), 5);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_every_chest_converted_exactly_once(count in 0usize..40, size in 1usize..50) {
            let temp_dir = tempfile::tempdir().unwrap();
            let legacy = temp_dir.path().join("legacy/world");
            fs::create_dir_all(&legacy).unwrap();
            let names: Vec<String> = (0..count).map(|i| format!("player{i}")).collect();
            for name in &names {
                write(&legacy, &format!("{name}.dat"));
            }
            let uuids: HashMap<String, Uuid> =
                names.iter().enumerate().map(|(i, name)| (name.clone(), Uuid::from_u128(i as u128 + 1))).collect();

            let recorder = Recording::new(backend(temp_dir.path()));
            let mut conversion = ConversionContext::new(recorder, &uuids, batch_size(size));
            let stats = conversion.run_to_completion().unwrap().clone();

            let recording = conversion.backend();
            let mut seen: Vec<String> = recording.batches.borrow().iter().flatten().cloned().collect();
            prop_assert!(recording.batches.borrow().iter().all(|batch| batch.len() <= size));
            seen.sort();
            let mut expected = names.clone();
            expected.sort();
            prop_assert_eq!(seen, expected);
            prop_assert_eq!(stats.converted, count);
            prop_assert_eq!(stats.cleanup, Some(CleanupOutcome::Removed));
            prop_assert!(!legacy.exists());

            let chests = temp_dir.path().join("chests/world");
            prop_assert_eq!(file_names(&chests).len(), count);
            for (name, uuid) in &uuids {
                let content = fs::read(chests.join(format!("{}.dat", uuid.hyphenated()))).unwrap();
                prop_assert_eq!(content, format!("{name}.dat").into_bytes());
            }
        }
    }
}
