// tests/cas_test.rs
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use semver_store::error::StorageError;
use semver_store::store::{
    CasStore, ConditionalStorage, MemoryStorage, Precondition, Snapshot, VersionStore,
    DEFAULT_MAX_ATTEMPTS,
};
use semver_store::{BumpSpec, Operation, SemanticVersion, StoreError};

fn v(text: &str) -> SemanticVersion {
    SemanticVersion::parse(text).unwrap()
}

// ============================================================================
// Test storages
// ============================================================================

/// Reads succeed, every write is rejected as stale
struct AlwaysConflicting {
    reads: AtomicU32,
    writes: AtomicU32,
}

impl AlwaysConflicting {
    fn new() -> Self {
        AlwaysConflicting {
            reads: AtomicU32::new(0),
            writes: AtomicU32::new(0),
        }
    }
}

impl ConditionalStorage for AlwaysConflicting {
    fn location(&self) -> String {
        "conflicting".to_string()
    }

    fn read(&self) -> Result<Snapshot, StorageError> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(Snapshot::present(SemanticVersion::new(1, 0, 0), n.to_string()))
    }

    fn write_if(&self, _: &SemanticVersion, _: &Precondition) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Conflict)
    }
}

/// Lets another writer slip in between the first read and write
struct RacedOnce {
    inner: MemoryStorage,
    raced: AtomicU32,
}

impl ConditionalStorage for RacedOnce {
    fn location(&self) -> String {
        self.inner.location()
    }

    fn read(&self) -> Result<Snapshot, StorageError> {
        self.inner.read()
    }

    fn write_if(
        &self,
        version: &SemanticVersion,
        expected: &Precondition,
    ) -> Result<(), StorageError> {
        if self.raced.fetch_add(1, Ordering::SeqCst) == 0 {
            let snapshot = self.inner.read()?;
            self.inner
                .write_if(&SemanticVersion::new(5, 0, 0), &snapshot.precondition)?;
        }
        self.inner.write_if(version, expected)
    }
}

// ============================================================================
// Protocol properties
// ============================================================================

#[test]
fn test_concurrent_bumps_lose_no_updates() {
    const WRITERS: usize = 8;

    let storage = Arc::new(MemoryStorage::with_content("1.0.0"));
    let store = Arc::new(CasStore::new(storage.clone(), v("0.0.0"), DEFAULT_MAX_ATTEMPTS).unwrap());
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.bump(&BumpSpec::Patch).unwrap()
            })
        })
        .collect();

    let results: Vec<SemanticVersion> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let distinct: HashSet<_> = results.iter().cloned().collect();
    assert_eq!(distinct.len(), WRITERS, "every bump returns its own version");

    let expected: HashSet<_> = (1..=WRITERS as u64)
        .map(|patch| SemanticVersion::new(1, 0, patch))
        .collect();
    assert_eq!(distinct, expected);

    assert_eq!(storage.content().as_deref(), Some("1.0.8"));
    assert_eq!(store.check(None).unwrap(), vec![v("1.0.8")]);
}

#[test]
fn test_exhaustion_after_exact_attempt_count() {
    for max_attempts in [1, 3, 12] {
        let storage = Arc::new(AlwaysConflicting::new());
        let store = CasStore::new(storage.clone(), v("0.0.0"), max_attempts).unwrap();

        let err = store.bump(&BumpSpec::Patch).unwrap_err();

        match err {
            StoreError::ConcurrencyExhausted {
                operation,
                attempts,
                ref location,
            } => {
                assert_eq!(operation, Operation::Bump);
                assert_eq!(attempts, max_attempts);
                assert_eq!(location, "conflicting");
            }
            ref other => panic!("expected exhaustion, got {:?}", other),
        }
        assert!(err.is_retriable());
        assert_eq!(storage.writes.load(Ordering::SeqCst), max_attempts);
        assert_eq!(storage.reads.load(Ordering::SeqCst), max_attempts);
    }
}

#[test]
fn test_set_exhaustion_reports_set() {
    let store = CasStore::new(AlwaysConflicting::new(), v("0.0.0"), 2).unwrap();
    let err = store.set(&v("9.9.9")).unwrap_err();
    assert_eq!(err.operation(), Some(Operation::Set));
}

#[test]
fn test_bump_recomputes_after_conflict() {
    let storage = RacedOnce {
        inner: MemoryStorage::with_content("1.0.0"),
        raced: AtomicU32::new(0),
    };
    let store = CasStore::new(storage, v("0.0.0"), 3).unwrap();

    // The first attempt computed 1.0.1 from a stale read; the retry must
    // build on the 5.0.0 written in between.
    assert_eq!(store.bump(&BumpSpec::Patch).unwrap(), v("5.0.1"));
}

#[test]
fn test_set_resubmits_same_value_after_conflict() {
    let storage = RacedOnce {
        inner: MemoryStorage::with_content("1.0.0"),
        raced: AtomicU32::new(0),
    };
    let store = CasStore::new(storage, v("0.0.0"), 3).unwrap();

    store.set(&v("2.0.0")).unwrap();
    assert_eq!(store.check(None).unwrap(), vec![v("2.0.0")]);
}

#[test]
fn test_set_twice_is_idempotent() {
    let store = CasStore::new(MemoryStorage::new(), v("0.0.0"), 3).unwrap();

    store.set(&v("2.0.0")).unwrap();
    store.set(&v("2.0.0")).unwrap();

    assert_eq!(store.check(None).unwrap(), vec![v("2.0.0")]);
    assert_eq!(store.check(Some(&v("1.9.9"))).unwrap(), vec![v("2.0.0")]);
    assert!(store.check(Some(&v("2.0.0"))).unwrap().is_empty());
}

#[test]
fn test_absent_store_bootstrap() {
    let store = CasStore::new(MemoryStorage::new(), v("1.0.0"), 3).unwrap();

    assert_eq!(store.check(None).unwrap(), vec![v("1.0.0")]);
    assert!(store.check(Some(&v("0.0.1"))).unwrap().is_empty());
    assert_eq!(store.storage().content(), None, "check never writes");
}

#[test]
fn test_racing_first_writers_create_once() {
    let storage = MemoryStorage::new();

    // Both callers observed an absent record.
    let first = storage.read().unwrap();
    let second = storage.read().unwrap();
    assert_eq!(first.precondition, Precondition::Absent);
    assert_eq!(second.precondition, Precondition::Absent);

    storage.write_if(&v("1.0.1"), &first.precondition).unwrap();
    assert!(matches!(
        storage.write_if(&v("1.0.1"), &second.precondition),
        Err(StorageError::Conflict)
    ));

    // The loser retries against the created record.
    let store = CasStore::new(storage, v("1.0.0"), 3).unwrap();
    assert_eq!(store.bump(&BumpSpec::Patch).unwrap(), v("1.0.2"));
}

#[test]
fn test_concurrent_first_bumps_from_empty() {
    const WRITERS: usize = 4;

    let store = Arc::new(CasStore::new(MemoryStorage::new(), v("1.0.0"), DEFAULT_MAX_ATTEMPTS).unwrap());
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store.bump(&BumpSpec::Patch).unwrap()
            })
        })
        .collect();

    let mut results: Vec<SemanticVersion> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();
    results.sort();

    assert_eq!(results, vec![v("1.0.1"), v("1.0.2"), v("1.0.3"), v("1.0.4")]);
    assert_eq!(store.storage().generation(), WRITERS as u64);
}

#[test]
fn test_store_is_usable_as_trait_object() {
    let store: Box<dyn VersionStore> =
        Box::new(CasStore::new(MemoryStorage::new(), v("0.1.0"), 3).unwrap());

    assert_eq!(store.bump(&BumpSpec::Minor).unwrap(), v("0.2.0"));
    assert_eq!(store.check(Some(&v("0.1.0"))).unwrap(), vec![v("0.2.0")]);
}
