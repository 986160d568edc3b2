use tracing::{debug, info, warn};

use crate::domain::{BumpSpec, SemanticVersion};
use crate::error::{Operation, Result, StorageError, StoreError};
use crate::store::{ConditionalStorage, Snapshot, VersionStore};

/// [`VersionStore`] over any [`ConditionalStorage`], using a bounded
/// read-modify-write loop.
///
/// Each attempt reads the current version and its token, computes the
/// desired version from it, and writes conditionally on the token. A
/// rejected write means another writer got in first, so the next attempt
/// starts from a fresh read. Conflicts and transient failures each cost
/// one attempt; after `max_attempts` the last failure is reported.
pub struct CasStore<S> {
    storage: S,
    initial_version: SemanticVersion,
    max_attempts: u32,
}

/// How a failed step affects the loop
enum Step {
    Retry(StorageError),
    Fail(StoreError),
}

impl<S: ConditionalStorage> CasStore<S> {
    /// Wrap `storage`; `initial_version` stands in for the stored value
    /// until the first write.
    pub fn new(storage: S, initial_version: SemanticVersion, max_attempts: u32) -> Result<Self> {
        if max_attempts == 0 {
            return Err(StoreError::config("max_attempts must be at least 1"));
        }

        Ok(CasStore {
            storage,
            initial_version,
            max_attempts,
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn initial_version(&self) -> &SemanticVersion {
        &self.initial_version
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn classify(&self, operation: Operation, location: &str, err: StorageError) -> Step {
        match err {
            StorageError::Conflict | StorageError::Transient(_) => Step::Retry(err),
            other => Step::Fail(StoreError::from_storage(operation, location, other)),
        }
    }

    fn exhausted(&self, operation: Operation, location: String, last: StorageError) -> StoreError {
        match last {
            StorageError::Conflict => StoreError::ConcurrencyExhausted {
                operation,
                location,
                attempts: self.max_attempts,
            },
            other => StoreError::from_storage(operation, &location, other),
        }
    }

    fn read_with_retries(&self, operation: Operation, location: &str) -> Result<Snapshot> {
        let mut last = StorageError::Conflict;

        for attempt in 1..=self.max_attempts {
            match self.storage.read() {
                Ok(snapshot) => return Ok(snapshot),
                Err(err) => match self.classify(operation, location, err) {
                    Step::Retry(err) => {
                        warn!(%location, attempt, error = %err, "read failed, retrying");
                        last = err;
                    }
                    Step::Fail(err) => return Err(err),
                },
            }
        }

        Err(self.exhausted(operation, location.to_string(), last))
    }

    /// The compare-and-set loop shared by `bump` and `set`
    fn mutate<F>(&self, operation: Operation, desired: F) -> Result<SemanticVersion>
    where
        F: Fn(&SemanticVersion) -> Result<SemanticVersion>,
    {
        let location = self.storage.location();
        let mut last = StorageError::Conflict;

        for attempt in 1..=self.max_attempts {
            let snapshot = match self.storage.read() {
                Ok(snapshot) => snapshot,
                Err(err) => match self.classify(operation, &location, err) {
                    Step::Retry(err) => {
                        warn!(%location, attempt, error = %err, "read failed, retrying");
                        last = err;
                        continue;
                    }
                    Step::Fail(err) => return Err(err),
                },
            };

            let current = snapshot
                .version
                .unwrap_or_else(|| self.initial_version.clone());
            let next = desired(&current)?;
            debug!(%location, attempt, %current, %next, "attempting conditional write");

            match self.storage.write_if(&next, &snapshot.precondition) {
                Ok(()) => {
                    info!(%location, %operation, version = %next, attempts = attempt, "stored version");
                    return Ok(next);
                }
                Err(err) => match self.classify(operation, &location, err) {
                    Step::Retry(err) => {
                        warn!(%location, attempt, error = %err, "write rejected, re-reading");
                        last = err;
                    }
                    Step::Fail(err) => return Err(err),
                },
            }
        }

        warn!(%location, %operation, attempts = self.max_attempts, "giving up");
        Err(self.exhausted(operation, location, last))
    }
}

impl<S: ConditionalStorage> VersionStore for CasStore<S> {
    fn check(&self, since: Option<&SemanticVersion>) -> Result<Vec<SemanticVersion>> {
        let location = self.storage.location();
        let snapshot = self.read_with_retries(Operation::Check, &location)?;

        let versions = match (snapshot.version, since) {
            (None, None) => vec![self.initial_version.clone()],
            (None, Some(_)) => Vec::new(),
            (Some(current), None) => vec![current],
            (Some(current), Some(since)) if current > *since => vec![current],
            (Some(_), Some(_)) => Vec::new(),
        };

        Ok(versions)
    }

    fn bump(&self, bump: &BumpSpec) -> Result<SemanticVersion> {
        self.mutate(Operation::Bump, |current| Ok(bump.apply(current)?))
    }

    // The target is fixed, so a conflict only means resubmitting the same
    // value against a fresh token.
    fn set(&self, version: &SemanticVersion) -> Result<()> {
        self.mutate(Operation::Set, |_| Ok(version.clone()))
            .map(|_| ())
    }
}
