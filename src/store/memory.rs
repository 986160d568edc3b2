use std::sync::{Mutex, MutexGuard};

use crate::domain::SemanticVersion;
use crate::error::StorageError;
use crate::store::{ConditionalStorage, Precondition, Snapshot};

/// In-process storage guarded by a mutex, with a generation counter as token.
///
/// Useful for tests and dry runs; it behaves like the generation-numbered
/// object store, including create-only-if-absent on the first write.
pub struct MemoryStorage {
    state: Mutex<Option<Stored>>,
}

#[derive(Debug, Clone)]
struct Stored {
    content: String,
    generation: u64,
}

impl MemoryStorage {
    /// Create an empty storage
    pub fn new() -> Self {
        MemoryStorage {
            state: Mutex::new(None),
        }
    }

    /// Create a storage that already holds `content` (not validated)
    pub fn with_content(content: impl Into<String>) -> Self {
        MemoryStorage {
            state: Mutex::new(Some(Stored {
                content: content.into(),
                generation: 1,
            })),
        }
    }

    /// Raw stored text, if any
    pub fn content(&self) -> Option<String> {
        self.lock().as_ref().map(|stored| stored.content.clone())
    }

    /// Number of successful writes, counting a seeded value as one
    pub fn generation(&self) -> u64 {
        self.lock().as_ref().map_or(0, |stored| stored.generation)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Stored>> {
        // A panicking writer never leaves a half-updated value behind.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionalStorage for MemoryStorage {
    fn location(&self) -> String {
        "memory".to_string()
    }

    fn read(&self) -> Result<Snapshot, StorageError> {
        let Some(stored) = self.lock().clone() else {
            return Ok(Snapshot::absent());
        };

        let version =
            SemanticVersion::parse(&stored.content).map_err(|source| StorageError::Corrupt {
                content: stored.content.clone(),
                source,
            })?;

        Ok(Snapshot::present(version, stored.generation.to_string()))
    }

    fn write_if(&self, version: &SemanticVersion, expected: &Precondition) -> Result<(), StorageError> {
        let mut state = self.lock();

        let next_generation = match (expected, state.as_ref()) {
            (Precondition::Absent, None) => 1,
            (Precondition::Matches(token), Some(stored))
                if stored.generation.to_string() == *token =>
            {
                stored.generation + 1
            }
            _ => return Err(StorageError::Conflict),
        };

        *state = Some(Stored {
            content: version.to_string(),
            generation: next_generation,
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_empty() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.read().unwrap(), Snapshot::absent());
        assert_eq!(storage.generation(), 0);
    }

    #[test]
    fn test_create_only_if_absent() {
        let storage = MemoryStorage::new();
        let v = SemanticVersion::new(0, 0, 1);

        storage.write_if(&v, &Precondition::Absent).unwrap();
        assert!(matches!(
            storage.write_if(&v, &Precondition::Absent),
            Err(StorageError::Conflict)
        ));
        assert_eq!(storage.content().as_deref(), Some("0.0.1"));
    }

    #[test]
    fn test_stale_token_rejected() {
        let storage = MemoryStorage::with_content("1.0.0");
        let snapshot = storage.read().unwrap();

        storage
            .write_if(&SemanticVersion::new(1, 0, 1), &snapshot.precondition)
            .unwrap();

        let stale = storage.write_if(&SemanticVersion::new(1, 0, 2), &snapshot.precondition);
        assert!(matches!(stale, Err(StorageError::Conflict)));
        assert_eq!(storage.content().as_deref(), Some("1.0.1"));
        assert_eq!(storage.generation(), 2);
    }

    #[test]
    fn test_corrupt_content() {
        let storage = MemoryStorage::with_content("not-a-version");
        assert!(matches!(storage.read(), Err(StorageError::Corrupt { .. })));
    }
}
