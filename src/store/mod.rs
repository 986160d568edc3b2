//! Version store abstraction
//!
//! Two traits split the work:
//!
//! - [`ConditionalStorage`] is what each backend adapter implements: read
//!   the current text plus a precondition token, and write only if that
//!   token still holds. Adapters translate their own failures into
//!   [`StorageError`].
//! - [`VersionStore`] is the surface callers use (`check`, `bump`, `set`).
//!   [`CasStore`] implements it once, for any storage, with a bounded
//!   compare-and-set loop.
//!
//! ```rust
//! # use semver_store::store::{CasStore, MemoryStorage, VersionStore, DEFAULT_MAX_ATTEMPTS};
//! # use semver_store::{BumpSpec, SemanticVersion};
//! # fn example() -> semver_store::Result<()> {
//! let store = CasStore::new(MemoryStorage::new(), SemanticVersion::new(1, 0, 0), DEFAULT_MAX_ATTEMPTS)?;
//! let next = store.bump(&BumpSpec::Patch)?;
//! assert_eq!(next.to_string(), "1.0.1");
//! # Ok(())
//! # }
//! ```

pub mod cas;
pub mod gcs;
pub mod git;
mod http;
pub mod memory;
pub mod s3;
pub mod sigv4;

pub use cas::CasStore;
pub use gcs::GcsStorage;
pub use git::{GitAuth, GitStorage, GitUser};
pub use memory::MemoryStorage;
pub use s3::S3Storage;
pub use sigv4::S3Credentials;

use std::sync::Arc;

use crate::domain::{BumpSpec, SemanticVersion};
use crate::error::{Result, StorageError};

/// Attempts a mutating operation makes before reporting exhaustion
pub const DEFAULT_MAX_ATTEMPTS: u32 = 12;

/// What a conditional write requires of the stored state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// Nothing exists yet; the write must create it and fail if someone else did first
    Absent,
    /// The opaque token observed by the read (entity tag, generation or commit id)
    Matches(String),
}

/// Result of a storage read.
///
/// `version` can be `None` while the precondition is `Matches`: a git
/// branch may exist without the version file in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub version: Option<SemanticVersion>,
    pub precondition: Precondition,
}

impl Snapshot {
    /// Snapshot of a location that has never been written
    pub fn absent() -> Self {
        Snapshot {
            version: None,
            precondition: Precondition::Absent,
        }
    }

    pub fn present(version: SemanticVersion, token: impl Into<String>) -> Self {
        Snapshot {
            version: Some(version),
            precondition: Precondition::Matches(token.into()),
        }
    }
}

/// Read-with-token / write-if-token-matches over one storage medium.
///
/// ## Thread Safety
///
/// Implementors must be `Send + Sync` and must not keep per-call state
/// between `read` and `write_if`: concurrent callers each run their own
/// loop against the same handle.
///
/// ## Error Handling
///
/// Backend-specific failures are mapped at this boundary:
/// unavailability to [`StorageError::Transient`], a stale token to
/// [`StorageError::Conflict`], unparsable stored text to
/// [`StorageError::Corrupt`] and everything else to [`StorageError::Backend`].
/// A missing resource is not an error: `read` returns [`Snapshot::absent`].
pub trait ConditionalStorage: Send + Sync {
    /// Human-readable location for error messages, free of credentials
    fn location(&self) -> String;

    /// Read the current version and the token needed to replace it
    fn read(&self) -> std::result::Result<Snapshot, StorageError>;

    /// Store `version` only if the stored state still satisfies `expected`.
    ///
    /// Returns [`StorageError::Conflict`] when it does not.
    fn write_if(
        &self,
        version: &SemanticVersion,
        expected: &Precondition,
    ) -> std::result::Result<(), StorageError>;
}

impl<S: ConditionalStorage + ?Sized> ConditionalStorage for Arc<S> {
    fn location(&self) -> String {
        (**self).location()
    }

    fn read(&self) -> std::result::Result<Snapshot, StorageError> {
        (**self).read()
    }

    fn write_if(
        &self,
        version: &SemanticVersion,
        expected: &Precondition,
    ) -> std::result::Result<(), StorageError> {
        (**self).write_if(version, expected)
    }
}

/// The three operations a pipeline needs from a shared version
pub trait VersionStore: Send + Sync {
    /// Versions newer than `since`.
    ///
    /// Without `since`, the current version (or the initial version when
    /// nothing is stored yet). With `since`, the stored version if it is
    /// strictly greater, otherwise nothing. Never writes.
    fn check(&self, since: Option<&SemanticVersion>) -> Result<Vec<SemanticVersion>>;

    /// Atomically replace the stored version with its bumped successor and return it
    fn bump(&self, bump: &BumpSpec) -> Result<SemanticVersion>;

    /// Atomically store `version`, whatever the current value is
    fn set(&self, version: &SemanticVersion) -> Result<()>;
}
