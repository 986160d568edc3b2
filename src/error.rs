use std::fmt;

use thiserror::Error;

/// The store operation an error surfaced from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Check,
    Bump,
    Set,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Check => write!(f, "check"),
            Operation::Bump => write!(f, "bump"),
            Operation::Set => write!(f, "set"),
        }
    }
}

/// Malformed version text, bump name or prerelease identifier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid version '{input}': {reason}")]
pub struct ParseError {
    pub input: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(input: impl Into<String>, reason: impl Into<String>) -> Self {
        ParseError {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

/// Failures reported by a storage adapter.
///
/// Every backend translates its own status codes and client errors into
/// this set, so the compare-and-set loop never looks at HTTP statuses or
/// git error classes.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Network or service unavailability; worth another attempt
    #[error("transient failure: {0}")]
    Transient(String),

    /// The write precondition no longer holds
    #[error("precondition rejected")]
    Conflict,

    /// The stored text is not a semantic version
    #[error("stored content '{content}' is not a version: {source}")]
    Corrupt {
        content: String,
        #[source]
        source: ParseError,
    },

    /// Anything permanent: access denied, malformed responses, bad refs
    #[error("{0}")]
    Backend(String),
}

impl StorageError {
    pub fn transient(msg: impl Into<String>) -> Self {
        StorageError::Transient(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        StorageError::Backend(msg.into())
    }
}

/// Unified error type for version store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{operation} failed at {location}: {message}")]
    Transient {
        operation: Operation,
        location: String,
        message: String,
    },

    #[error("{operation} at {location} gave up after {attempts} conflicting attempts; retry later")]
    ConcurrencyExhausted {
        operation: Operation,
        location: String,
        attempts: u32,
    },

    #[error("{operation} at {location} found unparsable content '{content}'")]
    Corrupt {
        operation: Operation,
        location: String,
        content: String,
    },

    #[error("{operation} failed at {location}: {message}")]
    Backend {
        operation: Operation,
        location: String,
        message: String,
    },
}

/// Convenience type alias for Results in semver-store
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        StoreError::Config(msg.into())
    }

    /// Attach operation and location to an adapter failure.
    ///
    /// `Conflict` has no caller-facing form of its own: a conflict that
    /// survives the loop is reported as exhaustion of a single attempt.
    pub fn from_storage(operation: Operation, location: &str, err: StorageError) -> Self {
        let location = location.to_string();
        match err {
            StorageError::Transient(message) => StoreError::Transient {
                operation,
                location,
                message,
            },
            StorageError::Conflict => StoreError::ConcurrencyExhausted {
                operation,
                location,
                attempts: 1,
            },
            StorageError::Corrupt { content, .. } => StoreError::Corrupt {
                operation,
                location,
                content,
            },
            StorageError::Backend(message) => StoreError::Backend {
                operation,
                location,
                message,
            },
        }
    }

    /// Whether calling the same operation again later may succeed
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            StoreError::Transient { .. } | StoreError::ConcurrencyExhausted { .. }
        )
    }

    /// The operation this error came from, when it came from one
    pub fn operation(&self) -> Option<Operation> {
        match self {
            StoreError::Transient { operation, .. }
            | StoreError::ConcurrencyExhausted { operation, .. }
            | StoreError::Corrupt { operation, .. }
            | StoreError::Backend { operation, .. } => Some(*operation),
            StoreError::Parse(_) | StoreError::Config(_) => None,
        }
    }
}
