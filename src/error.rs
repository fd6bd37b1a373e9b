//! Error types for the materialization cache.

use std::fmt;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why an attempt to expand a descriptor failed.
///
/// This distinction drives the retry/escalation policy in §4.7: source-down
/// failures retry indefinitely (bounded only by the retry ledger's expiry),
/// everything else escalates to `FAILED` once the retry budget is spent.
#[derive(Debug, Clone)]
pub enum ExpansionFailure {
    /// The dataset's underlying source system is unreachable.
    SourceDown(String),
    /// Any other expansion failure (bad plan, validation error, etc).
    Other(String),
}

impl fmt::Display for ExpansionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpansionFailure::SourceDown(msg) => write!(f, "source down: {}", msg),
            ExpansionFailure::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// Failure modes for [`crate::collaborators::MaterializationStore::save`].
#[derive(Debug, Clone)]
pub enum StoreError {
    /// Another writer updated the record between our read and our save.
    ConcurrentModification,
    /// Any other store failure.
    Other(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::ConcurrentModification => write!(f, "concurrent modification"),
            StoreError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// Crate-wide error type.
///
/// Most failures inside `refresh()` are locally recovered per spec.md §7 and
/// never reach this type; it surfaces the handful of non-entry-level
/// failures that a caller needs to see.
#[derive(Debug, Clone)]
pub enum Error {
    /// A blocking read (`get_all`/`update`) exceeded its configured or
    /// fixed timeout while the cache was still uninitialized.
    CacheTimeout(String),

    /// `update()`'s own expansion of the supplied materialization failed.
    Expansion(ExpansionFailure),

    /// A materialization store operation failed in a way that could not be
    /// locally swallowed.
    Store(StoreError),

    /// Acquiring a catalog view for this refresh failed outright.
    Catalog(String),

    /// The provider's own fetch of its current materializations or external
    /// reflections (spec.md §4.3 step 1) failed outright. Distinct from
    /// `Expansion`: this is a non-entry-level failure that aborts the whole
    /// refresh, not a single entry's expansion failure.
    Provider(ExpansionFailure),

    /// Generic error with custom message.
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CacheTimeout(msg) => write!(f, "cache timeout: {}", msg),
            Error::Expansion(e) => write!(f, "expansion failed: {}", e),
            Error::Store(e) => write!(f, "store error: {}", e),
            Error::Catalog(msg) => write!(f, "catalog error: {}", msg),
            Error::Provider(e) => write!(f, "provider fetch failed: {}", e),
            Error::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<ExpansionFailure> for Error {
    fn from(e: ExpansionFailure) -> Self {
        Error::Expansion(e)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Error::Store(e)
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}
