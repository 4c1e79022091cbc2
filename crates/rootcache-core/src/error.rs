//! Error types for `rootcache`.
//!
//! Absence of a root is never an error: lookups return `Option`. The variants
//! below cover failures of collaborators (reload sources, the task queue) and
//! bugs inside the crate.

use thiserror::Error;

/// Result type alias for `rootcache` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in `rootcache` operations.
///
/// Error codes follow the pattern `RCACHE-XXX`.
#[derive(Error, Debug)]
pub enum Error {
    /// Upstream data temporarily unavailable (RCACHE-001).
    #[error("[RCACHE-001] Reload source unavailable: {0}")]
    SourceUnavailable(String),

    /// A location could not be bound against the cached layout (RCACHE-002).
    #[error("[RCACHE-002] Binding failed: {0}")]
    Binding(String),

    /// The background queue no longer accepts work (RCACHE-003).
    #[error("[RCACHE-003] Task queue is closed")]
    QueueClosed,

    /// Configuration error (RCACHE-004).
    #[error("[RCACHE-004] Configuration error: {0}")]
    Config(String),

    /// IO error (RCACHE-005).
    #[error("[RCACHE-005] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (RCACHE-006).
    ///
    /// Indicates a bug in the cache or one of its collaborators.
    #[error("[RCACHE-006] Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the error code (e.g., "RCACHE-001").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SourceUnavailable(_) => "RCACHE-001",
            Self::Binding(_) => "RCACHE-002",
            Self::QueueClosed => "RCACHE-003",
            Self::Config(_) => "RCACHE-004",
            Self::Io(_) => "RCACHE-005",
            Self::Internal(_) => "RCACHE-006",
        }
    }

    /// Returns true if this error is recoverable.
    ///
    /// Recoverable errors are swallowed at best-effort lookup boundaries;
    /// internal errors always propagate.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}

impl From<crate::config::ConfigError> for Error {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
