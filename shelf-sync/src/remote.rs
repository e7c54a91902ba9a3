//! Contract between the orchestrator and a source-hosting service.
//!
//! The orchestrator only ever talks to [`RemoteRepository`]; the GitHub
//! client lives in its own crate and [`crate::memory::MemoryRemote`] backs
//! the tests.

use std::time::Duration;

use thiserror::Error;

use shelf_core::{FailureKind, RepoPath};

/// Failure of a single remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The remote identifier moved since it was read, or a create hit an
    /// existing file. Never retried.
    #[error("remote content changed underneath us: {0}")]
    Conflict(String),

    /// The remote asked us to slow down.
    #[error("rate limited by remote")]
    RateLimited { retry_after: Option<Duration> },

    /// Credential missing, expired, or lacking scope.
    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection-level failure (DNS, TLS, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// Repository or branch does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success response.
    #[error("remote API error {status}: {message}")]
    Api { status: u16, message: String },
}

impl RemoteError {
    /// Rate limits, timeouts, and transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteError::RateLimited { .. } | RemoteError::Timeout(_) | RemoteError::Transport(_)
        )
    }

    /// Server-provided wait hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RemoteError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            RemoteError::Conflict(_) => FailureKind::Conflict,
            RemoteError::RateLimited { .. } => FailureKind::RateLimited,
            RemoteError::Auth(_) => FailureKind::Auth,
            RemoteError::Timeout(_) => FailureKind::Timeout,
            RemoteError::Transport(_) => FailureKind::Transport,
            RemoteError::NotFound(_) => FailureKind::NotFound,
            RemoteError::Api { .. } => FailureKind::Api,
        }
    }
}

/// The three operations a sync run needs from a hosting service.
pub trait RemoteRepository {
    /// Create the repository if it is absent. Returns `true` when it was created.
    ///
    /// Idempotent: an existing repository is left untouched.
    fn ensure_repository(&self) -> Result<bool, RemoteError>;

    /// Current content identifier of `path`, or `None` when the file does not exist.
    fn current_hash(&self, path: &RepoPath) -> Result<Option<String>, RemoteError>;

    /// Create (`previous == None`) or conditionally update `path`.
    ///
    /// An update fails with [`RemoteError::Conflict`] when the remote identifier
    /// no longer equals `previous`. Returns the new identifier.
    fn put_file(
        &self,
        path: &RepoPath,
        content: &[u8],
        previous: Option<&str>,
        message: &str,
    ) -> Result<String, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(RemoteError::RateLimited { retry_after: None }.is_retryable());
        assert!(RemoteError::Timeout("read".into()).is_retryable());
        assert!(RemoteError::Transport("reset".into()).is_retryable());
        assert!(!RemoteError::Conflict("sha".into()).is_retryable());
        assert!(!RemoteError::Auth("401".into()).is_retryable());
        assert!(!RemoteError::Api {
            status: 500,
            message: "boom".into()
        }
        .is_retryable());
    }

    #[test]
    fn retry_after_only_for_rate_limits() {
        let hint = Duration::from_secs(7);
        assert_eq!(
            RemoteError::RateLimited {
                retry_after: Some(hint)
            }
            .retry_after(),
            Some(hint)
        );
        assert_eq!(RemoteError::Timeout("x".into()).retry_after(), None);
    }

    #[test]
    fn kinds_map_to_summary_categories() {
        assert_eq!(RemoteError::Conflict("x".into()).kind(), FailureKind::Conflict);
        assert_eq!(RemoteError::Auth("x".into()).kind(), FailureKind::Auth);
        assert_eq!(
            RemoteError::NotFound("branch".into()).kind(),
            FailureKind::NotFound
        );
    }
}
