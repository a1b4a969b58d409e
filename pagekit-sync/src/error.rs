//! Error types for repositories and the synchronizer.

use pagekit_core::BuilderError;
use thiserror::Error;

/// Result type for repository calls.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors a repository call can report.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The configured base URL is invalid.
    #[error("invalid repository URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed (connection, timeout, etc.).
    #[error("repository HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// A payload could not be encoded or decoded.
    #[error("failed to parse repository payload: {0}")]
    Json(#[from] serde_json::Error),
    /// The authority refused the request.
    #[error("repository rejected request ({status}): {reason}")]
    Rejected {
        /// HTTP status (or the in-memory equivalent).
        status: u16,
        /// Body or message explaining the refusal.
        reason: String,
    },
    /// The addressed record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl RepositoryError {
    /// Returns true for transient failures worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Errors surfaced by [`ElementStore`](crate::ElementStore).
#[derive(Debug, Error)]
pub enum SyncError {
    /// The command was rejected locally; nothing was published.
    #[error(transparent)]
    Mutation(#[from] BuilderError),
    /// The authority refused the command; the local change was rolled back.
    #[error("remote rejected {command}: {reason}")]
    RemoteRejected {
        /// Command name.
        command: &'static str,
        /// Reason reported by the repository.
        reason: String,
    },
    /// Loading from the repository failed.
    #[error("failed to load elements: {0}")]
    Load(#[from] RepositoryError),
    /// The confirmation task could not run to completion.
    #[error("confirmation task failed: {0}")]
    TaskFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_is_retryable() {
        let rejected = RepositoryError::Rejected {
            status: 422,
            reason: "bad".into(),
        };
        assert!(!rejected.is_retryable());

        let unavailable = RepositoryError::Rejected {
            status: 503,
            reason: "down".into(),
        };
        assert!(unavailable.is_retryable());

        assert!(!RepositoryError::NotFound("x".into()).is_retryable());
        assert!(!RepositoryError::InvalidUrl("bad url".into()).is_retryable());
    }

    #[test]
    fn test_mutation_error_is_transparent() {
        let err = SyncError::from(BuilderError::ElementNotFound("a".into()));
        assert_eq!(err.to_string(), "Element not found: a");
    }
}
