//! Error types for element-tree operations.

use thiserror::Error;

/// Result type for element-tree operations.
pub type BuilderResult<T> = Result<T, BuilderError>;

/// Errors that can occur while classifying or mutating a forest.
///
/// None of these are fatal: a failed mutation leaves the input forest untouched.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// No element with this id exists anywhere in the forest.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// The requested parent does not exist or is not a container.
    #[error("Parent not found: {0}")]
    ParentNotFound(String),

    /// A reorder was requested for two elements that do not share a parent.
    #[error("Elements {first} and {second} are not siblings")]
    SiblingMismatch {
        /// First element id.
        first: String,
        /// Second element id.
        second: String,
    },

    /// A payload is missing its discriminant or required fields, or carries
    /// fields that do not apply to its kind.
    #[error("Malformed element: {0}")]
    MalformedElement(String),

    /// A persisted blob could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BuilderError {
    /// Whether the error comes from a structural lookup (the caller should
    /// present it as a no-op warning).
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::ElementNotFound(_) | Self::ParentNotFound(_))
    }
}
