//! Error types for data space operations.

use crate::ObjectId;
use thiserror::Error;

/// Result type for data space operations.
pub type DataSpaceResult<T> = Result<T, DataSpaceError>;

/// Errors that can occur during data space operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DataSpaceError {
    /// The object does not exist (never created, destroyed, or not yet committed).
    #[error("object not found: {id}")]
    NotFound {
        /// The requested object id.
        id: ObjectId,
    },

    /// The name is already bound to another object.
    #[error("name already bound: {name}")]
    NameAlreadyBound {
        /// The conflicting name.
        name: String,
    },

    /// The reserved invalid id was passed to an operation.
    #[error("invalid object id")]
    InvalidId,
}

impl DataSpaceError {
    /// Creates a not found error.
    pub fn not_found(id: ObjectId) -> Self {
        Self::NotFound { id }
    }

    /// Creates a name already bound error.
    pub fn name_already_bound(name: impl Into<String>) -> Self {
        Self::NameAlreadyBound { name: name.into() }
    }

    /// Returns true if this is a [`DataSpaceError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::InvalidId)
    }
}
