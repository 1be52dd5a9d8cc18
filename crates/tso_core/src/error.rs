//! Error types for the object store.

use crate::types::TransactionId;
use thiserror::Error;
use tso_dataspace::{DataSpaceError, ObjectId};

/// Result type for object store operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in object store operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The object has no header or no payload.
    #[error("object not found: {id}")]
    ObjectNotFound {
        /// The requested object id.
        id: ObjectId,
    },

    /// An older transaction needed an object this one held.
    ///
    /// The transaction has already been aborted when this is returned. Do
    /// not commit or abort it again; redo the work in a new transaction.
    #[error("transaction {txn} was preempted by an older transaction")]
    Preempted {
        /// The preempted transaction.
        txn: TransactionId,
    },

    /// The transaction ran past its deadline, or an object it held was taken
    /// over after its deadline passed.
    ///
    /// Like `Preempted`, the transaction has already been aborted.
    #[error("transaction {txn} ran past its deadline")]
    TimedOut {
        /// The timed out transaction.
        txn: TransactionId,
    },

    /// The name is already bound to another object.
    #[error("name already bound: {name}")]
    NameAlreadyBound {
        /// The conflicting name.
        name: String,
    },

    /// A locked object was requested as a different type than it was cached as.
    #[error("object {id} is not a {expected}")]
    TypeMismatch {
        /// The object id.
        id: ObjectId,
        /// The requested type.
        expected: &'static str,
    },

    /// Payload or header encoding failed.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// The data space failed.
    #[error("data space error: {0}")]
    DataSpace(DataSpaceError),

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if the transaction was preempted and the work should be
    /// retried in a new transaction.
    #[must_use]
    pub fn is_preempted(&self) -> bool {
        matches!(self, Self::Preempted { .. })
    }

    /// Returns true if the transaction ran out of time.
    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// Returns true if the transaction was aborted by contention or timeout
    /// and the same work can be retried in a new transaction.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.is_preempted() || self.is_timed_out()
    }

    /// Returns true if the object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ObjectNotFound { .. })
    }
}

impl From<DataSpaceError> for CoreError {
    fn from(err: DataSpaceError) -> Self {
        match err {
            DataSpaceError::NotFound { id } => Self::ObjectNotFound { id },
            DataSpaceError::InvalidId => Self::ObjectNotFound {
                id: ObjectId::INVALID,
            },
            DataSpaceError::NameAlreadyBound { name } => Self::NameAlreadyBound { name },
            other => Self::DataSpace(other),
        }
    }
}
