//! Core error types.

use thiserror::Error;

/// A submitted body did not match the schema of its event kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The body was not a JSON object.
    #[error("request body must be a JSON object")]
    NotAnObject,

    /// A required field was absent or null.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// A field was present with the wrong JSON type.
    #[error("field `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
}

/// Persistence failures.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying sled error.
    #[error("storage error: {0}")]
    Sled(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Key decoding error.
    #[error("invalid key format")]
    InvalidKey,

    /// The identity space of a partition is exhausted.
    #[error("identity space exhausted")]
    IdExhausted,

    /// Failure reported by a non-sled backend.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// A single subscriber could not accept a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The subscriber's session has gone away.
    #[error("subscriber channel closed")]
    Closed,

    /// The subscriber's queue is full.
    #[error("subscriber lagging, queue full")]
    Lagged,
}

/// Why a submission was not accepted.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Rejected before persistence.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Persistence failed; nothing was broadcast.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
