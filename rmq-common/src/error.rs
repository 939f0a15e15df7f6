//! # Backend Errors
//!
//! The error signal every backend reports for a single call. The facade
//! only cares about one distinction: expected absence (`Nil`) versus
//! everything else.

use std::error::Error as StdError;

use thiserror::Error;

/// Result type for a single backend call.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors surfaced by a backend primitive.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The store answered with a nil reply: the key or entry does not exist.
    #[error("nil")]
    Nil,
    /// The key exists but holds another kind of value.
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
    /// Any error raised by the store client, its transport, or its pool.
    #[error("{0}")]
    Client(#[source] Box<dyn StdError + Send + Sync>),
}

impl BackendError {
    /// Wraps a client-side error (transport, protocol, server reply, pool).
    pub fn client<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        BackendError::Client(err.into())
    }

    /// Returns true for expected absence.
    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, BackendError::Nil)
    }
}
