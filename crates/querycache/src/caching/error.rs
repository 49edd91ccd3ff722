use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// An error raised by the [`Store`](super::Store) registry.
///
/// None of these errors are retryable: they signal a usage error in the calling code.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key is already registered in this store.
    #[error("the key `{0}` is already in use in this store, keys must be unique")]
    KeyCollision(String),
    /// The key was never registered in this store.
    #[error("the key `{0}` does not exist in this store")]
    UnknownKey(String),
    /// The key was registered with different parameter or result types than requested.
    #[error("the key `{key}` was registered with different parameter or result types")]
    TypeMismatch { key: String },
    /// The parameter could not be canonicalized into a cache key.
    #[error("failed to canonicalize parameter")]
    Parameter(#[from] serde_json::Error),
}

/// An error returned by [`Query::get_result`](super::Query::get_result).
#[derive(Debug)]
pub enum QueryError<E> {
    /// The resolver failed.
    ///
    /// The error is shared between all callers that awaited the same resolution.
    Resolver(Arc<E>),
    /// The current body could not be canonicalized into a cache key.
    Parameter(serde_json::Error),
    /// The resolution task terminated without producing a result.
    ///
    /// This only happens if the resolver panics.
    Interrupted,
}

impl<E> QueryError<E> {
    /// Returns the resolver error, if this is one.
    pub fn resolver_error(&self) -> Option<&E> {
        match self {
            QueryError::Resolver(err) => Some(err),
            _ => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for QueryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Resolver(err) => write!(f, "resolver failed: {err}"),
            QueryError::Parameter(_) => write!(f, "failed to canonicalize parameter"),
            QueryError::Interrupted => write!(f, "resolution was interrupted"),
        }
    }
}

impl<E> std::error::Error for QueryError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueryError::Resolver(err) => Some(err.as_ref()),
            QueryError::Parameter(err) => Some(err),
            QueryError::Interrupted => None,
        }
    }
}
