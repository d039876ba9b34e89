//! Error types for the handle pool

use std::time::Duration;
use thiserror::Error;

/// Errors returned by pool operations.
///
/// Generic over the factory's error type so creation and close failures
/// carry the underlying cause.
#[derive(Error, Debug)]
pub enum PoolError<E>
where
    E: std::error::Error + 'static,
{
    /// Configuration rejected at construction time. The pool was never built.
    #[error("invalid pool configuration: {0}")]
    Config(String),

    /// The factory failed to create a handle. During construction this is
    /// fatal; during lazy growth it is local to the calling acquire and the
    /// pool stays usable.
    #[error("failed to create a new handle")]
    Create(#[source] E),

    /// Closing a handle failed while draining the pool. The first such error
    /// is reported; remaining handles are still closed.
    #[error("failed to close a handle")]
    Close(#[source] E),

    /// The pool has been closed; no further handles will be handed out.
    #[error("pool is closed")]
    Closed,

    /// No handle became available within the acquire timeout.
    #[error("timed out after {0:?} waiting for a handle")]
    Timeout(Duration),
}

pub type PoolResult<T, E> = Result<T, PoolError<E>>;
