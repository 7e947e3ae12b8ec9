//! Raw failure signals.
//!
//! A [`Failure`] is what the executor observes at the point something goes
//! wrong, before classification. It is always kept as the cause of the
//! [`ExecutionError`](crate::base::classifier::ExecutionError) the caller sees.

use crate::base::executionid::ExecutionId;
use crate::base::neterror::NetError;
use crate::socket::pool::{AcquireError, BoxError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Failure {
    /// The pool could not provide a connection.
    #[error(transparent)]
    Acquire(#[from] AcquireError),

    /// The write-phase idle timer fired.
    #[error("write made no progress for {0:?}")]
    WriteIdle(Duration),

    /// The read-phase idle timer fired.
    #[error("no response data read for {0:?}")]
    ReadIdle(Duration),

    /// The connection negotiated a protocol no pipeline exists for.
    #[error("Unknown protocol: {0}")]
    UnknownProtocol(String),

    /// The transport rejected a frame while the request was being written.
    #[error("write failed: {0}")]
    WriteFailed(#[source] NetError),

    /// A transport or protocol error outside the write path.
    #[error(transparent)]
    Net(#[from] NetError),

    /// The request body producer failed.
    #[error("request body producer failed: {0}")]
    Body(#[source] BoxError),

    /// The execution future was cancelled by its caller.
    #[error("execution {execution_id} was cancelled")]
    Cancelled { execution_id: ExecutionId },

    /// The execution task ended without resolving its future.
    #[error("execution ended without a result")]
    Abandoned,
}
