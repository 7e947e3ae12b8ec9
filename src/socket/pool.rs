//! Connection pool contract.
//!
//! The executor never manages pool capacity or connection health. It only
//! leases a connection, drives one exchange on it, and hands it back exactly
//! once. Whether the returned connection is reused is the pool's decision,
//! based on [`Connection::is_open`].

use crate::base::neterror::NetError;
use crate::socket::connection::Connection;
use futures::future::BoxFuture;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Boxed error type used for opaque collaborator failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A source of leased connections.
pub trait ConnectionPool: Send + Sync + 'static {
    /// Lease a connection. Resolves once a connection is available, or fails
    /// with the reason the pool could not provide one.
    fn acquire(&self) -> BoxFuture<'static, Result<Connection, AcquireError>>;

    /// Return a leased connection. Called exactly once per successful
    /// acquire, whether or not the connection is still open.
    fn release(&self, connection: Connection);
}

/// Why a pool could not provide a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireErrorKind {
    /// The acquire waited longer than the pool's acquire timeout.
    AcquireTimeout,
    /// Too many acquire attempts were already queued.
    TooManyPendingAcquires,
    /// Some timeout elapsed; the message says which one.
    Timeout,
    /// The pool was in a state that could not serve the request; the
    /// message says why.
    IllegalState,
    /// The pool has been shut down.
    Closed,
    /// A new connection could not be established.
    Connect,
    Other,
}

impl fmt::Display for AcquireErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AcquireErrorKind::AcquireTimeout => "acquire timeout",
            AcquireErrorKind::TooManyPendingAcquires => "too many pending acquires",
            AcquireErrorKind::Timeout => "timeout",
            AcquireErrorKind::IllegalState => "illegal state",
            AcquireErrorKind::Closed => "closed",
            AcquireErrorKind::Connect => "connect",
            AcquireErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Failure reported by [`ConnectionPool::acquire`].
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AcquireError {
    kind: AcquireErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl AcquireError {
    pub fn new(kind: AcquireErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// The pool's acquire timeout elapsed before a connection was free.
    pub fn acquire_timeout(waited: Duration) -> Self {
        Self::new(
            AcquireErrorKind::AcquireTimeout,
            format!(
                "Acquire operation took longer than {} milliseconds.",
                waited.as_millis()
            ),
        )
    }

    /// The pool refused to queue another acquire.
    pub fn too_many_pending(max_pending: usize) -> Self {
        Self::new(
            AcquireErrorKind::TooManyPendingAcquires,
            format!("Too many outstanding acquire operations (max {})", max_pending),
        )
    }

    /// Establishing a fresh connection failed.
    pub fn connect(error: NetError) -> Self {
        Self::new(AcquireErrorKind::Connect, format!("Failed to connect: {}", error))
            .with_source(error)
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> AcquireErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_acquire_timeout_message() {
        let err = AcquireError::acquire_timeout(Duration::from_secs(10));
        assert_eq!(err.kind(), AcquireErrorKind::AcquireTimeout);
        assert!(err.message().contains("Acquire operation took longer"));
        assert!(err.message().contains("10000"));
    }

    #[test]
    fn test_too_many_pending_message() {
        let err = AcquireError::too_many_pending(10_000);
        assert_eq!(err.kind(), AcquireErrorKind::TooManyPendingAcquires);
        assert!(err.to_string().contains("Too many outstanding acquire operations"));
    }

    #[test]
    fn test_connect_keeps_source() {
        let err = AcquireError::connect(NetError::ConnectionRefused);
        assert_eq!(err.kind(), AcquireErrorKind::Connect);
        let source = err.source().expect("source");
        assert_eq!(source.to_string(), NetError::ConnectionRefused.to_string());
    }
}
