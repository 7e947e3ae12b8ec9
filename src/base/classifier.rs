//! Failure classification.
//!
//! Every point where an execution can fail passes its raw [`Failure`] through
//! [`classify`]. The result is what the caller and the response handler see.
//! The raw failure is kept as the classified error's `source()`.

use crate::base::failure::Failure;
use crate::socket::pool::{AcquireError, AcquireErrorKind};
use thiserror::Error;

const ACQUIRE_TIMEOUT_MARKER: &str = "Acquire operation took longer";
const TOO_MANY_PENDING_MARKER: &str = "Too many outstanding acquire operations";

const ACQUIRE_TIMEOUT_GUIDANCE: &str = "Acquire operation took longer than the configured maximum time. \
This indicates that a request cannot get a connection from the pool within the specified maximum time. \
This can be due to high request rate.\n\
Consider taking any of the following actions to mitigate the issue: increase max connections, \
increase acquire timeout, or slowing the request rate.\n\
Increasing the max connections can increase client throughput (unless the network interface is already \
fully utilized), but can eventually start to hit operation system limitations on the number of file \
descriptors used by the process. If you already are fully utilizing your network interface or cannot \
further increase your connection count, increasing the acquire timeout gives extra time for requests to \
acquire a connection before timing out. If the connections doesn't free up, the subsequent requests \
will still timeout.\n\
If the above mechanisms are not able to fix the issue, try smoothing out your requests so that large \
traffic bursts cannot overload the client, being more efficient with the number of times you need to \
call the service, or by increasing the number of hosts sending requests.";

const POOL_SATURATED_GUIDANCE: &str = "Maximum pending connection acquisitions exceeded. \
The request rate is too high for the client to keep up.\n\
Consider taking any of the following actions to mitigate the issue: increase max connections, \
increase max pending acquire count, decrease pool lease timeout, or slowing the request rate.\n\
Increasing the max connections can increase client throughput (unless the network interface is already \
fully utilized), but can eventually start to hit operation system limitations on the number of file \
descriptors used by the process. If you already are fully utilizing your network interface or cannot \
further increase your connection count, increasing the pending acquire count allows extra requests to be \
buffered by the client, but can cause additional request latency and higher memory usage. If your request \
latency or memory usage is already too high, decreasing the lease timeout will allow requests to fail \
more quickly, reducing the number of pending connection acquisitions, but likely won't decrease the total \
number of failed requests.\n\
If the above mechanisms are not able to fix the issue, try smoothing out your requests so that large \
traffic bursts cannot overload the client, being more efficient with the number of times you need to call \
the service, or by increasing the number of hosts sending requests.";

/// Stable category of an [`ExecutionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConnectionAcquireTimeout,
    PoolSaturated,
    WriteTimeout,
    ReadTimeout,
    ProtocolConfiguration,
    Transmission,
    /// Not recognized; the raw failure is passed through unchanged.
    Other,
}

/// Which idle timer produced a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    Write,
    Read,
}

/// The classified error delivered to callers and response handlers.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("{}", ACQUIRE_TIMEOUT_GUIDANCE)]
    ConnectionAcquireTimeout {
        #[source]
        source: Failure,
    },

    #[error("{}", POOL_SATURATED_GUIDANCE)]
    PoolSaturated {
        #[source]
        source: Failure,
    },

    #[error("Write timed out")]
    WriteTimeout {
        #[source]
        source: Failure,
    },

    #[error("Read timed out")]
    ReadTimeout {
        #[source]
        source: Failure,
    },

    #[error("Connection negotiated an unsupported protocol")]
    ProtocolConfiguration {
        #[source]
        source: Failure,
    },

    #[error("Failed to transmit request")]
    Transmission {
        #[source]
        source: Failure,
    },

    #[error(transparent)]
    Other(Failure),
}

impl ExecutionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecutionError::ConnectionAcquireTimeout { .. } => ErrorKind::ConnectionAcquireTimeout,
            ExecutionError::PoolSaturated { .. } => ErrorKind::PoolSaturated,
            ExecutionError::WriteTimeout { .. } => ErrorKind::WriteTimeout,
            ExecutionError::ReadTimeout { .. } => ErrorKind::ReadTimeout,
            ExecutionError::ProtocolConfiguration { .. } => ErrorKind::ProtocolConfiguration,
            ExecutionError::Transmission { .. } => ErrorKind::Transmission,
            ExecutionError::Other(_) => ErrorKind::Other,
        }
    }

    /// The raw failure this error was classified from.
    pub fn cause(&self) -> &Failure {
        match self {
            ExecutionError::ConnectionAcquireTimeout { source }
            | ExecutionError::PoolSaturated { source }
            | ExecutionError::WriteTimeout { source }
            | ExecutionError::ReadTimeout { source }
            | ExecutionError::ProtocolConfiguration { source }
            | ExecutionError::Transmission { source } => source,
            ExecutionError::Other(failure) => failure,
        }
    }

    /// For I/O timeouts, whether the write or the read stalled.
    pub fn timeout_phase(&self) -> Option<TimeoutPhase> {
        match self {
            ExecutionError::WriteTimeout { .. } => Some(TimeoutPhase::Write),
            ExecutionError::ReadTimeout { .. } => Some(TimeoutPhase::Read),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.timeout_phase().is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecutionError::Other(Failure::Cancelled { .. }))
    }
}

impl From<Failure> for ExecutionError {
    fn from(failure: Failure) -> Self {
        classify(failure)
    }
}

/// Map a raw failure to its user-facing category.
pub fn classify(failure: Failure) -> ExecutionError {
    match failure {
        Failure::Acquire(ref err) if is_acquire_timeout(err) => {
            ExecutionError::ConnectionAcquireTimeout { source: failure }
        }
        Failure::Acquire(ref err) if is_too_many_pending(err) => {
            ExecutionError::PoolSaturated { source: failure }
        }
        Failure::Acquire(ref err) => {
            tracing::debug!(
                kind = %err.kind(),
                message = err.message(),
                "unrecognized pool failure passed through unclassified"
            );
            ExecutionError::Other(failure)
        }
        Failure::WriteIdle(_) => ExecutionError::WriteTimeout { source: failure },
        Failure::ReadIdle(_) => ExecutionError::ReadTimeout { source: failure },
        Failure::UnknownProtocol(_) => ExecutionError::ProtocolConfiguration { source: failure },
        Failure::WriteFailed(_) => ExecutionError::Transmission { source: failure },
        other => ExecutionError::Other(other),
    }
}

// Structured kinds first; generic kinds fall back to the pool's message text.
fn is_acquire_timeout(err: &AcquireError) -> bool {
    match err.kind() {
        AcquireErrorKind::AcquireTimeout => true,
        AcquireErrorKind::Timeout => err.message().contains(ACQUIRE_TIMEOUT_MARKER),
        _ => false,
    }
}

fn is_too_many_pending(err: &AcquireError) -> bool {
    match err.kind() {
        AcquireErrorKind::TooManyPendingAcquires => true,
        AcquireErrorKind::IllegalState => err.message().contains(TOO_MANY_PENDING_MARKER),
        _ => false,
    }
}
