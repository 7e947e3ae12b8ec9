//! Leased connection and the transport it wraps.
//!
//! The transport is the wire codec: it accepts logical outbound frames and
//! yields logical inbound frames. Everything below that (sockets, TLS, frame
//! encoding) belongs to the transport implementation, not to this crate.

use crate::base::neterror::NetError;
use crate::http::frame::{Inbound, Outbound, StreamId};
use futures::{Sink, SinkExt, Stream};
use std::fmt;
use std::pin::Pin;

/// A framed, bidirectional transport.
///
/// - Writing a frame is `poll_ready` + `start_send`; the write is complete
///   once `poll_flush` returns ready.
/// - Inbound frames are only read while the stream is polled, so not polling
///   it is how automatic reads are disabled.
/// - `poll_close` closes the connection.
pub trait Transport:
    Sink<Outbound, Error = NetError> + Stream<Item = Result<Inbound, NetError>> + Send + 'static
{
}

impl<T> Transport for T where
    T: Sink<Outbound, Error = NetError> + Stream<Item = Result<Inbound, NetError>> + Send + 'static
{
}

/// Identity of a pooled connection, assigned by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        ConnectionId(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A connection as handed out by a [`ConnectionPool`](crate::socket::pool::ConnectionPool).
pub struct Connection {
    id: ConnectionId,
    protocol: String,
    transport: Pin<Box<dyn Transport>>,
    open: bool,
    next_stream_id: u32,
}

impl Connection {
    /// Wrap a transport whose protocol has already been negotiated.
    ///
    /// `protocol` is the negotiated ALPN id (`"http/1.1"`, `"h2"`); any other
    /// value is accepted here and rejected when the pipeline is configured.
    pub fn new<T: Transport>(id: ConnectionId, protocol: impl Into<String>, transport: T) -> Self {
        Self {
            id,
            protocol: protocol.into(),
            transport: Box::pin(transport),
            open: true,
            next_stream_id: 1,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The protocol negotiated when the connection was established.
    pub fn negotiated_protocol(&self) -> &str {
        &self.protocol
    }

    /// False once the connection has been closed. Pools must not reuse a
    /// closed connection.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Allocate the next client-initiated stream id (odd, increasing).
    pub(crate) fn next_stream_id(&mut self) -> StreamId {
        let id = self.next_stream_id;
        self.next_stream_id = self.next_stream_id.saturating_add(2);
        StreamId::new(id)
    }

    pub(crate) fn transport(&mut self) -> Pin<&mut dyn Transport> {
        self.transport.as_mut()
    }

    /// Close the transport. The connection counts as closed even if the
    /// transport reports an error while closing.
    pub async fn close(&mut self) -> Result<(), NetError> {
        self.open = false;
        self.transport.close().await
    }

    /// Mark the connection unusable without touching the transport.
    pub(crate) fn mark_closed(&mut self) {
        self.open = false;
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("protocol", &self.protocol)
            .field("open", &self.open)
            .finish()
    }
}
