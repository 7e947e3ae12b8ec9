//! Shared test tooling: an in-memory transport, a scripted pool and a
//! recording response handler.

#![allow(dead_code)]

use bytes::Bytes;
use futures::{Sink, Stream};
use http::{response, HeaderMap, StatusCode};
use httpexec::base::classifier::{ErrorKind, ExecutionError};
use httpexec::base::neterror::NetError;
use httpexec::http::frame::{Inbound, Outbound, ResponseEvent};
use httpexec::http::ResponseHandler;
use httpexec::socket::connection::{Connection, ConnectionId};
use httpexec::socket::pool::{AcquireError, AcquireErrorKind, ConnectionPool};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

/// In-memory transport. Frames written by the executor show up on
/// [`MockPeer::written`]; frames sent on [`MockPeer::inbound`] are read back.
pub struct MockTransport {
    outbound: mpsc::UnboundedSender<Outbound>,
    inbound: mpsc::UnboundedReceiver<Result<Inbound, NetError>>,
    write_error: Option<NetError>,
    stalled: bool,
    closed: Arc<AtomicBool>,
}

/// The far end of a [`MockTransport`].
pub struct MockPeer {
    pub written: mpsc::UnboundedReceiver<Outbound>,
    pub inbound: mpsc::UnboundedSender<Result<Inbound, NetError>>,
    closed: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new() -> (Self, MockPeer) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let transport = MockTransport {
            outbound: outbound_tx,
            inbound: inbound_rx,
            write_error: None,
            stalled: false,
            closed: Arc::clone(&closed),
        };
        let peer = MockPeer {
            written: outbound_rx,
            inbound: inbound_tx,
            closed,
        };
        (transport, peer)
    }

    /// Reject every frame with `error`.
    pub fn with_write_error(mut self, error: NetError) -> Self {
        self.write_error = Some(error);
        self
    }

    /// Never become ready to accept a frame.
    pub fn stalled(mut self) -> Self {
        self.stalled = true;
        self
    }

    pub fn into_connection(self, id: u64, protocol: &str) -> Connection {
        Connection::new(ConnectionId::new(id), protocol, self)
    }
}

impl Sink<Outbound> for MockTransport {
    type Error = NetError;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), NetError>> {
        if self.stalled {
            Poll::Pending
        } else {
            Poll::Ready(Ok(()))
        }
    }

    fn start_send(self: Pin<&mut Self>, item: Outbound) -> Result<(), NetError> {
        if let Some(err) = self.write_error {
            return Err(err);
        }
        let _ = self.outbound.send(item);
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), NetError>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), NetError>> {
        self.closed.store(true, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}

impl Stream for MockTransport {
    type Item = Result<Inbound, NetError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inbound.poll_recv(cx)
    }
}

impl MockPeer {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Queue a single-stream response event.
    pub fn respond(&self, event: ResponseEvent) {
        let _ = self.inbound.send(Ok(Inbound::Single(event)));
    }

    /// Queue a complete single-stream response.
    pub fn respond_ok(&self, body: &'static [u8]) {
        self.respond(ResponseEvent::Head(response_head(200)));
        self.respond(ResponseEvent::Data(Bytes::from_static(body)));
        self.respond(ResponseEvent::End);
    }

    /// Everything written so far.
    pub fn drain_written(&mut self) -> Vec<Outbound> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.written.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

pub fn response_head(status: u16) -> response::Parts {
    let (parts, ()) = http::Response::builder()
        .status(status)
        .body(())
        .unwrap()
        .into_parts();
    parts
}

/// What the pool hands out for one acquire.
pub enum Scripted {
    Ready(Connection),
    Fail(AcquireError),
    Deferred(oneshot::Receiver<Connection>),
}

/// A connection handed back to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Released {
    pub id: ConnectionId,
    pub open: bool,
}

/// Pool that serves scripted leases in order and records releases.
pub struct MockPool {
    script: Mutex<VecDeque<Scripted>>,
    releases: mpsc::UnboundedSender<Released>,
}

impl MockPool {
    pub fn new(script: Vec<Scripted>) -> (Arc<Self>, mpsc::UnboundedReceiver<Released>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pool = MockPool {
            script: Mutex::new(script.into()),
            releases: tx,
        };
        (Arc::new(pool), rx)
    }
}

impl ConnectionPool for MockPool {
    fn acquire(&self) -> futures::future::BoxFuture<'static, Result<Connection, AcquireError>> {
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Ready(connection)) => Box::pin(futures::future::ready(Ok(connection))),
            Some(Scripted::Fail(err)) => Box::pin(futures::future::ready(Err(err))),
            Some(Scripted::Deferred(rx)) => Box::pin(async move {
                rx.await
                    .map_err(|_| AcquireError::new(AcquireErrorKind::Closed, "pool shut down"))
            }),
            None => Box::pin(futures::future::ready(Err(AcquireError::new(
                AcquireErrorKind::Other,
                "no connection scripted",
            )))),
        }
    }

    fn release(&self, connection: Connection) {
        let _ = self.releases.send(Released {
            id: connection.id(),
            open: connection.is_open(),
        });
    }
}

/// A response handler callback, as recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Headers(StatusCode),
    Data(Bytes),
    Trailers(usize),
    Complete,
    Error(ErrorKind),
}

#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<Event>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn body(&self) -> Bytes {
        let mut body = Vec::new();
        for event in self.events() {
            if let Event::Data(chunk) = event {
                body.extend_from_slice(&chunk);
            }
        }
        body.into()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl ResponseHandler for RecordingHandler {
    fn on_headers(&self, head: &response::Parts) {
        self.push(Event::Headers(head.status));
    }

    fn on_data(&self, chunk: Bytes) {
        self.push(Event::Data(chunk));
    }

    fn on_trailers(&self, trailers: &HeaderMap) {
        self.push(Event::Trailers(trailers.len()));
    }

    fn on_complete(&self) {
        self.push(Event::Complete);
    }

    fn on_error(&self, error: &ExecutionError) {
        self.push(Event::Error(error.kind()));
    }
}
