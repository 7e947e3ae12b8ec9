//! Per-connection driver.
//!
//! [`Dispatch`] is the processing context of one leased connection. It owns
//! the connection (through a [`Lease`]), the lease's [`LeaseState`], the
//! pipeline, the idle timers and the connection's control queue, and drives
//! them from a single poll loop:
//!
//! 1. control messages (abort) are handled before anything else;
//! 2. the request is written while the transport accepts frames;
//! 3. response frames are read once reads are enabled;
//! 4. the idle timers are polled last, after every install and reset.

use crate::base::executionid::ExecutionId;
use crate::base::failure::Failure;
use crate::base::neterror::NetError;
use crate::http::executor::{fail_execution, ExecutionContext};
use crate::http::frame::ResponseEvent;
use crate::http::future::{Control, Promise};
use crate::http::pipeline::Pipeline;
use crate::http::requestbody::BoxBody;
use crate::http::streaming::RequestFrames;
use crate::http::streamingrequest::StreamingRequest;
use crate::http::timeout::TimeoutSupervisor;
use crate::socket::connection::Connection;
use crate::socket::pool::ConnectionPool;
use futures::{Sink, Stream, StreamExt};
use std::collections::VecDeque;
use std::future::poll_fn;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Attributes of one lease, kept by the driver rather than on the connection.
pub(crate) struct LeaseState {
    execution_id: ExecutionId,
    context: Arc<ExecutionContext>,
    promise: Arc<Promise>,
    response_complete: bool,
}

impl LeaseState {
    pub(crate) fn new(
        execution_id: ExecutionId,
        context: Arc<ExecutionContext>,
        promise: Arc<Promise>,
    ) -> Self {
        Self {
            execution_id,
            context,
            promise,
            response_complete: false,
        }
    }

    /// Returns false if the response was already complete.
    fn mark_response_complete(&mut self) -> bool {
        !std::mem::replace(&mut self.response_complete, true)
    }
}

/// A leased connection that must go back to its pool exactly once.
///
/// Releasing consumes the lease. A lease dropped without being released (a
/// panicking handler, an aborted task) returns the connection as closed.
pub(crate) struct Lease {
    connection: Option<Connection>,
    pool: Arc<dyn ConnectionPool>,
    promise: Arc<Promise>,
}

impl Lease {
    pub(crate) fn new(connection: Connection, pool: Arc<dyn ConnectionPool>, promise: Arc<Promise>) -> Self {
        Self {
            connection: Some(connection),
            pool,
            promise,
        }
    }

    fn connection_mut(&mut self) -> Option<&mut Connection> {
        self.connection.as_mut()
    }

    /// Return the connection as is; the pool may reuse it.
    pub(crate) fn release(mut self) {
        if let Some(connection) = self.connection.take() {
            tracing::trace!(connection = %connection.id(), "releasing connection");
            self.promise.detach_connection();
            self.pool.release(connection);
        }
    }

    /// Close the connection, then return it.
    pub(crate) async fn close_and_release(mut self) {
        if let Some(mut connection) = self.connection.take() {
            tracing::trace!(connection = %connection.id(), "closing and releasing connection");
            if let Err(err) = connection.close().await {
                tracing::debug!(connection = %connection.id(), error = %err, "error while closing connection");
            }
            self.promise.detach_connection();
            self.pool.release(connection);
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            tracing::warn!(connection = %connection.id(), "lease dropped without release, discarding connection");
            connection.mark_closed();
            self.promise.detach_connection();
            self.pool.release(connection);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteState {
    Writing,
    Flushing,
    Done,
}

#[derive(Debug)]
enum Outcome {
    Complete,
    WriteFailed(Failure),
    Failed(Failure),
    Aborted(Failure),
}

/// Drives one exchange on a leased connection.
pub(crate) struct Dispatch {
    lease: Lease,
    state: LeaseState,
    pipeline: Pipeline,
    timers: TimeoutSupervisor,
    control: mpsc::UnboundedReceiver<Control>,
    frames: RequestFrames<BoxBody>,
    write: WriteState,
    reading: bool,
    events: VecDeque<ResponseEvent>,
}

impl Dispatch {
    pub(crate) fn new(
        lease: Lease,
        state: LeaseState,
        pipeline: Pipeline,
        control: mpsc::UnboundedReceiver<Control>,
        request: StreamingRequest<BoxBody>,
    ) -> Self {
        let timers = TimeoutSupervisor::new(state.context.config());
        Self {
            lease,
            state,
            pipeline,
            timers,
            control,
            frames: RequestFrames::new(request),
            write: WriteState::Writing,
            reading: false,
            events: VecDeque::new(),
        }
    }

    fn is_full_duplex(&self) -> bool {
        self.state.context.request().is_full_duplex()
    }

    pub(crate) async fn run(mut self) {
        if self.is_full_duplex() {
            self.resume_reads();
        }

        let outcome = poll_fn(|cx| self.poll_dispatch(cx)).await;
        self.finish(outcome).await;
    }

    fn resume_reads(&mut self) {
        self.timers.install_read();
        self.reading = true;
        tracing::debug!(execution_id = %self.state.execution_id, "reads resumed");
    }

    fn poll_dispatch(&mut self, cx: &mut Context<'_>) -> Poll<Outcome> {
        if let Poll::Ready(Some(Control::Abort(failure))) = self.control.poll_recv(cx) {
            tracing::debug!(execution_id = %self.state.execution_id, "abort received");
            return Poll::Ready(Outcome::Aborted(failure));
        }

        if self.write != WriteState::Done {
            match self.poll_write(cx) {
                Poll::Ready(Ok(())) => {
                    self.write = WriteState::Done;
                    self.timers.remove_write();
                    tracing::debug!(execution_id = %self.state.execution_id, "request written");
                    if !self.reading {
                        self.resume_reads();
                    }
                }
                Poll::Ready(Err(failure)) => return Poll::Ready(Outcome::WriteFailed(failure)),
                Poll::Pending => {}
            }
        }

        if self.reading {
            if let Poll::Ready(outcome) = self.poll_read(cx) {
                return Poll::Ready(outcome);
            }
        }

        match self.timers.poll_expired(cx) {
            Poll::Ready(failure @ Failure::WriteIdle(_)) => Poll::Ready(Outcome::WriteFailed(failure)),
            Poll::Ready(failure) => Poll::Ready(Outcome::Failed(failure)),
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_write(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Failure>> {
        let Some(connection) = self.lease.connection_mut() else {
            return Poll::Ready(Err(Failure::WriteFailed(NetError::SocketNotConnected)));
        };
        let mut transport = connection.transport();

        loop {
            match self.write {
                WriteState::Writing => {
                    match transport.as_mut().poll_ready(cx) {
                        Poll::Ready(Ok(())) => {}
                        Poll::Ready(Err(err)) => return Poll::Ready(Err(Failure::WriteFailed(err))),
                        Poll::Pending => {
                            self.timers.arm_write();
                            return Poll::Pending;
                        }
                    }

                    let frame = match self.frames.poll_next_unpin(cx) {
                        Poll::Ready(Some(Ok(frame))) => frame,
                        Poll::Ready(Some(Err(failure))) => return Poll::Ready(Err(failure)),
                        Poll::Ready(None) => {
                            self.write = WriteState::Flushing;
                            continue;
                        }
                        Poll::Pending => {
                            // Producer has nothing yet; push out what was accepted so far.
                            // Once flushed, nothing is left for the transport to stall on.
                            match transport.as_mut().poll_flush(cx) {
                                Poll::Ready(Ok(())) => self.timers.remove_write(),
                                Poll::Ready(Err(err)) => return Poll::Ready(Err(Failure::WriteFailed(err))),
                                Poll::Pending => self.timers.arm_write(),
                            }
                            return Poll::Pending;
                        }
                    };

                    if let Some(outbound) = self.pipeline.encode(frame) {
                        tracing::trace!(frame = ?outbound, "writing frame");
                        transport
                            .as_mut()
                            .start_send(outbound)
                            .map_err(Failure::WriteFailed)?;
                        self.timers.write_progress();
                    }
                }
                WriteState::Flushing => {
                    return match transport.as_mut().poll_flush(cx) {
                        Poll::Ready(Ok(())) => Poll::Ready(Ok(())),
                        Poll::Ready(Err(err)) => Poll::Ready(Err(Failure::WriteFailed(err))),
                        Poll::Pending => {
                            self.timers.arm_write();
                            Poll::Pending
                        }
                    };
                }
                WriteState::Done => return Poll::Ready(Ok(())),
            }
        }
    }

    fn poll_read(&mut self, cx: &mut Context<'_>) -> Poll<Outcome> {
        loop {
            while let Some(event) = self.events.pop_front() {
                if self.deliver(event) {
                    return Poll::Ready(Outcome::Complete);
                }
            }

            let Some(connection) = self.lease.connection_mut() else {
                return Poll::Ready(Outcome::Failed(NetError::SocketNotConnected.into()));
            };
            match connection.transport().poll_next(cx) {
                Poll::Ready(Some(Ok(frame))) => {
                    tracing::trace!(frame = ?frame, "read frame");
                    if let Err(failure) = self.pipeline.decode(frame, &mut self.events) {
                        return Poll::Ready(Outcome::Failed(failure));
                    }
                    // Frames for other streams are not progress for this exchange.
                    if !self.events.is_empty() {
                        self.timers.read_progress();
                    }
                }
                Poll::Ready(Some(Err(err))) => return Poll::Ready(Outcome::Failed(Failure::Net(err))),
                Poll::Ready(None) => {
                    return Poll::Ready(Outcome::Failed(Failure::Net(NetError::ConnectionClosed)));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }

    /// Hand one response event to the handler. Returns true at the end of
    /// the response.
    fn deliver(&self, event: ResponseEvent) -> bool {
        let handler = self.state.context.handler();
        match event {
            ResponseEvent::Head(head) => {
                tracing::debug!(execution_id = %self.state.execution_id, status = %head.status, "response head");
                handler.on_headers(&head);
            }
            ResponseEvent::Data(chunk) => handler.on_data(chunk),
            ResponseEvent::Trailers(trailers) => handler.on_trailers(&trailers),
            ResponseEvent::End => return true,
        }
        false
    }

    async fn finish(self, outcome: Outcome) {
        let Dispatch {
            lease,
            mut state,
            mut timers,
            write,
            ..
        } = self;
        let context = Arc::clone(&state.context);
        let promise = Arc::clone(&state.promise);
        let uri = &context.request().head().uri;

        match outcome {
            Outcome::Complete => {
                let first = state.mark_response_complete();
                debug_assert!(first, "response completed twice");
                timers.remove_read();
                timers.remove_write();

                if write == WriteState::Done {
                    lease.release();
                } else {
                    tracing::debug!(
                        execution_id = %state.execution_id,
                        "response completed before the request was fully written"
                    );
                    lease.close_and_release().await;
                }
                tracing::debug!(execution_id = %state.execution_id, "response complete");
                context.handler().on_complete();
                promise.complete(Ok(()));
            }
            Outcome::WriteFailed(failure) => {
                lease.close_and_release().await;
                let message = format!("Failed to make request to {}", uri);
                fail_execution(&context, &promise, &message, failure);
            }
            Outcome::Failed(failure) => {
                lease.close_and_release().await;
                let message = format!("Failed to read response from {}", uri);
                fail_execution(&context, &promise, &message, failure);
            }
            Outcome::Aborted(failure) => {
                lease.close_and_release().await;
                let message = format!("Request to {} was aborted", uri);
                fail_execution(&context, &promise, &message, failure);
            }
        }
    }
}
