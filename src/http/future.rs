//! The execution future and its cancellation path.
//!
//! The caller holds an [`ExecutionFuture`]; the execution task holds the
//! completing side. Both share one small mutex-guarded slot: whoever completes
//! it first wins, and every later completion is a no-op.
//!
//! Cancelling completes the future right away and then hands an abort to the
//! connection driving the exchange. If no connection has been leased yet the
//! abort is parked and delivered the moment one attaches, so a late lease is
//! unwound instead of leaked.

use crate::base::classifier::{classify, ExecutionError};
use crate::base::executionid::ExecutionId;
use crate::base::failure::Failure;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

type Completion = Result<(), ExecutionError>;

/// Message to a connection's driver.
#[derive(Debug)]
pub(crate) enum Control {
    /// Stop the exchange, close the connection and release it.
    Abort(Failure),
}

#[derive(Debug)]
enum ConnectionSlot {
    Unleased,
    Leased(mpsc::UnboundedSender<Control>),
    AbortPending(Failure),
    Released,
}

#[derive(Debug)]
struct Inner {
    sender: Option<oneshot::Sender<Completion>>,
    connection: ConnectionSlot,
}

/// Completing side of an execution.
#[derive(Debug)]
pub(crate) struct Promise {
    execution_id: ExecutionId,
    inner: Mutex<Inner>,
}

impl Promise {
    pub(crate) fn new(execution_id: ExecutionId) -> (Arc<Promise>, oneshot::Receiver<Completion>) {
        let (tx, rx) = oneshot::channel();
        let promise = Promise {
            execution_id,
            inner: Mutex::new(Inner {
                sender: Some(tx),
                connection: ConnectionSlot::Unleased,
            }),
        };
        (Arc::new(promise), rx)
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// Resolve the future. Returns false if it was already resolved.
    pub(crate) fn complete(&self, result: Completion) -> bool {
        let Some(sender) = self.inner().sender.take() else {
            return false;
        };
        // A dropped future just means nobody is waiting for the result.
        let _ = sender.send(result);
        true
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.inner().sender.is_none()
    }

    /// Register the control queue of the leased connection, delivering any
    /// abort that arrived before the lease.
    pub(crate) fn attach_connection(&self, control: mpsc::UnboundedSender<Control>) {
        let mut inner = self.inner();
        let previous = std::mem::replace(&mut inner.connection, ConnectionSlot::Unleased);
        if let ConnectionSlot::AbortPending(failure) = previous {
            tracing::debug!(execution_id = %self.execution_id, "delivering abort parked before lease");
            let _ = control.send(Control::Abort(failure));
        }
        inner.connection = ConnectionSlot::Leased(control);
    }

    /// The connection has been handed back to the pool; later aborts have
    /// nothing to act on.
    pub(crate) fn detach_connection(&self) {
        self.inner().connection = ConnectionSlot::Released;
    }

    fn abort_connection(&self, failure: Failure) {
        let mut inner = self.inner();
        inner.connection = match std::mem::replace(&mut inner.connection, ConnectionSlot::Released) {
            ConnectionSlot::Unleased => ConnectionSlot::AbortPending(failure),
            ConnectionSlot::Leased(control) => {
                if control.send(Control::Abort(failure)).is_err() {
                    tracing::trace!(execution_id = %self.execution_id, "connection driver already finished");
                }
                ConnectionSlot::Leased(control)
            }
            other => {
                tracing::trace!(execution_id = %self.execution_id, "abort ignored");
                other
            }
        };
    }

    fn cancel(&self) -> bool {
        let execution_id = self.execution_id;
        let cancelled = self.complete(Err(classify(Failure::Cancelled { execution_id })));
        if cancelled {
            self.abort_connection(Failure::Cancelled { execution_id });
        }
        cancelled
    }
}

/// Handle that can cancel an execution from anywhere.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    promise: Arc<Promise>,
}

impl AbortHandle {
    /// Cancel the execution. Returns false if it had already finished.
    pub fn cancel(&self) -> bool {
        self.promise.cancel()
    }

    pub fn is_finished(&self) -> bool {
        self.promise.is_complete()
    }
}

/// Result of one request execution.
///
/// Resolves with `Ok(())` once the response has been fully delivered to the
/// response handler, or with the classified error. Dropping the future does
/// not stop the execution; use [`cancel`](Self::cancel) for that.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled; dropping this does not cancel the execution"]
pub struct ExecutionFuture {
    execution_id: ExecutionId,
    promise: Arc<Promise>,
    rx: oneshot::Receiver<Completion>,
}

impl ExecutionFuture {
    pub(crate) fn new(promise: Arc<Promise>, rx: oneshot::Receiver<Completion>) -> Self {
        Self {
            execution_id: promise.execution_id(),
            promise,
            rx,
        }
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// Cancel the execution. Returns false if it had already finished.
    pub fn cancel(&self) -> bool {
        self.promise.cancel()
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            promise: Arc::clone(&self.promise),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.promise.is_complete()
    }
}

impl Future for ExecutionFuture {
    type Output = Completion;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(classify(Failure::Abandoned))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Fails the execution if the task ends without resolving it.
pub(crate) struct CompletionGuard {
    promise: Arc<Promise>,
}

impl CompletionGuard {
    pub(crate) fn new(promise: Arc<Promise>) -> Self {
        Self { promise }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.promise.complete(Err(classify(Failure::Abandoned))) {
            tracing::warn!(
                execution_id = %self.promise.execution_id(),
                "execution ended without a result"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::executionid::EXECUTION_IDS;

    #[tokio::test]
    async fn test_completes_once() {
        let (promise, rx) = Promise::new(EXECUTION_IDS.next());
        let future = ExecutionFuture::new(Arc::clone(&promise), rx);
        assert!(!future.is_finished());
        assert!(promise.complete(Ok(())));
        assert!(!promise.complete(Err(classify(Failure::Abandoned))));
        assert!(future.is_finished());
        assert!(future.await.is_ok());
    }

    #[tokio::test]
    async fn test_cancel_before_lease_parks_abort() {
        let (promise, rx) = Promise::new(EXECUTION_IDS.next());
        let future = ExecutionFuture::new(Arc::clone(&promise), rx);
        let handle = future.abort_handle();
        assert!(handle.cancel());
        assert!(!handle.cancel());

        let (tx, mut control) = mpsc::unbounded_channel();
        promise.attach_connection(tx);
        assert!(matches!(
            control.recv().await,
            Some(Control::Abort(Failure::Cancelled { .. }))
        ));

        let err = future.await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_after_lease_sends_abort() {
        let (promise, rx) = Promise::new(EXECUTION_IDS.next());
        let future = ExecutionFuture::new(Arc::clone(&promise), rx);
        let (tx, mut control) = mpsc::unbounded_channel();
        promise.attach_connection(tx);

        assert!(future.cancel());
        assert!(matches!(control.recv().await, Some(Control::Abort(_))));
    }

    #[tokio::test]
    async fn test_cancel_after_completion_is_noop() {
        let (promise, rx) = Promise::new(EXECUTION_IDS.next());
        let future = ExecutionFuture::new(Arc::clone(&promise), rx);
        let (tx, mut control) = mpsc::unbounded_channel();
        promise.attach_connection(tx);
        promise.complete(Ok(()));

        assert!(!future.cancel());
        drop(promise);
        assert!(control.try_recv().is_err());
        assert!(future.await.is_ok());
    }

    #[tokio::test]
    async fn test_guard_fails_unresolved_execution() {
        let (promise, rx) = Promise::new(EXECUTION_IDS.next());
        let future = ExecutionFuture::new(Arc::clone(&promise), rx);
        drop(CompletionGuard::new(promise));

        let err = future.await.unwrap_err();
        assert!(matches!(err.cause(), Failure::Abandoned));
    }
}
