//! Buffered response collection.

use crate::base::classifier::ExecutionError;
use crate::http::responsehandler::ResponseHandler;
use bytes::{Bytes, BytesMut};
use http::{response, HeaderMap, StatusCode};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A [`ResponseHandler`] that buffers the whole response in memory.
///
/// Share it with the execution as `Arc<ResponseCollector>`, await the
/// execution future, then read the response back.
#[derive(Debug, Default)]
pub struct ResponseCollector {
    state: Mutex<Collected>,
}

#[derive(Debug, Default)]
struct Collected {
    head: Option<response::Parts>,
    body: BytesMut,
    trailers: Option<HeaderMap>,
    complete: bool,
    failed: bool,
}

impl ResponseCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, Collected> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True once the response has been fully received.
    pub fn is_complete(&self) -> bool {
        self.state().complete
    }

    /// True if the execution failed after the collector was attached.
    pub fn is_failed(&self) -> bool {
        self.state().failed
    }

    /// Status of the received head, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.state().head.as_ref().map(|head| head.status)
    }

    /// The body bytes received so far.
    pub fn body(&self) -> Bytes {
        Bytes::copy_from_slice(&self.state().body)
    }

    /// Trailers, if the response carried any.
    pub fn trailers(&self) -> Option<HeaderMap> {
        self.state().trailers.clone()
    }

    /// Take the complete response. Returns `None` until the response has
    /// completed, and after it has already been taken.
    pub fn take_response(&self) -> Option<http::Response<Bytes>> {
        let mut state = self.state();
        if !state.complete {
            return None;
        }
        let head = state.head.take()?;
        let body = std::mem::take(&mut state.body).freeze();
        Some(http::Response::from_parts(head, body))
    }

    /// Convenience method to read the body as text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.state().body).into_owned()
    }

    /// Convenience method to parse the body as JSON.
    #[cfg(feature = "json")]
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.state().body)
    }
}

impl ResponseHandler for ResponseCollector {
    fn on_headers(&self, head: &response::Parts) {
        let mut state = self.state();
        state.head = Some(head.clone());
    }

    fn on_data(&self, chunk: Bytes) {
        self.state().body.extend_from_slice(&chunk);
    }

    fn on_trailers(&self, trailers: &HeaderMap) {
        self.state().trailers = Some(trailers.clone());
    }

    fn on_complete(&self) {
        self.state().complete = true;
    }

    fn on_error(&self, error: &ExecutionError) {
        tracing::trace!(kind = ?error.kind(), "response collection failed");
        self.state().failed = true;
    }
}
