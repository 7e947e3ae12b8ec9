//! Length-limited request body streaming.
//!
//! [`StreamingRequest`] sits between the body producer and the wire. It passes
//! demand through unchanged (every `poll_frame` asks the producer for one more
//! frame) but never lets more than the declared `Content-Length` through: once
//! the limit is reached the producer is dropped, which is how it is told to
//! stop, and the body reports its end.

use crate::http::frame::RequestHead;
use crate::socket::pool::BoxError;
use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::HeaderMap;
use http_body::{Body, Frame, SizeHint};
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// Read the declared content length from request headers.
///
/// A missing header means no limit. A header that is not a non-negative
/// integer is treated the same way, with a warning.
pub fn declared_content_length(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(CONTENT_LENGTH)?;
    match value.to_str().ok().and_then(|s| s.trim().parse::<u64>().ok()) {
        Some(length) => Some(length),
        None => {
            tracing::warn!(
                value = ?value,
                "Unable to parse 'Content-Length' header. Treating it as non existent."
            );
            None
        }
    }
}

/// Content-length bookkeeping for one transmission.
///
/// Mirrors the callbacks a producer can deliver: a chunk, an error, or
/// completion. After `done` is set every callback is a no-op.
#[derive(Debug, Clone)]
pub struct ContentLimit {
    declared: Option<u64>,
    written: u64,
    done: bool,
}

impl ContentLimit {
    pub fn new(declared: Option<u64>) -> Self {
        Self {
            declared,
            written: 0,
            done: false,
        }
    }

    /// Admit a chunk. Returns the (possibly truncated) chunk to forward and
    /// whether the declared length has now been reached, or `None` if the
    /// limit is already done.
    pub fn on_next(&mut self, mut chunk: Bytes) -> Option<(Bytes, bool)> {
        if self.done {
            return None;
        }

        if let Some(declared) = self.declared {
            let remaining = declared.saturating_sub(self.written);
            if (chunk.len() as u64) > remaining {
                // remaining < chunk.len() <= usize::MAX
                chunk.truncate(remaining as usize);
            }
        }
        self.written += chunk.len() as u64;

        let reached = self.declared.is_some_and(|declared| self.written >= declared);
        if reached {
            self.done = true;
        }
        Some((chunk, reached))
    }

    /// Returns true if the error should be propagated.
    pub fn on_error(&mut self) -> bool {
        !std::mem::replace(&mut self.done, true)
    }

    /// Returns true if completion should be propagated.
    pub fn on_complete(&mut self) -> bool {
        !std::mem::replace(&mut self.done, true)
    }

    pub fn declared(&self) -> Option<u64> {
        self.declared
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn remaining(&self) -> Option<u64> {
        self.declared.map(|declared| declared.saturating_sub(self.written))
    }
}

/// A request head plus its body, limited to the declared content length.
pub struct StreamingRequest<B> {
    head: RequestHead,
    upstream: Option<B>,
    limit: ContentLimit,
}

impl<B> StreamingRequest<B> {
    /// Wrap `body`, taking the limit from the head's `Content-Length`.
    pub fn new(head: RequestHead, body: B) -> Self {
        let declared = declared_content_length(&head.headers);
        Self {
            head,
            upstream: Some(body),
            limit: ContentLimit::new(declared),
        }
    }

    pub fn head(&self) -> &RequestHead {
        &self.head
    }

    pub fn content_limit(&self) -> &ContentLimit {
        &self.limit
    }

    /// True once the producer has been dropped, by reaching the limit or by
    /// the producer finishing.
    pub fn is_upstream_cancelled(&self) -> bool {
        self.upstream.is_none()
    }

    fn cancel_upstream(&mut self) {
        self.upstream = None;
    }
}

impl<B> Body for StreamingRequest<B>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        let this = self.get_mut();
        if this.limit.is_done() {
            return Poll::Ready(None);
        }
        let Some(upstream) = this.upstream.as_mut() else {
            return Poll::Ready(None);
        };

        match ready!(Pin::new(upstream).poll_frame(cx)) {
            Some(Ok(frame)) => match frame.into_data() {
                Ok(chunk) => match this.limit.on_next(chunk) {
                    Some((chunk, reached)) => {
                        if reached {
                            tracing::trace!(
                                written = this.limit.written(),
                                "declared content length reached, cancelling body producer"
                            );
                            this.cancel_upstream();
                        }
                        Poll::Ready(Some(Ok(Frame::data(chunk))))
                    }
                    None => Poll::Ready(None),
                },
                // Trailers carry no content bytes.
                Err(frame) => Poll::Ready(Some(Ok(frame))),
            },
            Some(Err(err)) => {
                this.cancel_upstream();
                if this.limit.on_error() {
                    Poll::Ready(Some(Err(err.into())))
                } else {
                    Poll::Ready(None)
                }
            }
            None => {
                this.cancel_upstream();
                this.limit.on_complete();
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.limit.is_done()
    }

    fn size_hint(&self) -> SizeHint {
        match (self.limit.remaining(), &self.upstream) {
            (Some(remaining), _) => SizeHint::with_exact(remaining),
            (None, Some(upstream)) => upstream.size_hint(),
            (None, None) => SizeHint::with_exact(0),
        }
    }
}
