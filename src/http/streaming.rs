//! Streaming transport stage.
//!
//! Turns a [`StreamingRequest`] into the ordered sequence of request frames
//! written to the connection: the head, then body data and trailers as the
//! producer yields them, then the end marker. Frames are only pulled while the
//! writer polls, so the producer runs at the pace the transport accepts.

use crate::base::failure::Failure;
use crate::http::frame::{RequestFrame, RequestHead};
use crate::http::streamingrequest::StreamingRequest;
use crate::socket::pool::BoxError;
use bytes::Bytes;
use futures::Stream;
use http_body::Body;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Head,
    Body,
    End,
    Done,
}

/// Stream of request frames for one transmission.
pub struct RequestFrames<B> {
    head: Option<RequestHead>,
    request: StreamingRequest<B>,
    state: State,
}

impl<B> RequestFrames<B> {
    pub fn new(request: StreamingRequest<B>) -> Self {
        Self {
            head: Some(request.head().clone()),
            request,
            state: State::Head,
        }
    }

    pub fn request(&self) -> &StreamingRequest<B> {
        &self.request
    }

    /// True once the end marker has been yielded or the body failed.
    pub fn is_finished(&self) -> bool {
        self.state == State::Done
    }
}

impl<B> Stream for RequestFrames<B>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Into<BoxError>,
{
    type Item = Result<RequestFrame, Failure>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match this.state {
                State::Head => {
                    this.state = State::Body;
                    if let Some(head) = this.head.take() {
                        return Poll::Ready(Some(Ok(RequestFrame::Head(head))));
                    }
                }
                State::Body => {
                    match ready!(Pin::new(&mut this.request).poll_frame(cx)) {
                        Some(Ok(frame)) => match frame.into_data() {
                            // Empty chunks are dropped rather than written as empty frames.
                            Ok(data) if data.is_empty() => continue,
                            Ok(data) => return Poll::Ready(Some(Ok(RequestFrame::Data(data)))),
                            Err(frame) => {
                                if let Ok(trailers) = frame.into_trailers() {
                                    return Poll::Ready(Some(Ok(RequestFrame::Trailers(trailers))));
                                }
                            }
                        },
                        Some(Err(err)) => {
                            this.state = State::Done;
                            return Poll::Ready(Some(Err(Failure::Body(err))));
                        }
                        None => this.state = State::End,
                    }
                }
                State::End => {
                    this.state = State::Done;
                    return Poll::Ready(Some(Ok(RequestFrame::End)));
                }
                State::Done => return Poll::Ready(None),
            }
        }
    }
}
