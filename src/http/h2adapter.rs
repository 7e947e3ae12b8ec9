//! HTTP/2 framing adapters.
//!
//! The executor speaks single-stream frames. On a multiplexed connection these
//! two adapters translate between those and the frames of the one stream
//! allocated for the lease.

use crate::base::failure::Failure;
use crate::base::neterror::NetError;
use crate::http::frame::{HeaderBlock, RequestFrame, ResponseEvent, StreamFrame, StreamId};
use bytes::Bytes;
use std::collections::VecDeque;

/// Outbound: request frames to stream frames.
#[derive(Debug)]
pub struct HttpToHttp2Outbound {
    stream_id: StreamId,
    ended: bool,
}

impl HttpToHttp2Outbound {
    pub fn new(stream_id: StreamId) -> Self {
        Self {
            stream_id,
            ended: false,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// Translate one request frame. Returns `None` when nothing needs to be
    /// written (the end of a stream that trailers already closed).
    pub fn encode(&mut self, frame: RequestFrame) -> Option<StreamFrame> {
        if self.ended {
            return None;
        }
        let stream_id = self.stream_id;
        let frame = match frame {
            RequestFrame::Head(head) => StreamFrame::Headers {
                stream_id,
                block: HeaderBlock::Request(head),
                end_stream: false,
            },
            RequestFrame::Data(data) => StreamFrame::Data {
                stream_id,
                data,
                end_stream: false,
            },
            RequestFrame::Trailers(trailers) => {
                self.ended = true;
                StreamFrame::Headers {
                    stream_id,
                    block: HeaderBlock::Trailers(trailers),
                    end_stream: true,
                }
            }
            RequestFrame::End => {
                self.ended = true;
                StreamFrame::Data {
                    stream_id,
                    data: Bytes::new(),
                    end_stream: true,
                }
            }
        };
        Some(frame)
    }
}

/// Inbound: stream frames to response events.
#[derive(Debug)]
pub struct Http2ToHttpInbound {
    stream_id: StreamId,
}

impl Http2ToHttpInbound {
    pub fn new(stream_id: StreamId) -> Self {
        Self { stream_id }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// Translate one stream frame, appending zero or more events to `out`.
    pub fn decode(&self, frame: StreamFrame, out: &mut VecDeque<ResponseEvent>) -> Result<(), Failure> {
        if frame.stream_id() != self.stream_id {
            tracing::trace!(
                stream_id = %frame.stream_id(),
                expected = %self.stream_id,
                "ignoring frame for another stream"
            );
            return Ok(());
        }

        match frame {
            StreamFrame::Headers {
                block, end_stream, ..
            } => match block {
                HeaderBlock::Response(head) => {
                    out.push_back(ResponseEvent::Head(head));
                    if end_stream {
                        out.push_back(ResponseEvent::End);
                    }
                }
                HeaderBlock::Trailers(trailers) => {
                    out.push_back(ResponseEvent::Trailers(trailers));
                    out.push_back(ResponseEvent::End);
                }
                HeaderBlock::Request(_) => {
                    return Err(NetError::Http2ProtocolError.into());
                }
            },
            StreamFrame::Data {
                data, end_stream, ..
            } => {
                if !data.is_empty() {
                    out.push_back(ResponseEvent::Data(data));
                }
                if end_stream {
                    out.push_back(ResponseEvent::End);
                }
            }
            StreamFrame::Reset { error_code, .. } => {
                tracing::debug!(stream_id = %self.stream_id, error_code, "stream reset by peer");
                return Err(NetError::from_h2_reset_code(error_code).into());
            }
        }
        Ok(())
    }
}
