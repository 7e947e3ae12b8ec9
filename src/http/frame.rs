//! Logical frames exchanged with a [`Transport`](crate::socket::connection::Transport).
//!
//! Single-stream frames ([`RequestFrame`], [`ResponseEvent`]) are what an
//! HTTP/1.1 codec speaks directly. Multiplexed frames ([`StreamFrame`]) are
//! what an HTTP/2 codec speaks; the pipeline adapters translate between the two.

use bytes::Bytes;
use http::{response, HeaderMap, HeaderValue, Method, Request, Uri, Version};
use std::fmt;

/// The outbound request line and headers.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
}

impl RequestHead {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
        }
    }

    /// Add a header, replacing any previous value.
    pub fn header<K>(mut self, key: K, value: HeaderValue) -> Self
    where
        K: http::header::IntoHeaderName,
    {
        self.headers.insert(key, value);
        self
    }
}

impl<B> From<&Request<B>> for RequestHead {
    fn from(req: &Request<B>) -> Self {
        Self {
            method: req.method().clone(),
            uri: req.uri().clone(),
            version: req.version(),
            headers: req.headers().clone(),
        }
    }
}

/// Single-stream request frame.
#[derive(Debug)]
pub enum RequestFrame {
    Head(RequestHead),
    Data(Bytes),
    Trailers(HeaderMap),
    /// The request is complete.
    End,
}

/// Logical response event, the same for every protocol.
#[derive(Debug)]
pub enum ResponseEvent {
    Head(response::Parts),
    Data(Bytes),
    Trailers(HeaderMap),
    /// The response is complete.
    End,
}

/// Identifier of a stream on a multiplexed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(u32);

impl StreamId {
    pub fn new(id: u32) -> Self {
        StreamId(id)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Header block carried by a multiplexed HEADERS frame.
#[derive(Debug)]
pub enum HeaderBlock {
    Request(RequestHead),
    Response(response::Parts),
    Trailers(HeaderMap),
}

/// Multiplexed (HTTP/2-class) frame.
#[derive(Debug)]
pub enum StreamFrame {
    Headers {
        stream_id: StreamId,
        block: HeaderBlock,
        end_stream: bool,
    },
    Data {
        stream_id: StreamId,
        data: Bytes,
        end_stream: bool,
    },
    Reset {
        stream_id: StreamId,
        error_code: u32,
    },
}

impl StreamFrame {
    pub fn stream_id(&self) -> StreamId {
        match self {
            StreamFrame::Headers { stream_id, .. }
            | StreamFrame::Data { stream_id, .. }
            | StreamFrame::Reset { stream_id, .. } => *stream_id,
        }
    }
}

/// Frame written to a transport.
#[derive(Debug)]
pub enum Outbound {
    Single(RequestFrame),
    Multiplexed(StreamFrame),
}

/// Frame read from a transport.
#[derive(Debug)]
pub enum Inbound {
    Single(ResponseEvent),
    Multiplexed(StreamFrame),
}
