//! Request body producers.
//!
//! A [`ContentProducer`] creates a fresh body for every transmission attempt.
//! The body itself is an [`http_body::Body`], polled one frame at a time, so
//! the producer is only asked for more data when the connection can take it.

use crate::socket::pool::BoxError;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use http_body::Frame;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use std::convert::Infallible;

/// Type-erased request body.
pub type BoxBody = http_body_util::combinators::UnsyncBoxBody<Bytes, BoxError>;

/// Creates the body for one transmission attempt.
pub trait ContentProducer: Send + Sync + 'static {
    fn produce(&self) -> BoxBody;
}

impl<F> ContentProducer for F
where
    F: Fn() -> BoxBody + Send + Sync + 'static,
{
    fn produce(&self) -> BoxBody {
        self()
    }
}

/// In-memory request body.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    /// No body (GET, HEAD, DELETE).
    #[default]
    Empty,
    /// Body with raw bytes.
    Bytes(Bytes),
}

impl From<String> for RequestBody {
    fn from(s: String) -> Self {
        RequestBody::Bytes(Bytes::from(s))
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(v: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(v))
    }
}

impl From<&'static str> for RequestBody {
    fn from(s: &'static str) -> Self {
        RequestBody::Bytes(Bytes::from_static(s.as_bytes()))
    }
}

impl From<Bytes> for RequestBody {
    fn from(b: Bytes) -> Self {
        RequestBody::Bytes(b)
    }
}

impl RequestBody {
    /// Check if the body is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the length of the body in bytes.
    pub fn len(&self) -> usize {
        match self {
            RequestBody::Empty => 0,
            RequestBody::Bytes(b) => b.len(),
        }
    }
}

impl ContentProducer for RequestBody {
    fn produce(&self) -> BoxBody {
        match self {
            RequestBody::Empty => Empty::<Bytes>::new().map_err(never).boxed_unsync(),
            RequestBody::Bytes(b) => Full::new(b.clone()).map_err(never).boxed_unsync(),
        }
    }
}

/// Adapt a stream of byte chunks into a body.
pub fn stream_body<S, E>(stream: S) -> BoxBody
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<BoxError> + 'static,
{
    StreamBody::new(stream.map_ok(Frame::data).map_err(Into::into)).boxed_unsync()
}

fn never(never: Infallible) -> BoxError {
    match never {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body::Body;

    #[test]
    fn test_empty_body() {
        let body = RequestBody::Empty;
        assert!(body.is_empty());
        assert_eq!(body.len(), 0);
        assert_eq!(body.produce().size_hint().exact(), Some(0));
    }

    #[test]
    fn test_bytes_body() {
        let body = RequestBody::Bytes(Bytes::from("hello"));
        assert!(!body.is_empty());
        assert_eq!(body.len(), 5);
        assert_eq!(body.produce().size_hint().exact(), Some(5));
    }

    #[test]
    fn test_conversions() {
        let from_string: RequestBody = "hello world".to_string().into();
        assert_eq!(from_string.len(), 11);
        let from_vec: RequestBody = vec![1u8, 2, 3, 4].into();
        assert_eq!(from_vec.len(), 4);
        let from_bytes: RequestBody = Bytes::from_static(b"raw").into();
        assert_eq!(from_bytes.len(), 3);
    }

    #[tokio::test]
    async fn test_produce_is_repeatable() {
        let body: RequestBody = "data".into();
        for _ in 0..2 {
            let collected = body.produce().collect().await.unwrap().to_bytes();
            assert_eq!(collected, Bytes::from_static(b"data"));
        }
    }

    #[tokio::test]
    async fn test_closure_producer_with_stream() {
        let producer = || {
            let chunks: Vec<Result<Bytes, std::io::Error>> =
                vec![Ok(Bytes::from_static(b"ab")), Ok(Bytes::from_static(b"cd"))];
            stream_body(futures::stream::iter(chunks))
        };
        let collected = producer.produce().collect().await.unwrap().to_bytes();
        assert_eq!(collected, Bytes::from_static(b"abcd"));
    }
}
