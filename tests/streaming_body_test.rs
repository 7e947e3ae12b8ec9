//! Streaming body adapter integration tests.

use bytes::Bytes;
use futures::StreamExt;
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, HeaderValue, Method, Uri};
use http_body::{Body, Frame};
use http_body_util::{BodyExt, StreamBody};
use httpexec::http::frame::{RequestFrame, RequestHead};
use httpexec::http::requestbody::{stream_body, BoxBody};
use httpexec::http::streaming::RequestFrames;
use httpexec::http::streamingrequest::StreamingRequest;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Log sink shared with a `tracing_subscriber::fmt` subscriber.
#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn head(content_length: Option<&'static str>) -> RequestHead {
    let head = RequestHead::new(Method::PUT, Uri::from_static("http://localhost/upload"));
    match content_length {
        Some(value) => head.header(CONTENT_LENGTH, HeaderValue::from_static(value)),
        None => head,
    }
}

/// A body of `sizes` chunks that sets the returned flag when dropped.
fn tracked_body(sizes: &[usize]) -> (BoxBody, Arc<AtomicBool>) {
    let dropped = Arc::new(AtomicBool::new(false));
    let guard = DropFlag(Arc::clone(&dropped));
    let chunks: Vec<Result<Bytes, std::io::Error>> =
        sizes.iter().map(|n| Ok(Bytes::from(vec![b'z'; *n]))).collect();
    let stream = futures::stream::iter(chunks).map(move |chunk| {
        let _keep = &guard;
        chunk
    });
    (stream_body(stream), dropped)
}

async fn forwarded_sizes<B>(request: &mut StreamingRequest<B>) -> Vec<usize>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let mut sizes = Vec::new();
    while let Some(frame) = request.frame().await {
        if let Ok(data) = frame.unwrap().into_data() {
            sizes.push(data.len());
        }
    }
    sizes
}

#[tokio::test]
async fn test_truncates_and_cancels_upstream() {
    let (body, dropped) = tracked_body(&[4, 4, 4, 4]);
    let mut request = StreamingRequest::new(head(Some("10")), body);

    assert_eq!(forwarded_sizes(&mut request).await, vec![4, 4, 2]);
    assert!(request.content_limit().is_done());
    assert_eq!(request.content_limit().written(), 10);
    assert!(request.is_upstream_cancelled());
    assert!(dropped.load(Ordering::SeqCst));
    assert!(request.is_end_stream());
}

#[tokio::test]
async fn test_unparsable_length_passes_through() {
    let (body, _) = tracked_body(&[4, 4, 4]);
    let logs = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer({
            let logs = logs.clone();
            move || logs.clone()
        })
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let mut request =
        tracing::subscriber::with_default(subscriber, || StreamingRequest::new(head(Some("abc")), body));

    let logged = logs.contents();
    assert!(logged.contains("WARN"));
    assert!(logged.contains("Unable to parse 'Content-Length' header"));
    assert_eq!(request.content_limit().declared(), None);
    assert_eq!(forwarded_sizes(&mut request).await, vec![4, 4, 4]);
    assert!(request.content_limit().is_done());
}

#[tokio::test]
async fn test_under_declared_length_is_unmodified() {
    let (body, dropped) = tracked_body(&[3, 3]);
    let mut request = StreamingRequest::new(head(Some("10")), body);

    assert_eq!(forwarded_sizes(&mut request).await, vec![3, 3]);
    assert_eq!(request.content_limit().written(), 6);
    assert!(request.content_limit().is_done());
    assert!(dropped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_error_propagates_once() {
    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from_static(b"abc")),
        Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "producer broke")),
        Ok(Bytes::from_static(b"late")),
    ];
    let mut request = StreamingRequest::new(head(None), stream_body(futures::stream::iter(chunks)));

    assert!(request.frame().await.unwrap().is_ok());
    let err = request.frame().await.unwrap().unwrap_err();
    assert!(err.to_string().contains("producer broke"));
    assert!(request.frame().await.is_none());
    assert!(request.frame().await.is_none());
}

#[tokio::test]
async fn test_trailers_pass_through() {
    let mut trailers = HeaderMap::new();
    trailers.insert("x-checksum", HeaderValue::from_static("c0ffee"));
    let frames: Vec<Result<Frame<Bytes>, std::io::Error>> = vec![
        Ok(Frame::data(Bytes::from_static(b"12345"))),
        Ok(Frame::trailers(trailers)),
    ];
    let body = StreamBody::new(futures::stream::iter(frames));
    let request = StreamingRequest::new(head(Some("5")), body);

    let kinds: Vec<_> = RequestFrames::new(request)
        .map(|frame| match frame.unwrap() {
            RequestFrame::Head(_) => "head",
            RequestFrame::Data(_) => "data",
            RequestFrame::Trailers(_) => "trailers",
            RequestFrame::End => "end",
        })
        .collect()
        .await;

    // The length is reached by the data frame, so the upstream (and its
    // trailers) is cancelled right after it.
    assert_eq!(kinds, vec!["head", "data", "end"]);
}

#[tokio::test]
async fn test_trailers_without_declared_length() {
    let mut trailers = HeaderMap::new();
    trailers.insert("x-checksum", HeaderValue::from_static("c0ffee"));
    let frames: Vec<Result<Frame<Bytes>, std::io::Error>> = vec![
        Ok(Frame::data(Bytes::from_static(b"12345"))),
        Ok(Frame::trailers(trailers)),
    ];
    let body = StreamBody::new(futures::stream::iter(frames));
    let request = StreamingRequest::new(head(None), body);

    let collected = request.collect().await.unwrap();
    assert_eq!(collected.trailers().unwrap()["x-checksum"], "c0ffee");
    assert_eq!(collected.to_bytes(), Bytes::from_static(b"12345"));
}
