//! Response delivery contract.

use crate::base::classifier::ExecutionError;
use bytes::Bytes;
use http::{response, HeaderMap};

/// Receives the response of one execution as it arrives.
///
/// Callbacks are made from the execution's task, in wire order. Exactly one of
/// [`on_complete`](Self::on_complete) or [`on_error`](Self::on_error) ends
/// the exchange; `on_error` receives the same classified error the execution
/// future fails with.
pub trait ResponseHandler: Send + Sync + 'static {
    fn on_headers(&self, head: &response::Parts);

    fn on_data(&self, chunk: Bytes);

    fn on_trailers(&self, _trailers: &HeaderMap) {}

    fn on_complete(&self);

    fn on_error(&self, error: &ExecutionError);
}
