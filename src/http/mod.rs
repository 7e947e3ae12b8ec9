//! Request execution over leased connections.
//!
//! - [`executor`]: entry point, [`RequestExecutor`] and its context
//! - [`future`]: the [`ExecutionFuture`] and cancellation
//! - [`pipeline`]: per-connection protocol pipeline and the HTTP/2 adapters
//! - [`streamingrequest`]: length-limited request body streaming
//! - [`timeout`]: write and read idle timers
//! - [`response`]: a buffering [`ResponseHandler`]

pub mod config;
mod dispatch;
pub mod executor;
pub mod frame;
pub mod future;
pub mod h2adapter;
pub mod pipeline;
pub mod requestbody;
pub mod response;
pub mod responsehandler;
pub mod streaming;
pub mod streamingrequest;
pub mod timeout;

// Re-exports for convenience
pub use config::ClientConfig;
pub use executor::{ExecuteRequest, ExecutionContext, RequestExecutor};
pub use future::{AbortHandle, ExecutionFuture};
pub use requestbody::{BoxBody, ContentProducer, RequestBody};
pub use response::ResponseCollector;
pub use responsehandler::ResponseHandler;
