//! # httpexec
//!
//! The per-request execution engine of an asynchronous HTTP client.
//!
//! `httpexec` takes a connection leased from a pool and drives one
//! request/response exchange on it: pipeline setup for the negotiated
//! protocol, length-limited streaming of the request body, write and read idle
//! timeouts, cancellation, and classification of every failure into an
//! actionable error.
//!
//! ## Features
//!
//! - **HTTP/1.1 & HTTP/2**: pipeline chosen from the connection's ALPN protocol
//! - **Body streaming**: the producer is pulled at the transport's pace and
//!   never allowed past the declared `Content-Length`
//! - **Idle timeouts**: separate write-phase and read-phase timers
//! - **Cancellation**: reaches an in-flight connection and unwinds it back into
//!   the pool
//! - **Error classification**: pool exhaustion and timeouts carry guidance
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use httpexec::http::{ExecuteRequest, ExecutionContext, RequestExecutor, ResponseCollector};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pool = my_pool(); // Arc<dyn ConnectionPool>
//!     let collector = Arc::new(ResponseCollector::new());
//!     let request = ExecuteRequest::from_request(
//!         http::Request::get("https://example.com/").body("").unwrap(),
//!     );
//!
//!     let context = ExecutionContext::new(request, collector.clone(), pool);
//!     RequestExecutor::new(context).execute().await.unwrap();
//!     println!("Status: {:?}", collector.status());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error types, failure classification, execution ids
//! - [`http`] - Request execution, pipelines, body streaming, timeouts
//! - [`socket`] - Connection pool and transport contracts

pub mod base;
pub mod http;
pub mod socket;

pub use base::classifier::{classify, ErrorKind, ExecutionError};
pub use base::failure::Failure;
pub use base::neterror::NetError;
