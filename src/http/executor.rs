//! Request execution.
//!
//! A [`RequestExecutor`] runs one request/response exchange on a leased
//! connection:
//!
//! ```text
//! acquire ─► configure pipeline ─► write request ─► read response ─► release
//!    │               │                   │                │
//!    └───────────────┴───── classify + fail future ───────┘
//! ```
//!
//! The exchange runs on its own tokio task. The returned [`ExecutionFuture`]
//! resolves exactly once, and a leased connection is released exactly once,
//! whichever stage fails.

use crate::base::classifier::classify;
use crate::base::executionid::{ExecutionId, EXECUTION_IDS};
use crate::base::failure::Failure;
use crate::http::config::ClientConfig;
use crate::http::dispatch::{Dispatch, Lease, LeaseState};
use crate::http::frame::RequestHead;
use crate::http::future::{CompletionGuard, ExecutionFuture, Promise};
use crate::http::pipeline::Pipeline;
use crate::http::requestbody::{ContentProducer, RequestBody};
use crate::http::responsehandler::ResponseHandler;
use crate::http::streamingrequest::StreamingRequest;
use crate::socket::connection::Connection;
use crate::socket::pool::{AcquireError, ConnectionPool};
use futures::future::BoxFuture;
use http::Request;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Instrument;

/// The outbound request: head, body producer, and exchange mode.
#[derive(Clone)]
pub struct ExecuteRequest {
    head: RequestHead,
    content: Arc<dyn ContentProducer>,
    full_duplex: bool,
}

impl ExecuteRequest {
    /// A request with an empty body.
    pub fn new(head: RequestHead) -> Self {
        Self {
            head,
            content: Arc::new(RequestBody::Empty),
            full_duplex: false,
        }
    }

    /// Build from an `http::Request` with an in-memory body.
    pub fn from_request<B: Into<RequestBody>>(request: Request<B>) -> Self {
        let head = RequestHead::from(&request);
        let body: RequestBody = request.into_body().into();
        Self::new(head).content(body)
    }

    /// Set the body producer.
    pub fn content(mut self, producer: impl ContentProducer) -> Self {
        self.content = Arc::new(producer);
        self
    }

    /// Read the response while the request body is still being written.
    pub fn full_duplex(mut self, enabled: bool) -> Self {
        self.full_duplex = enabled;
        self
    }

    pub fn head(&self) -> &RequestHead {
        &self.head
    }

    pub fn is_full_duplex(&self) -> bool {
        self.full_duplex
    }

    pub(crate) fn producer(&self) -> &dyn ContentProducer {
        self.content.as_ref()
    }
}

impl fmt::Debug for ExecuteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteRequest")
            .field("method", &self.head.method)
            .field("uri", &self.head.uri)
            .field("full_duplex", &self.full_duplex)
            .finish()
    }
}

/// Everything one execution needs. Never mutated after construction.
pub struct ExecutionContext {
    request: ExecuteRequest,
    handler: Arc<dyn ResponseHandler>,
    pool: Arc<dyn ConnectionPool>,
    config: ClientConfig,
}

impl ExecutionContext {
    pub fn new(
        request: ExecuteRequest,
        handler: Arc<dyn ResponseHandler>,
        pool: Arc<dyn ConnectionPool>,
    ) -> Self {
        Self {
            request,
            handler,
            pool,
            config: ClientConfig::default(),
        }
    }

    /// Use `config` instead of the defaults.
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn request(&self) -> &ExecuteRequest {
        &self.request
    }

    pub fn handler(&self) -> &Arc<dyn ResponseHandler> {
        &self.handler
    }

    pub fn pool(&self) -> &Arc<dyn ConnectionPool> {
        &self.pool
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("request", &self.request)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Executes one request.
#[derive(Debug)]
pub struct RequestExecutor {
    execution_id: ExecutionId,
    context: Arc<ExecutionContext>,
}

impl RequestExecutor {
    /// Allocate an execution id for `context`.
    pub fn new(context: ExecutionContext) -> Self {
        Self {
            execution_id: EXECUTION_IDS.next(),
            context: Arc::new(context),
        }
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// Start the execution.
    ///
    /// The connection lease is requested before this returns; everything
    /// after that runs on a spawned task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn execute(self) -> ExecutionFuture {
        let (promise, rx) = Promise::new(self.execution_id);
        let lease = self.context.pool().acquire();
        let span = tracing::debug_span!("execute", execution_id = self.execution_id.get());

        tokio::spawn(run(self.context, Arc::clone(&promise), lease).instrument(span));
        ExecutionFuture::new(promise, rx)
    }
}

async fn run(
    context: Arc<ExecutionContext>,
    promise: Arc<Promise>,
    lease: BoxFuture<'static, Result<Connection, AcquireError>>,
) {
    let _guard = CompletionGuard::new(Arc::clone(&promise));

    let mut connection = match lease.await {
        Ok(connection) => connection,
        Err(err) => {
            let message = format!("Failed to create connection to {}", context.request.head.uri);
            fail_execution(&context, &promise, &message, Failure::Acquire(err));
            return;
        }
    };
    tracing::debug!(
        connection = %connection.id(),
        protocol = connection.negotiated_protocol(),
        "connection leased"
    );

    let (control_tx, control_rx) = mpsc::unbounded_channel();
    promise.attach_connection(control_tx);

    let configured = Pipeline::configure(&mut connection);
    let lease = Lease::new(connection, Arc::clone(&context.pool), Arc::clone(&promise));
    let pipeline = match configured {
        Ok(pipeline) => pipeline,
        Err(failure) => {
            lease.close_and_release().await;
            let message = failure.to_string();
            fail_execution(&context, &promise, &message, failure);
            return;
        }
    };

    let request = StreamingRequest::new(
        context.request.head.clone(),
        context.request.producer().produce(),
    );
    let state = LeaseState::new(promise.execution_id(), context, promise);
    Dispatch::new(lease, state, pipeline, control_rx, request).run().await;
}

/// Log, classify and deliver a failure to both the handler and the future.
pub(crate) fn fail_execution(
    context: &ExecutionContext,
    promise: &Promise,
    message: &str,
    failure: Failure,
) {
    tracing::error!(execution_id = %promise.execution_id(), error = ?failure, "{}", message);
    let error = classify(failure);
    context.handler.on_error(&error);
    promise.complete(Err(error));
}
