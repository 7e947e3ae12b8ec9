//! Base types and error handling.
//!
//! - [`NetError`](neterror::NetError): network error codes matching `net_error_list.h`
//! - [`Failure`](failure::Failure): raw failure signals observed during an execution
//! - [`ExecutionError`](classifier::ExecutionError): classified, user-facing errors
//! - [`ExecutionId`](executionid::ExecutionId): process-wide execution identifiers

pub mod classifier;
pub mod executionid;
pub mod failure;
pub mod neterror;
