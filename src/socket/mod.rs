//! Connection leasing contracts.
//!
//! - [`pool`]: the pool a connection is leased from and released to
//! - [`connection`]: the leased connection and its framed transport

pub mod connection;
pub mod pool;
