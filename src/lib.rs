//! sessionbox daemon library
//!
//! Provides the core functionality for the sessionbox daemon: a bounded pool
//! of long-lived worker processes, each hosting a persistent interpreter,
//! multiplexed behind stateful sessions addressable over HTTP.

pub mod config;
pub mod error;
pub mod http;
pub mod memory;
pub mod outcome;
pub mod sandbox;
pub mod session;
pub mod transport;
