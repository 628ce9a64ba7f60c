//! # classlink-core
//!
//! Shared vocabulary for the classlink crates:
//!
//! - **Errors**: [`TransportError`] for connection establishment failures
//! - **Logging**: [`logging::init_subscriber`] for the stderr `tracing`
//!   subscriber and [`logging::capture_logs`] for asserting on log output
//!   in tests

#![deny(unsafe_code)]

pub mod errors;
pub mod logging;

pub use errors::TransportError;
