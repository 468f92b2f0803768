//! MANY client.
//!
//! This crate implements:
//! - The `Transport` seam and its HTTP POST implementation
//! - `Client`, which signs, sends and decodes calls per identity
//! - Polling of deferred calls through `async.status`
//! - Typed wrappers for the kvstore and account modules

#![forbid(unsafe_code)]

pub mod client;
pub mod errors;
pub mod modules;
pub mod poller;
pub mod testing;
pub mod transport;

#[cfg(test)]
mod proptests;

pub use client::{CallOutcome, Caller, Client};
pub use errors::ClientError;
pub use poller::{AsyncStatus, PollConfig, StatusReply};
#[cfg(feature = "http")]
pub use transport::{HttpClientConfig, HttpTransport};
pub use transport::{Transport, TransportError};
