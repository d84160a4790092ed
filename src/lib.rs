//! Client library for the LogHub remote append-only log service.
//!
//! The service speaks a terminator-delimited JSON protocol over TCP, with
//! optional TLS. This crate wraps that protocol in [`LogHubClient`]: write
//! calls are batched in the background and delivered best-effort, read and
//! stat results arrive as lazy forward-only iterators, and a bounded
//! connection pool provides backpressure under concurrent use.
//!
//! Transport and protocol failures are never raised through the synchronous
//! API. They end the affected operation early and are reported on the
//! client's [error-event stream](LogHubClient::error_events); only argument
//! validation and use-after-close fail at the call site. Batched writes are
//! not durable: a batch lost to a connection failure is dropped, reported,
//! and never retried.

mod client;
mod error;
mod events;
mod log_entry;
mod options;
mod pool;
mod timestamp;
mod transport;
mod wire;
mod write_buffer;

#[cfg(test)]
mod client_tests;
#[cfg(test)]
pub(crate) mod test_utils;

pub use client::{LogEntries, LogHubClient, LogInfos};
pub use error::ClientError;
pub use events::ErrorEvents;
pub use log_entry::{LogEntry, LogInfo};
pub use options::{ClientOptions, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_CONNECTIONS, users};
