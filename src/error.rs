//! Error taxonomy shared by the client, the pool, and the wire framer.

use std::io;

use thiserror::Error;

/// Errors produced by the client library.
///
/// Only [`ClientError::Validation`] and [`ClientError::Shutdown`] are ever
/// returned from the synchronous API. Transport and protocol failures are
/// reported on the client's error-event stream instead; the affected
/// operation ends its result stream or drops its batch.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The caller supplied an invalid argument. Raised at the call site
    /// before any connection is touched.
    #[error("invalid argument: {0}")]
    Validation(String),
    /// Transport-level failure: connect, TLS handshake, or socket I/O.
    /// The connection involved is discarded.
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),
    /// A frame arrived that could not be decoded. Treated as a
    /// connection-level failure; the connection is discarded without retry.
    #[error("protocol error: {0}")]
    Protocol(#[from] serde_json::Error),
    /// The operation raced with `close`, or a pending acquire was cancelled
    /// by pool shutdown.
    #[error("client is closed")]
    Shutdown,
}

impl ClientError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        ClientError::Validation(msg.into())
    }
}
