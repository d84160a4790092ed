//! Error-event stream connecting background workers to the embedding
//! application.
//!
//! Transport and protocol failures never cross the synchronous call boundary.
//! They are pushed into this queue instead, and the application drains them
//! at its own pace through [`ErrorEvents`]. When nobody is listening any
//! more, reports fall back to `log::warn!` so failures stay observable.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::time::Duration;

use crate::error::ClientError;

/// Create a connected sink/stream pair.
pub(crate) fn channel() -> (ErrorSink, ErrorEvents) {
    let (tx, rx) = unbounded();
    (ErrorSink { tx }, ErrorEvents { rx })
}

/// Producer half, cloned into every worker that can fail in the background.
#[derive(Clone)]
pub(crate) struct ErrorSink {
    tx: Sender<ClientError>,
}

impl ErrorSink {
    /// Push an error onto the stream. Falls back to a warning when the
    /// stream has no consumer left.
    pub(crate) fn report(&self, err: ClientError) {
        if let Err(send_err) = self.tx.send(err) {
            log::warn!("loghub client error with no consumer: {}", send_err.0);
        }
    }
}

/// Consumer half of the error-event stream.
///
/// All receive methods take `&self`; the stream can be drained from any
/// thread. Iteration blocks until the next event and ends once the client
/// has been closed and every pending event has been consumed.
pub struct ErrorEvents {
    rx: Receiver<ClientError>,
}

impl ErrorEvents {
    /// Return the next pending event without blocking.
    pub fn try_next(&self) -> Option<ClientError> {
        self.rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event.
    pub fn next_timeout(&self, timeout: Duration) -> Option<ClientError> {
        match self.rx.recv_timeout(timeout) {
            Ok(err) => Some(err),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl<'a> IntoIterator for &'a ErrorEvents {
    type Item = ClientError;
    type IntoIter = crossbeam_channel::Iter<'a, ClientError>;

    fn into_iter(self) -> Self::IntoIter {
        self.rx.iter()
    }
}
