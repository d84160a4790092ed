//! Bounded connection pool.
//!
//! A dedicated worker thread owns every piece of pool state; callers
//! interact with it only through [`PoolRequest`] messages, so the pool needs
//! no internal locking. Acquires block their caller on a one-shot reply
//! channel until a connection is available or the pool closes.

mod worker;


use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Sender, bounded, unbounded};
use parking_lot::Mutex;

use crate::{
    error::ClientError,
    events::ErrorSink,
    transport::{Connection, TlsOptions},
};

/// Reply slot for one pending acquire. Fulfilled exactly once, either with a
/// connection or with the shutdown failure.
pub(crate) type AcquireReply = Sender<Result<Connection, ClientError>>;

/// Requests processed by the pool worker.
pub(crate) enum PoolRequest {
    Acquire(AcquireReply),
    Release(Connection, bool),
    Shutdown(Sender<()>),
}

/// Connection parameters shared by every connection the pool creates.
#[derive(Clone)]
pub(crate) struct PoolConfig {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsOptions>,
    pub max_size: usize,
    pub connect_timeout: Duration,
}

/// Handle to the pool worker. Shared by the client facade, the write
/// buffer's flush tasks, and streaming readers.
pub(crate) struct ConnectionPool {
    tx: Sender<PoolRequest>,
    closed: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionPool {
    /// Start the pool worker. Construction eagerly attempts one connection;
    /// a failure there is reported through `events` and the pool starts
    /// degraded, retrying lazily on the next acquire.
    pub(crate) fn new(config: PoolConfig, events: ErrorSink) -> Self {
        let (tx, rx) = unbounded();
        let handle = thread::spawn(move || worker::worker_loop(rx, config, events));
        Self {
            tx,
            closed: AtomicBool::new(false),
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Check a connection out, blocking until one is available.
    ///
    /// Fails with [`ClientError::Shutdown`] once the pool is closing and
    /// with [`ClientError::Connection`] when a connection had to be created
    /// for this request and could not be.
    pub(crate) fn acquire(&self) -> Result<Connection, ClientError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::Shutdown);
        }
        let (reply_tx, reply_rx) = bounded(1);
        self.tx
            .send(PoolRequest::Acquire(reply_tx))
            .map_err(|_| ClientError::Shutdown)?;
        reply_rx.recv().map_err(|_| ClientError::Shutdown)?
    }

    /// Return a checked-out connection. A broken connection is closed and
    /// its pool slot freed; a healthy one goes to the oldest waiter or back
    /// onto the idle queue.
    pub(crate) fn release(&self, conn: Connection, broken: bool) {
        if let Err(err) = self.tx.send(PoolRequest::Release(conn, broken)) {
            // Worker already gone; close inline so the socket is not leaked.
            if let PoolRequest::Release(mut conn, _) = err.into_inner() {
                conn.close();
            }
        }
    }

    /// Run one protocol exchange under the acquire-use-release discipline.
    ///
    /// The connection is always released: marked broken when `op` fails, in
    /// which case the error goes to the error-event stream and `None` is
    /// returned.
    pub(crate) fn with_connection<T>(
        &self,
        events: &ErrorSink,
        op: impl FnOnce(&mut Connection) -> Result<T, ClientError>,
    ) -> Option<T> {
        let mut conn = match self.acquire() {
            Ok(conn) => conn,
            Err(err) => {
                events.report(err);
                return None;
            }
        };
        match op(&mut conn) {
            Ok(value) => {
                self.release(conn, false);
                Some(value)
            }
            Err(err) => {
                events.report(err);
                self.release(conn, true);
                None
            }
        }
    }

    /// Stop the pool: subsequent acquires fail immediately, pending waiters
    /// are cancelled, idle connections close, and the call returns once
    /// every checked-out connection has been released and closed.
    pub(crate) fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let (ack_tx, ack_rx) = bounded(1);
        if self.tx.send(PoolRequest::Shutdown(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
        if let Some(handle) = self.handle.lock().take()
            && handle.join().is_err()
        {
            log::warn!("connection pool worker thread panicked");
        }
    }
}
