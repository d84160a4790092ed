//! Write-batching actor.
//!
//! Individual write calls are cheap appends to a pending list owned by a
//! worker thread; the worker moves batches onto the network when the list
//! grows to [`FLUSH_MAX_LEN`] entries or [`FLUSH_INTERVAL`] has passed with
//! entries pending. Delivery is best-effort by design: a batch that cannot
//! be flushed is dropped and reported on the error-event stream.

mod worker;


use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Sender, bounded, unbounded};
use parking_lot::Mutex;

use crate::{
    error::ClientError,
    events::ErrorSink,
    pool::ConnectionPool,
    wire::{MessageHeader, WriteEntry},
};

/// Buffer length that triggers a flush.
pub(crate) const FLUSH_MAX_LEN: usize = 100;
/// Maximum time entries may sit in the buffer before a flush.
pub(crate) const FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Commands processed by the buffer worker.
pub(crate) enum BufferCommand {
    Entry(WriteEntry),
    Flush(Sender<()>),
    Shutdown(Sender<()>),
}

/// Handle to the buffer worker.
pub(crate) struct WriteBuffer {
    tx: Sender<BufferCommand>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl WriteBuffer {
    /// Start the worker. `header` is the write-action header sent in front
    /// of every batch.
    pub(crate) fn new(pool: Arc<ConnectionPool>, header: MessageHeader, events: ErrorSink) -> Self {
        let (tx, rx) = unbounded();
        let context = worker::BufferContext {
            pool,
            header,
            events,
        };
        let handle = thread::spawn(move || worker::worker_loop(rx, context));
        Self {
            tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Append one entry to the pending batch. Never blocks on the network.
    pub(crate) fn submit(&self, entry: WriteEntry) -> Result<(), ClientError> {
        self.tx
            .send(BufferCommand::Entry(entry))
            .map_err(|_| ClientError::Shutdown)
    }

    /// Flush pending entries and wait until the batch is on the wire.
    pub(crate) fn flush(&self) {
        let (ack_tx, ack_rx) = bounded(1);
        if self.tx.send(BufferCommand::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// Flush the remainder synchronously and stop the worker. Idempotent.
    pub(crate) fn shutdown(&self) {
        let (ack_tx, ack_rx) = bounded(1);
        if self.tx.send(BufferCommand::Shutdown(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
        if let Some(handle) = self.handle.lock().take()
            && handle.join().is_err()
        {
            log::warn!("write buffer worker thread panicked");
        }
    }
}
