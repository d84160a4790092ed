//! Worker thread owning the pending batch.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{Receiver, select, tick};

use crate::{
    error::ClientError,
    events::ErrorSink,
    pool::ConnectionPool,
    wire::{Framer, MessageHeader, WriteEntry},
};

use super::{BufferCommand, FLUSH_INTERVAL, FLUSH_MAX_LEN};

pub(super) struct BufferContext {
    pub pool: Arc<ConnectionPool>,
    pub header: MessageHeader,
    pub events: ErrorSink,
}

pub(super) fn worker_loop(rx: Receiver<BufferCommand>, context: BufferContext) {
    let mut pending: Vec<WriteEntry> = Vec::new();
    let mut last_flush = Instant::now();
    let ticker = tick(FLUSH_INTERVAL);

    loop {
        select! {
            recv(rx) -> command => match command {
                Ok(BufferCommand::Entry(entry)) => {
                    pending.push(entry);
                    if pending.len() >= FLUSH_MAX_LEN {
                        flush_detached(&mut pending, &mut last_flush, &context);
                    }
                }
                Ok(BufferCommand::Flush(ack)) => {
                    flush_inline(&mut pending, &mut last_flush, &context);
                    let _ = ack.send(());
                }
                Ok(BufferCommand::Shutdown(ack)) => {
                    flush_inline(&mut pending, &mut last_flush, &context);
                    let _ = ack.send(());
                    return;
                }
                // Every handle dropped without a shutdown command; flush
                // what is left and stop.
                Err(_) => {
                    flush_inline(&mut pending, &mut last_flush, &context);
                    return;
                }
            },
            recv(ticker) -> _ => {
                if !pending.is_empty() && last_flush.elapsed() >= FLUSH_INTERVAL {
                    flush_detached(&mut pending, &mut last_flush, &context);
                }
            }
        }
    }
}

/// Snapshot-and-clear the batch, then hand it to a one-shot network task.
/// Fire-and-forget: the worker accepts further submissions immediately, so
/// concurrent batches carry no ordering guarantee between them.
fn flush_detached(pending: &mut Vec<WriteEntry>, last_flush: &mut Instant, context: &BufferContext) {
    let batch = std::mem::take(pending);
    *last_flush = Instant::now();
    let pool = Arc::clone(&context.pool);
    let header = context.header.clone();
    let events = context.events.clone();
    thread::spawn(move || send_batch(&pool, &header, &batch, &events));
}

/// Flush in the worker itself; used for explicit flush and shutdown, whose
/// callers expect the batch to be on the wire when the ack arrives.
fn flush_inline(pending: &mut Vec<WriteEntry>, last_flush: &mut Instant, context: &BufferContext) {
    if pending.is_empty() {
        return;
    }
    let batch = std::mem::take(pending);
    *last_flush = Instant::now();
    send_batch(&context.pool, &context.header, &batch, &context.events);
}

/// Write one batch: header, entries in submission order, terminator. When
/// no connection can be acquired the batch is dropped, not retried; the
/// failure is visible on the error-event stream.
fn send_batch(
    pool: &ConnectionPool,
    header: &MessageHeader,
    batch: &[WriteEntry],
    events: &ErrorSink,
) {
    pool.with_connection(events, |conn| -> Result<(), ClientError> {
        let mut framer = Framer::new(conn.stream_mut());
        framer.write(header)?;
        for entry in batch {
            framer.write(entry)?;
        }
        framer.terminate()
    });
}
