//! Worker thread owning all pool state.

use std::collections::VecDeque;
use std::io;

use crossbeam_channel::Receiver;

use crate::{error::ClientError, events::ErrorSink, transport::Connection};

use super::{AcquireReply, PoolConfig, PoolRequest};

/// Mutable pool state. Touched only by the worker thread.
struct PoolState {
    /// Idle connections, FIFO.
    idle: VecDeque<Connection>,
    /// Pending acquires awaiting fulfilment, FIFO.
    waiters: VecDeque<AcquireReply>,
    /// Connections currently alive, idle or checked out. Never exceeds
    /// `config.max_size`.
    total: usize,
    /// Present once shutdown has been requested; acknowledged when the last
    /// checked-out connection has drained back.
    closing: Option<crossbeam_channel::Sender<()>>,
}

impl PoolState {
    fn checked_out(&self) -> usize {
        self.total - self.idle.len()
    }
}

pub(super) fn worker_loop(rx: Receiver<PoolRequest>, config: PoolConfig, events: ErrorSink) {
    let mut state = PoolState {
        idle: VecDeque::new(),
        waiters: VecDeque::new(),
        total: 0,
        closing: None,
    };

    // Eagerly open the first connection. Failure leaves the pool degraded
    // but operational; the next acquire retries.
    match connect(&config) {
        Ok(conn) => {
            state.idle.push_back(conn);
            state.total = 1;
        }
        Err(err) => events.report(ClientError::Connection(err)),
    }

    while let Ok(request) = rx.recv() {
        match request {
            PoolRequest::Acquire(reply) => handle_acquire(reply, &mut state, &config, &events),
            PoolRequest::Release(conn, broken) => {
                handle_release(conn, broken, &mut state, &config, &events);
                if acknowledge_if_drained(&mut state) {
                    return;
                }
            }
            PoolRequest::Shutdown(ack) => {
                for waiter in state.waiters.drain(..) {
                    let _ = waiter.send(Err(ClientError::Shutdown));
                }
                while let Some(mut conn) = state.idle.pop_front() {
                    conn.close();
                    state.total -= 1;
                }
                state.closing = Some(ack);
                if acknowledge_if_drained(&mut state) {
                    return;
                }
            }
        }
    }

    // Every handle dropped without an explicit shutdown; close what is left.
    for mut conn in state.idle.drain(..) {
        conn.close();
    }
}

fn handle_acquire(
    reply: AcquireReply,
    state: &mut PoolState,
    config: &PoolConfig,
    events: &ErrorSink,
) {
    if state.closing.is_some() {
        let _ = reply.send(Err(ClientError::Shutdown));
        return;
    }
    if let Some(conn) = state.idle.pop_front() {
        deliver(conn, reply, state);
        return;
    }
    if state.total < config.max_size {
        match connect(config) {
            Ok(conn) => {
                state.total += 1;
                deliver(conn, reply, state);
            }
            Err(err) => {
                // The failure is scoped to this acquire; the pool keeps
                // running. Surface it on the event stream as well.
                let (for_caller, for_events) = split_connection_error(err);
                events.report(for_events);
                let _ = reply.send(Err(for_caller));
            }
        }
        return;
    }
    state.waiters.push_back(reply);
}

fn handle_release(
    mut conn: Connection,
    broken: bool,
    state: &mut PoolState,
    config: &PoolConfig,
    events: &ErrorSink,
) {
    if state.closing.is_some() || broken {
        conn.close();
        state.total -= 1;
        if broken && state.closing.is_none() {
            serve_waiter_from_vacated_slot(state, config, events);
        }
        return;
    }
    if let Some(waiter) = state.waiters.pop_front() {
        // Hand over directly, bypassing the idle queue, to keep FIFO
        // fairness for waiters.
        match waiter.send(Ok(conn)) {
            Ok(()) => {}
            Err(err) => {
                // The waiter vanished; recover the connection for the next
                // one in line.
                if let Ok(returned) = err.into_inner() {
                    handle_release(returned, false, state, config, events);
                }
            }
        }
        return;
    }
    state.idle.push_back(conn);
}

/// A broken release vacated a pool slot. If anyone is waiting, attempt a
/// fresh connection for the oldest waiter right away; a failure fails that
/// waiter alone.
fn serve_waiter_from_vacated_slot(state: &mut PoolState, config: &PoolConfig, events: &ErrorSink) {
    let Some(waiter) = state.waiters.pop_front() else {
        return;
    };
    match connect(config) {
        Ok(conn) => {
            state.total += 1;
            deliver(conn, waiter, state);
        }
        Err(err) => {
            let (for_caller, for_events) = split_connection_error(err);
            events.report(for_events);
            let _ = waiter.send(Err(for_caller));
        }
    }
}

/// Fulfil one acquire. If the acquiring caller vanished before the reply
/// arrived, the connection is recovered for the next waiter or the idle
/// queue rather than leaked.
fn deliver(conn: Connection, reply: AcquireReply, state: &mut PoolState) {
    if let Err(err) = reply.send(Ok(conn))
        && let Ok(returned) = err.into_inner()
    {
        if let Some(next) = state.waiters.pop_front() {
            deliver(returned, next, state);
        } else {
            state.idle.push_back(returned);
        }
    }
}

/// Once shutdown has been requested and the last checked-out connection has
/// come back, acknowledge and stop the worker.
fn acknowledge_if_drained(state: &mut PoolState) -> bool {
    if let Some(ack) = &state.closing
        && state.checked_out() == 0
        && state.idle.is_empty()
    {
        let _ = ack.send(());
        return true;
    }
    false
}

fn connect(config: &PoolConfig) -> io::Result<Connection> {
    Connection::open(
        &config.host,
        config.port,
        config.tls.as_ref(),
        config.connect_timeout,
    )
}

/// `io::Error` does not clone; rebuild a second value so the failure can go
/// both to the failed acquire and to the error-event stream.
fn split_connection_error(err: io::Error) -> (ClientError, ClientError) {
    let copy = io::Error::new(err.kind(), err.to_string());
    (ClientError::Connection(err), ClientError::Connection(copy))
}
