//! Shared test helpers: an in-process hub speaking the wire protocol.
//!
//! The mock accepts any number of connections, parses frames, keeps written
//! entries in a shared store, and answers read/stat requests from it.
//! Every parsed frame is also forwarded as a [`ServerEvent`] so tests can
//! observe exactly what arrived on the wire, in order.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::wire::{
    Action, LogEntryOut, MessageHeader, ReadQuery, StatRecord, TruncateDirective, WriteEntry,
};

const TERMINATOR: u8 = 0;

/// One frame observed by the mock, in arrival order per connection.
#[derive(Debug)]
pub(crate) enum ServerEvent {
    Header(MessageHeader),
    Entry(WriteEntry),
    Query(ReadQuery),
    Directive(TruncateDirective),
    /// The empty frame closing a write batch.
    BatchEnd,
}

pub(crate) struct MockHub {
    pub addr: SocketAddr,
    pub events: Receiver<ServerEvent>,
    store: Arc<Mutex<Vec<LogEntryOut>>>,
}

impl MockHub {
    pub(crate) fn start() -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener");
        let addr = listener.local_addr().expect("listener has address");
        let (tx, rx) = unbounded();
        let store = Arc::new(Mutex::new(Vec::new()));
        let accept_store = Arc::clone(&store);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let tx = tx.clone();
                let store = Arc::clone(&accept_store);
                thread::spawn(move || {
                    let _ = serve_connection(stream, tx, store);
                });
            }
        });
        Self {
            addr,
            events: rx,
            store,
        }
    }

    /// Entries currently held by the hub, in arrival order.
    pub(crate) fn stored(&self) -> Vec<LogEntryOut> {
        self.store.lock().clone()
    }
}

fn serve_connection(
    mut stream: TcpStream,
    events: Sender<ServerEvent>,
    store: Arc<Mutex<Vec<LogEntryOut>>>,
) -> io::Result<()> {
    enum Mode {
        Idle,
        Write,
        Truncate,
    }
    let mut mode = Mode::Idle;
    loop {
        let Some(frame) = read_frame(&mut stream)? else {
            return Ok(());
        };
        if frame.is_empty() {
            if matches!(mode, Mode::Write) {
                let _ = events.send(ServerEvent::BatchEnd);
            }
            mode = Mode::Idle;
            continue;
        }
        let value: Value = serde_json::from_slice(&frame).expect("mock received invalid JSON");
        if value.get("Action").is_some() {
            let header: MessageHeader =
                serde_json::from_value(value).expect("mock received invalid header");
            let action = header.action;
            let _ = events.send(ServerEvent::Header(header));
            mode = match action {
                Action::Write => Mode::Write,
                Action::Truncate => Mode::Truncate,
                Action::Read => {
                    serve_read(&mut stream, &events, &store)?;
                    Mode::Idle
                }
                Action::Stat => {
                    serve_stat(&mut stream, &store)?;
                    Mode::Idle
                }
            };
            continue;
        }
        match mode {
            Mode::Write => {
                let entry: WriteEntry =
                    serde_json::from_value(value).expect("mock received invalid entry");
                store.lock().push(LogEntryOut {
                    ts: now_wire(),
                    sev: entry.sev,
                    src: entry.src.clone(),
                    msg: entry.msg.clone(),
                });
                let _ = events.send(ServerEvent::Entry(entry));
            }
            Mode::Truncate => {
                let directive: TruncateDirective =
                    serde_json::from_value(value).expect("mock received invalid directive");
                store.lock().retain(|entry| {
                    entry.ts >= directive.lim
                        || !(directive.src.is_empty() || directive.src == entry.src)
                });
                let _ = events.send(ServerEvent::Directive(directive));
            }
            Mode::Idle => panic!("mock received a payload frame outside any request"),
        }
    }
}

fn serve_read(
    stream: &mut TcpStream,
    events: &Sender<ServerEvent>,
    store: &Mutex<Vec<LogEntryOut>>,
) -> io::Result<()> {
    let mut queries = Vec::new();
    loop {
        let Some(frame) = read_frame(stream)? else {
            return Ok(());
        };
        if frame.is_empty() {
            break;
        }
        let query: ReadQuery = serde_json::from_slice(&frame).expect("mock received invalid query");
        let _ = events.send(ServerEvent::Query(query.clone()));
        queries.push(query);
    }
    let entries = store.lock().clone();
    for entry in &entries {
        if queries.iter().any(|query| query_matches(query, entry)) {
            write_frame(stream, entry)?;
        }
    }
    write_terminator(stream)
}

fn serve_stat(stream: &mut TcpStream, store: &Mutex<Vec<LogEntryOut>>) -> io::Result<()> {
    let size: usize = store.lock().iter().map(|entry| entry.msg.len()).sum();
    let stat = StatRecord {
        addr: "127.0.0.1:10001".into(),
        sz: size as i64,
        lim: 1_000_000,
    };
    write_frame(stream, &stat)?;
    write_terminator(stream)
}

fn query_matches(query: &ReadQuery, entry: &LogEntryOut) -> bool {
    entry.ts >= query.from
        && entry.ts <= query.to
        && entry.sev >= query.min_sev
        && entry.sev <= query.max_sev
        && (query.src.is_empty() || query.src == entry.src)
}

/// Read one frame. `None` means the peer closed the connection cleanly at a
/// frame boundary; an empty vector is the empty frame.
fn read_frame(stream: &mut TcpStream) -> io::Result<Option<Vec<u8>>> {
    let mut frame = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte) {
            Ok(0) => {
                return if frame.is_empty() {
                    Ok(None)
                } else {
                    Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "peer closed inside a frame",
                    ))
                };
            }
            Ok(_) => {
                if byte[0] == TERMINATOR {
                    return Ok(Some(frame));
                }
                frame.push(byte[0]);
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}

fn write_frame<T: Serialize>(stream: &mut TcpStream, message: &T) -> io::Result<()> {
    let payload = serde_json::to_vec(message).expect("mock response serialises");
    stream.write_all(&payload)?;
    write_terminator(stream)
}

fn write_terminator(stream: &mut TcpStream) -> io::Result<()> {
    stream.write_all(&[TERMINATOR])?;
    stream.flush()
}

/// The hub stamps entries at arrival, like the real service, at the same
/// millisecond granularity the wire encoding carries.
fn now_wire() -> i64 {
    chrono::Utc::now().timestamp_millis().saturating_mul(1_000_000)
}
