//! Client facade over the pool, the write buffer, and the wire protocol.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use chrono::{DateTime, Local};
use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::{
    error::ClientError,
    events::{self, ErrorEvents, ErrorSink},
    log_entry::{LogEntry, LogInfo},
    options::ClientOptions,
    pool::{ConnectionPool, PoolConfig},
    timestamp,
    transport::{ConnStream, Connection, TlsOptions},
    wire::{
        Action, Framer, LogEntryOut, MessageHeader, ReadQuery, StatRecord, TruncateDirective,
        WriteEntry,
    },
    write_buffer::WriteBuffer,
};

/// Client for a LogHub log or hub.
///
/// All operations may be called from any thread. Writes are batched and
/// delivered best-effort; read and stat results arrive as lazy, forward-only
/// iterators. Transport and protocol failures never surface through the
/// synchronous API: they end the affected operation early and appear on
/// [`error_events`](LogHubClient::error_events).
pub struct LogHubClient {
    pool: Arc<ConnectionPool>,
    buffer: WriteBuffer,
    events_sink: ErrorSink,
    events: ErrorEvents,
    user: String,
    password: String,
    closed: AtomicBool,
}

impl LogHubClient {
    /// Create a client for the log or hub at `host:port`.
    ///
    /// Construction does not wait for a connection: the pool opens its first
    /// connection in the background and reports a failure on the error-event
    /// stream, leaving the client degraded but operational.
    pub fn connect(host: &str, port: u16, options: ClientOptions) -> Result<Self, ClientError> {
        if host.is_empty() {
            return Err(ClientError::validation("host must be specified"));
        }
        if port == 0 {
            return Err(ClientError::validation("invalid port"));
        }
        if options.max_connections < 1 {
            return Err(ClientError::validation(
                "invalid maximum connections limit",
            ));
        }

        let (sink, events) = events::channel();
        let tls = options.use_tls.then(|| TlsOptions {
            domain: host.to_owned(),
            skip_cert_validation: options.skip_cert_validation,
        });
        let pool = Arc::new(ConnectionPool::new(
            PoolConfig {
                host: host.to_owned(),
                port,
                tls,
                max_size: options.max_connections,
                connect_timeout: options.connect_timeout,
            },
            sink.clone(),
        ));
        let buffer = WriteBuffer::new(
            Arc::clone(&pool),
            MessageHeader {
                action: Action::Write,
                usr: options.user.clone(),
                pass: options.password.clone(),
            },
            sink.clone(),
        );

        Ok(Self {
            pool,
            buffer,
            events_sink: sink,
            events,
            user: options.user,
            password: options.password,
            closed: AtomicBool::new(false),
        })
    }

    /// Write a single entry to the log.
    ///
    /// Validates its arguments synchronously, then hands the entry to the
    /// write buffer and returns without waiting for the network.
    pub fn write(&self, severity: i32, source: &str, message: &str) -> Result<(), ClientError> {
        self.ensure_open()?;
        validate_severity(severity)?;
        if source.is_empty() {
            return Err(ClientError::validation("source must be specified"));
        }
        if message.is_empty() {
            return Err(ClientError::validation("message must be specified"));
        }
        self.buffer.submit(WriteEntry {
            sev: severity,
            src: source.to_owned(),
            msg: message.to_owned(),
        })
    }

    /// Read log entries recorded between `from` and `to` with a severity in
    /// `min_severity..=max_severity`. An empty `sources` slice matches all
    /// sources.
    ///
    /// The returned iterator is lazy, single-pass, forward-only. A failure
    /// mid-stream ends it early; the cause is on the error-event stream.
    pub fn read(
        &self,
        from: DateTime<Local>,
        to: DateTime<Local>,
        min_severity: i32,
        max_severity: i32,
        sources: &[&str],
    ) -> Result<LogEntries, ClientError> {
        self.ensure_open()?;
        validate_severity(min_severity)?;
        validate_severity(max_severity)?;

        let template = ReadQuery {
            from: timestamp::to_wire(from),
            to: timestamp::to_wire(to),
            min_sev: min_severity,
            max_sev: max_severity,
            src: String::new(),
        };
        let queries = per_source(sources, template, |query, src| query.src = src);

        let (tx, rx) = unbounded();
        let pool = Arc::clone(&self.pool);
        let events = self.events_sink.clone();
        let header = self.header(Action::Read);
        thread::spawn(move || {
            stream_exchange(
                &pool,
                &events,
                move |framer| {
                    framer.write(&header)?;
                    for query in &queries {
                        framer.write(query)?;
                    }
                    framer.terminate()
                },
                |wire: LogEntryOut| LogEntry {
                    timestamp: timestamp::from_wire(wire.ts),
                    severity: wire.sev,
                    source: wire.src,
                    message: wire.msg,
                },
                &tx,
            );
        });
        Ok(LogEntries { rx })
    }

    /// Truncate matching sources, dropping entries recorded before `limit`.
    /// An empty `sources` slice matches all sources. No reply is expected;
    /// a failed exchange is reported on the error-event stream only.
    pub fn truncate(&self, limit: DateTime<Local>, sources: &[&str]) -> Result<(), ClientError> {
        self.ensure_open()?;
        let template = TruncateDirective {
            lim: timestamp::to_wire(limit),
            src: String::new(),
        };
        let directives = per_source(sources, template, |directive, src| directive.src = src);
        let header = self.header(Action::Truncate);
        self.pool
            .with_connection(&self.events_sink, |conn| -> Result<(), ClientError> {
                let mut framer = Framer::new(conn.stream_mut());
                framer.write(&header)?;
                for directive in &directives {
                    framer.write(directive)?;
                }
                Ok(())
            });
        Ok(())
    }

    /// Return information on the logs behind this client as a lazy iterator,
    /// analogous to [`read`](LogHubClient::read).
    pub fn stat(&self) -> Result<LogInfos, ClientError> {
        self.ensure_open()?;
        let (tx, rx) = unbounded();
        let pool = Arc::clone(&self.pool);
        let events = self.events_sink.clone();
        let header = self.header(Action::Stat);
        thread::spawn(move || {
            stream_exchange(
                &pool,
                &events,
                move |framer| framer.write(&header),
                |wire: StatRecord| LogInfo {
                    address: wire.addr,
                    size: wire.sz,
                    limit: wire.lim,
                },
                &tx,
            );
        });
        Ok(LogInfos { rx })
    }

    /// Force a flush of the write buffer and wait until the pending batch is
    /// on the wire.
    pub fn flush(&self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        self.buffer.flush();
    }

    /// The client's error-event stream. Background and streaming failures
    /// are reported here, never thrown across the synchronous call boundary.
    pub fn error_events(&self) -> &ErrorEvents {
        &self.events
    }

    /// Close the client: stop accepting operations, flush the write buffer
    /// one final time, shut the pool down, and wait for outstanding
    /// operations to drain. Idempotent.
    pub fn close(&mut self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Buffer first: its final flush still needs the pool.
        self.buffer.shutdown();
        self.pool.shutdown();
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::Shutdown);
        }
        Ok(())
    }

    fn header(&self, action: Action) -> MessageHeader {
        MessageHeader {
            action,
            usr: self.user.clone(),
            pass: self.password.clone(),
        }
    }
}

impl Drop for LogHubClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Lazy stream of entries produced by [`LogHubClient::read`]. Ends early,
/// without an error, when the underlying connection fails.
pub struct LogEntries {
    rx: Receiver<LogEntry>,
}

impl Iterator for LogEntries {
    type Item = LogEntry;

    fn next(&mut self) -> Option<LogEntry> {
        self.rx.recv().ok()
    }
}

/// Lazy stream of log information produced by [`LogHubClient::stat`].
pub struct LogInfos {
    rx: Receiver<LogInfo>,
}

impl Iterator for LogInfos {
    type Item = LogInfo;

    fn next(&mut self) -> Option<LogInfo> {
        self.rx.recv().ok()
    }
}

/// Build one request record per source filter, or a single record with an
/// empty source (match everything) when no filter is given.
fn per_source<T: Clone>(sources: &[&str], template: T, set_src: impl Fn(&mut T, String)) -> Vec<T> {
    if sources.is_empty() {
        return vec![template];
    }
    sources
        .iter()
        .map(|src| {
            let mut record = template.clone();
            set_src(&mut record, (*src).to_owned());
            record
        })
        .collect()
}

fn validate_severity(severity: i32) -> Result<(), ClientError> {
    if (0..=255).contains(&severity) {
        return Ok(());
    }
    Err(ClientError::validation("severity must be within [0; 255]"))
}

/// How a streaming exchange ended, beyond plain success.
enum StreamEnd {
    /// The consumer dropped its iterator; the connection is discarded
    /// without an event, since nothing went wrong on the wire.
    ConsumerGone,
    Failed(ClientError),
}

impl From<ClientError> for StreamEnd {
    fn from(err: ClientError) -> Self {
        StreamEnd::Failed(err)
    }
}

/// Acquire a connection, send a request, then forward response frames into
/// `tx` until the sentinel. The connection is always released; any failure
/// marks it broken and force-closes the result stream by dropping `tx`.
fn stream_exchange<Wire, Out>(
    pool: &ConnectionPool,
    events: &ErrorSink,
    send_request: impl FnOnce(&mut Framer<'_, ConnStream>) -> Result<(), ClientError>,
    map: impl Fn(Wire) -> Out,
    tx: &Sender<Out>,
) where
    Wire: serde::de::DeserializeOwned,
{
    let mut conn = match pool.acquire() {
        Ok(conn) => conn,
        Err(err) => {
            events.report(err);
            return;
        }
    };
    let outcome = run_stream(&mut conn, send_request, map, tx);
    match outcome {
        Ok(()) => pool.release(conn, false),
        Err(StreamEnd::ConsumerGone) => pool.release(conn, true),
        Err(StreamEnd::Failed(err)) => {
            events.report(err);
            pool.release(conn, true);
        }
    }
}

fn run_stream<Wire, Out>(
    conn: &mut Connection,
    send_request: impl FnOnce(&mut Framer<'_, ConnStream>) -> Result<(), ClientError>,
    map: impl Fn(Wire) -> Out,
    tx: &Sender<Out>,
) -> Result<(), StreamEnd>
where
    Wire: serde::de::DeserializeOwned,
{
    let mut framer = Framer::new(conn.stream_mut());
    send_request(&mut framer)?;
    while let Some(wire) = framer.read::<Wire>()? {
        if tx.send(map(wire)).is_err() {
            return Err(StreamEnd::ConsumerGone);
        }
    }
    Ok(())
}
