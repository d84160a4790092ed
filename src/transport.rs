//! Transport primitives: one TCP connection with optional TLS.

use std::{
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use native_tls::{TlsConnector, TlsStream};

/// TLS settings applied after the TCP connect.
#[derive(Clone, Debug)]
pub(crate) struct TlsOptions {
    /// Domain name presented during the TLS handshake.
    pub domain: String,
    /// Accept any peer certificate chain when true. Only for trusted
    /// private networks.
    pub skip_cert_validation: bool,
}

impl TlsOptions {
    fn connector(&self) -> io::Result<TlsConnector> {
        let mut builder = TlsConnector::builder();
        if self.skip_cert_validation {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        builder.build().map_err(io::Error::other)
    }
}

/// The byte stream behind a connection, plain or TLS.
#[derive(Debug)]
pub(crate) enum ConnStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl ConnStream {
    fn tcp_ref(&self) -> &TcpStream {
        match self {
            ConnStream::Plain(stream) => stream,
            ConnStream::Tls(stream) => stream.get_ref(),
        }
    }
}

impl Read for ConnStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ConnStream::Plain(stream) => stream.read(buf),
            ConnStream::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for ConnStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ConnStream::Plain(stream) => stream.write(buf),
            ConnStream::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ConnStream::Plain(stream) => stream.flush(),
            ConnStream::Tls(stream) => stream.flush(),
        }
    }
}

/// One live connection to the service.
///
/// Exclusively owned: by the pool while idle, by a single caller while
/// checked out. The connection carries bytes only; protocol content belongs
/// to the framer.
#[derive(Debug)]
pub(crate) struct Connection {
    stream: ConnStream,
}

impl Connection {
    /// Establish TCP, then negotiate TLS when requested.
    pub(crate) fn open(
        host: &str,
        port: u16,
        tls: Option<&TlsOptions>,
        connect_timeout: Duration,
    ) -> io::Result<Connection> {
        let stream = connect_tcp(host, port, connect_timeout)?;
        let stream = match tls {
            Some(options) => {
                let connector = options.connector()?;
                // Bound the handshake as well; a stalled peer must not hang
                // the caller. Timeouts are lifted once the session is up.
                stream.set_read_timeout(Some(connect_timeout))?;
                stream.set_write_timeout(Some(connect_timeout))?;
                let tls_stream = connector
                    .connect(&options.domain, stream)
                    .map_err(io::Error::other)?;
                let tcp_ref = tls_stream.get_ref();
                tcp_ref.set_read_timeout(None)?;
                tcp_ref.set_write_timeout(None)?;
                ConnStream::Tls(Box::new(tls_stream))
            }
            None => ConnStream::Plain(stream),
        };
        Ok(Connection { stream })
    }

    /// Shut the socket down. Idempotent; repeated calls are no-ops.
    pub(crate) fn close(&mut self) {
        let _ = self.stream.tcp_ref().shutdown(Shutdown::Both);
    }

    pub(crate) fn stream_mut(&mut self) -> &mut ConnStream {
        &mut self.stream
    }
}

fn socket_addrs(host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
    (host, port).to_socket_addrs().map(|iter| iter.collect())
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let addrs = socket_addrs(host, port)?;
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no address resolved for {host}:{port}"),
        )
    }))
}
