//! Terminator-delimited framing over a raw byte stream.

use std::io::{self, Read, Write};

use serde::{Serialize, de::DeserializeOwned};

use crate::error::ClientError;

/// Byte closing every frame. The payload encoding is JSON text, which cannot
/// contain a raw `0x00`, so the terminator never collides with payload
/// content. The framing relies on that precondition.
const TERMINATOR: u8 = 0;
const READ_CHUNK: usize = 256;

/// Serialises and deserialises one message per frame.
///
/// A framer never buffers output across `write` calls, so two callers
/// interleaving writes on one stream would corrupt the framing. It is not
/// safe for concurrent use; the pool's acquire/release discipline guarantees
/// a single user per stream. Input is buffered in fixed-size chunks and
/// leftover bytes carry over to the next `read` on the same framer.
pub(crate) struct Framer<'a, S: Read + Write> {
    stream: &'a mut S,
    buf: [u8; READ_CHUNK],
    read_idx: usize,
    read_lim: usize,
    accumulator: Vec<u8>,
}

impl<'a, S: Read + Write> Framer<'a, S> {
    pub(crate) fn new(stream: &'a mut S) -> Self {
        Self {
            stream,
            buf: [0; READ_CHUNK],
            read_idx: 0,
            read_lim: 0,
            accumulator: Vec::with_capacity(READ_CHUNK),
        }
    }

    /// Serialise one message, then write its bytes and a single terminator.
    pub(crate) fn write<T: Serialize>(&mut self, message: &T) -> Result<(), ClientError> {
        let payload = serde_json::to_vec(message)?;
        self.stream.write_all(&payload)?;
        self.stream.write_all(&[TERMINATOR])?;
        self.stream.flush()?;
        Ok(())
    }

    /// Write a bare terminator: the empty frame that closes a request's
    /// payload section without sending a further message.
    pub(crate) fn terminate(&mut self) -> Result<(), ClientError> {
        self.stream.write_all(&[TERMINATOR])?;
        self.stream.flush()?;
        Ok(())
    }

    /// Read the next frame and decode it as `T`.
    ///
    /// Returns `Ok(None)` for the "no more items" sentinel: an empty frame,
    /// or end of stream before the first byte of a new frame. End of stream
    /// inside a frame is an error, as is a frame that does not decode as `T`.
    pub(crate) fn read<T: DeserializeOwned>(&mut self) -> Result<Option<T>, ClientError> {
        loop {
            if self.read_idx == self.read_lim {
                self.read_lim = self.stream.read(&mut self.buf)?;
                self.read_idx = 0;
                if self.read_lim == 0 {
                    if self.accumulator.is_empty() {
                        return Ok(None);
                    }
                    return Err(ClientError::Connection(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "stream ended inside a frame",
                    )));
                }
            }
            while self.read_idx < self.read_lim {
                let byte = self.buf[self.read_idx];
                self.read_idx += 1;
                if byte != TERMINATOR {
                    self.accumulator.push(byte);
                    continue;
                }
                if self.accumulator.is_empty() {
                    return Ok(None);
                }
                let decoded = serde_json::from_slice(&self.accumulator);
                self.accumulator.clear();
                return Ok(Some(decoded?));
            }
        }
    }
}
