// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Client connection endpoints.
//!
//! A connection is shared between the thread reading commands and the
//! response being routed back, so it travels as an [`Arc`]. The daemon
//! layer above decides when connections are created and torn down; this
//! module only implements the read/write contract the broker relies on.

use crate::Error;
use crate::framed;
use crate::tcti::TIMEOUT_BLOCK;
use std::io::Write;
use std::os::fd::AsFd;
use std::os::unix::net::UnixStream;
use std::sync::Arc;

/// A client endpoint: a non-blocking Unix-domain stream plus an id used
/// to correlate log records.
#[derive(Debug)]
pub struct Connection {
    stream: UnixStream,
    id: u64,
}

impl Connection {
    /// Wraps `stream`, switching it to non-blocking mode.
    pub fn new(stream: UnixStream, id: u64) -> Result<Arc<Self>, Error> {
        stream.set_nonblocking(true).map_err(Error::Io)?;
        Ok(Arc::new(Self { stream, id }))
    }

    /// Creates a connected endpoint pair: the daemon-side [`Connection`]
    /// and the client-side stream that gets handed to the client.
    pub fn pair(id: u64) -> Result<(Arc<Self>, UnixStream), Error> {
        let (ours, theirs) = UnixStream::pair().map_err(Error::Io)?;
        Ok((Self::new(ours, id)?, theirs))
    }

    /// Identifier for log correlation.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Reads one complete TPM command buffer from the client.
    pub fn read_command_buffer(&self, timeout_ms: i32) -> Result<Vec<u8>, Error> {
        let mut stream = &self.stream;
        framed::read_framed_alloc(&mut stream, timeout_ms)
    }

    /// Writes a complete response buffer to the client, waiting for the
    /// stream to drain as needed.
    pub fn write_response(&self, buf: &[u8]) -> Result<(), Error> {
        let mut stream = &self.stream;
        let mut written = 0;
        while written < buf.len() {
            match stream.write(&buf[written..]) {
                Ok(0) => return Err(Error::NoConnection),
                Ok(n) => {
                    tracing::trace!("connection {}: wrote {n} bytes", self.id);
                    written += n;
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    framed::wait_writable(self.stream.as_fd(), TIMEOUT_BLOCK)?;
                }
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(Error::from_io(err)),
            }
        }
        Ok(())
    }

    /// Shuts down both directions of the stream, unblocking any reader.
    pub fn close(&self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}
