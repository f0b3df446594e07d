// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Assembly of complete TPM buffers from non-blocking byte streams.
//!
//! A TPM command or response announces its own length in the size field
//! of its 10-byte header, so a reader must first collect the header, then
//! read exactly as many further bytes as the header announces. The stream
//! may deliver those bytes in arbitrary pieces; [`read_framed`] keeps its
//! progress in a caller-held index so a partial read can resume on the
//! next call.

use crate::Error;
use crate::util;
use nix::errno::Errno;
use nix::poll::PollFd;
use nix::poll::PollFlags;
use nix::poll::PollTimeout;
use nix::poll::poll;
use std::io::Read;
use std::os::fd::AsFd;
use std::os::fd::BorrowedFd;
use tpm2_protocol::HEADER_SIZE;
use tpm2_protocol::header;
use tpm2_protocol::tpm20::TPM2_MAX_COMMAND_SIZE;

/// Largest TPM buffer the allocating reader will assemble. Anything
/// announcing more is treated as a protocol violation, not an allocation
/// request.
pub const MAX_BUFFER: usize = TPM2_MAX_COMMAND_SIZE as usize;

fn poll_ready(fd: BorrowedFd<'_>, events: PollFlags, timeout_ms: i32) -> Result<(), Error> {
    let timeout = if timeout_ms < 0 {
        PollTimeout::NONE
    } else {
        PollTimeout::try_from(timeout_ms).unwrap_or(PollTimeout::MAX)
    };
    loop {
        let mut fds = [PollFd::new(fd, events)];
        match poll(&mut fds, timeout) {
            Ok(0) => {
                tracing::trace!("poll timed out after {timeout_ms} ms");
                return Err(Error::TryAgain);
            }
            Ok(_) => return Ok(()),
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(Error::Io(std::io::Error::from(errno))),
        }
    }
}

/// Waits until `fd` has data to read, a peer hangup included.
fn wait_readable(fd: BorrowedFd<'_>, timeout_ms: i32) -> Result<(), Error> {
    poll_ready(
        fd,
        PollFlags::POLLIN | PollFlags::POLLPRI | PollFlags::from_bits_retain(libc::POLLRDHUP),
        timeout_ms,
    )
}

/// Waits until `fd` can accept more output.
pub(crate) fn wait_writable(fd: BorrowedFd<'_>, timeout_ms: i32) -> Result<(), Error> {
    poll_ready(fd, PollFlags::POLLOUT, timeout_ms)
}

/// Polls for readiness, then reads up to `want` bytes at `buf[*index..]`,
/// advancing `index` by however many arrive.
///
/// Returns [`Error::TryAgain`] on timeout or a short read (progress is
/// kept, nothing is rolled back) and [`Error::NoConnection`] on EOF.
fn read_with_timeout<S: Read + AsFd>(
    stream: &mut S,
    buf: &mut [u8],
    want: usize,
    index: &mut usize,
    timeout_ms: i32,
) -> Result<(), Error> {
    wait_readable(stream.as_fd(), timeout_ms)?;

    let num_read = loop {
        match stream.read(&mut buf[*index..*index + want]) {
            Ok(n) => break n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(Error::from_io(err)),
        }
    };
    match num_read {
        0 => {
            tracing::debug!("read produced EOF");
            Err(Error::NoConnection)
        }
        n => {
            tracing::trace!("read {n} bytes: {}", util::hex(&buf[*index..*index + n]));
            *index += n;
            if n < want { Err(Error::TryAgain) } else { Ok(()) }
        }
    }
}

/// Reads one complete TPM command or response into `buf`.
///
/// `index` is the next write position and carries partial progress across
/// calls: resume with the same `buf` and `index` after
/// [`Error::TryAgain`], or with a grown `buf` (and untouched `index`)
/// after [`Error::Protocol`] when the announced size did not fit.
/// Success means `buf[..index]` holds exactly the announced bytes.
///
/// There is no cancellation; closing the stream surfaces as
/// [`Error::NoConnection`].
pub fn read_framed<S: Read + AsFd>(
    stream: &mut S,
    buf: &mut [u8],
    index: &mut usize,
    timeout_ms: i32,
) -> Result<(), Error> {
    if buf.len() < HEADER_SIZE {
        return Err(Error::Internal("destination cannot hold a TPM header"));
    }
    // Collect the header first; only then is the full size known.
    if *index < HEADER_SIZE {
        read_with_timeout(stream, buf, HEADER_SIZE - *index, index, timeout_ms)?;
    }
    let size = header::buffer_size(buf)? as usize;
    if size == HEADER_SIZE {
        return Ok(());
    }
    if size < HEADER_SIZE || size > buf.len() {
        return Err(Error::Protocol(size as u32));
    }
    read_with_timeout(stream, buf, size - *index, index, timeout_ms)
}

/// Reads one complete TPM buffer, allocating as the announced size
/// becomes known, and returns it trimmed to that size.
///
/// The destination starts at [`HEADER_SIZE`] and grows once the header
/// arrives; an announced size outside `[HEADER_SIZE, MAX_BUFFER]` is
/// rejected without reading further.
pub fn read_framed_alloc<S: Read + AsFd>(
    stream: &mut S,
    timeout_ms: i32,
) -> Result<Vec<u8>, Error> {
    let mut buf = vec![0u8; HEADER_SIZE];
    let mut index = 0;
    loop {
        match read_framed(stream, &mut buf, &mut index, timeout_ms) {
            Ok(()) => {
                let size = header::buffer_size(&buf)? as usize;
                buf.truncate(size);
                tracing::trace!("assembled TPM buffer of {} bytes", buf.len());
                return Ok(buf);
            }
            Err(Error::TryAgain) => continue,
            Err(Error::Protocol(size)) => {
                if !(HEADER_SIZE..=MAX_BUFFER).contains(&(size as usize)) {
                    tracing::warn!("announced TPM buffer size {size} is out of bounds");
                    return Err(Error::Protocol(size));
                }
                buf.resize(size as usize, 0);
            }
            Err(err) => return Err(err),
        }
    }
}
