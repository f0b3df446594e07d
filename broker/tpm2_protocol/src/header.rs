// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Codec for the 10-byte header that prefixes every TPM 2.0 command and
//! response buffer.

use crate::WireError;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;
use zerocopy::byteorder::big_endian::U16;
use zerocopy::byteorder::big_endian::U32;

/// Size in bytes of a marshaled command/response header.
pub const HEADER_SIZE: usize = 10;

/// Raw big-endian layout of the header.
///
/// Shared between the codec below and the structured command marshaling
/// in [`crate::command`], which embeds it at the front of each command
/// struct.
#[repr(C)]
#[derive(Copy, Clone, Debug, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
pub struct WireHeader {
    /// Session tag (`TPM2_ST_*`).
    pub tag: U16,
    /// Total buffer size, header included.
    pub size: U32,
    /// Command code on commands, response code on responses.
    pub code: U32,
}

static_assertions::const_assert_eq!(size_of::<WireHeader>(), HEADER_SIZE);

impl WireHeader {
    /// Marshals `header` into its wire form.
    pub fn new(header: Header) -> Self {
        Self {
            tag: U16::new(header.tag),
            size: U32::new(header.size),
            code: U32::new(header.code),
        }
    }
}

/// A decoded TPM 2.0 command or response header.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Header {
    /// Session tag (`TPM2_ST_*`).
    pub tag: u16,
    /// Total buffer size, header included.
    pub size: u32,
    /// Command code on commands, response code on responses.
    pub code: u32,
}

impl Header {
    /// Builds a header value.
    pub fn new(tag: u16, size: u32, code: u32) -> Self {
        Self { tag, size, code }
    }

    /// Decodes a header from the first [`HEADER_SIZE`] bytes of `buf`.
    ///
    /// The tag and code are not validated against known values, and the
    /// size field is not checked against `buf.len()`; callers own both
    /// judgments.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let (raw, _) =
            WireHeader::read_from_prefix(buf).map_err(|_| WireError::ShortBuffer(buf.len()))?;
        Ok(Self {
            tag: raw.tag.get(),
            size: raw.size.get(),
            code: raw.code.get(),
        })
    }

    /// Encodes the header into the first [`HEADER_SIZE`] bytes of `buf`.
    pub fn encode(&self, buf: &mut [u8]) -> Result<(), WireError> {
        WireHeader::new(*self)
            .write_to_prefix(buf)
            .map_err(|_| WireError::ShortBuffer(buf.len()))
    }

    /// Returns the marshaled header as a standalone array.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0; HEADER_SIZE];
        buf.copy_from_slice(WireHeader::new(*self).as_bytes());
        buf
    }
}

/// Reads only the size field of the header at the start of `buf`.
///
/// This is the first thing a reader learns about an incoming buffer, and
/// the only header field the framed reader needs.
pub fn buffer_size(buf: &[u8]) -> Result<u32, WireError> {
    Ok(Header::decode(buf)?.size)
}
