// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Wire-level types and constants for the TPM 2.0 command stream.
//!
//! This crate owns everything that is defined by the TPM 2.0 Library
//! specification rather than by the resource manager itself: the 10-byte
//! command/response header codec, the constants the broker needs (tags,
//! command codes, capability and property identifiers, handle ranges),
//! marshaling for the handful of commands the broker issues on its own
//! behalf, and unmarshaling for `TPM2_GetCapability` response payloads.
//!
//! Nothing here performs I/O. Buffers go in, buffers come out.

pub mod capability;
pub mod command;
pub mod header;
pub mod rc;
pub mod tpm20;

use thiserror::Error;

/// Errors from marshaling or unmarshaling TPM 2.0 wire structures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// The buffer is too short to hold a complete header.
    #[error("buffer of {0} bytes cannot hold a complete TPM header")]
    ShortBuffer(usize),
    /// The header size field disagrees with the byte count actually held.
    #[error("header announces {announced} bytes but buffer holds {actual}")]
    SizeMismatch {
        /// Size field decoded from the header.
        announced: u32,
        /// Length of the buffer the header arrived in.
        actual: usize,
    },
    /// A payload ended in the middle of a fixed-size field.
    #[error("truncated field: {0}")]
    Truncated(&'static str),
    /// A `GetCapability` response carried a capability this crate does not
    /// decode.
    #[error("unsupported capability {0:#010x}")]
    UnsupportedCapability(u32),
}

pub use capability::CapabilityData;
pub use capability::TaggedProperty;
pub use header::HEADER_SIZE;
pub use header::Header;
pub use tpm20::TpmaCc;
