// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error taxonomy shared by the broker, the framed reader, and TCTI
//! implementations.

use std::io;
use thiserror::Error;
use tpm2_protocol::WireError;
use tpm2_protocol::rc::TSS2_MU_RC_BAD_REFERENCE;
use tpm2_protocol::rc::TSS2_RESMGR_RC_BAD_VALUE;
use tpm2_protocol::rc::TSS2_RESMGR_RC_INTERNAL_ERROR;
use tpm2_protocol::rc::TSS2_TCTI_RC_GENERAL_FAILURE;
use tpm2_protocol::rc::TSS2_TCTI_RC_IO_ERROR;
use tpm2_protocol::rc::TSS2_TCTI_RC_NO_CONNECTION;
use tpm2_protocol::rc::TSS2_TCTI_RC_TRY_AGAIN;

/// Failures surfaced by broker operations.
///
/// The variants separate what a caller can do about a failure: retry
/// (`TryAgain`), drop the client (`NoConnection`, `Io`, `Protocol`), or
/// report it upward (`Tpm` and the rest).
#[derive(Debug, Error)]
pub enum Error {
    /// The stream is temporarily empty or the poll timed out; retry.
    #[error("resource temporarily unavailable, try again")]
    TryAgain,
    /// The peer closed the stream.
    #[error("connection closed by peer")]
    NoConnection,
    /// The underlying stream failed.
    #[error("stream I/O failure")]
    Io(#[source] io::Error),
    /// A buffer announced a size outside the bounds the TPM allows.
    #[error("announced buffer size {0} is out of bounds")]
    Protocol(u32),
    /// Wire marshaling or unmarshaling failed.
    #[error("malformed TPM buffer")]
    Wire(#[from] WireError),
    /// A fixed property the broker relies on was not reported by the TPM.
    #[error("fixed TPM property {0:#010x} not found")]
    PropertyNotFound(u32),
    /// An internal invariant does not hold.
    #[error("internal error: {0}")]
    Internal(&'static str),
    /// The TPM rejected a command the broker issued on its own behalf.
    #[error("TPM returned RC {0:#010x}")]
    Tpm(u32),
}

impl Error {
    /// Maps the error onto the layered 32-bit response-code space carried
    /// in synthesized response headers.
    pub fn wire_rc(&self) -> u32 {
        match self {
            Error::TryAgain => TSS2_TCTI_RC_TRY_AGAIN,
            Error::NoConnection => TSS2_TCTI_RC_NO_CONNECTION,
            Error::Io(_) => TSS2_TCTI_RC_IO_ERROR,
            Error::Protocol(_) => TSS2_TCTI_RC_GENERAL_FAILURE,
            Error::Wire(WireError::ShortBuffer(_)) => TSS2_MU_RC_BAD_REFERENCE,
            Error::Wire(_) => TSS2_TCTI_RC_GENERAL_FAILURE,
            Error::PropertyNotFound(_) => TSS2_RESMGR_RC_BAD_VALUE,
            Error::Internal(_) => TSS2_RESMGR_RC_INTERNAL_ERROR,
            Error::Tpm(rc) => *rc,
        }
    }

    /// Folds an I/O error into the taxonomy, separating the transient and
    /// peer-closed cases from real failures.
    pub(crate) fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock => Error::TryAgain,
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::NotConnected => Error::NoConnection,
            _ => Error::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_rc_mapping() {
        assert_eq!(Error::TryAgain.wire_rc(), 0x000a_0009);
        assert_eq!(Error::NoConnection.wire_rc(), 0x000a_0008);
        assert_eq!(
            Error::Io(io::Error::other("boom")).wire_rc(),
            0x000a_000a
        );
        assert_eq!(
            Error::Wire(WireError::ShortBuffer(4)).wire_rc(),
            0x0009_0005
        );
        assert_eq!(Error::PropertyNotFound(0x11e).wire_rc(), 0x000c_000b);
        assert_eq!(Error::Tpm(0x100).wire_rc(), 0x100);
    }

    #[test]
    fn io_error_folding() {
        assert!(matches!(
            Error::from_io(io::ErrorKind::WouldBlock.into()),
            Error::TryAgain
        ));
        assert!(matches!(
            Error::from_io(io::ErrorKind::ConnectionReset.into()),
            Error::NoConnection
        ));
        assert!(matches!(
            Error::from_io(io::ErrorKind::PermissionDenied.into()),
            Error::Io(_)
        ));
    }
}
