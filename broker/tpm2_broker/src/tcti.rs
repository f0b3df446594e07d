// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The transport seam between the broker and the TPM.

use crate::Error;

/// Receive timeout meaning "wait indefinitely".
pub const TIMEOUT_BLOCK: i32 = -1;

/// Byte-oriented transport to a TPM device or simulator.
///
/// The broker owns exactly one implementation and serializes all calls,
/// so implementations need not be thread-safe beyond `Send`.
pub trait Tcti: Send {
    /// Sends one complete command buffer to the TPM.
    fn transmit(&mut self, buf: &[u8]) -> Result<(), Error>;

    /// Receives one complete response buffer from the TPM, filling at
    /// most `buf.len()` bytes and returning the count actually written.
    ///
    /// A `timeout_ms` of [`TIMEOUT_BLOCK`] waits indefinitely.
    fn receive(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, Error>;
}
