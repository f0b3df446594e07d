// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Layered 32-bit response codes.
//!
//! Response codes carry the originating software layer in bits 16..24 so
//! a client can tell a TPM-reported failure from one synthesized by the
//! transport or the resource manager. The layer numbers and base codes
//! follow the TCG TSS 2.0 common definitions, which is what clients of
//! the original daemon protocol expect on the wire.

/// Bit position of the layer indicator within a response code.
pub const TSS2_RC_LAYER_SHIFT: u32 = 16;

/// Returns the layer bits for layer number `layer`.
pub const fn tss2_rc_layer(layer: u32) -> u32 {
    layer << TSS2_RC_LAYER_SHIFT
}

/// The operation succeeded (all layers share this value).
pub const TSS2_RC_SUCCESS: u32 = 0;

/// Layer bits for the marshaling/unmarshaling layer.
pub const TSS2_MU_RC_LAYER: u32 = tss2_rc_layer(9);
/// Layer bits for the TCTI transport layer.
pub const TSS2_TCTI_RC_LAYER: u32 = tss2_rc_layer(10);
/// Layer bits for TPM response codes forwarded by the resource manager.
pub const TSS2_RESMGR_TPM_RC_LAYER: u32 = tss2_rc_layer(11);
/// Layer bits for response codes originated by the resource manager.
pub const TSS2_RESMGR_RC_LAYER: u32 = tss2_rc_layer(12);

/// Base code: catch-all failure.
pub const TSS2_BASE_RC_GENERAL_FAILURE: u32 = 1;
/// Base code: a reference parameter was invalid.
pub const TSS2_BASE_RC_BAD_REFERENCE: u32 = 5;
/// Base code: the peer closed the connection.
pub const TSS2_BASE_RC_NO_CONNECTION: u32 = 8;
/// Base code: transient failure, retry later.
pub const TSS2_BASE_RC_TRY_AGAIN: u32 = 9;
/// Base code: the underlying I/O channel failed.
pub const TSS2_BASE_RC_IO_ERROR: u32 = 10;
/// Base code: a value parameter was out of range.
pub const TSS2_BASE_RC_BAD_VALUE: u32 = 11;

/// Marshaling failed on an invalid or undersized buffer reference.
pub const TSS2_MU_RC_BAD_REFERENCE: u32 = TSS2_MU_RC_LAYER | TSS2_BASE_RC_BAD_REFERENCE;

/// Transport-level catch-all failure.
pub const TSS2_TCTI_RC_GENERAL_FAILURE: u32 = TSS2_TCTI_RC_LAYER | TSS2_BASE_RC_GENERAL_FAILURE;
/// The peer closed the transport.
pub const TSS2_TCTI_RC_NO_CONNECTION: u32 = TSS2_TCTI_RC_LAYER | TSS2_BASE_RC_NO_CONNECTION;
/// The transport is temporarily empty or busy.
pub const TSS2_TCTI_RC_TRY_AGAIN: u32 = TSS2_TCTI_RC_LAYER | TSS2_BASE_RC_TRY_AGAIN;
/// The transport failed with an I/O error.
pub const TSS2_TCTI_RC_IO_ERROR: u32 = TSS2_TCTI_RC_LAYER | TSS2_BASE_RC_IO_ERROR;

/// An internal resource-manager invariant did not hold.
pub const TSS2_RESMGR_RC_INTERNAL_ERROR: u32 = TSS2_RESMGR_RC_LAYER | TSS2_BASE_RC_GENERAL_FAILURE;
/// A resource-manager lookup missed.
pub const TSS2_RESMGR_RC_BAD_VALUE: u32 = TSS2_RESMGR_RC_LAYER | TSS2_BASE_RC_BAD_VALUE;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layered_values() {
        assert_eq!(TSS2_TCTI_RC_IO_ERROR, 0x000a_000a);
        assert_eq!(TSS2_TCTI_RC_TRY_AGAIN, 0x000a_0009);
        assert_eq!(TSS2_TCTI_RC_NO_CONNECTION, 0x000a_0008);
        assert_eq!(TSS2_MU_RC_BAD_REFERENCE, 0x0009_0005);
        assert_eq!(TSS2_RESMGR_RC_BAD_VALUE, 0x000c_000b);
    }
}
