// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Constants from the TPM 2.0 Library specification, Part 2 (Structures).
//!
//! Only the subset the resource manager actually touches is defined here;
//! values are spelled exactly as the specification defines them.

use bitfield_struct::bitfield;

/// Tag for a command/response without an authorization area.
pub const TPM2_ST_NO_SESSIONS: u16 = 0x8001;
/// Tag for a command/response carrying an authorization area.
pub const TPM2_ST_SESSIONS: u16 = 0x8002;

/// `TPM2_Startup` argument: preserve no state from the previous cycle.
pub const TPM2_SU_CLEAR: u16 = 0x0000;

/// `TPM2_ContextLoad` command code.
pub const TPM2_CC_CONTEXT_LOAD: u32 = 0x0000_0161;
/// `TPM2_ContextSave` command code.
pub const TPM2_CC_CONTEXT_SAVE: u32 = 0x0000_0162;
/// `TPM2_FlushContext` command code.
pub const TPM2_CC_FLUSH_CONTEXT: u32 = 0x0000_0165;
/// `TPM2_GetCapability` command code.
pub const TPM2_CC_GET_CAPABILITY: u32 = 0x0000_017a;
/// `TPM2_Startup` command code.
pub const TPM2_CC_STARTUP: u32 = 0x0000_0144;

/// Capability group: handles of a given type.
pub const TPM2_CAP_HANDLES: u32 = 0x0000_0001;
/// Capability group: tagged TPM properties.
pub const TPM2_CAP_TPM_PROPERTIES: u32 = 0x0000_0006;

/// Stride between TPM property groups.
pub const TPM2_PT_GROUP: u32 = 0x0000_0100;
/// First tag of the fixed property group.
pub const TPM2_PT_FIXED: u32 = TPM2_PT_GROUP;
/// Largest command the TPM accepts, including the header.
pub const TPM2_PT_MAX_COMMAND_SIZE: u32 = TPM2_PT_FIXED + 30;
/// Largest response the TPM produces, including the header.
pub const TPM2_PT_MAX_RESPONSE_SIZE: u32 = TPM2_PT_FIXED + 31;
/// Most tagged properties one `GetCapability` response can carry.
pub const TPM2_MAX_TPM_PROPERTIES: u32 = 127;

/// Bit position of the handle-type octet within a handle.
pub const TPM2_HR_SHIFT: u32 = 24;
/// Handle type of a loaded session.
pub const TPM2_HT_LOADED_SESSION: u32 = 0x02;
/// Handle type of a saved (active but context-saved) session.
pub const TPM2_HT_SAVED_SESSION: u32 = 0x03;
/// Handle type of a transient object.
pub const TPM2_HT_TRANSIENT: u32 = 0x80;
/// Sessions a minimally-conformant TPM tracks at once.
pub const TPM2_MAX_ACTIVE_SESSIONS: u32 = 64;
/// Transient objects a minimally-conformant TPM loads at once.
pub const TPM2_MAX_LOADED_OBJECTS: u32 = 3;

/// First handle in the loaded-session range.
pub const TPM2_LOADED_SESSION_FIRST: u32 = TPM2_HT_LOADED_SESSION << TPM2_HR_SHIFT;
/// Last handle in the loaded-session range.
pub const TPM2_LOADED_SESSION_LAST: u32 = TPM2_LOADED_SESSION_FIRST + TPM2_MAX_ACTIVE_SESSIONS - 1;
/// First handle in the active-session range.
pub const TPM2_ACTIVE_SESSION_FIRST: u32 = TPM2_HT_SAVED_SESSION << TPM2_HR_SHIFT;
/// Last handle in the active-session range.
pub const TPM2_ACTIVE_SESSION_LAST: u32 = TPM2_ACTIVE_SESSION_FIRST + TPM2_MAX_ACTIVE_SESSIONS - 1;
/// First handle in the transient-object range.
pub const TPM2_TRANSIENT_FIRST: u32 = TPM2_HT_TRANSIENT << TPM2_HR_SHIFT;
/// Last handle in the transient-object range.
pub const TPM2_TRANSIENT_LAST: u32 = TPM2_TRANSIENT_FIRST + TPM2_MAX_LOADED_OBJECTS - 1;

/// Largest command buffer the TPM accepts.
pub const TPM2_MAX_COMMAND_SIZE: u32 = 4096;
/// Largest response buffer the TPM produces.
pub const TPM2_MAX_RESPONSE_SIZE: u32 = 4096;

/// The TPM accepted the command.
pub const TPM2_RC_SUCCESS: u32 = 0x000;
/// Base of the format-one response code space.
pub const TPM2_RC_FMT1: u32 = 0x080;
/// A handle argument did not reference a valid resource.
pub const TPM2_RC_HANDLE: u32 = TPM2_RC_FMT1 + 0x00b;
/// Base of the format-zero version-one response code space.
pub const TPM2_RC_VER1: u32 = 0x100;
/// `TPM2_Startup` was issued to an already-started TPM.
pub const TPM2_RC_INITIALIZE: u32 = TPM2_RC_VER1;

/// `TPMA_CC`: per-command attributes reported by the TPM.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct TpmaCc {
    /// Index of the command within its command-code space.
    #[bits(16)]
    pub command_index: u16,
    #[bits(6)]
    _reserved: u8,
    /// The command may write to NV storage.
    pub nv: bool,
    /// The command could flush any number of loaded contexts.
    pub extensive: bool,
    /// The context of the first handle is flushed when the command
    /// completes.
    pub flushed: bool,
    /// Number of handles in the command's handle area.
    #[bits(3)]
    pub c_handles: u8,
    /// The response carries a handle area.
    pub r_handle: bool,
    /// The command is defined in a vendor extension space.
    pub v: bool,
    #[bits(2)]
    _res: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_ranges() {
        assert_eq!(TPM2_TRANSIENT_FIRST, 0x8000_0000);
        assert_eq!(TPM2_TRANSIENT_LAST, 0x8000_0002);
        assert_eq!(TPM2_LOADED_SESSION_FIRST, 0x0200_0000);
        assert_eq!(TPM2_LOADED_SESSION_LAST, 0x0200_003f);
        assert_eq!(TPM2_ACTIVE_SESSION_FIRST, 0x0300_0000);
        assert_eq!(TPM2_ACTIVE_SESSION_LAST, 0x0300_003f);
    }

    #[test]
    fn fixed_property_tags() {
        assert_eq!(TPM2_PT_MAX_COMMAND_SIZE, 0x11e);
        assert_eq!(TPM2_PT_MAX_RESPONSE_SIZE, 0x11f);
    }

    #[test]
    fn tpma_cc_fields() {
        // TPM2_CC_Startup with one command handle and the NV bit set.
        let attrs = TpmaCc::from(0x0240_0144);
        assert_eq!(attrs.command_index(), 0x144);
        assert!(attrs.nv());
        assert!(!attrs.extensive());
        assert!(!attrs.flushed());
        assert_eq!(attrs.c_handles(), 1);
        assert!(!attrs.r_handle());
        assert!(!attrs.v());
    }

    #[test]
    fn tpma_cc_round_trip() {
        let attrs = TpmaCc::new()
            .with_command_index(0x162)
            .with_flushed(true)
            .with_c_handles(1);
        assert_eq!(TpmaCc::from(u32::from(attrs)), attrs);
    }
}
