// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Marshaling for the structured commands the resource manager issues on
//! its own behalf: startup, capability queries, and the context
//! save/load/flush lifecycle.
//!
//! Client commands pass through the broker opaquely and never go through
//! this module. None of these commands carries an authorization area, so
//! every buffer is tagged `TPM2_ST_NO_SESSIONS`.

use crate::WireError;
use crate::header::HEADER_SIZE;
use crate::header::Header;
use crate::header::WireHeader;
use crate::tpm20::TPM2_CC_CONTEXT_LOAD;
use crate::tpm20::TPM2_CC_CONTEXT_SAVE;
use crate::tpm20::TPM2_CC_FLUSH_CONTEXT;
use crate::tpm20::TPM2_CC_GET_CAPABILITY;
use crate::tpm20::TPM2_CC_STARTUP;
use crate::tpm20::TPM2_ST_NO_SESSIONS;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;
use zerocopy::Unaligned;
use zerocopy::byteorder::big_endian::U16;
use zerocopy::byteorder::big_endian::U32;

fn command_header<C>(code: u32) -> WireHeader {
    WireHeader::new(Header::new(TPM2_ST_NO_SESSIONS, size_of::<C>() as u32, code))
}

#[repr(C)]
#[derive(IntoBytes, Immutable, KnownLayout, Unaligned)]
struct StartupCmd {
    header: WireHeader,
    startup_type: U16,
}

static_assertions::const_assert_eq!(size_of::<StartupCmd>(), 12);

/// Builds a `TPM2_Startup` command.
pub fn startup(startup_type: u16) -> Vec<u8> {
    let cmd = StartupCmd {
        header: command_header::<StartupCmd>(TPM2_CC_STARTUP),
        startup_type: U16::new(startup_type),
    };
    cmd.as_bytes().to_vec()
}

#[repr(C)]
#[derive(IntoBytes, Immutable, KnownLayout, Unaligned)]
struct GetCapabilityCmd {
    header: WireHeader,
    capability: U32,
    property: U32,
    property_count: U32,
}

static_assertions::const_assert_eq!(size_of::<GetCapabilityCmd>(), 22);

/// Builds a `TPM2_GetCapability` command requesting `property_count`
/// values of `capability` starting at `property`.
pub fn get_capability(capability: u32, property: u32, property_count: u32) -> Vec<u8> {
    let cmd = GetCapabilityCmd {
        header: command_header::<GetCapabilityCmd>(TPM2_CC_GET_CAPABILITY),
        capability: U32::new(capability),
        property: U32::new(property),
        property_count: U32::new(property_count),
    };
    cmd.as_bytes().to_vec()
}

#[repr(C)]
#[derive(IntoBytes, Immutable, KnownLayout, Unaligned)]
struct HandleCmd {
    header: WireHeader,
    handle: U32,
}

static_assertions::const_assert_eq!(size_of::<HandleCmd>(), 14);

fn handle_command(code: u32, handle: u32) -> Vec<u8> {
    let cmd = HandleCmd {
        header: command_header::<HandleCmd>(code),
        handle: U32::new(handle),
    };
    cmd.as_bytes().to_vec()
}

/// Builds a `TPM2_ContextSave` command for `handle`.
pub fn context_save(handle: u32) -> Vec<u8> {
    handle_command(TPM2_CC_CONTEXT_SAVE, handle)
}

/// Builds a `TPM2_FlushContext` command for `handle`.
pub fn flush_context(handle: u32) -> Vec<u8> {
    handle_command(TPM2_CC_FLUSH_CONTEXT, handle)
}

/// Builds a `TPM2_ContextLoad` command replaying previously saved
/// context bytes.
pub fn context_load(context: &[u8]) -> Vec<u8> {
    let header = Header::new(
        TPM2_ST_NO_SESSIONS,
        (HEADER_SIZE + context.len()) as u32,
        TPM2_CC_CONTEXT_LOAD,
    );
    let mut buf = Vec::with_capacity(HEADER_SIZE + context.len());
    buf.extend_from_slice(&header.to_bytes());
    buf.extend_from_slice(context);
    buf
}

/// Splits a complete response buffer into its header and payload,
/// verifying the announced size matches the bytes actually received.
pub fn split_response(buf: &[u8]) -> Result<(Header, &[u8]), WireError> {
    let header = Header::decode(buf)?;
    if header.size as usize != buf.len() {
        return Err(WireError::SizeMismatch {
            announced: header.size,
            actual: buf.len(),
        });
    }
    Ok((header, &buf[HEADER_SIZE..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tpm20::TPM2_CAP_TPM_PROPERTIES;
    use crate::tpm20::TPM2_MAX_TPM_PROPERTIES;
    use crate::tpm20::TPM2_PT_FIXED;
    use crate::tpm20::TPM2_RC_SUCCESS;
    use crate::tpm20::TPM2_SU_CLEAR;

    #[test]
    fn startup_bytes() {
        assert_eq!(
            startup(TPM2_SU_CLEAR),
            [0x80, 0x01, 0x00, 0x00, 0x00, 0x0c, 0x00, 0x00, 0x01, 0x44, 0x00, 0x00]
        );
    }

    #[test]
    fn get_capability_bytes() {
        let cmd = get_capability(TPM2_CAP_TPM_PROPERTIES, TPM2_PT_FIXED, TPM2_MAX_TPM_PROPERTIES);
        assert_eq!(cmd.len(), 22);
        let header = Header::decode(&cmd).unwrap();
        assert_eq!(header.size, 22);
        assert_eq!(header.code, TPM2_CC_GET_CAPABILITY);
        assert_eq!(&cmd[10..14], &[0x00, 0x00, 0x00, 0x06]);
        assert_eq!(&cmd[14..18], &[0x00, 0x00, 0x01, 0x00]);
        assert_eq!(&cmd[18..22], &[0x00, 0x00, 0x00, 0x7f]);
    }

    #[test]
    fn flush_context_bytes() {
        let cmd = flush_context(0x8000_0001);
        assert_eq!(
            cmd,
            [0x80, 0x01, 0x00, 0x00, 0x00, 0x0e, 0x00, 0x00, 0x01, 0x65, 0x80, 0x00, 0x00, 0x01]
        );
    }

    #[test]
    fn context_load_wraps_blob() {
        let blob = [0xde, 0xad, 0xbe, 0xef];
        let cmd = context_load(&blob);
        let header = Header::decode(&cmd).unwrap();
        assert_eq!(header.size as usize, cmd.len());
        assert_eq!(header.code, TPM2_CC_CONTEXT_LOAD);
        assert_eq!(&cmd[HEADER_SIZE..], blob);
    }

    #[test]
    fn split_response_validates_size() {
        let mut buf = Header::new(TPM2_ST_NO_SESSIONS, 12, TPM2_RC_SUCCESS)
            .to_bytes()
            .to_vec();
        buf.extend_from_slice(&[0xaa, 0xbb]);
        let (header, payload) = split_response(&buf).unwrap();
        assert_eq!(header.code, TPM2_RC_SUCCESS);
        assert_eq!(payload, [0xaa, 0xbb]);

        buf.push(0xcc);
        assert_eq!(
            split_response(&buf).unwrap_err(),
            WireError::SizeMismatch {
                announced: 12,
                actual: 13
            }
        );
    }
}
