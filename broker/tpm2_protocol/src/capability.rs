// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Unmarshaling for `TPM2_GetCapability` response payloads.

use crate::WireError;
use crate::tpm20::TPM2_CAP_HANDLES;
use crate::tpm20::TPM2_CAP_TPM_PROPERTIES;

/// One `(property, value)` pair from a `TPM_PROPERTIES` capability.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TaggedProperty {
    /// Property tag (`TPM2_PT_*`).
    pub property: u32,
    /// Reported value.
    pub value: u32,
}

/// Capability-specific data from a `GetCapability` response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CapabilityData {
    /// Data for `TPM2_CAP_TPM_PROPERTIES`.
    TpmProperties(Vec<TaggedProperty>),
    /// Data for `TPM2_CAP_HANDLES`.
    Handles(Vec<u32>),
}

fn take_u32(payload: &mut &[u8], what: &'static str) -> Result<u32, WireError> {
    let (bytes, rest) = payload
        .split_first_chunk::<4>()
        .ok_or(WireError::Truncated(what))?;
    *payload = rest;
    Ok(u32::from_be_bytes(*bytes))
}

/// Unmarshals a `GetCapability` response payload (the bytes following the
/// response header): `more_data: u8 | capability: u32 | count: u32 |
/// data`.
///
/// Returns the more-data flag and the decoded capability data.
pub fn parse_capability(payload: &[u8]) -> Result<(bool, CapabilityData), WireError> {
    let (&more_data, mut rest) = payload
        .split_first()
        .ok_or(WireError::Truncated("more_data"))?;
    let capability = take_u32(&mut rest, "capability")?;
    let count = take_u32(&mut rest, "count")? as usize;

    let data = match capability {
        TPM2_CAP_TPM_PROPERTIES => {
            if count > rest.len() / 8 {
                return Err(WireError::Truncated("tagged properties"));
            }
            let mut properties = Vec::with_capacity(count);
            for _ in 0..count {
                let property = take_u32(&mut rest, "property")?;
                let value = take_u32(&mut rest, "value")?;
                properties.push(TaggedProperty { property, value });
            }
            CapabilityData::TpmProperties(properties)
        }
        TPM2_CAP_HANDLES => {
            if count > rest.len() / 4 {
                return Err(WireError::Truncated("handles"));
            }
            let mut handles = Vec::with_capacity(count);
            for _ in 0..count {
                handles.push(take_u32(&mut rest, "handle")?);
            }
            CapabilityData::Handles(handles)
        }
        other => return Err(WireError::UnsupportedCapability(other)),
    };
    Ok((more_data != 0, data))
}
