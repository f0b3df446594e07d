// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache of the TPM's fixed property group.

use tpm2_protocol::TaggedProperty;

/// The `PT_FIXED` property group, captured once when the broker
/// initializes the TPM. Fixed properties cannot change for the lifetime
/// of the device, so the snapshot is never refreshed.
#[derive(Debug, Clone)]
pub struct FixedProperties {
    properties: Vec<TaggedProperty>,
}

impl FixedProperties {
    pub(crate) fn new(properties: Vec<TaggedProperty>) -> Self {
        Self { properties }
    }

    /// Looks up a property by its `TPM2_PT_*` tag.
    pub fn get(&self, property: u32) -> Option<u32> {
        self.properties
            .iter()
            .find(|p| p.property == property)
            .map(|p| p.value)
    }

    /// Number of properties the TPM reported.
    pub fn len(&self) -> usize {
        self.properties.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup() {
        let properties = FixedProperties::new(vec![
            TaggedProperty {
                property: 0x11e,
                value: 4096,
            },
            TaggedProperty {
                property: 0x11f,
                value: 1024,
            },
        ]);
        assert_eq!(properties.get(0x11e), Some(4096));
        assert_eq!(properties.get(0x11f), Some(1024));
        assert_eq!(properties.get(0x120), None);
        assert_eq!(properties.len(), 2);
    }
}
