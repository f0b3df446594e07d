// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Logging helpers.

use std::fmt::Write;

const HEX_LIMIT: usize = 64;

/// Renders the leading bytes of `buf` as hex for trace-level wire
/// logging, truncating past [`HEX_LIMIT`] bytes.
pub(crate) fn hex(buf: &[u8]) -> String {
    let shown = &buf[..buf.len().min(HEX_LIMIT)];
    let mut out = String::with_capacity(shown.len() * 3 + 2);
    for (i, byte) in shown.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02x}");
    }
    if buf.len() > HEX_LIMIT {
        out.push_str(" ..");
    }
    out
}
