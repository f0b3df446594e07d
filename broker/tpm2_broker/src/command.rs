// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Command and response values carried between the dispatch layer and
//! the broker.
//!
//! A command's payload is opaque to the broker; only the header is ever
//! decoded, and the bytes are forwarded to the TPM untouched. A response
//! always carries the connection reference of the command that produced
//! it, so the dispatch layer can route it without further bookkeeping.

use crate::Error;
use crate::connection::Connection;
use std::sync::Arc;
use tpm2_protocol::HEADER_SIZE;
use tpm2_protocol::Header;
use tpm2_protocol::TpmaCc;
use tpm2_protocol::rc::TSS2_RC_SUCCESS;
use tpm2_protocol::tpm20::TPM2_ST_NO_SESSIONS;

/// One TPM command submitted on behalf of a client connection.
#[derive(Debug)]
pub struct Command {
    connection: Arc<Connection>,
    buffer: Vec<u8>,
    attributes: TpmaCc,
}

impl Command {
    /// Wraps a raw command buffer received from `connection`.
    pub fn new(connection: Arc<Connection>, buffer: Vec<u8>, attributes: TpmaCc) -> Self {
        Self {
            connection,
            buffer,
            attributes,
        }
    }

    /// The raw command bytes, exactly as received from the client.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Decodes the command header.
    pub fn header(&self) -> Result<Header, Error> {
        Ok(Header::decode(&self.buffer)?)
    }

    /// The connection this command arrived on.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// The command's `TPMA_CC` attributes.
    pub fn attributes(&self) -> TpmaCc {
        self.attributes
    }
}

/// One TPM response routed back to the originating connection.
#[derive(Debug)]
pub struct Response {
    connection: Arc<Connection>,
    buffer: Vec<u8>,
    attributes: TpmaCc,
    rc: u32,
}

impl Response {
    /// Wraps a response buffer received from the TPM.
    pub(crate) fn new(connection: Arc<Connection>, buffer: Vec<u8>, attributes: TpmaCc) -> Self {
        Self {
            connection,
            buffer,
            attributes,
            rc: TSS2_RC_SUCCESS,
        }
    }

    /// Builds a synthesized response for a command that never made it
    /// through the TPM: a bare header whose code field carries the
    /// failure RC.
    pub(crate) fn from_error(connection: Arc<Connection>, attributes: TpmaCc, err: &Error) -> Self {
        let rc = err.wire_rc();
        let header = Header::new(TPM2_ST_NO_SESSIONS, HEADER_SIZE as u32, rc);
        Self {
            connection,
            buffer: header.to_bytes().to_vec(),
            attributes,
            rc,
        }
    }

    /// The raw response bytes, exactly as received from the TPM (or the
    /// synthesized header for a failed exchange).
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Total response size in bytes.
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    /// The connection the originating command arrived on.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Attributes inherited from the originating command.
    pub fn attributes(&self) -> TpmaCc {
        self.attributes
    }

    /// Broker-level result of the exchange; `TSS2_RC_SUCCESS` when the
    /// command reached the TPM and a response came back.
    pub fn rc(&self) -> u32 {
        self.rc
    }

    /// The response code the TPM reported in the response header.
    pub fn tpm_rc(&self) -> Result<u32, Error> {
        Ok(Header::decode(&self.buffer)?.code)
    }
}
