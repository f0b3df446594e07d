// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A scripted TCTI double plus builders for the response buffers the
//! broker's structured calls expect.

use crate::Error;
use crate::tcti::Tcti;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tpm2_protocol::Header;
use tpm2_protocol::tpm20::TPM2_CAP_HANDLES;
use tpm2_protocol::tpm20::TPM2_CAP_TPM_PROPERTIES;
use tpm2_protocol::tpm20::TPM2_PT_MAX_COMMAND_SIZE;
use tpm2_protocol::tpm20::TPM2_PT_MAX_RESPONSE_SIZE;
use tpm2_protocol::tpm20::TPM2_RC_SUCCESS;
use tpm2_protocol::tpm20::TPM2_ST_NO_SESSIONS;

/// One entry in the transport's transmit/receive log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A buffer was transmitted.
    Transmit(Vec<u8>),
    /// A response was (or failed to be) received.
    Receive,
}

/// One scripted exchange.
pub enum Step {
    /// Transmit succeeds; receive returns these bytes.
    Reply(Vec<u8>),
    /// Transmit fails with this error.
    TransmitError(Error),
    /// Transmit succeeds; receive fails with this error.
    ReceiveError(Error),
}

/// Scripted TCTI double that records every exchange.
///
/// Each transmit consumes the next [`Step`]; an unscripted transmit
/// panics so a test cannot silently run past its script.
pub struct MockTcti {
    script: VecDeque<Step>,
    log: Arc<Mutex<Vec<Event>>>,
    transmit_delay: Option<Duration>,
    pending: Option<Result<Vec<u8>, Error>>,
}

impl MockTcti {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            log: Arc::new(Mutex::new(Vec::new())),
            transmit_delay: None,
            pending: None,
        }
    }

    /// Appends a successful exchange returning `response`.
    pub fn reply(mut self, response: Vec<u8>) -> Self {
        self.script.push_back(Step::Reply(response));
        self
    }

    /// Appends `count` identical successful exchanges.
    pub fn reply_n(mut self, response: Vec<u8>, count: usize) -> Self {
        for _ in 0..count {
            self.script.push_back(Step::Reply(response.clone()));
        }
        self
    }

    /// Appends an exchange whose transmit fails.
    pub fn transmit_error(mut self, err: Error) -> Self {
        self.script.push_back(Step::TransmitError(err));
        self
    }

    /// Appends an exchange whose receive fails.
    pub fn receive_error(mut self, err: Error) -> Self {
        self.script.push_back(Step::ReceiveError(err));
        self
    }

    /// Sleeps this long inside every transmit.
    pub fn with_transmit_delay(mut self, delay: Duration) -> Self {
        self.transmit_delay = Some(delay);
        self
    }

    /// Handle on the transmit/receive log, usable after the mock has
    /// moved into a broker.
    pub fn log(&self) -> Arc<Mutex<Vec<Event>>> {
        self.log.clone()
    }
}

impl Tcti for MockTcti {
    fn transmit(&mut self, buf: &[u8]) -> Result<(), Error> {
        if let Some(delay) = self.transmit_delay {
            std::thread::sleep(delay);
        }
        self.log.lock().push(Event::Transmit(buf.to_vec()));
        match self.script.pop_front() {
            Some(Step::Reply(bytes)) => {
                self.pending = Some(Ok(bytes));
                Ok(())
            }
            Some(Step::TransmitError(err)) => Err(err),
            Some(Step::ReceiveError(err)) => {
                self.pending = Some(Err(err));
                Ok(())
            }
            None => panic!("unscripted transmit: {:02x?}", buf),
        }
    }

    fn receive(&mut self, buf: &mut [u8], _timeout_ms: i32) -> Result<usize, Error> {
        self.log.lock().push(Event::Receive);
        let bytes = self
            .pending
            .take()
            .expect("receive without a prior transmit")?;
        assert!(
            bytes.len() <= buf.len(),
            "scripted response of {} bytes exceeds the receive buffer of {}",
            bytes.len(),
            buf.len()
        );
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }
}

/// A header-only response carrying `rc`.
pub fn rc_response(rc: u32) -> Vec<u8> {
    Header::new(TPM2_ST_NO_SESSIONS, 10, rc).to_bytes().to_vec()
}

fn capability_response(capability: u32, count: u32, data: &[u8]) -> Vec<u8> {
    let size = 10 + 1 + 4 + 4 + data.len();
    let mut buf = Header::new(TPM2_ST_NO_SESSIONS, size as u32, TPM2_RC_SUCCESS)
        .to_bytes()
        .to_vec();
    buf.push(0); // more_data
    buf.extend_from_slice(&capability.to_be_bytes());
    buf.extend_from_slice(&count.to_be_bytes());
    buf.extend_from_slice(data);
    buf
}

/// A `GetCapability(TPM_PROPERTIES)` response carrying `pairs`.
pub fn properties_response(pairs: &[(u32, u32)]) -> Vec<u8> {
    let mut data = Vec::new();
    for (property, value) in pairs {
        data.extend_from_slice(&property.to_be_bytes());
        data.extend_from_slice(&value.to_be_bytes());
    }
    capability_response(TPM2_CAP_TPM_PROPERTIES, pairs.len() as u32, &data)
}

/// A `GetCapability(HANDLES)` response carrying `handles`.
pub fn handles_response(handles: &[u32]) -> Vec<u8> {
    let mut data = Vec::new();
    for handle in handles {
        data.extend_from_slice(&handle.to_be_bytes());
    }
    capability_response(TPM2_CAP_HANDLES, handles.len() as u32, &data)
}

/// A `TPM2_ContextSave` response carrying `blob` as the marshaled
/// context.
pub fn context_save_response(blob: &[u8]) -> Vec<u8> {
    let mut buf = Header::new(
        TPM2_ST_NO_SESSIONS,
        (10 + blob.len()) as u32,
        TPM2_RC_SUCCESS,
    )
    .to_bytes()
    .to_vec();
    buf.extend_from_slice(blob);
    buf
}

/// A `TPM2_ContextLoad` response assigning `handle`.
pub fn context_load_response(handle: u32) -> Vec<u8> {
    let mut buf = Header::new(TPM2_ST_NO_SESSIONS, 14, TPM2_RC_SUCCESS)
        .to_bytes()
        .to_vec();
    buf.extend_from_slice(&handle.to_be_bytes());
    buf
}

/// Max command/response sizes reported by [`scripted_init`].
pub const MOCK_MAX_COMMAND_SIZE: u32 = 4096;
pub const MOCK_MAX_RESPONSE_SIZE: u32 = 2048;

/// Scripts the two exchanges `init_tpm` performs: a clean startup and
/// the fixed-property snapshot.
pub fn scripted_init(mock: MockTcti) -> MockTcti {
    mock.reply(rc_response(TPM2_RC_SUCCESS))
        .reply(properties_response(&[
            (TPM2_PT_MAX_COMMAND_SIZE, MOCK_MAX_COMMAND_SIZE),
            (TPM2_PT_MAX_RESPONSE_SIZE, MOCK_MAX_RESPONSE_SIZE),
        ]))
}
