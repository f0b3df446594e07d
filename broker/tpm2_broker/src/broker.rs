// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Serialized access to the single underlying TPM transport.

use crate::Error;
use crate::command::Command;
use crate::command::Response;
use crate::properties::FixedProperties;
use crate::tcti::TIMEOUT_BLOCK;
use crate::tcti::Tcti;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use tpm2_protocol::CapabilityData;
use tpm2_protocol::HEADER_SIZE;
use tpm2_protocol::WireError;
use tpm2_protocol::capability;
use tpm2_protocol::command;
use tpm2_protocol::tpm20::TPM2_ACTIVE_SESSION_FIRST;
use tpm2_protocol::tpm20::TPM2_ACTIVE_SESSION_LAST;
use tpm2_protocol::tpm20::TPM2_CAP_HANDLES;
use tpm2_protocol::tpm20::TPM2_CAP_TPM_PROPERTIES;
use tpm2_protocol::tpm20::TPM2_LOADED_SESSION_FIRST;
use tpm2_protocol::tpm20::TPM2_LOADED_SESSION_LAST;
use tpm2_protocol::tpm20::TPM2_MAX_RESPONSE_SIZE;
use tpm2_protocol::tpm20::TPM2_MAX_TPM_PROPERTIES;
use tpm2_protocol::tpm20::TPM2_PT_FIXED;
use tpm2_protocol::tpm20::TPM2_PT_MAX_COMMAND_SIZE;
use tpm2_protocol::tpm20::TPM2_PT_MAX_RESPONSE_SIZE;
use tpm2_protocol::tpm20::TPM2_RC_INITIALIZE;
use tpm2_protocol::tpm20::TPM2_RC_SUCCESS;
use tpm2_protocol::tpm20::TPM2_SU_CLEAR;
use tpm2_protocol::tpm20::TPM2_TRANSIENT_FIRST;
use tpm2_protocol::tpm20::TPM2_TRANSIENT_LAST;

/// Opaque marshaled context bytes, as produced by `TPM2_ContextSave` and
/// accepted back by `TPM2_ContextLoad`. The broker never looks inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBlob(Vec<u8>);

impl ContextBlob {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The marshaled context bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Serialization point between client-servicing threads and the TPM.
///
/// The broker owns the transport outright and runs every TPM exchange
/// under one mutex, so at most one command is in flight at any time.
/// Threads observe whatever order the mutex grants; a caller needing a
/// multi-command sequence must coordinate externally or use a composite
/// operation such as [`AccessBroker::save_then_flush`].
///
/// [`AccessBroker::init_tpm`] must succeed before anything else is
/// called; it is the only operation that mutates broker state.
pub struct AccessBroker<T> {
    tcti: Mutex<T>,
    initialized: AtomicBool,
    properties: OnceLock<FixedProperties>,
}

impl<T: Tcti> AccessBroker<T> {
    /// Creates a broker around `tcti`. The TPM is not touched until
    /// [`AccessBroker::init_tpm`] runs.
    pub fn new(tcti: T) -> Self {
        Self {
            tcti: Mutex::new(tcti),
            initialized: AtomicBool::new(false),
            properties: OnceLock::new(),
        }
    }

    /// One-shot TPM initialization: `TPM2_Startup(CLEAR)` followed by a
    /// snapshot of the fixed property group.
    ///
    /// Idempotent: later calls (and concurrent racers) return once the
    /// first success lands. A failure leaves the broker uninitialized so
    /// the caller may retry.
    pub fn init_tpm(&self) -> Result<(), Error> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        let mut tcti = self.tcti.lock();
        // A racer may have initialized while this thread waited on the
        // lock.
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        Self::send_startup(&mut tcti)?;
        let properties = Self::fetch_fixed_properties(&mut tcti)?;
        tracing::debug!("cached {} fixed TPM properties", properties.len());
        let _ = self.properties.set(properties);
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    fn send_startup(tcti: &mut T) -> Result<(), Error> {
        match Self::execute(tcti, &command::startup(TPM2_SU_CLEAR)) {
            Ok(_) => Ok(()),
            // The platform firmware may already have started the TPM.
            Err(Error::Tpm(TPM2_RC_INITIALIZE)) => Ok(()),
            Err(err) => {
                tracing::warn!("TPM2_Startup failed: {err}");
                Err(err)
            }
        }
    }

    fn fetch_fixed_properties(tcti: &mut T) -> Result<FixedProperties, Error> {
        let (_, data) = Self::get_capability(
            tcti,
            TPM2_CAP_TPM_PROPERTIES,
            TPM2_PT_FIXED,
            TPM2_MAX_TPM_PROPERTIES,
        )?;
        match data {
            CapabilityData::TpmProperties(properties) => Ok(FixedProperties::new(properties)),
            CapabilityData::Handles(_) => {
                Err(Error::Internal("GetCapability returned the wrong capability"))
            }
        }
    }

    /// Sends a client command to the TPM and returns exactly one
    /// response.
    ///
    /// Transport failures do not bubble out of this method: they come
    /// back as a synthesized response carrying the failure RC and the
    /// originating connection, so the caller's dispatch loop stays total.
    pub fn send_command(&self, command: &Command) -> Response {
        let connection = Arc::clone(command.connection());
        let max_response = match self.max_response_size() {
            Ok(size) => size,
            Err(err) => return Response::from_error(connection, command.attributes(), &err),
        };

        let mut tcti = self.tcti.lock();
        if let Err(err) = tcti.transmit(command.buffer()) {
            drop(tcti);
            tracing::warn!("connection {}: failed to transmit command: {err}", connection.id());
            return Response::from_error(connection, command.attributes(), &err);
        }
        let mut buf = vec![0u8; max_response as usize];
        let received = tcti.receive(&mut buf, TIMEOUT_BLOCK);
        drop(tcti);

        match received {
            Ok(len) => {
                buf.truncate(len);
                Response::new(connection, buf, command.attributes())
            }
            Err(err) => {
                tracing::warn!("connection {}: failed to receive response: {err}", connection.id());
                Response::from_error(connection, command.attributes(), &err)
            }
        }
    }

    /// Externalizes the TPM-internal context behind `handle` via
    /// `TPM2_ContextSave`. The handle remains valid on the TPM.
    pub fn context_save(&self, handle: u32) -> Result<ContextBlob, Error> {
        self.ensure_initialized()?;
        tracing::debug!("saving context for handle {handle:#010x}");
        let mut tcti = self.tcti.lock();
        let response = Self::execute(&mut tcti, &command::context_save(handle))?;
        Ok(ContextBlob::new(response[HEADER_SIZE..].to_vec()))
    }

    /// Reinstalls previously saved context bytes via `TPM2_ContextLoad`,
    /// returning the (possibly different) handle the TPM assigned.
    pub fn context_load(&self, context: &ContextBlob) -> Result<u32, Error> {
        self.ensure_initialized()?;
        let mut tcti = self.tcti.lock();
        let response = Self::execute(&mut tcti, &command::context_load(context.as_bytes()))?;
        drop(tcti);
        let handle = response[HEADER_SIZE..]
            .first_chunk::<4>()
            .map(|bytes| u32::from_be_bytes(*bytes))
            .ok_or(Error::Wire(WireError::Truncated("loaded handle")))?;
        tracing::debug!("loaded context, got handle {handle:#010x}");
        Ok(handle)
    }

    /// Destroys the TPM-internal context behind `handle` via
    /// `TPM2_FlushContext`.
    pub fn context_flush(&self, handle: u32) -> Result<(), Error> {
        self.ensure_initialized()?;
        tracing::debug!("flushing context for handle {handle:#010x}");
        let mut tcti = self.tcti.lock();
        match Self::execute(&mut tcti, &command::flush_context(handle)) {
            Ok(_) => Ok(()),
            Err(err) => {
                tracing::warn!("failed to flush context for handle {handle:#010x}: {err}");
                Err(err)
            }
        }
    }

    /// Saves the context behind `handle`, then flushes the handle, under
    /// one lock acquisition.
    ///
    /// A flush failure after a successful save is logged but not
    /// surfaced: the context bytes are already externalized, and some
    /// TPMs retire the handle during the save, so losing it costs
    /// nothing.
    pub fn save_then_flush(&self, handle: u32) -> Result<ContextBlob, Error> {
        self.ensure_initialized()?;
        tracing::debug!("saving and flushing context for handle {handle:#010x}");
        let mut tcti = self.tcti.lock();
        let response = Self::execute(&mut tcti, &command::context_save(handle))?;
        if let Err(err) = Self::execute(&mut tcti, &command::flush_context(handle)) {
            tracing::warn!("failed to flush handle {handle:#010x} after save: {err}");
        }
        Ok(ContextBlob::new(response[HEADER_SIZE..].to_vec()))
    }

    /// Best-effort flush of every active session, loaded session, and
    /// transient object on the TPM, under one lock acquisition so no
    /// client command can interleave.
    pub fn flush_all_contexts(&self) {
        if self.ensure_initialized().is_err() {
            tracing::warn!("flush_all_contexts called before the TPM was initialized");
            return;
        }
        let ranges = [
            (TPM2_ACTIVE_SESSION_FIRST, TPM2_ACTIVE_SESSION_LAST),
            (TPM2_LOADED_SESSION_FIRST, TPM2_LOADED_SESSION_LAST),
            (TPM2_TRANSIENT_FIRST, TPM2_TRANSIENT_LAST),
        ];
        let mut tcti = self.tcti.lock();
        for (first, last) in ranges {
            if let Err(err) = Self::flush_range(&mut tcti, first, last) {
                tracing::warn!(
                    "failed to enumerate handles in [{first:#010x}, {last:#010x}]: {err}"
                );
            }
        }
    }

    /// Flushes every handle the TPM reports in `[first, last]`. Failures
    /// on individual handles are logged and skipped; only the handle
    /// enumeration itself can fail.
    fn flush_range(tcti: &mut T, first: u32, last: u32) -> Result<(), Error> {
        let (_, data) = Self::get_capability(tcti, TPM2_CAP_HANDLES, first, last - first)?;
        let CapabilityData::Handles(handles) = data else {
            return Err(Error::Internal("GetCapability returned the wrong capability"));
        };
        tracing::debug!(
            "flushing {} handles in [{first:#010x}, {last:#010x}]",
            handles.len()
        );
        for handle in handles {
            if let Err(err) = Self::execute(tcti, &command::flush_context(handle)) {
                tracing::warn!("failed to flush context for handle {handle:#010x}: {err}");
            }
        }
        Ok(())
    }

    /// Number of transient objects currently loaded on the TPM.
    pub fn trans_object_count(&self) -> Result<u32, Error> {
        self.ensure_initialized()?;
        let mut tcti = self.tcti.lock();
        let (_, data) = Self::get_capability(
            &mut tcti,
            TPM2_CAP_HANDLES,
            TPM2_TRANSIENT_FIRST,
            TPM2_TRANSIENT_LAST - TPM2_TRANSIENT_FIRST,
        )?;
        match data {
            CapabilityData::Handles(handles) => Ok(handles.len() as u32),
            CapabilityData::TpmProperties(_) => {
                Err(Error::Internal("GetCapability returned the wrong capability"))
            }
        }
    }

    /// The TPM's `PT_MAX_COMMAND_SIZE` fixed property.
    pub fn max_command_size(&self) -> Result<u32, Error> {
        self.fixed_property(TPM2_PT_MAX_COMMAND_SIZE)
    }

    /// The TPM's `PT_MAX_RESPONSE_SIZE` fixed property.
    pub fn max_response_size(&self) -> Result<u32, Error> {
        self.fixed_property(TPM2_PT_MAX_RESPONSE_SIZE)
    }

    /// Read-only view of the cached fixed property group, once
    /// initialization has run.
    pub fn fixed_properties(&self) -> Option<&FixedProperties> {
        self.properties.get()
    }

    fn fixed_property(&self, property: u32) -> Result<u32, Error> {
        let properties = self
            .properties
            .get()
            .ok_or(Error::Internal("broker is not initialized"))?;
        properties
            .get(property)
            .ok_or(Error::PropertyNotFound(property))
    }

    fn ensure_initialized(&self) -> Result<(), Error> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::Internal("broker is not initialized"))
        }
    }

    fn get_capability(
        tcti: &mut T,
        cap: u32,
        property: u32,
        count: u32,
    ) -> Result<(bool, CapabilityData), Error> {
        let response = Self::execute(tcti, &command::get_capability(cap, property, count))?;
        Ok(capability::parse_capability(&response[HEADER_SIZE..])?)
    }

    /// Runs one structured command round-trip on the locked transport and
    /// returns the complete response buffer after checking the TPM's RC.
    fn execute(tcti: &mut T, cmd: &[u8]) -> Result<Vec<u8>, Error> {
        tcti.transmit(cmd)?;
        let mut buf = vec![0u8; TPM2_MAX_RESPONSE_SIZE as usize];
        let len = tcti.receive(&mut buf, TIMEOUT_BLOCK)?;
        buf.truncate(len);
        let (header, _) = command::split_response(&buf)?;
        if header.code != TPM2_RC_SUCCESS {
            return Err(Error::Tpm(header.code));
        }
        Ok(buf)
    }
}
