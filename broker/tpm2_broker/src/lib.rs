// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The access-broker core of a TPM 2.0 resource manager.
//!
//! A TPM is a single-threaded device: one command in flight, a handful of
//! slots for transient objects and sessions. This crate is the
//! serialization point between any number of client-servicing threads and
//! that one device. [`AccessBroker`] owns the transport outright and runs
//! every TPM exchange under a single mutex; [`framed`] assembles complete
//! command buffers from non-blocking client streams; [`Connection`] is
//! the shared handle that ties a response back to the client that sent
//! the command.
//!
//! The broker moves client command and response buffers bit-for-bit. The
//! only commands it marshals itself are startup, capability queries, and
//! the context save/load/flush lifecycle that lets a higher layer
//! virtualize the TPM's slot pressure.

pub mod broker;
pub mod command;
pub mod connection;
pub mod error;
pub mod framed;
pub mod properties;
pub mod tcti;
mod util;

#[cfg(test)]
mod tests;

pub use broker::AccessBroker;
pub use broker::ContextBlob;
pub use command::Command;
pub use command::Response;
pub use connection::Connection;
pub use error::Error;
pub use framed::MAX_BUFFER;
pub use properties::FixedProperties;
pub use tcti::TIMEOUT_BLOCK;
pub use tcti::Tcti;
