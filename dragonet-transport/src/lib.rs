//! Dragonet transport interface
//!
//! The crate provides an interface between an inter-core transport library and the Dragonet
//! stack. Limited scope facilitates compatibility across versions.
//! Transport crates should depend on this crate. Dragonet stack users should depend on
//! the `dragonet` crate instead.
//!
//! A transport offers three services:
//! * Endpoints: locally addressed mailboxes. Each endpoint has a receive handler that the
//!   transport invokes for every inbound payload.
//! * Send: a non-blocking copy of a payload from a local endpoint to a remote address.
//! * Namespace: a way to publish the existence of a local endpoint under a name, and a
//!   process-wide listener that is told about every remote endpoint created or destroyed.
//!
//! Handlers and listeners may be invoked from interrupt context. They must return quickly,
//! must not block, and must not take locks that task-context code holds across a wait.
//! The stack honours this by pushing the work into interrupt-safe queues.
#![no_std]

extern crate alloc;

pub mod address;
pub mod endpoint;
pub mod namespace;

pub use address::Address;
pub use endpoint::{RxHandler, Transport};
pub use namespace::{EndpointName, MAX_NAME_LEN, NamespaceListener, NsAction};

/// Transport operation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// The inter-core link is not established
    LinkDown,
    /// The requested local address is already bound to an endpoint
    AddressInUse,
    /// No endpoint is bound to the destination address
    UnknownDestination,
    /// The payload does not fit a transport buffer
    PayloadTooLarge,
    /// A namespace listener is already bound
    AlreadyBound,
    /// The transport ran out of endpoint or buffer memory
    NoMemory,
}
