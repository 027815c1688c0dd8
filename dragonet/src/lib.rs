//! # Dragonet
//!
//! This library provides the routing core of a publish/subscribe stack for multi-core
//! microcontrollers. Tasks publish byte-serialized messages to named channels; tasks on the
//! same core or on the peer core receive every message published to channels they subscribed to.
//! Cores share nothing but an explicit inter-core transport (see `dragonet-transport`).
//!
//! The library is designed for real-time systems: publishing never blocks, delivery is
//! best-effort, and the code paths reachable from interrupt context never take task-context locks.
//!
//! ## Architecture
//!
//! ```text
//!  Task A                Broker                                  Transport
//! ┌──────────┐ publish  ┌──────────────────────────────────┐
//! │ Task     ├─────────►│ Router ──► same task: callback   │
//! │ handle   │          │        └─► other task: QueueSet ─┼──► Task B dispatch
//! └──────────┘          │                                  │
//!                       │ Negotiator ◄── pending events ◄──┼─── namespace listener (IRQ)
//!                       │     │                            │
//!                       │     ▼                            │
//!                       │ Publish endpoints ───────────────┼──► send to remote addresses
//!                       │                                  │
//!                       │ Inbox (per channel) ◄────────────┼─── receive endpoint (IRQ)
//!                       │     └─► QueueSet of each local subscriber
//!                       └──────────────────────────────────┘
//! ```
//! Components:
//! * _Broker_ owns the registries and the transport. It is constructed once and shared by
//!   reference. `Dragonet` stores it in a process-wide cell for firmware that needs a global.
//! * _Task_ is a per-task handle. It carries the task identity used to pick the direct-call path
//!   and owns the dispatch loop of its task.
//! * _QueueSet_ aggregates the delivery queues of one task so the dispatch loop waits on a single
//!   object regardless of how many channels the task subscribed to.
//! * _Inbox_ is the per-channel receive endpoint handler that fans remote messages out to local
//!   subscriber queues.
//! * _Negotiator_ turns namespace announcements of remote subscribers into pending events, applied
//!   at the next publish.
//!
//! ## Concurrency model
//!
//! The Broker keeps four registries (task to queue set, channel to subscribers, subscription to
//! callback, channel to publish endpoint), each behind its own lock. Locks are never nested and
//! never held across a callback, a transport send or a wait. Endpoints are created while holding
//! the lock of the map that owns them, so a channel never gets two endpoints of the same kind.
//!
//! Interrupt-context code (transport receive handlers and the namespace listener) only touches
//! queue sets, per-channel subscriber lists and the pending event queue. These are guarded by
//! short critical sections and never allocate.
//!
//! The raw mutex type `M` selects the lock implementation for all of them:
//! * _CriticalSectionRawMutex_ is required when the transport invokes handlers from interrupts.
//! * _ThreadModeRawMutex_ is sufficient when every transport callback runs in thread mode.
//!
//! ## Delivery model
//!
//! Delivery is fire-and-forget. A full delivery queue drops the message for that subscriber,
//! a full negotiation queue drops the announcement, and failed sends are not retried.
//! `PublishReport` and `Stats` expose these outcomes without changing them.
//!
//! ## Limitations
//!
//! * Subscriptions live as long as the process. There is no unsubscribe.
//! * Message size is fixed per subscription.
//! * Routing spans two cores.
#![no_std]

extern crate alloc;
#[cfg(test)]
extern crate std;

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod broker;
pub mod config;
pub mod instance;
pub mod naming;
mod negotiation;
mod queue;
mod queue_set;
mod registry;
mod router;
pub mod stats;
pub mod task;

pub use broker::Broker;
pub use config::Config;
pub use dragonet_transport as transport;
pub use instance::Dragonet;
pub use naming::NamingConvention;
pub use registry::Busy;
pub use router::PublishReport;
pub use stats::StatsSnapshot;
pub use task::{DispatchOutcome, Task};

/// Identity of a task that publishes or subscribes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskId(u32);

impl TaskId {
    pub(crate) const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn into_u32(self) -> u32 {
        self.0
    }
}

/// Stable identifier of a subscription, returned by `subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubscriptionId(u32);

impl SubscriptionId {
    pub(crate) const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn into_u32(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubscribeError {
    /// A registry lock could not be acquired
    Busy,
    /// The channel name is empty or too long to be announced
    InvalidChannel,
    /// Zero message size or capacity, or a message size above `Config::max_message_size`
    InvalidQueue,
    /// The task's queue set has no slots left for the requested capacity
    QueueSetFull,
    /// The receive endpoint for the channel could not be created
    Transport(transport::TransportError),
}

impl From<Busy> for SubscribeError {
    fn from(_: Busy) -> Self {
        SubscribeError::Busy
    }
}

impl From<transport::TransportError> for SubscribeError {
    fn from(value: transport::TransportError) -> Self {
        SubscribeError::Transport(value)
    }
}
