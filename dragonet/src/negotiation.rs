//! Remote subscriber discovery
//!
//! The transport reports namespace announcements from its own context, possibly an interrupt.
//! `Negotiator` only filters them and queues them as pending events; the broker applies the
//! events to the publish endpoints at the start of the next publish, in task context.

use alloc::sync::Arc;
use dragonet_transport::{Address, EndpointName, NamespaceListener, NsAction, RxHandler};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;

use crate::config::PENDING_EVENT_CAPACITY;
use crate::fmt::Bytes;
use crate::naming::NamingConvention;
use crate::stats::Stats;

/// A remote receive endpoint appeared or went away
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent {
    /// Announced name, discover suffix included
    pub name: EndpointName,
    pub address: Address,
    pub action: NsAction,
}

pub struct Negotiator<M: RawMutex> {
    naming: NamingConvention,
    events: Channel<M, PendingEvent, PENDING_EVENT_CAPACITY>,
    stats: Arc<Stats>,
}

impl<M: RawMutex> Negotiator<M> {
    pub fn new(naming: NamingConvention, stats: Arc<Stats>) -> Self {
        Self {
            naming,
            events: Channel::new(),
            stats,
        }
    }

    pub fn naming(&self) -> &NamingConvention {
        &self.naming
    }

    /// Non-blocking poll of the next pending event
    pub fn try_next(&self) -> Option<PendingEvent> {
        self.events.try_receive().ok()
    }
}

impl<M: RawMutex + Send + Sync> NamespaceListener for Negotiator<M> {
    fn on_announcement(&self, name: &str, address: Address, action: NsAction) {
        if self.naming.discovered_channel(name).is_none() {
            trace!("ignoring announcement of {}", name);
            return;
        }
        let mut owned = EndpointName::new();
        if owned.push_str(name).is_err() {
            trace!("ignoring announcement with oversized name");
            return;
        }

        let event = PendingEvent {
            name: owned,
            address,
            action,
        };
        if self.events.try_send(event).is_err() {
            self.stats.record_event_dropped();
            warn!(
                "pending event queue full, dropped announcement from {}",
                address.into_u32()
            );
        }
    }
}

/// Receive handler of publish endpoints. Peers never send to them.
pub struct Discard;

impl RxHandler for Discard {
    fn on_receive(&self, payload: &[u8], source: Address) {
        trace!(
            "publish endpoint discarded {:02x} from {}",
            Bytes(payload),
            source.into_u32()
        );
    }
}
