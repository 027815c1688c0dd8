use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};
use dragonet_transport::{
    Address, EndpointName, NamespaceListener, NsAction, RxHandler, Transport, TransportError,
};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::fmt::Bytes;

/// First address handed out for `Address::ANY`
pub const FIRST_ADDRESS: u32 = 1024;

/// Largest payload a single send carries
pub const MAX_PAYLOAD: usize = 496;

/// A live announcement of a local endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub name: EndpointName,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    address: Address,
}

impl Endpoint {
    pub fn address(&self) -> Address {
        self.address
    }
}

struct Side {
    endpoints: Vec<(Address, Arc<dyn RxHandler>)>,
    next_address: u32,
    listener: Option<Arc<dyn NamespaceListener>>,
    announcements: Vec<Announcement>,
    sent: u32,
}

impl Side {
    fn new() -> Self {
        Self {
            endpoints: Vec::new(),
            next_address: FIRST_ADDRESS,
            listener: None,
            announcements: Vec::new(),
            sent: 0,
        }
    }

    fn is_bound(&self, address: Address) -> bool {
        self.endpoints.iter().any(|(a, _)| *a == address)
    }

    fn handler(&self, address: Address) -> Option<Arc<dyn RxHandler>> {
        self.endpoints
            .iter()
            .find(|(a, _)| *a == address)
            .map(|(_, handler)| handler.clone())
    }

    fn free_address(&mut self) -> Option<Address> {
        while self.next_address != Address::ANY.into_u32() {
            let address = Address::new(self.next_address);
            self.next_address += 1;
            if !self.is_bound(address) {
                return Some(address);
            }
        }
        None
    }
}

struct Link<M: RawMutex> {
    up: AtomicBool,
    sides: [Mutex<M, RefCell<Side>>; 2],
}

/// One side of a loopback link
pub struct LoopbackTransport<M: RawMutex> {
    link: Arc<Link<M>>,
    side: usize,
}

/// Creates both sides of a new link. The link is down.
pub fn pair<M: RawMutex>() -> (LoopbackTransport<M>, LoopbackTransport<M>) {
    let link = Arc::new(Link {
        up: AtomicBool::new(false),
        sides: [
            Mutex::new(RefCell::new(Side::new())),
            Mutex::new(RefCell::new(Side::new())),
        ],
    });
    (
        LoopbackTransport {
            link: link.clone(),
            side: 0,
        },
        LoopbackTransport { link, side: 1 },
    )
}

impl<M: RawMutex> LoopbackTransport<M> {
    fn with_local<U>(&self, f: impl FnOnce(&mut Side) -> U) -> U {
        self.link.sides[self.side].lock(|cell| f(&mut cell.borrow_mut()))
    }

    fn with_peer<U>(&self, f: impl FnOnce(&mut Side) -> U) -> U {
        self.link.sides[1 - self.side].lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Brings the link up or down for both sides.
    pub fn set_link_up(&self, up: bool) {
        debug!("link {}", if up { "up" } else { "down" });
        self.link.up.store(up, Ordering::Release);
    }

    /// Number of payloads successfully sent from this side
    pub fn sent_count(&self) -> u32 {
        self.with_local(|side| side.sent)
    }

    /// Live announcements of this side
    pub fn announcements(&self) -> Vec<Announcement> {
        self.with_local(|side| side.announcements.clone())
    }

    pub fn endpoint_count(&self) -> usize {
        self.with_local(|side| side.endpoints.len())
    }
}

impl<M: RawMutex + Send + Sync> Transport for LoopbackTransport<M> {
    type Endpoint = Endpoint;

    fn is_link_up(&self) -> bool {
        self.link.up.load(Ordering::Acquire)
    }

    fn create_endpoint(
        &self,
        address: Address,
        handler: Arc<dyn RxHandler>,
    ) -> Result<Endpoint, TransportError> {
        self.with_local(|side| {
            let address = if address.is_any() {
                side.free_address().ok_or(TransportError::NoMemory)?
            } else if side.is_bound(address) {
                return Err(TransportError::AddressInUse);
            } else {
                address
            };
            side.endpoints.push((address, handler));
            trace!("endpoint {} created", address.into_u32());
            Ok(Endpoint { address })
        })
    }

    fn send(
        &self,
        endpoint: &Endpoint,
        destination: Address,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        if !self.is_link_up() {
            return Err(TransportError::LinkDown);
        }
        if payload.len() > MAX_PAYLOAD {
            return Err(TransportError::PayloadTooLarge);
        }

        let handler = self
            .with_peer(|side| side.handler(destination))
            .ok_or(TransportError::UnknownDestination)?;
        self.with_local(|side| side.sent = side.sent.wrapping_add(1));
        trace!(
            "{} -> {}: {:02x}",
            endpoint.address.into_u32(),
            destination.into_u32(),
            Bytes(payload)
        );
        handler.on_receive(payload, endpoint.address);
        Ok(())
    }

    fn announce(&self, endpoint: &Endpoint, name: &str, action: NsAction) -> Result<(), TransportError> {
        let mut owned = EndpointName::new();
        owned
            .push_str(name)
            .map_err(|_| TransportError::PayloadTooLarge)?;

        self.with_local(|side| match action {
            NsAction::Create => side.announcements.push(Announcement {
                name: owned,
                address: endpoint.address,
            }),
            NsAction::Destroy => side
                .announcements
                .retain(|a| a.address != endpoint.address),
        });
        debug!("{:?} {} at {}", action, name, endpoint.address.into_u32());

        if let Some(listener) = self.with_peer(|side| side.listener.clone()) {
            listener.on_announcement(name, endpoint.address, action);
        }
        Ok(())
    }

    fn bind_namespace(&self, listener: Arc<dyn NamespaceListener>) -> Result<(), TransportError> {
        self.with_local(|side| {
            if side.listener.is_some() {
                return Err(TransportError::AlreadyBound);
            }
            side.listener = Some(listener.clone());
            Ok(())
        })?;

        let replay = self.with_peer(|side| side.announcements.clone());
        for announcement in replay {
            listener.on_announcement(&announcement.name, announcement.address, NsAction::Create);
        }
        Ok(())
    }
}
