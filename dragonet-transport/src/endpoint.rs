//! Transport contract required by the stack

use alloc::sync::Arc;

use crate::TransportError;
use crate::address::Address;
use crate::namespace::{NamespaceListener, NsAction};

/// Consumer of payloads arriving at a local endpoint
pub trait RxHandler: Send + Sync {
    /// Called from transport context, possibly an interrupt. Must not block.
    ///
    /// The payload is only borrowed for the duration of the call.
    fn on_receive(&self, payload: &[u8], source: Address);
}

/// Inter-core transport
///
/// All methods are called from task context. Implementations use interior mutability and
/// keep their own critical sections short.
pub trait Transport {
    /// Handle of a local endpoint. Cloning must not create a new endpoint.
    type Endpoint: Clone + Send + 'static;

    /// Returns true once the peer core has attached to the shared link.
    fn is_link_up(&self) -> bool;

    /// Creates a local endpoint.
    ///
    /// `address` may be `Address::ANY` to let the transport choose a free address.
    /// The handler stays registered for the endpoint lifetime.
    fn create_endpoint(
        &self,
        address: Address,
        handler: Arc<dyn RxHandler>,
    ) -> Result<Self::Endpoint, TransportError>;

    /// Copies the payload to the remote `destination`. Never blocks.
    fn send(
        &self,
        endpoint: &Self::Endpoint,
        destination: Address,
        payload: &[u8],
    ) -> Result<(), TransportError>;

    /// Publishes (or withdraws) a local endpoint under `name` to the peer.
    fn announce(
        &self,
        endpoint: &Self::Endpoint,
        name: &str,
        action: NsAction,
    ) -> Result<(), TransportError>;

    /// Installs the process-wide namespace listener.
    fn bind_namespace(&self, listener: Arc<dyn NamespaceListener>) -> Result<(), TransportError>;
}
