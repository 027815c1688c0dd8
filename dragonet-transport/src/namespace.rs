//! Endpoint naming service

use crate::address::Address;

/// Longest name an endpoint can be announced under
pub const MAX_NAME_LEN: usize = 32;

/// Announced endpoint name
pub type EndpointName = heapless::String<MAX_NAME_LEN>;

/// Namespace announcement kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NsAction {
    Create,
    Destroy,
}

/// Observer of remote endpoint announcements
///
/// A transport holds a single process-wide listener. It reports every remote endpoint that
/// is announced or withdrawn, regardless of its name.
pub trait NamespaceListener: Send + Sync {
    /// Called from transport context, possibly an interrupt. Must not block.
    fn on_announcement(&self, name: &str, address: Address, action: NsAction);
}
