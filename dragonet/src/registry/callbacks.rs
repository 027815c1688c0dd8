use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::SubscriptionId;
use crate::registry::{Busy, Lock};

/// Subscription callback
///
/// Invoked in the publisher's task for direct deliveries and in the subscriber's dispatch loop
/// for queued ones. Never invoked from interrupt context.
pub type Callback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Subscription to callback map
///
/// Kept apart from the channel lists: the dispatch loop resolves a callback from the queue that
/// became ready, without knowing the channel.
pub struct Registry<M: RawMutex> {
    callbacks: Lock<M, BTreeMap<SubscriptionId, Callback>>,
}

impl<M: RawMutex> Registry<M> {
    pub fn new() -> Self {
        Self {
            callbacks: Lock::new(BTreeMap::new()),
        }
    }

    pub fn insert(&self, id: SubscriptionId, callback: Callback) -> Result<(), Busy> {
        self.callbacks.with(|callbacks| {
            callbacks.insert(id, callback);
        })
    }

    /// Returns a handle to the callback. The lock is released before the caller invokes it.
    pub fn get(&self, id: SubscriptionId) -> Result<Option<Callback>, Busy> {
        self.callbacks.with(|callbacks| callbacks.get(&id).cloned())
    }

    /// Runs `f` while the table is locked, as an interrupted owner would.
    #[cfg(test)]
    pub fn hold<U>(&self, f: impl FnOnce() -> U) -> Result<U, Busy> {
        self.callbacks.with(|_| f())
    }
}

impl<M: RawMutex> Default for Registry<M> {
    fn default() -> Self {
        Self::new()
    }
}
