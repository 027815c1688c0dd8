use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::RefCell;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::naming::ChannelName;
use crate::queue_set::QueueSet;
use crate::registry::{Busy, Lock};
use crate::{SubscriptionId, TaskId};

/// A delivery target: one subscription queue inside the owner's queue set
pub struct Subscriber<M: RawMutex> {
    pub id: SubscriptionId,
    pub set: Arc<QueueSet<M>>,
    /// Longest payload the subscription accepts, on every delivery path
    pub message_size: usize,
}

impl<M: RawMutex> Subscriber<M> {
    pub fn task(&self) -> TaskId {
        self.set.task()
    }
}

impl<M: RawMutex> Clone for Subscriber<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            set: self.set.clone(),
            message_size: self.message_size,
        }
    }
}

/// Subscribers of one channel in registration order
///
/// Shared with the channel's receive endpoint handler, so it is guarded by its own short
/// critical section instead of a registry lock. The list only grows.
pub struct ChannelSubscribers<M: RawMutex> {
    list: Mutex<M, RefCell<Vec<Subscriber<M>>>>,
}

impl<M: RawMutex> ChannelSubscribers<M> {
    pub fn new() -> Self {
        Self {
            list: Mutex::new(RefCell::new(Vec::new())),
        }
    }

    /// Task context only: may allocate.
    pub fn push(&self, subscriber: Subscriber<M>) {
        self.list.lock(|cell| cell.borrow_mut().push(subscriber));
    }

    pub fn get(&self, index: usize) -> Option<Subscriber<M>> {
        self.list.lock(|cell| cell.borrow().get(index).cloned())
    }

    /// Visits subscribers one at a time, each lookup in a dedicated critical section.
    ///
    /// Subscribers appended during the walk are visited as well.
    pub fn for_each(&self, mut f: impl FnMut(Subscriber<M>)) {
        let mut index = 0;
        while let Some(subscriber) = self.get(index) {
            f(subscriber);
            index += 1;
        }
    }
}

impl<M: RawMutex> Default for ChannelSubscribers<M> {
    fn default() -> Self {
        Self::new()
    }
}

struct Channel<M: RawMutex, E> {
    subscribers: Arc<ChannelSubscribers<M>>,
    _receive_endpoint: E,
}

/// Channel to subscriber list map
///
/// A channel entry owns the receive endpoint created with it. Entries are never removed.
pub struct Registry<M: RawMutex, E> {
    channels: Lock<M, BTreeMap<ChannelName, Channel<M, E>>>,
}

impl<M: RawMutex, E> Registry<M, E> {
    pub fn new() -> Self {
        Self {
            channels: Lock::new(BTreeMap::new()),
        }
    }

    pub fn find(&self, channel: &ChannelName) -> Result<Option<Arc<ChannelSubscribers<M>>>, Busy> {
        self.channels.with(|channels| {
            channels
                .get(channel)
                .map(|entry| entry.subscribers.clone())
        })
    }

    /// Returns the subscriber list of `channel`, creating it on first use.
    ///
    /// `open` creates the receive endpoint for a new list. The entry is not created if it fails.
    pub fn get_or_open<Err>(
        &self,
        channel: &ChannelName,
        open: impl FnOnce(&Arc<ChannelSubscribers<M>>) -> Result<E, Err>,
    ) -> Result<Result<Arc<ChannelSubscribers<M>>, Err>, Busy> {
        self.channels.with(|channels| {
            if let Some(entry) = channels.get(channel) {
                return Ok(entry.subscribers.clone());
            }

            let subscribers = Arc::new(ChannelSubscribers::new());
            let endpoint = open(&subscribers)?;
            channels.insert(
                channel.clone(),
                Channel {
                    subscribers: subscribers.clone(),
                    _receive_endpoint: endpoint,
                },
            );
            Ok(subscribers)
        })
    }
}

impl<M: RawMutex, E> Default for Registry<M, E> {
    fn default() -> Self {
        Self::new()
    }
}
