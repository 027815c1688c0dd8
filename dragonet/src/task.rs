//! Per-task handle

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::future::{pending, poll_fn};
use dragonet_transport::Transport;
use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::broker::Broker;
use crate::queue_set::QueueSet;
use crate::registry::Busy;
use crate::router::PublishReport;
use crate::{SubscribeError, SubscriptionId, TaskId};

/// Result of delivering one queued message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchOutcome {
    /// The subscription's callback was invoked
    Delivered(SubscriptionId),
    /// The message was discarded: its subscription has no callback
    Orphaned(SubscriptionId),
    /// A registry lock was not acquired; the message, if one was popped, is lost
    Busy,
    /// The task has never subscribed, there is nothing to wait on
    NoSubscriptions,
}

/// A task's access point to the broker
///
/// The handle carries the task identity: subscribers owned by the publishing task are called in
/// place, other subscribers receive the message through their queue. Queued messages reach the
/// callbacks only through the dispatch methods of the owning handle.
pub struct Task<'a, M: RawMutex, T: Transport> {
    broker: &'a Broker<M, T>,
    id: TaskId,
    set: Option<Arc<QueueSet<M>>>,
    scratch: Vec<u8>,
}

impl<'a, M: RawMutex + Send + Sync + 'static, T: Transport> Task<'a, M, T> {
    pub(crate) fn new(broker: &'a Broker<M, T>, id: TaskId) -> Self {
        Self {
            broker,
            id,
            set: None,
            scratch: vec![0; broker.config().max_message_size],
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn broker(&self) -> &'a Broker<M, T> {
        self.broker
    }

    /// Subscribes this task to `channel`.
    ///
    /// Messages are queued in `queue_capacity` slots of `message_size` bytes; when the queue is
    /// full, new messages for this subscription are dropped. Messages longer than
    /// `message_size` are dropped as well, including those published by this task.
    pub fn subscribe(
        &self,
        channel: &str,
        message_size: usize,
        queue_capacity: usize,
        callback: impl Fn(&[u8]) + Send + Sync + 'static,
    ) -> Result<SubscriptionId, SubscribeError> {
        self.broker.subscribe(
            self.id,
            channel,
            message_size,
            queue_capacity,
            Arc::new(callback),
        )
    }

    /// Publishes `payload` to local and remote subscribers of `channel`. Never blocks.
    pub fn publish(&self, channel: &str, payload: &[u8]) -> PublishReport {
        self.broker.publish(self.id, channel, payload)
    }

    /// Fire-and-forget publish. Always returns 0.
    pub fn serialize_and_publish(&self, channel: &str, payload: &[u8]) -> i32 {
        self.publish(channel, payload);
        0
    }

    /// Fire-and-forget subscribe. Failures are only logged.
    pub fn subscribe_serialized(
        &self,
        channel: &str,
        callback: impl Fn(&[u8]) + Send + Sync + 'static,
        message_size: usize,
        queue_capacity: usize,
    ) {
        if let Err(err) = self.subscribe(channel, message_size, queue_capacity, callback) {
            warn!("subscribing to {} failed: {:?}", channel, err);
        }
    }

    fn queue_set(&mut self) -> Result<Option<Arc<QueueSet<M>>>, Busy> {
        if self.set.is_none() {
            self.set = self.broker.queue_set(self.id)?;
        }
        Ok(self.set.clone())
    }

    /// Delivers one queued message if there is any.
    pub fn try_dispatch(&mut self) -> Option<DispatchOutcome> {
        let set = match self.queue_set() {
            Ok(Some(set)) => set,
            Ok(None) => return Some(DispatchOutcome::NoSubscriptions),
            Err(Busy) => return Some(DispatchOutcome::Busy),
        };
        let (id, length) = set.try_pop(&mut self.scratch)?;
        Some(self.deliver(id, length))
    }

    /// Waits for the next queued message and delivers it.
    ///
    /// Messages are delivered in the order they were queued, across all subscriptions of the
    /// task.
    pub async fn dispatch(&mut self) -> DispatchOutcome {
        let set = match self.queue_set() {
            Ok(Some(set)) => set,
            Ok(None) => return DispatchOutcome::NoSubscriptions,
            Err(Busy) => return DispatchOutcome::Busy,
        };
        let scratch = &mut self.scratch;
        let (id, length) = poll_fn(|cx| set.poll_pop(cx, &mut scratch[..])).await;
        self.deliver(id, length)
    }

    /// Runs the dispatch loop of this task. Never returns.
    ///
    /// A task without subscriptions parks forever.
    pub async fn spin(&mut self) -> ! {
        loop {
            match self.dispatch().await {
                DispatchOutcome::Delivered(_) | DispatchOutcome::Orphaned(_) => {}
                DispatchOutcome::Busy => yield_now().await,
                DispatchOutcome::NoSubscriptions => {
                    debug!("task {} has no subscriptions, parking", self.id.into_u32());
                    pending::<()>().await;
                }
            }
        }
    }

    fn deliver(&self, id: SubscriptionId, length: usize) -> DispatchOutcome {
        match self.broker.callback(id) {
            Ok(Some(callback)) => {
                callback(&self.scratch[..length]);
                DispatchOutcome::Delivered(id)
            }
            Ok(None) => {
                warn!("discarding message of subscription {} without callback", id.into_u32());
                self.broker.record_orphaned();
                DispatchOutcome::Orphaned(id)
            }
            Err(Busy) => {
                warn!("callback table busy, message of {} lost", id.into_u32());
                DispatchOutcome::Busy
            }
        }
    }
}
