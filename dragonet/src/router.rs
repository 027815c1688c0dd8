//! Local delivery

use alloc::sync::Arc;
use dragonet_transport::{Address, RxHandler};
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::TaskId;
use crate::naming::ChannelName;
use crate::queue::EnqueueError;
use crate::queue_set::PushError;
use crate::registry::callbacks;
use crate::registry::subscribers::{ChannelSubscribers, Subscriber};
use crate::stats::Stats;

/// Outcome of a single publish
///
/// Publishing is fire-and-forget; the report only describes what happened.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PublishReport {
    /// Callbacks invoked synchronously in the publisher's task
    pub direct: u32,
    /// Messages enqueued for other tasks
    pub queued: u32,
    /// Local subscribers that missed the message: full queue, oversized payload, missing
    /// callback or unavailable callback table
    pub dropped: u32,
    /// Pending namespace events applied before the remote send
    pub events_applied: u32,
    /// Remote destinations the message was sent to
    pub sent: u32,
    /// Remote destinations the send failed for
    pub send_failed: u32,
}

/// Hands `payload` to every subscriber of a channel in registration order.
///
/// Subscribers owned by `caller` get their callback invoked in place, the others get a copy
/// in their queue. A payload longer than a subscription's message size is dropped for it on
/// both paths.
pub(crate) fn route_local<M: RawMutex>(
    caller: TaskId,
    subscribers: &ChannelSubscribers<M>,
    callbacks: &callbacks::Registry<M>,
    payload: &[u8],
    report: &mut PublishReport,
) {
    subscribers.for_each(|subscriber| {
        if payload.len() > subscriber.message_size {
            log_drop(&subscriber, PushError::Queue(EnqueueError::Oversized));
            report.dropped += 1;
        } else if subscriber.task() == caller {
            match callbacks.get(subscriber.id) {
                Ok(Some(callback)) => {
                    callback(payload);
                    report.direct += 1;
                }
                Ok(None) => {
                    debug!(
                        "subscription {} has no callback",
                        subscriber.id.into_u32()
                    );
                    report.dropped += 1;
                }
                Err(_) => {
                    warn!("callback table busy, direct delivery skipped");
                    report.dropped += 1;
                }
            }
        } else if enqueue(&subscriber, payload) {
            report.queued += 1;
        } else {
            report.dropped += 1;
        }
    });
}

fn enqueue<M: RawMutex>(subscriber: &Subscriber<M>, payload: &[u8]) -> bool {
    match subscriber.set.push(subscriber.id, payload) {
        Ok(()) => true,
        Err(err) => {
            log_drop(subscriber, err);
            false
        }
    }
}

fn log_drop<M: RawMutex>(subscriber: &Subscriber<M>, err: PushError) {
    trace!(
        "message dropped for subscription {}: {:?}",
        subscriber.id.into_u32(),
        err
    );
}

/// Receive handler of a channel's receive endpoint
///
/// Runs in transport context. Remote messages are always queued, never delivered in place.
pub(crate) struct Inbox<M: RawMutex> {
    channel: ChannelName,
    subscribers: Arc<ChannelSubscribers<M>>,
    stats: Arc<Stats>,
}

impl<M: RawMutex> Inbox<M> {
    pub fn new(channel: ChannelName, subscribers: Arc<ChannelSubscribers<M>>, stats: Arc<Stats>) -> Self {
        Self {
            channel,
            subscribers,
            stats,
        }
    }
}

impl<M: RawMutex + Send + Sync> RxHandler for Inbox<M> {
    fn on_receive(&self, payload: &[u8], source: Address) {
        let mut queued = 0;
        let mut dropped = 0;
        self.subscribers.for_each(|subscriber| {
            if enqueue(&subscriber, payload) {
                queued += 1;
            } else {
                dropped += 1;
            }
        });
        trace!(
            "{} bytes from {} on {}: {} queued, {} dropped",
            payload.len(),
            source.into_u32(),
            self.channel.as_str(),
            queued,
            dropped
        );
        self.stats.record_inbound(queued, dropped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SubscriptionId;
    use crate::queue_set::QueueSet;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::sync::atomic::{AtomicU32, Ordering};
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use std::sync::Mutex;

    type M = CriticalSectionRawMutex;

    fn subscribe(
        subscribers: &ChannelSubscribers<M>,
        set: &Arc<QueueSet<M>>,
        raw_id: u32,
        message_size: usize,
        capacity: usize,
    ) -> SubscriptionId {
        let id = SubscriptionId::new(raw_id);
        set.add(id, message_size, capacity).unwrap();
        subscribers.push(Subscriber {
            id,
            set: set.clone(),
            message_size,
        });
        id
    }

    #[test]
    fn test_same_task_is_called_in_place() {
        let task = TaskId::new(1);
        let set = Arc::new(QueueSet::<M>::new(task, 8));
        let subscribers = ChannelSubscribers::new();
        let callbacks = callbacks::Registry::new();
        let id = subscribe(&subscribers, &set, 1, 4, 2);

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        callbacks
            .insert(id, Arc::new(move |bytes: &[u8]| sink.lock().unwrap().push(bytes.to_vec())))
            .unwrap();

        let mut report = PublishReport::default();
        route_local(task, &subscribers, &callbacks, &[1, 2], &mut report);
        route_local(task, &subscribers, &callbacks, &[3], &mut report);

        assert_eq!(report.direct, 2);
        assert_eq!(report.queued, 0);
        assert_eq!(*received.lock().unwrap(), [vec![1, 2], vec![3]]);
        let mut out = [0u8; 4];
        assert!(set.try_pop(&mut out).is_none());
    }

    #[test]
    fn test_oversized_payload_is_dropped_on_both_paths() {
        let owner = TaskId::new(1);
        let own_set = Arc::new(QueueSet::<M>::new(owner, 8));
        let other_set = Arc::new(QueueSet::<M>::new(TaskId::new(2), 8));
        let subscribers = ChannelSubscribers::new();
        let callbacks = callbacks::Registry::new();
        let own = subscribe(&subscribers, &own_set, 1, 2, 2);
        subscribe(&subscribers, &other_set, 2, 2, 2);

        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        callbacks
            .insert(
                own,
                Arc::new(move |_: &[u8]| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        let mut report = PublishReport::default();
        route_local(owner, &subscribers, &callbacks, &[1, 2, 3], &mut report);
        assert_eq!(report.direct, 0);
        assert_eq!(report.queued, 0);
        assert_eq!(report.dropped, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        route_local(owner, &subscribers, &callbacks, &[1, 2], &mut report);
        assert_eq!(report.direct, 1);
        assert_eq!(report.queued, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_other_task_is_queued_and_full_queue_drops() {
        let set = Arc::new(QueueSet::<M>::new(TaskId::new(1), 8));
        let subscribers = ChannelSubscribers::new();
        let callbacks = callbacks::Registry::new();
        let id = subscribe(&subscribers, &set, 1, 4, 2);

        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        callbacks
            .insert(
                id,
                Arc::new(move |_: &[u8]| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        let publisher = TaskId::new(2);
        let mut report = PublishReport::default();
        for n in 0..3u8 {
            route_local(publisher, &subscribers, &callbacks, &[n; 4], &mut report);
        }

        assert_eq!(report.queued, 2);
        assert_eq!(report.dropped, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let mut out = [0u8; 4];
        assert_eq!(set.try_pop(&mut out), Some((id, 4)));
        assert_eq!(out, [0; 4]);
        assert_eq!(set.try_pop(&mut out), Some((id, 4)));
        assert_eq!(out, [1; 4]);
        assert_eq!(set.try_pop(&mut out), None);
    }

    #[test]
    fn test_inbox_fans_out_to_every_queue() {
        let first = Arc::new(QueueSet::<M>::new(TaskId::new(1), 8));
        let second = Arc::new(QueueSet::<M>::new(TaskId::new(2), 8));
        let subscribers = Arc::new(ChannelSubscribers::new());
        let a = subscribe(&subscribers, &first, 1, 2, 1);
        subscribe(&subscribers, &second, 2, 1, 1);

        let stats = Arc::new(Stats::new());
        let inbox = Inbox::new(
            crate::naming::channel_name("evt").unwrap(),
            subscribers,
            stats.clone(),
        );
        inbox.on_receive(&[5, 6], Address::new(1024));

        let mut out = [0u8; 2];
        assert_eq!(first.try_pop(&mut out), Some((a, 2)));
        assert_eq!(out, [5, 6]);
        // Payload larger than the second subscription's message size
        assert_eq!(second.try_pop(&mut out), None);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.received, 1);
        assert_eq!(snapshot.queued, 1);
        assert_eq!(snapshot.dropped, 1);
    }
}
