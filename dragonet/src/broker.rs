//! Process-wide routing service

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, Ordering};
use dragonet_transport::{Address, EndpointName, NsAction, Transport, TransportError};
use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::config::Config;
use crate::naming::{ChannelName, channel_name};
use crate::negotiation::{Discard, Negotiator, PendingEvent};
use crate::queue_set::QueueSet;
use crate::registry::callbacks::{self, Callback};
use crate::registry::publish_endpoints::{self, AddOutcome};
use crate::registry::queue_sets;
use crate::registry::subscribers::{self, ChannelSubscribers, Subscriber};
use crate::registry::Busy;
use crate::router::{self, Inbox, PublishReport};
use crate::stats::{Stats, StatsSnapshot};
use crate::task::Task;
use crate::{SubscribeError, SubscriptionId, TaskId};

/// Routing core shared by every task of a core
///
/// Owns the transport and the four registries. Constructed once, then shared by reference;
/// each task interacts with it through its own [`Task`] handle.
pub struct Broker<M: RawMutex, T: Transport> {
    config: Config,
    transport: T,
    next_task: AtomicU32,
    next_subscription: AtomicU32,
    queue_sets: queue_sets::Registry<M>,
    subscribers: subscribers::Registry<M, T::Endpoint>,
    callbacks: callbacks::Registry<M>,
    publish_endpoints: publish_endpoints::Registry<M, T::Endpoint>,
    negotiator: Arc<Negotiator<M>>,
    stats: Arc<Stats>,
}

impl<M: RawMutex + Send + Sync + 'static, T: Transport> Broker<M, T> {
    /// Creates the broker and installs its namespace listener on `transport`.
    ///
    /// Does not wait for the link. Call [`Broker::wait_link_up`] before the first publish.
    pub fn new(transport: T, config: Config) -> Result<Self, TransportError> {
        let stats = Arc::new(Stats::new());
        let negotiator = Arc::new(Negotiator::new(config.naming, stats.clone()));
        transport.bind_namespace(negotiator.clone())?;
        info!(
            "broker ready, announcing {} and discovering {}",
            config.naming.announce_suffix,
            config.naming.discover_suffix
        );

        Ok(Self {
            config,
            transport,
            next_task: AtomicU32::new(0),
            next_subscription: AtomicU32::new(0),
            queue_sets: queue_sets::Registry::new(config.queue_set_capacity),
            subscribers: subscribers::Registry::new(),
            callbacks: callbacks::Registry::new(),
            publish_endpoints: publish_endpoints::Registry::new(),
            negotiator,
            stats,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Waits until the peer core has attached to the link.
    pub async fn wait_link_up(&self) {
        while !self.transport.is_link_up() {
            yield_now().await;
        }
        debug!("link up");
    }

    /// Creates a handle with a new task identity.
    ///
    /// Each task must use its own handle: the identity decides between direct and queued
    /// delivery.
    pub fn task(&self) -> Task<'_, M, T> {
        let id = TaskId::new(self.next_task.fetch_add(1, Ordering::Relaxed));
        Task::new(self, id)
    }

    pub(crate) fn subscribe(
        &self,
        task: TaskId,
        channel: &str,
        message_size: usize,
        queue_capacity: usize,
        callback: Callback,
    ) -> Result<SubscriptionId, SubscribeError> {
        let endpoint_name = self
            .config
            .naming
            .endpoint_name(channel)
            .ok_or(SubscribeError::InvalidChannel)?;
        let channel = channel_name(channel).ok_or(SubscribeError::InvalidChannel)?;
        if message_size == 0 || queue_capacity == 0 || message_size > self.config.max_message_size {
            return Err(SubscribeError::InvalidQueue);
        }

        let set = self.queue_sets.get_or_create(task)?;
        let id = SubscriptionId::new(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        set.add(id, message_size, queue_capacity)
            .map_err(|_| SubscribeError::QueueSetFull)?;

        let subscribers = self.subscribers.get_or_open(&channel, |subscribers| {
            self.open_receive_endpoint(&channel, &endpoint_name, subscribers)
        })??;
        subscribers.push(Subscriber {
            id,
            set,
            message_size,
        });

        self.callbacks.insert(id, callback)?;
        debug!(
            "task {} subscribed to {} as {}",
            task.into_u32(),
            channel.as_str(),
            id.into_u32()
        );
        Ok(id)
    }

    fn open_receive_endpoint(
        &self,
        channel: &ChannelName,
        endpoint_name: &EndpointName,
        subscribers: &Arc<ChannelSubscribers<M>>,
    ) -> Result<T::Endpoint, TransportError> {
        let inbox = Inbox::new(channel.clone(), subscribers.clone(), self.stats.clone());
        let endpoint = self.transport.create_endpoint(Address::ANY, Arc::new(inbox))?;

        // The endpoint stays usable by local subscribers even if the peer never learns about it
        match self
            .transport
            .announce(&endpoint, endpoint_name, NsAction::Create)
        {
            Ok(()) => debug!("announced {}", endpoint_name.as_str()),
            Err(err) => warn!("announcing {} failed: {:?}", endpoint_name.as_str(), err),
        }
        Ok(endpoint)
    }

    pub(crate) fn publish(&self, task: TaskId, channel: &str, payload: &[u8]) -> PublishReport {
        let mut report = PublishReport::default();
        let channel = channel_name(channel);

        if let Some(channel) = &channel {
            match self.subscribers.find(channel) {
                Ok(Some(subscribers)) => {
                    router::route_local(task, &subscribers, &self.callbacks, payload, &mut report)
                }
                Ok(None) => {}
                Err(Busy) => {
                    warn!("subscriber registry busy, publish to {} aborted", channel.as_str());
                    self.stats.record_publish(&report);
                    return report;
                }
            }
        }

        report.events_applied = self.apply_pending_events();

        if let Some(channel) = &channel {
            self.send_remote(channel, payload, &mut report);
        }

        self.stats.record_publish(&report);
        report
    }

    /// Applies every namespace event queued since the previous publish.
    fn apply_pending_events(&self) -> u32 {
        let mut applied = 0;
        while let Some(event) = self.negotiator.try_next() {
            if self.apply_event(&event) {
                applied += 1;
            }
        }
        applied
    }

    fn apply_event(&self, event: &PendingEvent) -> bool {
        let Some(channel) = self
            .negotiator
            .naming()
            .discovered_channel(&event.name)
            .and_then(channel_name)
        else {
            return false;
        };

        match event.action {
            NsAction::Create => {
                let res = self
                    .publish_endpoints
                    .add_destination(&channel, event.address, || {
                        debug!("creating publish endpoint for {}", channel.as_str());
                        self.transport.create_endpoint(Address::ANY, Arc::new(Discard))
                    });
                match res {
                    Ok(AddOutcome::Added) => {
                        info!(
                            "remote subscriber {} on {}",
                            event.address.into_u32(),
                            channel.as_str()
                        );
                        true
                    }
                    Ok(AddOutcome::AlreadyPresent) => false,
                    Ok(AddOutcome::Full) => {
                        warn!(
                            "too many remote subscribers on {}, {} ignored",
                            channel.as_str(),
                            event.address.into_u32()
                        );
                        false
                    }
                    Ok(AddOutcome::Transport(err)) => {
                        error!(
                            "creating publish endpoint for {} failed: {:?}",
                            channel.as_str(),
                            err
                        );
                        false
                    }
                    Err(Busy) => {
                        warn!("publish endpoint registry busy, event dropped");
                        false
                    }
                }
            }
            NsAction::Destroy => match self
                .publish_endpoints
                .remove_destination(&channel, event.address)
            {
                Ok(removed) => {
                    if removed {
                        info!(
                            "remote subscriber {} left {}",
                            event.address.into_u32(),
                            channel.as_str()
                        );
                    }
                    removed
                }
                Err(Busy) => {
                    warn!("publish endpoint registry busy, event dropped");
                    false
                }
            },
        }
    }

    fn send_remote(&self, channel: &ChannelName, payload: &[u8], report: &mut PublishReport) {
        let (endpoint, destinations) = match self.publish_endpoints.route(channel) {
            Ok(Some(route)) => route,
            Ok(None) => return,
            Err(Busy) => {
                warn!("publish endpoint registry busy, remote send skipped");
                return;
            }
        };

        for destination in destinations {
            match self.transport.send(&endpoint, destination, payload) {
                Ok(()) => report.sent += 1,
                Err(err) => {
                    trace!(
                        "send to {} failed: {:?}",
                        destination.into_u32(),
                        err
                    );
                    report.send_failed += 1;
                }
            }
        }
    }

    pub(crate) fn queue_set(&self, task: TaskId) -> Result<Option<Arc<QueueSet<M>>>, Busy> {
        self.queue_sets.get(task)
    }

    pub(crate) fn callback(&self, id: SubscriptionId) -> Result<Option<Callback>, Busy> {
        self.callbacks.get(id)
    }

    pub(crate) fn record_orphaned(&self) {
        self.stats.record_orphaned();
    }
}
