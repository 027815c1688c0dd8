use dragonet::transport::{
    Address, NamespaceListener, NsAction, RxHandler, Transport, TransportError,
};
use dragonet::{Config, PublishReport, SubscribeError, SubscriptionId};
use dragonet_loopback::{Endpoint, LoopbackTransport};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use std::boxed::Box;
use std::string::String;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::vec::Vec;

type M = CriticalSectionRawMutex;
type Broker = dragonet::Broker<M, Reentrant>;
type Task = dragonet::Task<'static, M, Reentrant>;
type Hook = Box<dyn FnOnce(&'static Broker) + Send>;

/// Loopback side that calls back into its own broker from inside transport calls
///
/// The broker holds a registry lock around endpoint creation and announcement, so the hooks
/// run in the same situation as an interrupt preempting the lock owner.
struct Reentrant {
    inner: LoopbackTransport<M>,
    broker: OnceLock<&'static Broker>,
    on_create: Mutex<Option<Hook>>,
    on_announce: Mutex<Option<Hook>>,
}

impl Reentrant {
    fn run(&self, hook: &Mutex<Option<Hook>>) {
        let hook = hook.lock().unwrap().take();
        if let (Some(hook), Some(broker)) = (hook, self.broker.get()) {
            hook(broker);
        }
    }
}

impl Transport for Reentrant {
    type Endpoint = Endpoint;

    fn is_link_up(&self) -> bool {
        self.inner.is_link_up()
    }

    fn create_endpoint(
        &self,
        address: Address,
        handler: Arc<dyn RxHandler>,
    ) -> Result<Endpoint, TransportError> {
        let endpoint = self.inner.create_endpoint(address, handler)?;
        self.run(&self.on_create);
        Ok(endpoint)
    }

    fn send(
        &self,
        endpoint: &Endpoint,
        destination: Address,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        self.inner.send(endpoint, destination, payload)
    }

    fn announce(
        &self,
        endpoint: &Endpoint,
        name: &str,
        action: NsAction,
    ) -> Result<(), TransportError> {
        self.inner.announce(endpoint, name, action)?;
        self.run(&self.on_announce);
        Ok(())
    }

    fn bind_namespace(&self, listener: Arc<dyn NamespaceListener>) -> Result<(), TransportError> {
        self.inner.bind_namespace(listener)
    }
}

fn broker() -> (&'static Broker, LoopbackTransport<M>) {
    let (main, peer) = dragonet_loopback::pair::<M>();
    main.set_link_up(true);
    let transport = Reentrant {
        inner: main,
        broker: OnceLock::new(),
        on_create: Mutex::new(None),
        on_announce: Mutex::new(None),
    };
    let config = Config {
        queue_set_capacity: 8,
        ..Config::default()
    };
    let broker: &'static Broker = Box::leak(Box::new(Broker::new(transport, config).unwrap()));
    assert!(broker.transport().broker.set(broker).is_ok());
    (broker, peer)
}

fn hook(slot: &Mutex<Option<Hook>>, f: impl FnOnce(&'static Broker) + Send + 'static) {
    *slot.lock().unwrap() = Some(Box::new(f));
}

#[derive(Default)]
struct Counter {
    received: AtomicU32,
}

impl RxHandler for Counter {
    fn on_receive(&self, _payload: &[u8], _source: Address) {
        self.received.fetch_add(1, Ordering::SeqCst);
    }
}

/// Announces a bare receive endpoint of `channel` from the peer side.
fn remote_subscriber(peer: &LoopbackTransport<M>, channel: &str) -> Arc<Counter> {
    let counter = Arc::new(Counter::default());
    let endpoint = peer.create_endpoint(Address::ANY, counter.clone()).unwrap();
    peer.announce(&endpoint, &std::format!("{channel}__s"), NsAction::Create)
        .unwrap();
    counter
}

#[test]
fn test_aborted_subscribe_keeps_earlier_steps() {
    let (broker, _peer) = broker();
    let nested: Arc<Mutex<Option<(Task, Result<SubscriptionId, SubscribeError>)>>> =
        Arc::default();

    let slot = nested.clone();
    hook(&broker.transport().on_announce, move |broker| {
        let task = broker.task();
        let res = task.subscribe("other", 4, 6, |_: &[u8]| {});
        *slot.lock().unwrap() = Some((task, res));
    });
    broker
        .task()
        .subscribe("temp", 4, 2, |_: &[u8]| {})
        .unwrap();

    let (mut task, res) = nested.lock().unwrap().take().unwrap();
    assert_eq!(res, Err(SubscribeError::Busy));

    // The queue of the aborted call still holds its slots
    assert_eq!(
        task.subscribe("more", 4, 4, |_: &[u8]| {}),
        Err(SubscribeError::QueueSetFull)
    );
    task.subscribe("more", 4, 2, |_: &[u8]| {}).unwrap();

    // No channel entry, hence no endpoint, for the aborted channel
    let names: Vec<_> = broker
        .transport()
        .inner
        .announcements()
        .into_iter()
        .map(|a| String::from(a.name.as_str()))
        .collect();
    assert_eq!(names, ["temp__p", "more__p"]);
    assert_eq!(broker.task().publish("other", &[1]).queued, 0);
    assert_eq!(task.try_dispatch(), None);
}

#[test]
fn test_busy_subscriber_registry_aborts_publish() {
    let (broker, peer) = broker();
    let counter = remote_subscriber(&peer, "evt");

    let nested = Arc::new(Mutex::new(None));
    let slot = nested.clone();
    hook(&broker.transport().on_announce, move |broker| {
        *slot.lock().unwrap() = Some(broker.task().publish("evt", &[1]));
    });
    broker
        .task()
        .subscribe("temp", 4, 2, |_: &[u8]| {})
        .unwrap();

    // Nothing was routed and the pending event was left in place
    assert_eq!(nested.lock().unwrap().take(), Some(PublishReport::default()));
    assert_eq!(counter.received.load(Ordering::SeqCst), 0);
    assert_eq!(broker.stats().published, 1);
    assert_eq!(broker.stats().events_applied, 0);

    let report = broker.task().publish("evt", &[2]);
    assert_eq!(report.events_applied, 1);
    assert_eq!(report.sent, 1);
    assert_eq!(counter.received.load(Ordering::SeqCst), 1);
}

#[test]
fn test_busy_publish_endpoint_registry_drops_only_the_event() {
    let (broker, peer) = broker();
    let evt = remote_subscriber(&peer, "evt");
    let other = remote_subscriber(&peer, "other");

    // Runs while the publish endpoint of `evt` is being created
    let nested = Arc::new(Mutex::new(None));
    let slot = nested.clone();
    hook(&broker.transport().on_create, move |broker| {
        *slot.lock().unwrap() = Some(broker.task().publish("other", &[1]));
    });

    let report = broker.task().publish("evt", &[2]);
    assert_eq!(report.events_applied, 1);
    assert_eq!(report.sent, 1);

    let nested = nested.lock().unwrap().take().unwrap();
    assert_eq!(nested.events_applied, 0);
    assert_eq!(nested.sent, 0);

    // The event of `other` was consumed by the nested publish and lost
    let report = broker.task().publish("other", &[3]);
    assert_eq!(report.events_applied, 0);
    assert_eq!(report.sent, 0);
    assert_eq!(other.received.load(Ordering::SeqCst), 0);

    assert_eq!(broker.task().publish("evt", &[4]).sent, 1);
    assert_eq!(evt.received.load(Ordering::SeqCst), 2);
    assert_eq!(broker.stats().events_applied, 1);
}
