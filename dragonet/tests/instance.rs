use dragonet::{Config, DispatchOutcome, Dragonet};
use dragonet_loopback::LoopbackTransport;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::vec::Vec;

type M = CriticalSectionRawMutex;

fn transport(constructed: &AtomicU32) -> LoopbackTransport<M> {
    constructed.fetch_add(1, Ordering::SeqCst);
    let (transport, _peer) = dragonet_loopback::pair::<M>();
    transport.set_link_up(true);
    transport
}

#[test]
fn test_init_is_idempotent() {
    static DRAGONET: Dragonet<M, LoopbackTransport<M>> = Dragonet::new();
    static CONSTRUCTED: AtomicU32 = AtomicU32::new(0);

    assert!(DRAGONET.broker().is_none());
    assert!(DRAGONET.task().is_none());

    let threads: Vec<_> = (0..4)
        .map(|_| {
            std::thread::spawn(|| {
                let broker = DRAGONET
                    .init(|| transport(&CONSTRUCTED), Config::default())
                    .unwrap();
                broker as *const _ as usize
            })
        })
        .collect();
    let brokers: Vec<usize> = threads.into_iter().map(|t| t.join().unwrap()).collect();

    assert_eq!(CONSTRUCTED.load(Ordering::SeqCst), 1);
    assert!(brokers.iter().all(|b| *b == brokers[0]));

    let again = DRAGONET
        .init(|| transport(&CONSTRUCTED), Config::default())
        .unwrap();
    assert_eq!(again as *const _ as usize, brokers[0]);
    assert_eq!(CONSTRUCTED.load(Ordering::SeqCst), 1);
}

#[test]
fn test_serialized_surface() {
    static DRAGONET: Dragonet<M, LoopbackTransport<M>> = Dragonet::new();
    static CONSTRUCTED: AtomicU32 = AtomicU32::new(0);
    static RECEIVED: AtomicU32 = AtomicU32::new(0);

    DRAGONET
        .init(|| transport(&CONSTRUCTED), Config::default())
        .unwrap();
    let mut subscriber = DRAGONET.task().unwrap();
    let publisher = DRAGONET.task().unwrap();

    subscriber.subscribe_serialized(
        "temp",
        |bytes: &[u8]| {
            RECEIVED.fetch_add(bytes.len() as u32, Ordering::SeqCst);
        },
        4,
        2,
    );
    // Failures are swallowed
    subscriber.subscribe_serialized("", |_: &[u8]| {}, 4, 2);

    for _ in 0..3 {
        assert_eq!(publisher.serialize_and_publish("temp", &[1, 2, 3]), 0);
    }
    assert_eq!(publisher.serialize_and_publish("unknown", &[1]), 0);

    assert!(matches!(
        subscriber.try_dispatch(),
        Some(DispatchOutcome::Delivered(_))
    ));
    assert!(matches!(
        subscriber.try_dispatch(),
        Some(DispatchOutcome::Delivered(_))
    ));
    assert_eq!(subscriber.try_dispatch(), None);
    assert_eq!(RECEIVED.load(Ordering::SeqCst), 6);
}
