//! Delivery counters
//!
//! Best-effort delivery drops messages silently for publishers. The counters make those drops
//! observable without changing the hot path: updates are relaxed atomic increments, safe from
//! interrupt context.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::router::PublishReport;

#[derive(Default)]
pub struct Stats {
    published: AtomicU32,
    direct: AtomicU32,
    queued: AtomicU32,
    dropped: AtomicU32,
    received: AtomicU32,
    sent: AtomicU32,
    send_failed: AtomicU32,
    events_applied: AtomicU32,
    events_dropped: AtomicU32,
    orphaned: AtomicU32,
}

/// Counter values at one point in time. Counters wrap on overflow.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatsSnapshot {
    /// Publish calls
    pub published: u32,
    /// Callbacks invoked in the publisher's task
    pub direct: u32,
    /// Messages enqueued for another task, local or remote origin
    pub queued: u32,
    /// Local deliveries missed: full queue, oversized payload, missing callback or busy
    /// callback table
    pub dropped: u32,
    /// Messages received from the peer core
    pub received: u32,
    /// Successful sends to the peer core
    pub sent: u32,
    pub send_failed: u32,
    /// Namespace announcements applied to the publish endpoints
    pub events_applied: u32,
    /// Namespace announcements lost to a full pending event queue
    pub events_dropped: u32,
    /// Dispatched messages whose subscription had no callback
    pub orphaned: u32,
}

fn bump(counter: &AtomicU32, n: u32) {
    if n != 0 {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

impl Stats {
    pub const fn new() -> Self {
        Self {
            published: AtomicU32::new(0),
            direct: AtomicU32::new(0),
            queued: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
            received: AtomicU32::new(0),
            sent: AtomicU32::new(0),
            send_failed: AtomicU32::new(0),
            events_applied: AtomicU32::new(0),
            events_dropped: AtomicU32::new(0),
            orphaned: AtomicU32::new(0),
        }
    }

    pub(crate) fn record_publish(&self, report: &PublishReport) {
        bump(&self.published, 1);
        bump(&self.direct, report.direct);
        bump(&self.queued, report.queued);
        bump(&self.dropped, report.dropped);
        bump(&self.sent, report.sent);
        bump(&self.send_failed, report.send_failed);
        bump(&self.events_applied, report.events_applied);
    }

    pub(crate) fn record_inbound(&self, queued: u32, dropped: u32) {
        bump(&self.received, 1);
        bump(&self.queued, queued);
        bump(&self.dropped, dropped);
    }

    pub(crate) fn record_event_dropped(&self) {
        bump(&self.events_dropped, 1);
    }

    pub(crate) fn record_orphaned(&self) {
        bump(&self.orphaned, 1);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            direct: self.direct.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            send_failed: self.send_failed.load(Ordering::Relaxed),
            events_applied: self.events_applied.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            orphaned: self.orphaned.load(Ordering::Relaxed),
        }
    }
}
