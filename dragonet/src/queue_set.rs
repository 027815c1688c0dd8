use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::task::{Context, Poll};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::waitqueue::WakerRegistration;

use crate::queue::{EnqueueError, SlotQueue};
use crate::{SubscriptionId, TaskId};

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueSetFull;

/// Delivery queues of a single task
///
/// Every message pushed to a member queue also records the queue in a ready list, so the owner
/// waits on the set and pops messages in arrival order regardless of channel.
///
/// `push` is interrupt-safe for an interrupt-safe `M` and never allocates.
/// `add` allocates and is task context only.
pub struct QueueSet<M: RawMutex> {
    task: TaskId,
    inner: Mutex<M, RefCell<Inner>>,
}

struct Inner {
    queues: Vec<(SubscriptionId, SlotQueue)>,
    ready: VecDeque<SubscriptionId>,
    free_slots: usize,
    waker: WakerRegistration,
}

impl<M: RawMutex> QueueSet<M> {
    pub fn new(task: TaskId, slot_capacity: usize) -> Self {
        Self {
            task,
            inner: Mutex::new(RefCell::new(Inner {
                queues: Vec::new(),
                ready: VecDeque::new(),
                free_slots: slot_capacity,
                waker: WakerRegistration::new(),
            })),
        }
    }

    pub fn task(&self) -> TaskId {
        self.task
    }

    /// Adds a queue of `capacity` slots of `slot_size` bytes.
    ///
    /// Storage is allocated only once the slots are known to fit in the set.
    pub fn add(
        &self,
        id: SubscriptionId,
        slot_size: usize,
        capacity: usize,
    ) -> Result<(), QueueSetFull> {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            if capacity > inner.free_slots {
                return Err(QueueSetFull);
            }
            let queue = SlotQueue::new(slot_size, capacity).ok_or(QueueSetFull)?;
            inner.free_slots -= capacity;

            // The ready list holds at most one entry per occupied slot
            let len = inner.ready.len();
            let slots: usize = inner.queues.iter().map(|(_, q)| q.capacity()).sum();
            inner.ready.reserve(slots + capacity - len);
            inner.queues.push((id, queue));
            Ok(())
        })
    }

    pub fn push(&self, id: SubscriptionId, payload: &[u8]) -> Result<(), PushError> {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            let queue = inner.queue_mut(id).ok_or(PushError::UnknownQueue)?;
            queue.push(payload)?;
            inner.ready.push_back(id);
            inner.waker.wake();
            Ok(())
        })
    }

    pub fn try_pop(&self, out: &mut [u8]) -> Option<(SubscriptionId, usize)> {
        self.inner.lock(|cell| cell.borrow_mut().pop(out))
    }

    /// Pops the oldest message of the set into `out`.
    ///
    /// Returns the subscription it was queued for and its length.
    pub fn poll_pop(&self, cx: &mut Context<'_>, out: &mut [u8]) -> Poll<(SubscriptionId, usize)> {
        self.inner.lock(|cell| {
            let mut inner = cell.borrow_mut();
            match inner.pop(out) {
                Some(res) => Poll::Ready(res),
                None => {
                    inner.waker.register(cx.waker());
                    Poll::Pending
                }
            }
        })
    }
}

impl Inner {
    fn queue_mut(&mut self, id: SubscriptionId) -> Option<&mut SlotQueue> {
        self.queues
            .iter_mut()
            .find(|(queue_id, _)| *queue_id == id)
            .map(|(_, queue)| queue)
    }

    fn pop(&mut self, out: &mut [u8]) -> Option<(SubscriptionId, usize)> {
        while let Some(id) = self.ready.pop_front() {
            if let Some(length) = self.queue_mut(id).and_then(|queue| queue.pop_into(out)) {
                return Some((id, length));
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PushError {
    Queue(EnqueueError),
    UnknownQueue,
}

impl From<EnqueueError> for PushError {
    fn from(value: EnqueueError) -> Self {
        PushError::Queue(value)
    }
}
