use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::TaskId;
use crate::queue_set::QueueSet;
use crate::registry::{Busy, Lock};

/// Task to queue set map
///
/// A set is created on the first subscription of a task and kept for the process lifetime.
pub struct Registry<M: RawMutex> {
    sets: Lock<M, BTreeMap<TaskId, Arc<QueueSet<M>>>>,
    slot_capacity: usize,
}

impl<M: RawMutex> Registry<M> {
    pub fn new(slot_capacity: usize) -> Self {
        Self {
            sets: Lock::new(BTreeMap::new()),
            slot_capacity,
        }
    }

    pub fn get_or_create(&self, task: TaskId) -> Result<Arc<QueueSet<M>>, Busy> {
        self.sets.with(|sets| {
            sets.entry(task)
                .or_insert_with(|| {
                    debug!("creating queue set for task {}", task.into_u32());
                    Arc::new(QueueSet::new(task, self.slot_capacity))
                })
                .clone()
        })
    }

    pub fn get(&self, task: TaskId) -> Result<Option<Arc<QueueSet<M>>>, Busy> {
        self.sets.with(|sets| sets.get(&task).cloned())
    }
}
