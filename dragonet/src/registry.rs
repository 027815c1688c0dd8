//! Process-wide maps of the broker
//!
//! Each registry is guarded by its own lock. Registry locks are task context only: code reachable
//! from transport handlers never takes them.

use core::cell::RefCell;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;

pub(crate) mod callbacks;
pub(crate) mod publish_endpoints;
pub(crate) mod queue_sets;
pub(crate) mod subscribers;

/// A registry lock was not acquired
///
/// The operation that needed it is abandoned. State changed by earlier steps of the same
/// operation is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Busy;

pub(crate) struct Lock<M: RawMutex, T> {
    inner: Mutex<M, RefCell<T>>,
}

impl<M: RawMutex, T> Lock<M, T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    /// Runs `f` with exclusive access to the guarded value.
    ///
    /// Fails instead of blocking when the value is already borrowed, e.g. by a re-entrant call.
    pub fn with<U>(&self, f: impl FnOnce(&mut T) -> U) -> Result<U, Busy> {
        self.inner.lock(|cell| {
            let mut guard = cell.try_borrow_mut().map_err(|_| Busy)?;
            Ok(f(&mut guard))
        })
    }
}
