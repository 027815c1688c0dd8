use alloc::boxed::Box;
use alloc::vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EnqueueError {
    /// All slots are occupied
    Full,
    /// The payload is longer than a slot
    Oversized,
}

/// Bounded FIFO of fixed-size message slots
///
/// Storage is allocated once on creation. Push and pop only copy bytes.
pub struct SlotQueue {
    storage: Box<[u8]>,
    lengths: Box<[usize]>,
    slot_size: usize,
    head: usize,
    len: usize,
}

impl SlotQueue {
    /// Returns None for an empty geometry or one whose storage size overflows.
    pub fn new(slot_size: usize, capacity: usize) -> Option<Self> {
        if slot_size == 0 || capacity == 0 {
            return None;
        }
        let size = slot_size.checked_mul(capacity)?;

        Some(Self {
            storage: vec![0; size].into_boxed_slice(),
            lengths: vec![0; capacity].into_boxed_slice(),
            slot_size,
            head: 0,
            len: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    pub fn push(&mut self, payload: &[u8]) -> Result<(), EnqueueError> {
        if payload.len() > self.slot_size {
            return Err(EnqueueError::Oversized);
        }
        if self.is_full() {
            return Err(EnqueueError::Full);
        }

        let idx = (self.head + self.len) % self.capacity();
        self.slot_mut(idx)[..payload.len()].copy_from_slice(payload);
        self.lengths[idx] = payload.len();
        self.len += 1;
        Ok(())
    }

    /// Copies the oldest message into `out` and returns its length.
    ///
    /// A message longer than `out` is truncated.
    pub fn pop_into(&mut self, out: &mut [u8]) -> Option<usize> {
        if self.is_empty() {
            return None;
        }

        let idx = self.head;
        let length = core::cmp::min(self.lengths[idx], out.len());
        let start = idx * self.slot_size;
        out[..length].copy_from_slice(&self.storage[start..start + length]);

        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        Some(length)
    }

    fn slot_mut(&mut self, idx: usize) -> &mut [u8] {
        let start = idx * self.slot_size;
        &mut self.storage[start..start + self.slot_size]
    }
}
