//! Broker configuration

use crate::naming::NamingConvention;

pub use dragonet_transport::MAX_NAME_LEN;

/// Capacity of the queue that carries namespace announcements from interrupt to task context
pub const PENDING_EVENT_CAPACITY: usize = 16;

/// Remote destinations tracked per channel
pub const MAX_REMOTE_SUBSCRIBERS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Role suffixes for announced and discovered endpoints
    pub naming: NamingConvention,
    /// Largest message size a subscription may request.
    /// Each task handle holds a dispatch buffer of this size.
    pub max_message_size: usize,
    /// Total number of queue slots, summed over all subscriptions of a task
    pub queue_set_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            naming: NamingConvention::PEER,
            max_message_size: 256,
            queue_set_capacity: 1024,
        }
    }
}
