use alloc::collections::BTreeMap;
use alloc::collections::btree_map::Entry;
use dragonet_transport::{Address, TransportError};
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::config::MAX_REMOTE_SUBSCRIBERS;
use crate::naming::ChannelName;
use crate::registry::{Busy, Lock};

/// Remote receive endpoints of one channel
pub type Destinations = heapless::Vec<Address, MAX_REMOTE_SUBSCRIBERS>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddOutcome {
    Added,
    AlreadyPresent,
    /// The destination set is at capacity; the address was not added
    Full,
    /// The publish endpoint could not be created
    Transport(TransportError),
}

struct PublishEndpoint<E> {
    endpoint: E,
    destinations: Destinations,
}

/// Channel to publish endpoint map
///
/// An endpoint is created when the first remote subscriber of its channel is discovered and
/// kept afterwards, even with no destinations left.
pub struct Registry<M: RawMutex, E> {
    endpoints: Lock<M, BTreeMap<ChannelName, PublishEndpoint<E>>>,
}

impl<M: RawMutex, E: Clone> Registry<M, E> {
    pub fn new() -> Self {
        Self {
            endpoints: Lock::new(BTreeMap::new()),
        }
    }

    /// Adds a remote destination to `channel`, creating the publish endpoint with `create` if
    /// the channel has none.
    pub fn add_destination(
        &self,
        channel: &ChannelName,
        address: Address,
        create: impl FnOnce() -> Result<E, TransportError>,
    ) -> Result<AddOutcome, Busy> {
        self.endpoints.with(|endpoints| {
            let entry = match endpoints.entry(channel.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => match create() {
                    Ok(endpoint) => entry.insert(PublishEndpoint {
                        endpoint,
                        destinations: Destinations::new(),
                    }),
                    Err(err) => return AddOutcome::Transport(err),
                },
            };

            if entry.destinations.contains(&address) {
                AddOutcome::AlreadyPresent
            } else if entry.destinations.push(address).is_err() {
                AddOutcome::Full
            } else {
                AddOutcome::Added
            }
        })
    }

    /// Removes a remote destination. Returns false if the channel or address is unknown.
    pub fn remove_destination(&self, channel: &ChannelName, address: Address) -> Result<bool, Busy> {
        self.endpoints.with(|endpoints| {
            let Some(entry) = endpoints.get_mut(channel) else {
                return false;
            };
            match entry.destinations.iter().position(|a| *a == address) {
                Some(index) => {
                    entry.destinations.remove(index);
                    true
                }
                None => false,
            }
        })
    }

    /// Snapshot of the endpoint and destinations of `channel`, so sends run without the lock.
    pub fn route(&self, channel: &ChannelName) -> Result<Option<(E, Destinations)>, Busy> {
        self.endpoints.with(|endpoints| {
            endpoints
                .get(channel)
                .map(|entry| (entry.endpoint.clone(), entry.destinations.clone()))
        })
    }
}

impl<M: RawMutex, E: Clone> Default for Registry<M, E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::channel_name;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    type Registry = super::Registry<CriticalSectionRawMutex, u32>;

    #[test]
    fn test_endpoint_created_once() {
        let registry = Registry::new();
        let channel = channel_name("evt").unwrap();
        let mut created = 0;

        let mut create = || {
            created += 1;
            Ok(5)
        };
        assert_eq!(
            registry.add_destination(&channel, Address::new(1024), &mut create),
            Ok(AddOutcome::Added)
        );
        assert_eq!(
            registry.add_destination(&channel, Address::new(1024), &mut create),
            Ok(AddOutcome::AlreadyPresent)
        );
        assert_eq!(
            registry.add_destination(&channel, Address::new(1025), &mut create),
            Ok(AddOutcome::Added)
        );
        assert_eq!(created, 1);

        let (endpoint, destinations) = registry.route(&channel).unwrap().unwrap();
        assert_eq!(endpoint, 5);
        assert_eq!(destinations.as_slice(), &[Address::new(1024), Address::new(1025)]);
    }

    #[test]
    fn test_failed_create_adds_nothing() {
        let registry = Registry::new();
        let channel = channel_name("evt").unwrap();

        assert_eq!(
            registry.add_destination(&channel, Address::new(1024), || Err(TransportError::NoMemory)),
            Ok(AddOutcome::Transport(TransportError::NoMemory))
        );
        assert_eq!(registry.route(&channel), Ok(None));
    }

    #[test]
    fn test_destination_set_is_bounded() {
        let registry = Registry::new();
        let channel = channel_name("evt").unwrap();

        for raw in 0..MAX_REMOTE_SUBSCRIBERS as u32 {
            assert_eq!(
                registry.add_destination(&channel, Address::new(raw), || Ok(1)),
                Ok(AddOutcome::Added)
            );
        }
        assert_eq!(
            registry.add_destination(&channel, Address::new(100), || Ok(1)),
            Ok(AddOutcome::Full)
        );
    }

    #[test]
    fn test_remove_keeps_endpoint() {
        let registry = Registry::new();
        let channel = channel_name("evt").unwrap();

        assert_eq!(registry.remove_destination(&channel, Address::new(1)), Ok(false));

        registry
            .add_destination(&channel, Address::new(1), || Ok(3))
            .unwrap();
        assert_eq!(registry.remove_destination(&channel, Address::new(1)), Ok(true));
        assert_eq!(registry.remove_destination(&channel, Address::new(1)), Ok(false));

        let (endpoint, destinations) = registry.route(&channel).unwrap().unwrap();
        assert_eq!(endpoint, 3);
        assert!(destinations.is_empty());
    }
}
