//! Channel and endpoint naming
//!
//! A channel exists on the wire only as the name of its receive endpoint: the channel name
//! followed by a role suffix. A core announces its receive endpoints with `announce_suffix` and
//! recognizes the peer's receive endpoints by `discover_suffix`.

use dragonet_transport::{EndpointName, MAX_NAME_LEN};

/// Channel name as stored in the registries
pub type ChannelName = heapless::String<MAX_NAME_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NamingConvention {
    pub announce_suffix: &'static str,
    pub discover_suffix: &'static str,
}

impl NamingConvention {
    /// Suffix pair of the peer-side implementation
    pub const PEER: Self = Self {
        announce_suffix: "__p",
        discover_suffix: "__s",
    };

    /// Returns the complementary convention.
    ///
    /// Two cores running this stack must use mirrored conventions to discover each other.
    pub const fn mirrored(self) -> Self {
        Self {
            announce_suffix: self.discover_suffix,
            discover_suffix: self.announce_suffix,
        }
    }

    /// Name under which the receive endpoint of `channel` is announced
    pub fn endpoint_name(&self, channel: &str) -> Option<EndpointName> {
        if channel.is_empty() {
            return None;
        }
        let mut name = EndpointName::new();
        name.push_str(channel).ok()?;
        name.push_str(self.announce_suffix).ok()?;
        Some(name)
    }

    /// Recovers the channel from a peer announcement.
    ///
    /// Returns None for names without the discover suffix.
    pub fn discovered_channel<'n>(&self, endpoint_name: &'n str) -> Option<&'n str> {
        endpoint_name
            .strip_suffix(self.discover_suffix)
            .filter(|channel| !channel.is_empty())
    }
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self::PEER
    }
}

pub(crate) fn channel_name(channel: &str) -> Option<ChannelName> {
    let mut name = ChannelName::new();
    name.push_str(channel).ok()?;
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_name_appends_suffix() {
        let name = NamingConvention::PEER.endpoint_name("temp").unwrap();
        assert_eq!(name.as_str(), "temp__p");

        let name = NamingConvention::PEER.mirrored().endpoint_name("temp").unwrap();
        assert_eq!(name.as_str(), "temp__s");
    }

    #[test]
    fn endpoint_name_rejects_empty_and_long_channels() {
        assert!(NamingConvention::PEER.endpoint_name("").is_none());

        let longest = "c".repeat(MAX_NAME_LEN - 3);
        assert!(NamingConvention::PEER.endpoint_name(&longest).is_some());
        let too_long = "c".repeat(MAX_NAME_LEN - 2);
        assert!(NamingConvention::PEER.endpoint_name(&too_long).is_none());
    }

    #[test]
    fn discovered_channel_strips_discover_suffix() {
        let naming = NamingConvention::PEER;
        assert_eq!(naming.discovered_channel("evt__s"), Some("evt"));
        assert_eq!(naming.discovered_channel("evt__p"), None);
        assert_eq!(naming.discovered_channel("__s"), None);
        assert_eq!(naming.discovered_channel("s"), None);
        assert_eq!(naming.mirrored().discovered_channel("evt__p"), Some("evt"));
    }
}
