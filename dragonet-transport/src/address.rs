/// Endpoint address on the inter-core link
///
/// Addresses are local to a core: a destination address names an endpoint of the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Address(u32);

impl Address {
    /// Lets the transport pick a free address on endpoint creation
    pub const ANY: Address = Address(u32::MAX);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn into_u32(self) -> u32 {
        self.0
    }

    pub const fn is_any(self) -> bool {
        self.0 == Self::ANY.0
    }
}

impl From<u32> for Address {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Address> for u32 {
    fn from(value: Address) -> Self {
        value.into_u32()
    }
}
