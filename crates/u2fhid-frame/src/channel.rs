//! Channel identifiers.
//!
//! Every packet carries a 32-bit channel id. `0xFFFFFFFF` is the broadcast
//! channel, used only to allocate a fresh channel from the device. `0` is
//! reserved and never assigned.

use std::fmt;

/// A logical conversation with a device, multiplexed over one physical link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel(u32);

impl Channel {
    /// Broadcast channel (all bits set).
    pub const BROADCAST: Channel = Channel(BROADCAST_CID);

    /// Reserved channel id, never assigned by a device.
    pub const RESERVED: Channel = Channel(RESERVED_CID);

    /// Wrap a raw channel id.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// The raw 32-bit id.
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Returns true for the broadcast channel.
    pub const fn is_broadcast(self) -> bool {
        self.0 == BROADCAST_CID
    }

    /// Returns true if a device may hand out this id.
    pub const fn is_assignable(self) -> bool {
        self.0 != BROADCAST_CID && self.0 != RESERVED_CID
    }
}

impl From<u32> for Channel {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<Channel> for u32 {
    fn from(channel: Channel) -> Self {
        channel.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Raw broadcast channel id.
pub const BROADCAST_CID: u32 = 0xFFFF_FFFF;

/// Raw reserved channel id.
pub const RESERVED_CID: u32 = 0;
