use std::fmt;

/// Millisecond counter relative to the start of a channel or socket. Wraps
/// at 32 bits, so compare with the `tick_*` helpers rather than `<`/`>`.
pub type Tick = u32;

/// Bits that mark a channel id as live. A generated id always carries them,
/// so a zeroed buffer can never alias a real channel.
pub const CHANNEL_ID_LIVE_MASK: u32 = 0xC000_0000;

/// Identifies one logical reliable connection, independent of the socket
/// carrying it. Generated by the connecting peer, echoed by the accepting
/// peer, and immutable for the life of the channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u32);

impl ChannelId {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Generates a random live id.
    pub fn generate() -> Self {
        Self(CHANNEL_ID_LIVE_MASK | fastrand::u32(..))
    }

    /// Generates a random live id that differs from `previous`, used when the
    /// peer reports a collision.
    pub fn regenerate(previous: ChannelId) -> Self {
        loop {
            let next = Self::generate();
            if next != previous {
                return next;
            }
        }
    }

    pub fn is_live(&self) -> bool {
        self.0 & CHANNEL_ID_LIVE_MASK == CHANNEL_ID_LIVE_MASK
    }

    pub fn to_u32(&self) -> u32 {
        self.0
    }
}

impl From<u32> for ChannelId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}", self.0)
    }
}

/// Selects the engine preset a channel is created with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NetworkTarget {
    /// Client-facing traffic over the public internet.
    Outer,
    /// Server-to-server traffic inside the cluster.
    Inner,
}
