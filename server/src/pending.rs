use std::net::SocketAddr;

use tether_shared::{tick_is_after, ChannelId, Tick};

/// A `RequestConnection` answered with `WaitConfirmConnection` and not yet
/// confirmed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingConnection {
    pub channel_id: ChannelId,
    pub address: SocketAddr,
    pub created_at: Tick,
    pub timeout_at: Tick,
}

impl PendingConnection {
    pub fn new(channel_id: ChannelId, address: SocketAddr, now: Tick, timeout_ms: u32) -> Self {
        Self {
            channel_id,
            address,
            created_at: now,
            timeout_at: now.wrapping_add(timeout_ms),
        }
    }

    pub fn is_expired(&self, now: Tick) -> bool {
        tick_is_after(now, self.timeout_at)
    }
}
