use std::net::SocketAddr;

use tether_shared::{ChannelId, DisposeReason};

/// Lifecycle notifications of a [`ServerChannelTable`](crate::ServerChannelTable).
/// Only established channels are reported; pending handshakes come and go
/// silently.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerEvent {
    Connected {
        channel_id: ChannelId,
        address: SocketAddr,
    },
    Disconnected {
        channel_id: ChannelId,
        reason: DisposeReason,
    },
}
