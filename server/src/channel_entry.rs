use std::net::SocketAddr;

use tether_shared::{ChannelId, ReliableStream, Tick};

/// An established channel in the server table.
pub struct ChannelEntry {
    pub channel_id: ChannelId,
    pub address: SocketAddr,
    pub established_at: Tick,
    pub stream: ReliableStream,
}
